//! The dereference engine.
//!
//! [`dereference`] replaces every reference node in a document with the
//! fully-expanded content it points to, resolving internal and cross-document
//! pointers through an injected [`DocumentLoader`]. Resolution is
//! depth-first: the content of a target is itself dereferenced before it is
//! substituted, so substituted subtrees never need a second pass.
//!
//! Cycles are detected via an in-progress stack keyed by absolute
//! `(document, fragment)` pairs. Under
//! [`CircularPolicy::Preserve`] a cycle becomes a back-reference: a
//! root-relative `$ref` pointing at the output location where the ancestor's
//! resolution began — the serializable equivalent of structural sharing.
//! Repeated references to one target are memoized and substituted from
//! cache, so a target is resolved exactly once however often it is used.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::{CircularPolicy, DerefOptions, SiblingPolicy};
use crate::error::{DerefError, ResolutionError};
use crate::loader::DocumentLoader;
use crate::pointer::{self, append_path, Pointer};
use crate::walker::find_references;

/// Result of a successful dereference operation.
#[derive(Debug, Clone)]
pub struct DerefResult {
    /// The fully-dereferenced document.
    pub document: Value,
    /// Output locations where a cycle was preserved as a back-reference.
    /// Empty for acyclic input.
    pub circular_refs: Vec<String>,
}

/// Dereference `document`, resolving every `$ref` it contains.
///
/// * `document` — the starting document, already parsed. It is never
///   mutated; substitution happens on a working copy.
/// * `base_id` — canonical identifier of `document`, the base against which
///   relative document parts in its references are joined. Use
///   [`default_document_id`](crate::loader::default_document_id) for
///   documents with no natural identity.
/// * `loader` — source for referenced documents. Each canonical identifier
///   is loaded at most once per call.
///
/// Fails on the first unresolvable reference: a schema with a dangling
/// reference is not a valid self-contained artifact, so there is no
/// partial-success mode.
pub fn dereference(
    document: &Value,
    base_id: &Url,
    loader: &dyn DocumentLoader,
    options: &DerefOptions,
) -> Result<DerefResult, DerefError> {
    let mut ctx = Context {
        loader,
        options,
        base_id,
        documents: HashMap::from([(base_id.clone(), document.clone())]),
        in_progress: Vec::new(),
        resolved: HashMap::new(),
        circular_refs: Vec::new(),
    };

    let resolved = resolve_node(document, base_id, "#", 0, &mut ctx)?;

    // Every surviving reference node must be a back-reference marker into
    // the output document.
    debug_assert!(
        find_references(&resolved).all(|site| site.target.starts_with('#')),
        "unresolved reference left in output"
    );

    Ok(DerefResult {
        document: resolved,
        circular_refs: ctx.circular_refs,
    })
}

// ---------------------------------------------------------------------------
// Resolution context
// ---------------------------------------------------------------------------

/// Absolute identity of a reference target: owning document + fragment.
type RefKey = (Url, String);

/// Mutable state of one dereference call.
struct Context<'a> {
    loader: &'a dyn DocumentLoader,
    options: &'a DerefOptions,
    /// Identifier of the root document — the document whose output
    /// locations the in-progress stack and back-reference anchors address.
    base_id: &'a Url,
    /// Documents loaded so far, keyed by canonical identifier. Seeded with
    /// the (frozen) root document so internal pointers resolve against the
    /// unmutated input.
    documents: HashMap<Url, Value>,
    /// Keys currently being resolved, with the output location where each
    /// resolution began. Linear scan is fine: the stack is as deep as the
    /// longest reference chain, not the document.
    in_progress: Vec<(RefKey, String)>,
    /// Fully-resolved nodes, memoized per key.
    resolved: HashMap<RefKey, Value>,
    circular_refs: Vec<String>,
}

impl Context<'_> {
    /// Diagnostic chain: the in-progress locations plus the failing site.
    fn chain_with(&self, location: &str) -> Vec<String> {
        let mut chain: Vec<String> = self
            .in_progress
            .iter()
            .map(|(_, loc)| loc.clone())
            .collect();
        chain.push(location.to_string());
        chain
    }

    fn resolution_failure(
        &self,
        raw_ref: &str,
        location: &str,
        source: ResolutionError,
    ) -> DerefError {
        DerefError::Resolution {
            pointer: raw_ref.to_string(),
            chain: self.chain_with(location),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Recursive resolution
// ---------------------------------------------------------------------------

/// Rebuild `node` with every reference resolved.
///
/// `doc_id` is the document the node belongs to (reference base);
/// `location` is the node's root-relative position in the *output* document;
/// `depth` counts reference hops only, not tree depth.
fn resolve_node(
    node: &Value,
    doc_id: &Url,
    location: &str,
    depth: usize,
    ctx: &mut Context<'_>,
) -> Result<Value, DerefError> {
    if depth > ctx.options.max_depth {
        return Err(DerefError::DepthExceeded {
            location: location.to_string(),
            max_depth: ctx.options.max_depth,
        });
    }

    match node {
        Value::Object(obj) => {
            if let Some(raw_ref) = obj.get("$ref").and_then(Value::as_str) {
                let raw_ref = raw_ref.to_string();
                return resolve_ref(obj, &raw_ref, doc_id, location, depth, ctx);
            }
            let mut out = Map::with_capacity(obj.len());
            for (key, child) in obj {
                let child_location = append_path(location, &[key]);
                out.insert(
                    key.clone(),
                    resolve_node(child, doc_id, &child_location, depth, ctx)?,
                );
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for (i, child) in arr.iter().enumerate() {
                let child_location = append_path(location, &[&i.to_string()]);
                out.push(resolve_node(child, doc_id, &child_location, depth, ctx)?);
            }
            Ok(Value::Array(out))
        }
        scalar => Ok(scalar.clone()),
    }
}

/// Resolve one reference node and produce its replacement.
fn resolve_ref(
    site: &Map<String, Value>,
    raw_ref: &str,
    doc_id: &Url,
    location: &str,
    depth: usize,
    ctx: &mut Context<'_>,
) -> Result<Value, DerefError> {
    let ptr = Pointer::parse(raw_ref);
    let target_id = ptr
        .canonicalize(doc_id)
        .map_err(|e| ctx.resolution_failure(raw_ref, location, e))?;
    let key: RefKey = (target_id, ptr.fragment.clone());

    // A ref into the root document whose target is this node or one of its
    // ancestors is already a back-reference: the target's output content
    // encloses this location, so expanding it would unroll the cycle one
    // level per run instead of leaving it fixed. Applies equally to cycles
    // in fresh input and to markers preserved by an earlier run, which is
    // what makes dereferencing its own output an identity.
    if key.0 == *ctx.base_id {
        let target_location = format!("#{}", key.1);
        if is_self_or_ancestor(&target_location, location) {
            return match ctx.options.circular {
                CircularPolicy::Error => Err(DerefError::CycleRejected {
                    pointer: raw_ref.to_string(),
                    chain: ctx.chain_with(location),
                }),
                CircularPolicy::Preserve => {
                    debug!(pointer = raw_ref, location, "enclosing-node reference kept as back-reference");
                    ctx.circular_refs.push(location.to_string());
                    let mut marker = Map::new();
                    marker.insert("$ref".to_string(), Value::String(target_location));
                    Ok(Value::Object(marker))
                }
            };
        }
    }

    // Cycle: this exact target is already being resolved somewhere above us.
    if let Some((_, anchor)) = ctx.in_progress.iter().find(|(k, _)| *k == key) {
        return match ctx.options.circular {
            CircularPolicy::Error => Err(DerefError::CycleRejected {
                pointer: raw_ref.to_string(),
                chain: ctx.chain_with(location),
            }),
            CircularPolicy::Preserve => {
                debug!(pointer = raw_ref, location, %anchor, "cycle preserved as back-reference");
                ctx.circular_refs.push(location.to_string());
                let mut marker = Map::new();
                marker.insert("$ref".to_string(), Value::String(anchor.clone()));
                Ok(Value::Object(marker))
            }
        };
    }

    // Memoized: the target was fully resolved earlier; share it rather than
    // resolving again.
    if let Some(cached) = ctx.resolved.get(&key) {
        let resolved = cached.clone();
        return substitute(site, resolved, doc_id, location, depth, ctx);
    }

    // Fresh target: load its document (cached per call), locate the raw
    // node, and dereference its content before substituting.
    let raw_target = {
        if !ctx.documents.contains_key(&key.0) {
            let doc = ctx.loader.load(&key.0).map_err(|source| {
                ctx.resolution_failure(
                    raw_ref,
                    location,
                    ResolutionError::UnresolvableReference {
                        pointer: raw_ref.to_string(),
                        source,
                    },
                )
            })?;
            ctx.documents.insert(key.0.clone(), doc);
        }
        let doc = &ctx.documents[&key.0];
        pointer::lookup(doc, &key.1)
            .map_err(|source| ctx.resolution_failure(raw_ref, location, source))?
            .clone()
    };

    ctx.in_progress.push((key.clone(), location.to_string()));
    let resolved = resolve_node(&raw_target, &key.0, location, depth + 1, ctx)?;
    ctx.in_progress.pop();
    ctx.resolved.insert(key, resolved.clone());

    substitute(site, resolved, doc_id, location, depth, ctx)
}

/// Whether `location` is `anchor` itself or sits beneath it, on segment
/// boundaries (both are escaped root-relative paths).
fn is_self_or_ancestor(anchor: &str, location: &str) -> bool {
    location == anchor
        || location
            .strip_prefix(anchor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Apply the sibling policy: the resolved content replaces the whole
/// reference node, or sibling keys are merged over it.
fn substitute(
    site: &Map<String, Value>,
    resolved: Value,
    doc_id: &Url,
    location: &str,
    depth: usize,
    ctx: &mut Context<'_>,
) -> Result<Value, DerefError> {
    if site.len() == 1 {
        return Ok(resolved);
    }

    match ctx.options.siblings {
        SiblingPolicy::Ignore => {
            debug!(location, "dropping sibling keys on reference node");
            Ok(resolved)
        }
        SiblingPolicy::Merge => {
            let Value::Object(mut merged) = resolved else {
                // Non-object content has nothing to merge onto.
                debug!(location, "resolved content is not an object; siblings dropped");
                return Ok(resolved);
            };
            for (k, v) in site {
                if k == "$ref" {
                    continue;
                }
                let sibling_location = append_path(location, &[k]);
                let v = resolve_node(v, doc_id, &sibling_location, depth, ctx)?;
                merged.insert(k.clone(), v);
            }
            Ok(Value::Object(merged))
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
