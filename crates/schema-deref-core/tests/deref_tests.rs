//! End-to-end dereference scenarios: multi-document resolution, cycle
//! handling, determinism, and failure behavior, driven through the public
//! API with an in-memory loader.

use std::sync::atomic::{AtomicUsize, Ordering};

use schema_deref_core::{
    default_document_id, dereference, find_references, CircularPolicy, DerefError, DerefOptions,
    DocumentLoader, InMemoryLoader, LoadError, ResolutionError,
};
use serde_json::{json, Value};
use url::Url;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn deref_root(document: &Value, loader: &dyn DocumentLoader) -> Result<Value, DerefError> {
    dereference(document, &default_document_id(), loader, &DerefOptions::default())
        .map(|r| r.document)
}

fn doc_id(name: &str) -> Url {
    default_document_id().join(name).unwrap()
}

/// Loader wrapper that counts how many loads actually reach the source.
struct CountingLoader {
    inner: InMemoryLoader,
    loads: AtomicUsize,
}

impl CountingLoader {
    fn new(inner: InMemoryLoader) -> Self {
        Self {
            inner,
            loads: AtomicUsize::new(0),
        }
    }
}

impl DocumentLoader for CountingLoader {
    fn load(&self, id: &Url) -> Result<Value, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(id)
    }
}

// ── Property 1: acyclic schemas come out with no $ref keys ──────────────────

#[test]
fn test_acyclic_output_contains_no_refs() {
    let document = json!({
        "type": "object",
        "properties": {
            "user": { "$ref": "#/$defs/User" },
            "tags": { "items": { "$ref": "#/$defs/Tag" } }
        },
        "$defs": {
            "User": {
                "type": "object",
                "properties": { "tag": { "$ref": "#/$defs/Tag" } }
            },
            "Tag": { "type": "string" }
        }
    });

    let result = deref_root(&document, &InMemoryLoader::new()).unwrap();
    assert_eq!(
        find_references(&result).count(),
        0,
        "acyclic output must contain no reference nodes"
    );
    assert_eq!(
        result["properties"]["user"]["properties"]["tag"],
        json!({ "type": "string" })
    );
}

// ── Property 2: idempotence ─────────────────────────────────────────────────

#[test]
fn test_dereference_is_idempotent() {
    let document = json!({
        "properties": { "a": { "$ref": "#/$defs/A" } },
        "$defs": { "A": { "type": "number" } }
    });

    let once = deref_root(&document, &InMemoryLoader::new()).unwrap();
    let twice = deref_root(&once, &InMemoryLoader::new()).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_cycle_preserved_output_is_idempotent() {
    // Re-running over output containing back-references must return it
    // unchanged, not unroll each cycle one more level. In-place directory
    // processing makes repeated runs on one file a normal workflow.
    let document = json!({
        "properties": { "child": { "$ref": "#/$defs/Node" } },
        "$defs": {
            "Node": { "properties": { "child": { "$ref": "#/$defs/Node" } } }
        }
    });

    let once = deref_root(&document, &InMemoryLoader::new()).unwrap();
    let twice = deref_root(&once, &InMemoryLoader::new()).unwrap();
    assert_eq!(once, twice);

    let thrice = deref_root(&twice, &InMemoryLoader::new()).unwrap();
    assert_eq!(twice, thrice);
}

// ── Property 3: cycle safety ────────────────────────────────────────────────

#[test]
fn test_mutual_cycle_preserve_terminates_with_back_reference() {
    let document = json!({
        "$defs": {
            "A": { "properties": { "b": { "$ref": "#/$defs/B" } } },
            "B": { "properties": { "a": { "$ref": "#/$defs/A" } } }
        }
    });

    let result = dereference(
        &document,
        &default_document_id(),
        &InMemoryLoader::new(),
        &DerefOptions::default(),
    )
    .unwrap();

    assert!(!result.circular_refs.is_empty());
    // Whatever references remain are internal back-references, resolvable
    // against the output document itself.
    for site in find_references(&result.document) {
        assert!(site.target.starts_with('#'), "external ref survived: {}", site.target);
    }
}

#[test]
fn test_mutual_cycle_error_policy_rejects() {
    let document = json!({
        "$defs": {
            "A": { "items": { "$ref": "#/$defs/B" } },
            "B": { "items": { "$ref": "#/$defs/A" } }
        }
    });
    let options = DerefOptions {
        circular: CircularPolicy::Error,
        ..DerefOptions::default()
    };

    let err = dereference(
        &document,
        &default_document_id(),
        &InMemoryLoader::new(),
        &options,
    )
    .unwrap_err();
    assert!(matches!(err, DerefError::CycleRejected { .. }));
}

// ── Property 4: determinism ─────────────────────────────────────────────────

#[test]
fn test_output_is_byte_identical_across_runs() {
    let document = json!({
        "anyOf": [
            { "$ref": "#/$defs/X" },
            { "$ref": "remote.json#/y" },
            { "$ref": "#/$defs/Rec" }
        ],
        "$defs": {
            "X": { "type": "string" },
            "Rec": { "items": { "$ref": "#/$defs/Rec" } }
        }
    });
    let mut loader = InMemoryLoader::new();
    loader.insert(doc_id("remote.json"), json!({"y": { "type": "integer" }}));

    let a = deref_root(&document, &loader).unwrap();
    let b = deref_root(&document, &loader).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// ── Property 5: dangling reference ──────────────────────────────────────────

#[test]
fn test_dangling_ref_is_invalid_pointer_not_partial_output() {
    let document = json!({ "a": { "$ref": "#/missing" } });

    let err = deref_root(&document, &InMemoryLoader::new()).unwrap_err();
    match err {
        DerefError::Resolution { source, .. } => {
            assert!(matches!(source, ResolutionError::InvalidPointer { .. }));
        }
        other => panic!("expected Resolution, got: {other:?}"),
    }
}

// ── Property 6: cross-document resolution, loaded exactly once ──────────────

#[test]
fn test_cross_document_ref_inlined() {
    let document = json!({ "a": { "$ref": "b.json#/x" } });
    let mut inner = InMemoryLoader::new();
    inner.insert(doc_id("b.json"), json!({ "x": { "type": "string" } }));

    let result = deref_root(&document, &inner).unwrap();
    assert_eq!(result["a"], json!({ "type": "string" }));
}

#[test]
fn test_external_document_loaded_exactly_once() {
    let document = json!({
        "a": { "$ref": "b.json#/x" },
        "b": { "$ref": "b.json#/x" },
        "c": { "$ref": "b.json#/other" }
    });
    let mut inner = InMemoryLoader::new();
    inner.insert(
        doc_id("b.json"),
        json!({ "x": { "type": "string" }, "other": { "type": "null" } }),
    );
    let loader = CountingLoader::new(inner);

    let result = deref_root(&document, &loader).unwrap();
    assert_eq!(result["a"], json!({ "type": "string" }));
    assert_eq!(result["c"], json!({ "type": "null" }));
    assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
}

// ── Relative reference chains across nested documents ───────────────────────

#[test]
fn test_relative_refs_resolve_against_owning_document() {
    // root → nested/a.json → b.json must land on nested/b.json, not /b.json.
    let document = json!({ "entry": { "$ref": "nested/a.json#/here" } });
    let mut loader = InMemoryLoader::new();
    loader.insert(
        doc_id("nested/a.json"),
        json!({ "here": { "$ref": "b.json#/leaf" } }),
    );
    loader.insert(doc_id("nested/b.json"), json!({ "leaf": { "type": "boolean" } }));

    let result = deref_root(&document, &loader).unwrap();
    assert_eq!(result["entry"], json!({ "type": "boolean" }));
}

#[test]
fn test_cross_document_cycle_preserved() {
    let document = json!({ "a": { "$ref": "b.json#/back" } });
    let mut loader = InMemoryLoader::new();
    loader.insert(
        doc_id("b.json"),
        json!({ "back": { "items": { "$ref": "b.json#/back" } } }),
    );

    let result = dereference(
        &document,
        &default_document_id(),
        &loader,
        &DerefOptions::default(),
    )
    .unwrap();
    assert_eq!(result.circular_refs.len(), 1);
    // The preserved marker points into the output document, not at b.json.
    let marker = result.document["a"]["items"]["$ref"].as_str().unwrap();
    assert_eq!(marker, "#/a");
}

// ── Failure propagation from the loader ─────────────────────────────────────

#[test]
fn test_parse_failure_surfaces_through_deref_error() {
    struct BrokenLoader;
    impl DocumentLoader for BrokenLoader {
        fn load(&self, id: &Url) -> Result<Value, LoadError> {
            let bad: Result<Value, _> = serde_json::from_str("{not json");
            Err(LoadError::ParseFailure {
                id: id.to_string(),
                source: bad.unwrap_err(),
            })
        }
    }

    let document = json!({ "a": { "$ref": "b.json#/x" } });
    let err = deref_root(&document, &BrokenLoader).unwrap_err();
    match err {
        DerefError::Resolution { source, .. } => match source {
            ResolutionError::UnresolvableReference { source, .. } => {
                assert!(matches!(source, LoadError::ParseFailure { .. }));
            }
            other => panic!("expected UnresolvableReference, got: {other:?}"),
        },
        other => panic!("expected Resolution, got: {other:?}"),
    }
}
