//! Reference pointer parsing and resolution.
//!
//! A reference string has the shape `[document]#[fragment]`: an optional
//! document part (relative or absolute identifier of the owning document)
//! and an RFC 6901 JSON Pointer fragment. `"#/definitions/foo"` addresses a
//! node in the current document; `"other.json#/bar"` addresses one in a
//! sibling file; `"other.json"` alone addresses a whole document.

use std::borrow::Cow;

use serde_json::Value;
use url::Url;

use crate::error::ResolutionError;

// ---------------------------------------------------------------------------
// RFC 6901 segment escaping
// ---------------------------------------------------------------------------

/// Escape a single path segment per RFC 6901.
///
/// - `~` → `~0`
/// - `/` → `~1`
///
/// Returns `Cow::Borrowed` when no escaping is needed (the common case).
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains('~') || segment.contains('/') {
        Cow::Owned(segment.replace('~', "~0").replace('/', "~1"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Unescape a single path segment per RFC 6901.
///
/// Order matters: unescape `~1` first to avoid double-unescaping.
pub fn unescape_segment(segment: &str) -> Cow<'_, str> {
    if segment.contains("~0") || segment.contains("~1") {
        Cow::Owned(segment.replace("~1", "/").replace("~0", "~"))
    } else {
        Cow::Borrowed(segment)
    }
}

/// Append escaped segments to a location path (e.g. `"#"` + `["a/b"]` →
/// `"#/a~1b"`). Used to build output locations during traversal.
pub fn append_path(parent: &str, segments: &[&str]) -> String {
    let mut path = parent.to_string();
    for segment in segments {
        path.push('/');
        path.push_str(&escape_segment(segment));
    }
    path
}

// ---------------------------------------------------------------------------
// Pointer
// ---------------------------------------------------------------------------

/// A parsed reference string: optional document part plus pointer fragment.
///
/// The fragment is stored without the leading `#`; an empty fragment refers
/// to the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    /// The document part before `#`, if any (e.g. `"other.json"`).
    pub document: Option<String>,
    /// The fragment after `#` (e.g. `"/definitions/foo"`), or empty.
    pub fragment: String,
}

impl Pointer {
    /// Split a raw reference string at the first `#`.
    ///
    /// `"#/a"` → no document part; `"b.json#/x"` → document `b.json`;
    /// `"b.json"` → document `b.json`, whole-document fragment.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('#') {
            Some((doc, fragment)) => Self {
                document: (!doc.is_empty()).then(|| doc.to_string()),
                fragment: fragment.to_string(),
            },
            None => Self {
                document: (!raw.is_empty()).then(|| raw.to_string()),
                fragment: String::new(),
            },
        }
    }

    /// Compute the canonical identifier of the document this pointer
    /// addresses, joining a relative document part against `base`.
    ///
    /// A fragment-only pointer stays within the base document. Joining is
    /// what makes chains of relative references across nested files land on
    /// the right target regardless of traversal depth.
    pub fn canonicalize(&self, base: &Url) -> Result<Url, ResolutionError> {
        match &self.document {
            None => Ok(base.clone()),
            Some(doc) => base.join(doc).map_err(|e| ResolutionError::InvalidPointer {
                pointer: self.to_string(),
                reason: format!("document part does not join against {base}: {e}"),
            }),
        }
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}",
            self.document.as_deref().unwrap_or(""),
            self.fragment
        )
    }
}

// ---------------------------------------------------------------------------
// Fragment lookup
// ---------------------------------------------------------------------------

/// Walk an RFC 6901 fragment against a document tree.
///
/// Fails with [`ResolutionError::InvalidPointer`] when the fragment is not
/// JSON Pointer syntax (e.g. an `$anchor`-style fragment) or a segment
/// addresses a missing key / out-of-range index, naming the failing segment.
pub fn lookup<'a>(document: &'a Value, fragment: &str) -> Result<&'a Value, ResolutionError> {
    if fragment.is_empty() {
        return Ok(document);
    }
    if !fragment.starts_with('/') {
        return Err(ResolutionError::InvalidPointer {
            pointer: format!("#{fragment}"),
            reason: "fragment is not a JSON Pointer (anchor-style fragments are not supported)"
                .to_string(),
        });
    }

    let mut current = document;
    let mut walked = String::new();
    for segment in fragment[1..].split('/') {
        let key = unescape_segment(segment);
        walked.push('/');
        walked.push_str(segment);
        current = match current {
            Value::Object(obj) => obj.get(key.as_ref()).ok_or_else(|| invalid(
                fragment,
                format!("no key '{key}' at #{walked}"),
            ))?,
            Value::Array(arr) => {
                let idx: usize = key.parse().map_err(|_| {
                    invalid(fragment, format!("'{key}' is not an array index at #{walked}"))
                })?;
                arr.get(idx).ok_or_else(|| {
                    invalid(fragment, format!("index {idx} out of range at #{walked}"))
                })?
            }
            _ => {
                return Err(invalid(
                    fragment,
                    format!("scalar node cannot be indexed at #{walked}"),
                ))
            }
        };
    }

    Ok(current)
}

fn invalid(fragment: &str, reason: String) -> ResolutionError {
    ResolutionError::InvalidPointer {
        pointer: format!("#{fragment}"),
        reason,
    }
}

// ===========================================================================
// Tests
// ===========================================================================
