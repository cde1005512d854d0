//! Reference discovery.
//!
//! [`find_references`] walks a document depth-first in pre-order and lazily
//! yields every reference node: parents before children, object keys in
//! insertion order, array elements by ascending index. The order is what
//! makes substitution deterministic across runs on identical input.
//!
//! The walker does not descend beneath a reference node: whatever sits under
//! (or beside) a `$ref` is replaced wholesale when the reference resolves.

use serde_json::Value;

use crate::pointer::append_path;

/// One discovered reference node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefSite {
    /// Root-relative location of the reference node (e.g. `#/properties/a`).
    pub location: String,
    /// The raw `$ref` string at that location.
    pub target: String,
}

/// Lazily enumerate every reference node in `document`.
///
/// The iterator is restartable: calling this again produces a fresh walk of
/// the document's current state.
pub fn find_references(document: &Value) -> RefSites<'_> {
    RefSites {
        stack: vec![("#".to_string(), document)],
    }
}

/// Iterator returned by [`find_references`].
pub struct RefSites<'a> {
    // Pending nodes, pushed in reverse so pre-order pops first.
    stack: Vec<(String, &'a Value)>,
}

impl<'a> Iterator for RefSites<'a> {
    type Item = RefSite;

    fn next(&mut self) -> Option<RefSite> {
        while let Some((location, node)) = self.stack.pop() {
            match node {
                Value::Object(obj) => {
                    if let Some(target) = obj.get("$ref").and_then(Value::as_str) {
                        return Some(RefSite {
                            location,
                            target: target.to_string(),
                        });
                    }
                    for (key, child) in obj.iter().rev() {
                        if child.is_object() || child.is_array() {
                            self.stack.push((append_path(&location, &[key]), child));
                        }
                    }
                }
                Value::Array(arr) => {
                    for (i, child) in arr.iter().enumerate().rev() {
                        if child.is_object() || child.is_array() {
                            self.stack
                                .push((append_path(&location, &[&i.to_string()]), child));
                        }
                    }
                }
                _ => {}
            }
        }
        None
    }
}

// ===========================================================================
// Tests
// ===========================================================================
