//! Configuration for dereferencing.

use serde::{Deserialize, Serialize};

/// How to handle a reference cycle discovered during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircularPolicy {
    /// Preserve the cycle as a back-reference: the reference node becomes a
    /// root-relative `$ref` pointing at the ancestor location currently
    /// being resolved (default).
    Preserve,
    /// Fail the whole operation with
    /// [`CycleRejected`](crate::error::DerefError::CycleRejected).
    Error,
}

/// How to handle keys that sit alongside `$ref` on a reference node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiblingPolicy {
    /// The resolved content fully replaces the reference node; sibling keys
    /// are discarded (default, per JSON Schema convention).
    Ignore,
    /// Sibling keys are laid over the resolved content, site values winning
    /// on conflict.
    ///
    /// Caveat when combined with [`CircularPolicy::Preserve`]: a merged
    /// sibling key can overwrite a subtree that a preserved back-reference
    /// elsewhere in the document points into. Back-reference targets are not
    /// re-anchored after the merge, so such a `$ref` then addresses the
    /// sibling's content rather than the resolved content it was recorded
    /// against.
    Merge,
}

/// Options for a dereference operation.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `max-depth`). This naming
/// convention is part of the public API contract for config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DerefOptions {
    /// Maximum number of reference hops before aborting with
    /// [`DepthExceeded`](crate::error::DerefError::DepthExceeded). Guards
    /// against pathological chains not caught by cycle detection.
    pub max_depth: usize,
    /// Cycle handling policy.
    pub circular: CircularPolicy,
    /// Handling of keys alongside `$ref` on a reference node.
    pub siblings: SiblingPolicy,
}

impl Default for DerefOptions {
    fn default() -> Self {
        Self {
            max_depth: 64,
            circular: CircularPolicy::Preserve,
            siblings: SiblingPolicy::Ignore,
        }
    }
}
