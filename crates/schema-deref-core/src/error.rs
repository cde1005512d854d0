//! Error types for document loading, pointer resolution, and dereferencing.
//!
//! The taxonomy is layered: [`LoadError`] comes out of a
//! [`DocumentLoader`](crate::loader::DocumentLoader), [`ResolutionError`]
//! out of pointer resolution, and [`DerefError`] wraps either with the chain
//! of locations that led to the failure. Nothing is swallowed on the way up.

use thiserror::Error;

/// Errors raised when loading a document by canonical identifier.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("unsupported scheme '{scheme}' in document identifier: {id}")]
    UnsupportedScheme { id: String, scheme: String },

    #[error("document {id} is not valid JSON")]
    ParseFailure {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised when resolving a single `$ref` pointer.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The target document could not be loaded.
    #[error("unresolvable reference: {pointer}")]
    UnresolvableReference {
        pointer: String,
        #[source]
        source: LoadError,
    },

    /// The fragment is malformed, or a segment addresses a path that does
    /// not exist in the target document.
    #[error("invalid pointer {pointer}: {reason}")]
    InvalidPointer { pointer: String, reason: String },
}

/// Errors raised by [`dereference`](crate::deref::dereference).
///
/// `chain` is the stack of output locations that were being resolved when the
/// failure occurred, outermost first, for diagnostics.
#[derive(Debug, Error)]
pub enum DerefError {
    #[error("failed to resolve {pointer} at {}", chain.join(" -> "))]
    Resolution {
        pointer: String,
        chain: Vec<String>,
        #[source]
        source: ResolutionError,
    },

    /// A reference cycle was found and the circular policy is
    /// [`Error`](crate::config::CircularPolicy::Error).
    #[error("reference cycle rejected at {pointer} ({})", chain.join(" -> "))]
    CycleRejected { pointer: String, chain: Vec<String> },

    /// Reference-hop recursion exceeded the configured bound.
    #[error("recursion depth exceeded at {location} (max: {max_depth})")]
    DepthExceeded { location: String, max_depth: usize },
}
