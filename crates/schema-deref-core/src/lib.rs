//! Resolve `$ref` pointers in JSON Schema documents.
//!
//! Authors split schemas across files and internal `$def` pointers;
//! downstream consumers often want one self-contained document. This crate
//! replaces every reference node with the content it points to — internal,
//! nested, and cross-file references alike — terminating cycles with
//! back-references instead of unbounded expansion.
//!
//! ## Usage
//!
//! ```rust
//! use schema_deref_core::{dereference, default_document_id, DerefOptions, InMemoryLoader};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": { "pet": { "$ref": "#/$defs/Pet" } },
//!     "$defs": { "Pet": { "type": "string" } }
//! });
//!
//! let loader = InMemoryLoader::new();
//! let result = dereference(
//!     &schema,
//!     &default_document_id(),
//!     &loader,
//!     &DerefOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(result.document["properties"]["pet"], json!({ "type": "string" }));
//! ```
//!
//! Cross-file references resolve through an injected
//! [`DocumentLoader`]: use [`FsLoader`] for `file:` identifiers, or
//! implement the trait for anything else. The [`walker`] module exposes the
//! reference-discovery iterator on its own for callers that only want to
//! inspect a document's references.

pub mod config;
pub mod deref;
pub mod error;
pub mod loader;
pub mod pointer;
pub mod walker;

pub use config::{CircularPolicy, DerefOptions, SiblingPolicy};
pub use deref::{dereference, DerefResult};
pub use error::{DerefError, LoadError, ResolutionError};
pub use loader::{
    default_document_id, DocumentLoader, FsLoader, InMemoryLoader, SharedCacheLoader,
};
pub use walker::{find_references, RefSite, RefSites};
