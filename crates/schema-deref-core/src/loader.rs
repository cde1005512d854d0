//! Document loading and caching.
//!
//! [`DocumentLoader`] abstracts over where referenced documents come from:
//! the filesystem ([`FsLoader`]), a pre-registered map ([`InMemoryLoader`]),
//! or anything the caller injects. The dereference engine holds its own
//! per-call cache, so a loader is only asked once per canonical identifier
//! per call; [`SharedCacheLoader`] adds an optional cache that survives
//! across calls.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::LoadError;

/// Canonical identifier used for in-memory root documents with no natural
/// identity of their own.
///
/// A `file:` scheme so that `Url::join` works for relative document parts.
const DEFAULT_DOCUMENT_ID: &str = "file:///schema.json";

/// The synthetic identifier for a root document passed directly in memory.
pub fn default_document_id() -> Url {
    Url::parse(DEFAULT_DOCUMENT_ID).expect("DEFAULT_DOCUMENT_ID is a valid URL")
}

/// Source of referenced documents, keyed by canonical identifier.
pub trait DocumentLoader {
    /// Load and parse the document identified by `id`.
    fn load(&self, id: &Url) -> Result<Value, LoadError>;
}

// ---------------------------------------------------------------------------
// FsLoader
// ---------------------------------------------------------------------------

/// Loads `file:` documents from the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl FsLoader {
    /// Canonical `file:` identifier for a path on disk.
    ///
    /// The path must exist: canonicalization resolves symlinks and relative
    /// components so two spellings of one file share a cache entry.
    pub fn document_id(path: &Path) -> Result<Url, LoadError> {
        let canonical = path.canonicalize().map_err(|_| LoadError::NotFound {
            id: path.display().to_string(),
        })?;
        Url::from_file_path(&canonical).map_err(|_| LoadError::NotFound {
            id: path.display().to_string(),
        })
    }
}

impl DocumentLoader for FsLoader {
    fn load(&self, id: &Url) -> Result<Value, LoadError> {
        if id.scheme() != "file" {
            return Err(LoadError::UnsupportedScheme {
                id: id.to_string(),
                scheme: id.scheme().to_string(),
            });
        }
        let path = id.to_file_path().map_err(|_| LoadError::NotFound {
            id: id.to_string(),
        })?;
        let file = File::open(&path).map_err(|_| LoadError::NotFound {
            id: id.to_string(),
        })?;
        debug!(id = %id, "loading document from disk");
        serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::ParseFailure {
            id: id.to_string(),
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// InMemoryLoader
// ---------------------------------------------------------------------------

/// Serves documents from a pre-registered map. Deterministic by construction;
/// the loader used throughout the test suite.
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    documents: HashMap<Url, Value>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document under a canonical identifier.
    pub fn insert(&mut self, id: Url, document: Value) -> &mut Self {
        self.documents.insert(id, document);
        self
    }
}

impl DocumentLoader for InMemoryLoader {
    fn load(&self, id: &Url) -> Result<Value, LoadError> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                id: id.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// SharedCacheLoader
// ---------------------------------------------------------------------------

/// Wraps a loader with a cache that persists across dereference calls and
/// may be shared between threads.
///
/// The lock is held across the inner load, so concurrent requests for the
/// same identifier collapse into a single load whose result fans out; two
/// callers never observe two distinct parses of one document.
#[derive(Debug, Default)]
pub struct SharedCacheLoader<L> {
    inner: L,
    cache: Mutex<HashMap<Url, Value>>,
}

impl<L> SharedCacheLoader<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<L: DocumentLoader> DocumentLoader for SharedCacheLoader<L> {
    fn load(&self, id: &Url) -> Result<Value, LoadError> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(doc) = cache.get(id) {
            debug!(id = %id, "shared cache hit");
            return Ok(doc.clone());
        }
        let doc = self.inner.load(id)?;
        cache.insert(id.clone(), doc.clone());
        Ok(doc)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
