//! Resource text loading.
//!
//! The builder only requires a `fetch(uri) -> text` capability. A fetch
//! failure for an imported resource is non-fatal — the resource parses to
//! nothing — while a failure surfaced from a caller's own loader use is the
//! caller's to handle.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A loader-level fetch failure.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("not found: {uri}")]
    NotFound { uri: String },
    #[error("failed to read '{uri}': {source}")]
    Read {
        uri: String,
        #[source]
        source: io::Error,
    },
}

/// Fetches resource text by URI, synchronously or asynchronously.
#[async_trait(?Send)]
pub trait Loader {
    fn fetch_sync(&self, uri: &str) -> Result<String, IoError>;

    async fn fetch_async(&self, uri: &str) -> Result<String, IoError>;
}

/// Reads resources from files under a root directory.
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileLoader { root: root.into() }
    }

    fn read(&self, uri: &str) -> Result<String, IoError> {
        let path = self.root.join(uri);
        fs::read_to_string(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                IoError::NotFound {
                    uri: uri.to_string(),
                }
            } else {
                IoError::Read {
                    uri: uri.to_string(),
                    source: err,
                }
            }
        })
    }
}

#[async_trait(?Send)]
impl Loader for FileLoader {
    fn fetch_sync(&self, uri: &str) -> Result<String, IoError> {
        self.read(uri)
    }

    // File reads stay blocking; loaders backed by real async IO can supply
    // their own implementation.
    async fn fetch_async(&self, uri: &str) -> Result<String, IoError> {
        self.read(uri)
    }
}

/// Serves resources from an in-memory map.
#[derive(Default)]
pub struct MemoryLoader {
    sources: BTreeMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    pub fn add(&mut self, uri: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.sources.insert(uri.into(), text.into());
        self
    }

    fn lookup(&self, uri: &str) -> Result<String, IoError> {
        self.sources
            .get(uri)
            .cloned()
            .ok_or_else(|| IoError::NotFound {
                uri: uri.to_string(),
            })
    }
}

#[async_trait(?Send)]
impl Loader for MemoryLoader {
    fn fetch_sync(&self, uri: &str) -> Result<String, IoError> {
        self.lookup(uri)
    }

    async fn fetch_async(&self, uri: &str) -> Result<String, IoError> {
        self.lookup(uri)
    }
}
