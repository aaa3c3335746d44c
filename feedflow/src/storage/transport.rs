//! The object store capability the storage client is written against.
//!
//! Implementations perform exactly one attempt per call; retrying is the
//! client's job.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A single-attempt transport failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The container or object definitively does not exist (404-equivalent).
    #[error("not found: {0}")]
    NotFound(String),

    /// An ambiguous failure (network, timeout, 5xx); may succeed on retry.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl TransportError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    /// Returns true for a definitive absence.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the failure may go away on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Metadata for a stored object, as returned by listings and HEAD requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// The object key.
    pub name: String,
    /// Size in bytes.
    pub bytes: u64,
    /// MD5 hex digest of the contents. Empty in listings from backends
    /// that only compute it for HEAD requests.
    pub hash: String,
    /// Content type, when known.
    #[serde(default)]
    pub content_type: Option<String>,
    /// Last modification time.
    pub last_modified: DateTime<Utc>,
}

impl ObjectMeta {
    /// Builds metadata for the given contents, stamped now.
    #[must_use]
    pub fn for_contents(name: impl Into<String>, contents: &[u8], content_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            bytes: contents.len() as u64,
            hash: content_hash(contents),
            content_type: content_type.map(str::to_string),
            last_modified: Utc::now(),
        }
    }
}

/// Computes the MD5 hex digest stored as an object's hash.
#[must_use]
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(contents);
    hex::encode(hasher.finalize())
}

/// An established connection to a prefix-addressable blob store.
pub trait ObjectConnection: Send + Sync + fmt::Debug {
    /// Creates the container if it does not exist.
    fn put_container(&self, container: &str) -> Result<(), TransportError>;

    /// Lists objects whose key starts with `prefix`, in key order.
    ///
    /// When `full_listing` is false only the first page is returned.
    fn get_container(
        &self,
        container: &str,
        prefix: &str,
        full_listing: bool,
    ) -> Result<Vec<ObjectMeta>, TransportError>;

    /// Returns the object's metadata.
    fn head_object(&self, container: &str, key: &str) -> Result<ObjectMeta, TransportError>;

    /// Stores an object, replacing any existing one.
    fn put_object(
        &self,
        container: &str,
        key: &str,
        contents: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), TransportError>;

    /// Returns an object's contents.
    fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, TransportError>;

    /// Copies an object to another key in the same container.
    fn copy_object(&self, container: &str, key: &str, destination: &str) -> Result<(), TransportError>;

    /// Deletes an object.
    fn delete_object(&self, container: &str, key: &str) -> Result<(), TransportError>;
}

/// Establishes connections to an object store.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    /// Opens a new connection.
    fn connect(&self) -> Result<Arc<dyn ObjectConnection>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_classification() {
        assert!(TransportError::NotFound("x".into()).is_not_found());
        assert!(!TransportError::NotFound("x".into()).is_transient());
        assert!(TransportError::transient("reset").is_transient());
    }

    #[test]
    fn test_content_hash_is_md5_hex() {
        assert_eq!(content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
        let meta = ObjectMeta::for_contents("a.txt", b"abc", Some("text/plain"));
        assert_eq!(meta.bytes, 3);
        assert_eq!(meta.hash, "900150983cd24fb0d6963f7d28e17f72");
    }
}
