//! Fault-tolerant object storage.
//!
//! This module provides:
//! - The single-attempt transport capability ([`ObjectConnection`], [`Connector`])
//! - A retry policy with configurable backoff
//! - [`StorageManager`], the retrying client every file operation goes through
//! - In-memory and filesystem backends
//! - Path conventions and upload path validation

mod client;
mod filesystem;
mod memory;
pub mod paths;
mod retry;
pub mod sanitize;
mod transport;

pub use client::StorageManager;
pub use filesystem::{FilesystemConnection, FilesystemConnector};
pub use memory::{InMemoryObjectStore, DEFAULT_PAGE_SIZE};
pub use retry::{
    BackoffStrategy, JitterStrategy, RetryConfig, RetryPolicy, RetryPredicate, Sleeper,
    ThreadSleeper,
};
pub use transport::{content_hash, Connector, ObjectConnection, ObjectMeta, TransportError};

use crate::config::{StorageBackend, StorageSettings};
use crate::errors::StorageError;
use std::sync::Arc;

/// Builds a storage client for the configured backend and makes sure its
/// container exists.
pub fn connect_storage(settings: &StorageSettings) -> Result<StorageManager, StorageError> {
    let connector: Arc<dyn Connector> = match settings.backend {
        StorageBackend::Filesystem => Arc::new(FilesystemConnector::new(&settings.root_dir)),
        StorageBackend::Memory => Arc::new(InMemoryObjectStore::new()),
    };
    let manager = StorageManager::new(&settings.container_name, connector)
        .with_retry_policy(RetryPolicy::new(settings.retry.clone()));
    manager.create_container()?;

    tracing::info!(
        backend = ?settings.backend,
        container = %settings.container_name,
        "Connected to storage"
    );
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_memory_storage() {
        let settings = StorageSettings {
            backend: StorageBackend::Memory,
            ..StorageSettings::default()
        };
        let manager = connect_storage(&settings).unwrap();

        manager.upload_obj("home/foo/a.txt", b"a", None).unwrap();
        assert_eq!(manager.container_name(), "users");
        assert!(manager.obj_exists("home/foo/a.txt").unwrap());
    }

    #[test]
    fn test_connect_filesystem_storage() {
        let root = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            backend: StorageBackend::Filesystem,
            root_dir: root.path().to_path_buf(),
            ..StorageSettings::default()
        };
        let manager = connect_storage(&settings).unwrap();

        manager.upload_obj("home/foo/a.txt", b"a", None).unwrap();
        assert!(root.path().join("users/home/foo/a.txt").is_file());
    }
}
