//! The retrying storage client.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::retry::RetryPolicy;
use super::sanitize::{self, SanitizeAction};
use super::transport::{Connector, ObjectConnection, ObjectMeta};
use crate::errors::StorageError;

/// Retrying access to one container of a blob store.
///
/// The connection is established lazily on first use and reused afterwards.
/// Every primitive runs under the same [`RetryPolicy`]; composite path
/// operations are sequences of primitives and are not transactional: if one
/// member fails, the objects already processed stay modified.
pub struct StorageManager {
    container_name: String,
    connector: Arc<dyn Connector>,
    connection: Mutex<Option<Arc<dyn ObjectConnection>>>,
    retry: RetryPolicy,
}

impl fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageManager")
            .field("container_name", &self.container_name)
            .field("connected", &self.connection.lock().is_some())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl StorageManager {
    /// Creates a client for `container_name` using the default retry policy.
    #[must_use]
    pub fn new(container_name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            container_name: container_name.into(),
            connector,
            connection: Mutex::new(None),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the container name.
    #[must_use]
    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn connection(&self) -> Result<Arc<dyn ObjectConnection>, StorageError> {
        let mut guard = self.connection.lock();
        if let Some(conn) = guard.as_ref() {
            return Ok(Arc::clone(conn));
        }
        let conn = self.retry.run("connect", || self.connector.connect())?;
        *guard = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Creates the storage container.
    pub fn create_container(&self) -> Result<(), StorageError> {
        let conn = self.connection()?;
        self.retry
            .run("create_container", || conn.put_container(&self.container_name))
    }

    fn list_meta(&self, path: &str, full_listing: bool) -> Result<Vec<ObjectMeta>, StorageError> {
        if path.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        self.retry.run("ls", || {
            conn.get_container(&self.container_name, path, full_listing)
        })
    }

    /// Returns every object key that starts with `path`.
    ///
    /// An empty `path` yields an empty listing without contacting the store.
    pub fn ls(&self, path: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .list_meta(path, true)?
            .into_iter()
            .map(|meta| meta.name)
            .collect())
    }

    /// Returns the metadata of every object under `path`.
    pub fn ls_meta(&self, path: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        self.list_meta(path, true)
    }

    /// Returns true if any object key starts with `path`.
    ///
    /// Only the first listing page is requested.
    pub fn path_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(!self.list_meta(path, false)?.is_empty())
    }

    /// Returns true if the object exists.
    pub fn obj_exists(&self, obj_path: &str) -> Result<bool, StorageError> {
        let conn = self.connection()?;
        match self
            .retry
            .run("obj_exists", || conn.head_object(&self.container_name, obj_path))
        {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Uploads an object.
    pub fn upload_obj(
        &self,
        obj_path: &str,
        contents: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let conn = self.connection()?;
        self.retry.run("upload_obj", || {
            conn.put_object(&self.container_name, obj_path, contents, content_type)
        })
    }

    /// Downloads an object's contents.
    pub fn download_obj(&self, obj_path: &str) -> Result<Vec<u8>, StorageError> {
        let conn = self.connection()?;
        self.retry
            .run("download_obj", || conn.get_object(&self.container_name, obj_path))
    }

    /// Copies an object to `dest_path` within the container.
    pub fn copy_obj(&self, obj_path: &str, dest_path: &str) -> Result<(), StorageError> {
        let conn = self.connection()?;
        let dest = dest_path.trim_start_matches('/');
        self.retry.run("copy_obj", || {
            conn.copy_object(&self.container_name, obj_path, dest)
        })
    }

    /// Deletes an object.
    pub fn delete_obj(&self, obj_path: &str) -> Result<(), StorageError> {
        let conn = self.connection()?;
        self.retry
            .run("delete_obj", || conn.delete_object(&self.container_name, obj_path))
    }

    /// Copies a listed object, returning false if it vanished since the listing.
    fn copy_member(&self, obj_path: &str, dest_path: &str) -> Result<bool, StorageError> {
        match self.copy_obj(obj_path, dest_path) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound { .. }) => {
                tracing::debug!(obj_path, "Listed object is gone, skipping copy");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes a listed object, returning false if it was already gone.
    fn delete_member(&self, obj_path: &str) -> Result<bool, StorageError> {
        match self.delete_obj(obj_path) {
            Ok(()) => Ok(true),
            Err(StorageError::NotFound { .. }) => {
                tracing::debug!(obj_path, "Listed object is already deleted");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Copies every object under `src` to the same relative key under `dst`.
    ///
    /// Objects removed by someone else after the listing are skipped.
    pub fn copy_path(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        for obj_path in self.ls(src)? {
            self.copy_member(&obj_path, &rebase(&obj_path, src, dst))?;
        }
        Ok(())
    }

    /// Moves every object under `src` to `dst`, one object at a time.
    ///
    /// Objects removed by someone else after the listing are skipped.
    pub fn move_path(&self, src: &str, dst: &str) -> Result<(), StorageError> {
        for obj_path in self.ls(src)? {
            if self.copy_member(&obj_path, &rebase(&obj_path, src, dst))? {
                self.delete_member(&obj_path)?;
            }
        }
        Ok(())
    }

    /// Deletes every object under `path`.
    ///
    /// Objects already removed after the listing count as deleted.
    pub fn delete_path(&self, path: &str) -> Result<(), StorageError> {
        for obj_path in self.ls(path)? {
            self.delete_member(&obj_path)?;
        }
        Ok(())
    }

    /// Removes commas from the paths of every object under `path`.
    ///
    /// Objects whose leaf name is only commas and whitespace are deleted, and
    /// folders named that way are dissolved into their parent. Returns the
    /// changed objects, original path to new path; deleted objects map to
    /// an empty string. If `path` names a single object, nothing is changed.
    /// Objects that vanish while this runs are left out of the result.
    pub fn sanitize_obj_names(&self, path: &str) -> Result<BTreeMap<String, String>, StorageError> {
        let mut new_obj_paths = BTreeMap::new();
        let listing = self.ls(path)?;

        if listing.len() == 1 && listing[0] == path {
            return Ok(new_obj_paths);
        }

        for obj_path in listing {
            match sanitize::plan(path, &obj_path) {
                SanitizeAction::Unchanged => {}
                SanitizeAction::Delete => {
                    if self.delete_member(&obj_path)? {
                        new_obj_paths.insert(obj_path, String::new());
                    }
                }
                SanitizeAction::Rename(new_obj_path) => {
                    if self.copy_member(&obj_path, &new_obj_path)? {
                        self.delete_member(&obj_path)?;
                        new_obj_paths.insert(obj_path, new_obj_path);
                    }
                }
            }
        }

        tracing::debug!(path, changed = new_obj_paths.len(), "Sanitized object names");
        Ok(new_obj_paths)
    }
}

fn rebase(obj_path: &str, src: &str, dst: &str) -> String {
    obj_path
        .strip_prefix(src)
        .map_or_else(|| obj_path.to_string(), |rest| format!("{dst}{rest}"))
}
