//! Local filesystem object store.
//!
//! Each container is a directory under the root and each object key is a
//! forward-slash path relative to it. Directories are created on write and
//! pruned when they become empty, so folders stay implicit as in a blob store.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use super::memory::DEFAULT_PAGE_SIZE;
use super::transport::{Connector, ObjectConnection, ObjectMeta, TransportError};

/// Connects to a directory tree acting as an object store.
#[derive(Debug, Clone)]
pub struct FilesystemConnector {
    root: PathBuf,
    page_size: usize,
}

impl FilesystemConnector {
    /// Creates a connector rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many objects a non-exhaustive listing returns.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl Connector for FilesystemConnector {
    fn connect(&self) -> Result<Arc<dyn ObjectConnection>, TransportError> {
        if !self.root.is_dir() {
            return Err(TransportError::transient(format!(
                "storage root {} is not a directory",
                self.root.display()
            )));
        }
        Ok(Arc::new(FilesystemConnection {
            root: self.root.clone(),
            page_size: self.page_size,
        }))
    }
}

/// A connection to a [`FilesystemConnector`] root.
#[derive(Debug, Clone)]
pub struct FilesystemConnection {
    root: PathBuf,
    page_size: usize,
}

/// Maps an I/O failure on `key` to a transport error naming the key.
fn io_error(key: &str, err: &io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::NotFound {
        TransportError::NotFound(key.to_string())
    } else {
        TransportError::transient(format!("{key}: {err}"))
    }
}

/// Listing metadata from the file's inode alone; the hash is left empty.
fn listed_meta(key: String, metadata: &fs::Metadata) -> ObjectMeta {
    ObjectMeta {
        name: key,
        bytes: metadata.len(),
        hash: String::new(),
        content_type: None,
        last_modified: metadata.modified().map_or_else(|_| Utc::now(), Into::into),
    }
}

/// Collects objects under `dir` whose key starts with `prefix`.
///
/// Folders that cannot contain a match are skipped, and the walk stops once
/// `limit` objects are found. Entries that vanish or dangle mid-walk are
/// ignored.
fn walk(
    dir: &Path,
    dir_key: &str,
    prefix: &str,
    limit: Option<usize>,
    out: &mut Vec<ObjectMeta>,
) -> Result<(), TransportError> {
    let mut entries: Vec<fs::DirEntry> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(Result::ok).collect(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_error(dir_key, &err)),
    };
    entries.sort_by_key(fs::DirEntry::file_name);

    for entry in entries {
        if limit.is_some_and(|limit| out.len() >= limit) {
            break;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if dir_key.is_empty() {
            name
        } else {
            format!("{dir_key}/{name}")
        };
        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(io_error(&key, &err)),
        };

        if metadata.is_dir() {
            let folder = format!("{key}/");
            if folder.starts_with(prefix) || prefix.starts_with(&folder) {
                walk(&path, &key, prefix, limit, out)?;
            }
        } else if key.starts_with(prefix) {
            out.push(listed_meta(key, &metadata));
        }
    }
    Ok(())
}

impl FilesystemConnection {
    fn container_dir(&self, container: &str) -> Result<PathBuf, TransportError> {
        let dir = self.root.join(checked_relative(container)?);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(TransportError::NotFound(container.to_string()))
        }
    }

    fn object_path(&self, container: &str, key: &str) -> Result<PathBuf, TransportError> {
        Ok(self.container_dir(container)?.join(checked_relative(key)?))
    }

    fn prune_empty_parents(container_dir: &Path, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == container_dir || fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

/// Rejects absolute keys and parent-directory components.
fn checked_relative(key: &str) -> Result<&Path, TransportError> {
    let path = Path::new(key);
    let safe = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe && !key.is_empty() {
        Ok(path)
    } else {
        Err(TransportError::NotFound(key.to_string()))
    }
}

fn ensure_parent(path: &Path, key: &str) -> Result<(), TransportError> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| io_error(key, &e)),
        None => Ok(()),
    }
}

impl ObjectConnection for FilesystemConnection {
    fn put_container(&self, container: &str) -> Result<(), TransportError> {
        fs::create_dir_all(self.root.join(checked_relative(container)?))
            .map_err(|e| io_error(container, &e))
    }

    fn get_container(
        &self,
        container: &str,
        prefix: &str,
        full_listing: bool,
    ) -> Result<Vec<ObjectMeta>, TransportError> {
        let dir = self.container_dir(container)?;
        let limit = (!full_listing).then_some(self.page_size);
        let mut listed = Vec::new();
        walk(&dir, "", prefix, limit, &mut listed)?;
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    fn head_object(&self, container: &str, key: &str) -> Result<ObjectMeta, TransportError> {
        let path = self.object_path(container, key)?;
        if !path.is_file() {
            return Err(TransportError::NotFound(key.to_string()));
        }
        let contents = fs::read(&path).map_err(|e| io_error(key, &e))?;
        let mut meta = ObjectMeta::for_contents(key, &contents, None);
        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified()) {
            meta.last_modified = modified.into();
        }
        Ok(meta)
    }

    fn put_object(
        &self,
        container: &str,
        key: &str,
        contents: &[u8],
        _content_type: Option<&str>,
    ) -> Result<(), TransportError> {
        let path = self.object_path(container, key)?;
        ensure_parent(&path, key)?;
        fs::write(path, contents).map_err(|e| io_error(key, &e))
    }

    fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, TransportError> {
        let path = self.object_path(container, key)?;
        if !path.is_file() {
            return Err(TransportError::NotFound(key.to_string()));
        }
        fs::read(path).map_err(|e| io_error(key, &e))
    }

    fn copy_object(&self, container: &str, key: &str, destination: &str) -> Result<(), TransportError> {
        let source = self.object_path(container, key)?;
        if !source.is_file() {
            return Err(TransportError::NotFound(key.to_string()));
        }
        let target = self.object_path(container, destination)?;
        ensure_parent(&target, destination)?;
        fs::copy(source, target).map_err(|e| io_error(key, &e))?;
        Ok(())
    }

    fn delete_object(&self, container: &str, key: &str) -> Result<(), TransportError> {
        let dir = self.container_dir(container)?;
        let path = dir.join(checked_relative(key)?);
        if !path.is_file() {
            return Err(TransportError::NotFound(key.to_string()));
        }
        fs::remove_file(&path).map_err(|e| io_error(key, &e))?;
        Self::prune_empty_parents(&dir, &path);
        Ok(())
    }
}
