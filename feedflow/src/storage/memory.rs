//! In-memory object store.
//!
//! Useful for development and tests. Listings can be made to lag behind
//! writes to reproduce the eventual consistency of real object stores.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::transport::{Connector, ObjectConnection, ObjectMeta, TransportError};

/// Default number of entries per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 10_000;

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ObjectMeta,
    contents: Vec<u8>,
    /// Listing call number from which the object shows up in listings.
    listed_from: u64,
}

#[derive(Debug, Default)]
struct Containers {
    objects: HashMap<String, BTreeMap<String, StoredObject>>,
}

/// A thread-safe in-memory blob store.
///
/// Cloning shares the underlying storage.
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore {
    inner: Arc<RwLock<Containers>>,
    page_size: usize,
    listing_lag: u64,
    listing_calls: Arc<AtomicU64>,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Containers::default())),
            page_size: DEFAULT_PAGE_SIZE,
            listing_lag: 0,
            listing_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sets the listing page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes new objects invisible to the next `lag` listing calls.
    #[must_use]
    pub fn with_listing_lag(mut self, lag: u64) -> Self {
        self.listing_lag = lag;
        self
    }

    /// Returns how many listing calls the store has served.
    #[must_use]
    pub fn listing_calls(&self) -> u64 {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Returns every key in a container, ignoring listing lag.
    #[must_use]
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.inner
            .read()
            .objects
            .get(container)
            .map(|objs| objs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn visible_from(&self) -> u64 {
        self.listing_calls.load(Ordering::SeqCst) + self.listing_lag
    }
}

impl ObjectConnection for InMemoryObjectStore {
    fn put_container(&self, container: &str) -> Result<(), TransportError> {
        self.inner.write().objects.entry(container.to_string()).or_default();
        Ok(())
    }

    fn get_container(
        &self,
        container: &str,
        prefix: &str,
        full_listing: bool,
    ) -> Result<Vec<ObjectMeta>, TransportError> {
        let call = self.listing_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = self.inner.read();
        let objects = guard
            .objects
            .get(container)
            .ok_or_else(|| TransportError::NotFound(container.to_string()))?;

        let visible = objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, obj)| obj.listed_from <= call)
            .map(|(_, obj)| obj.meta.clone());

        Ok(if full_listing {
            visible.collect()
        } else {
            visible.take(self.page_size).collect()
        })
    }

    fn head_object(&self, container: &str, key: &str) -> Result<ObjectMeta, TransportError> {
        self.inner
            .read()
            .objects
            .get(container)
            .and_then(|objs| objs.get(key))
            .map(|obj| obj.meta.clone())
            .ok_or_else(|| TransportError::NotFound(key.to_string()))
    }

    fn put_object(
        &self,
        container: &str,
        key: &str,
        contents: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), TransportError> {
        let listed_from = self.visible_from() + 1;
        let mut guard = self.inner.write();
        let objects = guard
            .objects
            .get_mut(container)
            .ok_or_else(|| TransportError::NotFound(container.to_string()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                meta: ObjectMeta::for_contents(key, contents, content_type),
                contents: contents.to_vec(),
                listed_from,
            },
        );
        Ok(())
    }

    fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, TransportError> {
        self.inner
            .read()
            .objects
            .get(container)
            .and_then(|objs| objs.get(key))
            .map(|obj| obj.contents.clone())
            .ok_or_else(|| TransportError::NotFound(key.to_string()))
    }

    fn copy_object(&self, container: &str, key: &str, destination: &str) -> Result<(), TransportError> {
        let listed_from = self.visible_from() + 1;
        let mut guard = self.inner.write();
        let objects = guard
            .objects
            .get_mut(container)
            .ok_or_else(|| TransportError::NotFound(container.to_string()))?;
        let source = objects
            .get(key)
            .ok_or_else(|| TransportError::NotFound(key.to_string()))?;

        let mut meta = source.meta.clone();
        meta.name = destination.to_string();
        let copy = StoredObject {
            meta,
            contents: source.contents.clone(),
            listed_from,
        };
        objects.insert(destination.to_string(), copy);
        Ok(())
    }

    fn delete_object(&self, container: &str, key: &str) -> Result<(), TransportError> {
        self.inner
            .write()
            .objects
            .get_mut(container)
            .and_then(|objs| objs.remove(key))
            .map(|_| ())
            .ok_or_else(|| TransportError::NotFound(key.to_string()))
    }
}

impl Connector for InMemoryObjectStore {
    fn connect(&self) -> Result<Arc<dyn ObjectConnection>, TransportError> {
        Ok(Arc::new(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(keys: &[&str]) -> InMemoryObjectStore {
        let store = InMemoryObjectStore::new();
        store.put_container("users").unwrap();
        for key in keys {
            store.put_object("users", key, key.as_bytes(), None).unwrap();
        }
        store
    }

    #[test]
    fn test_listing_is_prefix_filtered_and_ordered() {
        let store = store_with(&["b/2", "a/1", "b/1", "c"]);
        let names: Vec<_> = store
            .get_container("users", "b/", true)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();

        assert_eq!(names, vec!["b/1", "b/2"]);
    }

    #[test]
    fn test_partial_listing_returns_first_page() {
        let store = store_with(&["p/1", "p/2", "p/3"]).with_page_size(2);

        assert_eq!(store.get_container("users", "p/", false).unwrap().len(), 2);
        assert_eq!(store.get_container("users", "p/", true).unwrap().len(), 3);
    }

    #[test]
    fn test_listing_lag_hides_new_objects() {
        let store = InMemoryObjectStore::new().with_listing_lag(2);
        store.put_container("users").unwrap();
        store.put_object("users", "out/a", b"a", None).unwrap();

        assert!(store.get_container("users", "out/", true).unwrap().is_empty());
        assert!(store.get_container("users", "out/", true).unwrap().is_empty());
        assert_eq!(store.get_container("users", "out/", true).unwrap().len(), 1);
        assert!(store.head_object("users", "out/a").is_ok());
    }

    #[test]
    fn test_missing_objects_are_not_found() {
        let store = store_with(&[]);

        assert!(store.head_object("users", "nope").unwrap_err().is_not_found());
        assert!(store.delete_object("users", "nope").unwrap_err().is_not_found());
        assert!(store.get_container("other", "x", true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_copy_keeps_contents() {
        let store = store_with(&["src/file.txt"]);
        store.copy_object("users", "src/file.txt", "dst/file.txt").unwrap();

        assert_eq!(store.get_object("users", "dst/file.txt").unwrap(), b"src/file.txt");
        assert_eq!(store.head_object("users", "dst/file.txt").unwrap().name, "dst/file.txt");
    }
}
