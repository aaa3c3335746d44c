//! Test doubles for the storage seams.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::storage::{ObjectConnection, ObjectMeta, Sleeper, TransportError};

/// A sleeper that records requested delays instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with no recorded sleeps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of sleeps requested so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.sleeps.lock().len()
    }

    /// Returns every requested delay, in order.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}

/// Wraps a connection and injects transient failures in front of it.
///
/// `failing_times(n)` fails the first `n` calls, whatever the operation.
/// `failing_deletes_after(k)` lets `k` deletes through and fails every
/// delete after that.
pub struct FlakyConnection<C> {
    inner: C,
    remaining_failures: AtomicUsize,
    deletes_allowed: Option<usize>,
    deletes_done: AtomicUsize,
    calls: AtomicUsize,
}

impl<C: ObjectConnection> FlakyConnection<C> {
    /// Wraps `inner` without injecting anything.
    #[must_use]
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            remaining_failures: AtomicUsize::new(0),
            deletes_allowed: None,
            deletes_done: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails the next `n` calls with a transient error.
    #[must_use]
    pub fn failing_times(self, n: usize) -> Self {
        self.remaining_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Fails every delete after the first `k`.
    #[must_use]
    pub fn failing_deletes_after(mut self, k: usize) -> Self {
        self.deletes_allowed = Some(k);
        self
    }

    /// Returns the number of calls made, failed ones included.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self, operation: &str) -> Result<(), TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(TransportError::transient(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

impl<C> fmt::Debug for FlakyConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlakyConnection")
            .field("remaining_failures", &self.remaining_failures.load(Ordering::SeqCst))
            .field("deletes_allowed", &self.deletes_allowed)
            .finish_non_exhaustive()
    }
}

impl<C: ObjectConnection> ObjectConnection for FlakyConnection<C> {
    fn put_container(&self, container: &str) -> Result<(), TransportError> {
        self.gate("put_container")?;
        self.inner.put_container(container)
    }

    fn get_container(
        &self,
        container: &str,
        prefix: &str,
        full_listing: bool,
    ) -> Result<Vec<ObjectMeta>, TransportError> {
        self.gate("get_container")?;
        self.inner.get_container(container, prefix, full_listing)
    }

    fn head_object(&self, container: &str, key: &str) -> Result<ObjectMeta, TransportError> {
        self.gate("head_object")?;
        self.inner.head_object(container, key)
    }

    fn put_object(
        &self,
        container: &str,
        key: &str,
        contents: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), TransportError> {
        self.gate("put_object")?;
        self.inner.put_object(container, key, contents, content_type)
    }

    fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, TransportError> {
        self.gate("get_object")?;
        self.inner.get_object(container, key)
    }

    fn copy_object(&self, container: &str, key: &str, destination: &str) -> Result<(), TransportError> {
        self.gate("copy_object")?;
        self.inner.copy_object(container, key, destination)
    }

    fn delete_object(&self, container: &str, key: &str) -> Result<(), TransportError> {
        self.gate("delete_object")?;
        if let Some(allowed) = self.deletes_allowed {
            if self.deletes_done.load(Ordering::SeqCst) >= allowed {
                return Err(TransportError::transient("injected delete failure"));
            }
        }
        self.inner.delete_object(container, key)?;
        self.deletes_done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;

    #[test]
    fn test_recording_sleeper() {
        let sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_millis(5));
        sleeper.sleep(Duration::from_millis(7));

        assert_eq!(sleeper.count(), 2);
        assert_eq!(sleeper.recorded()[1], Duration::from_millis(7));
    }

    #[test]
    fn test_flaky_connection_recovers() {
        let flaky = FlakyConnection::new(InMemoryObjectStore::new()).failing_times(2);

        assert!(flaky.put_container("c").unwrap_err().is_transient());
        assert!(flaky.put_container("c").is_err());
        assert!(flaky.put_container("c").is_ok());
        assert_eq!(flaky.calls(), 3);
    }

    #[test]
    fn test_flaky_deletes() {
        let store = InMemoryObjectStore::new();
        store.put_container("c").unwrap();
        store.put_object("c", "a", b"1", None).unwrap();
        store.put_object("c", "b", b"2", None).unwrap();
        let flaky = FlakyConnection::new(store.clone()).failing_deletes_after(1);

        assert!(flaky.delete_object("c", "a").is_ok());
        assert!(flaky.delete_object("c", "b").is_err());
        assert_eq!(store.keys("c"), vec!["b".to_string()]);
    }
}
