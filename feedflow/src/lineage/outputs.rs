//! Output file registration.
//!
//! Listings of a freshly written output folder may lag behind the files
//! the execution driver reports, so registration polls the folder until
//! the reported count shows up or the poll budget runs out. A short count
//! is accepted and logged.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;

use super::instance::InstanceId;
use super::tracker::LineageTracker;
use crate::config::OutputPollSettings;
use crate::errors::{FeedflowError, StorageError};
use crate::storage::{Sleeper, StorageManager};

/// The outcome of polling an output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRegistration {
    /// The folder that was listed.
    pub output_path: String,
    /// Keys found by the last listing.
    pub files: Vec<String>,
    /// The number of files the driver reported.
    pub expected: usize,
    /// How many listings were made.
    pub poll_count: usize,
}

impl OutputRegistration {
    /// Returns true if at least the expected number of files was found.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.files.len() >= self.expected
    }
}

/// Lists `output_path` until `expected` files are visible or
/// `settings.max_polls` listings were made, sleeping between listings.
pub fn register_outputs(
    storage: &StorageManager,
    output_path: &str,
    expected: usize,
    settings: &OutputPollSettings,
    sleeper: &dyn Sleeper,
) -> Result<OutputRegistration, StorageError> {
    let prefix = format!("{}/", output_path.trim_end_matches('/'));
    let max_polls = settings.max_polls.max(1);

    let mut poll_count = 0;
    let files = loop {
        let files = storage.ls(&prefix)?;
        poll_count += 1;
        if files.len() >= expected || poll_count >= max_polls {
            break files;
        }
        tracing::debug!(
            output_path,
            found = files.len(),
            expected,
            poll = poll_count,
            "Output listing incomplete, polling again"
        );
        sleeper.sleep(settings.interval());
    };

    let registration = OutputRegistration {
        output_path: output_path.to_string(),
        files,
        expected,
        poll_count,
    };
    if registration.is_complete() {
        tracing::info!(
            output_path,
            files = registration.files.len(),
            polls = poll_count,
            "Registered output files"
        );
    } else {
        tracing::error!(
            output_path,
            found = registration.files.len(),
            expected,
            polls = poll_count,
            "Fewer output files than reported; registering what was found"
        );
    }
    Ok(registration)
}

/// Registers an instance's outputs on tokio's blocking pool.
///
/// Sleeps between polls go through the storage retry policy's sleeper.
/// The found files are attached to the instance.
pub fn spawn_output_registration(
    storage: Arc<StorageManager>,
    tracker: Arc<RwLock<LineageTracker>>,
    instance_id: InstanceId,
    expected: usize,
    settings: OutputPollSettings,
) -> JoinHandle<Result<OutputRegistration, FeedflowError>> {
    tokio::task::spawn_blocking(move || {
        let output_path = tracker.read().output_path(instance_id)?;
        let sleeper = storage.retry_policy().sleeper();
        let registration = register_outputs(&storage, &output_path, expected, &settings, sleeper.as_ref())?;
        tracker
            .write()
            .attach_files(instance_id, registration.files.iter().cloned())?;
        Ok(registration)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryObjectStore, ObjectConnection, RetryConfig, RetryPolicy};
    use crate::testing::RecordingSleeper;
    use std::time::Duration;

    fn storage_over(store: &InMemoryObjectStore) -> StorageManager {
        store.put_container("users").unwrap();
        StorageManager::new("users", Arc::new(store.clone()))
    }

    #[test]
    fn test_short_count_after_twenty_polls() {
        let store = InMemoryObjectStore::new();
        let storage = storage_over(&store);
        storage.upload_obj("foo/feed_1/pl_1/data/a.txt", b"a", None).unwrap();
        storage.upload_obj("foo/feed_1/pl_1/data/b.txt", b"b", None).unwrap();
        let sleeper = RecordingSleeper::new();

        let registration = register_outputs(
            &storage,
            "foo/feed_1/pl_1/data",
            3,
            &OutputPollSettings::default(),
            &sleeper,
        )
        .unwrap();

        assert_eq!(registration.poll_count, 20);
        assert_eq!(registration.files.len(), 2);
        assert!(!registration.is_complete());
        assert_eq!(sleeper.count(), 19);
        assert!(sleeper.recorded().iter().all(|d| *d == Duration::from_millis(200)));
    }

    #[test]
    fn test_lagging_listing_is_polled() {
        let store = InMemoryObjectStore::new().with_listing_lag(3);
        let storage = storage_over(&store);
        storage.upload_obj("foo/feed_1/pl_1/data/a.txt", b"a", None).unwrap();
        let sleeper = RecordingSleeper::new();

        let registration = register_outputs(
            &storage,
            "foo/feed_1/pl_1/data/",
            1,
            &OutputPollSettings::default(),
            &sleeper,
        )
        .unwrap();

        assert!(registration.is_complete());
        assert_eq!(registration.poll_count, 4);
        assert_eq!(sleeper.count(), 3);
    }

    #[test]
    fn test_sibling_folders_are_not_listed() {
        let store = InMemoryObjectStore::new();
        let storage = storage_over(&store);
        storage.upload_obj("foo/feed_1/pl_1/data/a.txt", b"a", None).unwrap();
        storage.upload_obj("foo/feed_1/pl_1/data2/b.txt", b"b", None).unwrap();

        let registration = register_outputs(
            &storage,
            "foo/feed_1/pl_1/data",
            0,
            &OutputPollSettings::default(),
            &RecordingSleeper::new(),
        )
        .unwrap();

        assert_eq!(registration.files, vec!["foo/feed_1/pl_1/data/a.txt".to_string()]);
        assert_eq!(registration.poll_count, 1);
    }

    #[test]
    fn test_listing_failure_propagates() {
        let storage = StorageManager::new("missing", Arc::new(InMemoryObjectStore::new()))
            .with_retry_policy(
                RetryPolicy::new(RetryConfig::default()).with_sleeper(Arc::new(RecordingSleeper::new())),
            );

        let err = register_outputs(
            &storage,
            "foo/feed_1/pl_1/data",
            1,
            &OutputPollSettings::default(),
            &RecordingSleeper::new(),
        )
        .unwrap_err();
        assert!(err.is_not_found());
    }
}
