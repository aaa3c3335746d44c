//! Configuration for storage and output registration.
//!
//! Every setting has a default; [`FeedflowConfig::from_env`] overrides them
//! from `FEEDFLOW_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::observability::LogFormat;
use crate::storage::RetryConfig;

/// Which object store backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// A directory tree on the local filesystem.
    #[default]
    Filesystem,
    /// A process-local in-memory store.
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(Self::Filesystem),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unsupported storage backend '{other}'")),
        }
    }
}

/// Object storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Backend to use.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Container holding every file.
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Root directory of the filesystem backend.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    /// Retry policy for every storage operation.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_container_name() -> String {
    "users".to_string()
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/data")
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            container_name: default_container_name(),
            root_dir: default_root_dir(),
            retry: RetryConfig::default(),
        }
    }
}

/// Polling settings for output registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPollSettings {
    /// Maximum number of listings before accepting what is there.
    #[serde(default = "default_max_polls")]
    pub max_polls: usize,
    /// Pause between listings in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

const fn default_max_polls() -> usize {
    20
}

const fn default_interval_ms() -> u64 {
    200
}

impl Default for OutputPollSettings {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl OutputPollSettings {
    /// Returns the pause between listings.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedflowConfig {
    /// Object storage settings.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Output registration settings.
    #[serde(default)]
    pub output_polling: OutputPollSettings,
    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl FeedflowConfig {
    /// Creates configuration from environment variables.
    ///
    /// Recognized variables (all optional):
    /// - `FEEDFLOW_STORAGE_ENV` (`filesystem` or `memory`)
    /// - `FEEDFLOW_STORAGE_ROOT`
    /// - `FEEDFLOW_CONTAINER_NAME`
    /// - `FEEDFLOW_STORAGE_MAX_ATTEMPTS`
    /// - `FEEDFLOW_STORAGE_BACKOFF_MS`
    /// - `FEEDFLOW_STORAGE_BACKOFF` (`constant`, `linear` or `exponential`)
    /// - `FEEDFLOW_STORAGE_MAX_BACKOFF_MS`
    /// - `FEEDFLOW_STORAGE_JITTER` (`none`, `full` or `equal`)
    /// - `FEEDFLOW_OUTPUT_MAX_POLLS`
    /// - `FEEDFLOW_OUTPUT_POLL_INTERVAL_MS`
    /// - `FEEDFLOW_LOG_FORMAT` (`pretty` or `json`)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(backend) = lookup("FEEDFLOW_STORAGE_ENV") {
            config.storage.backend = backend.parse()?;
        }
        if let Some(root) = lookup("FEEDFLOW_STORAGE_ROOT") {
            config.storage.root_dir = PathBuf::from(root);
        }
        if let Some(container) = lookup("FEEDFLOW_CONTAINER_NAME") {
            config.storage.container_name = container;
        }
        if let Some(attempts) = lookup("FEEDFLOW_STORAGE_MAX_ATTEMPTS") {
            config.storage.retry.max_attempts = parse_var("FEEDFLOW_STORAGE_MAX_ATTEMPTS", &attempts)?;
        }
        if let Some(backoff) = lookup("FEEDFLOW_STORAGE_BACKOFF_MS") {
            config.storage.retry.base_delay_ms = parse_var("FEEDFLOW_STORAGE_BACKOFF_MS", &backoff)?;
        }
        if let Some(strategy) = lookup("FEEDFLOW_STORAGE_BACKOFF") {
            config.storage.retry.backoff_strategy = strategy.trim().parse()?;
        }
        if let Some(cap) = lookup("FEEDFLOW_STORAGE_MAX_BACKOFF_MS") {
            config.storage.retry.max_delay_ms = parse_var("FEEDFLOW_STORAGE_MAX_BACKOFF_MS", &cap)?;
        }
        if let Some(jitter) = lookup("FEEDFLOW_STORAGE_JITTER") {
            config.storage.retry.jitter_strategy = jitter.trim().parse()?;
        }
        if let Some(polls) = lookup("FEEDFLOW_OUTPUT_MAX_POLLS") {
            config.output_polling.max_polls = parse_var("FEEDFLOW_OUTPUT_MAX_POLLS", &polls)?;
        }
        if let Some(interval) = lookup("FEEDFLOW_OUTPUT_POLL_INTERVAL_MS") {
            config.output_polling.interval_ms = parse_var("FEEDFLOW_OUTPUT_POLL_INTERVAL_MS", &interval)?;
        }
        if let Some(format) = lookup("FEEDFLOW_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        if config.storage.retry.max_attempts == 0 {
            anyhow::bail!("FEEDFLOW_STORAGE_MAX_ATTEMPTS must be at least 1");
        }
        Ok(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value '{value}' for {name}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackoffStrategy;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FeedflowConfig::default();
        assert_eq!(config.storage.container_name, "users");
        assert_eq!(config.storage.retry.max_attempts, 5);
        assert_eq!(config.storage.retry.base_delay_ms, 400);
        assert_eq!(config.output_polling.max_polls, 20);
        assert_eq!(config.output_polling.interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = FeedflowConfig::from_lookup(lookup_from(&[
            ("FEEDFLOW_STORAGE_ENV", "memory"),
            ("FEEDFLOW_CONTAINER_NAME", "files"),
            ("FEEDFLOW_STORAGE_MAX_ATTEMPTS", "3"),
            ("FEEDFLOW_OUTPUT_POLL_INTERVAL_MS", "50"),
            ("FEEDFLOW_LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.container_name, "files");
        assert_eq!(config.storage.retry.max_attempts, 3);
        assert_eq!(config.output_polling.interval_ms, 50);
    }

    #[test]
    fn test_from_lookup_retry_schedule() {
        let config = FeedflowConfig::from_lookup(lookup_from(&[
            ("FEEDFLOW_STORAGE_BACKOFF_MS", "100"),
            ("FEEDFLOW_STORAGE_BACKOFF", "exponential"),
            ("FEEDFLOW_STORAGE_MAX_BACKOFF_MS", "300"),
            ("FEEDFLOW_STORAGE_JITTER", "none"),
        ]))
        .unwrap();

        let retry = &config.storage.retry;
        assert_eq!(retry.backoff_strategy, BackoffStrategy::Exponential);
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(300));
        assert!(FeedflowConfig::from_lookup(lookup_from(&[("FEEDFLOW_STORAGE_JITTER", "lots")])).is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = FeedflowConfig::from_lookup(lookup_from(&[("FEEDFLOW_STORAGE_ENV", "tape")])).unwrap_err();
        assert!(err.to_string().contains("tape"));
    }

    #[test]
    fn test_bad_number_is_rejected() {
        assert!(FeedflowConfig::from_lookup(lookup_from(&[("FEEDFLOW_OUTPUT_MAX_POLLS", "lots")])).is_err());
        assert!(FeedflowConfig::from_lookup(lookup_from(&[("FEEDFLOW_STORAGE_MAX_ATTEMPTS", "0")])).is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: FeedflowConfig =
            serde_json::from_str(r#"{"storage": {"backend": "memory"}, "output_polling": {"max_polls": 5}}"#)
                .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.retry, RetryConfig::default());
        assert_eq!(config.output_polling.max_polls, 5);
        assert_eq!(config.output_polling.interval_ms, 200);
    }
}
