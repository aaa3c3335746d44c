//! Log output setup.
//!
//! The library only emits `tracing` events; binaries and tests embedding it
//! call [`init_tracing`] once to print them. `RUST_LOG` overrides the
//! default `info` filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::FeedflowError;

/// How log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(anyhow::anyhow!("Unsupported log format '{other}'")),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn try_init_tracing(format: LogFormat) -> Result<(), FeedflowError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = match format {
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    result.map_err(|e| FeedflowError::Internal(format!("tracing already initialized: {e}")))
}

/// Installs the global subscriber, keeping any subscriber already installed.
pub fn init_tracing(format: LogFormat) {
    if try_init_tracing(format).is_err() {
        tracing::debug!("Global tracing subscriber already installed");
    }
}
