//! Plugin instances, feeds and their files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::InstanceStatus;
use crate::plugins::{ParamValue, PluginId};

/// Identifier of a plugin instance.
pub type InstanceId = u64;

/// Identifier of a feed.
pub type FeedId = u64;

/// Optional compute limits requested for an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU limit in millicores.
    #[serde(default)]
    pub cpu_limit: Option<u32>,
    /// Memory limit in MiB.
    #[serde(default)]
    pub memory_limit: Option<u32>,
    /// Number of GPUs.
    #[serde(default)]
    pub gpu_limit: Option<u32>,
    /// Number of workers.
    #[serde(default)]
    pub number_of_workers: Option<u32>,
}

/// The run started by an "fs" instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Feed id.
    pub id: FeedId,
    /// Name; the root plugin's name at creation.
    pub name: String,
    /// Owner usernames.
    pub owners: Vec<String>,
    /// Whether the feed is publicly visible.
    #[serde(default)]
    pub public: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// Returns true if `username` owns the feed.
    #[must_use]
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.owners.iter().any(|o| o == username)
    }
}

/// A file produced by an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFile {
    /// Storage key.
    pub fname: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

/// One run of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInstance {
    /// Instance id.
    pub id: InstanceId,
    /// Title.
    #[serde(default)]
    pub title: String,
    /// The plugin that ran.
    pub plugin_id: PluginId,
    /// The instance whose output this one consumed.
    pub previous: Option<InstanceId>,
    /// Owner username.
    pub owner: String,
    /// Name of the compute resource the instance was scheduled on.
    pub compute_resource: String,
    /// Current status.
    #[serde(default)]
    pub status: InstanceStatus,
    /// Creation time.
    pub start_date: DateTime<Utc>,
    /// Time a terminal status was reached.
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// The feed the instance belongs to.
    pub feed_id: FeedId,
    /// Requested limits.
    #[serde(default)]
    pub limits: ResourceLimits,
    /// Registered output files.
    #[serde(default)]
    pub files: Vec<InstanceFile>,
}

/// A request to create a plugin instance.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInstance {
    /// The plugin to run.
    pub plugin_id: PluginId,
    /// Owner username.
    pub owner: String,
    /// The parent instance.
    pub previous: Option<InstanceId>,
    /// Title.
    pub title: String,
    /// Compute resource name.
    pub compute_resource: String,
    /// Requested limits.
    pub limits: ResourceLimits,
    /// Parameter values by name; unset parameters use the plugin's defaults.
    pub parameters: Vec<(String, ParamValue)>,
}

impl NewInstance {
    /// Creates a request for `plugin_id` owned by `owner`.
    #[must_use]
    pub fn new(plugin_id: PluginId, owner: impl Into<String>) -> Self {
        Self {
            plugin_id,
            owner: owner.into(),
            previous: None,
            title: String::new(),
            compute_resource: "host".to_string(),
            limits: ResourceLimits::default(),
            parameters: Vec::new(),
        }
    }

    /// Sets the parent instance.
    #[must_use]
    pub fn with_previous(mut self, previous: InstanceId) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Sets the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the compute resource.
    #[must_use]
    pub fn with_compute_resource(mut self, name: impl Into<String>) -> Self {
        self.compute_resource = name.into();
        self
    }

    /// Sets the requested limits.
    #[must_use]
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets a parameter value.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.parameters.push((name.into(), value));
        self
    }
}
