//! # Feedflow
//!
//! Pipeline templates, plugin-instance lineage and a fault-tolerant object
//! storage client for a data-processing backend.
//!
//! Feedflow provides:
//!
//! - **Pipeline templates**: trees of plugin pipings with typed parameter defaults
//! - **Execution plans**: breadth-first step lists that refer to parents by title
//! - **Lineage tracking**: feeds, plugin instances, root and descendant queries
//! - **Output registration**: polling an eventually consistent store for produced files
//! - **Object storage**: retrying, lazily connected access to a blob store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use feedflow::prelude::*;
//!
//! let pipeline = PipelineSource::from_yaml(document)?.into_pipeline(&catalog, Some("jane"))?;
//! let plan = pipeline.to_execution_plan(&catalog)?;
//!
//! let root = tracker.create_instance(NewInstance::new(plan.steps[0].plugin_id, "jane"))?;
//! let output_path = tracker.output_path(root)?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod access;
pub mod config;
pub mod errors;
pub mod lineage;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod storage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::access::{Access, Actor};
    pub use crate::config::{FeedflowConfig, OutputPollSettings, StorageBackend, StorageSettings};
    pub use crate::errors::{
        FeedflowError, LineageError, PermissionDenied, StorageError, TemplateError,
    };
    pub use crate::lineage::{
        register_outputs, spawn_output_registration, Feed, InstanceStatus, LineageTracker,
        NewInstance, OutputRegistration, PluginInstance,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        ExecutionPlan, Pipeline, PipelineRegistry, PipelineSource, Piping, PipingTree, PlanStep,
    };
    pub use crate::plugins::{ParamType, ParamValue, Plugin, PluginCatalog, PluginType};
    pub use crate::storage::{connect_storage, RetryConfig, RetryPolicy, StorageManager};
}
