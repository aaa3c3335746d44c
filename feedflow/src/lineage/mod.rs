//! Plugin instance lineage.
//!
//! This module provides:
//! - The instance status machine
//! - Feeds, instances and their output files
//! - [`LineageTracker`] with root, descendant and output path queries
//! - Output registration against an eventually consistent store

mod instance;
mod outputs;
mod status;
mod tracker;


pub use instance::{
    Feed, FeedId, InstanceFile, InstanceId, NewInstance, PluginInstance, ResourceLimits,
};
pub use outputs::{register_outputs, spawn_output_registration, OutputRegistration};
pub use status::InstanceStatus;
pub use tracker::LineageTracker;
