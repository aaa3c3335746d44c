//! Assertions over plans and lineages.

use std::collections::HashSet;

use crate::lineage::{InstanceId, LineageTracker};
use crate::pipeline::ExecutionPlan;
use crate::plugins::PluginType;

/// Asserts that every step's `previous` title was emitted before it.
///
/// # Panics
///
/// Panics on the first forward or dangling reference.
pub fn assert_no_forward_references(plan: &ExecutionPlan) {
    let mut seen: HashSet<&str> = HashSet::new();
    for step in &plan.steps {
        if let Some(previous) = &step.previous {
            assert!(
                seen.contains(previous.as_str()),
                "step '{}' refers to '{}' before it was emitted",
                step.title,
                previous
            );
        }
        seen.insert(&step.title);
    }
}

/// Asserts that the root of `id` is an "fs" instance.
///
/// # Panics
///
/// Panics if the walk fails or ends on another plugin type.
pub fn assert_fs_root(tracker: &LineageTracker, id: InstanceId) {
    let root = match tracker.root(id) {
        Ok(root) => root,
        Err(err) => panic!("no root for instance {id}: {err}"),
    };
    let plugin_type = tracker.catalog().get(root.plugin_id).map(|p| p.plugin_type);
    assert_eq!(
        plugin_type,
        Some(PluginType::Fs),
        "root {} of instance {id} is not an 'fs' instance",
        root.id
    );
}
