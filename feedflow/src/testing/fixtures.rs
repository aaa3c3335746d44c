//! Sample plugins and lineage records.

use chrono::Utc;

use crate::lineage::{InstanceId, InstanceStatus, PluginInstance, ResourceLimits};
use crate::plugins::{
    ParamType, ParamValue, Plugin, PluginCatalog, PluginId, PluginParameter, PluginType,
    PLUGIN_INSTANCES_PARAM,
};

/// Id of the sample "fs" plugin, `pl-dircopy` 2.1.1.
pub const DIRCOPY_ID: PluginId = 1;

/// Id of the sample "ds" plugin, `pl-simpledsapp` 2.1.0.
pub const SIMPLEDS_ID: PluginId = 2;

/// Id of the sample "ts" plugin, `pl-topologicalcopy` 0.2.0.
pub const TOPOLOGICAL_ID: PluginId = 3;

/// Returns a catalog with one plugin of each type.
///
/// - `pl-dircopy`: `dir` (string, no default)
/// - `pl-simpledsapp`: `prefix` (string, default `out`), `sleepLength` (integer, no default)
/// - `pl-topologicalcopy`: `plugininstances` (string, no default), `filter` (string, default `.*`)
#[must_use]
pub fn sample_catalog() -> PluginCatalog {
    PluginCatalog::new()
        .with_plugin(
            Plugin::new(DIRCOPY_ID, "pl-dircopy", "2.1.1", PluginType::Fs)
                .with_parameter(PluginParameter::new(1, "dir", ParamType::String)),
        )
        .with_plugin(
            Plugin::new(SIMPLEDS_ID, "pl-simpledsapp", "2.1.0", PluginType::Ds)
                .with_parameter(
                    PluginParameter::new(2, "prefix", ParamType::String)
                        .with_default(ParamValue::Str("out".into())),
                )
                .with_parameter(PluginParameter::new(3, "sleepLength", ParamType::Integer)),
        )
        .with_plugin(
            Plugin::new(TOPOLOGICAL_ID, "pl-topologicalcopy", "0.2.0", PluginType::Ts)
                .with_parameter(PluginParameter::new(4, PLUGIN_INSTANCES_PARAM, ParamType::String))
                .with_parameter(
                    PluginParameter::new(5, "filter", ParamType::String)
                        .with_default(ParamValue::Str(".*".into())),
                ),
        )
}

/// Returns a stored instance owned by `foo` in feed 1, as loaded from
/// persistence.
#[must_use]
pub fn persisted_instance(
    id: InstanceId,
    plugin_id: PluginId,
    previous: Option<InstanceId>,
) -> PluginInstance {
    PluginInstance {
        id,
        title: String::new(),
        plugin_id,
        previous,
        owner: "foo".to_string(),
        compute_resource: "host".to_string(),
        status: InstanceStatus::Started,
        start_date: Utc::now(),
        end_date: None,
        feed_id: 1,
        limits: ResourceLimits::default(),
        files: Vec::new(),
    }
}
