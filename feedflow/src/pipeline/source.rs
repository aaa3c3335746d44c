//! Pipeline source documents (JSON or YAML).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::model::{Pipeline, PipingId};
use crate::errors::{FeedflowError, TemplateError};
use crate::plugins::{ParamValue, PluginCatalog, PluginType, PLUGIN_INSTANCES_PARAM};

/// A default value in a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDefault {
    /// Parameter name.
    pub name: String,
    /// Value; omitted or null falls back to the plugin's default.
    #[serde(default)]
    pub default: Option<ParamValue>,
}

/// A node of a source document's plugin tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    /// Piping title.
    pub title: String,
    /// Plugin name.
    pub plugin_name: String,
    /// Plugin version.
    pub plugin_version: String,
    /// Title of the previous node.
    #[serde(default)]
    pub previous: Option<String>,
    /// Parameter defaults.
    #[serde(default)]
    pub plugin_parameter_defaults: Vec<SourceDefault>,
}

/// A pipeline as authored in a source document.
///
/// Nodes may appear in any order. For "ts" nodes the `plugininstances`
/// default lists node titles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSource {
    /// Pipeline name.
    pub name: String,
    /// Authors.
    #[serde(default)]
    pub authors: String,
    /// Category.
    #[serde(default)]
    pub category: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Locked flag.
    #[serde(default = "default_locked")]
    pub locked: bool,
    /// The plugin tree.
    pub plugin_tree: Vec<SourceNode>,
}

const fn default_locked() -> bool {
    true
}

impl PipelineSource {
    /// Parses a JSON document.
    pub fn from_json(document: &str) -> Result<Self, FeedflowError> {
        serde_json::from_str(document).map_err(|e| FeedflowError::Source(e.to_string()))
    }

    /// Parses a YAML document.
    pub fn from_yaml(document: &str) -> Result<Self, FeedflowError> {
        serde_yaml::from_str(document).map_err(|e| FeedflowError::Source(e.to_string()))
    }

    /// Builds the pipeline the document describes.
    ///
    /// Fails without returning a partial pipeline if any node is invalid or
    /// any plugin parameter ends up without a default.
    pub fn into_pipeline(
        self,
        catalog: &PluginCatalog,
        owner: Option<&str>,
    ) -> Result<Pipeline, TemplateError> {
        let mut pipeline = Pipeline::new(&self.name)
            .with_locked(self.locked)
            .with_authors(self.authors)
            .with_category(self.category)
            .with_description(self.description);
        if let Some(owner) = owner {
            pipeline = pipeline.with_owner(owner);
        }

        let roots = self.plugin_tree.iter().filter(|n| n.previous.is_none()).count();
        if roots != 1 {
            return Err(TemplateError::malformed(
                &self.name,
                format!("expected one root node, found {roots}"),
            ));
        }

        let mut added: HashMap<String, PipingId> = HashMap::new();
        let mut pending = self.plugin_tree;
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for node in pending {
                if is_ready(&node, &added) {
                    let title = node.title.clone();
                    let id = add_node(&mut pipeline, catalog, &added, node)?;
                    added.insert(title, id);
                } else {
                    waiting.push(node);
                }
            }
            if waiting.len() == before {
                let titles: Vec<_> = waiting.iter().map(|n| n.title.as_str()).collect();
                return Err(TemplateError::malformed(
                    &self.name,
                    format!("nodes reference unknown or cyclic predecessors: {}", titles.join(", ")),
                ));
            }
            pending = waiting;
        }

        pipeline.check_parameter_defaults(catalog)?;
        Ok(pipeline)
    }
}

fn ts_inputs(node: &SourceNode) -> Vec<&str> {
    node.plugin_parameter_defaults
        .iter()
        .filter(|d| d.name == PLUGIN_INSTANCES_PARAM)
        .filter_map(|d| d.default.as_ref().and_then(ParamValue::as_str))
        .flat_map(|raw| raw.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect()
}

fn is_ready(node: &SourceNode, added: &HashMap<String, PipingId>) -> bool {
    let parent_ready = node.previous.as_ref().map_or(true, |p| added.contains_key(p));
    parent_ready && ts_inputs(node).iter().all(|t| added.contains_key(*t))
}

fn add_node(
    pipeline: &mut Pipeline,
    catalog: &PluginCatalog,
    added: &HashMap<String, PipingId>,
    node: SourceNode,
) -> Result<PipingId, TemplateError> {
    let plugin = catalog
        .find(&node.plugin_name, &node.plugin_version)
        .ok_or_else(|| {
            TemplateError::UnknownPlugin(format!("{} {}", node.plugin_name, node.plugin_version))
        })?;
    let previous = node.previous.as_ref().and_then(|t| added.get(t).copied());

    let mut defaults = Vec::new();
    for default in &node.plugin_parameter_defaults {
        let Some(value) = default.default.clone() else { continue };
        let value = if plugin.plugin_type == PluginType::Ts && default.name == PLUGIN_INSTANCES_PARAM {
            titles_to_ids(value, added)
        } else {
            value
        };
        defaults.push((default.name.clone(), value));
    }

    pipeline.add_piping(catalog, node.title, plugin.id, previous, defaults)
}

fn titles_to_ids(value: ParamValue, added: &HashMap<String, PipingId>) -> ParamValue {
    match value {
        ParamValue::Str(raw) if !raw.is_empty() => {
            let ids: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter_map(|t| added.get(t))
                .map(ToString::to_string)
                .collect();
            ParamValue::Str(ids.join(","))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_catalog;
    use pretty_assertions::assert_eq;

    const YAML: &str = r#"
name: Sample pipeline
authors: Jane Doe
category: MRI
locked: false
plugin_tree:
  - title: join
    plugin_name: pl-topologicalcopy
    plugin_version: 0.2.0
    previous: left
    plugin_parameter_defaults:
      - name: plugininstances
        default: left,right
  - title: left
    plugin_name: pl-simpledsapp
    plugin_version: 2.1.0
    previous: root
    plugin_parameter_defaults:
      - name: sleepLength
        default: 3
  - title: root
    plugin_name: pl-dircopy
    plugin_version: 2.1.1
    plugin_parameter_defaults:
      - name: dir
        default: /in
  - title: right
    plugin_name: pl-simpledsapp
    plugin_version: 2.1.0
    previous: root
    plugin_parameter_defaults:
      - name: sleepLength
        default: 1
      - name: prefix
        default: r_
"#;

    #[test]
    fn test_yaml_source_builds_pipeline() {
        let catalog = sample_catalog();
        let pipeline = PipelineSource::from_yaml(YAML)
            .unwrap()
            .into_pipeline(&catalog, Some("jane"))
            .unwrap();

        assert_eq!(pipeline.name, "Sample pipeline");
        assert!(!pipeline.locked);
        assert_eq!(pipeline.owner.as_deref(), Some("jane"));
        assert_eq!(pipeline.pipings().len(), 4);

        let left = pipeline.piping_by_title("left").unwrap().id;
        let right = pipeline.piping_by_title("right").unwrap().id;
        let join = pipeline.piping_by_title("join").unwrap().id;
        assert_eq!(
            pipeline.default_for(join, PLUGIN_INSTANCES_PARAM).unwrap().value,
            Some(ParamValue::Str(format!("{left},{right}")))
        );

        // siblings keep the order in which they were added, not document order
        let plan = pipeline.to_execution_plan(&catalog).unwrap();
        assert_eq!(plan.titles(), vec!["root", "right", "left", "join"]);
        assert_eq!(
            plan.steps[3].default_of(PLUGIN_INSTANCES_PARAM),
            Some(&ParamValue::Str("left,right".into()))
        );
    }

    #[test]
    fn test_json_source() {
        let json = r#"{
            "name": "one step",
            "plugin_tree": [
                {"title": "root", "plugin_name": "pl-dircopy", "plugin_version": "2.1.1",
                 "plugin_parameter_defaults": [{"name": "dir", "default": "./"}]}
            ]
        }"#;
        let pipeline = PipelineSource::from_json(json)
            .unwrap()
            .into_pipeline(&sample_catalog(), None)
            .unwrap();

        assert!(pipeline.locked);
        assert_eq!(pipeline.owner, None);
    }

    #[test]
    fn test_missing_default_blocks_pipeline() {
        let json = r#"{
            "name": "incomplete",
            "plugin_tree": [
                {"title": "root", "plugin_name": "pl-dircopy", "plugin_version": "2.1.1"}
            ]
        }"#;
        let err = PipelineSource::from_json(json)
            .unwrap()
            .into_pipeline(&sample_catalog(), None)
            .unwrap_err();

        assert_eq!(err, TemplateError::missing_default("dir"));
        assert_eq!(err.to_string(), "A default is required for parameter dir");
    }

    #[test]
    fn test_unresolvable_previous() {
        let json = r#"{
            "name": "dangling",
            "plugin_tree": [
                {"title": "root", "plugin_name": "pl-dircopy", "plugin_version": "2.1.1",
                 "plugin_parameter_defaults": [{"name": "dir", "default": "./"}]},
                {"title": "a", "plugin_name": "pl-simpledsapp", "plugin_version": "2.1.0",
                 "previous": "nowhere"}
            ]
        }"#;
        let err = PipelineSource::from_json(json)
            .unwrap()
            .into_pipeline(&sample_catalog(), None)
            .unwrap_err();

        assert!(matches!(err, TemplateError::Malformed { .. }));
    }

    #[test]
    fn test_unknown_plugin_version() {
        let json = r#"{
            "name": "p",
            "plugin_tree": [
                {"title": "root", "plugin_name": "pl-dircopy", "plugin_version": "9.9.9"}
            ]
        }"#;
        let err = PipelineSource::from_json(json)
            .unwrap()
            .into_pipeline(&sample_catalog(), None)
            .unwrap_err();

        assert_eq!(err, TemplateError::UnknownPlugin("pl-dircopy 9.9.9".into()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(PipelineSource::from_json("{"), Err(FeedflowError::Source(_))));
        assert!(matches!(
            PipelineSource::from_yaml("name: [unclosed"),
            Err(FeedflowError::Source(_))
        ));
    }
}
