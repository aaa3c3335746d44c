//! Ordered execution plans.
//!
//! A plan lists a pipeline's steps breadth-first from the root, so every
//! step's `previous` title is emitted before the step itself. Steps refer to
//! each other by title only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::model::{Pipeline, PipingId};
use crate::errors::TemplateError;
use crate::plugins::{ParamValue, PluginCatalog, PluginId, PluginType, PLUGIN_INSTANCES_PARAM};

/// A default value carried by a plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDefault {
    /// Parameter name.
    pub name: String,
    /// Default value.
    pub default: Option<ParamValue>,
}

/// One step of an [`ExecutionPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Piping title.
    pub title: String,
    /// Plugin to run.
    pub plugin_id: PluginId,
    /// Title of the parent step.
    pub previous: Option<String>,
    /// Parameter defaults in plugin declaration order.
    pub plugin_parameter_defaults: Vec<ParameterDefault>,
}

impl PlanStep {
    /// Returns the default of a parameter.
    #[must_use]
    pub fn default_of(&self, name: &str) -> Option<&ParamValue> {
        self.plugin_parameter_defaults
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.default.as_ref())
    }
}

/// A pipeline flattened into creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Steps, parents first.
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns the step titles in order.
    #[must_use]
    pub fn titles(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.title.as_str()).collect()
    }
}

impl Pipeline {
    /// Flattens the pipeline into a breadth-first [`ExecutionPlan`].
    ///
    /// For "ts" steps the `plugininstances` default, a comma-separated list
    /// of piping ids, is rewritten into the matching piping titles. An
    /// empty list is left as is.
    pub fn to_execution_plan(&self, catalog: &PluginCatalog) -> Result<ExecutionPlan, TemplateError> {
        let tree = self.build_tree()?;
        let id_to_title: HashMap<PipingId, &str> = self
            .pipings()
            .iter()
            .map(|p| (p.id, p.title.as_str()))
            .collect();

        let mut steps = Vec::with_capacity(tree.len());
        for id in tree.breadth_first() {
            let Some(node) = tree.get(id) else { continue };
            let piping = &node.piping;
            let plugin = catalog
                .get(piping.plugin_id)
                .ok_or_else(|| TemplateError::UnknownPlugin(piping.plugin_id.to_string()))?;

            let mut defaults = Vec::with_capacity(plugin.parameters.len());
            for parameter in &plugin.parameters {
                let Some(stored) = self.default_for(piping.id, &parameter.name) else {
                    continue;
                };
                let mut value = stored.value.clone();
                if plugin.plugin_type == PluginType::Ts && parameter.name == PLUGIN_INSTANCES_PARAM {
                    value = value
                        .map(|v| ids_to_titles(v, &id_to_title))
                        .transpose()?;
                }
                defaults.push(ParameterDefault {
                    name: parameter.name.clone(),
                    default: value,
                });
            }

            steps.push(PlanStep {
                title: piping.title.clone(),
                plugin_id: piping.plugin_id,
                previous: piping
                    .previous
                    .and_then(|prev| id_to_title.get(&prev))
                    .map(|t| (*t).to_string()),
                plugin_parameter_defaults: defaults,
            });
        }

        tracing::debug!(pipeline = %self.name, steps = steps.len(), "Built execution plan");
        Ok(ExecutionPlan { steps })
    }
}

fn ids_to_titles(
    value: ParamValue,
    id_to_title: &HashMap<PipingId, &str>,
) -> Result<ParamValue, TemplateError> {
    let ParamValue::Str(raw) = value else {
        return Err(TemplateError::InvalidValue {
            parameter: PLUGIN_INSTANCES_PARAM.to_string(),
            expected: "a comma-separated list of piping ids".to_string(),
        });
    };
    if raw.is_empty() {
        return Ok(ParamValue::Str(raw));
    }

    let mut titles = Vec::new();
    for part in raw.split(',') {
        let id: PipingId = part.trim().parse().map_err(|_| TemplateError::InvalidValue {
            parameter: PLUGIN_INSTANCES_PARAM.to_string(),
            expected: "a comma-separated list of piping ids".to_string(),
        })?;
        let title = id_to_title
            .get(&id)
            .ok_or_else(|| TemplateError::UnknownPiping(id.to_string()))?;
        titles.push(*title);
    }
    Ok(ParamValue::Str(titles.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_no_forward_references, sample_catalog, DIRCOPY_ID, SIMPLEDS_ID, TOPOLOGICAL_ID,
    };
    use pretty_assertions::assert_eq;

    fn diamond() -> Pipeline {
        let catalog = sample_catalog();
        let mut pipeline = Pipeline::new("diamond");
        let root = pipeline.add_piping(&catalog, "root", DIRCOPY_ID, None, vec![]).unwrap();
        let left = pipeline.add_piping(&catalog, "left", SIMPLEDS_ID, Some(root), vec![]).unwrap();
        let right = pipeline.add_piping(&catalog, "right", SIMPLEDS_ID, Some(root), vec![]).unwrap();
        pipeline
            .add_piping(&catalog, "deep", SIMPLEDS_ID, Some(left), vec![])
            .unwrap();
        pipeline
            .add_piping(
                &catalog,
                "join",
                TOPOLOGICAL_ID,
                Some(left),
                vec![(
                    PLUGIN_INSTANCES_PARAM.to_string(),
                    ParamValue::Str(format!("{left},{right}")),
                )],
            )
            .unwrap();
        pipeline
    }

    #[test]
    fn test_plan_is_breadth_first() {
        let plan = diamond().to_execution_plan(&sample_catalog()).unwrap();

        assert_eq!(plan.titles(), vec!["root", "left", "right", "deep", "join"]);
        assert_eq!(plan.steps[0].previous, None);
        assert_eq!(plan.steps[3].previous.as_deref(), Some("left"));
        assert_no_forward_references(&plan);
    }

    #[test]
    fn test_ts_inputs_become_titles() {
        let plan = diamond().to_execution_plan(&sample_catalog()).unwrap();
        let join = &plan.steps[4];

        assert_eq!(
            join.default_of(PLUGIN_INSTANCES_PARAM),
            Some(&ParamValue::Str("left,right".into()))
        );
        assert_eq!(join.default_of("filter"), Some(&ParamValue::Str(".*".into())));
    }

    #[test]
    fn test_empty_ts_inputs_are_untouched() {
        let catalog = sample_catalog();
        let mut pipeline = Pipeline::new("p");
        let root = pipeline.add_piping(&catalog, "root", DIRCOPY_ID, None, vec![]).unwrap();
        pipeline
            .add_piping(
                &catalog,
                "join",
                TOPOLOGICAL_ID,
                Some(root),
                vec![(PLUGIN_INSTANCES_PARAM.to_string(), ParamValue::Str(String::new()))],
            )
            .unwrap();

        let plan = pipeline.to_execution_plan(&catalog).unwrap();
        assert_eq!(
            plan.steps[1].default_of(PLUGIN_INSTANCES_PARAM),
            Some(&ParamValue::Str(String::new()))
        );
    }

    #[test]
    fn test_unknown_ts_input_is_rejected() {
        let catalog = sample_catalog();
        let mut pipeline = Pipeline::new("p");
        let root = pipeline.add_piping(&catalog, "root", DIRCOPY_ID, None, vec![]).unwrap();
        pipeline
            .add_piping(
                &catalog,
                "join",
                TOPOLOGICAL_ID,
                Some(root),
                vec![(PLUGIN_INSTANCES_PARAM.to_string(), ParamValue::Str("1,77".into()))],
            )
            .unwrap();

        assert_eq!(
            pipeline.to_execution_plan(&catalog),
            Err(TemplateError::UnknownPiping("77".into()))
        );
    }

    #[test]
    fn test_plan_serializes_with_titles() {
        let plan = diamond().to_execution_plan(&sample_catalog()).unwrap();
        let json = serde_json::to_value(&plan.steps[1]).unwrap();

        assert_eq!(json["previous"], "root");
        assert_eq!(json["plugin_id"], SIMPLEDS_ID);
    }
}
