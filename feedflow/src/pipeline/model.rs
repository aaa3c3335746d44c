//! Pipeline templates and their pipings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::tree::{build_tree, PipingTree};
use crate::errors::TemplateError;
use crate::plugins::{ParamValue, ParameterStore, PluginCatalog, PluginId, StoredParameter};

/// Identifier of a pipeline.
pub type PipelineId = u64;

/// Identifier of a piping.
pub type PipingId = u64;

/// One step of a pipeline: a plugin and the step it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piping {
    /// Piping id.
    pub id: PipingId,
    /// Title, unique within the pipeline.
    pub title: String,
    /// Plugin run by this step.
    pub plugin_id: PluginId,
    /// The parent step; `None` only for the root.
    pub previous: Option<PipingId>,
}

impl Piping {
    /// Creates a piping.
    #[must_use]
    pub fn new(
        id: PipingId,
        title: impl Into<String>,
        plugin_id: PluginId,
        previous: Option<PipingId>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            plugin_id,
            previous,
        }
    }
}

/// A default parameter record of one piping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultParameter {
    /// The piping the default belongs to.
    pub piping_id: PipingId,
    /// Name of the plugin parameter.
    pub name: String,
    /// The default value, if one was set.
    pub value: Option<ParamValue>,
}

/// A reusable pipeline template.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline id, assigned by the registry.
    pub id: PipelineId,
    /// Globally unique name.
    pub name: String,
    /// Locked pipelines are only visible to their owner.
    pub locked: bool,
    /// Owner username.
    pub owner: Option<String>,
    /// Authors.
    pub authors: String,
    /// Category.
    pub category: String,
    /// Description.
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    pipings: Vec<Piping>,
    defaults: ParameterStore,
    next_piping_id: PipingId,
}

impl Pipeline {
    /// Creates an empty, locked pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            locked: true,
            owner: None,
            authors: String::new(),
            category: String::new(),
            description: String::new(),
            created_at: Utc::now(),
            pipings: Vec::new(),
            defaults: ParameterStore::new(),
            next_piping_id: 1,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the locked flag.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Sets the authors.
    #[must_use]
    pub fn with_authors(mut self, authors: impl Into<String>) -> Self {
        self.authors = authors.into();
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the pipings in insertion order.
    #[must_use]
    pub fn pipings(&self) -> &[Piping] {
        &self.pipings
    }

    /// Looks up a piping by id.
    #[must_use]
    pub fn piping(&self, id: PipingId) -> Option<&Piping> {
        self.pipings.iter().find(|p| p.id == id)
    }

    /// Looks up a piping by title.
    #[must_use]
    pub fn piping_by_title(&self, title: &str) -> Option<&Piping> {
        self.pipings.iter().find(|p| p.title == title)
    }

    /// Returns the default record of a piping's parameter.
    #[must_use]
    pub fn default_for(&self, piping_id: PipingId, parameter_name: &str) -> Option<&StoredParameter> {
        self.defaults
            .for_owner(piping_id)
            .map(|(_, stored)| stored)
            .find(|stored| stored.name == parameter_name)
    }

    /// Adds a piping and records one default per plugin parameter.
    ///
    /// The default is the supplied value if any, else the plugin's own
    /// default, else unset. `previous` must already be part of the
    /// pipeline, and only the first piping may omit it.
    pub fn add_piping(
        &mut self,
        catalog: &PluginCatalog,
        title: impl Into<String>,
        plugin_id: PluginId,
        previous: Option<PipingId>,
        defaults: Vec<(String, ParamValue)>,
    ) -> Result<PipingId, TemplateError> {
        let title = title.into();
        if self.piping_by_title(&title).is_some() {
            return Err(TemplateError::DuplicateTitle(title));
        }
        let plugin = catalog
            .get(plugin_id)
            .ok_or_else(|| TemplateError::UnknownPlugin(plugin_id.to_string()))?;

        match previous {
            None if !self.pipings.is_empty() => {
                return Err(TemplateError::malformed(
                    &self.name,
                    format!("piping '{title}' has no previous piping but the pipeline already has a root"),
                ));
            }
            Some(prev) if self.piping(prev).is_none() => {
                return Err(TemplateError::UnknownPiping(prev.to_string()));
            }
            _ => {}
        }

        let mut supplied = Vec::with_capacity(defaults.len());
        for (name, value) in defaults {
            let parameter = plugin.parameter(&name).ok_or_else(|| TemplateError::InvalidValue {
                parameter: name.clone(),
                expected: format!("a parameter of plugin {}", plugin.name),
            })?;
            let value = value
                .coerce(parameter.param_type)
                .ok_or_else(|| TemplateError::InvalidValue {
                    parameter: name.clone(),
                    expected: parameter.param_type.to_string(),
                })?;
            supplied.push((parameter.id, value));
        }

        let id = self.next_piping_id;
        self.next_piping_id += 1;

        for parameter in &plugin.parameters {
            let value = supplied
                .iter()
                .rev()
                .find(|(pid, _)| *pid == parameter.id)
                .map(|(_, v)| v.clone())
                .or_else(|| parameter.default.clone());
            self.defaults.set(id, parameter, value);
        }
        self.pipings.push(Piping::new(id, &title, plugin_id, previous));

        tracing::debug!(pipeline = %self.name, piping_id = id, title = %title, "Added piping");
        Ok(id)
    }

    /// Removes a piping together with every piping below it.
    ///
    /// Returns the removed ids.
    pub fn remove_piping(&mut self, id: PipingId) -> Result<Vec<PipingId>, TemplateError> {
        if self.piping(id).is_none() {
            return Err(TemplateError::UnknownPiping(id.to_string()));
        }

        let mut removed = vec![id];
        let mut cursor = 0;
        while cursor < removed.len() {
            let parent = removed[cursor];
            removed.extend(
                self.pipings
                    .iter()
                    .filter(|p| p.previous == Some(parent))
                    .map(|p| p.id),
            );
            cursor += 1;
        }

        let gone: HashSet<PipingId> = removed.iter().copied().collect();
        self.pipings.retain(|p| !gone.contains(&p.id));
        for piping_id in &removed {
            self.defaults.remove_owner(*piping_id);
        }
        Ok(removed)
    }

    /// Lists every default record, grouped by piping.
    #[must_use]
    pub fn default_parameters(&self) -> Vec<DefaultParameter> {
        self.defaults
            .iter()
            .map(|(piping_id, _, stored)| DefaultParameter {
                piping_id,
                name: stored.name.clone(),
                value: stored.value.clone(),
            })
            .collect()
    }

    /// Builds the piping tree.
    pub fn build_tree(&self) -> Result<PipingTree, TemplateError> {
        build_tree(&self.name, &self.pipings)
    }

    /// Fails on the first plugin parameter that has no default value.
    pub fn check_parameter_defaults(&self, catalog: &PluginCatalog) -> Result<(), TemplateError> {
        for piping in &self.pipings {
            let plugin = catalog
                .get(piping.plugin_id)
                .ok_or_else(|| TemplateError::UnknownPlugin(piping.plugin_id.to_string()))?;
            for parameter in &plugin.parameters {
                let has_value = self
                    .defaults
                    .get(piping.id, parameter.id)
                    .is_some_and(|stored| stored.value.is_some());
                if !has_value {
                    return Err(TemplateError::missing_default(&parameter.name));
                }
            }
        }
        Ok(())
    }

    /// Returns the composite name of every piping parameter.
    ///
    /// Names have the form `{pluginId}_{pipingId}_{previousPipingId}_{name}`,
    /// with `null` for the root's previous piping.
    pub fn parameter_names(&self, catalog: &PluginCatalog) -> Result<Vec<String>, TemplateError> {
        let mut names = Vec::new();
        for piping in &self.pipings {
            let plugin = catalog
                .get(piping.plugin_id)
                .ok_or_else(|| TemplateError::UnknownPlugin(piping.plugin_id.to_string()))?;
            let previous = piping
                .previous
                .map_or_else(|| "null".to_string(), |id| id.to_string());
            names.extend(
                plugin
                    .parameters
                    .iter()
                    .map(|param| format!("{}_{}_{}_{}", plugin.id, piping.id, previous, param.name)),
            );
        }
        Ok(names)
    }
}
