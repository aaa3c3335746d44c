//! Name-unique pipeline storage and visibility.

use std::collections::BTreeMap;

use super::model::{Pipeline, PipelineId};
use crate::access::Actor;
use crate::errors::TemplateError;

/// Holds every pipeline template by id.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: BTreeMap<PipelineId, Pipeline>,
    next_id: PipelineId,
}

impl PipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pipelines: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Stores a pipeline and assigns its id.
    pub fn insert(&mut self, mut pipeline: Pipeline) -> Result<PipelineId, TemplateError> {
        if self.get_by_name(&pipeline.name).is_some() {
            return Err(TemplateError::DuplicateName(pipeline.name));
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        pipeline.id = id;

        tracing::info!(pipeline_id = id, name = %pipeline.name, "Registered pipeline");
        self.pipelines.insert(id, pipeline);
        Ok(id)
    }

    /// Looks up a pipeline by id.
    #[must_use]
    pub fn get(&self, id: PipelineId) -> Option<&Pipeline> {
        self.pipelines.get(&id)
    }

    /// Looks up a pipeline by id for modification.
    pub fn get_mut(&mut self, id: PipelineId) -> Option<&mut Pipeline> {
        self.pipelines.get_mut(&id)
    }

    /// Looks up a pipeline by its exact name.
    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&Pipeline> {
        self.pipelines.values().find(|p| p.name == name)
    }

    /// Removes a pipeline.
    pub fn remove(&mut self, id: PipelineId) -> Option<Pipeline> {
        self.pipelines.remove(&id)
    }

    /// Returns the number of pipelines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if no pipeline is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Returns the pipelines `actor` may see.
    ///
    /// Unlocked pipelines are visible to everyone, locked ones to their
    /// owner only. Superusers see everything.
    #[must_use]
    pub fn accessible_pipelines(&self, actor: &Actor) -> Vec<&Pipeline> {
        self.pipelines
            .values()
            .filter(|p| {
                !p.locked || actor.access_to(p.owner.as_deref(), &p.name).can_administer()
            })
            .collect()
    }
}
