//! The plugin instance graph.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::instance::{Feed, FeedId, InstanceFile, InstanceId, NewInstance, PluginInstance};
use super::status::InstanceStatus;
use crate::access::Actor;
use crate::errors::{FeedflowError, LineageError, PermissionDenied, TemplateError};
use crate::plugins::{ParamValue, ParameterStore, Plugin, PluginCatalog, PluginType};
use crate::storage::paths::feed_root;

/// Records plugin instances and answers lineage queries.
///
/// Instances form a forest through their `previous` links. Every walk over
/// those links is bounded by the number of instances, so corrupted links
/// surface as [`LineageError::CycleDetected`] instead of looping.
#[derive(Debug)]
pub struct LineageTracker {
    catalog: Arc<PluginCatalog>,
    instances: BTreeMap<InstanceId, PluginInstance>,
    feeds: BTreeMap<FeedId, Feed>,
    parameters: ParameterStore,
    next_instance_id: InstanceId,
    next_feed_id: FeedId,
}

impl LineageTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self {
            catalog,
            instances: BTreeMap::new(),
            feeds: BTreeMap::new(),
            parameters: ParameterStore::new(),
            next_instance_id: 1,
            next_feed_id: 1,
        }
    }

    /// Rebuilds a tracker from persisted feeds and instances.
    ///
    /// Nothing is validated; lineage queries report broken links.
    #[must_use]
    pub fn from_parts(
        catalog: Arc<PluginCatalog>,
        feeds: Vec<Feed>,
        instances: Vec<PluginInstance>,
    ) -> Self {
        let mut tracker = Self::new(catalog);
        for feed in feeds {
            tracker.next_feed_id = tracker.next_feed_id.max(feed.id + 1);
            tracker.feeds.insert(feed.id, feed);
        }
        for instance in instances {
            tracker.next_instance_id = tracker.next_instance_id.max(instance.id + 1);
            tracker.instances.insert(instance.id, instance);
        }
        tracker
    }

    /// Returns the plugin catalog.
    #[must_use]
    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Looks up an instance.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&PluginInstance> {
        self.instances.get(&id)
    }

    /// Looks up a feed.
    #[must_use]
    pub fn feed(&self, id: FeedId) -> Option<&Feed> {
        self.feeds.get(&id)
    }

    /// Returns the number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns true if no instance is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn instance(&self, id: InstanceId) -> Result<&PluginInstance, LineageError> {
        self.instances.get(&id).ok_or(LineageError::NotFound(id))
    }

    fn plugin_of(&self, instance: &PluginInstance) -> Option<&Plugin> {
        self.catalog.get(instance.plugin_id)
    }

    fn is_fs(&self, instance: &PluginInstance) -> bool {
        self.plugin_of(instance)
            .is_some_and(|p| p.plugin_type == PluginType::Fs)
    }

    /// Creates an instance in the `started` status.
    ///
    /// An "fs" instance starts a new feed owned by the instance owner; any
    /// other instance joins its parent's feed.
    pub fn create_instance(&mut self, request: NewInstance) -> Result<InstanceId, FeedflowError> {
        let plugin = self
            .catalog
            .get(request.plugin_id)
            .ok_or_else(|| TemplateError::UnknownPlugin(request.plugin_id.to_string()))?
            .clone();

        let parent_feed = match (plugin.plugin_type, request.previous) {
            (PluginType::Fs, Some(_)) => {
                return Err(LineageError::UnexpectedParent(plugin.name).into());
            }
            (PluginType::Fs, None) => None,
            (_, Some(previous)) => Some(self.instance(previous)?.feed_id),
            (plugin_type, None) => {
                return Err(LineageError::MissingParent {
                    plugin: plugin.name,
                    plugin_type: plugin_type.to_string(),
                }
                .into());
            }
        };

        let mut values: Vec<(u64, ParamValue)> = Vec::with_capacity(request.parameters.len());
        for (name, value) in request.parameters {
            let parameter = plugin.parameter(&name).ok_or_else(|| TemplateError::InvalidValue {
                parameter: name.clone(),
                expected: format!("a parameter of plugin {}", plugin.name),
            })?;
            let value = value
                .coerce(parameter.param_type)
                .ok_or_else(|| TemplateError::InvalidValue {
                    parameter: name,
                    expected: parameter.param_type.to_string(),
                })?;
            values.push((parameter.id, value));
        }

        let feed_id = match parent_feed {
            Some(feed_id) => feed_id,
            None => self.create_feed(&plugin.name, &request.owner),
        };
        let id = self.next_instance_id;
        self.next_instance_id += 1;

        for parameter in &plugin.parameters {
            let value = values
                .iter()
                .rev()
                .find(|(pid, _)| *pid == parameter.id)
                .map(|(_, v)| v.clone())
                .or_else(|| parameter.default.clone());
            self.parameters.set(id, parameter, value);
        }

        self.instances.insert(
            id,
            PluginInstance {
                id,
                title: request.title,
                plugin_id: plugin.id,
                previous: request.previous,
                owner: request.owner,
                compute_resource: request.compute_resource,
                status: InstanceStatus::Started,
                start_date: Utc::now(),
                end_date: None,
                feed_id,
                limits: request.limits,
                files: Vec::new(),
            },
        );

        tracing::debug!(instance_id = id, plugin = %plugin.name, feed_id, "Created plugin instance");
        Ok(id)
    }

    fn create_feed(&mut self, name: &str, owner: &str) -> FeedId {
        let id = self.next_feed_id;
        self.next_feed_id += 1;
        self.feeds.insert(
            id,
            Feed {
                id,
                name: name.to_string(),
                owners: vec![owner.to_string()],
                public: false,
                created_at: Utc::now(),
            },
        );
        tracing::info!(feed_id = id, owner = %owner, name = %name, "Created feed");
        id
    }

    /// Returns the parameter values an instance was created with.
    #[must_use]
    pub fn instance_parameters(&self, id: InstanceId) -> Vec<(String, Option<ParamValue>)> {
        self.parameters
            .for_owner(id)
            .map(|(_, stored)| (stored.name.clone(), stored.value.clone()))
            .collect()
    }

    /// Moves an instance to a terminal status and stamps its end date.
    pub fn set_status(&mut self, id: InstanceId, status: InstanceStatus) -> Result<(), LineageError> {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(LineageError::NotFound(id))?;
        if !instance.status.can_transition_to(status) {
            return Err(LineageError::InvalidTransition {
                instance_id: id,
                from: instance.status.to_string(),
                to: status.to_string(),
            });
        }
        instance.status = status;
        instance.end_date = Some(Utc::now());
        tracing::debug!(instance_id = id, status = %status, "Instance status changed");
        Ok(())
    }

    /// Returns the chain from `id` up to its "fs" root, both included.
    fn ancestry(&self, id: InstanceId) -> Result<Vec<&PluginInstance>, LineageError> {
        let max_steps = self.instances.len();
        let mut current = self.instance(id)?;
        let mut chain = vec![current];
        while !self.is_fs(current) {
            let Some(previous) = current.previous else {
                return Err(LineageError::Broken {
                    instance_id: current.id,
                });
            };
            if chain.len() > max_steps {
                return Err(LineageError::CycleDetected {
                    instance_id: id,
                    steps: chain.len(),
                });
            }
            current = self.instances.get(&previous).ok_or(LineageError::Broken {
                instance_id: current.id,
            })?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// Returns the "fs" instance at the top of an instance's lineage.
    pub fn root(&self, id: InstanceId) -> Result<&PluginInstance, LineageError> {
        let chain = self.ancestry(id)?;
        chain
            .last()
            .copied()
            .ok_or(LineageError::NotFound(id))
    }

    /// Returns an instance and everything below it.
    ///
    /// The instance comes first; after it, the most recently discovered
    /// instances are visited first.
    pub fn descendants(&self, id: InstanceId) -> Result<Vec<&PluginInstance>, LineageError> {
        let start = self.instance(id)?;
        let children = self.children_index();
        let limit = self.instances.len();

        let mut found = Vec::new();
        let mut stack = vec![start];
        while let Some(instance) = stack.pop() {
            if found.len() == limit {
                return Err(LineageError::CycleDetected {
                    instance_id: id,
                    steps: found.len() + 1,
                });
            }
            found.push(instance);
            if let Some(ids) = children.get(&instance.id) {
                stack.extend(ids.iter().filter_map(|child| self.instances.get(child)));
            }
        }
        Ok(found)
    }

    fn children_index(&self) -> HashMap<InstanceId, Vec<InstanceId>> {
        let mut children: HashMap<InstanceId, Vec<InstanceId>> = HashMap::new();
        for instance in self.instances.values() {
            if let Some(previous) = instance.previous {
                children.entry(previous).or_default().push(instance.id);
            }
        }
        children
    }

    /// Returns the storage folder holding an instance's outputs.
    ///
    /// The path is `{owner}/feed_{feed id}/` followed by one
    /// `{plugin name}_{instance id}` segment per instance from the root
    /// down, and a final `data` segment.
    pub fn output_path(&self, id: InstanceId) -> Result<String, LineageError> {
        let chain = self.ancestry(id)?;
        let (Some(instance), Some(root)) = (chain.first(), chain.last()) else {
            return Err(LineageError::NotFound(id));
        };

        let mut path = feed_root(&instance.owner, root.feed_id);
        for node in chain.iter().rev() {
            let plugin = self.plugin_of(node).ok_or(LineageError::Broken {
                instance_id: node.id,
            })?;
            path.push('/');
            path.push_str(&format!("{}_{}", plugin.name, node.id));
        }
        path.push_str("/data");
        Ok(path)
    }

    /// Returns every instance whose lineage leads to `root_id`.
    ///
    /// Empty when `root_id` is unknown or not a root.
    #[must_use]
    pub fn instances_with_root(&self, root_id: InstanceId) -> Vec<&PluginInstance> {
        self.instances
            .values()
            .filter(|i| self.root(i.id).is_ok_and(|root| root.id == root_id))
            .collect()
    }

    /// Returns every instance of a feed.
    #[must_use]
    pub fn feed_instances(&self, feed_id: FeedId) -> Vec<&PluginInstance> {
        self.instances
            .values()
            .filter(|i| i.feed_id == feed_id)
            .collect()
    }

    /// Deletes an instance and everything below it.
    ///
    /// Only the owner or a superuser may delete, and "fs" instances are
    /// never deleted this way. Returns the removed ids.
    pub fn delete_instance(&mut self, actor: &Actor, id: InstanceId) -> Result<Vec<InstanceId>, FeedflowError> {
        let instance = self.instance(id)?;
        if self.is_fs(instance) {
            return Err(PermissionDenied::new("delete", "'fs' plugin instances cannot be deleted").into());
        }
        let resource = format!("plugin instance {id}");
        if !actor.access_to(Some(instance.owner.as_str()), &resource).can_administer() {
            return Err(PermissionDenied::new("delete", format!("not the owner of {resource}")).into());
        }

        let removed: Vec<InstanceId> = self.descendants(id)?.iter().map(|i| i.id).collect();
        for removed_id in &removed {
            self.instances.remove(removed_id);
            self.parameters.remove_owner(*removed_id);
        }
        tracing::info!(instance_id = id, removed = removed.len(), "Deleted plugin instances");
        Ok(removed)
    }

    /// Records output files on an instance, skipping ones already recorded.
    ///
    /// Returns how many were added.
    pub fn attach_files<I>(&mut self, id: InstanceId, fnames: I) -> Result<usize, LineageError>
    where
        I: IntoIterator<Item = String>,
    {
        let instance = self
            .instances
            .get_mut(&id)
            .ok_or(LineageError::NotFound(id))?;
        let mut added = 0;
        for fname in fnames {
            if instance.files.iter().any(|f| f.fname == fname) {
                continue;
            }
            instance.files.push(InstanceFile {
                fname,
                created_at: Utc::now(),
            });
            added += 1;
        }
        Ok(added)
    }
}
