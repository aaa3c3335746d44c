//! Plugin definitions referenced by pipings and plugin instances.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a plugin.
pub type PluginId = u64;

/// Identifier of a plugin parameter.
pub type ParameterId = u64;

/// Name of the parameter through which a "ts" plugin lists its inputs.
pub const PLUGIN_INSTANCES_PARAM: &str = "plugininstances";

/// The role a plugin plays in a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    /// Source plugin; roots a feed and takes no input.
    Fs,
    /// Data-processing plugin with a single input.
    Ds,
    /// Topological plugin aggregating several inputs.
    Ts,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fs => write!(f, "fs"),
            Self::Ds => write!(f, "ds"),
            Self::Ts => write!(f, "ts"),
        }
    }
}

/// The declared type of a plugin parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// Free text.
    String,
    /// Signed integer.
    Integer,
    /// Floating point.
    Float,
    /// Boolean flag.
    Boolean,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Float => write!(f, "float"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// A boolean value.
    Bool(bool),
    /// An integer value.
    Int(i64),
    /// A floating point value.
    Float(f64),
    /// A string value.
    Str(String),
}

impl ParamValue {
    /// Converts the value to `param_type`, if compatible.
    ///
    /// Integers are accepted for float parameters; nothing else is coerced.
    #[must_use]
    pub fn coerce(self, param_type: ParamType) -> Option<Self> {
        match (param_type, self) {
            (ParamType::String, v @ Self::Str(_))
            | (ParamType::Integer, v @ Self::Int(_))
            | (ParamType::Float, v @ Self::Float(_))
            | (ParamType::Boolean, v @ Self::Bool(_)) => Some(v),
            #[allow(clippy::cast_precision_loss)]
            (ParamType::Float, Self::Int(i)) => Some(Self::Float(i as f64)),
            _ => None,
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// A parameter declared by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginParameter {
    /// Parameter id.
    pub id: ParameterId,
    /// Parameter name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// The plugin's own default, if it declares one.
    #[serde(default)]
    pub default: Option<ParamValue>,
}

impl PluginParameter {
    /// Creates a parameter without a default.
    #[must_use]
    pub fn new(id: ParameterId, name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            id,
            name: name.into(),
            param_type,
            default: None,
        }
    }

    /// Sets the plugin-level default.
    #[must_use]
    pub fn with_default(mut self, default: ParamValue) -> Self {
        self.default = Some(default);
        self
    }
}

/// A registered plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    /// Plugin id.
    pub id: PluginId,
    /// Plugin name.
    pub name: String,
    /// Plugin version.
    pub version: String,
    /// Plugin type.
    #[serde(rename = "type")]
    pub plugin_type: PluginType,
    /// Declared parameters, in declaration order.
    #[serde(default)]
    pub parameters: Vec<PluginParameter>,
}

impl Plugin {
    /// Creates a plugin without parameters.
    #[must_use]
    pub fn new(
        id: PluginId,
        name: impl Into<String>,
        version: impl Into<String>,
        plugin_type: PluginType,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            version: version.into(),
            plugin_type,
            parameters: Vec::new(),
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, parameter: PluginParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Looks up a parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&PluginParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// All plugins known to the system, by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginCatalog {
    plugins: BTreeMap<PluginId, Plugin>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin, replacing any plugin with the same id.
    pub fn register(&mut self, plugin: Plugin) {
        self.plugins.insert(plugin.id, plugin);
    }

    /// Registers a plugin, builder style.
    #[must_use]
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.register(plugin);
        self
    }

    /// Looks up a plugin by id.
    #[must_use]
    pub fn get(&self, id: PluginId) -> Option<&Plugin> {
        self.plugins.get(&id)
    }

    /// Looks up a plugin by name and version.
    #[must_use]
    pub fn find(&self, name: &str, version: &str) -> Option<&Plugin> {
        self.plugins
            .values()
            .find(|p| p.name == name && p.version == version)
    }

    /// Returns the number of plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// A parameter value recorded for a piping or a plugin instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredParameter {
    /// Name of the plugin parameter.
    pub name: String,
    /// Declared type of the plugin parameter.
    pub param_type: ParamType,
    /// The value; `None` until one is provided.
    pub value: Option<ParamValue>,
}

/// Parameter values of every type, keyed by `(owner id, parameter id)`.
///
/// The owner is a piping for template defaults and a plugin instance for
/// the values an execution ran with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    entries: BTreeMap<(u64, ParameterId), StoredParameter>,
}

impl ParameterStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value of `parameter` for `owner`, replacing any previous one.
    pub fn set(&mut self, owner: u64, parameter: &PluginParameter, value: Option<ParamValue>) {
        self.entries.insert(
            (owner, parameter.id),
            StoredParameter {
                name: parameter.name.clone(),
                param_type: parameter.param_type,
                value,
            },
        );
    }

    /// Returns the record of `parameter` for `owner`.
    #[must_use]
    pub fn get(&self, owner: u64, parameter: ParameterId) -> Option<&StoredParameter> {
        self.entries.get(&(owner, parameter))
    }

    /// Returns every record of `owner`, by parameter id.
    pub fn for_owner(&self, owner: u64) -> impl Iterator<Item = (ParameterId, &StoredParameter)> {
        self.entries
            .range((owner, ParameterId::MIN)..=(owner, ParameterId::MAX))
            .map(|(&(_, parameter), stored)| (parameter, stored))
    }

    /// Removes every record of `owner`.
    pub fn remove_owner(&mut self, owner: u64) {
        self.entries.retain(|&(o, _), _| o != owner);
    }

    /// Returns every record in `(owner, parameter)` order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, ParameterId, &StoredParameter)> {
        self.entries.iter().map(|(&(o, p), stored)| (o, p, stored))
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
