//! Error types for feedflow.
//!
//! Each concern (storage, pipeline templates, execution lineage) has its own
//! error type; [`FeedflowError`] folds them together for callers that drive
//! several subsystems at once.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for feedflow operations.
#[derive(Debug, Error)]
pub enum FeedflowError {
    /// An object storage operation failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A pipeline template is invalid.
    #[error("{0}")]
    Template(#[from] TemplateError),

    /// The execution lineage is inconsistent or an operation on it is invalid.
    #[error("{0}")]
    Lineage(#[from] LineageError),

    /// The acting user lacks the capability for an operation.
    #[error("{0}")]
    Permission(#[from] PermissionDenied),

    /// A storage path was rejected.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A pipeline source document could not be parsed.
    #[error("Source document error: {0}")]
    Source(String),

    /// Process-wide setup failed, e.g. a tracing subscriber was already installed.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors surfaced by the storage client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Every attempt failed with a transient error.
    #[error("Storage unavailable: {operation} failed after {attempts} attempts: {reason}")]
    Unavailable {
        /// The operation that was attempted.
        operation: String,
        /// Number of attempts made.
        attempts: usize,
        /// The last transport error.
        reason: String,
    },

    /// The object definitively does not exist.
    #[error("Object not found: {key}")]
    NotFound {
        /// The missing object key (or container).
        key: String,
    },
}

impl StorageError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(operation: impl Into<String>, attempts: usize, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            attempts,
            reason: reason.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Returns true for a definitive absence.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors raised while authoring or validating a pipeline template.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// The piping graph is not a single rooted tree.
    #[error("Malformed pipeline '{pipeline}': {reason}")]
    Malformed {
        /// The pipeline name.
        pipeline: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A plugin parameter has no default value.
    #[error("A default is required for parameter {parameter}")]
    MissingDefault {
        /// The parameter name.
        parameter: String,
    },

    /// A referenced plugin is not in the catalog.
    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    /// A referenced piping does not belong to the pipeline.
    #[error("Unknown piping: {0}")]
    UnknownPiping(String),

    /// Two pipings share a title.
    #[error("A piping titled '{0}' already exists in this pipeline")]
    DuplicateTitle(String),

    /// A pipeline with this name already exists.
    #[error("A pipeline named '{0}' already exists")]
    DuplicateName(String),

    /// A default value does not match the parameter type.
    #[error("Invalid value for parameter {parameter}: expected {expected}")]
    InvalidValue {
        /// The parameter name.
        parameter: String,
        /// The expected parameter type.
        expected: String,
    },
}

impl TemplateError {
    /// Creates a malformed template error.
    #[must_use]
    pub fn malformed(pipeline: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            pipeline: pipeline.into(),
            reason: reason.into(),
        }
    }

    /// Creates a missing default error.
    #[must_use]
    pub fn missing_default(parameter: impl Into<String>) -> Self {
        Self::MissingDefault {
            parameter: parameter.into(),
        }
    }
}

/// Errors raised by the lineage tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineageError {
    /// The parent chain ended before reaching an "fs" instance.
    #[error("Broken lineage: instance {instance_id} has no parent and is not an 'fs' instance")]
    Broken {
        /// The instance where the walk stopped.
        instance_id: u64,
    },

    /// A walk exceeded its bound, so the parent links contain a cycle.
    #[error("Lineage cycle detected starting from instance {instance_id} after {steps} steps")]
    CycleDetected {
        /// The instance the walk started from.
        instance_id: u64,
        /// Steps taken before giving up.
        steps: usize,
    },

    /// The instance does not exist.
    #[error("Plugin instance not found: {0}")]
    NotFound(u64),

    /// A non-"fs" instance was created without a parent.
    #[error("Plugin '{plugin}' of type '{plugin_type}' requires a previous instance")]
    MissingParent {
        /// The plugin name.
        plugin: String,
        /// The plugin type.
        plugin_type: String,
    },

    /// An "fs" instance was given a parent.
    #[error("Plugin '{0}' of type 'fs' cannot have a previous instance")]
    UnexpectedParent(String),

    /// A status change that the state machine forbids.
    #[error("Invalid status transition for instance {instance_id}: {from} -> {to}")]
    InvalidTransition {
        /// The instance.
        instance_id: u64,
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },
}

/// Raised when an actor lacks the capability for an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Permission denied for {action}: {reason}")]
pub struct PermissionDenied {
    /// The attempted action.
    pub action: String,
    /// Why it was denied.
    pub reason: String,
}

impl PermissionDenied {
    /// Creates a new permission error.
    #[must_use]
    pub fn new(action: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: reason.into(),
        }
    }
}

/// Machine-readable summary of an error, for the API layer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "STORAGE-UNAVAILABLE").
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

impl FeedflowError {
    /// Returns a stable error code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage(StorageError::Unavailable { .. }) => "STORAGE-UNAVAILABLE",
            Self::Storage(StorageError::NotFound { .. }) => "STORAGE-NOT-FOUND",
            Self::Template(TemplateError::MissingDefault { .. }) => "TEMPLATE-MISSING-DEFAULT",
            Self::Template(_) => "TEMPLATE-MALFORMED",
            Self::Lineage(LineageError::CycleDetected { .. }) => "LINEAGE-CYCLE",
            Self::Lineage(LineageError::Broken { .. }) => "LINEAGE-BROKEN",
            Self::Lineage(_) => "LINEAGE-INVALID",
            Self::Permission(_) => "PERMISSION-DENIED",
            Self::InvalidPath(_) => "INVALID-PATH",
            Self::Source(_) => "SOURCE-INVALID",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Converts to an [`ErrorInfo`] summary.
    #[must_use]
    pub fn to_info(&self) -> ErrorInfo {
        let info = ErrorInfo {
            code: self.code().to_string(),
            message: self.to_string(),
            context: HashMap::new(),
        };
        match self {
            Self::Storage(StorageError::Unavailable { operation, attempts, .. }) => info
                .with_context_entry("operation", operation.clone())
                .with_context_entry("attempts", attempts.to_string()),
            Self::Storage(StorageError::NotFound { key }) => info.with_context_entry("key", key.clone()),
            Self::Template(TemplateError::MissingDefault { parameter }) => {
                info.with_context_entry("parameter", parameter.clone())
            }
            Self::Lineage(
                LineageError::Broken { instance_id } | LineageError::CycleDetected { instance_id, .. },
            ) => info.with_context_entry("instance_id", instance_id.to_string()),
            _ => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_unavailable_message() {
        let err = StorageError::unavailable("upload_obj", 5, "connection reset");
        assert_eq!(
            err.to_string(),
            "Storage unavailable: upload_obj failed after 5 attempts: connection reset"
        );
        assert!(!err.is_not_found());
        assert!(StorageError::not_found("a/b").is_not_found());
    }

    #[test]
    fn test_missing_default_message() {
        let err = TemplateError::missing_default("dir");
        assert_eq!(err.to_string(), "A default is required for parameter dir");
    }

    #[test]
    fn test_error_info_for_storage() {
        let err: FeedflowError = StorageError::unavailable("ls", 5, "timeout").into();
        let info = err.to_info();

        assert_eq!(info.code, "STORAGE-UNAVAILABLE");
        assert_eq!(info.context.get("operation"), Some(&"ls".to_string()));
        assert_eq!(info.context.get("attempts"), Some(&"5".to_string()));
    }

    #[test]
    fn test_error_info_for_lineage_cycle() {
        let err: FeedflowError = LineageError::CycleDetected {
            instance_id: 7,
            steps: 4,
        }
        .into();

        assert_eq!(err.code(), "LINEAGE-CYCLE");
        assert_eq!(err.to_info().context.get("instance_id"), Some(&"7".to_string()));
    }
}
