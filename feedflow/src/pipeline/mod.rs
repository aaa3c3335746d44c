//! Pipeline templates.
//!
//! This module provides:
//! - Pipelines and their pipings, with per-parameter defaults
//! - Piping tree reconstruction and validation
//! - Breadth-first execution plans
//! - JSON/YAML source documents
//! - A name-unique registry with visibility rules

mod model;
mod plan;
mod registry;
mod source;
mod tree;

pub use model::{DefaultParameter, Pipeline, PipelineId, Piping, PipingId};
pub use plan::{ExecutionPlan, ParameterDefault, PlanStep};
pub use registry::PipelineRegistry;
pub use source::{PipelineSource, SourceDefault, SourceNode};
pub use tree::{build_tree, PipingTree, TreeNode};
