//! Testing utilities for feedflow.
//!
//! This module provides:
//! - Storage doubles that record sleeps and inject failures
//! - A sample plugin catalog and lineage records
//! - Assertions for plans and lineages

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_fs_root, assert_no_forward_references};
pub use fixtures::{persisted_instance, sample_catalog, DIRCOPY_ID, SIMPLEDS_ID, TOPOLOGICAL_ID};
pub use mocks::{FlakyConnection, RecordingSleeper};
