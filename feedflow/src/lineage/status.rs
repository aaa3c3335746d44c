//! Plugin instance status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a plugin instance.
///
/// Every instance starts as [`InstanceStatus::Started`] and moves at most
/// once, to one of the terminal statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceStatus {
    /// The instance is running.
    #[default]
    Started,
    /// The instance finished successfully.
    FinishedSuccessfully,
    /// The instance finished with an error.
    FinishedWithError,
    /// The instance was cancelled.
    Cancelled,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started => write!(f, "started"),
            Self::FinishedSuccessfully => write!(f, "finishedSuccessfully"),
            Self::FinishedWithError => write!(f, "finishedWithError"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl InstanceStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Started)
    }

    /// Returns true if the status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::FinishedSuccessfully)
    }

    /// Returns true if the instance may move from this status to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        *self == Self::Started && next.is_terminal()
    }
}
