//! Error taxonomy for placement, cell communication, and request validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A capacity dimension a cell was short on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceProblem {
    Containers,
    Disk,
    Memory,
}

impl std::fmt::Display for ResourceProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceProblem::Containers => write!(f, "containers"),
            ResourceProblem::Disk => write!(f, "disk"),
            ResourceProblem::Memory => write!(f, "memory"),
        }
    }
}

/// Which hard constraint no cell could satisfy.
///
/// Mismatches are ranked by specificity: a stack mismatch is the least
/// specific (the cell could not even run the image family), a placement-tag
/// mismatch the most. When aggregating across a fleet, the most specific
/// mismatch observed is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementMismatch {
    #[error("found no compatible cell for stack {0:?}")]
    Stack(String),

    #[error("found no compatible cell with volume drivers {0:?}")]
    VolumeDrivers(Vec<String>),

    #[error("found no compatible cell with placement tags {0:?}")]
    PlacementTags(Vec<String>),
}

impl PlacementMismatch {
    /// Rank for aggregation; higher is more specific.
    pub fn specificity(&self) -> u8 {
        match self {
            PlacementMismatch::Stack(_) => 0,
            PlacementMismatch::VolumeDrivers(_) => 1,
            PlacementMismatch::PlacementTags(_) => 2,
        }
    }
}

/// Why a request could not be placed.
///
/// Terminal reasons are never retried: no later round changes a cell's
/// stack, drivers, tags, or total capacity. Everything else returns to the
/// pending set while the round budget lasts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// No cell passed the hard constraint filter.
    #[error(transparent)]
    NoMatchingPlacement(#[from] PlacementMismatch),

    /// Compatible cells exist but none currently has room. Only problems
    /// common to every compatible cell are listed.
    #[error("{}", insufficient_resources_message(.problems))]
    InsufficientCapacity {
        problems: BTreeSet<ResourceProblem>,
    },

    /// The request exceeds every compatible cell's total capacity; no
    /// amount of draining frees enough room.
    #[error("requested resources exceed total cell capacity")]
    ResourceExceedsCapacity,

    /// The fleet-wide ceiling on in-flight container creations is reached.
    #[error("too many containers starting")]
    StartingContainerLimit,

    /// No cells are known to the scheduler.
    #[error("unable to communicate with compatible cells")]
    CellCommunication,

    /// The round budget ran out before the request could be placed.
    #[error("max placement rounds exceeded")]
    MaxRoundsExceeded,
}

impl PlacementError {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlacementError::NoMatchingPlacement(_)
                | PlacementError::ResourceExceedsCapacity
                | PlacementError::CellCommunication
                | PlacementError::MaxRoundsExceeded
        )
    }

    pub fn insufficient_capacity(problems: impl IntoIterator<Item = ResourceProblem>) -> Self {
        PlacementError::InsufficientCapacity {
            problems: problems.into_iter().collect(),
        }
    }
}

fn insufficient_resources_message(problems: &BTreeSet<ResourceProblem>) -> String {
    if problems.is_empty() {
        return "insufficient resources".to_string();
    }

    let list: Vec<String> = problems.iter().map(ToString::to_string).collect();
    format!("insufficient resources: {}", list.join(", "))
}

/// Transport-level failure talking to one cell.
///
/// Never fatal to a scheduling run: the communicator isolates these per
/// cell, and the runner treats the cell as absent for the round.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Why a start request was rejected at ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("process guid is empty")]
    MissingProcessGuid,

    #[error("task guid is empty")]
    MissingTaskGuid,

    #[error("domain is empty")]
    MissingDomain,

    #[error("no instance indices requested")]
    NoIndices,

    #[error("duplicate instance index {0}")]
    DuplicateIndex(i32),

    #[error("negative instance index {0}")]
    NegativeIndex(i32),

    #[error("resource amounts must be non-negative")]
    NegativeResource,

    #[error("resource request is zero")]
    ZeroResource,

    #[error("root filesystem stack is empty")]
    MissingStack,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_capacity_message_sorts_problems() {
        let err = PlacementError::insufficient_capacity([
            ResourceProblem::Memory,
            ResourceProblem::Disk,
        ]);
        assert_eq!(err.to_string(), "insufficient resources: disk, memory");
    }

    #[test]
    fn test_insufficient_capacity_message_empty() {
        let err = PlacementError::insufficient_capacity([]);
        assert_eq!(err.to_string(), "insufficient resources");
    }

    #[test]
    fn test_mismatch_specificity_ordering() {
        let stack = PlacementMismatch::Stack("linux".into());
        let drivers = PlacementMismatch::VolumeDrivers(vec!["nfs".into()]);
        let tags = PlacementMismatch::PlacementTags(vec!["gpu".into()]);
        assert!(stack.specificity() < drivers.specificity());
        assert!(drivers.specificity() < tags.specificity());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(PlacementError::ResourceExceedsCapacity.is_terminal());
        assert!(PlacementError::MaxRoundsExceeded.is_terminal());
        assert!(PlacementError::CellCommunication.is_terminal());
        assert!(
            PlacementError::NoMatchingPlacement(PlacementMismatch::Stack("linux".into()))
                .is_terminal()
        );
        assert!(!PlacementError::insufficient_capacity([ResourceProblem::Memory]).is_terminal());
        assert!(!PlacementError::StartingContainerLimit.is_terminal());
    }
}
