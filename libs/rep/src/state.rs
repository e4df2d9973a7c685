//! Point-in-time cell state snapshots.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::constraint::PlacementConstraint;
use crate::error::{PlacementError, PlacementMismatch, ResourceProblem};
use crate::resources::Resource;
use crate::work::{Lrp, Task};

/// What one cell looked like at the moment its state was fetched.
///
/// Snapshots are produced fresh each fetch and never mutated by I/O. The
/// scheduler mutates only its local copy, via [`CellState::add_lrp`] and
/// [`CellState::add_task`], to simulate tentative placements before they
/// are committed to the real cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    pub cell_id: String,
    pub zone: String,
    pub stack: String,

    /// Volume drivers this cell provides.
    #[serde(default)]
    pub volume_drivers: BTreeSet<String>,

    /// Placement tags this cell carries.
    #[serde(default)]
    pub placement_tags: BTreeSet<String>,

    pub available: Resource,
    pub total: Resource,

    /// Instance indices of each process already on the cell.
    #[serde(default)]
    pub lrps_by_process_guid: BTreeMap<String, Vec<i32>>,

    /// Tasks already on the cell.
    #[serde(default)]
    pub task_guids: BTreeSet<String>,

    /// Containers currently being created on the cell.
    #[serde(default)]
    pub starting_containers: i32,

    /// Evacuating cells accept no new work and are skipped entirely.
    #[serde(default)]
    pub evacuating: bool,
}

impl CellState {
    /// Whether the request's resource currently fits, with the set of
    /// short dimensions on failure.
    pub fn resource_match(&self, resource: &Resource) -> Result<(), PlacementError> {
        let mut problems = BTreeSet::new();
        if self.available.memory_mb < resource.memory_mb {
            problems.insert(ResourceProblem::Memory);
        }
        if self.available.disk_mb < resource.disk_mb {
            problems.insert(ResourceProblem::Disk);
        }
        if self.available.containers < resource.containers {
            problems.insert(ResourceProblem::Containers);
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(PlacementError::InsufficientCapacity { problems })
        }
    }

    /// Check the hard constraints, most general first: stack, then volume
    /// drivers, then required tags.
    pub fn matches_constraint(&self, pc: &PlacementConstraint) -> Result<(), PlacementMismatch> {
        if self.stack != pc.stack {
            return Err(PlacementMismatch::Stack(pc.stack.clone()));
        }
        if !pc.volume_drivers.is_subset(&self.volume_drivers) {
            return Err(PlacementMismatch::VolumeDrivers(
                pc.volume_drivers.iter().cloned().collect(),
            ));
        }
        if !pc.required_tags.is_subset(&self.placement_tags) {
            return Err(PlacementMismatch::PlacementTags(
                pc.required_tags.iter().cloned().collect(),
            ));
        }
        Ok(())
    }

    /// How many requested optional tags the cell lacks. A soft signal for
    /// scoring, never an exclusion.
    pub fn missing_optional_tags(&self, pc: &PlacementConstraint) -> usize {
        pc.optional_tags
            .iter()
            .filter(|tag| !self.placement_tags.contains(*tag))
            .count()
    }

    /// Number of instances of one process on the cell.
    pub fn instances_of(&self, process_guid: &str) -> usize {
        self.lrps_by_process_guid
            .get(process_guid)
            .map_or(0, Vec::len)
    }

    pub fn has_lrp(&self, process_guid: &str, index: i32) -> bool {
        self.lrps_by_process_guid
            .get(process_guid)
            .is_some_and(|indices| indices.contains(&index))
    }

    /// Record a tentative LRP placement in this (local) state.
    pub fn add_lrp(&mut self, lrp: &Lrp) {
        self.available.subtract(&lrp.resource);
        self.starting_containers += 1;
        self.lrps_by_process_guid
            .entry(lrp.process_guid.clone())
            .or_default()
            .push(lrp.index);
    }

    /// Record a tentative task placement in this (local) state.
    pub fn add_task(&mut self, task: &Task) {
        self.available.subtract(&task.resource);
        self.starting_containers += 1;
        self.task_guids.insert(task.task_guid.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> CellState {
        CellState {
            cell_id: "cell-1".to_string(),
            zone: "z1".to_string(),
            stack: "linux".to_string(),
            volume_drivers: ["nfs", "smb"].iter().map(ToString::to_string).collect(),
            placement_tags: ["gpu"].iter().map(ToString::to_string).collect(),
            available: Resource::new(100, 200, 50),
            total: Resource::new(100, 200, 50),
            lrps_by_process_guid: BTreeMap::new(),
            task_guids: BTreeSet::new(),
            starting_containers: 0,
            evacuating: false,
        }
    }

    fn lrp(guid: &str, index: i32) -> Lrp {
        Lrp {
            process_guid: guid.to_string(),
            index,
            domain: "domain".to_string(),
            resource: Resource::new(10, 20, 1),
            constraint: PlacementConstraint::new("linux"),
        }
    }

    #[test]
    fn test_resource_match_reports_short_dimensions() {
        let state = state();
        assert!(state.resource_match(&Resource::new(100, 200, 50)).is_ok());

        let err = state
            .resource_match(&Resource::new(1000, 1000, 51))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient resources: containers, disk, memory"
        );
    }

    #[test]
    fn test_constraint_precedence() {
        let state = state();

        let wrong_stack = PlacementConstraint::new("windows");
        assert!(matches!(
            state.matches_constraint(&wrong_stack),
            Err(PlacementMismatch::Stack(_))
        ));

        let missing_driver = PlacementConstraint::new("linux").with_volume_drivers(["ebs"]);
        assert!(matches!(
            state.matches_constraint(&missing_driver),
            Err(PlacementMismatch::VolumeDrivers(_))
        ));

        let missing_tag = PlacementConstraint::new("linux").with_required_tags(["arm"]);
        assert!(matches!(
            state.matches_constraint(&missing_tag),
            Err(PlacementMismatch::PlacementTags(_))
        ));

        let satisfied = PlacementConstraint::new("linux")
            .with_volume_drivers(["nfs"])
            .with_required_tags(["gpu"]);
        assert!(state.matches_constraint(&satisfied).is_ok());
    }

    #[test]
    fn test_optional_tags_never_exclude() {
        let state = state();
        let pc = PlacementConstraint::new("linux").with_optional_tags(["gpu", "ssd", "nvme"]);
        assert!(state.matches_constraint(&pc).is_ok());
        assert_eq!(state.missing_optional_tags(&pc), 2);
    }

    #[test]
    fn test_add_lrp_updates_simulated_state() {
        let mut state = state();
        state.add_lrp(&lrp("pg-1", 0));
        state.add_lrp(&lrp("pg-1", 1));
        state.add_lrp(&lrp("pg-2", 0));

        assert_eq!(state.available, Resource::new(70, 140, 47));
        assert_eq!(state.starting_containers, 3);
        assert_eq!(state.instances_of("pg-1"), 2);
        assert_eq!(state.instances_of("pg-2"), 1);
        assert!(state.has_lrp("pg-1", 1));
        assert!(!state.has_lrp("pg-1", 2));
    }

    #[test]
    fn test_add_task_updates_simulated_state() {
        let mut state = state();
        let task = Task {
            task_guid: "tg-1".to_string(),
            domain: "domain".to_string(),
            resource: Resource::new(5, 5, 1),
            constraint: PlacementConstraint::new("linux"),
        };
        state.add_task(&task);

        assert_eq!(state.available, Resource::new(95, 195, 49));
        assert!(state.task_guids.contains("tg-1"));
        assert_eq!(state.starting_containers, 1);
    }
}
