//! A cell as the scheduler sees it: a client handle plus a simulated copy
//! of the cell's state and the reservations pending against it.

use std::sync::Arc;

use corral_rep::{CellClient, CellState, Lrp, PlacementError, Task, Work};

/// Score offset per already-present instance of the same process (or per
/// already-placed task). Large enough to dominate the fill fraction, so
/// spreading instances across cells always beats packing them onto the
/// emptiest one.
pub const LOCALITY_OFFSET: f64 = 1000.0;

/// Score penalty per requested optional placement tag the cell lacks. A
/// soft preference: comparable to fill differences, dwarfed by locality.
pub const OPTIONAL_TAG_PENALTY: f64 = 0.25;

/// One placement target during a round.
///
/// The state here is the round's snapshot, mutated locally as reservations
/// are made so that later scoring within the round sees earlier tentative
/// placements. Nothing touches the real cell until [`Cell::take_pending_work`]
/// hands the reservations to the communicator for commit.
pub struct Cell {
    client: Arc<dyn CellClient>,
    state: CellState,
    pending: Work,
}

impl Cell {
    pub fn new(client: Arc<dyn CellClient>, state: CellState) -> Self {
        Self {
            client,
            state,
            pending: Work::default(),
        }
    }

    pub fn cell_id(&self) -> &str {
        &self.state.cell_id
    }

    pub fn zone(&self) -> &str {
        &self.state.zone
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn client(&self) -> Arc<dyn CellClient> {
        Arc::clone(&self.client)
    }

    /// Score this cell for an LRP instance; lower wins. Errors with the
    /// short dimensions if the instance does not currently fit.
    pub fn score_for_lrp(
        &self,
        lrp: &Lrp,
        starting_container_weight: f64,
    ) -> Result<f64, PlacementError> {
        self.state.resource_match(&lrp.resource)?;

        let locality = self.state.instances_of(&lrp.process_guid) as f64 * LOCALITY_OFFSET;
        let tag_penalty =
            self.state.missing_optional_tags(&lrp.constraint) as f64 * OPTIONAL_TAG_PENALTY;

        Ok(self.resource_score(&lrp.resource, starting_container_weight) + locality + tag_penalty)
    }

    /// Score this cell for a task; lower wins.
    pub fn score_for_task(
        &self,
        task: &Task,
        starting_container_weight: f64,
    ) -> Result<f64, PlacementError> {
        self.state.resource_match(&task.resource)?;

        let locality = self.state.task_guids.len() as f64 * LOCALITY_OFFSET;
        let tag_penalty =
            self.state.missing_optional_tags(&task.constraint) as f64 * OPTIONAL_TAG_PENALTY;

        Ok(self.resource_score(&task.resource, starting_container_weight) + locality + tag_penalty)
    }

    /// Tentatively place an LRP instance on this cell.
    pub fn reserve_lrp(&mut self, lrp: &Lrp) -> Result<(), PlacementError> {
        self.state.resource_match(&lrp.resource)?;
        self.state.add_lrp(lrp);
        self.pending.lrps.push(lrp.clone());
        Ok(())
    }

    /// Tentatively place a task on this cell.
    pub fn reserve_task(&mut self, task: &Task) -> Result<(), PlacementError> {
        self.state.resource_match(&task.resource)?;
        self.state.add_task(task);
        self.pending.tasks.push(task.clone());
        Ok(())
    }

    pub fn has_pending_work(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Hand over the reservations accumulated this round for commit.
    pub fn take_pending_work(&mut self) -> Work {
        std::mem::take(&mut self.pending)
    }

    fn resource_score(&self, cost: &corral_rep::Resource, starting_container_weight: f64) -> f64 {
        let mut remaining = self.state.available;
        remaining.subtract(cost);
        let fill = remaining.used_fraction(&self.state.total);
        let churn = f64::from(self.state.starting_containers) * starting_container_weight;
        fill + churn
    }
}
