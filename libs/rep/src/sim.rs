//! In-process cell client for simulations and tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::CellClient;
use crate::error::ClientError;
use crate::state::CellState;
use crate::work::Work;

/// A cell that lives inside the process.
///
/// Unlike the scheduler's simulated copies, this state is authoritative:
/// `perform` re-validates every reservation against the cell's *current*
/// state and rejects what no longer fits. That is exactly how a real cell
/// surfaces an optimistic-reservation race, which makes this the vehicle
/// for conflict and retry tests.
pub struct InProcessCell {
    state: Mutex<CellState>,
    reachable: Mutex<bool>,
}

impl InProcessCell {
    pub fn new(state: CellState) -> Self {
        Self {
            state: Mutex::new(state),
            reachable: Mutex::new(true),
        }
    }

    /// Current authoritative state.
    pub fn snapshot(&self) -> CellState {
        self.state.lock().expect("cell state poisoned").clone()
    }

    /// Test-only: replace the cell's state wholesale.
    pub fn reset(&self, state: CellState) {
        *self.state.lock().expect("cell state poisoned") = state;
    }

    /// Test-only: make fetches and performs fail with a transport error.
    pub fn set_reachable(&self, reachable: bool) {
        *self.reachable.lock().expect("cell state poisoned") = reachable;
    }

    fn check_reachable(&self) -> Result<(), ClientError> {
        if *self.reachable.lock().expect("cell state poisoned") {
            Ok(())
        } else {
            Err(ClientError::Transport("cell unreachable".to_string()))
        }
    }
}

#[async_trait]
impl CellClient for InProcessCell {
    async fn fetch_state(&self) -> Result<CellState, ClientError> {
        self.check_reachable()?;
        Ok(self.snapshot())
    }

    async fn perform(&self, work: Work) -> Result<Work, ClientError> {
        self.check_reachable()?;

        let mut state = self.state.lock().expect("cell state poisoned");
        let mut rejected = Work::default();

        for lrp in work.lrps {
            let duplicate = state.has_lrp(&lrp.process_guid, lrp.index);
            let compatible = state.matches_constraint(&lrp.constraint).is_ok();
            if !duplicate && compatible && state.resource_match(&lrp.resource).is_ok() {
                state.add_lrp(&lrp);
            } else {
                rejected.lrps.push(lrp);
            }
        }

        for task in work.tasks {
            let duplicate = state.task_guids.contains(&task.task_guid);
            let compatible = state.matches_constraint(&task.constraint).is_ok();
            if !duplicate && compatible && state.resource_match(&task.resource).is_ok() {
                state.add_task(&task);
            } else {
                rejected.tasks.push(task);
            }
        }

        Ok(rejected)
    }
}
