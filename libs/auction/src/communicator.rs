//! Bounded-concurrency fan-out over the fleet.
//!
//! One round talks to N cells twice: fetching state and committing work.
//! Both go through here. The contract: a bounded pool of in-flight calls,
//! a per-call timeout, per-cell failure isolation (one bad cell never
//! fails the batch), and deterministic aggregation regardless of
//! completion order.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use corral_rep::{CellClient, CellState, ClientError, Work};
use futures_util::stream::{self, StreamExt};
use tracing::warn;

/// Fan-out helper with a fixed concurrency bound.
#[derive(Debug, Clone, Copy)]
pub struct Communicator {
    pool_size: usize,
}

/// One cell that could not be reached this round.
#[derive(Debug, Clone)]
pub struct CellFailure {
    pub cell_id: String,
    pub error: ClientError,
}

/// Everything a state-fetch sweep produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Snapshots of the reachable cells, in cell-id order.
    pub states: Vec<CellState>,
    /// Cells that failed or timed out, in cell-id order.
    pub failures: Vec<CellFailure>,
}

/// A commit to issue against one cell.
pub struct PerformJob {
    pub cell_id: String,
    pub client: Arc<dyn CellClient>,
    pub work: Work,
}

/// The answer from one cell's commit.
pub struct PerformOutcome {
    pub cell_id: String,
    pub result: Result<Work, ClientError>,
}

impl Communicator {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
        }
    }

    /// Fetch every cell's state in parallel. Workers return values; the
    /// aggregation happens here after the fan-in, so there is no shared
    /// mutable state to guard.
    pub async fn fetch_states(
        &self,
        clients: &BTreeMap<String, Arc<dyn CellClient>>,
        timeout: Duration,
    ) -> FetchOutcome {
        let calls = clients
            .iter()
            .map(|(cell_id, client)| fetch_one(cell_id.clone(), Arc::clone(client), timeout));

        let mut completed: Vec<(String, Result<CellState, ClientError>)> = stream::iter(calls)
            .buffer_unordered(self.pool_size)
            .collect()
            .await;
        completed.sort_by(|a, b| a.0.cmp(&b.0));

        let mut outcome = FetchOutcome::default();
        for (cell_id, result) in completed {
            match result {
                Ok(state) => outcome.states.push(state),
                Err(error) => {
                    warn!(cell_id = %cell_id, error = %error, "Failed to fetch cell state");
                    outcome.failures.push(CellFailure { cell_id, error });
                }
            }
        }
        outcome
    }

    /// Issue each cell's commit in parallel, same bounds and isolation as
    /// the fetch sweep.
    pub async fn perform_all(
        &self,
        jobs: Vec<PerformJob>,
        timeout: Duration,
    ) -> Vec<PerformOutcome> {
        let calls = jobs.into_iter().map(|job| perform_one(job, timeout));

        let mut outcomes: Vec<PerformOutcome> = stream::iter(calls)
            .buffer_unordered(self.pool_size)
            .collect()
            .await;
        outcomes.sort_by(|a, b| a.cell_id.cmp(&b.cell_id));
        outcomes
    }
}

fn fetch_one(
    cell_id: String,
    client: Arc<dyn CellClient>,
    timeout: Duration,
) -> Pin<Box<dyn Future<Output = (String, Result<CellState, ClientError>)> + Send>> {
    Box::pin(async move {
        let result = with_timeout(timeout, client.fetch_state()).await;
        (cell_id, result)
    })
}

fn perform_one(
    job: PerformJob,
    timeout: Duration,
) -> Pin<Box<dyn Future<Output = PerformOutcome> + Send>> {
    Box::pin(async move {
        let result = with_timeout(timeout, job.client.perform(job.work)).await;
        PerformOutcome {
            cell_id: job.cell_id,
            result,
        }
    })
}

async fn with_timeout<T>(
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::Timeout),
    }
}
