//! The cell capability trait consumed by the scheduling core.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::state::CellState;
use crate::work::Work;

/// RPC surface of one cell.
///
/// Implementations do not retry and do not enforce deadlines; per-call
/// timeouts are applied by the caller (the communicator) and retry policy
/// lives in the auction runner. The production implementation speaks HTTP
/// to a real cell; [`crate::sim::InProcessCell`] is the in-process variant
/// used by simulations and tests. The two are interchangeable.
#[async_trait]
pub trait CellClient: Send + Sync {
    /// Fetch a point-in-time snapshot of the cell's state.
    async fn fetch_state(&self) -> Result<CellState, ClientError>;

    /// Attempt to commit reservations. Returns the subset of work the cell
    /// rejected, e.g. because its capacity changed since the last fetch; an
    /// empty result means everything was accepted.
    async fn perform(&self, work: Work) -> Result<Work, ClientError>;
}
