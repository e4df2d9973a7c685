//! The narrow seams between the auction core and its surroundings.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corral_rep::{CellClient, ClientError};

use crate::request::AuctionResults;

/// Supplies the fleet: which cells exist and how to talk to them.
///
/// Queried at the top of every round so cells that joined or left between
/// rounds are picked up. Implementations range from a static config-driven
/// map to a service-discovery lookup.
#[async_trait]
pub trait CellDirectory: Send + Sync {
    async fn cell_clients(&self) -> Result<BTreeMap<String, Arc<dyn CellClient>>, ClientError>;
}

/// Consumes the final results of each scheduling run - the hook callers
/// use to drive downstream desired-state updates.
#[async_trait]
pub trait AuctionResultsDelegate: Send + Sync {
    async fn auction_completed(&self, results: &AuctionResults);
}

/// Observation points for metrics emission. Purely observational: nothing
/// here influences scheduling decisions.
pub trait AuctionMetricsDelegate: Send + Sync {
    /// A full state-fetch sweep finished.
    fn fetch_states_completed(&self, duration: Duration);

    /// One cell's state fetch failed or timed out.
    fn failed_cell_state_request(&self);

    /// A scheduling run finished, with its wall-clock duration and how
    /// many fetch failures each cell contributed across the rounds.
    fn auction_completed(
        &self,
        results: &AuctionResults,
        elapsed: Duration,
        cell_failures: &BTreeMap<String, u32>,
    );
}
