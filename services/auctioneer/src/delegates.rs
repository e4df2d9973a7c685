//! Production delegate implementations: structured tracing events.
//!
//! Metric transport is out of scope for the scheduler; these emit the
//! observation points as tracing events so whatever log/metric pipeline
//! wraps the process can pick them up.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use corral_auction::{AuctionMetricsDelegate, AuctionResults, AuctionResultsDelegate};
use tracing::{info, warn};

/// Emits the auction metric notifications as tracing events.
#[derive(Default)]
pub struct TracingMetricsEmitter;

impl AuctionMetricsDelegate for TracingMetricsEmitter {
    fn fetch_states_completed(&self, duration: Duration) {
        info!(
            metric = "fetch_states_duration_ms",
            value = duration.as_millis() as u64,
            "Fetched cell states"
        );
    }

    fn failed_cell_state_request(&self) {
        warn!(metric = "failed_cell_state_requests", value = 1u64, "Cell state fetch failed");
    }

    fn auction_completed(
        &self,
        results: &AuctionResults,
        elapsed: Duration,
        cell_failures: &BTreeMap<String, u32>,
    ) {
        info!(
            metric = "auction_duration_ms",
            value = elapsed.as_millis() as u64,
            successful_lrps = results.successful_lrps.len(),
            failed_lrps = results.failed_lrps.len(),
            successful_tasks = results.successful_tasks.len(),
            failed_tasks = results.failed_tasks.len(),
            unreachable_cells = cell_failures.len(),
            "Auction completed"
        );
    }
}

/// Logs a per-item summary of each finished run.
///
/// Downstream desired-state updates hang off the results delegate in a
/// full deployment; the auctioneer itself only records what happened.
#[derive(Default)]
pub struct LoggingResultsDelegate;

#[async_trait]
impl AuctionResultsDelegate for LoggingResultsDelegate {
    async fn auction_completed(&self, results: &AuctionResults) {
        for auction in &results.failed_lrps {
            warn!(
                lrp = %auction.identifier(),
                attempts = auction.attempts,
                reason = %auction
                    .placement_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                "Failed to place lrp"
            );
        }
        for auction in &results.failed_tasks {
            warn!(
                task = %auction.identifier(),
                attempts = auction.attempts,
                reason = %auction
                    .placement_error
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                "Failed to place task"
            );
        }
    }
}
