//! The round-driving orchestrator.
//!
//! One `run_auction` call takes a batch of pending auctions through up to
//! `max_rounds` fetch -> match -> commit rounds. Each round is two
//! synchronization barriers around a single-threaded matching pass: all
//! state fetches complete before matching starts, and all commits complete
//! before retry eligibility is evaluated. The runner alone mutates the
//! results accumulator; the parallel phases only return values.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use corral_rep::PlacementError;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::communicator::{Communicator, PerformJob};
use crate::delegates::{AuctionMetricsDelegate, AuctionResultsDelegate, CellDirectory};
use crate::request::{AuctionRequest, AuctionResults, LrpAuction, TaskAuction};
use crate::scheduler::Scheduler;
use crate::zones::build_zones;

/// Tuning for the runner and the fan-out beneath it.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Rounds to attempt before pending work fails with
    /// `MaxRoundsExceeded`.
    pub max_rounds: u32,

    /// Concurrency bound for cell I/O. Sized so a sweep's latency is
    /// dominated by the slowest cell rather than by serialization.
    pub pool_size: usize,

    pub cell_state_timeout: Duration,
    pub perform_timeout: Duration,

    /// Weight of a cell's in-flight container creations in its score.
    pub starting_container_weight: f64,

    /// Fleet-wide ceiling on in-flight container creations. `None` means
    /// unlimited.
    pub starting_container_ceiling: Option<i64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            pool_size: 100,
            cell_state_timeout: Duration::from_secs(1),
            perform_timeout: Duration::from_secs(10),
            starting_container_weight: 0.25,
            starting_container_ceiling: None,
        }
    }
}

/// Drives scheduling runs against the fleet.
pub struct AuctionRunner {
    directory: Arc<dyn CellDirectory>,
    results_delegate: Arc<dyn AuctionResultsDelegate>,
    metrics: Arc<dyn AuctionMetricsDelegate>,
    config: RunnerConfig,
}

impl AuctionRunner {
    pub fn new(
        directory: Arc<dyn CellDirectory>,
        results_delegate: Arc<dyn AuctionResultsDelegate>,
        metrics: Arc<dyn AuctionMetricsDelegate>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            directory,
            results_delegate,
            metrics,
            config,
        }
    }

    /// Run one batch to completion.
    ///
    /// Always returns a complete partition of the input into successes and
    /// failures; per-item problems are reasons in the results, never
    /// errors out of this function. `shutdown` stops new rounds from
    /// starting; in-flight cell calls finish or time out first.
    #[instrument(skip_all, fields(lrps = request.lrps.len(), tasks = request.tasks.len()))]
    pub async fn run_auction(
        &self,
        mut request: AuctionRequest,
        shutdown: watch::Receiver<bool>,
    ) -> AuctionResults {
        let started = Instant::now();
        let communicator = Communicator::new(self.config.pool_size);

        let mut results = AuctionResults::default();
        let mut cell_failures: BTreeMap<String, u32> = BTreeMap::new();

        request.dedupe();
        let mut pending = request;
        let mut round = 0u32;

        while !pending.is_empty() {
            round += 1;
            if round > self.config.max_rounds || *shutdown.borrow() {
                let reason = if *shutdown.borrow() {
                    "shutdown requested"
                } else {
                    "round budget exhausted"
                };
                info!(round, reason, pending = pending.len(), "Abandoning pending auctions");
                fail_pending(&mut pending, &mut results, PlacementError::MaxRoundsExceeded);
                break;
            }

            debug!(round, pending = pending.len(), "Starting auction round");

            // Every item entering a round burns an attempt.
            for auction in &mut pending.lrps {
                auction.attempts += 1;
            }
            for auction in &mut pending.tasks {
                auction.attempts += 1;
            }

            // FetchingState
            let clients = match self.directory.cell_clients().await {
                Ok(clients) => clients,
                Err(error) => {
                    warn!(error = %error, "Failed to list cells");
                    BTreeMap::new()
                }
            };
            if clients.is_empty() {
                fail_pending(&mut pending, &mut results, PlacementError::CellCommunication);
                break;
            }

            let fetch_started = Instant::now();
            let fetched = communicator
                .fetch_states(&clients, self.config.cell_state_timeout)
                .await;
            self.metrics.fetch_states_completed(fetch_started.elapsed());
            for failure in &fetched.failures {
                self.metrics.failed_cell_state_request();
                *cell_failures.entry(failure.cell_id.clone()).or_default() += 1;
            }

            let zones = build_zones(&clients, fetched.states);
            if zones.is_empty() {
                // The whole fleet was unreachable; the cells may come back
                // next round, so this burns a round instead of failing.
                warn!(round, "No cell states available this round");
                continue;
            }

            // Matching
            let scheduler = Scheduler::new(
                zones,
                self.config.starting_container_weight,
                self.config.starting_container_ceiling,
            );
            let matched = scheduler.schedule(std::mem::take(&mut pending));

            for auction in matched.failed_lrps {
                route_failed_lrp(auction, &mut pending, &mut results);
            }
            for auction in matched.failed_tasks {
                route_failed_task(auction, &mut pending, &mut results);
            }

            // Committing
            let mut zones = matched.zones;
            let jobs: Vec<PerformJob> = zones
                .values_mut()
                .flatten()
                .filter(|cell| cell.has_pending_work())
                .map(|cell| PerformJob {
                    cell_id: cell.cell_id().to_string(),
                    client: cell.client(),
                    work: cell.take_pending_work(),
                })
                .collect();

            let mut rejected_lrps: BTreeSet<String> = BTreeSet::new();
            let mut rejected_tasks: BTreeSet<String> = BTreeSet::new();
            for outcome in communicator.perform_all(jobs, self.config.perform_timeout).await {
                match outcome.result {
                    Ok(rejected) => {
                        if !rejected.is_empty() {
                            info!(
                                cell_id = %outcome.cell_id,
                                rejected = rejected.len(),
                                "Cell rejected work; snapshot was stale"
                            );
                        }
                        rejected_lrps.extend(rejected.lrps.iter().map(|lrp| lrp.identifier()));
                        rejected_tasks
                            .extend(rejected.tasks.iter().map(|task| task.task_guid.clone()));
                    }
                    Err(error) => {
                        // The cell may well have accepted the work before
                        // the transport gave out; assuming success avoids
                        // double-placing it. The next fetch reconciles.
                        warn!(cell_id = %outcome.cell_id, error = %error, "Commit call failed");
                    }
                }
            }

            for mut auction in matched.placed_lrps {
                if rejected_lrps.contains(&auction.identifier()) {
                    auction.winner = None;
                    pending.lrps.push(auction);
                } else {
                    auction.wait_duration = auction.queue_time.elapsed();
                    info!(
                        lrp = %auction.identifier(),
                        cell_id = auction.winner.as_deref().unwrap_or(""),
                        attempts = auction.attempts,
                        "Placed lrp"
                    );
                    results.successful_lrps.push(auction);
                }
            }
            for mut auction in matched.placed_tasks {
                if rejected_tasks.contains(auction.identifier()) {
                    auction.winner = None;
                    pending.tasks.push(auction);
                } else {
                    auction.wait_duration = auction.queue_time.elapsed();
                    info!(
                        task = %auction.identifier(),
                        cell_id = auction.winner.as_deref().unwrap_or(""),
                        attempts = auction.attempts,
                        "Placed task"
                    );
                    results.successful_tasks.push(auction);
                }
            }
        }

        // Done
        let elapsed = started.elapsed();
        info!(
            successful = results.successful_count(),
            failed = results.failed_count(),
            rounds = round,
            elapsed_ms = elapsed.as_millis() as u64,
            "Auction complete"
        );
        self.metrics
            .auction_completed(&results, elapsed, &cell_failures);
        self.results_delegate.auction_completed(&results).await;
        results
    }
}

/// Retryable failures go back to pending; terminal ones go straight to the
/// results.
fn route_failed_lrp(
    auction: LrpAuction,
    pending: &mut AuctionRequest,
    results: &mut AuctionResults,
) {
    let terminal = auction
        .placement_error
        .as_ref()
        .is_some_and(PlacementError::is_terminal);
    if terminal {
        results.failed_lrps.push(auction);
    } else {
        pending.lrps.push(auction);
    }
}

fn route_failed_task(
    auction: TaskAuction,
    pending: &mut AuctionRequest,
    results: &mut AuctionResults,
) {
    let terminal = auction
        .placement_error
        .as_ref()
        .is_some_and(PlacementError::is_terminal);
    if terminal {
        results.failed_tasks.push(auction);
    } else {
        pending.tasks.push(auction);
    }
}

fn fail_pending(
    pending: &mut AuctionRequest,
    results: &mut AuctionResults,
    reason: PlacementError,
) {
    for mut auction in pending.lrps.drain(..) {
        auction.placement_error = Some(reason.clone());
        results.failed_lrps.push(auction);
    }
    for mut auction in pending.tasks.drain(..) {
        auction.placement_error = Some(reason.clone());
        results.failed_tasks.push(auction);
    }
}
