//! Shared fixtures: an in-process fleet and stub delegates.

// Each integration test binary compiles its own copy and uses a subset.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use corral_auction::{
    AuctionMetricsDelegate, AuctionRequest, AuctionResults, AuctionResultsDelegate, AuctionRunner,
    CellDirectory, RunnerConfig,
};
use corral_rep::sim::InProcessCell;
use corral_rep::{
    CellClient, CellState, ClientError, Lrp, LrpStartRequest, PlacementConstraint, Resource, Task,
    TaskStartRequest,
};
use tokio::sync::watch;

pub const STACK: &str = "linux";

pub fn cell_state(cell_id: &str, zone: &str, memory: i32, disk: i32, containers: i32) -> CellState {
    CellState {
        cell_id: cell_id.to_string(),
        zone: zone.to_string(),
        stack: STACK.to_string(),
        volume_drivers: BTreeSet::new(),
        placement_tags: BTreeSet::new(),
        available: Resource::new(memory, disk, containers),
        total: Resource::new(memory, disk, containers),
        lrps_by_process_guid: BTreeMap::new(),
        task_guids: BTreeSet::new(),
        starting_containers: 0,
        evacuating: false,
    }
}

/// Pre-seed a state with `count` single-instance processes of `memory_mb`
/// each, as if they had been running for a while.
pub fn preload(state: &mut CellState, prefix: &str, count: i32, memory_mb: i32) {
    for i in 0..count {
        let guid = format!("{prefix}-{i}");
        state.lrps_by_process_guid.insert(guid, vec![0]);
        state.available.subtract(&Resource::new(memory_mb, 1, 1));
    }
}

pub fn lrp(guid: &str, index: i32, memory: i32, disk: i32) -> Lrp {
    Lrp {
        process_guid: guid.to_string(),
        index,
        domain: "domain".to_string(),
        resource: Resource::new(memory, disk, 1),
        constraint: PlacementConstraint::new(STACK),
    }
}

pub fn task(guid: &str, memory: i32, disk: i32) -> Task {
    Task {
        task_guid: guid.to_string(),
        domain: "domain".to_string(),
        resource: Resource::new(memory, disk, 1),
        constraint: PlacementConstraint::new(STACK),
    }
}

pub fn lrp_start(guid: &str, indices: Vec<i32>, memory: i32) -> LrpStartRequest {
    LrpStartRequest {
        process_guid: guid.to_string(),
        domain: "domain".to_string(),
        indices,
        resource: Resource::new(memory, 1, 1),
        constraint: PlacementConstraint::new(STACK),
    }
}

pub fn task_start(guid: &str, memory: i32) -> TaskStartRequest {
    TaskStartRequest {
        task_guid: guid.to_string(),
        domain: "domain".to_string(),
        resource: Resource::new(memory, 1, 1),
        constraint: PlacementConstraint::new(STACK),
    }
}

/// A fleet of in-process cells acting as the cell directory.
///
/// Arbitrary `CellClient` implementations (flaky, racing, ...) can be
/// registered alongside the plain in-process cells.
#[derive(Default)]
pub struct SimFleet {
    cells: BTreeMap<String, Arc<InProcessCell>>,
    overrides: Mutex<BTreeMap<String, Arc<dyn CellClient>>>,
}

impl SimFleet {
    pub fn new(states: Vec<CellState>) -> Self {
        let cells = states
            .into_iter()
            .map(|state| {
                let id = state.cell_id.clone();
                (id, Arc::new(InProcessCell::new(state)))
            })
            .collect();
        Self {
            cells,
            overrides: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn cell(&self, cell_id: &str) -> Arc<InProcessCell> {
        Arc::clone(&self.cells[cell_id])
    }

    /// Replace the client used for one cell without touching its state.
    pub fn override_client(&self, cell_id: &str, client: Arc<dyn CellClient>) {
        self.overrides
            .lock()
            .unwrap()
            .insert(cell_id.to_string(), client);
    }

    /// Instances placed per cell, counting every process on the cell.
    pub fn instance_counts(&self) -> BTreeMap<String, usize> {
        self.cells
            .iter()
            .map(|(id, cell)| {
                let state = cell.snapshot();
                let count = state
                    .lrps_by_process_guid
                    .values()
                    .map(Vec::len)
                    .sum::<usize>()
                    + state.task_guids.len();
                (id.clone(), count)
            })
            .collect()
    }
}

#[async_trait]
impl CellDirectory for SimFleet {
    async fn cell_clients(&self) -> Result<BTreeMap<String, Arc<dyn CellClient>>, ClientError> {
        let overrides = self.overrides.lock().unwrap();
        Ok(self
            .cells
            .iter()
            .map(|(id, cell)| {
                let client: Arc<dyn CellClient> = match overrides.get(id) {
                    Some(replacement) => Arc::clone(replacement),
                    None => Arc::clone(cell) as Arc<dyn CellClient>,
                };
                (id.clone(), client)
            })
            .collect())
    }
}

/// A directory that knows no cells at all.
pub struct EmptyDirectory;

#[async_trait]
impl CellDirectory for EmptyDirectory {
    async fn cell_clients(&self) -> Result<BTreeMap<String, Arc<dyn CellClient>>, ClientError> {
        Ok(BTreeMap::new())
    }
}

#[derive(Default)]
pub struct RecordingResultsDelegate {
    pub completed: Mutex<Vec<AuctionResults>>,
}

#[async_trait]
impl AuctionResultsDelegate for RecordingResultsDelegate {
    async fn auction_completed(&self, results: &AuctionResults) {
        self.completed.lock().unwrap().push(results.clone());
    }
}

#[derive(Default)]
pub struct RecordingMetricsDelegate {
    pub fetch_sweeps: AtomicU32,
    pub failed_fetches: AtomicU32,
    pub auctions_completed: AtomicU32,
}

impl AuctionMetricsDelegate for RecordingMetricsDelegate {
    fn fetch_states_completed(&self, _duration: Duration) {
        self.fetch_sweeps.fetch_add(1, Ordering::SeqCst);
    }

    fn failed_cell_state_request(&self) {
        self.failed_fetches.fetch_add(1, Ordering::SeqCst);
    }

    fn auction_completed(
        &self,
        _results: &AuctionResults,
        _elapsed: Duration,
        _cell_failures: &BTreeMap<String, u32>,
    ) {
        self.auctions_completed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub fleet: Arc<SimFleet>,
    pub results_delegate: Arc<RecordingResultsDelegate>,
    pub metrics: Arc<RecordingMetricsDelegate>,
    pub runner: AuctionRunner,
}

impl Harness {
    pub fn new(states: Vec<CellState>, config: RunnerConfig) -> Self {
        let fleet = Arc::new(SimFleet::new(states));
        let results_delegate = Arc::new(RecordingResultsDelegate::default());
        let metrics = Arc::new(RecordingMetricsDelegate::default());
        let runner = AuctionRunner::new(
            Arc::clone(&fleet) as Arc<dyn CellDirectory>,
            Arc::clone(&results_delegate) as Arc<dyn AuctionResultsDelegate>,
            Arc::clone(&metrics) as Arc<dyn AuctionMetricsDelegate>,
            config,
        );
        Self {
            fleet,
            results_delegate,
            metrics,
            runner,
        }
    }

    pub async fn run(&self, request: AuctionRequest) -> AuctionResults {
        let (_tx, rx) = watch::channel(false);
        self.runner.run_auction(request, rx).await
    }
}

/// A config with the weight zeroed out, so distribution assertions depend
/// only on fill and locality.
pub fn fill_only_config() -> RunnerConfig {
    RunnerConfig {
        starting_container_weight: 0.0,
        ..RunnerConfig::default()
    }
}
