//! The matching algorithm: one round of assigning pending auctions to
//! cells against the round's snapshots.
//!
//! Matching is deliberately single-threaded. Requests are placed one at a
//! time so every decision sees the simulated effect of the decisions before
//! it; the parallel parts of a round (fetch and commit) happen outside this
//! module.

use std::collections::{BTreeMap, BTreeSet};

use corral_rep::{Lrp, PlacementError, PlacementMismatch, ResourceProblem, Task};
use tracing::debug;

use crate::cell::Cell;
use crate::request::{AuctionRequest, LrpAuction, TaskAuction};
use crate::zones::Zone;

/// What one matching pass produced.
///
/// `zones` comes back out carrying the tentative reservations, so the
/// caller can commit them to the real cells.
pub struct MatchOutcome {
    /// Tentatively placed, winner recorded, awaiting commit.
    pub placed_lrps: Vec<LrpAuction>,
    pub placed_tasks: Vec<TaskAuction>,

    /// Could not be placed this round, reason recorded.
    pub failed_lrps: Vec<LrpAuction>,
    pub failed_tasks: Vec<TaskAuction>,

    pub zones: BTreeMap<String, Zone>,
}

/// One round's matcher over the fleet snapshots.
pub struct Scheduler {
    zones: BTreeMap<String, Zone>,
    starting_container_weight: f64,

    /// Remaining fleet-wide budget of container creations, when a ceiling
    /// is configured. Seeded with the ceiling minus the containers the
    /// fleet already reports as starting.
    inflight_remaining: Option<i64>,
}

impl Scheduler {
    pub fn new(
        zones: BTreeMap<String, Zone>,
        starting_container_weight: f64,
        starting_container_ceiling: Option<i64>,
    ) -> Self {
        let inflight_remaining = starting_container_ceiling.map(|ceiling| {
            let already_starting: i64 = zones
                .values()
                .flatten()
                .map(|cell| i64::from(cell.state().starting_containers))
                .sum();
            (ceiling - already_starting).max(0)
        });

        Self {
            zones,
            starting_container_weight,
            inflight_remaining,
        }
    }

    /// Match the batch against the snapshots.
    ///
    /// Ordering: index-0 LRP instances first, then tasks, then higher LRP
    /// indices - so every process gets a first instance and one-shot work
    /// runs before extra replicas scale up. Within each group, boulders
    /// before pebbles (largest footprint first) so small requests cannot
    /// fragment the capacity large ones need; ties keep arrival order.
    pub fn schedule(mut self, request: AuctionRequest) -> MatchOutcome {
        let mut outcome = MatchOutcome {
            placed_lrps: Vec::new(),
            placed_tasks: Vec::new(),
            failed_lrps: Vec::new(),
            failed_tasks: Vec::new(),
            zones: BTreeMap::new(),
        };

        let AuctionRequest { mut lrps, mut tasks } = request;

        if self.zones.is_empty() {
            for mut auction in lrps {
                auction.placement_error = Some(PlacementError::CellCommunication);
                outcome.failed_lrps.push(auction);
            }
            for mut auction in tasks {
                auction.placement_error = Some(PlacementError::CellCommunication);
                outcome.failed_tasks.push(auction);
            }
            return outcome;
        }

        lrps.sort_by(|a, b| {
            a.lrp
                .index
                .cmp(&b.lrp.index)
                .then_with(|| b.lrp.resource.memory_mb.cmp(&a.lrp.resource.memory_mb))
        });
        tasks.sort_by(|a, b| b.task.resource.memory_mb.cmp(&a.task.resource.memory_mb));

        let split = lrps.partition_point(|auction| auction.lrp.index == 0);
        let later_indices = lrps.split_off(split);

        for auction in lrps {
            self.auction_lrp(auction, &mut outcome);
        }
        for auction in tasks {
            self.auction_task(auction, &mut outcome);
        }
        for auction in later_indices {
            self.auction_lrp(auction, &mut outcome);
        }

        outcome.zones = self.zones;
        outcome
    }

    fn auction_lrp(&mut self, mut auction: LrpAuction, outcome: &mut MatchOutcome) {
        match self.schedule_lrp(&auction.lrp) {
            Ok(winner) => {
                debug!(lrp = %auction.identifier(), cell_id = %winner, "Tentatively placed lrp");
                auction.winner = Some(winner);
                auction.placement_error = None;
                outcome.placed_lrps.push(auction);
            }
            Err(error) => {
                debug!(lrp = %auction.identifier(), error = %error, "Failed to place lrp");
                auction.placement_error = Some(error);
                outcome.failed_lrps.push(auction);
            }
        }
    }

    fn auction_task(&mut self, mut auction: TaskAuction, outcome: &mut MatchOutcome) {
        match self.schedule_task(&auction.task) {
            Ok(winner) => {
                debug!(task = %auction.identifier(), cell_id = %winner, "Tentatively placed task");
                auction.winner = Some(winner);
                auction.placement_error = None;
                outcome.placed_tasks.push(auction);
            }
            Err(error) => {
                debug!(task = %auction.identifier(), error = %error, "Failed to place task");
                auction.placement_error = Some(error);
                outcome.failed_tasks.push(auction);
            }
        }
    }

    fn schedule_lrp(&mut self, lrp: &Lrp) -> Result<String, PlacementError> {
        self.check_inflight_budget()?;

        // Zones with fewer instances of this process are tried first; a
        // zone only wins outright over the zones after it when it actually
        // has fewer instances, so ties fall through to cell scoring.
        let mut tallies: Vec<(String, usize)> = self
            .zones
            .iter()
            .map(|(name, zone)| {
                let instances = zone
                    .iter()
                    .map(|cell| cell.state().instances_of(&lrp.process_guid))
                    .sum();
                (name.clone(), instances)
            })
            .collect();
        tallies.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut tracker = CandidateTracker::new();
        let mut winner: Option<(String, usize, f64)> = None;

        for (position, (zone_name, instances)) in tallies.iter().enumerate() {
            let zone = &self.zones[zone_name];
            for (cell_index, cell) in zone.iter().enumerate() {
                if let Err(mismatch) = cell.state().matches_constraint(&lrp.constraint) {
                    tracker.record_mismatch(mismatch);
                    continue;
                }
                tracker.record_candidate(cell, &lrp.resource);

                match cell.score_for_lrp(lrp, self.starting_container_weight) {
                    Ok(score) => {
                        if winner.as_ref().is_none_or(|(_, _, best)| score < *best) {
                            winner = Some((zone_name.clone(), cell_index, score));
                        }
                    }
                    Err(error) => tracker.record_capacity_error(&error),
                }
            }

            // Tie with the next zone: keep scanning so the tie breaks on
            // cell scores rather than zone order.
            let tied_with_next =
                position + 1 < tallies.len() && *instances == tallies[position + 1].1;
            if !tied_with_next && winner.is_some() {
                break;
            }
        }

        let Some((zone_name, cell_index, _)) = winner else {
            return Err(tracker.into_error());
        };

        let cell_id = {
            let cell = &mut self
                .zones
                .get_mut(&zone_name)
                .expect("winning zone exists")[cell_index];
            cell.reserve_lrp(lrp)?;
            cell.cell_id().to_string()
        };
        self.consume_inflight_budget();
        Ok(cell_id)
    }

    fn schedule_task(&mut self, task: &Task) -> Result<String, PlacementError> {
        self.check_inflight_budget()?;

        let mut tracker = CandidateTracker::new();
        let mut winner: Option<(String, usize, f64)> = None;

        for (zone_name, zone) in &self.zones {
            for (cell_index, cell) in zone.iter().enumerate() {
                if let Err(mismatch) = cell.state().matches_constraint(&task.constraint) {
                    tracker.record_mismatch(mismatch);
                    continue;
                }
                tracker.record_candidate(cell, &task.resource);

                match cell.score_for_task(task, self.starting_container_weight) {
                    Ok(score) => {
                        if winner.as_ref().is_none_or(|(_, _, best)| score < *best) {
                            winner = Some((zone_name.clone(), cell_index, score));
                        }
                    }
                    Err(error) => tracker.record_capacity_error(&error),
                }
            }
        }

        let Some((zone_name, cell_index, _)) = winner else {
            return Err(tracker.into_error());
        };

        let cell_id = {
            let cell = &mut self
                .zones
                .get_mut(&zone_name)
                .expect("winning zone exists")[cell_index];
            cell.reserve_task(task)?;
            cell.cell_id().to_string()
        };
        self.consume_inflight_budget();
        Ok(cell_id)
    }

    fn check_inflight_budget(&self) -> Result<(), PlacementError> {
        match self.inflight_remaining {
            Some(remaining) if remaining <= 0 => Err(PlacementError::StartingContainerLimit),
            _ => Ok(()),
        }
    }

    fn consume_inflight_budget(&mut self) {
        if let Some(remaining) = &mut self.inflight_remaining {
            *remaining -= 1;
        }
    }
}

/// Aggregates why nothing won, across every cell examined for one request.
struct CandidateTracker {
    best_mismatch: Option<PlacementMismatch>,
    any_candidates: bool,
    fits_some_total: bool,

    /// Capacity dimensions short on *every* candidate. Reporting only the
    /// common problems keeps the reason honest when one cell lacks memory
    /// and another lacks disk.
    common_problems: BTreeSet<ResourceProblem>,
}

impl CandidateTracker {
    fn new() -> Self {
        Self {
            best_mismatch: None,
            any_candidates: false,
            fits_some_total: false,
            common_problems: [
                ResourceProblem::Containers,
                ResourceProblem::Disk,
                ResourceProblem::Memory,
            ]
            .into_iter()
            .collect(),
        }
    }

    fn record_mismatch(&mut self, mismatch: PlacementMismatch) {
        let more_specific = self
            .best_mismatch
            .as_ref()
            .is_none_or(|best| mismatch.specificity() > best.specificity());
        if more_specific {
            self.best_mismatch = Some(mismatch);
        }
    }

    fn record_candidate(&mut self, cell: &Cell, resource: &corral_rep::Resource) {
        self.any_candidates = true;
        if cell.state().total.can_fit(resource) {
            self.fits_some_total = true;
        }
    }

    fn record_capacity_error(&mut self, error: &PlacementError) {
        if let PlacementError::InsufficientCapacity { problems } = error {
            self.common_problems.retain(|p| problems.contains(p));
        }
    }

    fn into_error(self) -> PlacementError {
        if !self.any_candidates {
            let mismatch = self
                .best_mismatch
                .unwrap_or(PlacementMismatch::Stack(String::new()));
            return PlacementError::NoMatchingPlacement(mismatch);
        }
        if !self.fits_some_total {
            return PlacementError::ResourceExceedsCapacity;
        }
        PlacementError::InsufficientCapacity {
            problems: self.common_problems,
        }
    }
}
