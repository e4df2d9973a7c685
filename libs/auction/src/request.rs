//! Auction records and batch containers.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use corral_rep::{Lrp, LrpStartRequest, PlacementError, Task, TaskStartRequest};

/// One LRP instance moving through an auction, with its bookkeeping.
#[derive(Debug, Clone)]
pub struct LrpAuction {
    pub lrp: Lrp,

    /// Rounds this auction has been through.
    pub attempts: u32,

    /// Winning cell, set once a commit is confirmed.
    pub winner: Option<String>,

    /// Why placement failed, set on terminal failure.
    pub placement_error: Option<PlacementError>,

    pub queue_time: Instant,
    pub wait_duration: Duration,
}

impl LrpAuction {
    pub fn new(lrp: Lrp) -> Self {
        Self {
            lrp,
            attempts: 0,
            winner: None,
            placement_error: None,
            queue_time: Instant::now(),
            wait_duration: Duration::ZERO,
        }
    }

    pub fn identifier(&self) -> String {
        self.lrp.identifier()
    }
}

/// One task moving through an auction.
#[derive(Debug, Clone)]
pub struct TaskAuction {
    pub task: Task,
    pub attempts: u32,
    pub winner: Option<String>,
    pub placement_error: Option<PlacementError>,
    pub queue_time: Instant,
    pub wait_duration: Duration,
}

impl TaskAuction {
    pub fn new(task: Task) -> Self {
        Self {
            task,
            attempts: 0,
            winner: None,
            placement_error: None,
            queue_time: Instant::now(),
            wait_duration: Duration::ZERO,
        }
    }

    pub fn identifier(&self) -> &str {
        self.task.identifier()
    }
}

/// The pending work a scheduling run is trying to place.
#[derive(Debug, Clone, Default)]
pub struct AuctionRequest {
    pub lrps: Vec<LrpAuction>,
    pub tasks: Vec<TaskAuction>,
}

impl AuctionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expand a start request into one auction per instance index.
    pub fn add_lrp_start(&mut self, start: &LrpStartRequest) {
        for lrp in start.lrps() {
            self.lrps.push(LrpAuction::new(lrp));
        }
    }

    pub fn add_task_start(&mut self, start: &TaskStartRequest) {
        self.tasks.push(TaskAuction::new(start.task()));
    }

    pub fn is_empty(&self) -> bool {
        self.lrps.is_empty() && self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lrps.len() + self.tasks.len()
    }

    /// Drop duplicate submissions of the same instance or task, keeping
    /// the first occurrence.
    pub fn dedupe(&mut self) {
        let mut seen = BTreeSet::new();
        self.lrps.retain(|auction| seen.insert(auction.identifier()));

        let mut seen = BTreeSet::new();
        self.tasks
            .retain(|auction| seen.insert(auction.identifier().to_string()));
    }
}

/// The outcome of one scheduling run.
///
/// Accumulated across rounds; successes and failures together partition the
/// submitted work exactly.
#[derive(Debug, Clone, Default)]
pub struct AuctionResults {
    pub successful_lrps: Vec<LrpAuction>,
    pub failed_lrps: Vec<LrpAuction>,
    pub successful_tasks: Vec<TaskAuction>,
    pub failed_tasks: Vec<TaskAuction>,
}

impl AuctionResults {
    pub fn successful_count(&self) -> usize {
        self.successful_lrps.len() + self.successful_tasks.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_lrps.len() + self.failed_tasks.len()
    }

    pub fn len(&self) -> usize {
        self.successful_count() + self.failed_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use corral_rep::{PlacementConstraint, Resource};

    use super::*;

    fn lrp_start(guid: &str, indices: Vec<i32>) -> LrpStartRequest {
        LrpStartRequest {
            process_guid: guid.to_string(),
            domain: "domain".to_string(),
            indices,
            resource: Resource::new(10, 10, 1),
            constraint: PlacementConstraint::new("linux"),
        }
    }

    fn task_start(guid: &str) -> TaskStartRequest {
        TaskStartRequest {
            task_guid: guid.to_string(),
            domain: "domain".to_string(),
            resource: Resource::new(10, 10, 1),
            constraint: PlacementConstraint::new("linux"),
        }
    }

    #[test]
    fn test_add_lrp_start_expands_indices() {
        let mut request = AuctionRequest::new();
        request.add_lrp_start(&lrp_start("pg-1", vec![0, 1, 2]));
        assert_eq!(request.lrps.len(), 3);
        assert_eq!(request.len(), 3);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut request = AuctionRequest::new();
        request.add_lrp_start(&lrp_start("pg-1", vec![0, 1]));
        request.add_lrp_start(&lrp_start("pg-1", vec![1]));
        request.add_task_start(&task_start("tg-1"));
        request.add_task_start(&task_start("tg-1"));

        request.dedupe();
        assert_eq!(request.lrps.len(), 2);
        assert_eq!(request.tasks.len(), 1);
    }
}
