//! # corral-auction
//!
//! The auction-based placement core. Given a batch of LRP and task start
//! requests and a fleet of cells, the core assigns each request to exactly
//! one cell through repeated fetch -> match -> commit rounds:
//!
//! - **Fetch**: the communicator snapshots every reachable cell's state in
//!   parallel under a bounded pool; unreachable cells sit the round out.
//! - **Match**: the scheduler orders requests (boulders before pebbles),
//!   filters cells by hard constraints, and picks the lowest-scoring cell,
//!   simulating each tentative placement locally so later picks in the
//!   round see its effect.
//! - **Commit**: winners are sent to their cells; a cell whose real state
//!   has diverged from the snapshot rejects the work, and the rejected
//!   items go back into the pending set for the next round.
//!
//! Rounds repeat up to a configured budget. The result partitions the
//! input exactly: every submitted instance and task ends up in exactly one
//! of successful or failed, with a reason attached to every failure.

mod cell;
mod communicator;
mod delegates;
mod request;
mod runner;
mod scheduler;
mod zones;

pub use cell::{Cell, LOCALITY_OFFSET, OPTIONAL_TAG_PENALTY};
pub use communicator::{CellFailure, Communicator, FetchOutcome, PerformJob, PerformOutcome};
pub use delegates::{AuctionMetricsDelegate, AuctionResultsDelegate, CellDirectory};
pub use request::{AuctionRequest, AuctionResults, LrpAuction, TaskAuction};
pub use runner::{AuctionRunner, RunnerConfig};
pub use scheduler::{MatchOutcome, Scheduler};
pub use zones::{build_zones, Zone};
