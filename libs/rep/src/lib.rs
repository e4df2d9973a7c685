//! # corral-rep
//!
//! The cell representation model shared by the corral scheduler and the
//! services that talk to cells. A "cell" is a worker node that hosts
//! container instances and reports its capacity and running work.
//!
//! This crate is a leaf: plain value types, the placement-error taxonomy,
//! and the `CellClient` capability trait. It performs no I/O of its own
//! except for the in-process simulation client in [`sim`].
//!
//! ## Design principles
//!
//! - State snapshots are immutable: a fresh [`CellState`] replaces the old
//!   one, it is never patched in place by I/O.
//! - Placement failures are data, not panics: every reason a request cannot
//!   be placed is a [`PlacementError`] value carried in results.
//! - Production and simulation cell clients are interchangeable variants of
//!   one trait, selected at construction time.

mod client;
mod constraint;
mod error;
mod resources;
pub mod sim;
mod state;
mod work;

pub use client::CellClient;
pub use constraint::PlacementConstraint;
pub use error::{
    ClientError, PlacementError, PlacementMismatch, ResourceProblem, ValidationError,
};
pub use resources::Resource;
pub use state::CellState;
pub use work::{Lrp, LrpStartRequest, Task, TaskStartRequest, Work};
