//! corral auctioneer service.
//!
//! The auctioneer accepts batches of LRP and task start requests over
//! HTTP, queues them, and drives the auction core against the configured
//! cell fleet. Submission is fire-and-forget: clients get an immediate
//! acceptance response and the placement outcome flows to the results
//! delegate.

pub mod api;
pub mod cells;
pub mod config;
pub mod delegates;
pub mod worker;
