//! Background auction worker.
//!
//! Ingestion handlers enqueue validated submissions and answer the client
//! immediately; this worker drains whatever has queued up, collapses
//! duplicates, and drives one scheduling run per batch.

use std::future::Future;
use std::pin::Pin;

use corral_auction::{AuctionRequest, AuctionRunner};
use corral_rep::{LrpStartRequest, TaskStartRequest};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// One validated ingestion payload.
#[derive(Debug)]
pub enum Submission {
    LrpStarts(Vec<LrpStartRequest>),
    TaskStarts(Vec<TaskStartRequest>),
}

/// Drains the submission queue and runs auctions until shutdown.
pub struct AuctionWorker {
    runner: AuctionRunner,
    submissions: mpsc::UnboundedReceiver<Submission>,
}

impl AuctionWorker {
    pub fn new(runner: AuctionRunner, submissions: mpsc::UnboundedReceiver<Submission>) -> Self {
        Self {
            runner,
            submissions,
        }
    }

    /// Run until the shutdown signal trips or the queue closes.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting auction worker");

        loop {
            tokio::select! {
                submission = self.submissions.recv() => {
                    let Some(submission) = submission else {
                        info!("Submission queue closed; auction worker exiting");
                        break;
                    };

                    let request = self.collect_batch(submission);
                    debug!(batch = request.len(), "Drained submission batch");
                    let fut: Pin<Box<dyn Future<Output = _> + Send>> =
                        Box::pin(self.runner.run_auction(request, shutdown.clone()));
                    fut.await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Auction worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Fold the triggering submission plus everything else already queued
    /// into one deduplicated batch.
    fn collect_batch(&mut self, first: Submission) -> AuctionRequest {
        let mut request = AuctionRequest::new();
        add_submission(&mut request, first);
        while let Ok(next) = self.submissions.try_recv() {
            add_submission(&mut request, next);
        }
        request.dedupe();
        request
    }
}

fn add_submission(request: &mut AuctionRequest, submission: Submission) {
    match submission {
        Submission::LrpStarts(starts) => {
            for start in &starts {
                request.add_lrp_start(start);
            }
        }
        Submission::TaskStarts(starts) => {
            for start in &starts {
                request.add_task_start(start);
            }
        }
    }
}
