//! corral auctioneer.
//!
//! Wires the ingestion API, the submission queue, and the auction worker
//! together over the configured cell fleet.

use std::sync::Arc;

use anyhow::Result;
use corral_auction::{
    AuctionMetricsDelegate, AuctionResultsDelegate, AuctionRunner, CellDirectory,
};
use corral_auctioneer::{
    api::{self, AppState},
    cells::StaticCellDirectory,
    config::Config,
    delegates::{LoggingResultsDelegate, TracingMetricsEmitter},
    worker::AuctionWorker,
};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to CORRAL_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting corral auctioneer");
    info!(
        listen_addr = %config.listen_addr,
        cells = config.cells.len(),
        max_rounds = config.max_rounds,
        "Configuration loaded"
    );

    let directory = StaticCellDirectory::new(&config.cells);
    if directory.is_empty() {
        warn!("No cells configured; every auction will fail until CORRAL_CELLS is set");
    }

    let runner = AuctionRunner::new(
        Arc::new(directory) as Arc<dyn CellDirectory>,
        Arc::new(LoggingResultsDelegate) as Arc<dyn AuctionResultsDelegate>,
        Arc::new(TracingMetricsEmitter) as Arc<dyn AuctionMetricsDelegate>,
        config.runner_config(),
    );

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start the auction worker in the background
    let (submission_tx, submission_rx) = mpsc::unbounded_channel();
    let worker = AuctionWorker::new(runner, submission_rx);
    let worker_handle = tokio::spawn(run_worker(worker, shutdown_rx.clone()));

    // Build and run the server
    let state = AppState::new(submission_tx);
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    // Wait for shutdown signal (Ctrl+C)
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    // Signal shutdown and wait for the worker to drain
    let _ = shutdown_tx.send(true);

    info!("Waiting for auction worker to shut down...");
    let shutdown_timeout = std::time::Duration::from_secs(10);
    if let Err(e) = tokio::time::timeout(shutdown_timeout, worker_handle).await {
        warn!(error = %e, "Auction worker did not shut down in time");
    }

    info!("Auctioneer shutdown complete");
    Ok(())
}

async fn run_worker(worker: AuctionWorker, shutdown_rx: watch::Receiver<bool>) {
    worker.run(shutdown_rx).await;
}
