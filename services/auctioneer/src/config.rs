//! Configuration for the auctioneer.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use corral_auction::RunnerConfig;

/// Auctioneer configuration, loaded from `CORRAL_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the ingestion API listens on.
    pub listen_addr: SocketAddr,

    /// The static cell fleet: `cell-id=http://host:port` pairs separated
    /// by commas.
    pub cells: Vec<(String, String)>,

    /// Worker pool size for cell fan-out.
    pub pool_size: usize,

    /// Per-call timeout for cell state fetches, in milliseconds.
    pub cell_state_timeout_ms: u64,

    /// Per-call timeout for commit calls, in milliseconds.
    pub perform_timeout_ms: u64,

    /// Auction rounds to attempt before giving up on pending work.
    pub max_rounds: u32,

    /// Weight of in-flight container creations in cell scoring.
    pub starting_container_weight: f64,

    /// Fleet-wide ceiling on in-flight container creations; 0 disables it.
    pub starting_container_ceiling: i64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("CORRAL_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:9016".to_string())
            .parse()?;

        let cells = parse_cell_specs(&std::env::var("CORRAL_CELLS").unwrap_or_default())?;

        let pool_size = std::env::var("CORRAL_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100);

        let cell_state_timeout_ms = std::env::var("CORRAL_CELL_STATE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let perform_timeout_ms = std::env::var("CORRAL_PERFORM_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10_000);

        let max_rounds = std::env::var("CORRAL_MAX_ROUNDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let starting_container_weight = std::env::var("CORRAL_STARTING_CONTAINER_WEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.25);

        let starting_container_ceiling = std::env::var("CORRAL_STARTING_CONTAINER_CEILING")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let log_level = std::env::var("CORRAL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            listen_addr,
            cells,
            pool_size,
            cell_state_timeout_ms,
            perform_timeout_ms,
            max_rounds,
            starting_container_weight,
            starting_container_ceiling,
            log_level,
        })
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            max_rounds: self.max_rounds,
            pool_size: self.pool_size,
            cell_state_timeout: Duration::from_millis(self.cell_state_timeout_ms),
            perform_timeout: Duration::from_millis(self.perform_timeout_ms),
            starting_container_weight: self.starting_container_weight,
            starting_container_ceiling: if self.starting_container_ceiling > 0 {
                Some(self.starting_container_ceiling)
            } else {
                None
            },
        }
    }
}

/// Parse `cell-0=http://10.0.0.1:1800,cell-1=http://10.0.0.2:1800`.
fn parse_cell_specs(spec: &str) -> Result<Vec<(String, String)>> {
    let mut cells = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((cell_id, url)) = entry.split_once('=') else {
            anyhow::bail!("malformed cell spec entry {entry:?}, expected id=url");
        };
        if cell_id.is_empty() || url.is_empty() {
            anyhow::bail!("malformed cell spec entry {entry:?}, expected id=url");
        }
        cells.push((cell_id.to_string(), url.to_string()));
    }
    Ok(cells)
}
