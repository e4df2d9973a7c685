//! Talking to real cells over HTTP, and the static fleet directory.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corral_auction::CellDirectory;
use corral_rep::{CellClient, CellState, ClientError, Work};
use tracing::debug;

/// HTTP implementation of the cell capability interface.
///
/// `GET {base}/state` returns the cell's state snapshot; `POST {base}/work`
/// submits reservations and returns the rejected subset. Deadlines and
/// retries are the caller's business, so the underlying client carries only
/// a generous safety-net timeout.
pub struct HttpCellClient {
    client: reqwest::Client,
    base_url: String,
    cell_id: String,
}

impl HttpCellClient {
    pub fn new(cell_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            cell_id: cell_id.into(),
        }
    }

    pub fn cell_id(&self) -> &str {
        &self.cell_id
    }
}

#[async_trait]
impl CellClient for HttpCellClient {
    async fn fetch_state(&self) -> Result<CellState, ClientError> {
        let url = format!("{}/state", self.base_url);
        debug!(cell_id = %self.cell_id, url = %url, "Fetching cell state");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            return Err(ClientError::Protocol(format!(
                "state fetch returned {}",
                response.status()
            )));
        }

        response
            .json::<CellState>()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))
    }

    async fn perform(&self, work: Work) -> Result<Work, ClientError> {
        let url = format!("{}/work", self.base_url);
        debug!(
            cell_id = %self.cell_id,
            lrps = work.lrps.len(),
            tasks = work.tasks.len(),
            "Submitting work"
        );

        let response = self
            .client
            .post(&url)
            .json(&work)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !response.status().is_success() {
            return Err(ClientError::Protocol(format!(
                "work submission returned {}",
                response.status()
            )));
        }

        response
            .json::<Work>()
            .await
            .map_err(|e| ClientError::Protocol(e.to_string()))
    }
}

fn transport_error(error: &reqwest::Error) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Transport(error.to_string())
    }
}

/// A fixed fleet from configuration.
///
/// The directory trait is the seam where service discovery would plug in;
/// this implementation simply hands back the same clients every round.
pub struct StaticCellDirectory {
    clients: BTreeMap<String, Arc<dyn CellClient>>,
}

impl StaticCellDirectory {
    pub fn new(cells: &[(String, String)]) -> Self {
        let clients = cells
            .iter()
            .map(|(cell_id, url)| {
                let client: Arc<dyn CellClient> =
                    Arc::new(HttpCellClient::new(cell_id.clone(), url.clone()));
                (cell_id.clone(), client)
            })
            .collect();
        Self { clients }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl CellDirectory for StaticCellDirectory {
    async fn cell_clients(&self) -> Result<BTreeMap<String, Arc<dyn CellClient>>, ClientError> {
        Ok(self.clients.clone())
    }
}
