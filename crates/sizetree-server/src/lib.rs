//! HTTP + WebSocket server
//!
//! Every WebSocket connection gets its own worker over the served report,
//! speaking the worker message protocol in text frames.

use std::sync::Arc;

use sizetree_fetch::{DataFetcher, Transport};
use sizetree_worker::{Worker, WorkerConfig, WorkerHandle};
use tokio::net::TcpListener;
use tracing::info;

pub mod handlers;
pub mod router;
pub mod websocket;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// What connections share: where the report lives and how to load it.
pub struct ServerState {
    pub url: String,
    pub worker_config: WorkerConfig,
    transport: Arc<dyn Transport>,
}

impl ServerState {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, worker_config: WorkerConfig) -> Self {
        Self {
            url: url.into(),
            worker_config,
            transport,
        }
    }

    /// A fresh worker with its own fetcher, for one client.
    pub fn spawn_worker(&self) -> WorkerHandle {
        let fetcher = DataFetcher::new(Arc::clone(&self.transport), self.url.clone(), self.worker_config.read_mode);
        Worker::spawn(self.worker_config.clone(), fetcher)
    }
}

pub struct SizetreeServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl SizetreeServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process exits.
    pub async fn start(self) -> anyhow::Result<()> {
        let address = self.config.address();
        let listener = TcpListener::bind(&address).await?;
        info!("Serving {} on http://{}", self.state.url, address);
        axum::serve(listener, router::create_router(self.state)).await?;
        Ok(())
    }
}
