//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use sizetree_fetch::{DataFetcher, FileTransport, HttpTransport, ReadMode, Transport};
use sizetree_server::{ServerConfig, ServerState, SizetreeServer};
use sizetree_worker::{Action, Exchange, Worker, WorkerConfig, WorkerHandle};

/// Config file, then `SIZETREE_*` environment overrides.
pub fn worker_config(path: Option<&Path>) -> anyhow::Result<WorkerConfig> {
    WorkerConfig::load(path).context("Failed to load worker config")
}

/// `--buffered` wins over the config file and environment.
pub fn with_read_mode(mut config: WorkerConfig, buffered: bool) -> WorkerConfig {
    if buffered {
        config.read_mode = ReadMode::Buffered;
    }
    config
}

/// HTTP(S) URLs are fetched over the network, anything else is read from disk.
pub fn transport_for(source: &str) -> Arc<dyn Transport> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Arc::new(HttpTransport::new())
    } else {
        Arc::new(FileTransport::new())
    }
}

fn spawn_worker(source: &str, config: WorkerConfig) -> WorkerHandle {
    let fetcher = DataFetcher::new(transport_for(source), source, config.read_mode);
    Worker::spawn(config, fetcher)
}

async fn load_tree(worker: &mut WorkerHandle, options: &str) -> anyhow::Result<Exchange> {
    let exchange = worker.call(Action::Load, options).await?;
    if let Err(error) = exchange.result() {
        bail!("Load failed: {}", error);
    }
    Ok(exchange)
}

pub async fn serve(url: String, host: String, port: u16, config: WorkerConfig) -> anyhow::Result<()> {
    tracing::info!("Starting sizetree server on {}:{}", host, port);

    let state = ServerState::new(transport_for(&url), url, config);
    let server = SizetreeServer::new(state, ServerConfig { host, port });
    server.start().await
}

pub async fn load(source: &str, options: &str, config: WorkerConfig) -> anyhow::Result<()> {
    let mut worker = spawn_worker(source, config);
    let exchange = load_tree(&mut worker, options).await?;

    let progress = exchange.final_progress().context("Load finished without a tree")?;
    println!("{}", serde_json::to_string_pretty(progress)?);
    worker.shutdown().await?;
    Ok(())
}

pub async fn open(source: &str, id_path: &str, options: &str, config: WorkerConfig) -> anyhow::Result<()> {
    let mut worker = spawn_worker(source, config);
    load_tree(&mut worker, options).await?;

    let exchange = worker.call(Action::Open, id_path).await?;
    match exchange.result() {
        Ok(Some(node)) => println!("{}", serde_json::to_string_pretty(node)?),
        Ok(None) => bail!("No node at {:?}", id_path),
        Err(error) => bail!("{}", error),
    }
    worker.shutdown().await?;
    Ok(())
}
