//! Load sessions and the request loop

use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use serde_json::Value;
use sizetree_core::{
    parse_options, BuildOptions, FileEntry, FormattedNode, Meta, TreeBuilder, DEFAULT_DEPTH,
};
use sizetree_fetch::DataFetcher;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::protocol::{Action, Exchange, ProgressMessage, Request, Response};

const REQUEST_QUEUE: usize = 32;

/// State shared by the request loop and its load sessions.
struct Shared {
    config: WorkerConfig,
    fetcher: DataFetcher,
    responses: mpsc::UnboundedSender<Response>,
    /// Most recent load started; older sessions must not replace its tree.
    generation: AtomicU64,
    last_build: RwLock<Option<TreeBuilder>>,
}

impl Shared {
    fn send(&self, response: Response) {
        if self.responses.send(response).is_err() {
            debug!("Response receiver dropped");
        }
    }

    async fn run_load<S>(&self, id: u64, generation: u64, options: BuildOptions, records: S)
    where
        S: Stream<Item = sizetree_fetch::Result<Value>>,
    {
        let mut session = Session::new(options);
        match session.ingest(records, self).await {
            Ok(()) => {
                let diff_mode = session.meta.diff_mode;
                let builder = session.finish();
                let root = builder.format_node(builder.build(), DEFAULT_DEPTH);
                info!("Load {} complete: {} nodes", id, builder.node_count());
                // Store before replying so an `open` sent after the reply sees this tree.
                if self.generation.load(Ordering::SeqCst) == generation {
                    *self.last_build.write().await = Some(builder);
                }
                self.send(Response::Progress(ProgressMessage::snapshot(root.clone(), 1.0, diff_mode)));
                self.send(Response::Reply { id, result: root });
            }
            Err(e) if e.is_abort() => {
                info!("Load {} aborted", id);
                self.send(Response::Reply { id, result: None });
            }
            Err(e) => {
                error!("Load {} failed: {}", id, e);
                let message = e.to_string();
                self.send(Response::Progress(ProgressMessage::failed(message.clone(), session.meta.diff_mode)));
                self.send(Response::Failure { id, error: message });
            }
        }
    }
}

/// One pass over a size report.
struct Session {
    options: BuildOptions,
    meta: Meta,
    builder: Option<TreeBuilder>,
}

impl Session {
    fn new(options: BuildOptions) -> Self {
        Self {
            options,
            meta: Meta::default(),
            builder: None,
        }
    }

    fn start(&mut self, meta: Meta) {
        debug!(
            "Session started: {} components, total {}, diff mode {}",
            meta.components.len(),
            meta.total,
            meta.diff_mode
        );
        self.builder = Some(new_builder(&self.options, &meta));
        self.meta = meta;
    }

    fn percent(&self, floor: f64) -> f64 {
        let ingested = self.builder.as_ref().map_or(0.0, TreeBuilder::ingested_bytes);
        let estimate = if self.meta.total > 0.0 { ingested / self.meta.total } else { 0.0 };
        estimate.max(floor).min(1.0)
    }

    fn snapshot(&self, floor: f64) -> ProgressMessage {
        let root = self
            .builder
            .as_ref()
            .and_then(|builder| builder.format_node(builder.build(), DEFAULT_DEPTH));
        ProgressMessage::snapshot(root, self.percent(floor), self.meta.diff_mode)
    }

    /// Consume every record. The first is the report's metadata.
    ///
    /// Snapshots go out right after the metadata and then on every tick of
    /// the snapshot timer. Ticks are only observed between records.
    async fn ingest<S>(&mut self, records: S, shared: &Shared) -> Result<()>
    where
        S: Stream<Item = sizetree_fetch::Result<Value>>,
    {
        let mut records = pin!(records);
        let Some(first) = records.next().await else {
            return Ok(());
        };
        self.start(serde_json::from_value(first?)?);

        let floor = shared.config.min_progress;
        shared.send(Response::Progress(self.snapshot(floor)));

        let period = shared.config.snapshot_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => shared.send(Response::Progress(self.snapshot(floor))),
                record = records.next() => match record {
                    Some(record) => {
                        let entry: FileEntry = serde_json::from_value(record?)?;
                        if let Some(builder) = self.builder.as_mut() {
                            builder.add_file_entry(&entry);
                        }
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// The finished tree. An empty report still yields a bare root.
    fn finish(self) -> TreeBuilder {
        let Session { options, meta, builder } = self;
        builder.unwrap_or_else(|| new_builder(&options, &meta))
    }
}

fn new_builder(options: &BuildOptions, meta: &Meta) -> TreeBuilder {
    let group_by = options.group_by;
    TreeBuilder::new(group_by.path_fn(meta), options.filter.clone().into_filter_fn())
        .with_separator(group_by.separator())
}

/// Answers load and open requests against one data source.
#[derive(Clone)]
pub struct Worker {
    shared: Arc<Shared>,
}

impl Worker {
    pub fn new(config: WorkerConfig, fetcher: DataFetcher, responses: mpsc::UnboundedSender<Response>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                fetcher,
                responses,
                generation: AtomicU64::new(0),
                last_build: RwLock::new(None),
            }),
        }
    }

    /// Run a worker on its own task, fed by the returned handle.
    pub fn spawn(config: WorkerConfig, fetcher: DataFetcher) -> WorkerHandle {
        let (request_tx, mut request_rx) = mpsc::channel::<Request>(REQUEST_QUEUE);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let worker = Worker::new(config, fetcher, response_tx);

        let task = tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                worker.handle(request).await;
            }
            debug!("Request queue closed");
            worker.shared.fetcher.abort();
        });

        WorkerHandle {
            requests: request_tx,
            responses: response_rx,
            next_id: 1,
            task,
        }
    }

    pub async fn handle(&self, request: Request) {
        debug!("Request {} {:?} {:?}", request.id, request.action, request.data());
        match request.action {
            Action::Load => {
                self.load(request.id, request.data());
            }
            Action::Open => {
                let response = match self.open(request.data()).await {
                    Ok(node) => Response::Reply {
                        id: request.id,
                        result: Some(node),
                    },
                    Err(e) => Response::Failure {
                        id: request.id,
                        error: e.to_string(),
                    },
                };
                self.shared.send(response);
            }
        }
    }

    /// Start building a tree in the background, aborting any load still running.
    pub fn load(&self, id: u64, query: &str) -> JoinHandle<()> {
        let options = parse_options(query, &self.shared.config.symbol_types);
        debug!("Load {} options: {:?}", id, options);
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.shared.fetcher.fetch();
        let records = self.shared.fetcher.newline_delimited_json_stream();

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.run_load(id, generation, options, records).await })
    }

    /// Format `id_path` from the last completed tree.
    pub async fn open(&self, id_path: &str) -> Result<FormattedNode> {
        let last_build = self.shared.last_build.read().await;
        let builder = last_build.as_ref().ok_or(WorkerError::NoBuild)?;
        builder
            .format_path(id_path, DEFAULT_DEPTH)
            .ok_or_else(|| WorkerError::NotFound(id_path.to_string()))
    }
}

/// Client side of a spawned [`Worker`].
#[derive(Debug)]
pub struct WorkerHandle {
    requests: mpsc::Sender<Request>,
    responses: mpsc::UnboundedReceiver<Response>,
    next_id: u64,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// A request id not used by [`WorkerHandle::call`] yet.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub async fn send(&self, request: Request) -> Result<()> {
        self.requests.send(request).await.map_err(|_| WorkerError::Closed)
    }

    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }

    /// Send a request and wait for its answer, collecting progress pushed meanwhile.
    pub async fn call(&mut self, action: Action, data: impl Into<String>) -> Result<Exchange> {
        let id = self.next_id();
        self.send(Request::new(id, action, data)).await?;

        let mut progress = Vec::new();
        loop {
            match self.recv().await.ok_or(WorkerError::Closed)? {
                Response::Progress(message) => progress.push(message),
                response if response.id() == id => return Ok(Exchange { progress, response }),
                response => debug!("Skipping answer to request {}", response.id()),
            }
        }
    }

    /// Raw channels, for bridging to another transport. The worker task keeps running.
    pub fn into_parts(self) -> (mpsc::Sender<Request>, mpsc::UnboundedReceiver<Response>) {
        (self.requests, self.responses)
    }

    /// Close the request queue, abort any running load and wait for the loop to stop.
    pub async fn shutdown(self) -> Result<()> {
        let WorkerHandle { requests, task, .. } = self;
        drop(requests);
        task.await?;
        Ok(())
    }
}
