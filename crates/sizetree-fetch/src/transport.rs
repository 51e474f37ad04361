//! Transports that produce response bodies for the data fetcher

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{FetchError, Result};

/// Body chunks in arrival order.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A response body that can be read incrementally or as a whole.
pub enum ResponseBody {
    Http(reqwest::Response),
    Chunks(ChunkStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Http(response) => f.debug_tuple("Http").field(&response.url().as_str()).finish(),
            ResponseBody::Chunks(_) => f.write_str("Chunks"),
        }
    }
}

impl ResponseBody {
    pub fn into_chunks(self) -> ChunkStream {
        match self {
            ResponseBody::Http(response) => Box::pin(response.bytes_stream().map_err(FetchError::from)),
            ResponseBody::Chunks(chunks) => chunks,
        }
    }

    /// Read the entire body as text.
    pub async fn text(self) -> Result<String> {
        match self {
            ResponseBody::Http(response) => Ok(response.text().await?),
            ResponseBody::Chunks(mut chunks) => {
                let mut body = Vec::new();
                while let Some(chunk) = chunks.next().await {
                    body.extend_from_slice(&chunk?);
                }
                String::from_utf8(body).map_err(|e| {
                    let line = e.as_bytes()[..e.utf8_error().valid_up_to()]
                        .iter()
                        .filter(|b| **b == b'\n')
                        .count();
                    FetchError::Utf8 { line: line + 1 }
                })
            }
        }
    }
}

/// Source of size report bodies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a request for `url` and return its body once headers are in.
    async fn get(&self, url: &str) -> Result<ResponseBody>;
}

/// Fetches over HTTP(S).
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<ResponseBody> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(ResponseBody::Http(response))
    }
}

/// Reads reports from the local filesystem. URLs are file paths.
#[derive(Debug, Clone, Default)]
pub struct FileTransport {
    root: Option<PathBuf>,
}

impl FileTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn get(&self, url: &str) -> Result<ResponseBody> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        };
        debug!("Reading {}", path.display());
        let file = tokio::fs::File::open(&path).await?;
        Ok(ResponseBody::Chunks(Box::pin(ReaderStream::new(file).map_err(FetchError::from))))
    }
}

/// In-memory bodies keyed by URL, delivered chunk by chunk.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    routes: HashMap<String, Vec<Bytes>>,
    chunk_delay: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`, split into chunks of at most `chunk_size` bytes.
    pub fn route(mut self, url: &str, body: &str, chunk_size: usize) -> Self {
        let chunks = body
            .as_bytes()
            .chunks(chunk_size.max(1))
            .map(Bytes::copy_from_slice)
            .collect();
        self.routes.insert(url.to_string(), chunks);
        self
    }

    /// Wait this long before every chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&self, url: &str) -> Result<ResponseBody> {
        let chunks = self
            .routes
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))?;
        let delay = self.chunk_delay;
        let stream = futures_util::stream::iter(chunks).then(move |chunk| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, FetchError>(chunk)
        });
        Ok(ResponseBody::Chunks(Box::pin(stream)))
    }
}
