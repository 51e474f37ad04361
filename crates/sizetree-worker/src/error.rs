//! Worker errors

use sizetree_fetch::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("No tree has been built yet")]
    NoBuild,
    #[error("No node at {0:?}")]
    NotFound(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Malformed record: {0}")]
    Record(#[from] serde_json::Error),
    #[error("Invalid config {path}: {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Worker has shut down")]
    Closed,
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl WorkerError {
    /// A superseded or cancelled load. Not reported as a failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, WorkerError::Fetch(e) if e.is_abort())
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
