//! Errors raised while fetching and decoding a size report

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request was superseded by a newer one or cancelled explicitly.
    #[error("Request aborted")]
    Aborted,
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Malformed JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("Line {line} is not valid UTF-8")]
    Utf8 { line: usize },
    #[error("No response for {0}")]
    NotFound(String),
    #[error("Fetch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FetchError {
    /// Cancellation is expected and should not be reported as a failure.
    pub fn is_abort(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
