//! Messages exchanged between a worker and its consumer

use serde::{Deserialize, Serialize};
use sizetree_core::FormattedNode;

/// Id carried by every unsolicited progress message.
pub const PROGRESS_ID: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Build a tree. `data` is the options query string.
    Load,
    /// Format a node of the last completed tree. `data` is its idPath.
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub action: Action,
    #[serde(default)]
    pub data: Option<String>,
}

impl Request {
    pub fn new(id: u64, action: Action, data: impl Into<String>) -> Self {
        Self {
            id,
            action,
            data: Some(data.into()),
        }
    }

    pub fn data(&self) -> &str {
        self.data.as_deref().unwrap_or("")
    }
}

/// Snapshot of a running or finished load.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<FormattedNode>,
    pub percent: f64,
    pub diff_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressMessage {
    pub fn snapshot(root: Option<FormattedNode>, percent: f64, diff_mode: bool) -> Self {
        Self {
            id: PROGRESS_ID,
            root,
            percent,
            diff_mode,
            error: None,
        }
    }

    pub fn failed(error: String, diff_mode: bool) -> Self {
        Self {
            id: PROGRESS_ID,
            root: None,
            percent: 1.0,
            diff_mode,
            error: Some(error),
        }
    }
}

/// Everything a worker sends back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Progress(ProgressMessage),
    /// `result` is null when a load was aborted.
    Reply { id: u64, result: Option<FormattedNode> },
    Failure { id: u64, error: String },
}

impl Response {
    /// Id of the request this answers; [`PROGRESS_ID`] for progress.
    pub fn id(&self) -> u64 {
        match self {
            Response::Progress(progress) => progress.id,
            Response::Reply { id, .. } | Response::Failure { id, .. } => *id,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// The messages produced by one request: progress pushed while it ran, then its answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub progress: Vec<ProgressMessage>,
    pub response: Response,
}

impl Exchange {
    /// The last progress message, which for a finished load holds the complete tree.
    pub fn final_progress(&self) -> Option<&ProgressMessage> {
        self.progress.last()
    }

    pub fn result(&self) -> std::result::Result<Option<&FormattedNode>, &str> {
        match &self.response {
            Response::Reply { result, .. } => Ok(result.as_ref()),
            Response::Failure { error, .. } => Err(error.as_str()),
            Response::Progress(_) => Ok(None),
        }
    }
}
