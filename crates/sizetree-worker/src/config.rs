//! Worker configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sizetree_core::SymbolTypes;
use sizetree_fetch::ReadMode;
use tracing::{debug, warn};

use crate::error::{Result, WorkerError};

pub const SNAPSHOT_INTERVAL_ENV: &str = "SIZETREE_SNAPSHOT_INTERVAL_MS";
pub const BUFFERED_ENV: &str = "SIZETREE_BUFFERED";

/// Tunables for load sessions.
///
/// Read from an optional TOML file; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Time between progress snapshots while a load is running.
    pub snapshot_interval_ms: u64,
    /// Lowest percentage reported while loading.
    pub min_progress: f64,
    pub read_mode: ReadMode,
    /// Every symbol type tag the reports may contain.
    pub symbol_types: SymbolTypes,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: 1000,
            min_progress: 0.1,
            read_mode: ReadMode::Streaming,
            symbol_types: SymbolTypes::default(),
        }
    }
}

impl WorkerConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self> {
        toml::from_str(text).map_err(|source| WorkerError::Config {
            path: origin.to_string(),
            source,
        })
    }

    /// Load `path` if given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!("Loading worker config from {}", path.display());
                let text = std::fs::read_to_string(path)?;
                Self::from_toml(&text, &path.display().to_string())?
            }
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply `SIZETREE_*` variables from the environment or a `.env` file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = dotenvy::var(SNAPSHOT_INTERVAL_ENV) {
            match value.trim().parse() {
                Ok(ms) => self.snapshot_interval_ms = ms,
                Err(_) => warn!("Ignoring {}={:?}", SNAPSHOT_INTERVAL_ENV, value),
            }
        }
        if let Ok(value) = dotenvy::var(BUFFERED_ENV) {
            if matches!(value.trim(), "1" | "true" | "yes") {
                self.read_mode = ReadMode::Buffered;
            }
        }
        self
    }

    pub fn snapshot_interval(&self) -> Duration {
        // A zero period would make the interval timer panic.
        Duration::from_millis(self.snapshot_interval_ms.max(1))
    }
}
