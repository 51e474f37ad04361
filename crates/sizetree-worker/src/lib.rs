//! Load sessions, progress snapshots and subtree queries
//!
//! A [`Worker`] owns one [`DataFetcher`](sizetree_fetch::DataFetcher) and
//! answers [`Request`]s arriving on a queue. Every reply, and every progress
//! snapshot pushed while a tree is loading, goes out on a single response
//! channel.

pub mod config;
pub mod error;
pub mod protocol;
pub mod worker;


pub use config::WorkerConfig;
pub use error::{Result, WorkerError};
pub use protocol::{Action, Exchange, ProgressMessage, Request, Response};
pub use worker::{Worker, WorkerHandle};
