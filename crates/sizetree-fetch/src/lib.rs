//! Streaming fetch of newline-delimited JSON size reports
//!
//! This crate issues abortable requests through a pluggable [`Transport`]
//! and decodes the response body into one JSON value per line, either
//! incrementally as chunks arrive or from the whole body at once.

pub mod error;
pub mod ndjson;
pub mod transport;
pub mod fetcher;


pub use error::{FetchError, Result};
pub use fetcher::{DataFetcher, ReadMode};
pub use ndjson::LineDecoder;
pub use transport::{ChunkStream, FileTransport, HttpTransport, MemoryTransport, ResponseBody, Transport};
