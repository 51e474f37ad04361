//! Abortable fetch of a newline-delimited JSON resource

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{FetchError, Result};
use crate::ndjson::{parse_document, LineDecoder};
use crate::transport::{ResponseBody, Transport};

/// How the response body is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadMode {
    /// Decode chunks as they arrive.
    #[default]
    Streaming,
    /// Read the whole body, then split it into lines.
    Buffered,
}

struct Pending {
    token: CancellationToken,
    response: JoinHandle<Result<ResponseBody>>,
}

#[derive(Default)]
struct FetchState {
    url: String,
    /// Token of the most recent request, kept after its response is taken.
    token: Option<CancellationToken>,
    pending: Option<Pending>,
}

/// Fetches a size report and yields its records.
///
/// Starting a new fetch aborts the previous one, so only the most recent
/// request's records are ever yielded.
pub struct DataFetcher {
    transport: Arc<dyn Transport>,
    mode: ReadMode,
    state: Mutex<FetchState>,
}

impl std::fmt::Debug for DataFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFetcher")
            .field("url", &self.state().url)
            .field("mode", &self.mode)
            .finish()
    }
}

impl DataFetcher {
    pub fn new(transport: Arc<dyn Transport>, url: impl Into<String>, mode: ReadMode) -> Self {
        DataFetcher {
            transport,
            mode,
            state: Mutex::new(FetchState {
                url: url.into(),
                ..FetchState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> ReadMode {
        self.mode
    }

    pub fn url(&self) -> String {
        self.state().url.clone()
    }

    /// Point later fetches at a different resource.
    pub fn set_url(&self, url: impl Into<String>) {
        self.state().url = url.into();
    }

    /// Issue the request, aborting any request still in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch(&self) {
        let mut state = self.state();
        let pending = self.start_request(&mut state);
        state.pending = Some(pending);
    }

    fn start_request(&self, state: &mut FetchState) -> Pending {
        let token = CancellationToken::new();
        if let Some(previous) = state.token.replace(token.clone()) {
            if !previous.is_cancelled() {
                debug!("Cancelling previous request for {}", state.url);
            }
            previous.cancel();
        }

        let transport = Arc::clone(&self.transport);
        let url = state.url.clone();
        let request_token = token.clone();
        let response = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = request_token.cancelled() => Err(FetchError::Aborted),
                response = transport.get(&url) => response,
            }
        });
        Pending { token, response }
    }

    /// Abort the current request, if any.
    pub fn abort(&self) {
        if let Some(token) = &self.state().token {
            info!("Aborting request");
            token.cancel();
        }
    }

    /// The pending request, or a fresh one if none was issued.
    fn take_pending(&self) -> Pending {
        let mut state = self.state();
        match state.pending.take() {
            Some(pending) => pending,
            None => self.start_request(&mut state),
        }
    }

    /// Records of the current response, one JSON value per line.
    ///
    /// The stream is finite and consumes the pending request; call
    /// [`DataFetcher::fetch`] again to read the resource anew. If the request
    /// is aborted, the stream yields [`FetchError::Aborted`] once and ends.
    pub fn newline_delimited_json_stream(&self) -> impl Stream<Item = Result<Value>> + Send + use<> {
        let Pending { token, response } = self.take_pending();
        let mode = self.mode;

        stream! {
            let body = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchError::Aborted),
                joined = response => joined.map_err(FetchError::from).and_then(|body| body),
            };
            let body = match body {
                Ok(body) => body,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            match mode {
                ReadMode::Streaming => {
                    let mut chunks = body.into_chunks();
                    let mut decoder = LineDecoder::new();
                    loop {
                        let next = tokio::select! {
                            biased;
                            _ = token.cancelled() => Some(Err(FetchError::Aborted)),
                            chunk = chunks.next() => chunk,
                        };
                        let chunk = match next {
                            Some(Ok(chunk)) => chunk,
                            Some(Err(e)) => {
                                yield Err(e);
                                return;
                            }
                            None => break,
                        };
                        for value in decoder.push(&chunk) {
                            if token.is_cancelled() {
                                yield Err(FetchError::Aborted);
                                return;
                            }
                            let failed = value.is_err();
                            yield value;
                            if failed {
                                return;
                            }
                        }
                    }
                    debug!("Body complete after {} lines", decoder.lines_read());
                    match decoder.finish() {
                        Ok(Some(value)) => yield Ok(value),
                        Ok(None) => {}
                        Err(e) => yield Err(e),
                    }
                }
                ReadMode::Buffered => {
                    let text = tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(FetchError::Aborted),
                        text = body.text() => text,
                    };
                    let text = match text {
                        Ok(text) => text,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    let values = parse_document(&text);
                    debug!("Body complete with {} records", values.len());
                    for value in values {
                        if token.is_cancelled() {
                            yield Err(FetchError::Aborted);
                            return;
                        }
                        yield value;
                    }
                }
            }
        }
    }
}
