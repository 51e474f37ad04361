//! WebSocket bridge to a per-connection worker

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sizetree_worker::Request;
use tracing::{debug, info, warn};

use crate::ServerState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Parse one text frame. Malformed frames are logged and dropped.
pub fn parse_request(text: &str) -> Option<Request> {
    match serde_json::from_str(text) {
        Ok(request) => Some(request),
        Err(e) => {
            warn!("Failed to parse WebSocket request: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (requests, mut responses) = state.spawn_worker().into_parts();

    // Closing the request queue stops the worker and aborts its load.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Received WebSocket message: {}", text);
                    let Some(request) = parse_request(&text) else {
                        continue;
                    };
                    if requests.send(request).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    let mut send_task = tokio::spawn(async move {
        while let Some(response) = responses.recv().await {
            let json = match response.to_json() {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to serialize response {}: {}", response.id(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                debug!("Failed to send message to WebSocket client");
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket connection closed");
}
