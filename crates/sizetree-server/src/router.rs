//! Axum router setup

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::{handlers::health_check, websocket::ws_handler, ServerState};

pub fn create_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/health", get(health_check))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizetree_fetch::MemoryTransport;
    use sizetree_worker::WorkerConfig;

    #[test]
    fn test_router_creation() {
        let state = Arc::new(ServerState::new(Arc::new(MemoryTransport::new()), "report", WorkerConfig::default()));
        let _router = create_router(state);
    }
}
