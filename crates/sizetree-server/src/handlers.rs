//! REST API handlers

use std::sync::Arc;

use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::ServerState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// The report each connection loads.
    pub url: String,
}

pub async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        url: state.url.clone(),
    })
}
