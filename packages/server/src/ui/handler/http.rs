//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::{infrastructure::dto::http::PresenceEntryDto, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Debug endpoint listing every online user and their live connections
pub async fn debug_presence(State(state): State<Arc<AppState>>) -> Json<Vec<PresenceEntryDto>> {
    let entries = state.gateway.presence_snapshot().await;

    // Domain Model から DTO への変換
    Json(entries.into_iter().map(PresenceEntryDto::from).collect())
}
