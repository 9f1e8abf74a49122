// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the switch directory.

pub mod auth;
pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::DirectoryState;

/// Build the axum `Router` with all directory routes.
pub fn build_router(state: Arc<DirectoryState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Spaces
        .route("/api/v1/spaces/{id}", get(http::space_info))
        .route("/api/v1/spaces/{id}/switches", get(http::space_switches))
        // Character-initiated operations
        .route("/api/v1/characters/{id}/switch", post(http::request_switch))
        .route("/api/v1/characters/{id}/switch/go", post(http::execute_switch))
        .route("/api/v1/characters/{id}/switch/command", post(http::switch_command))
        // Group read model
        .route("/api/v1/switches/{initiator}", get(http::switch_status))
        .route("/api/v1/switches/{initiator}/client", get(http::client_status))
        .route("/api/v1/switches/{initiator}/refresh", post(http::refresh_switch))
        // Shard push
        .route("/api/v1/shard/switch-status", post(http::shard_update))
        // Event feed
        .route("/ws/switches", get(ws::ws_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
