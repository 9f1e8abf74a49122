// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Switch event feed for WebSocket clients.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::events::{EventFilter, SwitchEvent};
use crate::state::DirectoryState;
use crate::transport::auth;

/// Query parameters for the feed upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedQuery {
    pub token: Option<String>,
    /// `all` or a comma-separated list of initiators.
    #[serde(default)]
    pub initiator: String,
}

/// `GET /ws/switches`: WebSocket upgrade for the switch event feed.
pub async fn ws_handler(
    State(state): State<Arc<DirectoryState>>,
    Query(query): Query<FeedQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    if let Err(code) =
        auth::validate_ws_token(query.token.as_deref(), state.config.auth_token.as_deref())
    {
        return code.to_http_response("unauthorized");
    }

    let filter = EventFilter::parse(&query.initiator);
    ws.on_upgrade(move |socket| handle_feed(socket, state, filter)).into_response()
}

fn encode(event: &SwitchEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            tracing::warn!(err = %e, "failed to encode switch event");
            None
        }
    }
}

/// Per-connection feed loop: backfill current statuses, then stream events.
async fn handle_feed(socket: WebSocket, state: Arc<DirectoryState>, filter: EventFilter) {
    // Subscribe before the backfill so nothing falls in between.
    let mut rx = state.registry.events.subscribe();
    let (mut ws_tx, mut ws_rx) = socket.split();

    for status in state.registry.statuses().await {
        if !filter.wants(&status.initiator) {
            continue;
        }
        let Some(msg) = encode(&SwitchEvent::Status { status }) else {
            continue;
        };
        if ws_tx.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => break,

            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if !filter.wants(&event.initiator()) {
                            continue;
                        }
                        let Some(msg) = encode(&event) else {
                            continue;
                        };
                        if ws_tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(lagged = n, "switch feed client lagged, skipping");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            // The feed is read-only; client frames only matter for close.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

