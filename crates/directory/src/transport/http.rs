// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the switch directory.
//!
//! Switch outcomes are protocol results returned with 200; malformed ids and
//! unknown path entities use the [`ApiError`] envelope.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use spaceswitch::protocol::{SwitchCommandRequest, SwitchRequest};
use spaceswitch::status::ShardStatusUpdate;
use spaceswitch::{CharacterId, SpaceId};

use crate::error::ApiError;
use crate::state::DirectoryState;

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub spaces: usize,
    pub characters: usize,
    pub switches: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceInfo {
    pub id: SpaceId,
    pub name: String,
    pub max_users: usize,
    pub character_count: usize,
    pub characters: Vec<CharacterId>,
}

// -- Path parsing -------------------------------------------------------------

fn parse_character(raw: &str) -> Result<CharacterId, Response> {
    raw.parse().map_err(|e| ApiError::BadRequest.to_http_response(format!("{e}")))
}

fn parse_space(raw: &str) -> Result<SpaceId, Response> {
    raw.parse().map_err(|e| ApiError::BadRequest.to_http_response(format!("{e}")))
}

/// Parse a path character and require it to exist in the world.
fn known_character(s: &DirectoryState, raw: &str) -> Result<CharacterId, Response> {
    let id = parse_character(raw)?;
    if s.world.character(&id).is_none() {
        return Err(ApiError::CharacterNotFound.to_http_response(format!("no character {id}")));
    }
    Ok(id)
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<DirectoryState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        spaces: s.world.space_count(),
        characters: s.world.character_count(),
        switches: s.registry.len().await,
    })
}

/// `GET /api/v1/spaces/{id}`: occupancy summary.
pub async fn space_info(
    State(s): State<Arc<DirectoryState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_space(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Some(space) = s.world.space(&id) else {
        return ApiError::SpaceNotFound.to_http_response(format!("no space {id}"));
    };
    let config = space.config();
    let characters = space.occupants();
    Json(SpaceInfo {
        id,
        name: config.name,
        max_users: config.max_users,
        character_count: characters.len(),
        characters,
    })
    .into_response()
}

/// `GET /api/v1/spaces/{id}/switches`: groups led from this space.
pub async fn space_switches(
    State(s): State<Arc<DirectoryState>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_space(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if s.world.space(&id).is_none() {
        return ApiError::SpaceNotFound.to_http_response(format!("no space {id}"));
    }
    Json(s.registry.statuses_in_space(&id).await).into_response()
}

/// `POST /api/v1/characters/{id}/switch`: start a group switch.
pub async fn request_switch(
    State(s): State<Arc<DirectoryState>>,
    Path(id): Path<String>,
    Json(req): Json<SwitchRequest>,
) -> Response {
    let initiator = match known_character(&s, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    Json(s.registry.request(initiator, req).await).into_response()
}

/// `POST /api/v1/characters/{id}/switch/go`: execute the pending group.
pub async fn execute_switch(
    State(s): State<Arc<DirectoryState>>,
    Path(id): Path<String>,
) -> Response {
    let initiator = match known_character(&s, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    Json(s.registry.execute(initiator).await).into_response()
}

/// `POST /api/v1/characters/{id}/switch/command`
pub async fn switch_command(
    State(s): State<Arc<DirectoryState>>,
    Path(id): Path<String>,
    Json(req): Json<SwitchCommandRequest>,
) -> Response {
    let actor = match known_character(&s, &id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    Json(s.registry.command(actor, req).await).into_response()
}

/// `GET /api/v1/switches/{initiator}`
pub async fn switch_status(
    State(s): State<Arc<DirectoryState>>,
    Path(initiator): Path<String>,
) -> Response {
    let initiator = match parse_character(&initiator) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match s.registry.status(&initiator).await {
        Some(status) => Json(status).into_response(),
        None => ApiError::SwitchNotFound.to_http_response(format!("no switch led by {initiator}")),
    }
}

/// `GET /api/v1/switches/{initiator}/client`: resolved client statuses.
pub async fn client_status(
    State(s): State<Arc<DirectoryState>>,
    Path(initiator): Path<String>,
) -> Response {
    let initiator = match parse_character(&initiator) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match s.registry.status(&initiator).await {
        Some(status) => Json(status.client_statuses()).into_response(),
        None => ApiError::SwitchNotFound.to_http_response(format!("no switch led by {initiator}")),
    }
}

/// `POST /api/v1/switches/{initiator}/refresh`: re-resolve against the world.
pub async fn refresh_switch(
    State(s): State<Arc<DirectoryState>>,
    Path(initiator): Path<String>,
) -> Response {
    let initiator = match parse_character(&initiator) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    Json(s.registry.refresh(&initiator).await).into_response()
}

/// `POST /api/v1/shard/switch-status`: sparse status push from a shard.
pub async fn shard_update(
    State(s): State<Arc<DirectoryState>>,
    Json(update): Json<ShardStatusUpdate>,
) -> impl IntoResponse {
    Json(s.registry.apply_shard_update(update).await)
}
