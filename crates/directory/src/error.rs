// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failures of a directory request itself.
//!
//! A switch that is denied, not ready, or full is a normal answer and is
//! returned as a `result` envelope with HTTP 200. [`ApiError`] only covers
//! requests the directory could not act on at all.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    /// Missing or wrong bearer token (or `?token=` on the feed).
    Unauthorized,
    /// Malformed path identifier or request body.
    BadRequest,
    /// No character with that id is hosted here.
    CharacterNotFound,
    SpaceNotFound,
    /// The named initiator has no pending group.
    SwitchNotFound,
    Internal,
}

impl ApiError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::CharacterNotFound | Self::SpaceNotFound | Self::SwitchNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code clients match on, e.g. `SPACE_NOT_FOUND`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::CharacterNotFound => "CHARACTER_NOT_FOUND",
            Self::SpaceNotFound => "SPACE_NOT_FOUND",
            Self::SwitchNotFound => "SWITCH_NOT_FOUND",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    /// `{"error": {"code", "message"}}` with the matching status.
    pub fn to_http_response(&self, message: impl Into<String>) -> Response {
        let body = ErrorResponse { error: self.to_error_body(message) };
        (self.http_status(), Json(body)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
