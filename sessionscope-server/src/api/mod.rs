// Copyright 2025 SessionScope (https://github.com/sessionscope)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! HTTP API: shared state, the error-to-status mapping, and the
//! session-ownership authorization step that guards every
//! session-scoped mutation.

pub mod events;
pub mod health;
pub mod identity;
pub mod keys;
pub mod replay;
pub mod sessions;
pub mod similarity;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use sessionscope_core::SessionRecord;
use sessionscope_index::EmbeddingProvider;
use sessionscope_storage::{EventStore, KeyStore, MetricStore, ReplayStore, SessionStore};

use crate::auth::ApiKeyService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub events: Arc<EventStore>,
    pub metrics: Arc<MetricStore>,
    pub keys: Arc<KeyStore>,
    pub replays: Arc<ReplayStore>,
    pub key_service: Arc<ApiKeyService>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(detail) => {
                // Detail stays server-side; the caller gets a generic message.
                tracing::error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl From<sessionscope_core::Error> for ApiError {
    fn from(err: sessionscope_core::Error) -> Self {
        match err {
            sessionscope_core::Error::Validation(msg) => ApiError::BadRequest(msg),
            sessionscope_core::Error::Unauthorized => ApiError::Unauthorized,
            sessionscope_core::Error::Forbidden(msg) => ApiError::Forbidden(msg),
            sessionscope_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Resolve a session and verify it belongs to the authenticated team.
///
/// This runs before every session-scoped mutation and fails closed: a
/// valid key for one team can never write into another team's session.
pub(crate) fn authorize_session(
    state: &AppState,
    session_uuid: Uuid,
    team_id: i64,
) -> Result<SessionRecord, ApiError> {
    let session = state
        .sessions
        .get_session(session_uuid)
        .ok_or_else(|| ApiError::NotFound(format!("session {session_uuid} not found")))?;

    if session.team_id != team_id {
        return Err(ApiError::Forbidden(
            "session does not belong to the authenticated team".to_string(),
        ));
    }

    Ok(session)
}
