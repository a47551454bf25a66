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

//! Identity endpoints: sub-user minting, session minting, and the
//! identify link.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sessionscope_core::validation::{validate_identifier, validate_tags};

use crate::api::{ApiError, AppState};
use crate::auth::AuthContext;
use crate::validation::{parse_body, parse_uuid};

#[derive(Debug, Serialize)]
pub struct UuidResponse {
    pub uuid: String,
}

/// GET /generate-user-uuid - mint an opaque sub-user for the team
#[tracing::instrument(skip(state, auth), fields(team_id = auth.team_id))]
pub async fn generate_user_uuid(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
) -> Result<Json<UuidResponse>, ApiError> {
    let uuid = state.sessions.insert_sub_user(auth.team_id, Utc::now());
    debug!("minted sub-user {uuid}");
    Ok(Json(UuidResponse {
        uuid: uuid.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SessionUuidQuery {
    #[serde(rename = "userUUID")]
    pub user_uuid: Option<String>,
    /// JSON-encoded array of tags, as the agent sends it in the query
    /// string.
    pub tags: Option<String>,
}

/// GET /generate-session-uuid - mint a session for an existing sub-user.
///
/// The 5-minute reuse rule is applied client-side; every call here
/// creates a fresh session row.
#[tracing::instrument(skip(state, auth, query), fields(team_id = auth.team_id))]
pub async fn generate_session_uuid(
    State(state): State<AppState>,
    Query(query): Query<SessionUuidQuery>,
    auth: Extension<AuthContext>,
) -> Result<Json<UuidResponse>, ApiError> {
    let tags = match query.tags.as_deref() {
        Some(raw) => {
            let tags: Vec<String> = serde_json::from_str(raw)
                .map_err(|_| ApiError::BadRequest("\"tags\" must be a JSON array".to_string()))?;
            validate_tags(&tags)?;
            tags
        }
        None => Vec::new(),
    };

    let user_uuid = query
        .user_uuid
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("\"userUUID\" is required".to_string()))?;
    let user_uuid = parse_uuid(user_uuid, "userUUID")?;

    let uuid = state
        .sessions
        .insert_session(auth.team_id, user_uuid, tags, Utc::now())?;
    debug!("minted session {uuid} for sub-user {user_uuid}");

    Ok(Json(UuidResponse {
        uuid: uuid.to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct IdentifyUserRequest {
    #[serde(rename = "userUUID")]
    pub user_uuid: String,
    pub identifier: String,
}

/// POST /identify-user - link a sub-user to an application identifier
#[tracing::instrument(skip(state, auth, body), fields(team_id = auth.team_id))]
pub async fn identify_user(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: IdentifyUserRequest = parse_body(body)?;
    let user_uuid = parse_uuid(&request.user_uuid, "userUUID")?;
    validate_identifier(&request.identifier)?;

    if !state
        .sessions
        .set_identifier(auth.team_id, user_uuid, &request.identifier)
    {
        return Err(ApiError::NotFound(format!(
            "sub-user {user_uuid} not found"
        )));
    }

    Ok(Json(serde_json::json!({})))
}
