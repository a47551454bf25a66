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

//! Sessions read plane: listings, metadata, events, and replay
//! retrieval for the dashboard collaborator.
//!
//! Responses never include the stored embedding vector.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sessionscope_core::SessionRecord;

use crate::api::{authorize_session, ApiError, AppState};
use crate::auth::AuthContext;
use crate::validation::parse_uuid;

/// Query parameters for listing sessions
#[derive(Debug, Deserialize)]
pub struct SessionQueryParams {
    /// Offset for pagination
    #[serde(default)]
    pub from: usize,

    /// Page size
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_count() -> usize {
    20
}

/// Session metadata as exposed to callers. The embedding vector is
/// deliberately absent.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub uuid: String,
    #[serde(rename = "subUserUUID")]
    pub sub_user_uuid: String,
    #[serde(rename = "subUserIdentifier")]
    pub sub_user_identifier: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastPulse")]
    pub last_pulse: DateTime<Utc>,
    #[serde(rename = "replaySizeKB")]
    pub replay_size_kb: u64,
    pub tags: Vec<String>,
}

impl SessionSummary {
    pub fn from_record(state: &AppState, record: &SessionRecord) -> Self {
        let sub_user_identifier = state
            .sessions
            .get_sub_user(record.sub_user_uuid)
            .and_then(|u| u.identifier);
        Self {
            uuid: record.uuid.to_string(),
            sub_user_uuid: record.sub_user_uuid.to_string(),
            sub_user_identifier,
            created_at: record.created_at,
            last_pulse: record.last_pulse,
            replay_size_kb: record.replay_size_kb,
            tags: record.tags.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<SessionSummary>,
    pub total: usize,
}

/// GET /sessions - list the team's sessions, most recent first
#[tracing::instrument(skip(state, auth), fields(team_id = auth.team_id))]
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionQueryParams>,
    auth: Extension<AuthContext>,
) -> Result<Json<SessionsResponse>, ApiError> {
    let (records, total) = state
        .sessions
        .list_team_sessions(auth.team_id, params.from, params.count);
    debug!("listed {} of {} sessions", records.len(), total);

    let sessions = records
        .iter()
        .map(|r| SessionSummary::from_record(&state, r))
        .collect();

    Ok(Json(SessionsResponse { sessions, total }))
}

/// GET /sessions/:uuid - session metadata
#[tracing::instrument(skip(state, auth), fields(team_id = auth.team_id))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    auth: Extension<AuthContext>,
) -> Result<Json<SessionSummary>, ApiError> {
    let session_uuid = parse_uuid(&uuid, "sessionUUID")?;
    let record = authorize_session(&state, session_uuid, auth.team_id)?;
    Ok(Json(SessionSummary::from_record(&state, &record)))
}

#[derive(Debug, Serialize)]
pub struct EventView {
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub payload: Option<String>,
    pub uri: Option<String>,
}

/// GET /sessions/:uuid/events - the session's discrete events in order
#[tracing::instrument(skip(state, auth), fields(team_id = auth.team_id))]
pub async fn get_session_events(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    auth: Extension<AuthContext>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let session_uuid = parse_uuid(&uuid, "sessionUUID")?;
    authorize_session(&state, session_uuid, auth.team_id)?;

    let events = state
        .events
        .session_events(session_uuid)
        .into_iter()
        .map(|e| EventView {
            created_at: e.created_at,
            event_type: e.event_type,
            payload: e.payload,
            uri: e.uri,
        })
        .collect();

    Ok(Json(events))
}

/// GET /sessions/:uuid/replay - the canonical replay record stream
#[tracing::instrument(skip(state, auth), fields(team_id = auth.team_id))]
pub async fn get_session_replay(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    auth: Extension<AuthContext>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let session_uuid = parse_uuid(&uuid, "sessionUUID")?;
    authorize_session(&state, session_uuid, auth.team_id)?;

    let events = state.replays.fetch_events(auth.team_id, session_uuid)?;
    Ok(Json(events))
}
