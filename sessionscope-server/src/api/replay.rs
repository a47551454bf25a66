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

//! Replay ingestion: rolling appends and the end-of-session compaction.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use sessionscope_storage::ReplayStore;

use crate::api::{authorize_session, ApiError, AppState};
use crate::auth::{bearer_token, AuthContext};
use crate::validation::{parse_body, parse_uuid};

#[derive(Debug, Deserialize)]
pub struct AppendReplayRequest {
    #[serde(rename = "sessionUUID")]
    pub session_uuid: String,
    pub events: Vec<serde_json::Value>,
}

/// POST /append-replay-events - append a batch to the session's live
/// replay object and refresh the advisory size
#[tracing::instrument(skip(state, auth, body), fields(team_id = auth.team_id))]
pub async fn append_replay_events(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: AppendReplayRequest = parse_body(body)?;
    let session_uuid = parse_uuid(&request.session_uuid, "sessionUUID")?;

    authorize_session(&state, session_uuid, auth.team_id)?;
    state.sessions.touch_pulse(session_uuid, Utc::now());

    if !request.events.is_empty() {
        let bytes = state
            .replays
            .append_events(auth.team_id, session_uuid, &request.events)?;
        state
            .sessions
            .set_replay_size(session_uuid, ReplayStore::size_kb(bytes));
        debug!(session = %session_uuid, bytes, "replay batch appended");
    }

    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct EndSessionRequest {
    #[serde(rename = "sessionUUID")]
    pub session_uuid: String,
    #[serde(rename = "replayEvents")]
    pub replay_events: Vec<serde_json::Value>,
    #[serde(rename = "hasBeenRecordingReplay", default = "default_true")]
    pub has_been_recording_replay: bool,
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

fn default_true() -> bool {
    true
}

/// POST /end-session - final replay flush plus compaction.
///
/// This arrives as a page-unload beacon, which cannot always carry
/// headers, so the API key may ride the body instead. Authentication is
/// therefore in-handler rather than in the bearer middleware.
#[tracing::instrument(skip(state, headers, body))]
pub async fn end_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: EndSessionRequest = parse_body(body)?;
    let session_uuid = parse_uuid(&request.session_uuid, "sessionUUID")?;

    let presented = bearer_token(&headers)
        .or(request.api_key.as_deref())
        .ok_or(ApiError::Unauthorized)?;
    let team_id = state
        .key_service
        .match_key(presented)
        .ok_or(ApiError::Unauthorized)?;
    let auth = AuthContext { team_id };

    authorize_session(&state, session_uuid, auth.team_id)?;
    state.sessions.touch_pulse(session_uuid, Utc::now());

    if request.has_been_recording_replay {
        if !request.replay_events.is_empty() {
            let bytes =
                state
                    .replays
                    .append_events(auth.team_id, session_uuid, &request.replay_events)?;
            state
                .sessions
                .set_replay_size(session_uuid, ReplayStore::size_kb(bytes));
        }

        // Compaction aborts on the first failing step; the live object
        // then remains authoritative for the next attempt.
        if let Some(compressed) = state.replays.compact(auth.team_id, session_uuid)? {
            state
                .sessions
                .set_replay_size(session_uuid, ReplayStore::size_kb(compressed));
            debug!(session = %session_uuid, compressed, "replay compacted");
        }
    }

    Ok(Json(serde_json::json!({})))
}
