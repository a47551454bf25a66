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

//! Similarity endpoints: vectorize a session (or free text) and rank a
//! team's sessions against a query session.
//!
//! Callers never submit vectors: any request carrying a `vector` field
//! is rejected, and responses never echo a stored vector back.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use sessionscope_index::transcript::{serialize_transcript, split_into_chunks, CHUNK_CHARS};
use sessionscope_index::{
    average_embeddings, hashed_event_vector, rank_candidates, remap_to_dimension,
    SessionCandidate, TranscriptEvent, HASH_DIMENSION,
};

use crate::api::sessions::SessionSummary;
use crate::api::{ApiError, AppState};
use crate::validation::{ensure_no_vector_field, parse_body, parse_uuid};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 500;

pub const MODE_EVENTHASH: &str = "eventhash";
pub const MODE_EMBEDDING: &str = "embedding";

#[derive(Debug, Deserialize)]
pub struct VectorizeRequest {
    #[serde(rename = "sessionUUID", default)]
    pub session_uuid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "teamId", default)]
    pub team_id: Option<i64>,
}

/// POST /vectorize - embed a session transcript (or free text) and
/// persist the vector on the session
#[tracing::instrument(skip(state, body))]
pub async fn vectorize(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ensure_no_vector_field(&body)?;
    let request: VectorizeRequest = parse_body(body)?;

    if request.session_uuid.is_none() && request.text.is_none() {
        return Err(ApiError::BadRequest(
            "Missing `text` or `sessionUUID` in request body".to_string(),
        ));
    }
    let team_id = request
        .team_id
        .ok_or_else(|| ApiError::BadRequest("teamId is required".to_string()))?;
    let session_uuid = request
        .session_uuid
        .as_deref()
        .map(|raw| parse_uuid(raw, "sessionUUID"))
        .transpose()?;

    let (_vector, stored) = vectorize_session(&state, team_id, session_uuid, request.text).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "sessionUUID": session_uuid.map(|u| u.to_string()),
        "vectorStored": stored,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SimilarityRequest {
    #[serde(rename = "sessionUUID", default)]
    pub session_uuid: Option<String>,
    #[serde(rename = "teamId", default)]
    pub team_id: Option<i64>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SimilarityResult {
    #[serde(flatten)]
    pub session: SessionSummary,
    pub similarity: f64,
}

/// POST /similarity - nearest neighbors of a session within its team
#[tracing::instrument(skip(state, body))]
pub async fn similarity(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ensure_no_vector_field(&body)?;
    let request: SimilarityRequest = parse_body(body)?;

    let session_raw = request
        .session_uuid
        .ok_or_else(|| ApiError::BadRequest("Missing `sessionUUID`".to_string()))?;
    let session_uuid = parse_uuid(&session_raw, "sessionUUID")?;
    let team_id = request
        .team_id
        .ok_or_else(|| ApiError::BadRequest("teamId is required".to_string()))?;
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mode = request.mode.unwrap_or_else(|| MODE_EVENTHASH.to_string());

    let query_vector = match mode.as_str() {
        MODE_EMBEDDING => {
            let session = state
                .sessions
                .get_session(session_uuid)
                .ok_or_else(|| ApiError::NotFound(format!("session {session_uuid} not found")))?;
            match session.vector {
                Some(vector) => vector,
                // No persisted vector yet: compute and store one now.
                None => {
                    vectorize_session(&state, team_id, Some(session_uuid), None)
                        .await?
                        .0
                }
            }
        }
        MODE_EVENTHASH => {
            let events = state.events.session_events(session_uuid);
            if events.is_empty() {
                return Err(ApiError::NotFound(
                    "No events available for session".to_string(),
                ));
            }
            hashed_event_vector(events.iter().map(|e| e.event_type.as_str()), HASH_DIMENSION)
        }
        other => {
            return Err(ApiError::BadRequest(format!(
                "unknown mode \"{other}\" (expected \"{MODE_EVENTHASH}\" or \"{MODE_EMBEDDING}\")"
            )));
        }
    };

    // Eventhash queries always compare in the canonical hash dimension.
    let query_vector = if mode == MODE_EVENTHASH && query_vector.len() != HASH_DIMENSION {
        remap_to_dimension(&query_vector, HASH_DIMENSION)
    } else {
        query_vector
    };

    let team_sessions = state.sessions.team_sessions(team_id);
    let candidates: Vec<SessionCandidate> = match mode.as_str() {
        // Embedding mode: only sessions with a persisted vector qualify.
        MODE_EMBEDDING => team_sessions
            .iter()
            .filter_map(|s| {
                s.vector.clone().map(|vector| SessionCandidate {
                    uuid: s.uuid,
                    vector,
                })
            })
            .collect(),
        // Eventhash mode: every session is a candidate, its vector
        // recomputed from its event history on the fly.
        _ => team_sessions
            .iter()
            .map(|s| {
                let events = state.events.session_events(s.uuid);
                SessionCandidate {
                    uuid: s.uuid,
                    vector: hashed_event_vector(
                        events.iter().map(|e| e.event_type.as_str()),
                        HASH_DIMENSION,
                    ),
                }
            })
            .collect(),
    };

    let ranked = rank_candidates(&query_vector, &candidates, Some(session_uuid), limit);
    debug!(%mode, candidates = candidates.len(), returned = ranked.len(), "similarity query");

    // Join metadata; vectors are stripped by construction.
    let results: Vec<SimilarityResult> = ranked
        .iter()
        .filter_map(|r| {
            state.sessions.get_session(r.uuid).map(|record| SimilarityResult {
                session: SessionSummary::from_record(&state, &record),
                similarity: r.similarity,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "success": true,
        "results": results,
    })))
}

/// Embed a session transcript (or override text) and persist the result
/// on the session. Returns the vector and whether it was stored.
pub(crate) async fn vectorize_session(
    state: &AppState,
    team_id: i64,
    session_uuid: Option<Uuid>,
    text_override: Option<String>,
) -> Result<(Vec<f64>, bool), ApiError> {
    let text = match text_override {
        Some(text) if !text.is_empty() => text,
        _ => {
            let uuid = session_uuid.ok_or_else(|| {
                ApiError::BadRequest("Missing `text` or `sessionUUID` in request body".to_string())
            })?;

            let events = state.events.session_events(uuid);
            let transcript_events: Vec<TranscriptEvent> = if events.is_empty() {
                // Fall back to replay snapshots when no discrete events exist.
                state
                    .replays
                    .fetch_events(team_id, uuid)?
                    .iter()
                    .map(TranscriptEvent::from_replay)
                    .collect()
            } else {
                events.iter().map(TranscriptEvent::from).collect()
            };

            if transcript_events.is_empty() {
                return Err(ApiError::Internal(format!(
                    "session events not found for {uuid}"
                )));
            }
            serialize_transcript(&transcript_events)
        }
    };

    if text.is_empty() {
        return Err(ApiError::Internal("no text to embed".to_string()));
    }

    let chunks = if text.chars().count() > CHUNK_CHARS {
        split_into_chunks(&text, CHUNK_CHARS)
    } else {
        vec![text]
    };

    let embeddings = state
        .embedder
        .embed_batch(&chunks)
        .await
        .map_err(|e| ApiError::Internal(format!("embedding failed: {e}")))?;
    let vector = average_embeddings(&embeddings)
        .ok_or_else(|| ApiError::Internal("embedding response contained no vectors".to_string()))?;

    let stored = match session_uuid {
        Some(uuid) => match state.sessions.set_vector(uuid, vector.clone()) {
            Ok(()) => true,
            Err(e) => {
                warn!(session = %uuid, "failed to store session vector: {e}");
                false
            }
        },
        None => false,
    };

    Ok((vector, stored))
}
