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

//! Discrete-event ingestion: capture-event and update-metric.

use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use tracing::debug;

use sessionscope_core::validation::{validate_event_type, validate_optional_text};
use sessionscope_core::{EventRecord, MetricUpdate};
use sessionscope_storage::MetricOutcome;

use crate::api::{authorize_session, ApiError, AppState};
use crate::auth::AuthContext;
use crate::validation::{parse_body, parse_uuid};

#[derive(Debug, Deserialize)]
pub struct CaptureEventRequest {
    #[serde(rename = "sessionUUID")]
    pub session_uuid: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// POST /capture-event - persist one discrete event and advance the pulse
#[tracing::instrument(skip(state, auth, body), fields(team_id = auth.team_id))]
pub async fn capture_event(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: CaptureEventRequest = parse_body(body)?;

    let session_uuid = parse_uuid(&request.session_uuid, "sessionUUID")?;
    validate_event_type(&request.event_type)?;
    validate_optional_text(request.payload.as_deref(), "payload")?;
    validate_optional_text(request.uri.as_deref(), "uri")?;

    authorize_session(&state, session_uuid, auth.team_id)?;

    let now = Utc::now();
    state.sessions.touch_pulse(session_uuid, now);
    state.events.append(EventRecord::new(
        auth.team_id,
        session_uuid,
        request.event_type,
        request.payload,
        request.uri,
        now,
    ));

    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetricRequest {
    pub name: String,
    #[serde(default)]
    pub delta: Option<f64>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(rename = "sessionUUID", default)]
    pub session_uuid: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// POST /update-metric - mutate a pre-existing metric, optionally
/// logging a `Metric-{name}` event against the referencing session
#[tracing::instrument(skip(state, auth, body), fields(team_id = auth.team_id))]
pub async fn update_metric(
    State(state): State<AppState>,
    auth: Extension<AuthContext>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request: UpdateMetricRequest = parse_body(body)?;

    let update = MetricUpdate::from_parts(request.delta, request.value).ok_or_else(|| {
        ApiError::BadRequest("exactly one of \"delta\" or \"value\" must be present".to_string())
    })?;
    validate_optional_text(request.reason.as_deref(), "reason")?;
    validate_optional_text(request.uri.as_deref(), "uri")?;

    let session_uuid = request
        .session_uuid
        .as_deref()
        .map(|raw| parse_uuid(raw, "sessionUUID"))
        .transpose()?;

    // The metric is an ingestion call referencing the session, so the
    // pulse advances even when the metric itself turns out unknown.
    if let Some(uuid) = session_uuid {
        authorize_session(&state, uuid, auth.team_id)?;
        state.sessions.touch_pulse(uuid, Utc::now());
    }

    match state.metrics.update(auth.team_id, &request.name, update) {
        MetricOutcome::NotFound => {
            return Err(ApiError::NotFound("METRIC_NOT_FOUND".to_string()));
        }
        MetricOutcome::Applied(value) => {
            debug!(metric = %request.name, value, "metric updated");
        }
    }

    if let Some(uuid) = session_uuid {
        let mut payload = serde_json::Map::new();
        if let Some(delta) = request.delta {
            payload.insert("delta".to_string(), delta.into());
        }
        if let Some(value) = request.value {
            payload.insert("value".to_string(), value.into());
        }
        if let Some(reason) = &request.reason {
            payload.insert("reason".to_string(), reason.clone().into());
        }

        state.events.append(EventRecord::new(
            auth.team_id,
            uuid,
            format!("Metric-{}", request.name),
            Some(serde_json::Value::Object(payload).to_string()),
            request.uri,
            Utc::now(),
        ));
    }

    Ok(Json(serde_json::json!({})))
}
