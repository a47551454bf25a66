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

//! Operator-plane key issuance.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiError, AppState};
use crate::validation::parse_body;

#[derive(Debug, Deserialize)]
pub struct GenerateApiKeyRequest {
    #[serde(rename = "teamId")]
    pub team_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GenerateApiKeyResponse {
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

/// POST /generate-api-key - issue a key for a team, rotating any prior
/// one. The plaintext appears in this response and never again.
#[tracing::instrument(skip(state, body))]
pub async fn generate_api_key(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<GenerateApiKeyResponse>, ApiError> {
    let request: GenerateApiKeyRequest = parse_body(body)?;
    let team_id = request
        .team_id
        .ok_or_else(|| ApiError::BadRequest("teamId is required".to_string()))?;

    let api_key = state.key_service.generate_key(team_id);
    info!(team_id, "issued new API key");

    Ok(Json(GenerateApiKeyResponse { api_key }))
}
