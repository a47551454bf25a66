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

//! Request-shape validation for the HTTP boundary.
//!
//! Everything here detects malformed input before any persistence side
//! effect and maps to HTTP 400.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::ApiError;

/// Parse a request body into a typed DTO; any shape mismatch is a 400,
/// matching the contract (not axum's default 422).
pub fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}

pub fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::BadRequest(format!("\"{field}\" must be a UUID")))
}

/// Vectors are always server-derived; a request that tries to smuggle
/// one in is rejected outright.
pub fn ensure_no_vector_field(body: &serde_json::Value) -> Result<(), ApiError> {
    if body.get("vector").is_some() {
        return Err(ApiError::BadRequest(
            "Direct vector submission is not allowed. Use sessionUUID only.".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_uuid() {
        assert!(parse_uuid("2f4ac558-66b9-44b6-a8a7-2c13ef3c4f11", "sessionUUID").is_ok());
        assert!(parse_uuid("not-a-uuid", "sessionUUID").is_err());
    }

    #[test]
    fn test_vector_field_is_rejected() {
        assert!(ensure_no_vector_field(&json!({"sessionUUID": "x"})).is_ok());
        assert!(ensure_no_vector_field(&json!({"vector": [1.0, 2.0]})).is_err());
    }

    #[test]
    fn test_parse_body_maps_to_bad_request() {
        #[derive(serde::Deserialize, Debug)]
        struct Dto {
            #[allow(dead_code)]
            name: String,
        }
        let err = parse_body::<Dto>(json!({"name": 42})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
