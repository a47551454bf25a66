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

//! Error taxonomy shared across the pipeline.
//!
//! Validation and auth failures must surface before any persistence side
//! effect; storage failures carry detail for the server log but map to a
//! generic message at the HTTP boundary.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures a caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Unauthorized | Error::Forbidden(_) | Error::NotFound(_)
        )
    }
}
