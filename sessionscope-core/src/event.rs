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

//! Discrete telemetry events.
//!
//! Events are append-only and ordered ascending by `created_at`. The
//! `team_id` is denormalized from the authenticated caller at write time.
//! Payloads are opaque strings of at most 500 characters; replay
//! snapshots are NOT events; they ride the blob store as versioned JSON
//! owned by the recording library.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub team_id: i64,
    pub session_uuid: Uuid,
    pub event_type: String,
    pub payload: Option<String>,
    pub uri: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        team_id: i64,
        session_uuid: Uuid,
        event_type: impl Into<String>,
        payload: Option<String>,
        uri: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            team_id,
            session_uuid,
            event_type: event_type.into(),
            payload,
            uri,
            created_at: now,
        }
    }
}
