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

//! Session and sub-user records.
//!
//! A sub-user is the pseudo-identity of an end user of the instrumented
//! application: minted opaquely on first visit, optionally linked to an
//! application-supplied identifier later, never deleted by this pipeline.
//! A session belongs to exactly one team and one sub-user, fixed at
//! creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// End-user pseudo-identity scoped to a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubUserRecord {
    pub uuid: Uuid,
    pub team_id: i64,
    /// Application-supplied identifier, set at most once per identify call.
    pub identifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One browsing session of a sub-user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub uuid: Uuid,
    pub team_id: i64,
    pub sub_user_uuid: Uuid,
    pub created_at: DateTime<Utc>,
    /// Liveness heartbeat, advanced by every ingestion call that
    /// references the session.
    pub last_pulse: DateTime<Utc>,
    /// Advisory size of the replay blob in KB. The blob itself stays
    /// authoritative; a crash between blob write and this update only
    /// leaves the advisory value stale.
    pub replay_size_kb: u64,
    pub tags: Vec<String>,
    /// Embedding-mode feature vector. Overwritten on recomputation,
    /// never appended. Absent until the first successful vectorization.
    pub vector: Option<Vec<f64>>,
}

impl SessionRecord {
    pub fn new(team_id: i64, sub_user_uuid: Uuid, tags: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            team_id,
            sub_user_uuid,
            created_at: now,
            last_pulse: now,
            replay_size_kb: 0,
            tags,
            vector: None,
        }
    }
}

impl SubUserRecord {
    pub fn new(team_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            team_id,
            identifier: None,
            created_at: now,
        }
    }
}
