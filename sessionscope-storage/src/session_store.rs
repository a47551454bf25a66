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

//! Session and sub-user row store.
//!
//! Sessions are keyed by uuid; team and sub-user are fixed at creation.
//! Pulse, replay size, identifier, and the embedding vector are the only
//! mutable columns.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sessionscope_core::{Error, Result, SessionRecord, SubUserRecord};
use uuid::Uuid;

#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, SessionRecord>,
    sub_users: DashMap<Uuid, SubUserRecord>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint an opaque sub-user for a team.
    pub fn insert_sub_user(&self, team_id: i64, now: DateTime<Utc>) -> Uuid {
        let record = SubUserRecord::new(team_id, now);
        let uuid = record.uuid;
        self.sub_users.insert(uuid, record);
        uuid
    }

    pub fn get_sub_user(&self, uuid: Uuid) -> Option<SubUserRecord> {
        self.sub_users.get(&uuid).map(|r| r.clone())
    }

    /// Link a sub-user to an application identifier. The update is scoped
    /// by team, so a caller can never relabel another team's sub-user.
    /// Returns false when no matching row exists.
    pub fn set_identifier(&self, team_id: i64, uuid: Uuid, identifier: &str) -> bool {
        match self.sub_users.get_mut(&uuid) {
            Some(mut record) if record.team_id == team_id => {
                record.identifier = Some(identifier.to_string());
                true
            }
            _ => false,
        }
    }

    /// Insert a session for an existing sub-user of the same team.
    pub fn insert_session(
        &self,
        team_id: i64,
        sub_user_uuid: Uuid,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid> {
        let owner = self
            .sub_users
            .get(&sub_user_uuid)
            .ok_or_else(|| Error::NotFound(format!("sub-user {sub_user_uuid}")))?;
        if owner.team_id != team_id {
            return Err(Error::Forbidden(format!(
                "sub-user {sub_user_uuid} does not belong to team {team_id}"
            )));
        }
        drop(owner);

        let record = SessionRecord::new(team_id, sub_user_uuid, tags, now);
        let uuid = record.uuid;
        self.sessions.insert(uuid, record);
        Ok(uuid)
    }

    pub fn get_session(&self, uuid: Uuid) -> Option<SessionRecord> {
        self.sessions.get(&uuid).map(|r| r.clone())
    }

    /// Advance the liveness heartbeat.
    pub fn touch_pulse(&self, uuid: Uuid, now: DateTime<Utc>) {
        if let Some(mut record) = self.sessions.get_mut(&uuid) {
            record.last_pulse = now;
        }
    }

    /// Update the advisory replay size. Blob-first, metadata-second: this
    /// is called only after a successful blob write.
    pub fn set_replay_size(&self, uuid: Uuid, size_kb: u64) {
        if let Some(mut record) = self.sessions.get_mut(&uuid) {
            record.replay_size_kb = size_kb;
        }
    }

    /// Overwrite the session's embedding vector.
    pub fn set_vector(&self, uuid: Uuid, vector: Vec<f64>) -> Result<()> {
        let mut record = self
            .sessions
            .get_mut(&uuid)
            .ok_or_else(|| Error::NotFound(format!("session {uuid}")))?;
        record.vector = Some(vector);
        Ok(())
    }

    /// Team-scoped listing, most recent first, with the total count for
    /// pagination.
    pub fn list_team_sessions(
        &self,
        team_id: i64,
        from: usize,
        count: usize,
    ) -> (Vec<SessionRecord>, usize) {
        let mut sessions: Vec<SessionRecord> = self
            .sessions
            .iter()
            .filter(|r| r.team_id == team_id)
            .map(|r| r.clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = sessions.len();
        let page = sessions.into_iter().skip(from).take(count).collect();
        (page, total)
    }

    /// All sessions of a team, for similarity candidate gathering.
    pub fn team_sessions(&self, team_id: i64) -> Vec<SessionRecord> {
        self.sessions
            .iter()
            .filter(|r| r.team_id == team_id)
            .map(|r| r.clone())
            .collect()
    }
}
