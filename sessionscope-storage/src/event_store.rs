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

//! Append-only store for discrete session events.

use dashmap::DashMap;
use sessionscope_core::EventRecord;
use uuid::Uuid;

#[derive(Default)]
pub struct EventStore {
    events: DashMap<Uuid, Vec<EventRecord>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: EventRecord) {
        self.events
            .entry(record.session_uuid)
            .or_default()
            .push(record);
    }

    /// All events of a session, ordered ascending by `created_at`.
    pub fn session_events(&self, session_uuid: Uuid) -> Vec<EventRecord> {
        let mut events = self
            .events
            .get(&session_uuid)
            .map(|e| e.clone())
            .unwrap_or_default();
        events.sort_by_key(|e| e.created_at);
        events
    }

    pub fn event_count(&self, session_uuid: Uuid) -> usize {
        self.events.get(&session_uuid).map(|e| e.len()).unwrap_or(0)
    }
}
