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

//! API-key record store.
//!
//! Two indexes: hash → team for the O(1) authentication lookup, and
//! team → record for the one-record-per-team upsert. Rotating a key
//! removes the old hash entry first, so the previous key stops
//! authenticating the moment the new one is stored.

use dashmap::DashMap;
use sessionscope_core::ApiKeyRecord;

#[derive(Default)]
pub struct KeyStore {
    by_hash: DashMap<String, i64>,
    by_team: DashMap<i64, ApiKeyRecord>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: ApiKeyRecord) {
        if let Some(previous) = self.by_team.get(&record.team_id) {
            self.by_hash.remove(&previous.key_hash);
        }
        self.by_hash.insert(record.key_hash.clone(), record.team_id);
        self.by_team.insert(record.team_id, record);
    }

    /// Authentication lookup by exact hash match.
    pub fn team_for_hash(&self, key_hash: &str) -> Option<i64> {
        self.by_hash.get(key_hash).map(|team| *team)
    }

    pub fn record_for_team(&self, team_id: i64) -> Option<ApiKeyRecord> {
        self.by_team.get(&team_id).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(team_id: i64, hash: &str) -> ApiKeyRecord {
        ApiKeyRecord {
            team_id,
            key_hash: hash.to_string(),
            encrypted_key: "cafe".to_string(),
            iv: "beef".to_string(),
        }
    }

    #[test]
    fn test_rotation_invalidates_previous_key() {
        let store = KeyStore::new();
        store.upsert(record(7, "hash-one"));
        assert_eq!(store.team_for_hash("hash-one"), Some(7));

        store.upsert(record(7, "hash-two"));
        assert_eq!(store.team_for_hash("hash-one"), None);
        assert_eq!(store.team_for_hash("hash-two"), Some(7));
    }

    #[test]
    fn test_one_record_per_team() {
        let store = KeyStore::new();
        store.upsert(record(7, "hash-one"));
        store.upsert(record(7, "hash-two"));
        assert_eq!(store.record_for_team(7).unwrap().key_hash, "hash-two");
    }
}
