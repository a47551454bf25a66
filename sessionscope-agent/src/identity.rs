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

//! Persistent identity for session continuity.
//!
//! The user uuid, the last session uuid, and the last pulse survive
//! page loads; the 5-minute reuse rule reads them back to bound session
//! fragmentation under frequent reloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct IdentitySnapshot {
    user_uuid: Option<Uuid>,
    last_session_uuid: Option<Uuid>,
    last_pulse: Option<DateTime<Utc>>,
}

pub trait IdentityStore: Send + Sync {
    fn user_uuid(&self) -> Option<Uuid>;
    fn set_user_uuid(&self, uuid: Uuid);

    fn last_session_uuid(&self) -> Option<Uuid>;
    fn set_last_session_uuid(&self, uuid: Uuid);

    fn last_pulse(&self) -> Option<DateTime<Utc>>;
    fn set_last_pulse(&self, at: DateTime<Utc>);
}

/// In-memory identity, for tests and ephemeral hosts.
#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<IdentitySnapshot>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn user_uuid(&self) -> Option<Uuid> {
        self.state.lock().expect("identity lock poisoned").user_uuid
    }

    fn set_user_uuid(&self, uuid: Uuid) {
        self.state.lock().expect("identity lock poisoned").user_uuid = Some(uuid);
    }

    fn last_session_uuid(&self) -> Option<Uuid> {
        self.state
            .lock()
            .expect("identity lock poisoned")
            .last_session_uuid
    }

    fn set_last_session_uuid(&self, uuid: Uuid) {
        self.state
            .lock()
            .expect("identity lock poisoned")
            .last_session_uuid = Some(uuid);
    }

    fn last_pulse(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("identity lock poisoned").last_pulse
    }

    fn set_last_pulse(&self, at: DateTime<Utc>) {
        self.state.lock().expect("identity lock poisoned").last_pulse = Some(at);
    }
}

/// JSON-file-backed identity, the durable analog of the browser's local
/// storage. Persistence failures are logged, never surfaced: losing
/// continuity degrades to a fresh session, not a broken host.
pub struct FileIdentityStore {
    path: PathBuf,
    state: Mutex<IdentitySnapshot>,
}

impl FileIdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("identity file {path:?} is corrupt, starting fresh: {e}");
                IdentitySnapshot::default()
            }),
            Err(_) => IdentitySnapshot::default(),
        };
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn persist(&self, snapshot: &IdentitySnapshot) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string(snapshot)?;
            std::fs::write(&self.path, content)
        };
        if let Err(e) = write() {
            warn!("failed to persist identity to {:?}: {e}", self.path);
        }
    }

    fn update(&self, f: impl FnOnce(&mut IdentitySnapshot)) {
        let mut state = self.state.lock().expect("identity lock poisoned");
        f(&mut state);
        self.persist(&state);
    }
}

impl IdentityStore for FileIdentityStore {
    fn user_uuid(&self) -> Option<Uuid> {
        self.state.lock().expect("identity lock poisoned").user_uuid
    }

    fn set_user_uuid(&self, uuid: Uuid) {
        self.update(|s| s.user_uuid = Some(uuid));
    }

    fn last_session_uuid(&self) -> Option<Uuid> {
        self.state
            .lock()
            .expect("identity lock poisoned")
            .last_session_uuid
    }

    fn set_last_session_uuid(&self, uuid: Uuid) {
        self.update(|s| s.last_session_uuid = Some(uuid));
    }

    fn last_pulse(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("identity lock poisoned").last_pulse
    }

    fn set_last_pulse(&self, at: DateTime<Utc>) {
        self.update(|s| s.last_pulse = Some(at));
    }
}
