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

//! Replay blob store.
//!
//! One logical object per session with two on-disk forms:
//!
//! - `{team}/{session}/replayEvents.jsonl`: the live append target
//! - `{team}/{session}/replayEvents.jsonl.gz`: the terminal archive
//!
//! The backing [`ObjectStore`] offers no incremental append, so appends
//! are read-modify-write over the full object. Two concurrent appends
//! for one session would race and silently drop events, so every
//! mutation of a session's blob runs under that session's writer lock.
//! Both forms may transiently coexist while a compaction races a
//! trailing append; retrieval resolves the canonical form by most
//! recent modification time.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use sessionscope_core::{Error, Result};
use tracing::warn;
use uuid::Uuid;

/// Live append target within a session's prefix.
pub const REPLAY_OBJECT: &str = "replayEvents.jsonl";
/// Terminal archive within a session's prefix.
pub const REPLAY_ARCHIVE: &str = "replayEvents.jsonl.gz";

/// Byte-oriented object storage: download, upload, delete, stat.
pub trait ObjectStore: Send + Sync {
    fn download(&self, path: &str) -> Result<Option<Vec<u8>>>;
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<()>;
    fn delete(&self, path: &str) -> Result<()>;
    fn modified_at(&self, path: &str) -> Result<Option<SystemTime>>;
}

/// Filesystem-backed object store rooted at a data directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn download(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.full_path(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upload(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.full_path(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)?;
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        match std::fs::remove_file(self.full_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn modified_at(&self, path: &str) -> Result<Option<SystemTime>> {
        match std::fs::metadata(self.full_path(path)) {
            Ok(meta) => Ok(Some(meta.modified()?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replay lifecycle over an [`ObjectStore`], serialized per session.
pub struct ReplayStore {
    objects: Box<dyn ObjectStore>,
    writers: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl ReplayStore {
    pub fn new(objects: impl ObjectStore + 'static) -> Self {
        Self {
            objects: Box::new(objects),
            writers: DashMap::new(),
        }
    }

    fn writer(&self, session_uuid: Uuid) -> Arc<Mutex<()>> {
        self.writers
            .entry(session_uuid)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn live_path(team_id: i64, session_uuid: Uuid) -> String {
        format!("{team_id}/{session_uuid}/{REPLAY_OBJECT}")
    }

    fn archive_path(team_id: i64, session_uuid: Uuid) -> String {
        format!("{team_id}/{session_uuid}/{REPLAY_ARCHIVE}")
    }

    /// Append events to the live object (read-modify-write under the
    /// session's writer lock). Returns the resulting byte length of the
    /// live object, from which the caller derives the advisory size.
    pub fn append_events(
        &self,
        team_id: i64,
        session_uuid: Uuid,
        events: &[serde_json::Value],
    ) -> Result<u64> {
        let path = Self::live_path(team_id, session_uuid);
        let guard = self.writer(session_uuid);
        let _locked = guard.lock();

        let mut lines = Vec::new();
        for event in events {
            serde_json::to_writer(&mut lines, event)?;
            lines.push(b'\n');
        }

        let mut blob = self.objects.download(&path)?.unwrap_or_default();
        blob.extend_from_slice(&lines);
        self.objects.upload(&path, &blob)?;

        Ok(blob.len() as u64)
    }

    /// Compact the live object into the gzip archive: download, gzip,
    /// upload the archive, delete the live object. A failure at any step
    /// aborts the remaining steps. Returns the compressed byte length,
    /// or `None` when there is nothing to compact.
    pub fn compact(&self, team_id: i64, session_uuid: Uuid) -> Result<Option<u64>> {
        let guard = self.writer(session_uuid);
        let _locked = guard.lock();

        let live_path = Self::live_path(team_id, session_uuid);
        let Some(blob) = self.objects.download(&live_path)? else {
            return Ok(None);
        };

        let compressed = gzip(&blob)?;
        self.objects
            .upload(&Self::archive_path(team_id, session_uuid), &compressed)?;
        self.objects.delete(&live_path)?;

        Ok(Some(compressed.len() as u64))
    }

    /// Resolve the canonical object and return its parsed events.
    ///
    /// When only one form exists it wins; when both exist (a compaction
    /// raced a trailing append) the later-modified one wins. Lines that
    /// fail to parse are skipped with a warning rather than poisoning
    /// the whole replay.
    pub fn fetch_events(&self, team_id: i64, session_uuid: Uuid) -> Result<Vec<serde_json::Value>> {
        let live_path = Self::live_path(team_id, session_uuid);
        let archive_path = Self::archive_path(team_id, session_uuid);

        let live_time = self.objects.modified_at(&live_path)?;
        let archive_time = self.objects.modified_at(&archive_path)?;

        let jsonl = match (live_time, archive_time) {
            (None, None) => return Ok(Vec::new()),
            (Some(_), None) => self.objects.download(&live_path)?,
            (None, Some(_)) => self.objects.download(&archive_path)?.map(|b| gunzip(&b)).transpose()?,
            (Some(live), Some(archive)) => {
                if live > archive {
                    self.objects.download(&live_path)?
                } else {
                    self.objects.download(&archive_path)?.map(|b| gunzip(&b)).transpose()?
                }
            }
        };

        let Some(jsonl) = jsonl else {
            return Ok(Vec::new());
        };

        let text = String::from_utf8(jsonl)
            .map_err(|e| Error::Storage(format!("replay blob is not valid UTF-8: {e}")))?;

        let mut events = Vec::new();
        for line in text.lines().filter(|l| !l.is_empty()) {
            match serde_json::from_str(line) {
                Ok(value) => events.push(value),
                Err(e) => warn!(session = %session_uuid, "skipping malformed replay line: {e}"),
            }
        }
        Ok(events)
    }

    /// Advisory size in KB from a byte length, rounded to nearest.
    pub fn size_kb(bytes: u64) -> u64 {
        ((bytes as f64) / 1024.0).round() as u64
    }
}

fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}
