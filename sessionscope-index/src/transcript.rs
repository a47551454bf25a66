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

//! Session transcripts for embedding-mode vectorization.
//!
//! A transcript serializes up to [`MAX_TRANSCRIPT_EVENTS`] events as
//! `[timestamp] type uri - payload` lines, capped at
//! [`MAX_TRANSCRIPT_CHARS`] characters with a trailing truncation
//! marker. Transcripts longer than [`CHUNK_CHARS`] are embedded in
//! word-boundary chunks whose vectors are averaged element-wise.

use chrono::{DateTime, SecondsFormat, Utc};
use sessionscope_core::EventRecord;

pub const MAX_TRANSCRIPT_EVENTS: usize = 500;
pub const MAX_TRANSCRIPT_CHARS: usize = 16_000;
pub const CHUNK_CHARS: usize = 3_000;
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// One transcript line's worth of source data, from either a discrete
/// event or a replay snapshot.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub created_at: Option<DateTime<Utc>>,
    pub event_type: String,
    pub uri: Option<String>,
    pub payload: Option<String>,
}

impl From<&EventRecord> for TranscriptEvent {
    fn from(event: &EventRecord) -> Self {
        Self {
            created_at: Some(event.created_at),
            event_type: event.event_type.clone(),
            uri: event.uri.clone(),
            payload: event.payload.clone(),
        }
    }
}

impl TranscriptEvent {
    /// Replay snapshots are opaque JSON owned by the recording library;
    /// only a best-effort type tag is extracted for the transcript.
    pub fn from_replay(value: &serde_json::Value) -> Self {
        let event_type = value
            .get("type")
            .or_else(|| value.get("payload").and_then(|p| p.get("type")))
            .map(json_scalar_to_string)
            .unwrap_or_else(|| "unknown".to_string());

        let payload = value.get("payload").map(|p| match p {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });

        Self {
            created_at: None,
            event_type,
            uri: None,
            payload,
        }
    }
}

fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Serialize events to the transcript format, applying the event and
/// character caps.
pub fn serialize_transcript(events: &[TranscriptEvent]) -> String {
    let lines: Vec<String> = events
        .iter()
        .take(MAX_TRANSCRIPT_EVENTS)
        .map(|event| {
            let timestamp = event
                .created_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| "unknown time".to_string());
            let uri_part = event
                .uri
                .as_deref()
                .map(|u| format!(" {u}"))
                .unwrap_or_default();
            let payload = event.payload.as_deref().unwrap_or("");
            format!("[{timestamp}] {}{uri_part} - {payload}", event.event_type)
        })
        .collect();

    let transcript = lines.join("\n");
    if transcript.chars().count() > MAX_TRANSCRIPT_CHARS {
        let truncated: String = transcript.chars().take(MAX_TRANSCRIPT_CHARS).collect();
        format!("{truncated}{TRUNCATION_MARKER}")
    } else {
        transcript
    }
}

/// Split text into chunks of at most `max_len` characters, breaking at
/// the last space before the boundary when one exists (the boundary
/// space itself is consumed).
pub fn split_into_chunks(text: &str, max_len: usize) -> Vec<String> {
    if text.is_empty() || max_len == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = usize::min(start + max_len, chars.len());
        let mut consumed_boundary = false;

        if end < chars.len() {
            if let Some(pos) = chars[start..end].iter().rposition(|c| *c == ' ') {
                if pos > 0 {
                    end = start + pos;
                    consumed_boundary = true;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        start = end + usize::from(consumed_boundary);
    }

    chunks
}
