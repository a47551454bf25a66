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

//! In-memory buffer for DOM replay records.
//!
//! Records are opaque JSON owned by the recording library. The buffer
//! is bounded: under persistent flush failure the oldest records are
//! dropped rather than growing the backlog without limit. Flushes are
//! gated on a minimum batch size to avoid chatty small requests, and a
//! failed flush retains the buffer for the next tick.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::warn;

pub struct ReplayBuffer {
    records: Mutex<VecDeque<serde_json::Value>>,
    cap: usize,
    recording: AtomicBool,
}

impl ReplayBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            cap,
            recording: AtomicBool::new(false),
        }
    }

    pub fn push(&self, record: serde_json::Value) {
        let mut records = self.records.lock().expect("replay buffer lock poisoned");
        if records.len() >= self.cap {
            records.pop_front();
            warn!("replay buffer full ({}), dropping oldest record", self.cap);
        }
        records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("replay buffer lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub fn set_recording(&self, recording: bool) {
        self.recording.store(recording, Ordering::Relaxed);
    }

    /// The whole buffer in arrival order, left in place.
    pub fn snapshot(&self) -> Vec<serde_json::Value> {
        self.records
            .lock()
            .expect("replay buffer lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// A snapshot only when the minimum-batch gate passes.
    pub fn ready_batch(&self, min_batch: usize) -> Option<Vec<serde_json::Value>> {
        let records = self.records.lock().expect("replay buffer lock poisoned");
        if records.len() < min_batch {
            return None;
        }
        Some(records.iter().cloned().collect())
    }

    /// Drop the first `n` records after a successful flush. Records
    /// pushed while the flush was in flight stay queued.
    pub fn discard_prefix(&self, n: usize) {
        let mut records = self.records.lock().expect("replay buffer lock poisoned");
        let n = n.min(records.len());
        records.drain(..n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_min_batch_gate() {
        let buffer = ReplayBuffer::new(100);
        for i in 0..9 {
            buffer.push(json!({"seq": i}));
        }
        assert!(buffer.ready_batch(10).is_none());

        buffer.push(json!({"seq": 9}));
        let batch = buffer.ready_batch(10).unwrap();
        assert_eq!(batch.len(), 10);
        // The gate does not consume the buffer.
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_discard_prefix_preserves_inflight_pushes() {
        let buffer = ReplayBuffer::new(100);
        for i in 0..12 {
            buffer.push(json!({"seq": i}));
        }
        let batch = buffer.ready_batch(10).unwrap();
        assert_eq!(batch.len(), 12);

        // Two more records arrive while the flush is in flight.
        buffer.push(json!({"seq": 12}));
        buffer.push(json!({"seq": 13}));

        buffer.discard_prefix(batch.len());
        let rest = buffer.snapshot();
        assert_eq!(rest, vec![json!({"seq": 12}), json!({"seq": 13})]);
    }

    #[test]
    fn test_bounded_buffer_drops_oldest() {
        let buffer = ReplayBuffer::new(3);
        for i in 0..5 {
            buffer.push(json!({"seq": i}));
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(
            buffer.snapshot(),
            vec![json!({"seq": 2}), json!({"seq": 3}), json!({"seq": 4})]
        );
    }
}
