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

//! The capture session: identity continuity, event capture, metric
//! updates, replay flushing, and termination.
//!
//! State machine: `Uninitialized → Identifying → Capturing →
//! Terminating`. Capture calls issued before identity resolves poll at
//! the configured interval, bounded by a wait budget: an unresolved
//! identity fails the call instead of stalling it forever.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::Duration;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use sessionscope_core::validation::{validate_event_type, validate_identifier, MAX_TEXT_FIELD_LEN};
use sessionscope_core::MetricUpdate;

use crate::clock::Clock;
use crate::identity::IdentityStore;
use crate::replay::ReplayBuffer;
use crate::transport::{AgentError, Result, Transport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgentState {
    Uninitialized,
    Identifying,
    Capturing,
    Terminating,
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Tags attached to newly minted sessions.
    pub tags: Vec<String>,
    pub enable_replay: bool,
    /// Cancellation budget for capture calls awaiting identity.
    pub identity_wait_budget: StdDuration,
    pub identity_poll_interval: StdDuration,
    /// Reuse the cached session while the last pulse is younger than this.
    pub session_reuse_window: StdDuration,
    pub replay_flush_interval: StdDuration,
    /// Minimum buffered records before a flush is worth a request.
    pub replay_min_batch: usize,
    pub replay_buffer_cap: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            enable_replay: true,
            identity_wait_budget: StdDuration::from_secs(10),
            identity_poll_interval: StdDuration::from_millis(50),
            session_reuse_window: StdDuration::from_secs(5 * 60),
            replay_flush_interval: StdDuration::from_secs(20),
            replay_min_batch: 10,
            replay_buffer_cap: 10_000,
        }
    }
}

pub struct CaptureSession {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    identity: Arc<dyn IdentityStore>,
    config: CaptureConfig,
    state: Mutex<AgentState>,
    user_uuid: Mutex<Option<Uuid>>,
    session_uuid: Mutex<Option<Uuid>>,
    replay: ReplayBuffer,
}

impl CaptureSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityStore>,
        config: CaptureConfig,
    ) -> Arc<Self> {
        let replay = ReplayBuffer::new(config.replay_buffer_cap);
        Arc::new(Self {
            transport,
            clock,
            identity,
            config,
            state: Mutex::new(AgentState::Uninitialized),
            user_uuid: Mutex::new(None),
            session_uuid: Mutex::new(None),
            replay,
        })
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub fn user_uuid(&self) -> Option<Uuid> {
        *self.user_uuid.lock().expect("identity lock poisoned")
    }

    pub fn session_uuid(&self) -> Option<Uuid> {
        *self.session_uuid.lock().expect("identity lock poisoned")
    }

    pub fn replay(&self) -> &ReplayBuffer {
        &self.replay
    }

    /// Resolve identity and start capturing. Idempotent: a second call
    /// while identifying or capturing is a no-op. On failure the state
    /// returns to `Uninitialized` so the host may retry.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if !matches!(*state, AgentState::Uninitialized) {
                return Ok(());
            }
            *state = AgentState::Identifying;
        }

        match self.identify_and_start().await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.state.lock().expect("state lock poisoned") = AgentState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn identify_and_start(self: &Arc<Self>) -> Result<()> {
        let user_uuid = self.resolve_user_uuid().await?;
        *self.user_uuid.lock().expect("identity lock poisoned") = Some(user_uuid);

        let session_uuid = self.resolve_session_uuid(user_uuid).await?;
        *self.session_uuid.lock().expect("identity lock poisoned") = Some(session_uuid);

        *self.state.lock().expect("state lock poisoned") = AgentState::Capturing;

        if self.config.enable_replay {
            self.replay.set_recording(true);
            spawn_replay_flusher(Arc::clone(self));
        }

        debug!(%user_uuid, %session_uuid, "capture session started");
        Ok(())
    }

    /// The durable user uuid: local store first, gateway otherwise.
    async fn resolve_user_uuid(&self) -> Result<Uuid> {
        if let Some(uuid) = self.identity.user_uuid() {
            return Ok(uuid);
        }

        let response = self.transport.get_json("/generate-user-uuid", &[]).await?;
        let uuid = uuid_from_response(&response)?;
        self.identity.set_user_uuid(uuid);
        Ok(uuid)
    }

    /// Session continuity: reuse the cached session while the last
    /// pulse is fresh, otherwise mint a new one tagged per config.
    async fn resolve_session_uuid(&self, user_uuid: Uuid) -> Result<Uuid> {
        let now = self.clock.now();
        if let (Some(pulse), Some(cached)) =
            (self.identity.last_pulse(), self.identity.last_session_uuid())
        {
            let window = Duration::from_std(self.config.session_reuse_window)
                .unwrap_or_else(|_| Duration::minutes(5));
            if now - pulse < window {
                debug!(%cached, "reusing session within pulse window");
                return Ok(cached);
            }
        }

        let mut query: Vec<(&str, String)> = vec![("userUUID", user_uuid.to_string())];
        if !self.config.tags.is_empty() {
            let tags = serde_json::to_string(&self.config.tags)
                .map_err(|e| AgentError::Validation(format!("tags are not serializable: {e}")))?;
            query.push(("tags", tags));
        }

        let response = self
            .transport
            .get_json("/generate-session-uuid", &query)
            .await?;
        self.identity.set_last_pulse(self.clock.now());

        let uuid = uuid_from_response(&response)?;
        self.identity.set_last_session_uuid(uuid);
        Ok(uuid)
    }

    fn touch_pulse(&self) {
        self.identity.set_last_pulse(self.clock.now());
    }

    /// Poll until the session identity resolves, bounded by the wait
    /// budget.
    async fn wait_for_session(&self) -> Result<Uuid> {
        if let Some(uuid) = self.session_uuid() {
            return Ok(uuid);
        }
        warn!("Unable to capture event. Waiting for initialization.");

        let start = std::time::Instant::now();
        loop {
            tokio::time::sleep(self.config.identity_poll_interval).await;
            if let Some(uuid) = self.session_uuid() {
                return Ok(uuid);
            }
            if start.elapsed() >= self.config.identity_wait_budget {
                return Err(AgentError::IdentityTimeout);
            }
        }
    }

    async fn wait_for_user(&self) -> Result<Uuid> {
        if let Some(uuid) = self.user_uuid() {
            return Ok(uuid);
        }
        warn!("Unable to identify user. Waiting for initialization.");

        let start = std::time::Instant::now();
        loop {
            tokio::time::sleep(self.config.identity_poll_interval).await;
            if let Some(uuid) = self.user_uuid() {
                return Ok(uuid);
            }
            if start.elapsed() >= self.config.identity_wait_budget {
                return Err(AgentError::IdentityTimeout);
            }
        }
    }

    /// Queue a discrete event. An oversized payload is nulled with a
    /// warning and the event still ships; an oversized uri is an
    /// integration bug and fails the call. Network failures are logged,
    /// never surfaced.
    pub async fn capture_event(
        &self,
        event_type: &str,
        payload: Option<String>,
        uri: Option<String>,
    ) -> Result<()> {
        let session_uuid = self.wait_for_session().await?;

        validate_event_type(event_type)
            .map_err(|e| AgentError::Validation(e.to_string()))?;

        let payload = match payload {
            Some(p) if p.chars().count() > MAX_TEXT_FIELD_LEN => {
                warn!("\"payload\" must be a <501 characters string");
                None
            }
            other => other,
        };

        if let Some(u) = &uri {
            if u.chars().count() > MAX_TEXT_FIELD_LEN {
                return Err(AgentError::Validation(
                    "\"uri\" must be a <501 characters string".to_string(),
                ));
            }
        }

        let body = json!({
            "sessionUUID": session_uuid,
            "type": event_type,
            "payload": payload,
            "uri": uri,
        });

        match self.transport.post_json("/capture-event", body).await {
            Ok(()) => {
                self.touch_pulse();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to capture event: {e}");
                Ok(())
            }
        }
    }

    /// Update a team metric; the delta/value arity is encoded in
    /// [`MetricUpdate`]. Oversized reason/uri are dropped with a
    /// warning.
    pub async fn update_metric(
        &self,
        name: &str,
        update: MetricUpdate,
        reason: Option<String>,
        uri: Option<String>,
    ) -> Result<()> {
        let session_uuid = self.wait_for_session().await?;

        if name.is_empty() {
            return Err(AgentError::Validation(
                "\"name\" must be a non-empty string".to_string(),
            ));
        }

        let reason = match reason {
            Some(r) if r.chars().count() > MAX_TEXT_FIELD_LEN => {
                warn!("\"reason\" must be a <501 characters string");
                None
            }
            other => other,
        };
        let uri = match uri {
            Some(u) if u.chars().count() > MAX_TEXT_FIELD_LEN => {
                warn!("\"uri\" must be a <501 characters string");
                None
            }
            other => other,
        };

        let mut body = json!({
            "name": name,
            "sessionUUID": session_uuid,
            "reason": reason,
            "uri": uri,
        });
        match update {
            MetricUpdate::Delta(delta) => body["delta"] = delta.into(),
            MetricUpdate::Value(value) => body["value"] = value.into(),
        }

        match self.transport.post_json("/update-metric", body).await {
            Ok(()) => {
                self.touch_pulse();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to update metric: {e}");
                Ok(())
            }
        }
    }

    /// Link the durable user uuid to an application identifier.
    pub async fn identify_user(&self, identifier: &str) -> Result<()> {
        let user_uuid = self.wait_for_user().await?;

        validate_identifier(identifier)
            .map_err(|e| AgentError::Validation(e.to_string()))?;

        let body = json!({
            "userUUID": user_uuid,
            "identifier": identifier,
        });

        match self.transport.post_json("/identify-user", body).await {
            Ok(()) => {
                self.touch_pulse();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to identify user: {e}");
                Ok(())
            }
        }
    }

    /// Buffer one replay record from the recording library.
    pub fn record_replay_event(&self, record: serde_json::Value) {
        self.replay.push(record);
    }

    /// One flush attempt: gated on the minimum batch, cleared on
    /// success, retained on failure. Returns whether a batch shipped.
    pub async fn flush_replay(&self) -> bool {
        let Some(session_uuid) = self.session_uuid() else {
            return false;
        };
        let Some(batch) = self.replay.ready_batch(self.config.replay_min_batch) else {
            return false;
        };
        let batch_len = batch.len();

        let body = json!({
            "sessionUUID": session_uuid,
            "events": batch,
        });

        match self.transport.post_json("/append-replay-events", body).await {
            Ok(()) => {
                self.replay.discard_prefix(batch_len);
                self.touch_pulse();
                true
            }
            Err(e) => {
                warn!("Failed to send replay events: {e}");
                false
            }
        }
    }

    /// Page-unload termination: persist the pulse, then beacon the
    /// residual buffer so the gateway can compact. Best-effort, never
    /// fails.
    pub async fn terminate(&self) {
        *self.state.lock().expect("state lock poisoned") = AgentState::Terminating;

        let Some(session_uuid) = self.session_uuid() else {
            return;
        };

        self.identity.set_last_pulse(self.clock.now());

        let body = json!({
            "sessionUUID": session_uuid,
            "replayEvents": self.replay.snapshot(),
            "hasBeenRecordingReplay": self.replay.is_recording(),
            "apiKey": self.transport.api_key(),
        });
        self.transport.send_beacon("/end-session", body).await;
    }
}

/// Periodic replay flusher; exits when the session terminates.
pub fn spawn_replay_flusher(session: Arc<CaptureSession>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(session.config.replay_flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if matches!(session.state(), AgentState::Terminating) {
                break;
            }
            session.flush_replay().await;
        }
    })
}

fn uuid_from_response(response: &serde_json::Value) -> Result<Uuid> {
    response
        .get("uuid")
        .and_then(|u| u.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| AgentError::MalformedResponse("missing \"uuid\"".to_string()))
}
