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

//! SessionScope capture agent.
//!
//! A client library that maintains end-user identity continuity,
//! filters raw UI signals into a bounded low-noise event stream,
//! buffers DOM-replay records, and flushes everything to the ingestion
//! gateway, without ever surfacing a network failure to the host
//! application. Network failures are logged and swallowed; argument
//! shape violations return `Err`, since those are integration bugs.
//!
//! The clock, transport, and identity storage are injected
//! capabilities, so flush timing and network behavior are
//! deterministically testable.

pub mod autocapture;
pub mod clock;
pub mod identity;
pub mod replay;
pub mod session;
pub mod transport;

pub use autocapture::{
    click_event, error_event, page_view_event, CapturedEvent, ClickSignal, ElementInfo,
    ScrollTracker, CLICKABLE_TAGS, SCROLL_MILESTONES,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{FileIdentityStore, IdentityStore, MemoryIdentityStore};
pub use replay::ReplayBuffer;
pub use session::{spawn_replay_flusher, AgentState, CaptureConfig, CaptureSession};
pub use transport::{AgentError, HttpTransport, Transport};
