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

//! Storage layer for the SessionScope pipeline.
//!
//! Two halves with very different shapes:
//!
//! - Row stores ([`SessionStore`], [`EventStore`], [`MetricStore`],
//!   [`KeyStore`]) stand in for the external relational collaborator and
//!   are consumed via plain CRUD operations over concurrent maps.
//! - The replay blob store ([`ReplayStore`] over an [`ObjectStore`])
//!   holds one newline-delimited JSON object per session, appended by
//!   read-modify-write under a per-session single-writer lock and
//!   compacted to a gzip archive at session end.
//!
//! The storage engine is synchronous (std I/O); callers on async
//! runtimes invoke it directly, as these operations are local and short.

pub mod event_store;
pub mod key_store;
pub mod metric_store;
pub mod replay_store;
pub mod session_store;

pub use event_store::EventStore;
pub use key_store::KeyStore;
pub use metric_store::{MetricOutcome, MetricStore};
pub use replay_store::{FsObjectStore, ObjectStore, ReplayStore};
pub use session_store::SessionStore;
