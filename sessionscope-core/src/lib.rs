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

//! Core domain types for the SessionScope telemetry pipeline.
//!
//! Shared between the ingestion gateway, the storage layer, the
//! similarity engine, and the capture agent.

pub mod error;
pub mod event;
pub mod key;
pub mod metric;
pub mod session;
pub mod validation;

pub use error::{Error, Result};
pub use event::EventRecord;
pub use key::ApiKeyRecord;
pub use metric::{MetricRecord, MetricUpdate};
pub use session::{SessionRecord, SubUserRecord};
