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

//! Team-scoped named metrics.
//!
//! Metrics must pre-exist before an update is accepted; there is no
//! implicit creation on the ingestion path.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    pub team_id: i64,
    pub name: String,
    pub value: f64,
}

/// A metric mutation: relative or absolute, never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricUpdate {
    Delta(f64),
    Value(f64),
}

impl MetricUpdate {
    /// Build from the wire representation where both fields are optional
    /// but exactly one must be present.
    pub fn from_parts(delta: Option<f64>, value: Option<f64>) -> Option<Self> {
        match (delta, value) {
            (Some(d), None) => Some(MetricUpdate::Delta(d)),
            (None, Some(v)) => Some(MetricUpdate::Value(v)),
            _ => None,
        }
    }
}
