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

//! Metric row store keyed by (team, name).
//!
//! Updates never create a metric: an unknown name reports
//! [`MetricOutcome::NotFound`] and leaves the store untouched.

use dashmap::DashMap;
use sessionscope_core::{MetricRecord, MetricUpdate};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricOutcome {
    /// The metric existed; carries the resulting value.
    Applied(f64),
    /// No metric with that name exists for the team.
    NotFound,
}

#[derive(Default)]
pub struct MetricStore {
    metrics: DashMap<(i64, String), f64>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a metric. This is the operator plane; the ingestion
    /// path never creates metrics.
    pub fn insert(&self, team_id: i64, name: &str, value: f64) {
        self.metrics.insert((team_id, name.to_string()), value);
    }

    pub fn get(&self, team_id: i64, name: &str) -> Option<MetricRecord> {
        self.metrics
            .get(&(team_id, name.to_string()))
            .map(|value| MetricRecord {
                team_id,
                name: name.to_string(),
                value: *value,
            })
    }

    pub fn update(&self, team_id: i64, name: &str, update: MetricUpdate) -> MetricOutcome {
        match self.metrics.get_mut(&(team_id, name.to_string())) {
            Some(mut value) => {
                let next = match update {
                    MetricUpdate::Delta(delta) => *value + delta,
                    MetricUpdate::Value(absolute) => absolute,
                };
                *value = next;
                MetricOutcome::Applied(next)
            }
            None => MetricOutcome::NotFound,
        }
    }
}
