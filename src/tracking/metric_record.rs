//! Metric record: one point of a run's metric time series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single logged metric value.
///
/// A run's history for one key is ordered by `step`; the latest value of a
/// key is the one with the highest step, ties broken by `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Record `value` for `key` at `step`, timestamped now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Override the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Run the metric belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Metric key, e.g. `accuracy_score_on_data_iris`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Step within the run.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Wall-clock time the value was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Ordering key used to pick a key's latest value.
    pub(crate) const fn recency(&self) -> (u64, DateTime<Utc>) {
        (self.step, self.timestamp)
    }
}
