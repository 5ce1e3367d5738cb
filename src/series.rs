//! Append-only time series keyed by quantity and entity.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// All decoded runtime quantities. Samples are appended one timestep at a
/// time and times are strictly increasing per (quantity, entity) key; the
/// estimate-block epsilon handling upstream guarantees that.
#[derive(Debug, Default, Serialize)]
pub struct TimeSeries {
    series: BTreeMap<String, BTreeMap<String, Vec<Sample>>>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, quantity: &str, entity: &str, time: f64, value: f64) {
        let samples = self
            .series
            .entry(quantity.to_string())
            .or_default()
            .entry(entity.to_string())
            .or_default();
        debug_assert!(
            samples.last().is_none_or(|s| s.time < time),
            "non-increasing time {time} for {quantity}/{entity}"
        );
        samples.push(Sample { time, value });
    }

    pub fn get(&self, quantity: &str, entity: &str) -> Option<&[Sample]> {
        self.series
            .get(quantity)
            .and_then(|m| m.get(entity))
            .map(Vec::as_slice)
    }

    /// Latest value at or before `t`.
    pub fn latest_at(&self, quantity: &str, entity: &str, t: f64) -> Option<f64> {
        self.get(quantity, entity)?
            .iter()
            .take_while(|s| s.time <= t + crate::config::TIME_MATCH_TOL)
            .last()
            .map(|s| s.value)
    }

    pub fn quantities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn entities(&self, quantity: &str) -> impl Iterator<Item = &str> {
        self.series
            .get(quantity)
            .into_iter()
            .flat_map(|m| m.keys().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
