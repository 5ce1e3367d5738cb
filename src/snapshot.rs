//! Versioned structured snapshot of one decoded transcript.
//!
//! The snapshot is the machine-readable counterpart of the re-rendered
//! transcript: run configuration, the typed input deck, every raw input
//! record, the runtime series, and the annulus subpoint series. The
//! format version is the first field so a downstream reader can reject
//! an incompatible snapshot before looking at anything else.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::annulus::SubpointSeries;
use crate::config::RunConfiguration;
use crate::form::Record;
use crate::input::InputDeck;
use crate::series::TimeSeries;

/// Bump on any incompatible change to the snapshot layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct Snapshot {
    /// Always serialized first.
    pub format_version: u32,
    pub config: RunConfiguration,
    pub input: InputDeck,
    /// Raw decoded records, keyed by form name, in transcript order.
    pub records: BTreeMap<String, Vec<Record>>,
    pub series: TimeSeries,
    pub subpoints: SubpointSeries,
}

impl Snapshot {
    pub fn new(
        input: InputDeck,
        records: BTreeMap<String, Vec<Record>>,
        series: TimeSeries,
        subpoints: SubpointSeries,
    ) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            config: input.config.clone(),
            input,
            records,
            series,
            subpoints,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
