//! File-level decode driver.
//!
//! Runs the whole pipeline over one transcript and never lets a failure
//! escape: whatever decoded before the failure is kept in the outcome,
//! alongside the re-rendered transcript, the diagnostics channel, and
//! the failure itself.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::annulus;
use crate::config::RunConfiguration;
use crate::cursor::Cursor;
use crate::diag::{Diagnostic, codes};
use crate::error::DecodeError;
use crate::form::FormReader;
use crate::input::{self, InputDeck};
use crate::series::TimeSeries;
use crate::snapshot::Snapshot;
use crate::store::LineStore;
use crate::timestep;
use crate::units::StandardUnits;

/// Non-fatal catalog diagnostics tolerated before the transcript as a
/// whole is flagged for review. The upstream simulator escalates some
/// repeated warnings on its own accounting, which the per-code catalog
/// cannot see.
pub const REPEATED_DIAG_REVIEW_THRESHOLD: usize = 25;

/// Everything one transcript yields, failure or not.
#[derive(Debug)]
pub struct FileOutcome {
    pub snapshot: Snapshot,
    /// The re-rendered, unit-converted transcript.
    pub rendered: String,
    pub diagnostics: Vec<Diagnostic>,
    /// The failure that stopped decoding, if any.
    pub error: Option<DecodeError>,
}

impl FileOutcome {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode one transcript. Never returns an error: failures land in
/// `FileOutcome::error` with all partial output preserved.
pub fn decode_text(text: &str) -> FileOutcome {
    let mut cursor = Cursor::new(LineStore::from_text(text));
    let units = StandardUnits;

    let mut records = BTreeMap::new();
    let mut config = RunConfiguration::default();
    let mut series = TimeSeries::new();
    let mut trains = Vec::new();

    let mut error = None;
    let mut deck = None;
    {
        let mut reader = FormReader::new(&mut cursor, &units);
        match input::decode_input(&mut reader, &mut records, &mut config) {
            Ok(d) => {
                if let Err(e) = timestep::decode_run(&mut reader, &d, &mut series, &mut trains) {
                    error = Some(e);
                }
                deck = Some(d);
            }
            Err(e) => error = Some(e),
        }
    }
    // On an input failure the deck never materialized; keep whatever the
    // configuration extraction managed before the failure.
    let deck = deck.unwrap_or_else(|| InputDeck {
        config,
        ..InputDeck::default()
    });

    let subpoints = annulus::derive_subpoints(&deck, &series, &trains);
    let (rendered, mut diags, fatal) = cursor.into_parts();

    if diags.non_fatal_catalog_count() > REPEATED_DIAG_REVIEW_THRESHOLD {
        diags.push(Diagnostic {
            code: codes::REPEATED_DIAGNOSTICS,
            fatal: false,
            lines: Vec::new(),
            message: format!(
                "{} non-fatal simulator diagnostics in one run; review the \
                 transcript before trusting the decoded results",
                diags.non_fatal_catalog_count()
            ),
        });
    }
    if error.is_none()
        && let Some((code, line)) = fatal
    {
        error = Some(DecodeError::FatalDiagnostic { code, line });
    }
    if let Some(e) = &error {
        tracing::error!(error = %e, "transcript decode failed");
    }

    FileOutcome {
        snapshot: Snapshot::new(deck, records, series, subpoints),
        rendered,
        diagnostics: diags.into_entries(),
        error,
    }
}

/// Read and decode one transcript file. Only the read itself can fail.
pub fn decode_file(path: &Path) -> io::Result<FileOutcome> {
    let text = std::fs::read_to_string(path)?;
    tracing::info!(path = %path.display(), bytes = text.len(), "decoding transcript");
    Ok(decode_text(&text))
}
