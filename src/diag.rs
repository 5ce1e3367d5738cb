//! Append-only diagnostics channel.
//!
//! Two families of codes flow through the channel: diagnostic codes copied
//! out of the transcript itself (catalog codes, all below 900) and the
//! decoder's own heuristic warnings (900-series). Entries are never mutated
//! once written.

use serde::Serialize;

/// Stable codes for decoder-originated warnings.
pub mod codes {
    /// All-asterisk overflow slice decoded as zero.
    pub const OVERFLOW_FIELD: u32 = 901;
    /// Field slice ends in whitespace (left-shifted value upstream).
    pub const TRAILING_BLANK: u32 = 902;
    /// Numeric-like character immediately adjacent to a field slice.
    pub const ADJACENT_DIGITS: u32 = 903;
    /// Printed unit text matched only through the accepted spelling variant.
    pub const UNIT_VARIANT: u32 = 904;
    /// Many non-fatal diagnostics accumulated; transcript deserves review.
    pub const REPEATED_DIAGNOSTICS: u32 = 905;
    /// Diagnostic marker with a code the catalog does not carry.
    pub const UNKNOWN_DIAGNOSTIC: u32 = 906;
}

/// One channel entry: a stable code, the offending transcript line
/// number(s), and a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: u32,
    pub fatal: bool,
    pub lines: Vec<usize>,
    pub message: String,
}

/// The channel itself. Append-only; entries keep arrival order.
#[derive(Debug, Default, Serialize)]
pub struct DiagnosticLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal decoder warning against one line.
    pub fn warn(&mut self, code: u32, line: usize, message: String) {
        tracing::warn!(code, line, %message, "decode warning");
        self.entries.push(Diagnostic {
            code,
            fatal: false,
            lines: vec![line],
            message,
        });
    }

    /// Record a fully-formed entry (catalog diagnostics arrive this way).
    pub fn push(&mut self, entry: Diagnostic) {
        if entry.fatal {
            tracing::error!(code = entry.code, lines = ?entry.lines, "fatal simulator diagnostic");
        } else {
            tracing::warn!(code = entry.code, lines = ?entry.lines, "simulator diagnostic");
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count of non-fatal entries that came from the transcript's own
    /// diagnostic catalog (codes below the 900-series).
    pub fn non_fatal_catalog_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| !d.fatal && d.code < 900)
            .count()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries
    }
}
