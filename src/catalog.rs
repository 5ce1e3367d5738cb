//! The simulator's diagnostic catalog.
//!
//! The upstream simulator interleaves numbered diagnostic blocks with its
//! data output. Each code determines how many lines around the marker line
//! belong to the block (`lines_after` includes the marker itself) and
//! whether the diagnostic ends the run. The catalog is process-wide,
//! read-only, and initialized once.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Marker substring that opens every diagnostic block.
pub const DIAG_MARKER: &str = "*ERROR* TYPE";

/// Code printed when the simulator stops writing output. It has zero
/// lines after the marker and means no further valid lines exist.
pub const END_OF_RUN_CODE: u16 = 9;

/// Widest `lines_before` across the catalog; the cursor scans this many
/// lines ahead for a marker before trusting a line as data.
pub const MAX_LINES_BEFORE: usize = 2;

/// How a diagnostic block is bounded and classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub lines_before: usize,
    /// Lines from the marker onward, marker line included.
    pub lines_after: usize,
    pub fatal: bool,
}

const fn entry(lines_before: usize, lines_after: usize, fatal: bool) -> CatalogEntry {
    CatalogEntry {
        lines_before,
        lines_after,
        fatal,
    }
}

static CATALOG: Lazy<HashMap<u16, CatalogEntry>> = Lazy::new(|| {
    HashMap::from([
        // Airflow oscillation notice: marker plus one explanation line.
        (1, entry(0, 2, false)),
        // Train performance limited by adhesion.
        (2, entry(0, 3, false)),
        // Humidity out of range; one context line precedes the marker.
        (3, entry(1, 2, false)),
        // Heat-sink matrix singular. Unrecoverable upstream.
        (4, entry(0, 2, true)),
        // Airflow solution diverged.
        (5, entry(0, 1, true)),
        // Simulation stopped; nothing follows.
        (END_OF_RUN_CODE, entry(0, 0, false)),
        // Thermodynamic iteration limit; two context lines precede.
        (12, entry(2, 4, true)),
    ])
});

/// Look up a diagnostic code. `None` for codes the catalog does not carry.
pub fn lookup(code: u16) -> Option<CatalogEntry> {
    CATALOG.get(&code).copied()
}

/// If `line` is a diagnostic marker line, extract its numeric code.
pub fn parse_code(line: &str) -> Option<u16> {
    let idx = line.find(DIAG_MARKER)?;
    let rest = &line[idx + DIAG_MARKER.len()..];
    rest.split_whitespace().next()?.parse().ok()
}
