//! Validity-tagged cursor over the line store.
//!
//! The cursor owns the single monotonically advancing read position. It
//! tags lines invalid when they belong to a recognized diagnostic block,
//! logs the block to the diagnostics channel, and serves `next_valid()`
//! with three distinguishable outcomes: an ordinary data line, the
//! end-of-run diagnostic (no further valid lines exist), or a hard
//! `UnexpectedEndOfStream`.
//!
//! It also owns the pass-through render: a mutable copy of every stored
//! line into which the field decoder splices converted numerals and unit
//! text. Splices on one line must be applied left to right.

use std::collections::VecDeque;

use crate::catalog;
use crate::diag::{Diagnostic, DiagnosticLog, codes};
use crate::error::DecodeError;
use crate::store::{LineRecord, LineStore};

/// How many consumed lines are reported with `UnexpectedEndOfStream`.
const TRAIL_LEN: usize = 10;

/// Outcome of `next_valid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Store index of the next valid data line.
    Line(usize),
    /// The end-of-run diagnostic was seen; no further valid lines exist.
    EndOfRun,
}

pub struct Cursor {
    store: LineStore,
    valid: Vec<bool>,
    pos: usize,
    /// Mutable copy of each line for the re-rendered SI transcript.
    render: Vec<String>,
    /// Byte offset shift accumulated by splices, per line.
    render_delta: Vec<isize>,
    diags: DiagnosticLog,
    trail: VecDeque<String>,
    /// Highest store index already pushed to the trail.
    trail_next: usize,
    fatal: Option<(u16, usize)>,
    ended: bool,
}

impl Cursor {
    pub fn new(store: LineStore) -> Self {
        let n = store.len();
        let render = store.iter().map(|r| r.text.clone()).collect();
        Self {
            store,
            valid: vec![true; n],
            pos: 0,
            render,
            render_delta: vec![0; n],
            diags: DiagnosticLog::new(),
            trail: VecDeque::with_capacity(TRAIL_LEN),
            trail_next: 0,
            fatal: None,
            ended: false,
        }
    }

    /// Advance past invalid lines and return the next valid one.
    pub fn next_valid(&mut self) -> Result<Next, DecodeError> {
        if self.ended {
            return Ok(Next::EndOfRun);
        }
        'seek: loop {
            if self.pos >= self.store.len() {
                return Err(DecodeError::UnexpectedEndOfStream {
                    last_lines: self.trail.iter().cloned().collect(),
                });
            }
            if !self.valid[self.pos] {
                self.record_trail(self.pos);
                self.pos += 1;
                continue;
            }
            // A diagnostic marker a few lines ahead may claim this line
            // as part of its leading context.
            let horizon = (self.pos + catalog::MAX_LINES_BEFORE + 1).min(self.store.len());
            for j in self.pos..horizon {
                if !self.valid[j] {
                    continue;
                }
                let text = &self.store.get(j).expect("index in range").text;
                if let Some(code) = catalog::parse_code(text) {
                    let reach = catalog::lookup(code).map(|e| e.lines_before).unwrap_or(0);
                    if j - self.pos <= reach {
                        if self.absorb_block(j, code) {
                            return Ok(Next::EndOfRun);
                        }
                        continue 'seek;
                    }
                }
            }
            let idx = self.pos;
            self.record_trail(idx);
            self.pos += 1;
            return Ok(Next::Line(idx));
        }
    }

    /// Tag the block around the marker at `marker_idx` invalid and log it.
    /// Returns true when the code means end of run.
    fn absorb_block(&mut self, marker_idx: usize, code: u16) -> bool {
        let entry = match catalog::lookup(code) {
            Some(e) => e,
            None => {
                let number = self.store.get(marker_idx).expect("index in range").number;
                self.diags.warn(
                    codes::UNKNOWN_DIAGNOSTIC,
                    number,
                    format!("diagnostic code {code} is not in the catalog; marker line skipped"),
                );
                catalog::CatalogEntry {
                    lines_before: 0,
                    lines_after: 1,
                    fatal: false,
                }
            }
        };

        let start = marker_idx - entry.lines_before.min(marker_idx);
        let end = (marker_idx + entry.lines_after).min(self.store.len());
        let mut lines = Vec::new();
        let mut text = Vec::new();
        for i in start..end.max(marker_idx + 1) {
            self.valid[i] = false;
            let rec = self.store.get(i).expect("index in range");
            lines.push(rec.number);
            text.push(rec.text.trim_end().to_string());
        }
        tracing::debug!(code, first_line = lines.first(), "absorbed diagnostic block");
        self.diags.push(Diagnostic {
            code: u32::from(code),
            fatal: entry.fatal,
            lines,
            message: text.join("\n"),
        });

        if entry.fatal && self.fatal.is_none() {
            let number = self.store.get(marker_idx).expect("index in range").number;
            self.fatal = Some((code, number));
        }
        if entry.lines_after == 0 {
            self.ended = true;
        }
        self.ended
    }

    fn record_trail(&mut self, idx: usize) {
        if idx < self.trail_next {
            return; // re-read after a rewind; already recorded
        }
        self.trail_next = idx + 1;
        if self.trail.len() == TRAIL_LEN {
            self.trail.pop_front();
        }
        let rec = self.store.get(idx).expect("index in range");
        self.trail
            .push_back(format!("{:>6}  {}", rec.number, rec.text.trim_end()));
    }

    pub fn line(&self, idx: usize) -> &LineRecord {
        self.store.get(idx).expect("cursor index out of range")
    }

    /// Current read position, for lookahead-and-rewind callers.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Rewind to a position previously obtained from `pos()`.
    pub fn seek(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    /// Splice `replacement` over byte range `start..end` of the rendered
    /// copy of line `idx`. Ranges refer to the original line; splices on
    /// one line must arrive left to right.
    pub fn splice(&mut self, idx: usize, start: usize, end: usize, replacement: &str) {
        let delta = self.render_delta[idx];
        let s = usize::try_from(start as isize + delta).expect("splice shifted before line start");
        let e = usize::try_from(end as isize + delta).expect("splice shifted before line start");
        self.render[idx].replace_range(s..e, replacement);
        self.render_delta[idx] += replacement.len() as isize - (end - start) as isize;
    }

    pub fn diags_mut(&mut self) -> &mut DiagnosticLog {
        &mut self.diags
    }

    pub fn diags(&self) -> &DiagnosticLog {
        &self.diags
    }

    /// The fatal catalog diagnostic seen so far, if any: (code, line).
    pub fn fatal(&self) -> Option<(u16, usize)> {
        self.fatal
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Finish: the re-rendered transcript and the diagnostics channel.
    pub fn into_parts(self) -> (String, DiagnosticLog, Option<(u16, usize)>) {
        let mut rendered = self.render.join("\n");
        if !rendered.is_empty() {
            rendered.push('\n');
        }
        (rendered, self.diags, self.fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_from(lines: &[&str]) -> Cursor {
        Cursor::new(LineStore::from_text(&lines.join("\n")))
    }

    #[test]
    fn test_plain_advance() {
        let mut c = cursor_from(&["A", "B"]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(0));
        assert_eq!(c.next_valid().unwrap(), Next::Line(1));
        assert!(matches!(
            c.next_valid(),
            Err(DecodeError::UnexpectedEndOfStream { .. })
        ));
    }

    #[test]
    fn test_non_fatal_block_is_skipped_and_logged() {
        // Code 1: marker plus one following line.
        let mut c = cursor_from(&[
            "DATA 1",
            "  *ERROR* TYPE  1   AIRFLOW OSCILLATION",
            "  DAMPING APPLIED",
            "DATA 2",
        ]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(0));
        assert_eq!(c.next_valid().unwrap(), Next::Line(3));
        let d = &c.diags().entries()[0];
        assert_eq!(d.code, 1);
        assert!(!d.fatal);
        assert_eq!(d.lines, vec![2, 3]);
    }

    #[test]
    fn test_leading_context_lines_are_claimed() {
        // Code 3 claims one line before its marker.
        let mut c = cursor_from(&[
            "DATA 1",
            "  HUMIDITY CONTEXT",
            "  *ERROR* TYPE  3   HUMIDITY OUT OF RANGE",
            "  CLAMPED",
            "DATA 2",
        ]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(0));
        assert_eq!(c.next_valid().unwrap(), Next::Line(4));
        assert_eq!(c.diags().entries()[0].lines, vec![2, 3, 4]);
    }

    #[test]
    fn test_fatal_block_sets_flag_but_continues() {
        let mut c = cursor_from(&[
            "  *ERROR* TYPE  4   HEAT SINK MATRIX IS SINGULAR",
            "  RERUN WITH SMALLER TIME STEP",
            "DATA",
        ]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(2));
        assert_eq!(c.fatal(), Some((4, 1)));
    }

    #[test]
    fn test_end_of_run_code() {
        let mut c = cursor_from(&["DATA", "  *ERROR* TYPE  9   SIMULATION STOPPED", "IGNORED"]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(0));
        assert_eq!(c.next_valid().unwrap(), Next::EndOfRun);
        // Subsequent calls stay terminal.
        assert_eq!(c.next_valid().unwrap(), Next::EndOfRun);
    }

    #[test]
    fn test_unknown_code_consumes_marker_only() {
        let mut c = cursor_from(&["  *ERROR* TYPE  77  WHO KNOWS", "DATA"]);
        assert_eq!(c.next_valid().unwrap(), Next::Line(1));
        let entries = c.diags().entries();
        assert_eq!(entries[0].code, codes::UNKNOWN_DIAGNOSTIC);
        assert_eq!(entries[1].code, 77);
    }

    #[test]
    fn test_seek_rewind() {
        let mut c = cursor_from(&["A", "B", "C"]);
        c.next_valid().unwrap();
        let mark = c.pos();
        assert_eq!(c.next_valid().unwrap(), Next::Line(1));
        c.seek(mark);
        assert_eq!(c.next_valid().unwrap(), Next::Line(1));
    }

    #[test]
    fn test_splice_tracks_growth() {
        let mut c = cursor_from(&["VALUE   100.0 CFM END"]);
        // "100.0" at 8..13, unit "CFM" at 14..17.
        c.splice(0, 8, 13, "0.0472");
        c.splice(0, 14, 17, "M**3/S");
        let (rendered, _, _) = c.into_parts();
        assert_eq!(rendered, "VALUE   0.0472 M**3/S END\n");
    }

    #[test]
    fn test_trail_reported_on_end_of_stream() {
        let mut c = cursor_from(&["ONLY LINE"]);
        c.next_valid().unwrap();
        match c.next_valid() {
            Err(DecodeError::UnexpectedEndOfStream { last_lines }) => {
                assert_eq!(last_lines.len(), 1);
                assert!(last_lines[0].contains("ONLY LINE"));
            }
            other => panic!("expected end of stream, got {other:?}"),
        }
    }
}
