//! Typed decode failures.
//!
//! Every decode step returns `Result<_, DecodeError>` and failures bubble
//! up undecorated until they reach the file-level driver, which logs them
//! and preserves everything decoded so far. Heuristic findings are never
//! errors; they go to the diagnostics channel as warnings.

use thiserror::Error;

/// A failure that aborts decoding of the current transcript.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The column slice runs past the end of the line.
    #[error("line {line}: field '{key}' slice {start}..{end} runs past end of line (length {len})")]
    SliceOutOfBounds {
        line: usize,
        key: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    /// A required field slice contained only blanks.
    #[error("line {line}: field '{key}' ({description}) is entirely blank")]
    BlankField {
        line: usize,
        key: &'static str,
        description: &'static str,
    },

    /// The slice content did not parse as a number.
    #[error("line {line}: field '{key}' is not numeric: '{text}'")]
    NotNumeric {
        line: usize,
        key: &'static str,
        text: String,
    },

    /// An Integer field parsed to a non-integral value.
    #[error("line {line}: field '{key}' must be a whole number, got {value}")]
    NotAnInteger {
        line: usize,
        key: &'static str,
        value: f64,
    },

    /// The printed unit text next to a Real field did not match the
    /// unit the schema declares for it.
    #[error("line {line}: field '{key}' expects unit text '{expected}', found '{found}'")]
    UnitTextMismatch {
        line: usize,
        key: &'static str,
        expected: &'static str,
        found: String,
    },

    /// The schema names a unit key the conversion table does not carry.
    #[error("line {line}: field '{key}' uses unknown unit key '{unit}'")]
    UnknownUnit {
        line: usize,
        key: &'static str,
        unit: &'static str,
    },

    /// Sub-entries of a mixed form do not sum to the printed aggregate.
    #[error("{form} at line {line}: sub-entries sum to {sum:.2} but the printed aggregate is {printed:.2}; {hint}")]
    SumMismatch {
        form: &'static str,
        line: usize,
        sum: f64,
        printed: f64,
        hint: &'static str,
    },

    /// A mixed form yielded a different number of sub-entries than the
    /// independently printed count.
    #[error("{form} at line {line}: expected {expected} sub-entries, found {found}")]
    SubEntryCount {
        form: &'static str,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A count field decoded to a negative value.
    #[error("line {line}: field '{key}' is a count and cannot be negative, got {value}")]
    NegativeCount {
        line: usize,
        key: &'static str,
        value: i64,
    },

    /// The same identifier appeared twice within one form.
    #[error("{form} at line {line}: duplicate identifier {id}")]
    DuplicateIdentifier {
        form: &'static str,
        line: usize,
        id: i64,
    },

    /// A structural marker the decoder requires was not on the next line.
    #[error("expected marker '{marker}' but line {line} reads '{text}'")]
    MissingMarker {
        marker: String,
        line: usize,
        text: String,
    },

    /// A decoded Record lacked a key the caller requires. Indicates a
    /// schema/extraction mismatch, always a defect.
    #[error("form '{form}' record has no field '{key}'")]
    MissingField { form: String, key: &'static str },

    /// The line store ran out while a valid line was still expected.
    #[error("transcript ended unexpectedly; last lines consumed:\n{}", last_lines.join("\n"))]
    UnexpectedEndOfStream { last_lines: Vec<String> },

    /// A catalog diagnostic flagged fatal stopped the run.
    #[error("fatal simulator diagnostic {code} at line {line}")]
    FatalDiagnostic { code: u16, line: usize },
}
