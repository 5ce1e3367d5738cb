//! Column-slice field decoder.
//!
//! A field is a half-open byte range on one line plus a declared kind.
//! Decoding runs a fixed sequence of sanity checks, converts Real values
//! through the unit collaborator, and splices the SI rendition back into
//! the cursor's rendered copy of the line.

use crate::cursor::Cursor;
use crate::diag::codes;
use crate::error::DecodeError;
use crate::units::{self, UnitConverter};
use serde::Serialize;

/// What a slice holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    /// Real number in the source unit named by the key.
    Real(&'static str),
    Verbatim,
}

/// Declarative description of one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Valid lines to advance before decoding this field. Zero keeps the
    /// form reader on the line of the previous field.
    pub skip_before: usize,
    pub key: &'static str,
    pub start: usize,
    pub end: usize,
    pub kind: FieldKind,
    /// Decimal places in the printed (and re-rendered) representation.
    pub decimals: usize,
    /// When set, the printed unit text sits this many columns after the
    /// slice and is verified and substituted during decode.
    pub unit_gap: Option<usize>,
    /// Suppress the adjacent-character heuristic for this field.
    pub allow_adjacent: bool,
    pub description: &'static str,
}

impl FieldSpec {
    pub fn int(skip_before: usize, key: &'static str, start: usize, end: usize) -> Self {
        Self {
            skip_before,
            key,
            start,
            end,
            kind: FieldKind::Integer,
            decimals: 0,
            unit_gap: None,
            allow_adjacent: false,
            description: key,
        }
    }

    pub fn real(
        skip_before: usize,
        key: &'static str,
        start: usize,
        end: usize,
        unit: &'static str,
        decimals: usize,
    ) -> Self {
        Self {
            skip_before,
            key,
            start,
            end,
            kind: FieldKind::Real(unit),
            decimals,
            unit_gap: None,
            allow_adjacent: false,
            description: key,
        }
    }

    pub fn verbatim(skip_before: usize, key: &'static str, start: usize, end: usize) -> Self {
        Self {
            skip_before,
            key,
            start,
            end,
            kind: FieldKind::Verbatim,
            decimals: 0,
            unit_gap: None,
            allow_adjacent: false,
            description: key,
        }
    }

    /// Declare printed unit text `gap` columns after the slice.
    pub fn with_unit_text(mut self, gap: usize) -> Self {
        self.unit_gap = Some(gap);
        self
    }

    pub fn allowing_adjacent(mut self) -> Self {
        self.allow_adjacent = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// One decoded value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Keys exempt from the trailing-whitespace heuristic. Both are known
/// upstream formatting quirks: the title is left-justified free text and
/// the humidity column is left-shifted by the simulator's list output.
const TRAILING_BLANK_EXEMPT: [&str; 2] = ["title", "humidity"];

/// Characters that look like part of a number.
fn numeric_like(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | '*')
}

/// Decode one field from the line at store index `idx`.
pub fn decode_field(
    cursor: &mut Cursor,
    idx: usize,
    spec: &FieldSpec,
    units: &dyn UnitConverter,
) -> Result<Value, DecodeError> {
    let rec = cursor.line(idx);
    let number = rec.number;
    let text = rec.text.clone();

    // `get` also rejects a slice landing inside a multibyte character.
    let slice = if spec.start < spec.end {
        text.get(spec.start..spec.end)
    } else {
        None
    }
    .ok_or(DecodeError::SliceOutOfBounds {
        line: number,
        key: spec.key,
        start: spec.start,
        end: spec.end,
        len: text.len(),
    })?;

    if slice.trim().is_empty() {
        return Err(DecodeError::BlankField {
            line: number,
            key: spec.key,
            description: spec.description,
        });
    }

    if slice.ends_with(char::is_whitespace) && !TRAILING_BLANK_EXEMPT.contains(&spec.key) {
        cursor.diags_mut().warn(
            codes::TRAILING_BLANK,
            number,
            format!("field '{}' slice ends in whitespace", spec.key),
        );
    }

    // Soft check: a digit hard against the slice boundary often means a
    // wide neighbouring value bled over. It can false-positive on large
    // numbers, so it never aborts.
    if !spec.allow_adjacent {
        let before = text.get(..spec.start).and_then(|s| s.chars().next_back());
        let after = text.get(spec.end..).and_then(|s| s.chars().next());
        if before.is_some_and(numeric_like) || after.is_some_and(numeric_like) {
            cursor.diags_mut().warn(
                codes::ADJACENT_DIGITS,
                number,
                format!("numeric-like character adjacent to field '{}'", spec.key),
            );
        }
    }

    if spec.kind == FieldKind::Verbatim {
        return Ok(Value::Text(slice.trim_end().to_string()));
    }

    // An all-asterisk slice is the upstream overflow marker: the value was
    // too wide for its column and got replaced with asterisks.
    if slice.trim().chars().all(|c| c == '*') {
        cursor.diags_mut().warn(
            codes::OVERFLOW_FIELD,
            number,
            format!("field '{}' overflowed upstream; decoded as zero", spec.key),
        );
        return Ok(match spec.kind {
            FieldKind::Integer => Value::Int(0),
            _ => Value::Real(0.0),
        });
    }

    let raw: f64 = slice
        .trim()
        .parse()
        .map_err(|_| DecodeError::NotNumeric {
            line: number,
            key: spec.key,
            text: slice.trim().to_string(),
        })?;

    match spec.kind {
        FieldKind::Integer => {
            if raw.fract() != 0.0 {
                return Err(DecodeError::NotAnInteger {
                    line: number,
                    key: spec.key,
                    value: raw,
                });
            }
            Ok(Value::Int(raw as i64))
        }
        FieldKind::Real(unit) => {
            let conv = units
                .convert(unit, raw)
                .ok_or(DecodeError::UnknownUnit {
                    line: number,
                    key: spec.key,
                    unit,
                })?;

            // SI numeral replaces the source numeral in the rendered line.
            let width = spec.end - spec.start;
            let numeral = format!("{:>width$.prec$}", conv.si, prec = spec.decimals);
            cursor.splice(idx, spec.start, spec.end, &numeral);

            if let Some(gap) = spec.unit_gap {
                let from = spec.end + gap;
                let to = from + conv.source_label.len();
                let found = text.get(from..to).unwrap_or("");
                if found != conv.source_label {
                    if units::variant_accepted(conv.source_label, found) {
                        cursor.diags_mut().warn(
                            codes::UNIT_VARIANT,
                            number,
                            format!(
                                "field '{}' unit printed as '{}' (variant of '{}')",
                                spec.key,
                                found.trim_end(),
                                conv.source_label
                            ),
                        );
                    } else {
                        return Err(DecodeError::UnitTextMismatch {
                            line: number,
                            key: spec.key,
                            expected: conv.source_label,
                            found: found.to_string(),
                        });
                    }
                }
                let si_text = if conv.si_label.len() < conv.source_label.len() {
                    format!("{:<width$}", conv.si_label, width = conv.source_label.len())
                } else {
                    conv.si_label.to_string()
                };
                cursor.splice(idx, from, to, &si_text);
            }

            Ok(Value::Real(conv.si))
        }
        FieldKind::Verbatim => unreachable!("handled above"),
    }
}
