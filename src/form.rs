//! Declarative form reading.
//!
//! A form is an ordered field list applied across one or more lines. The
//! reader drives the field decoder over the cursor and yields `Record`s:
//! immutable key→value maps. Repetition comes in three shapes: a fixed
//! count (known from the run configuration), sentinel-terminated (read
//! while a lookahead line carries a marker, then rewind one step), and
//! mixed sub-entry lines (up to N fixed-width sub-slices per line, with
//! occupancy measured by non-blank content and a sum consistency check
//! against an independently printed aggregate).

use std::collections::BTreeMap;

use crate::cursor::{Cursor, Next};
use crate::error::DecodeError;
use crate::field::{self, FieldSpec, Value};
use crate::units::UnitConverter;

/// Ordered field list making up one logical record.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl FormSpec {
    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// One decoded record. Immutable once built.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Record {
    pub form: String,
    /// Transcript line number of the record's first decoded field.
    pub line: usize,
    pub values: BTreeMap<String, Value>,
}

impl Record {
    fn new(form: &str) -> Self {
        Self {
            form: form.to_string(),
            line: 0,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn int(&self, key: &'static str) -> Result<i64, DecodeError> {
        self.values
            .get(key)
            .and_then(Value::as_int)
            .ok_or(DecodeError::MissingField {
                form: self.form.clone(),
                key,
            })
    }

    pub fn real(&self, key: &'static str) -> Result<f64, DecodeError> {
        self.values
            .get(key)
            .and_then(Value::as_real)
            .ok_or(DecodeError::MissingField {
                form: self.form.clone(),
                key,
            })
    }

    pub fn text(&self, key: &'static str) -> Result<&str, DecodeError> {
        self.values
            .get(key)
            .and_then(Value::as_text)
            .ok_or(DecodeError::MissingField {
                form: self.form.clone(),
                key,
            })
    }
}

/// Drives the field decoder across the cursor.
pub struct FormReader<'a> {
    pub cursor: &'a mut Cursor,
    pub units: &'a dyn UnitConverter,
}

impl<'a> FormReader<'a> {
    pub fn new(cursor: &'a mut Cursor, units: &'a dyn UnitConverter) -> Self {
        Self { cursor, units }
    }

    /// Next valid data line; end-of-run here means the transcript stopped
    /// inside a structure that required more data.
    pub fn data_line(&mut self) -> Result<usize, DecodeError> {
        match self.cursor.next_valid()? {
            Next::Line(idx) => Ok(idx),
            Next::EndOfRun => Err(DecodeError::UnexpectedEndOfStream {
                last_lines: vec!["<end-of-run diagnostic>".to_string()],
            }),
        }
    }

    /// Next data line, or `None` on the end-of-run diagnostic. Used at
    /// points where the run is allowed to stop.
    pub fn data_line_or_end(&mut self) -> Result<Option<usize>, DecodeError> {
        match self.cursor.next_valid()? {
            Next::Line(idx) => Ok(Some(idx)),
            Next::EndOfRun => Ok(None),
        }
    }

    /// Require the next data line to contain `marker`.
    pub fn expect_marker(&mut self, marker: &str) -> Result<usize, DecodeError> {
        let idx = self.data_line()?;
        let rec = self.cursor.line(idx);
        if rec.text.contains(marker) {
            Ok(idx)
        } else {
            Err(DecodeError::MissingMarker {
                marker: marker.to_string(),
                line: rec.number,
                text: rec.text.trim_end().to_string(),
            })
        }
    }

    /// Apply one form starting at the current position.
    pub fn read(&mut self, form: &FormSpec) -> Result<Record, DecodeError> {
        let mut record = Record::new(form.name);
        let mut line_idx: Option<usize> = None;
        for spec in &form.fields {
            for _ in 0..spec.skip_before {
                line_idx = Some(self.data_line()?);
            }
            let idx = match line_idx {
                Some(idx) => idx,
                // First field with skip 0: start on the next line anyway.
                None => {
                    let idx = self.data_line()?;
                    line_idx = Some(idx);
                    idx
                }
            };
            if record.line == 0 {
                record.line = self.cursor.line(idx).number;
            }
            let value = field::decode_field(self.cursor, idx, spec, self.units)?;
            record.values.insert(spec.key.to_string(), value);
        }
        Ok(record)
    }

    /// Apply one form against an already-fetched line. Every field must
    /// have `skip_before == 0`.
    pub fn read_at(&mut self, idx: usize, form: &FormSpec) -> Result<Record, DecodeError> {
        let mut record = Record::new(form.name);
        record.line = self.cursor.line(idx).number;
        for spec in &form.fields {
            debug_assert_eq!(spec.skip_before, 0, "read_at form must stay on one line");
            let value = field::decode_field(self.cursor, idx, spec, self.units)?;
            record.values.insert(spec.key.to_string(), value);
        }
        Ok(record)
    }

    /// Fixed-count repetition: read the form exactly `count` times.
    pub fn read_fixed(&mut self, form: &FormSpec, count: usize) -> Result<Vec<Record>, DecodeError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read(form)?);
        }
        Ok(out)
    }

    /// Sentinel-terminated repetition: read while the lookahead line
    /// contains `marker`; on the first line without it, rewind one step.
    pub fn read_while_marker(
        &mut self,
        form: &FormSpec,
        marker: &str,
    ) -> Result<Vec<Record>, DecodeError> {
        let mut out = Vec::new();
        loop {
            let mark = self.cursor.pos();
            let idx = match self.cursor.next_valid()? {
                Next::Line(idx) => idx,
                Next::EndOfRun => break,
            };
            if !self.cursor.line(idx).text.contains(marker) {
                self.cursor.seek(mark);
                break;
            }
            self.cursor.seek(mark);
            out.push(self.read(form)?);
        }
        Ok(out)
    }

    /// Mixed sub-entry reading: decode `total` real sub-entries laid out
    /// `per_line` to a line in fixed-width sub-slices produced by
    /// `slot_spec`. Occupancy is measured by non-blank content; the parsed
    /// sum must match `printed_sum` within `tolerance`.
    pub fn read_sub_entries(
        &mut self,
        form: &'static str,
        slot_spec: impl Fn(usize) -> FieldSpec,
        per_line: usize,
        total: usize,
        printed_sum: f64,
        tolerance: f64,
        hint: &'static str,
    ) -> Result<Vec<f64>, DecodeError> {
        let mut values = Vec::with_capacity(total);
        let lines = total.div_ceil(per_line);
        let mut first_line = 0;
        for _ in 0..lines {
            let idx = self.data_line()?;
            let rec_number = self.cursor.line(idx).number;
            if first_line == 0 {
                first_line = rec_number;
            }
            let text = self.cursor.line(idx).text.clone();
            for slot in 0..per_line {
                let spec = slot_spec(slot);
                let occupied = text
                    .get(spec.start..spec.end)
                    .map(|s| !s.trim().is_empty())
                    .unwrap_or(false);
                if !occupied {
                    break;
                }
                let v = field::decode_field(self.cursor, idx, &spec, self.units)?;
                values.push(v.as_real().unwrap_or(0.0));
            }
        }
        if values.len() != total {
            return Err(DecodeError::SubEntryCount {
                form,
                line: first_line,
                expected: total,
                found: values.len(),
            });
        }
        let sum: f64 = values.iter().sum();
        if (sum - printed_sum).abs() > tolerance {
            return Err(DecodeError::SumMismatch {
                form,
                line: first_line,
                sum,
                printed: printed_sum,
                hint,
            });
        }
        Ok(values)
    }
}
