//! # ventrec
//!
//! A decoder for the fixed-column transcripts printed by a legacy tunnel
//! ventilation simulator.
//!
//! The simulator writes page-oriented text: an echo of its input deck
//! (forms 1 through 12), then one block of tables per simulated timestep,
//! with numbered diagnostic messages interleaved anywhere. Every value
//! sits in a fixed physical column range and carries printed US units.
//!
//! ## Overview
//!
//! Decoding one transcript runs through:
//! - **Line store**: headers, footers and page breaks stripped, original
//!   line numbers kept for diagnostics
//! - **Cursor**: skips diagnostic blocks via the error catalog and owns
//!   the re-rendered SI copy of every line
//! - **Form reader**: applies declarative column schemas to produce
//!   records, converting units through the collaborator as it goes
//! - **Timestep machine**: decodes the runtime tables into time series
//! - **Annulus post-pass**: derives open area and flow around trains
//!
//! ## Example
//!
//! ```
//! use ventrec::decode_text;
//!
//! let outcome = decode_text("NOT A TRANSCRIPT\n");
//! assert!(outcome.is_failure());
//! // Partial output survives any failure.
//! assert_eq!(outcome.rendered, "NOT A TRANSCRIPT\n");
//! ```

pub mod annulus;
pub mod catalog;
pub mod config;
pub mod cursor;
pub mod diag;
pub mod driver;
pub mod error;
pub mod field;
pub mod form;
pub mod input;
pub mod schema;
pub mod series;
pub mod snapshot;
pub mod store;
pub mod timestep;
pub mod units;

pub use annulus::{SubpointSample, SubpointSeries, derive_subpoints};
pub use config::{HumidityDisplay, RunConfiguration};
pub use cursor::{Cursor, Next};
pub use diag::{Diagnostic, DiagnosticLog};
pub use driver::{FileOutcome, decode_file, decode_text};
pub use error::DecodeError;
pub use field::{FieldKind, FieldSpec, Value};
pub use form::{FormReader, FormSpec, Record};
pub use input::{InputDeck, decode_input};
pub use series::{Sample, TimeSeries};
pub use snapshot::{SNAPSHOT_FORMAT_VERSION, Snapshot};
pub use store::{LineRecord, LineStore};
pub use timestep::{TrainState, decode_run};
pub use units::{Converted, StandardUnits, UnitConverter};
