//! Unit-conversion collaborator.
//!
//! The decoder never carries a conversion factor of its own: every Real
//! field names a unit key, and the converter returns the SI value together
//! with the printed-unit text pair (SI spelling, source spelling). The
//! trait seam exists so tests can substitute a converter.
//!
//! All conversions are linear (`si = (v + offset) * scale`); temperature is
//! the only key with a non-zero offset.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Result of converting one source-unit value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Converted {
    pub si: f64,
    pub si_label: &'static str,
    pub source_label: &'static str,
}

/// The conversion collaborator interface (§6 of the format contract).
pub trait UnitConverter {
    /// Convert `value` expressed in the source unit named by `key`.
    fn convert(&self, key: &'static str, value: f64) -> Option<Converted>;

    /// Inverse mapping, used by round-trip checks and re-rendering tests.
    fn to_source(&self, key: &'static str, si: f64) -> Option<f64>;

    /// The printed source-unit text for `key`.
    fn source_label(&self, key: &'static str) -> Option<&'static str>;
}

struct Conversion {
    si_label: &'static str,
    scale: f64,
    offset: f64,
}

const fn linear(si_label: &'static str, scale: f64) -> Conversion {
    Conversion {
        si_label,
        scale,
        offset: 0.0,
    }
}

static TABLE: Lazy<HashMap<&'static str, Conversion>> = Lazy::new(|| {
    HashMap::from([
        ("FT", linear("M", 0.3048)),
        ("SQ FT", linear("M**2", 0.092_903_04)),
        ("CFM", linear("M**3/S", 4.719_474_4e-4)),
        ("FPM", linear("M/S", 0.00508)),
        ("MPH", linear("M/S", 0.44704)),
        ("MPH/S", linear("M/S**2", 0.44704)),
        ("IN. HG", linear("PA", 3386.389)),
        ("IN. WG", linear("PA", 248.84)),
        ("BTU/HR", linear("W", 0.293_071_07)),
        ("LBS", linear("N", 4.448_221_6)),
        ("LB/LB", linear("KG/KG", 1.0)),
        ("SECONDS", linear("SECONDS", 1.0)),
        // Dimensionless coefficients pass through unlabelled.
        ("RATIO", linear("", 1.0)),
        (
            "DEG F",
            Conversion {
                si_label: "DEG C",
                scale: 5.0 / 9.0,
                offset: -32.0,
            },
        ),
    ])
});

/// Printed-unit spellings that differ between the two compilers the
/// upstream simulator was built with. `(expected, also accepted)`.
const ACCEPTED_VARIANTS: [(&str, &str); 1] = [("IN. WG", "IN WG")];

/// Whether `found` is the documented alternate spelling of `expected`.
pub fn variant_accepted(expected: &str, found: &str) -> bool {
    ACCEPTED_VARIANTS
        .iter()
        .any(|(e, v)| *e == expected && found.starts_with(v))
}

/// US-source to SI converter backed by the static factor table.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardUnits;

impl UnitConverter for StandardUnits {
    fn convert(&self, key: &'static str, value: f64) -> Option<Converted> {
        let c = TABLE.get(key)?;
        Some(Converted {
            si: (value + c.offset) * c.scale,
            si_label: c.si_label,
            source_label: key,
        })
    }

    fn to_source(&self, key: &'static str, si: f64) -> Option<f64> {
        let c = TABLE.get(key)?;
        Some(si / c.scale - c.offset)
    }

    fn source_label(&self, key: &'static str) -> Option<&'static str> {
        TABLE.get(key).map(|_| key)
    }
}
