//! Pinned column layouts for every form and runtime block.
//!
//! The transcript's physical layout lives here and only here: the input
//! decoder, the timestep state machine, and the test suites all build on
//! these constructors, so decoder and synthesized fixtures cannot drift
//! apart. Column positions are 0-based half-open byte ranges.

use crate::config::HumidityDisplay;
use crate::field::FieldSpec;
use crate::form::FormSpec;

// --- structural markers -------------------------------------------------

/// Appears on every time header line.
pub const OPERATIONAL_MARKER: &str = "TRAIN(S) ARE OPERATIONAL";
/// Opens the duct-pressure table of a timestep.
pub const PRESSURE_MARKER: &str = "VENT SHAFT PRESSURES";
/// Opens the fire table of a timestep.
pub const FIRE_MARKER: &str = "FIRE SEGMENT HEAT";
/// Opens the heat-sink summary of a timestep.
pub const THERMO_MARKER: &str = "HEAT SINK SUMMARY";
/// Opens a periodic environmental-estimate block.
pub const ESTIMATE_MARKER: &str = "ENVIRONMENTAL ESTIMATE";
/// Sentinel token carried by every route-leg line.
pub const ROUTE_LEG_MARKER: &str = "SEGMENT";

/// Form-boundary marker, e.g. `FORM  3`.
pub fn form_marker(n: usize) -> String {
    format!("FORM {n:>2}")
}

/// A detailed segment table opens with a full-width separator line.
pub fn is_separator(line: &str) -> bool {
    let t = line.trim();
    t.len() >= 80 && t.chars().all(|c| c == '-')
}

/// Whether a line is a timestep header.
pub fn is_time_header(line: &str) -> bool {
    line.contains(" SECONDS") && line.contains(OPERATIONAL_MARKER)
}

// --- timestep blocks ----------------------------------------------------

/// `  TIME      100.00 SECONDS      2 TRAIN(S) ARE OPERATIONAL`
/// Decoded in place with `read_at` (the header line is fetched first to
/// distinguish it from end-of-run).
pub fn time_header() -> FormSpec {
    FormSpec {
        name: "time header",
        fields: vec![
            FieldSpec::real(0, "time", 8, 20, "SECONDS", 2).with_unit_text(1),
            FieldSpec::int(0, "train_count", 32, 38),
        ],
    }
}

/// One operating-train line.
pub fn train_line() -> FormSpec {
    FormSpec {
        name: "train state",
        fields: vec![
            FieldSpec::int(1, "number", 8, 12),
            FieldSpec::int(0, "route", 14, 18),
            FieldSpec::int(0, "kind", 20, 24),
            FieldSpec::real(0, "location", 26, 38, "FT", 1),
            FieldSpec::real(0, "speed", 40, 50, "MPH", 1),
            FieldSpec::real(0, "acceleration", 52, 62, "MPH/S", 2),
            FieldSpec::real(0, "air_drag", 64, 74, "LBS", 1),
            FieldSpec::real(0, "tractive_effort", 76, 86, "LBS", 1),
        ],
    }
}

/// One duct-pressure line (vent segment id, pressure with printed unit).
pub fn pressure_line() -> FormSpec {
    FormSpec {
        name: "duct pressure",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "pressure", 20, 32, "IN. WG", 2).with_unit_text(1),
        ],
    }
}

/// Detailed segment table: per-segment header line.
pub fn segment_detail_header() -> FormSpec {
    FormSpec {
        name: "segment detail",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "flow", 20, 32, "CFM", 1),
            FieldSpec::real(0, "velocity", 40, 52, "FPM", 1),
        ],
    }
}

/// Detailed segment table: one subsegment line. The humidity column's
/// unit follows the run's display mode.
pub fn segment_detail_sub(display: HumidityDisplay) -> FormSpec {
    let humidity = match display {
        HumidityDisplay::Ratio => FieldSpec::real(0, "humidity", 40, 52, "LB/LB", 4),
        HumidityDisplay::WetBulb => FieldSpec::real(0, "humidity", 40, 52, "DEG F", 1),
    };
    FormSpec {
        name: "subsegment detail",
        fields: vec![
            FieldSpec::int(1, "sub", 8, 14),
            FieldSpec::real(0, "air_temp", 20, 32, "DEG F", 1),
            humidity,
        ],
    }
}

/// Abbreviated segment table: one line per segment.
pub fn segment_abbreviated() -> FormSpec {
    FormSpec {
        name: "segment abbreviated",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "flow", 20, 32, "CFM", 1),
            FieldSpec::real(0, "velocity", 40, 52, "FPM", 1),
            FieldSpec::real(0, "mean_temp", 60, 72, "DEG F", 1),
        ],
    }
}

/// One fire-segment heat line.
pub fn fire_line() -> FormSpec {
    FormSpec {
        name: "fire segment",
        fields: vec![
            FieldSpec::int(1, "segment", 8, 14),
            FieldSpec::real(0, "heat_release", 20, 34, "BTU/HR", 0),
        ],
    }
}

/// One heat-sink summary line.
pub fn thermo_line() -> FormSpec {
    FormSpec {
        name: "heat sink",
        fields: vec![
            FieldSpec::int(1, "section", 8, 14),
            FieldSpec::real(0, "wall_heat", 20, 34, "BTU/HR", 0),
        ],
    }
}

/// One environmental-estimate zone line.
pub fn estimate_zone_line() -> FormSpec {
    FormSpec {
        name: "estimate zone",
        fields: vec![
            FieldSpec::int(1, "zone", 8, 14),
            FieldSpec::real(0, "sensible", 18, 32, "BTU/HR", 0),
            FieldSpec::real(0, "latent", 36, 50, "BTU/HR", 0),
            FieldSpec::real(0, "est_temp", 58, 70, "DEG F", 1),
        ],
    }
}

// --- input forms --------------------------------------------------------

/// Form 1: run options, ambient conditions, model counts, run control.
/// Five lines, one record.
pub fn form1() -> FormSpec {
    FormSpec {
        name: "form 1",
        fields: vec![
            FieldSpec::verbatim(1, "title", 2, 62),
            FieldSpec::int(1, "train_performance", 12, 22),
            FieldSpec::int(0, "temperature_sim", 24, 34),
            FieldSpec::int(0, "humidity_display", 36, 46),
            FieldSpec::int(0, "supplement_level", 48, 58),
            FieldSpec::int(0, "fire_option", 60, 70),
            FieldSpec::real(1, "ambient_dry_bulb", 12, 24, "DEG F", 1).with_unit_text(1),
            FieldSpec::real(0, "ambient_wet_bulb", 36, 48, "DEG F", 1).with_unit_text(1),
            FieldSpec::real(0, "ambient_pressure", 60, 72, "IN. HG", 2).with_unit_text(1),
            FieldSpec::int(1, "sections", 12, 22),
            FieldSpec::int(0, "line_segments", 24, 34),
            FieldSpec::int(0, "vent_segments", 36, 46),
            FieldSpec::int(0, "nodes", 48, 58),
            FieldSpec::int(0, "routes", 60, 70),
            FieldSpec::int(0, "train_types", 72, 82),
            FieldSpec::int(0, "zones", 84, 94),
            FieldSpec::int(0, "fire_segments", 96, 106),
            FieldSpec::real(1, "final_time", 12, 24, "SECONDS", 1).with_unit_text(1),
            FieldSpec::int(0, "print_groups", 36, 46),
        ],
    }
}

/// Form 2: one tunnel section.
pub fn form2_section() -> FormSpec {
    FormSpec {
        name: "form 2",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::int(0, "up_node", 16, 22),
            FieldSpec::int(0, "down_node", 24, 30),
            FieldSpec::int(0, "segment_count", 32, 38),
            FieldSpec::real(0, "initial_flow", 44, 56, "CFM", 1).with_unit_text(1),
        ],
    }
}

/// Form 3: line-segment geometry line.
pub fn form3_geometry() -> FormSpec {
    FormSpec {
        name: "form 3",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "length", 16, 28, "FT", 1).with_unit_text(1),
            FieldSpec::real(0, "area", 34, 46, "SQ FT", 1).with_unit_text(1),
            FieldSpec::real(0, "perimeter", 56, 68, "FT", 1).with_unit_text(1),
            FieldSpec::int(0, "subsegments", 74, 80),
        ],
    }
}

/// Form 3: subsegment lengths, up to eight 9-wide sub-slices per line.
pub const FORM3_SUBS_PER_LINE: usize = 8;

pub fn form3_sub_slot(slot: usize) -> FieldSpec {
    FieldSpec::real(0, "sub_length", 12 + 9 * slot, 21 + 9 * slot, "FT", 1)
        .allowing_adjacent()
        .describe("subsegment length")
}

/// Form 3: initial air/wall temperature line.
pub fn form3_temps() -> FormSpec {
    FormSpec {
        name: "form 3 temps",
        fields: vec![
            FieldSpec::real(1, "initial_air_temp", 12, 24, "DEG F", 1).with_unit_text(1),
            FieldSpec::real(0, "initial_wall_temp", 36, 48, "DEG F", 1).with_unit_text(1),
        ],
    }
}

/// Form 5: one vent segment.
pub fn form5_vent() -> FormSpec {
    FormSpec {
        name: "form 5",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "length", 16, 28, "FT", 1).with_unit_text(1),
            FieldSpec::real(0, "area", 34, 46, "SQ FT", 1).with_unit_text(1),
        ],
    }
}

/// Form 8: route header line.
pub fn form8_header() -> FormSpec {
    FormSpec {
        name: "form 8",
        fields: vec![FieldSpec::int(1, "id", 8, 14)],
    }
}

/// Form 8: one route leg. A negative segment id means the route traverses
/// the segment against its geometric orientation.
pub fn form8_leg() -> FormSpec {
    FormSpec {
        name: "form 8 leg",
        fields: vec![
            FieldSpec::int(1, "segment", 12, 20),
            FieldSpec::real(0, "origin_chainage", 24, 36, "FT", 1).with_unit_text(1),
        ],
    }
}

/// Form 9: one train type.
pub fn form9_train_type() -> FormSpec {
    FormSpec {
        name: "form 9",
        fields: vec![
            FieldSpec::int(1, "id", 8, 14),
            FieldSpec::real(0, "length", 16, 28, "FT", 1).with_unit_text(1),
            FieldSpec::real(0, "frontal_area", 34, 46, "SQ FT", 1).with_unit_text(1),
            FieldSpec::real(0, "onboard_flow", 56, 68, "CFM", 1).with_unit_text(1),
            FieldSpec::real(0, "drag_coefficient", 78, 88, "RATIO", 3),
        ],
    }
}

/// Form 12: one print group.
pub fn form12_group() -> FormSpec {
    FormSpec {
        name: "form 12",
        fields: vec![
            FieldSpec::real(1, "end_time", 8, 20, "SECONDS", 1).with_unit_text(1),
            FieldSpec::real(0, "print_interval", 32, 44, "SECONDS", 1).with_unit_text(1),
            FieldSpec::int(0, "estimate_ratio", 56, 66),
            FieldSpec::int(0, "summary_option", 68, 78),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_forms() -> Vec<FormSpec> {
        vec![
            time_header(),
            train_line(),
            pressure_line(),
            segment_detail_header(),
            segment_detail_sub(HumidityDisplay::Ratio),
            segment_detail_sub(HumidityDisplay::WetBulb),
            segment_abbreviated(),
            fire_line(),
            thermo_line(),
            estimate_zone_line(),
            form1(),
            form2_section(),
            form3_geometry(),
            form3_temps(),
            form5_vent(),
            form8_header(),
            form8_leg(),
            form9_train_type(),
            form12_group(),
        ]
    }

    #[test]
    fn test_no_overlapping_columns_within_forms() {
        for form in &all_forms() {
            let mut prev_end = 0usize;
            for f in &form.fields {
                if f.skip_before > 0 {
                    prev_end = 0;
                }
                assert!(
                    f.start >= prev_end,
                    "{}: field '{}' overlaps its predecessor",
                    form.name,
                    f.key
                );
                assert!(f.start < f.end, "{}: empty slice '{}'", form.name, f.key);
                // Reserve room for the printed unit text.
                let unit_len = match f.kind {
                    crate::field::FieldKind::Real(u) => u.len(),
                    _ => 0,
                };
                prev_end = f.end + f.unit_gap.map(|g| g + unit_len).unwrap_or(0);
            }
        }
    }

    #[test]
    fn test_real_fields_round_trip_within_declared_precision() {
        use crate::units::{StandardUnits, UnitConverter};
        let mut fields: Vec<FieldSpec> = all_forms().into_iter().flat_map(|f| f.fields).collect();
        fields.push(form3_sub_slot(0));
        for f in &fields {
            if let crate::field::FieldKind::Real(unit) = f.kind {
                let v = 123.4_f64;
                let si = StandardUnits
                    .convert(unit, v)
                    .unwrap_or_else(|| panic!("field '{}': no conversion for '{unit}'", f.key))
                    .si;
                let back = StandardUnits.to_source(unit, si).unwrap();
                let tol = 0.5 * 10f64.powi(-(f.decimals as i32));
                assert!(
                    (back - v).abs() < tol.max(1e-9),
                    "field '{}' ({unit}): {back} != {v}",
                    f.key
                );
            }
        }
    }

    #[test]
    fn test_separator_detection() {
        assert!(is_separator(&"-".repeat(100)));
        assert!(!is_separator(&"-".repeat(10)));
        assert!(!is_separator("  SOME DATA ---"));
    }

    #[test]
    fn test_time_header_detection() {
        assert!(is_time_header(
            "  TIME       10.00 SECONDS           2 TRAIN(S) ARE OPERATIONAL"
        ));
        assert!(!is_time_header("  TIME WITHOUT TRAINS"));
    }

    #[test]
    fn test_form_marker_width() {
        assert_eq!(form_marker(1), "FORM  1");
        assert_eq!(form_marker(12), "FORM 12");
    }
}
