//! Decoding of the echoed input sections (forms 1, 2, 3, 5, 8, 9, 12).
//!
//! The transcript opens with a verified echo of the simulator's input
//! deck. This module walks it in order, populating the run configuration
//! first (form 1), then the geometry the runtime blocks and the annulus
//! post-pass depend on. Raw records are pushed into the caller's map as
//! soon as they decode, so a later failure never discards them.

use std::collections::{BTreeMap, HashSet};

use crate::config::{HumidityDisplay, RunConfiguration};
use crate::error::DecodeError;
use crate::form::{FormReader, Record};
use crate::schema;

/// One tunnel section (an airflow-continuity run of segments).
#[derive(Debug, Clone, serde::Serialize)]
pub struct Section {
    pub id: i64,
    pub up_node: i64,
    pub down_node: i64,
    pub segment_count: i64,
    /// m**3/s
    pub initial_flow: f64,
}

/// One line segment with its subsegment split. Lengths/areas in SI.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LineSegment {
    pub id: i64,
    pub length: f64,
    pub area: f64,
    pub perimeter: f64,
    pub sub_lengths: Vec<f64>,
    /// deg C
    pub initial_air_temp: f64,
    pub initial_wall_temp: f64,
}

impl LineSegment {
    pub fn subsegments(&self) -> usize {
        self.sub_lengths.len()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VentSegment {
    pub id: i64,
    pub length: f64,
    pub area: f64,
}

/// One leg of a train route. `forward` is the segment's geometric
/// orientation relative to route traversal; `origin_chainage` is the
/// route chainage at which a train enters the segment.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RouteLeg {
    pub segment: i64,
    pub forward: bool,
    pub origin_chainage: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Route {
    pub id: i64,
    pub legs: Vec<RouteLeg>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TrainType {
    pub id: i64,
    pub length: f64,
    pub frontal_area: f64,
    /// Onboard ventilation flow, m**3/s.
    pub onboard_flow: f64,
    pub drag_coefficient: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PrintGroup {
    pub end_time: f64,
    pub print_interval: f64,
    /// Estimate every k-th print; 0 disables estimates for the group.
    pub estimate_ratio: i64,
    pub summary_option: i64,
}

/// Everything the input echo yields.
#[derive(Debug, Default, serde::Serialize)]
pub struct InputDeck {
    /// Serialized at the snapshot's top level, not here.
    #[serde(skip)]
    pub config: RunConfiguration,
    pub sections: Vec<Section>,
    pub segments: Vec<LineSegment>,
    pub vents: Vec<VentSegment>,
    pub routes: Vec<Route>,
    pub train_types: Vec<TrainType>,
    pub print_groups: Vec<PrintGroup>,
}

impl InputDeck {
    pub fn segment(&self, id: i64) -> Option<&LineSegment> {
        self.segments.iter().find(|s| s.id == id)
    }

    pub fn route(&self, id: i64) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    pub fn train_type(&self, id: i64) -> Option<&TrainType> {
        self.train_types.iter().find(|t| t.id == id)
    }
}

/// Known upstream defect behind sub-length sum mismatches.
const SUM_HINT: &str = "the legacy input generator truncates subsegment tables at page \
     boundaries; regenerate the transcript with pagination disabled";

/// Tolerance on the subsegment-length sum check, metres. Printed values
/// carry one decimal of feet, so each entry can be off by up to 0.05 ft.
const SUM_TOL_PER_ENTRY: f64 = 0.05 * 0.3048;

fn keep(records: &mut BTreeMap<String, Vec<Record>>, rec: &Record) {
    records.entry(rec.form.clone()).or_default().push(rec.clone());
}

fn check_duplicate(
    seen: &mut HashSet<i64>,
    form: &'static str,
    line_hint: usize,
    id: i64,
) -> Result<(), DecodeError> {
    if !seen.insert(id) {
        return Err(DecodeError::DuplicateIdentifier {
            form,
            line: line_hint,
            id,
        });
    }
    Ok(())
}

/// Decode a count field. Counts size later allocations and repetition,
/// so a negative value must fail typed rather than wrap.
fn count(rec: &Record, key: &'static str) -> Result<usize, DecodeError> {
    let value = rec.int(key)?;
    usize::try_from(value).map_err(|_| DecodeError::NegativeCount {
        line: rec.line,
        key,
        value,
    })
}

fn build_config(rec: &Record) -> Result<RunConfiguration, DecodeError> {
    Ok(RunConfiguration {
        title: rec.text("title")?.to_string(),
        train_performance: rec.int("train_performance")?,
        temperature_sim: rec.int("temperature_sim")? != 0,
        humidity_display: if rec.int("humidity_display")? == 0 {
            HumidityDisplay::Ratio
        } else {
            HumidityDisplay::WetBulb
        },
        supplement_level: rec.int("supplement_level")?,
        fire_option: rec.int("fire_option")?,
        ambient_dry_bulb: rec.real("ambient_dry_bulb")?,
        ambient_wet_bulb: rec.real("ambient_wet_bulb")?,
        ambient_pressure: rec.real("ambient_pressure")?,
        sections: count(rec, "sections")?,
        line_segments: count(rec, "line_segments")?,
        vent_segments: count(rec, "vent_segments")?,
        nodes: count(rec, "nodes")?,
        routes: count(rec, "routes")?,
        train_types: count(rec, "train_types")?,
        zones: count(rec, "zones")?,
        fire_segments: count(rec, "fire_segments")?,
        final_time: rec.real("final_time")?,
        print_groups: count(rec, "print_groups")?,
        estimate_times: Vec::new(),
    })
}

/// Derive the estimate schedule from the print groups: within each group,
/// an estimate is printed every `estimate_ratio`-th print interval.
fn estimate_times(groups: &[PrintGroup]) -> Vec<f64> {
    let mut times = Vec::new();
    let mut start = 0.0;
    for g in groups {
        if g.estimate_ratio > 0 && g.print_interval > 0.0 {
            let interval = g.print_interval * g.estimate_ratio as f64;
            let mut t = start + interval;
            while t <= g.end_time + crate::config::TIME_MATCH_TOL {
                times.push(t);
                t += interval;
            }
        }
        start = g.end_time;
    }
    times
}

/// Decode the full input echo. `records` receives every raw Record as it
/// is produced; `config_out` is set as soon as form 1 decodes so a later
/// failure still leaves the configuration available to the driver.
pub fn decode_input(
    reader: &mut FormReader<'_>,
    records: &mut BTreeMap<String, Vec<Record>>,
    config_out: &mut RunConfiguration,
) -> Result<InputDeck, DecodeError> {
    // Form 1: options, ambient, counts, run control.
    reader.expect_marker(&schema::form_marker(1))?;
    let rec1 = reader.read(&schema::form1())?;
    keep(records, &rec1);
    let mut config = build_config(&rec1)?;
    *config_out = config.clone();
    tracing::debug!(
        sections = config.sections,
        line_segments = config.line_segments,
        routes = config.routes,
        "decoded form 1"
    );

    // Form 2: sections.
    reader.expect_marker(&schema::form_marker(2))?;
    let mut sections = Vec::with_capacity(config.sections);
    let mut seen = HashSet::new();
    for rec in reader.read_fixed(&schema::form2_section(), config.sections)? {
        keep(records, &rec);
        let id = rec.int("id")?;
        check_duplicate(&mut seen, "form 2", rec.line, id)?;
        sections.push(Section {
            id,
            up_node: rec.int("up_node")?,
            down_node: rec.int("down_node")?,
            segment_count: rec.int("segment_count")?,
            initial_flow: rec.real("initial_flow")?,
        });
    }

    // Form 3: line segments with their subsegment splits.
    reader.expect_marker(&schema::form_marker(3))?;
    let mut segments = Vec::with_capacity(config.line_segments);
    let mut seen = HashSet::new();
    for _ in 0..config.line_segments {
        let geo = reader.read(&schema::form3_geometry())?;
        keep(records, &geo);
        let id = geo.int("id")?;
        check_duplicate(&mut seen, "form 3", geo.line, id)?;
        let length = geo.real("length")?;
        let subsegments = count(&geo, "subsegments")?;
        let sub_lengths = reader.read_sub_entries(
            "form 3",
            schema::form3_sub_slot,
            schema::FORM3_SUBS_PER_LINE,
            subsegments,
            length,
            SUM_TOL_PER_ENTRY * subsegments.max(1) as f64,
            SUM_HINT,
        )?;
        let temps = reader.read(&schema::form3_temps())?;
        keep(records, &temps);
        segments.push(LineSegment {
            id,
            length,
            area: geo.real("area")?,
            perimeter: geo.real("perimeter")?,
            sub_lengths,
            initial_air_temp: temps.real("initial_air_temp")?,
            initial_wall_temp: temps.real("initial_wall_temp")?,
        });
    }

    // Form 5: vent segments.
    let mut vents = Vec::with_capacity(config.vent_segments);
    if config.vent_segments > 0 {
        reader.expect_marker(&schema::form_marker(5))?;
        let mut seen = HashSet::new();
        for rec in reader.read_fixed(&schema::form5_vent(), config.vent_segments)? {
            keep(records, &rec);
            let id = rec.int("id")?;
            check_duplicate(&mut seen, "form 5", rec.line, id)?;
            vents.push(VentSegment {
                id,
                length: rec.real("length")?,
                area: rec.real("area")?,
            });
        }
    }

    // Form 8: routes, each a header plus sentinel-terminated legs.
    let mut routes = Vec::with_capacity(config.routes);
    if config.routes > 0 {
        reader.expect_marker(&schema::form_marker(8))?;
        let mut seen = HashSet::new();
        for _ in 0..config.routes {
            let head = reader.read(&schema::form8_header())?;
            keep(records, &head);
            let id = head.int("id")?;
            check_duplicate(&mut seen, "form 8", head.line, id)?;
            let mut legs = Vec::new();
            for leg in reader.read_while_marker(&schema::form8_leg(), schema::ROUTE_LEG_MARKER)? {
                keep(records, &leg);
                let signed = leg.int("segment")?;
                legs.push(RouteLeg {
                    segment: signed.abs(),
                    forward: signed >= 0,
                    origin_chainage: leg.real("origin_chainage")?,
                });
            }
            routes.push(Route { id, legs });
        }
    }

    // Form 9: train types.
    let mut train_types = Vec::with_capacity(config.train_types);
    if config.train_types > 0 {
        reader.expect_marker(&schema::form_marker(9))?;
        let mut seen = HashSet::new();
        for rec in reader.read_fixed(&schema::form9_train_type(), config.train_types)? {
            keep(records, &rec);
            let id = rec.int("id")?;
            check_duplicate(&mut seen, "form 9", rec.line, id)?;
            train_types.push(TrainType {
                id,
                length: rec.real("length")?,
                frontal_area: rec.real("frontal_area")?,
                onboard_flow: rec.real("onboard_flow")?,
                drag_coefficient: rec.real("drag_coefficient")?,
            });
        }
    }

    // Form 12: print groups drive the estimate schedule.
    reader.expect_marker(&schema::form_marker(12))?;
    let mut print_groups = Vec::with_capacity(config.print_groups);
    for rec in reader.read_fixed(&schema::form12_group(), config.print_groups)? {
        keep(records, &rec);
        print_groups.push(PrintGroup {
            end_time: rec.real("end_time")?,
            print_interval: rec.real("print_interval")?,
            estimate_ratio: rec.int("estimate_ratio")?,
            summary_option: rec.int("summary_option")?,
        });
    }
    config.estimate_times = estimate_times(&print_groups);
    *config_out = config.clone();

    Ok(InputDeck {
        config,
        sections,
        segments,
        vents,
        routes,
        train_types,
        print_groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_times_from_groups() {
        let groups = vec![
            PrintGroup {
                end_time: 100.0,
                print_interval: 10.0,
                estimate_ratio: 5,
                summary_option: 0,
            },
            PrintGroup {
                end_time: 200.0,
                print_interval: 25.0,
                estimate_ratio: 0,
                summary_option: 0,
            },
        ];
        assert_eq!(estimate_times(&groups), vec![50.0, 100.0]);
    }

    #[test]
    fn test_estimate_times_resume_after_group() {
        let groups = vec![
            PrintGroup {
                end_time: 60.0,
                print_interval: 30.0,
                estimate_ratio: 0,
                summary_option: 0,
            },
            PrintGroup {
                end_time: 180.0,
                print_interval: 30.0,
                estimate_ratio: 2,
                summary_option: 0,
            },
        ];
        assert_eq!(estimate_times(&groups), vec![120.0, 180.0]);
    }
}
