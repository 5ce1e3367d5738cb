//! Timestep state machine over the runtime print blocks.
//!
//! After the input echo, the transcript is a sequence of timestep blocks:
//! a time header, the operating-train table, then (as the run
//! configuration dictates) duct pressures, the segment tables, fire heat,
//! and the heat-sink summary. Around scheduled estimate times the
//! simulator prints the environmental-estimate tables and then reprints
//! the same nominal time, so the first of the pair is stored slightly
//! early to keep every series strictly increasing.
//!
//! The machine stops on the end-of-run diagnostic, or after finishing the
//! block in progress when a catalog-fatal diagnostic is absorbed.

use crate::config::TIME_MATCH_TOL;
use crate::error::DecodeError;
use crate::form::FormReader;
use crate::input::InputDeck;
use crate::schema;
use crate::series::TimeSeries;

/// Backward shift applied to the first of the two identical printed
/// times around an estimate block.
pub const ESTIMATE_EPS: f64 = 0.001;

/// One operating train at one decoded timestep, in SI.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TrainState {
    pub number: i64,
    pub route: i64,
    pub kind: i64,
    /// Route chainage of the train's front, m.
    pub location: f64,
    /// m/s
    pub speed: f64,
}

/// Decode every timestep block until the run ends.
///
/// `series` and `trains` are filled incrementally, one timestep at a
/// time, so everything decoded before a failure survives it.
pub fn decode_run(
    reader: &mut FormReader<'_>,
    deck: &InputDeck,
    series: &mut TimeSeries,
    trains: &mut Vec<(f64, Vec<TrainState>)>,
) -> Result<(), DecodeError> {
    let config = &deck.config;
    let mut pending_estimate: Option<f64> = None;

    loop {
        let idx = match reader.data_line_or_end()? {
            Some(idx) => idx,
            None => break,
        };
        // A fatal diagnostic absorbed between timesteps ends the run
        // before the next header is decoded.
        if reader.cursor.fatal().is_some() {
            break;
        }
        if !schema::is_time_header(&reader.cursor.line(idx).text) {
            let rec = reader.cursor.line(idx);
            return Err(DecodeError::MissingMarker {
                marker: schema::OPERATIONAL_MARKER.to_string(),
                line: rec.number,
                text: rec.text.trim_end().to_string(),
            });
        }
        let header = reader.read_at(idx, &schema::time_header())?;
        let time = header.real("time")?;
        let trains_raw = header.int("train_count")?;
        let train_count =
            usize::try_from(trains_raw).map_err(|_| DecodeError::NegativeCount {
                line: header.line,
                key: "train_count",
                value: trains_raw,
            })?;

        let is_reprint = pending_estimate
            .take()
            .is_some_and(|t| (t - time).abs() <= TIME_MATCH_TOL);
        let enter_estimate = !is_reprint && config.is_estimate_time(time);
        let stored = if enter_estimate {
            pending_estimate = Some(time);
            time - ESTIMATE_EPS
        } else {
            time
        };
        tracing::debug!(time, stored, train_count, "timestep header");

        // Train table.
        let mut states = Vec::with_capacity(train_count);
        for _ in 0..train_count {
            let t = reader.read(&schema::train_line())?;
            let number = t.int("number")?;
            let entity = number.to_string();
            let location = t.real("location")?;
            let speed = t.real("speed")?;
            series.push("train_location", &entity, stored, location);
            series.push("train_speed", &entity, stored, speed);
            series.push("train_acceleration", &entity, stored, t.real("acceleration")?);
            series.push("train_air_drag", &entity, stored, t.real("air_drag")?);
            series.push("train_tractive_effort", &entity, stored, t.real("tractive_effort")?);
            states.push(TrainState {
                number,
                route: t.int("route")?,
                kind: t.int("kind")?,
                location,
                speed,
            });
        }
        trains.push((stored, states));
        if reader.cursor.fatal().is_some() {
            break;
        }

        // Duct pressures.
        if config.has_pressure_block() {
            reader.expect_marker(schema::PRESSURE_MARKER)?;
            for _ in 0..deck.vents.len() {
                let rec = reader.read(&schema::pressure_line())?;
                let id = rec.int("id")?;
                series.push("duct_pressure", &id.to_string(), stored, rec.real("pressure")?);
            }
            if reader.cursor.fatal().is_some() {
                break;
            }
        }

        // Segment tables: a full-width separator line announces the
        // detailed per-subsegment format. The choice is per timestep.
        if !deck.segments.is_empty() {
            let mark = reader.cursor.pos();
            let look = reader.data_line()?;
            let detailed = schema::is_separator(&reader.cursor.line(look).text);
            if !detailed {
                reader.cursor.seek(mark);
            }
            if detailed {
                let sub_form = schema::segment_detail_sub(config.humidity_display);
                for seg in &deck.segments {
                    let head = reader.read(&schema::segment_detail_header())?;
                    let id = head.int("id")?;
                    let seg_entity = id.to_string();
                    series.push("airflow", &seg_entity, stored, head.real("flow")?);
                    series.push("velocity", &seg_entity, stored, head.real("velocity")?);
                    for _ in 0..seg.subsegments() {
                        let s = reader.read(&sub_form)?;
                        let entity = format!("{id}-{}", s.int("sub")?);
                        series.push("air_temp", &entity, stored, s.real("air_temp")?);
                        series.push("humidity", &entity, stored, s.real("humidity")?);
                    }
                }
            } else {
                for seg in &deck.segments {
                    let rec = reader.read(&schema::segment_abbreviated())?;
                    let id = rec.int("id")?;
                    let seg_entity = id.to_string();
                    series.push("airflow", &seg_entity, stored, rec.real("flow")?);
                    series.push("velocity", &seg_entity, stored, rec.real("velocity")?);
                    // The abbreviated table prints one mean temperature
                    // for the whole segment.
                    let mean = rec.real("mean_temp")?;
                    for sub in 1..=seg.subsegments() {
                        series.push("air_temp", &format!("{id}-{sub}"), stored, mean);
                    }
                }
            }
            if reader.cursor.fatal().is_some() {
                break;
            }
        }

        // Fire heat.
        if config.has_fire_block() {
            reader.expect_marker(schema::FIRE_MARKER)?;
            for _ in 0..config.fire_segments {
                let rec = reader.read(&schema::fire_line())?;
                let id = rec.int("segment")?;
                series.push("fire_heat", &id.to_string(), stored, rec.real("heat_release")?);
            }
            if reader.cursor.fatal().is_some() {
                break;
            }
        }

        // Heat-sink summary.
        if config.has_thermo_block() {
            reader.expect_marker(schema::THERMO_MARKER)?;
            for _ in 0..deck.sections.len() {
                let rec = reader.read(&schema::thermo_line())?;
                let id = rec.int("section")?;
                series.push("wall_heat", &id.to_string(), stored, rec.real("wall_heat")?);
            }
            if reader.cursor.fatal().is_some() {
                break;
            }
        }

        // Environmental estimate, before the time header reprint.
        if enter_estimate {
            reader.expect_marker(schema::ESTIMATE_MARKER)?;
            for _ in 0..config.zones {
                let rec = reader.read(&schema::estimate_zone_line())?;
                let zone = rec.int("zone")?.to_string();
                series.push("zone_sensible", &zone, stored, rec.real("sensible")?);
                series.push("zone_latent", &zone, stored, rec.real("latent")?);
                series.push("zone_temp", &zone, stored, rec.real("est_temp")?);
            }
            if reader.cursor.fatal().is_some() {
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Cursor;
    use crate::input::{InputDeck, LineSegment, Section, VentSegment};
    use crate::store::LineStore;
    use crate::units::StandardUnits;

    fn put(l: &mut String, start: usize, end: usize, text: &str) {
        if l.len() < end {
            l.push_str(&" ".repeat(end - l.len()));
        }
        l.replace_range(start..end, &format!("{text:>w$}", w = end - start));
    }

    fn lit(l: &mut String, pos: usize, text: &str) {
        let end = pos + text.len();
        if l.len() < end {
            l.push_str(&" ".repeat(end - l.len()));
        }
        l.replace_range(pos..end, text);
    }

    fn time_line(t: f64, trains: usize) -> String {
        let mut l = String::from("  TIME");
        put(&mut l, 8, 20, &format!("{t:.2}"));
        lit(&mut l, 21, "SECONDS");
        put(&mut l, 32, 38, &trains.to_string());
        lit(&mut l, 40, "TRAIN(S) ARE OPERATIONAL");
        l
    }

    fn abbreviated_line(id: i64, flow_cfm: f64, vel_fpm: f64, temp_f: f64) -> String {
        let mut l = String::new();
        put(&mut l, 8, 14, &id.to_string());
        put(&mut l, 20, 32, &format!("{flow_cfm:.1}"));
        put(&mut l, 40, 52, &format!("{vel_fpm:.1}"));
        put(&mut l, 60, 72, &format!("{temp_f:.1}"));
        l
    }

    fn train_row(number: i64, location_ft: f64, speed_mph: f64) -> String {
        let mut l = String::new();
        put(&mut l, 8, 12, &number.to_string());
        put(&mut l, 14, 18, "1");
        put(&mut l, 20, 24, "1");
        put(&mut l, 26, 38, &format!("{location_ft:.1}"));
        put(&mut l, 40, 50, &format!("{speed_mph:.1}"));
        put(&mut l, 52, 62, "0.00");
        put(&mut l, 64, 74, "500.0");
        put(&mut l, 76, 86, "1200.0");
        l
    }

    const END_LINE: &str = "  *ERROR* TYPE  9   SIMULATION COMPLETE";

    fn segment_101() -> LineSegment {
        LineSegment {
            id: 101,
            length: 30.48,
            area: 18.58,
            perimeter: 18.0,
            sub_lengths: vec![30.48],
            initial_air_temp: 20.0,
            initial_wall_temp: 20.0,
        }
    }

    fn run(
        lines: &[String],
        deck: &InputDeck,
    ) -> (TimeSeries, Vec<(f64, Vec<TrainState>)>, Option<(u16, usize)>) {
        let mut cursor = Cursor::new(LineStore::from_text(&lines.join("\n")));
        let mut reader = FormReader::new(&mut cursor, &StandardUnits);
        let mut series = TimeSeries::new();
        let mut trains = Vec::new();
        decode_run(&mut reader, deck, &mut series, &mut trains).unwrap();
        let fatal = cursor.fatal();
        (series, trains, fatal)
    }

    #[test]
    fn test_two_timesteps_strictly_increasing() {
        let mut deck = InputDeck::default();
        deck.segments.push(segment_101());
        let lines = vec![
            time_line(0.0, 0),
            abbreviated_line(101, 1000.0, 200.0, 68.0),
            time_line(10.0, 0),
            abbreviated_line(101, 1100.0, 220.0, 69.0),
            END_LINE.to_string(),
        ];
        let (series, trains, fatal) = run(&lines, &deck);
        assert!(fatal.is_none());
        assert_eq!(trains.len(), 2);

        let flow = series.get("airflow", "101").unwrap();
        assert_eq!(flow.len(), 2);
        assert_eq!(flow[0].time, 0.0);
        assert_eq!(flow[1].time, 10.0);
        assert!((flow[0].value - 1000.0 * 4.719_474_4e-4).abs() < 1e-6);

        // Mean temperature lands on the subsegment entity.
        let temp = series.get("air_temp", "101-1").unwrap();
        assert!((temp[0].value - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_detailed_table_chosen_by_separator() {
        let mut deck = InputDeck::default();
        deck.segments.push(segment_101());

        let mut head = String::new();
        put(&mut head, 8, 14, "101");
        put(&mut head, 20, 32, "1000.0");
        put(&mut head, 40, 52, "200.0");
        let mut sub = String::new();
        put(&mut sub, 8, 14, "1");
        put(&mut sub, 20, 32, "68.0");
        put(&mut sub, 40, 52, "0.0062");

        let lines = vec![
            time_line(0.0, 0),
            "-".repeat(90),
            head,
            sub,
            END_LINE.to_string(),
        ];
        let (series, _, _) = run(&lines, &deck);
        assert!(series.get("airflow", "101").is_some());
        let temp = series.get("air_temp", "101-1").unwrap();
        assert!((temp[0].value - 20.0).abs() < 1e-9);
        let hum = series.get("humidity", "101-1").unwrap();
        assert!((hum[0].value - 0.0062).abs() < 1e-12);
    }

    #[test]
    fn test_trains_and_pressure_block() {
        let mut deck = InputDeck::default();
        deck.config.vent_segments = 1;
        deck.vents.push(VentSegment {
            id: 201,
            length: 10.0,
            area: 5.0,
        });
        deck.segments.push(segment_101());

        let mut press = String::new();
        put(&mut press, 8, 14, "201");
        put(&mut press, 20, 32, "1.50");
        lit(&mut press, 33, "IN. WG");

        let lines = vec![
            time_line(0.0, 1),
            train_row(1, 1000.0, 40.0),
            "     VENT SHAFT PRESSURES".to_string(),
            press,
            abbreviated_line(101, 1000.0, 200.0, 68.0),
            END_LINE.to_string(),
        ];
        let (series, trains, _) = run(&lines, &deck);

        let (t0, states) = &trains[0];
        assert_eq!(*t0, 0.0);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].number, 1);
        assert!((states[0].location - 304.8).abs() < 1e-9);
        assert!((states[0].speed - 40.0 * 0.44704).abs() < 1e-9);

        let p = series.get("duct_pressure", "201").unwrap();
        assert!((p[0].value - 1.5 * 248.84).abs() < 1e-6);
    }

    #[test]
    fn test_estimate_time_stored_eps_early() {
        let mut deck = InputDeck::default();
        deck.config.zones = 1;
        deck.config.estimate_times = vec![10.0];
        deck.segments.push(segment_101());

        let mut zone = String::new();
        put(&mut zone, 8, 14, "1");
        put(&mut zone, 18, 32, "50000");
        put(&mut zone, 36, 50, "12000");
        put(&mut zone, 58, 70, "70.0");

        let lines = vec![
            time_line(10.0, 0),
            abbreviated_line(101, 1000.0, 200.0, 68.0),
            "     ENVIRONMENTAL ESTIMATE".to_string(),
            zone,
            time_line(10.0, 0),
            abbreviated_line(101, 1050.0, 210.0, 68.5),
            END_LINE.to_string(),
        ];
        let (series, _, _) = run(&lines, &deck);

        let flow = series.get("airflow", "101").unwrap();
        assert_eq!(flow.len(), 2);
        assert!((flow[0].time - (10.0 - ESTIMATE_EPS)).abs() < 1e-12);
        assert_eq!(flow[1].time, 10.0);

        let sens = series.get("zone_sensible", "1").unwrap();
        assert!((sens[0].time - (10.0 - ESTIMATE_EPS)).abs() < 1e-12);
        assert!((sens[0].value - 50000.0 * 0.293_071_07).abs() < 1e-6);
    }

    #[test]
    fn test_fatal_diagnostic_stops_machine() {
        let mut deck = InputDeck::default();
        deck.segments.push(segment_101());
        let lines = vec![
            time_line(0.0, 0),
            abbreviated_line(101, 1000.0, 200.0, 68.0),
            "  *ERROR* TYPE  4   HEAT SINK MATRIX IS SINGULAR".to_string(),
            "  RERUN WITH SMALLER TIME STEP".to_string(),
            time_line(10.0, 0),
            abbreviated_line(101, 1100.0, 220.0, 69.0),
            END_LINE.to_string(),
        ];
        let (series, trains, fatal) = run(&lines, &deck);

        // Only the block before the fatal diagnostic was decoded.
        assert_eq!(trains.len(), 1);
        assert_eq!(series.get("airflow", "101").unwrap().len(), 1);
        assert!(matches!(fatal, Some((4, _))));
    }

    #[test]
    fn test_fire_and_thermo_blocks() {
        let mut deck = InputDeck::default();
        deck.config.fire_option = 1;
        deck.config.fire_segments = 1;
        deck.config.supplement_level = 2;
        deck.sections.push(Section {
            id: 1,
            up_node: 1,
            down_node: 2,
            segment_count: 1,
            initial_flow: 0.0,
        });
        deck.segments.push(segment_101());

        let mut fire = String::new();
        put(&mut fire, 8, 14, "101");
        put(&mut fire, 20, 34, "2000000");
        let mut sink = String::new();
        put(&mut sink, 8, 14, "1");
        put(&mut sink, 20, 34, "35000");

        let lines = vec![
            time_line(0.0, 0),
            abbreviated_line(101, 1000.0, 200.0, 68.0),
            "     FIRE SEGMENT HEAT".to_string(),
            fire,
            "     HEAT SINK SUMMARY".to_string(),
            sink,
            END_LINE.to_string(),
        ];
        let (series, _, _) = run(&lines, &deck);

        let heat = series.get("fire_heat", "101").unwrap();
        assert!((heat[0].value - 2_000_000.0 * 0.293_071_07).abs() < 1e-3);
        let wall = series.get("wall_heat", "1").unwrap();
        assert!((wall[0].value - 35_000.0 * 0.293_071_07).abs() < 1e-6);
    }

    #[test]
    fn test_negative_train_count_is_typed_error() {
        let deck = InputDeck::default();
        let mut l = String::from("  TIME");
        put(&mut l, 8, 20, "0.00");
        lit(&mut l, 21, "SECONDS");
        put(&mut l, 32, 38, "-3");
        lit(&mut l, 40, "TRAIN(S) ARE OPERATIONAL");
        let mut cursor = Cursor::new(LineStore::from_text(&l));
        let mut reader = FormReader::new(&mut cursor, &StandardUnits);
        let mut series = TimeSeries::new();
        let mut trains = Vec::new();
        let err = decode_run(&mut reader, &deck, &mut series, &mut trains).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NegativeCount {
                key: "train_count",
                value: -3,
                ..
            }
        ));
    }

    #[test]
    fn test_unexpected_line_is_missing_marker() {
        let deck = InputDeck::default();
        let mut cursor = Cursor::new(LineStore::from_text("SOMETHING ELSE ENTIRELY"));
        let mut reader = FormReader::new(&mut cursor, &StandardUnits);
        let mut series = TimeSeries::new();
        let mut trains = Vec::new();
        let err = decode_run(&mut reader, &deck, &mut series, &mut trains).unwrap_err();
        assert!(matches!(err, DecodeError::MissingMarker { .. }));
    }
}
