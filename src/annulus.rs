//! Annulus flow post-pass.
//!
//! A pure function over the decoded series, the per-timestep train
//! states, and the static segment geometry. For every timestep it samples
//! each subsegment at three subpoints (back, mid, forward), subtracts the
//! frontal area of every train spanning the subpoint, and offsets the
//! open-tunnel flow by each spanning train's onboard ventilation flow,
//! signed by the segment's orientation in the train's route.
//!
//! No floor is applied to the open area: a negative value is a genuine
//! capacity violation and is surfaced as-is. A zero area yields an
//! undefined velocity (`None`), not an error.

use std::collections::BTreeMap;

use crate::input::InputDeck;
use crate::series::TimeSeries;
use crate::timestep::TrainState;

/// Slack when testing whether a subpoint lies under a train, m.
const POS_TOL: f64 = 1e-6;

/// Derived conditions at one subpoint at one timestep. All SI.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SubpointSample {
    pub time: f64,
    /// Open cross-section, m**2. May be negative.
    pub area: f64,
    /// Net onboard-ventilation offset from spanning trains, m**3/s.
    pub train_flow: f64,
    pub cold_flow: f64,
    /// `None` when the open area is zero.
    pub cold_velocity: Option<f64>,
    pub warm_flow: f64,
    pub warm_velocity: Option<f64>,
}

/// Subpoint samples keyed `"{segment}-{subsegment}-{b|m|f}"`, one entry
/// per decoded timestep, times ascending.
pub type SubpointSeries = BTreeMap<String, Vec<SubpointSample>>;

/// Chainage fractions of the three subpoints within a subsegment.
const SUBPOINTS: [(&str, f64); 3] = [("b", 0.0), ("m", 0.5), ("f", 1.0)];

/// Route chainage of segment chainage `x` on `leg` of a segment of
/// `length`. Reversed legs count chainage from the far end.
fn route_chainage(origin: f64, forward: bool, length: f64, x: f64) -> f64 {
    if forward { origin + x } else { origin + (length - x) }
}

/// Derive the annulus series for every subpoint of every segment.
pub fn derive_subpoints(
    deck: &InputDeck,
    series: &TimeSeries,
    trains: &[(f64, Vec<TrainState>)],
) -> SubpointSeries {
    let ambient_abs = deck.config.ambient_dry_bulb + 273.15;
    let mut out = SubpointSeries::new();

    for (time, states) in trains {
        for seg in &deck.segments {
            let seg_entity = seg.id.to_string();
            let seg_flow = series
                .latest_at("airflow", &seg_entity, *time)
                .unwrap_or(0.0);

            let mut sub_start = 0.0;
            for (i, sub_len) in seg.sub_lengths.iter().enumerate() {
                let sub = i + 1;
                let local_temp = series
                    .latest_at("air_temp", &format!("{}-{}", seg.id, sub), *time)
                    .unwrap_or(seg.initial_air_temp);
                let warm_ratio = (local_temp + 273.15) / ambient_abs;

                for (tag, frac) in SUBPOINTS {
                    let x = sub_start + frac * sub_len;
                    let mut area = seg.area;
                    let mut train_flow = 0.0;

                    for st in states {
                        let Some(route) = deck.route(st.route) else {
                            continue;
                        };
                        let Some(kind) = deck.train_type(st.kind) else {
                            continue;
                        };
                        for leg in route.legs.iter().filter(|l| l.segment == seg.id) {
                            let rx =
                                route_chainage(leg.origin_chainage, leg.forward, seg.length, x);
                            // The train occupies [front - length, front].
                            if rx >= st.location - kind.length - POS_TOL
                                && rx <= st.location + POS_TOL
                            {
                                area -= kind.frontal_area;
                                train_flow += if leg.forward {
                                    kind.onboard_flow
                                } else {
                                    -kind.onboard_flow
                                };
                            }
                        }
                    }

                    let cold_flow = seg_flow + train_flow;
                    let cold_velocity = (area != 0.0).then(|| cold_flow / area);
                    out.entry(format!("{}-{}-{}", seg.id, sub, tag))
                        .or_default()
                        .push(SubpointSample {
                            time: *time,
                            area,
                            train_flow,
                            cold_flow,
                            cold_velocity,
                            warm_flow: cold_flow * warm_ratio,
                            warm_velocity: cold_velocity.map(|v| v * warm_ratio),
                        });
                }
                sub_start += sub_len;
            }
        }
    }
    out
}
