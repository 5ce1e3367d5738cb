//! Run configuration decoded from the early input sections.
//!
//! Populated strictly in transcript order: form 1 fills the options and
//! counts, form 12 fills the schedule-derived estimate times. Later decode
//! steps only ever read keys an earlier step populated.

use serde::Serialize;

/// How the segment tables print their humidity column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum HumidityDisplay {
    /// Humidity ratio, LB/LB.
    #[default]
    Ratio,
    /// Wet-bulb temperature, DEG F.
    WetBulb,
}

/// Tolerance when matching a decoded time against the estimate schedule.
pub const TIME_MATCH_TOL: f64 = 1e-3;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunConfiguration {
    pub title: String,
    pub train_performance: i64,
    pub temperature_sim: bool,
    pub humidity_display: HumidityDisplay,
    /// Supplementary-output detail level, 0..=3.
    pub supplement_level: i64,
    pub fire_option: i64,

    /// Ambient dry-bulb, deg C after conversion.
    pub ambient_dry_bulb: f64,
    pub ambient_wet_bulb: f64,
    /// Ambient barometric pressure, Pa.
    pub ambient_pressure: f64,

    pub sections: usize,
    pub line_segments: usize,
    pub vent_segments: usize,
    pub nodes: usize,
    pub routes: usize,
    pub train_types: usize,
    pub zones: usize,
    pub fire_segments: usize,

    /// Final simulated time, seconds.
    pub final_time: f64,
    pub print_groups: usize,

    /// Times at which an environmental-estimate block is printed,
    /// ascending. Derived from the form 12 print groups.
    pub estimate_times: Vec<f64>,
}

impl RunConfiguration {
    /// Whether the duct-pressure table is printed each timestep.
    pub fn has_pressure_block(&self) -> bool {
        self.vent_segments > 0
    }

    /// Whether the fire table is printed each timestep.
    pub fn has_fire_block(&self) -> bool {
        self.fire_option != 0 && self.fire_segments > 0
    }

    /// Whether the heat-sink summary is printed each timestep.
    pub fn has_thermo_block(&self) -> bool {
        self.supplement_level >= 2
    }

    /// Whether an estimate block is scheduled at simulated time `t`.
    pub fn is_estimate_time(&self, t: f64) -> bool {
        self.estimate_times
            .iter()
            .any(|e| (e - t).abs() <= TIME_MATCH_TOL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_gates() {
        let mut cfg = RunConfiguration::default();
        assert!(!cfg.has_pressure_block());
        assert!(!cfg.has_fire_block());
        assert!(!cfg.has_thermo_block());
        cfg.vent_segments = 2;
        cfg.fire_option = 1;
        cfg.fire_segments = 1;
        cfg.supplement_level = 2;
        assert!(cfg.has_pressure_block());
        assert!(cfg.has_fire_block());
        assert!(cfg.has_thermo_block());
    }

    #[test]
    fn test_estimate_time_tolerance() {
        let cfg = RunConfiguration {
            estimate_times: vec![300.0, 600.0],
            ..Default::default()
        };
        assert!(cfg.is_estimate_time(300.0));
        assert!(cfg.is_estimate_time(300.0005));
        assert!(!cfg.is_estimate_time(310.0));
    }
}
