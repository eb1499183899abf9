//! Monitoring thresholds and tunables.

use serde::{Deserialize, Serialize};

/// Configuration for risk rules, avoidance geometry and progress updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringRules {
    /// Wave height above which `high_waves` is raised (meters)
    pub high_wave_threshold_m: f64,
    /// Wind speed above which `strong_winds` is raised (knots)
    pub strong_wind_threshold_knots: f64,
    /// Minimum distance a waypoint must keep from a critical hazard (meters)
    pub hazard_clearance_m: f64,
    /// Clearance multiplier applied per retry when the first attempt fails
    pub retry_clearance_multiplier: f64,
    /// Replan attempts per cycle before declaring failure (1 = no retry)
    pub replan_attempts: u32,
    /// Fraction of the remaining distance covered each cycle
    pub progress_fraction: f64,
    /// Distance to destination at which the route counts as arrived (meters)
    pub arrival_epsilon_m: f64,
    /// Nominal transit speed (knots)
    pub cruise_speed_knots: f64,
    /// Vessel-class speed limits (knots)
    pub min_speed_knots: f64,
    pub max_speed_knots: f64,
}

impl Default for MonitoringRules {
    fn default() -> Self {
        Self {
            high_wave_threshold_m: 3.0,
            strong_wind_threshold_knots: 30.0,
            hazard_clearance_m: 1_000.0,
            retry_clearance_multiplier: 1.5,
            replan_attempts: 2,
            progress_fraction: 0.01,
            arrival_epsilon_m: 50.0,
            cruise_speed_knots: 12.0,
            min_speed_knots: 2.0,
            max_speed_knots: 25.0,
        }
    }
}

impl MonitoringRules {
    /// Clearance used for the given 1-based replan attempt.
    pub fn clearance_for_attempt(&self, attempt: u32) -> f64 {
        let retries = attempt.saturating_sub(1);
        self.hazard_clearance_m * self.retry_clearance_multiplier.max(1.0).powi(retries as i32)
    }
}
