//! Environment and obstacle sensing.
//!
//! The monitor only sees the `SensorFeed` port. Production deployments plug a
//! real instrument feed in behind it; `SimulatedSensorFeed` generates
//! plausible readings for local runs.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use nav_core::models::{
    EnvironmentReading, Obstacle, ObstacleKind, ObstacleSeverity, Position, SeaConditions, SeaState,
    WeatherCondition, WeatherConditions,
};
use nav_core::spatial::{haversine_distance, offset_by_bearing};

#[async_trait]
pub trait SensorFeed: Send + Sync {
    /// Point-in-time weather and sea-state reading at `position`.
    async fn sample(&self, position: &Position) -> Result<EnvironmentReading>;

    /// Obstacles currently detected around `position`.
    async fn scan(&self, position: &Position) -> Result<Vec<Obstacle>>;
}

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
    /// Probability that a generated obstacle is critical
    pub critical_probability: f64,
    /// Probability that a scan returns any obstacles at all
    pub detection_probability: f64,
    /// Obstacles are placed within this radius of the vehicle (meters)
    pub max_range_m: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            critical_probability: 0.05,
            detection_probability: 0.3,
            max_range_m: 3_000.0,
        }
    }
}

/// Randomised stand-in for a real sensor feed.
pub struct SimulatedSensorFeed {
    config: SimulationConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedSensorFeed {
    pub fn new(config: SimulationConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { config, rng: Mutex::new(rng) }
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T> {
        let mut rng = self.rng.lock().map_err(|_| anyhow!("sensor simulator RNG poisoned"))?;
        Ok(f(&mut *rng))
    }
}

#[async_trait]
impl SensorFeed for SimulatedSensorFeed {
    async fn sample(&self, position: &Position) -> Result<EnvironmentReading> {
        self.with_rng(|rng| simulate_reading(rng, position))
    }

    async fn scan(&self, position: &Position) -> Result<Vec<Obstacle>> {
        let config = self.config.clone();
        self.with_rng(|rng| simulate_obstacles(rng, position, &config))
    }
}

fn simulate_reading(rng: &mut StdRng, position: &Position) -> EnvironmentReading {
    let condition = match rng.random_range(0..100) {
        0..=44 => WeatherCondition::Clear,
        45..=74 => WeatherCondition::Cloudy,
        75..=92 => WeatherCondition::Rainy,
        _ => WeatherCondition::Stormy,
    };
    let precipitation_mm = match condition {
        WeatherCondition::Clear | WeatherCondition::Cloudy => 0.0,
        WeatherCondition::Rainy => rng.random_range(0.5..8.0),
        WeatherCondition::Stormy => rng.random_range(8.0..40.0),
    };
    let wave_height_m: f64 = rng.random_range(0.2..5.0);
    let state = if wave_height_m < 0.5 {
        SeaState::Calm
    } else if wave_height_m < 2.5 {
        SeaState::Moderate
    } else if wave_height_m < 4.0 {
        SeaState::Rough
    } else {
        SeaState::VeryRough
    };

    EnvironmentReading {
        location: position.point(),
        weather: WeatherConditions {
            condition,
            temperature_c: rng.random_range(5.0..30.0),
            humidity_pct: rng.random_range(40.0..95.0),
            precipitation_mm,
        },
        sea_state: SeaConditions {
            state,
            wave_height_m,
            wave_period_s: rng.random_range(3.0..12.0),
            swell_direction_deg: rng.random_range(0.0..360.0),
        },
        visibility_m: rng.random_range(500.0..20_000.0),
        wind_speed_knots: rng.random_range(0.0..45.0),
        wave_height_m,
    }
}

fn simulate_obstacles(rng: &mut StdRng, position: &Position, config: &SimulationConfig) -> Vec<Obstacle> {
    if !rng.random_bool(config.detection_probability.clamp(0.0, 1.0)) {
        return Vec::new();
    }

    let count = rng.random_range(1..=3);
    (0..count)
        .map(|_| {
            let range_m = rng.random_range(100.0..config.max_range_m.max(101.0));
            let bearing_rad = rng.random_range(0.0..std::f64::consts::TAU);
            let (lat, lon) = offset_by_bearing(position.lat, position.lon, range_m, bearing_rad);
            let kind = match rng.random_range(0..4) {
                0 => ObstacleKind::Vessel,
                1 => ObstacleKind::Debris,
                2 => ObstacleKind::ShallowWater,
                _ => ObstacleKind::RestrictedArea,
            };
            let severity = if rng.random_bool(config.critical_probability.clamp(0.0, 1.0)) {
                ObstacleSeverity::Critical
            } else {
                match rng.random_range(0..10) {
                    0..=4 => ObstacleSeverity::Low,
                    5..=7 => ObstacleSeverity::Medium,
                    _ => ObstacleSeverity::High,
                }
            };
            Obstacle {
                id: Uuid::new_v4().to_string(),
                kind,
                lat,
                lon,
                severity,
                distance_m: haversine_distance(position.lat, position.lon, lat, lon),
                detected_at: Utc::now(),
            }
        })
        .collect()
}
