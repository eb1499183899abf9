//! Server configuration from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use nav_core::MonitoringRules;

use crate::backoff::RetryPolicy;
use crate::sensors::SimulationConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    /// Interval between monitoring cycles of one route
    pub cycle_interval: Duration,
    /// Window in which repeated cycle alerts are suppressed; zero disables
    pub alert_cooldown: Duration,
    /// Resume monitoring of routes persisted as `Active` at boot
    pub resume_on_start: bool,
    pub simulation: SimulationConfig,
    pub rules: MonitoringRules,
    pub status_retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            database_path: "data/nav.db".to_string(),
            database_max_connections: 5,
            cycle_interval: Duration::from_secs(5),
            alert_cooldown: Duration::from_secs(60),
            resume_on_start: true,
            simulation: SimulationConfig::default(),
            rules: MonitoringRules::default(),
            status_retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("NAV_PORT").unwrap_or(defaults.server_port),
            database_path: env::var("NAV_DATABASE_PATH").unwrap_or(defaults.database_path),
            database_max_connections: parse_env("NAV_DATABASE_MAX_CONNECTIONS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            cycle_interval: parse_env("NAV_CYCLE_INTERVAL_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cycle_interval),
            alert_cooldown: parse_env("NAV_ALERT_COOLDOWN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.alert_cooldown),
            resume_on_start: parse_env_bool("NAV_RESUME_ON_START").unwrap_or(defaults.resume_on_start),
            simulation: SimulationConfig {
                seed: parse_env("NAV_SENSOR_SEED"),
                critical_probability: parse_env("NAV_CRITICAL_OBSTACLE_PROBABILITY")
                    .filter(|p: &f64| (0.0..=1.0).contains(p))
                    .unwrap_or(defaults.simulation.critical_probability),
                ..defaults.simulation
            },
            rules: defaults.rules,
            status_retry: defaults.status_retry,
        }
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_env_bool(key: &str) -> Option<bool> {
    env::var(key).ok().and_then(|s| parse_bool(&s))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
