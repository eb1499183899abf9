//! Rule-based risk assessment of environment readings.

use serde::{Deserialize, Serialize};

use crate::models::{EnvironmentReading, WeatherCondition};
use crate::rules::MonitoringRules;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    SevereWeather,
    HighWaves,
    StrongWinds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub factor: RiskFactorKind,
    pub severity: RiskLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall: RiskLevel,
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    fn raise(&mut self, factor: RiskFactorKind, severity: RiskLevel) {
        self.factors.push(RiskFactor { factor, severity });
        self.overall = self.overall.max(severity);
    }
}

/// Derive the overall risk level and contributing factors for a reading.
///
/// Rules are evaluated in priority order; overall risk is the highest
/// severity among the triggered factors, or `Low` when none trigger.
pub fn assess_risk(reading: &EnvironmentReading, rules: &MonitoringRules) -> RiskAssessment {
    let mut assessment = RiskAssessment::default();

    if reading.weather.condition == WeatherCondition::Stormy {
        assessment.raise(RiskFactorKind::SevereWeather, RiskLevel::High);
    }
    if reading.wave_height_m > rules.high_wave_threshold_m {
        assessment.raise(RiskFactorKind::HighWaves, RiskLevel::Medium);
    }
    if reading.wind_speed_knots > rules.strong_wind_threshold_knots {
        assessment.raise(RiskFactorKind::StrongWinds, RiskLevel::Medium);
    }

    assessment
}
