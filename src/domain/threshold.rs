//! Threshold - Weather Safety Limits and Evaluation
//!
//! Maps a reading and the operator's thresholds to a warning set. Any warning
//! disables robot motion. Missing data on either side yields no warning for
//! that quantity, so absence of data never gates operations.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::MPS_TO_MPH;
use crate::domain::telemetry::{TelemetryReading, WindDirection};
use crate::error::{Error, Result};
use crate::helpers::lenient;

/// Operator-owned safety thresholds, persisted by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Backend record id, absent until first save
    #[serde(
        default,
        deserialize_with = "lenient::opt_id_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rain_gauge: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_speed_level: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<WindDirection>,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_direction_angle: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::opt_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub humidity: Option<f64>,
}

impl ThresholdConfig {
    /// Name of the first numeric limit below zero, if any
    pub fn first_negative(&self) -> Option<&'static str> {
        [
            ("Rain gauge", self.rain_gauge),
            ("Wind speed", self.wind_speed),
            ("Wind speed level", self.wind_speed_level),
            ("Wind direction angle", self.wind_direction_angle),
            ("Humidity", self.humidity),
        ]
        .into_iter()
        .find(|(_, value)| value.is_some_and(|v| v < 0.0))
        .map(|(name, _)| name)
    }
}

/// Unit the wind speed threshold is expressed in for a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindSpeedUnit {
    /// Reading compared directly in m/s
    #[default]
    #[serde(rename = "mps")]
    MetersPerSecond,
    /// Reading converted to mph before comparison
    #[serde(rename = "mph")]
    MilesPerHour,
}

impl FromStr for WindSpeedUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mps" | "m/s" => Ok(WindSpeedUnit::MetersPerSecond),
            "mph" => Ok(WindSpeedUnit::MilesPerHour),
            other => Err(Error::Invalid {
                message: format!("unknown wind speed unit '{other}' (expected mps or mph)"),
            }),
        }
    }
}

/// Result of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    warnings: Vec<String>,
}

impl Evaluation {
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Motion commands are refused while any warning is present
    pub fn operations_disabled(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Compares readings against thresholds under one wind speed policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdEvaluator {
    unit: WindSpeedUnit,
}

impl ThresholdEvaluator {
    pub fn new(unit: WindSpeedUnit) -> Self {
        Self { unit }
    }

    pub fn unit(&self) -> WindSpeedUnit {
        self.unit
    }

    pub fn evaluate(
        &self,
        reading: Option<&TelemetryReading>,
        thresholds: Option<&ThresholdConfig>,
    ) -> Evaluation {
        let (Some(reading), Some(thresholds)) = (reading, thresholds) else {
            return Evaluation::default();
        };

        let mut warnings = Vec::new();

        if let (Some(value), Some(limit)) = (reading.rain_gauge, thresholds.rain_gauge) {
            if value > limit {
                warnings.push(format!(
                    "Rain gauge ({value}mm) exceeds threshold ({limit}mm)"
                ));
            }
        }

        if let (Some(value), Some(limit)) = (reading.wind_speed, thresholds.wind_speed) {
            match self.unit {
                WindSpeedUnit::MetersPerSecond => {
                    if value > limit {
                        warnings.push(format!(
                            "Wind speed ({value}m/s) exceeds threshold ({limit}m/s)"
                        ));
                    }
                }
                WindSpeedUnit::MilesPerHour => {
                    let mph = value * MPS_TO_MPH;
                    if mph > limit {
                        warnings.push(format!(
                            "Wind speed ({mph:.2}mph) exceeds threshold ({limit}mph)"
                        ));
                    }
                }
            }
        }

        if let (Some(value), Some(limit)) = (reading.humidity, thresholds.humidity) {
            if value > limit {
                warnings.push(format!("Humidity ({value}%) exceeds threshold ({limit}%)"));
            }
        }

        Evaluation { warnings }
    }
}
