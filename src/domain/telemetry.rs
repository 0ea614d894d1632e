//! Telemetry - Weather Station Readings

use serde::{Deserialize, Serialize};

use crate::helpers::lenient;

/// Compass point reported by the weather station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WindDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
    /// Station sent "N/A" or something we don't recognize
    #[default]
    #[serde(other)]
    Unknown,
}

impl WindDirection {
    pub fn label(&self) -> &'static str {
        match self {
            WindDirection::N => "N",
            WindDirection::NE => "NE",
            WindDirection::E => "E",
            WindDirection::SE => "SE",
            WindDirection::S => "S",
            WindDirection::SW => "SW",
            WindDirection::W => "W",
            WindDirection::NW => "NW",
            WindDirection::Unknown => "N/A",
        }
    }
}

impl std::fmt::Display for WindDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Current weather reading, superseded wholesale by each poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    /// Rain gauge (mm)
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub rain_gauge: Option<f64>,
    /// Wind speed (m/s)
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_speed: Option<f64>,
    /// Beaufort-style level reported by the station
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_speed_level: Option<f64>,
    #[serde(default)]
    pub wind_direction: Option<WindDirection>,
    /// Wind direction (degrees)
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub wind_direction_angle: Option<f64>,
    /// Relative humidity (%), not reported by every station
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub humidity: Option<f64>,
}

impl TelemetryReading {
    /// Zeroed reading shown while no data is available
    pub fn placeholder() -> Self {
        Self {
            rain_gauge: Some(0.0),
            wind_speed: Some(0.0),
            wind_speed_level: Some(0.0),
            wind_direction: Some(WindDirection::Unknown),
            wind_direction_angle: Some(0.0),
            humidity: None,
        }
    }

    /// One-line summary for status output
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Wind Dir: {} ({}°) | Wind Speed: {} m/s (Level {}) | Rain: {} mm",
            self.wind_direction.unwrap_or_default(),
            self.wind_direction_angle.unwrap_or(0.0),
            self.wind_speed.unwrap_or(0.0),
            self.wind_speed_level.unwrap_or(0.0),
            self.rain_gauge.unwrap_or(0.0),
        );
        if let Some(h) = self.humidity {
            line.push_str(&format!(" | Humidity: {h}%"));
        }
        line
    }
}
