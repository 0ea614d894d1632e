//! WeatherState - Latest Reading, Thresholds and Gate

use chrono::{DateTime, Local};

use crate::domain::telemetry::TelemetryReading;
use crate::domain::threshold::{Evaluation, ThresholdConfig, ThresholdEvaluator};

/// Weather snapshot plus the derived warning set.
///
/// The evaluation is recomputed whenever either input changes, so
/// `operations_disabled()` always agrees with `warnings()`.
#[derive(Debug, Clone, Default)]
pub struct WeatherState {
    reading: Option<TelemetryReading>,
    thresholds: Option<ThresholdConfig>,
    evaluator: ThresholdEvaluator,
    evaluation: Evaluation,
    /// Fetch problem, kept apart from weather warnings
    connectivity: Option<String>,
    updated_at: Option<DateTime<Local>>,
}

impl WeatherState {
    pub fn new(evaluator: ThresholdEvaluator) -> Self {
        Self {
            evaluator,
            ..Default::default()
        }
    }

    /// Replace the reading wholesale; `None` means no usable data
    pub fn set_reading(&mut self, reading: Option<TelemetryReading>) -> &Evaluation {
        self.reading = reading;
        self.updated_at = Some(Local::now());
        self.reevaluate()
    }

    pub fn set_thresholds(&mut self, thresholds: Option<ThresholdConfig>) -> &Evaluation {
        self.thresholds = thresholds;
        self.reevaluate()
    }

    pub fn set_connectivity(&mut self, warning: Option<String>) {
        self.connectivity = warning;
    }

    fn reevaluate(&mut self) -> &Evaluation {
        self.evaluation = self
            .evaluator
            .evaluate(self.reading.as_ref(), self.thresholds.as_ref());
        &self.evaluation
    }

    pub fn reading(&self) -> Option<&TelemetryReading> {
        self.reading.as_ref()
    }

    /// Reading to show, zeroed when nothing is available
    pub fn display_reading(&self) -> TelemetryReading {
        self.reading
            .clone()
            .unwrap_or_else(TelemetryReading::placeholder)
    }

    pub fn thresholds(&self) -> Option<&ThresholdConfig> {
        self.thresholds.as_ref()
    }

    pub fn evaluation(&self) -> &Evaluation {
        &self.evaluation
    }

    pub fn warnings(&self) -> &[String] {
        self.evaluation.warnings()
    }

    pub fn operations_disabled(&self) -> bool {
        self.evaluation.operations_disabled()
    }

    pub fn connectivity_warning(&self) -> Option<&str> {
        self.connectivity.as_deref()
    }

    pub fn evaluator(&self) -> ThresholdEvaluator {
        self.evaluator
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::threshold::WindSpeedUnit;

    fn rainy() -> TelemetryReading {
        TelemetryReading {
            rain_gauge: Some(7.0),
            wind_speed: Some(4.0),
            ..Default::default()
        }
    }

    fn limits() -> ThresholdConfig {
        ThresholdConfig {
            rain_gauge: Some(5.0),
            wind_speed: Some(10.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_gate_follows_both_inputs() {
        let mut state = WeatherState::new(ThresholdEvaluator::new(WindSpeedUnit::MetersPerSecond));
        state.set_reading(Some(rainy()));
        assert!(!state.operations_disabled());

        state.set_thresholds(Some(limits()));
        assert!(state.operations_disabled());
        assert_eq!(state.warnings(), ["Rain gauge (7mm) exceeds threshold (5mm)"]);

        state.set_reading(None);
        assert!(!state.operations_disabled());
        assert!(state.warnings().is_empty());
    }

    #[test]
    fn test_connectivity_does_not_gate() {
        let mut state = WeatherState::default();
        state.set_thresholds(Some(limits()));
        state.set_reading(None);
        state.set_connectivity(Some("Failed to fetch weather data".into()));
        assert_eq!(state.connectivity_warning(), Some("Failed to fetch weather data"));
        assert!(!state.operations_disabled());
        assert_eq!(state.display_reading(), TelemetryReading::placeholder());
    }
}
