//! Console Configuration
//!
//! `scr-ops.toml` in the config directory, overridden by environment
//! variables and then by command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{
    ACTIVITY_POLL_SECS, ACTIVITY_WINDOW_MINS, BACKEND_URL_ENV, DASHBOARD_POLL_SECS,
    DEFAULT_BACKEND_URL, DISABLED_DEVICES_KEY, TASK_POLL_INTERVAL_SECS, TASK_SOON_SECS,
    TASK_WATCH_BUDGET_SECS, WEATHER_POLL_SECS, WIND_SPEED_UNIT_ENV,
};
use crate::domain::battery::BatteryThresholds;
use crate::domain::threshold::WindSpeedUnit;
use crate::error::{Error, Result};
use crate::helpers::{get_or_create_config_dir, get_or_create_data_dir, write_atomic};

const CONFIG_FILE: &str = "scr-ops.toml";

/// Polling cadences for the scheduler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub weather_secs: u64,
    pub activity_secs: u64,
    pub dashboard_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            weather_secs: WEATHER_POLL_SECS,
            activity_secs: ACTIVITY_POLL_SECS,
            dashboard_secs: DASHBOARD_POLL_SECS,
        }
    }
}

impl PollConfig {
    pub fn weather(&self) -> Duration {
        Duration::from_secs(self.weather_secs.max(1))
    }

    pub fn activity(&self) -> Duration {
        Duration::from_secs(self.activity_secs.max(1))
    }

    pub fn dashboard(&self) -> Duration {
        Duration::from_secs(self.dashboard_secs.max(1))
    }
}

/// Scheduled task watching
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TaskWatchConfig {
    pub interval_secs: u64,
    pub budget_secs: u64,
    /// "Executing soon" notice window
    pub soon_secs: i64,
}

impl Default for TaskWatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: TASK_POLL_INTERVAL_SECS,
            budget_secs: TASK_WATCH_BUDGET_SECS,
            soon_secs: TASK_SOON_SECS,
        }
    }
}

impl TaskWatchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Backend REST base URL
    pub backend_url: String,
    /// Per-request timeout; unset means requests may hang until the next tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    /// Unit the wind speed threshold is written in
    pub wind_speed_unit: WindSpeedUnit,
    /// Last-seen window for the active/inactive split
    pub activity_window_mins: i64,
    /// Disabled-robot cache location (defaults to the data directory)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_devices_file: Option<PathBuf>,
    pub poll: PollConfig,
    pub task_watch: TaskWatchConfig,
    pub battery: BatteryThresholds,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout_secs: None,
            wind_speed_unit: WindSpeedUnit::default(),
            activity_window_mins: ACTIVITY_WINDOW_MINS,
            disabled_devices_file: None,
            poll: PollConfig::default(),
            task_watch: TaskWatchConfig::default(),
            battery: BatteryThresholds::default(),
        }
    }
}

impl AppConfig {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(get_or_create_config_dir()?.join(CONFIG_FILE))
    }

    /// Load from `path`, writing defaults first if the file does not exist
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("Wrote default config to {}", path.display());
            return Ok(config);
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        write_atomic(path, content.as_bytes())
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.backend_url = url;
        }
        if let Some(unit) = lookup(WIND_SPEED_UNIT_ENV) {
            self.wind_speed_unit = unit.parse()?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.backend_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(Error::Invalid {
                message: format!("backend_url must be an http(s) URL, got '{url}'"),
            });
        }
        if self.activity_window_mins <= 0
            || chrono::Duration::try_minutes(self.activity_window_mins).is_none()
        {
            return Err(Error::Invalid {
                message: format!(
                    "activity_window_mins must be a positive number of minutes, got {}",
                    self.activity_window_mins
                ),
            });
        }
        Ok(())
    }

    /// Falls back to the default window when the configured one is out of range
    pub fn activity_window(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.activity_window_mins)
            .filter(|window| *window > chrono::Duration::zero())
            .unwrap_or_else(|| chrono::Duration::minutes(ACTIVITY_WINDOW_MINS))
    }

    /// Where the disabled-robot cache lives
    pub fn disabled_devices_path(&self) -> Result<PathBuf> {
        match &self.disabled_devices_file {
            Some(path) => Ok(path.clone()),
            None => Ok(get_or_create_data_dir()?.join(format!("{DISABLED_DEVICES_KEY}.json"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        let created = AppConfig::load_or_init(&path).expect("init");
        assert!(path.exists());
        let loaded = AppConfig::load_or_init(&path).expect("load");
        assert_eq!(created, loaded);
        assert_eq!(loaded.poll.weather_secs, 30);
        assert_eq!(loaded.task_watch.budget_secs, 60);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "backend_url = \"https://ops.example/api\"\nwind_speed_unit = \"mph\"\n",
        )
        .expect("write");
        let config = AppConfig::load_or_init(&path).expect("load");
        assert_eq!(config.backend_url, "https://ops.example/api");
        assert_eq!(config.wind_speed_unit, WindSpeedUnit::MilesPerHour);
        assert_eq!(config.activity_window_mins, 30);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(|key| match key {
                BACKEND_URL_ENV => Some("http://10.0.0.5:5002/api".into()),
                WIND_SPEED_UNIT_ENV => Some("mph".into()),
                _ => None,
            })
            .expect("env");
        assert_eq!(config.backend_url, "http://10.0.0.5:5002/api");
        assert_eq!(config.wind_speed_unit, WindSpeedUnit::MilesPerHour);
    }

    #[test]
    fn test_rejects_out_of_range_activity_window() {
        let config = AppConfig {
            activity_window_mins: i64::MAX,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Invalid { .. })));
        assert_eq!(config.activity_window(), chrono::Duration::minutes(30));

        let config = AppConfig {
            activity_window_mins: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cadences_clamp_to_one_second() {
        let poll = PollConfig {
            weather_secs: 0,
            activity_secs: 0,
            dashboard_secs: 0,
        };
        assert_eq!(poll.weather(), Duration::from_secs(1));
        assert_eq!(poll.activity(), Duration::from_secs(1));
        assert_eq!(poll.dashboard(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_battery_table() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[battery]\ncritical = 21.0\n").expect("write");
        let config = AppConfig::load_or_init(&path).expect("load");
        assert_eq!(config.battery.critical, 21.0);
        assert_eq!(config.battery.low, BatteryThresholds::default().low);
    }

    #[test]
    fn test_rejects_bad_url() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|key| (key == BACKEND_URL_ENV).then(|| "ftp://nope".to_string()))
            .expect_err("invalid");
        assert!(matches!(err, Error::Invalid { .. }));
    }
}
