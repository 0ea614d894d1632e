//! Operational Constants
//!
//! Centralized cadences, limits and thresholds used across the console.

/// Backend base URL used when neither config nor environment provide one
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5002/api";

/// Environment variable overriding the backend base URL
pub const BACKEND_URL_ENV: &str = "SCR_BACKEND_URL";

/// Environment variable overriding the wind speed comparison unit
pub const WIND_SPEED_UNIT_ENV: &str = "SCR_WIND_SPEED_UNIT";

/// Polling cadences
pub const WEATHER_POLL_SECS: u64 = 30;
pub const ACTIVITY_POLL_SECS: u64 = 5;
pub const DASHBOARD_POLL_SECS: u64 = 300;

/// Scheduled task watching
pub const TASK_POLL_INTERVAL_SECS: u64 = 3;
pub const TASK_WATCH_BUDGET_SECS: u64 = 60;
pub const TASK_SOON_SECS: i64 = 30;

/// A device is active when seen within this window
pub const ACTIVITY_WINDOW_MINS: i64 = 30;

/// Devices per group shown on the status board
pub const GROUP_STATUS_DEVICE_LIMIT: usize = 50;

/// Battery voltage thresholds (volts)
pub const BATTERY_CRITICAL_VOLTS: f64 = 20.0;
pub const BATTERY_LOW_VOLTS: f64 = 23.0;
pub const BATTERY_MAX_VOLTS: f64 = 30.0;

/// 1 m/s expressed in mph
pub const MPS_TO_MPH: f64 = 2.23694;

/// Downlink frame defaults
pub const DOWNLINK_FPORT: u8 = 1;

/// Notification ring buffer capacity
pub const NOTIFICATION_CAPACITY: usize = 500;

/// Browser-era storage key, kept as the cache file stem
pub const DISABLED_DEVICES_KEY: &str = "disabledDevices";

pub const CONNECTIVITY_FAILED: &str = "Failed to fetch weather data";
pub const CONNECTIVITY_NO_DATA: &str = "No weather data available";

/// Daily rolling log file prefix in the data directory
pub const LOG_FILE_PREFIX: &str = "scr-ops.log";
