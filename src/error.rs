//! Error types for SCR Ops
//!
//! Centralized error handling using snafu for ergonomic error definitions.

use snafu::Snafu;

/// Main error type for the library
#[derive(Debug, Snafu)]
pub enum Error {
    /// Invalid input or configuration
    #[snafu(display("Invalid: {message}"))]
    Invalid { message: String },

    /// A required selection or value was missing before an action
    #[snafu(display("Validation error: {message}"))]
    Validation { message: String },

    /// IO error (file operations)
    #[snafu(display("IO error: {source}"))]
    Io { source: std::io::Error },

    /// JSON serialization/deserialization error
    #[snafu(display("JSON error: {source}"))]
    Json { source: serde_json::Error },

    /// TOML deserialization error
    #[snafu(display("TOML parse error: {source}"))]
    TomlDe { source: toml::de::Error },

    /// TOML serialization error
    #[snafu(display("TOML serialize error: {source}"))]
    TomlSe { source: toml::ser::Error },

    /// CSV export error
    #[snafu(display("CSV error: {source}"))]
    Csv { source: csv::Error },

    /// Backend unreachable or the request could not be completed
    #[snafu(display("HTTP error: {source}"))]
    Http { source: reqwest::Error },

    /// Backend answered with a non-2xx status
    #[snafu(display("Backend returned {code}: {message}"))]
    Status { code: u16, message: String },

    /// Motion command refused while weather warnings are active
    #[snafu(display("Cannot operate robot due to weather conditions:\n{}", warnings.join("\n")))]
    WeatherGated { warnings: Vec<String> },

    /// Same action kind is already being sent
    #[snafu(display("Action {action} is already in flight"))]
    Busy { action: String },

    /// Motion command addressed to an administratively disabled robot
    #[snafu(display("Robot {dev_eui} is disabled"))]
    RobotDisabled { dev_eui: String },

    /// No target received the command
    #[snafu(display("Failed to send {action} to selected targets"))]
    Dispatch { action: String },

    /// Task watch ended without a terminal task status
    #[snafu(display("Stopped watching task {task_id}: {reason}"))]
    TaskWatch { task_id: String, reason: String },
}

impl Error {
    /// HTTP status code reported by the backend, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { code, .. } => Some(*code),
            Error::Http { source } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error is a refusal made before any network call
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Error::Validation { .. }
                | Error::WeatherGated { .. }
                | Error::Busy { .. }
                | Error::RobotDisabled { .. }
        )
    }

    /// Shorthand for validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::Json { source }
    }
}

impl From<toml::de::Error> for Error {
    fn from(source: toml::de::Error) -> Self {
        Error::TomlDe { source }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(source: toml::ser::Error) -> Self {
        Error::TomlSe { source }
    }
}

impl From<csv::Error> for Error {
    fn from(source: csv::Error) -> Self {
        Error::Csv { source }
    }
}

impl From<reqwest::Error> for Error {
    fn from(source: reqwest::Error) -> Self {
        Error::Http { source }
    }
}

/// Result type alias for convenience
pub type Result<T, E = Error> = std::result::Result<T, E>;
