//! Service Events
//!
//! Events emitted by the service layer for whoever drives the console
//! (the CLI prints them, tests inspect them).

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::domain::task::ScheduledTask;

/// Notification severity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "INFO",
            NotificationLevel::Success => "OK",
            NotificationLevel::Warning => "WARN",
            NotificationLevel::Error => "ERROR",
        }
    }
}

/// A user-facing, non-blocking message
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: Arc<str>,
    pub message: Arc<str>,
    /// Deduplication key, e.g. `task-skip-<id>`
    pub key: Option<Arc<str>>,
    pub timestamp: DateTime<Local>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: &str, message: impl AsRef<str>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.as_ref().into(),
            key: None,
            timestamp: Local::now(),
        }
    }

    pub fn info(title: &str, message: impl AsRef<str>) -> Self {
        Self::new(NotificationLevel::Info, title, message)
    }

    pub fn success(title: &str, message: impl AsRef<str>) -> Self {
        Self::new(NotificationLevel::Success, title, message)
    }

    pub fn warning(title: &str, message: impl AsRef<str>) -> Self {
        Self::new(NotificationLevel::Warning, title, message)
    }

    pub fn error(title: &str, message: impl AsRef<str>) -> Self {
        Self::new(NotificationLevel::Error, title, message)
    }

    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// Events emitted by the service layer
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// Weather re-evaluated after a poll or threshold change
    WeatherEvaluated {
        warnings: Vec<String>,
        operations_disabled: bool,
    },

    /// Backend reachability changed
    ConnectionState {
        /// Feed name (e.g., "weather", "activity")
        service: Arc<str>,
        connected: bool,
        detail: Arc<str>,
    },

    /// Running flags republished for the status board
    ActivityRefreshed { running: usize, total: usize },

    /// Fleet overview recomputed
    DashboardRefreshed {
        groups: usize,
        devices: usize,
        active: usize,
        inactive: usize,
    },

    /// A watched task changed
    TaskUpdated(ScheduledTask),

    Notify(Notification),
}
