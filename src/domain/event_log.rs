//! EventLog - Robot Event Records

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::helpers::lenient;

/// A robot event as stored by the backend
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotEvent {
    #[serde(default, alias = "_id", deserialize_with = "lenient::opt_id_string")]
    pub id: Option<String>,
    #[serde(default, alias = "deviceId")]
    pub dev_eui: Option<String>,
    #[serde(default, alias = "deviceName")]
    pub name: Option<String>,
    #[serde(default, alias = "event", alias = "description")]
    pub message: Option<String>,
    #[serde(default, alias = "timestamp", alias = "time")]
    pub created_at: Option<DateTime<Utc>>,
    /// Remaining backend columns
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RobotEvent {
    pub fn source(&self) -> &str {
        self.name
            .as_deref()
            .or(self.dev_eui.as_deref())
            .unwrap_or("unknown")
    }

    pub fn text(&self) -> String {
        match &self.message {
            Some(m) => m.clone(),
            None => Value::Object(self.extra.clone()).to_string(),
        }
    }
}

/// `/events/count` answers either a bare number or `{count}`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub(crate) enum EventCount {
    Bare(u64),
    Wrapped { count: u64 },
    Data { data: u64 },
}

impl EventCount {
    pub(crate) fn value(self) -> u64 {
        match self {
            EventCount::Bare(n) | EventCount::Wrapped { count: n } | EventCount::Data { data: n } => {
                n
            }
        }
    }
}
