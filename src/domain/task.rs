//! Task - Scheduled Group Downlinks
//!
//! The backend owns the task lifecycle; the console only observes it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::helpers::lenient;

/// Lifecycle status reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Scheduled,
    Completed,
    /// Backend skipped execution (weather)
    Skipped,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Skipped | TaskStatus::Failed
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown => "unknown",
        }
    }
}

/// A scheduled downlink to one or more groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(alias = "taskId", deserialize_with = "lenient::id_string")]
    pub id: String,
    #[serde(default, alias = "groupId", deserialize_with = "lenient::id_list")]
    pub group_ids: Vec<String>,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default, alias = "scheduledTime")]
    pub schedule_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub skip_message: Option<String>,
}

impl ScheduledTask {
    /// Message shown once the task reaches a terminal status
    pub fn terminal_message(&self) -> Option<(&'static str, String)> {
        match self.status {
            TaskStatus::Completed => {
                let names = if self.group_names.is_empty() {
                    "groups".to_string()
                } else {
                    self.group_names.join(", ")
                };
                Some((
                    "Task Completed",
                    format!("Successfully sent downlink to {names}"),
                ))
            }
            TaskStatus::Skipped => Some((
                "Task Skipped",
                self.skip_message
                    .clone()
                    .unwrap_or_else(|| "Task was skipped due to weather conditions".into()),
            )),
            TaskStatus::Failed => Some((
                "Task Failed",
                self.error.clone().unwrap_or_else(|| {
                    "An unknown error occurred during task execution".into()
                }),
            )),
            TaskStatus::Scheduled | TaskStatus::Unknown => None,
        }
    }

    /// Seconds until execution, negative once due
    pub fn seconds_until(&self, now: DateTime<Utc>) -> Option<i64> {
        self.schedule_time.map(|t| (t - now).num_seconds())
    }
}

/// Request body for scheduling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub group_ids: Vec<String>,
    pub schedule_time: DateTime<Utc>,
}

/// Backend acknowledgement of a scheduling request
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleReceipt {
    #[serde(alias = "id", deserialize_with = "lenient::id_string")]
    pub task_id: String,
    #[serde(default, alias = "scheduleTime")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl ScheduleReceipt {
    /// Local task record until the first status poll replaces it
    pub fn into_task(self, request: &ScheduleRequest) -> ScheduledTask {
        ScheduledTask {
            id: self.task_id,
            group_ids: request.group_ids.clone(),
            group_names: Vec::new(),
            schedule_time: self.scheduled_time.or(Some(request.schedule_time)),
            status: TaskStatus::Scheduled,
            error: None,
            skip_message: None,
        }
    }
}
