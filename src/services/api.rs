//! Fleet API
//!
//! The seam between the console and the backend REST service. The backend
//! owns the device registry, downlink queues, scheduled tasks and reports.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::command::{EnqueueReceipt, QueueItem};
use crate::domain::device::{Device, DeviceChannels, Group};
use crate::domain::event_log::RobotEvent;
use crate::domain::report::{ActiveCount, ChartData, PerformanceReport, Timeframe, WeeklyChart};
use crate::domain::task::{ScheduleReceipt, ScheduleRequest, ScheduledTask};
use crate::domain::telemetry::TelemetryReading;
use crate::domain::threshold::ThresholdConfig;
use crate::error::Result;

/// Threshold save acknowledgement
#[derive(Debug, Clone, PartialEq)]
pub struct SavedThresholds {
    pub message: Option<String>,
    pub thresholds: ThresholdConfig,
}

#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Current weather; `Ok(None)` when the backend has no data
    async fn weather(&self) -> Result<Option<TelemetryReading>>;

    /// Configured thresholds; `Ok(None)` when none are stored
    async fn thresholds(&self) -> Result<Option<ThresholdConfig>>;

    async fn save_thresholds(&self, thresholds: &ThresholdConfig) -> Result<SavedThresholds>;

    async fn devices(&self) -> Result<Vec<Device>>;

    async fn device_channels(&self, dev_eui: &str) -> Result<DeviceChannels>;

    /// Multicast groups without members
    async fn groups(&self) -> Result<Vec<Group>>;

    /// Groups with their member devices
    async fn group_devices(&self) -> Result<Vec<Group>>;

    async fn enqueue_device(&self, dev_eui: &str, item: &QueueItem) -> Result<EnqueueReceipt>;

    async fn enqueue_group(&self, group_id: &str, item: &QueueItem) -> Result<EnqueueReceipt>;

    /// Broadcast a raw frame to several groups at once
    async fn trigger_all(&self, group_ids: &[String], data: &str) -> Result<()>;

    async fn scheduled_tasks(&self) -> Result<Vec<ScheduledTask>>;

    async fn scheduled_task(&self, task_id: &str) -> Result<ScheduledTask>;

    async fn schedule_downlink(&self, request: &ScheduleRequest) -> Result<ScheduleReceipt>;

    async fn cancel_task(&self, task_id: &str) -> Result<()>;

    /// Battery voltage; `Ok(None)` when the robot has not reported
    async fn robot_battery(&self, dev_eui: &str) -> Result<Option<f64>>;

    async fn events(&self) -> Result<Vec<RobotEvent>>;

    async fn events_count(&self) -> Result<u64>;

    async fn clear_events(&self) -> Result<()>;

    async fn performance_report(&self, timeframe: Timeframe) -> Result<PerformanceReport>;

    /// Raw CSV as served by the backend
    async fn download_report(&self, timeframe: Timeframe) -> Result<Vec<u8>>;

    async fn active_counts(&self, date: Option<NaiveDate>) -> Result<Vec<ActiveCount>>;

    /// Weekly trend chart; `Ok(None)` when the backend has nothing to plot
    async fn weekly_chart(&self, chart: WeeklyChart) -> Result<Option<ChartData>>;
}

#[cfg(test)]
pub(crate) mod mock;
