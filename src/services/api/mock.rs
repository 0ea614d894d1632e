//! In-memory `FleetApi` that records every call

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::{FleetApi, SavedThresholds};
use crate::domain::command::{EnqueueReceipt, QueueItem};
use crate::domain::device::{Device, DeviceChannels, Group};
use crate::domain::event_log::RobotEvent;
use crate::domain::report::{ActiveCount, ChartData, PerformanceReport, Timeframe, WeeklyChart};
use crate::domain::task::{ScheduleReceipt, ScheduleRequest, ScheduledTask};
use crate::domain::telemetry::TelemetryReading;
use crate::domain::threshold::ThresholdConfig;
use crate::error::{Error, Result};

/// Scripted reply for one endpoint call
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Ok(T),
    /// Non-2xx with the given code
    Status(u16),
    /// Connection-level failure (no status code)
    Transport,
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Status(code) => Err(status(code)),
            Reply::Transport => Err(transport()),
        }
    }
}

fn status(code: u16) -> Error {
    Error::Status {
        code,
        message: format!("mock status {code}"),
    }
}

fn transport() -> Error {
    Error::Invalid {
        message: "mock connection reset".into(),
    }
}

#[derive(Default)]
struct Inner {
    calls: Vec<String>,
    weather: Option<Reply<Option<TelemetryReading>>>,
    thresholds: Option<ThresholdConfig>,
    devices: Vec<Device>,
    groups: Vec<Group>,
    channels: AHashMap<String, DeviceChannels>,
    /// Targets whose enqueue or channel fetch fails
    failing: AHashSet<String>,
    tasks: Vec<ScheduledTask>,
    task_replies: VecDeque<Reply<ScheduledTask>>,
    schedule_reply: Option<Reply<ScheduleReceipt>>,
    cancel_fails: bool,
    batteries: AHashMap<String, f64>,
    events: Vec<RobotEvent>,
    counts: Vec<ActiveCount>,
    charts: AHashMap<&'static str, ChartData>,
    delay: Duration,
}

#[derive(Default)]
pub(crate) struct MockFleetApi {
    inner: Mutex<Inner>,
}

impl MockFleetApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().expect("mock lock");
        f(&mut inner)
    }

    fn record(&self, call: impl Into<String>) -> Duration {
        self.with(|inner| {
            inner.calls.push(call.into());
            inner.delay
        })
    }

    async fn pause(delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    // ==================== Setup ====================

    pub(crate) fn set_weather(&self, reply: Reply<Option<TelemetryReading>>) {
        self.with(|inner| inner.weather = Some(reply));
    }

    pub(crate) fn set_thresholds(&self, thresholds: Option<ThresholdConfig>) {
        self.with(|inner| inner.thresholds = thresholds);
    }

    pub(crate) fn set_devices(&self, devices: Vec<Device>) {
        self.with(|inner| inner.devices = devices);
    }

    pub(crate) fn set_groups(&self, groups: Vec<Group>) {
        self.with(|inner| inner.groups = groups);
    }

    pub(crate) fn set_channels(&self, dev_eui: &str, channels: DeviceChannels) {
        self.with(|inner| {
            inner.channels.insert(dev_eui.to_string(), channels);
        });
    }

    pub(crate) fn fail_target(&self, id: &str) {
        self.with(|inner| {
            inner.failing.insert(id.to_string());
        });
    }

    pub(crate) fn set_tasks(&self, tasks: Vec<ScheduledTask>) {
        self.with(|inner| inner.tasks = tasks);
    }

    pub(crate) fn push_task_reply(&self, reply: Reply<ScheduledTask>) {
        self.with(|inner| inner.task_replies.push_back(reply));
    }

    pub(crate) fn set_schedule_reply(&self, reply: Reply<ScheduleReceipt>) {
        self.with(|inner| inner.schedule_reply = Some(reply));
    }

    pub(crate) fn fail_cancel(&self) {
        self.with(|inner| inner.cancel_fails = true);
    }

    pub(crate) fn set_battery(&self, dev_eui: &str, volts: f64) {
        self.with(|inner| {
            inner.batteries.insert(dev_eui.to_string(), volts);
        });
    }

    pub(crate) fn set_events(&self, events: Vec<RobotEvent>) {
        self.with(|inner| inner.events = events);
    }

    pub(crate) fn set_counts(&self, counts: Vec<ActiveCount>) {
        self.with(|inner| inner.counts = counts);
    }

    pub(crate) fn set_chart(&self, chart: WeeklyChart, data: ChartData) {
        self.with(|inner| {
            inner.charts.insert(chart.path(), data);
        });
    }

    /// Latency applied to queue and channel calls
    pub(crate) fn set_delay(&self, delay: Duration) {
        self.with(|inner| inner.delay = delay);
    }

    // ==================== Inspection ====================

    pub(crate) fn calls(&self) -> Vec<String> {
        self.with(|inner| inner.calls.clone())
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.with(|inner| inner.calls.iter().filter(|c| c.starts_with(prefix)).count())
    }

    pub(crate) fn clear_calls(&self) {
        self.with(|inner| inner.calls.clear());
    }
}

#[async_trait]
impl FleetApi for MockFleetApi {
    async fn weather(&self) -> Result<Option<TelemetryReading>> {
        self.record("GET /weatherData");
        self.with(|inner| inner.weather.clone())
            .unwrap_or(Reply::Ok(None))
            .into_result()
    }

    async fn thresholds(&self) -> Result<Option<ThresholdConfig>> {
        self.record("GET /weather-thresold");
        Ok(self.with(|inner| inner.thresholds.clone()))
    }

    async fn save_thresholds(&self, thresholds: &ThresholdConfig) -> Result<SavedThresholds> {
        self.record("PUT /weather-thresolds");
        self.with(|inner| inner.thresholds = Some(thresholds.clone()));
        Ok(SavedThresholds {
            message: Some("Thresholds updated".into()),
            thresholds: thresholds.clone(),
        })
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.record("GET /devices");
        Ok(self.with(|inner| inner.devices.clone()))
    }

    async fn device_channels(&self, dev_eui: &str) -> Result<DeviceChannels> {
        let delay = self.record(format!("GET /devices/{dev_eui}/data"));
        Self::pause(delay).await;
        self.with(|inner| {
            if inner.failing.contains(dev_eui) {
                return Err(transport());
            }
            Ok(inner.channels.get(dev_eui).cloned().unwrap_or_default())
        })
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        self.record("GET /multicast-groups");
        Ok(self.with(|inner| {
            inner
                .groups
                .iter()
                .map(|g| Group {
                    devices: Vec::new(),
                    ..g.clone()
                })
                .collect()
        }))
    }

    async fn group_devices(&self) -> Result<Vec<Group>> {
        self.record("GET /groupDevices");
        Ok(self.with(|inner| inner.groups.clone()))
    }

    async fn enqueue_device(&self, dev_eui: &str, item: &QueueItem) -> Result<EnqueueReceipt> {
        let delay = self.record(format!("POST /devices/{dev_eui}/queue {}", item.data));
        Self::pause(delay).await;
        self.with(|inner| {
            if inner.failing.contains(dev_eui) {
                return Err(status(502));
            }
            Ok(EnqueueReceipt {
                id: Some(format!("q-{dev_eui}")),
                f_cnt: Some(0),
            })
        })
    }

    async fn enqueue_group(&self, group_id: &str, item: &QueueItem) -> Result<EnqueueReceipt> {
        let delay = self.record(format!("POST /multicast-groups/{group_id}/queue {}", item.data));
        Self::pause(delay).await;
        self.with(|inner| {
            if inner.failing.contains(group_id) {
                return Err(status(502));
            }
            Ok(EnqueueReceipt::default())
        })
    }

    async fn trigger_all(&self, group_ids: &[String], data: &str) -> Result<()> {
        let delay = self.record(format!("POST /triggerAll {} {data}", group_ids.join(",")));
        Self::pause(delay).await;
        self.with(|inner| {
            if group_ids.iter().any(|id| inner.failing.contains(id)) {
                return Err(status(500));
            }
            Ok(())
        })
    }

    async fn scheduled_tasks(&self) -> Result<Vec<ScheduledTask>> {
        self.record("GET /scheduled-tasks");
        Ok(self.with(|inner| inner.tasks.clone()))
    }

    async fn scheduled_task(&self, task_id: &str) -> Result<ScheduledTask> {
        self.record(format!("GET /scheduled-tasks/{task_id}"));
        self.with(|inner| {
            inner
                .task_replies
                .pop_front()
                .unwrap_or(Reply::Status(404))
                .into_result()
        })
    }

    async fn schedule_downlink(&self, request: &ScheduleRequest) -> Result<ScheduleReceipt> {
        self.record(format!("POST /schedule-downlink {}", request.group_ids.join(",")));
        self.with(|inner| {
            inner
                .schedule_reply
                .clone()
                .unwrap_or_else(|| {
                    Reply::Ok(ScheduleReceipt {
                        task_id: "task-1".into(),
                        scheduled_time: Some(request.schedule_time),
                    })
                })
                .into_result()
        })
    }

    async fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.record(format!("DELETE /scheduled-tasks/{task_id}"));
        self.with(|inner| {
            if inner.cancel_fails {
                return Err(status(500));
            }
            inner.tasks.retain(|t| t.id != task_id);
            Ok(())
        })
    }

    async fn robot_battery(&self, dev_eui: &str) -> Result<Option<f64>> {
        self.record(format!("GET /robot-battery/{dev_eui}"));
        self.with(|inner| {
            if inner.failing.contains(dev_eui) {
                return Err(transport());
            }
            Ok(inner.batteries.get(dev_eui).copied())
        })
    }

    async fn events(&self) -> Result<Vec<RobotEvent>> {
        self.record("GET /events");
        Ok(self.with(|inner| inner.events.clone()))
    }

    async fn events_count(&self) -> Result<u64> {
        self.record("GET /events/count");
        Ok(self.with(|inner| inner.events.len() as u64))
    }

    async fn clear_events(&self) -> Result<()> {
        self.record("GET /events/clear");
        self.with(|inner| inner.events.clear());
        Ok(())
    }

    async fn performance_report(&self, timeframe: Timeframe) -> Result<PerformanceReport> {
        self.record(format!("GET /{}-report", timeframe.label()));
        Ok(PerformanceReport::default())
    }

    async fn download_report(&self, timeframe: Timeframe) -> Result<Vec<u8>> {
        self.record(format!("GET /download-report/{}", timeframe.label()));
        Ok(b"Device,Runs\nR1,3\n".to_vec())
    }

    async fn active_counts(&self, date: Option<NaiveDate>) -> Result<Vec<ActiveCount>> {
        match date {
            Some(date) => self.record(format!("POST /activeCount {date}")),
            None => self.record("GET /activeCount"),
        };
        Ok(self.with(|inner| inner.counts.clone()))
    }

    async fn weekly_chart(&self, chart: WeeklyChart) -> Result<Option<ChartData>> {
        self.record(format!("POST /{}", chart.path()));
        Ok(self.with(|inner| inner.charts.get(chart.path()).cloned()))
    }
}
