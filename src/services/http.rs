//! HTTP Fleet API
//!
//! `FleetApi` over the backend's REST endpoints using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::AppConfig;
use crate::domain::command::{EnqueueReceipt, QueueItem};
use crate::domain::device::{Device, DeviceChannels, Group};
use crate::domain::event_log::{EventCount, RobotEvent};
use crate::domain::report::{
    ActiveCount, ChartData, CountFilter, PerformanceReport, Timeframe, WeeklyChart,
};
use crate::domain::task::{ScheduleReceipt, ScheduleRequest, ScheduledTask};
use crate::domain::telemetry::TelemetryReading;
use crate::domain::threshold::ThresholdConfig;
use crate::error::{Error, Result};
use crate::helpers::lenient;
use crate::services::api::{FleetApi, SavedThresholds};

// ==================== Response envelopes ====================

#[derive(Deserialize)]
struct SuccessData<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartEnvelope {
    #[serde(default)]
    success: bool,
    chart_data: Option<ChartData>,
}

#[derive(Deserialize)]
struct ResultList<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
}

#[derive(Deserialize)]
struct ThresholdResult {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ThresholdConfig>,
}

#[derive(Deserialize)]
struct ThresholdEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Option<ThresholdResult>,
}

#[derive(Deserialize)]
struct ChannelsEnvelope {
    #[serde(default)]
    object: Option<DeviceChannels>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupInfo {
    #[serde(deserialize_with = "lenient::id_string")]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    region: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDevicesEntry {
    group_info: GroupInfo,
    #[serde(default)]
    devices: Vec<Device>,
}

impl From<GroupDevicesEntry> for Group {
    fn from(entry: GroupDevicesEntry) -> Self {
        Group {
            id: entry.group_info.id,
            name: entry.group_info.name,
            region: entry.group_info.region,
            devices: entry.devices,
        }
    }
}

#[derive(Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<ScheduledTask>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatteryEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    battery_percent: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EventList {
    Bare(Vec<RobotEvent>),
    Data { data: Vec<RobotEvent> },
    Result { result: Vec<RobotEvent> },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueBody<'a> {
    queue_item: &'a QueueItem,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerAllBody<'a> {
    group_id: &'a [String],
    data: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ==================== Client ====================

/// reqwest-backed implementation of [`FleetApi`]
#[derive(Debug, Clone)]
pub struct HttpFleetApi {
    client: Client,
    base_url: String,
}

impl HttpFleetApi {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Turn a non-2xx response into `Error::Status`, keeping the backend's message
    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed
            .error
            .or(parsed.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        Err(Error::Status {
            code: status.as_u16(),
            message,
        })
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let url = self.url(path);
        trace!(%method, %url, "backend request");
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::check(request.send().await?).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request::<()>(Method::GET, path, None).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.request(method, path, Some(body)).await?;
        Ok(response.json::<T>().await?)
    }

    /// Queue endpoints sometimes answer with an empty body
    async fn enqueue(&self, path: &str, item: &QueueItem) -> Result<EnqueueReceipt> {
        let response = self
            .request(Method::POST, path, Some(&EnqueueBody { queue_item: item }))
            .await?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(EnqueueReceipt::default());
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            debug!(error = %e, "unrecognized queue receipt");
            EnqueueReceipt::default()
        }))
    }
}

#[async_trait]
impl FleetApi for HttpFleetApi {
    async fn weather(&self) -> Result<Option<TelemetryReading>> {
        let envelope: SuccessData<TelemetryReading> = self.get_json("weatherData").await?;
        Ok(envelope.data.filter(|_| envelope.success))
    }

    async fn thresholds(&self) -> Result<Option<ThresholdConfig>> {
        let envelope: ThresholdEnvelope = self.get_json("weather-thresold").await?;
        if !envelope.success {
            return Ok(None);
        }
        Ok(envelope.result.and_then(|r| r.data))
    }

    async fn save_thresholds(&self, thresholds: &ThresholdConfig) -> Result<SavedThresholds> {
        let envelope: ThresholdEnvelope = self
            .send_json(Method::PUT, "weather-thresolds", thresholds)
            .await?;
        let result = envelope.result.filter(|_| envelope.success).ok_or_else(|| Error::Invalid {
            message: "Backend did not accept the thresholds".into(),
        })?;
        Ok(SavedThresholds {
            message: result.message,
            thresholds: result.data.unwrap_or_else(|| thresholds.clone()),
        })
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let list: ResultList<Device> = self.get_json("devices").await?;
        Ok(list.result)
    }

    async fn device_channels(&self, dev_eui: &str) -> Result<DeviceChannels> {
        let envelope: ChannelsEnvelope = self.get_json(&format!("devices/{dev_eui}/data")).await?;
        Ok(envelope.object.unwrap_or_default())
    }

    async fn groups(&self) -> Result<Vec<Group>> {
        let list: ResultList<Group> = self.get_json("multicast-groups").await?;
        Ok(list.result)
    }

    async fn group_devices(&self) -> Result<Vec<Group>> {
        let envelope: SuccessData<Vec<GroupDevicesEntry>> = self.get_json("groupDevices").await?;
        Ok(envelope
            .data
            .filter(|_| envelope.success)
            .unwrap_or_default()
            .into_iter()
            .map(Group::from)
            .collect())
    }

    async fn enqueue_device(&self, dev_eui: &str, item: &QueueItem) -> Result<EnqueueReceipt> {
        self.enqueue(&format!("devices/{dev_eui}/queue"), item).await
    }

    async fn enqueue_group(&self, group_id: &str, item: &QueueItem) -> Result<EnqueueReceipt> {
        self.enqueue(&format!("multicast-groups/{group_id}/queue"), item)
            .await
    }

    async fn trigger_all(&self, group_ids: &[String], data: &str) -> Result<()> {
        let body = TriggerAllBody {
            group_id: group_ids,
            data,
        };
        self.request(Method::POST, "triggerAll", Some(&body)).await?;
        Ok(())
    }

    async fn scheduled_tasks(&self) -> Result<Vec<ScheduledTask>> {
        let list: TaskList = self.get_json("scheduled-tasks").await?;
        Ok(list.tasks)
    }

    async fn scheduled_task(&self, task_id: &str) -> Result<ScheduledTask> {
        self.get_json(&format!("scheduled-tasks/{task_id}")).await
    }

    async fn schedule_downlink(&self, request: &ScheduleRequest) -> Result<ScheduleReceipt> {
        self.send_json(Method::POST, "schedule-downlink", request)
            .await
    }

    async fn cancel_task(&self, task_id: &str) -> Result<()> {
        self.request::<()>(Method::DELETE, &format!("scheduled-tasks/{task_id}"), None)
            .await?;
        Ok(())
    }

    async fn robot_battery(&self, dev_eui: &str) -> Result<Option<f64>> {
        let envelope: BatteryEnvelope = self.get_json(&format!("robot-battery/{dev_eui}")).await?;
        Ok(envelope.battery_percent.filter(|_| envelope.success))
    }

    async fn events(&self) -> Result<Vec<RobotEvent>> {
        let list: EventList = self.get_json("events").await?;
        Ok(match list {
            EventList::Bare(events)
            | EventList::Data { data: events }
            | EventList::Result { result: events } => events,
        })
    }

    async fn events_count(&self) -> Result<u64> {
        let count: EventCount = self.get_json("events/count").await?;
        Ok(count.value())
    }

    async fn clear_events(&self) -> Result<()> {
        self.request::<()>(Method::GET, "events/clear", None).await?;
        Ok(())
    }

    async fn performance_report(&self, timeframe: Timeframe) -> Result<PerformanceReport> {
        self.get_json(&format!("{}-report", timeframe.label())).await
    }

    async fn download_report(&self, timeframe: Timeframe) -> Result<Vec<u8>> {
        let response = self
            .request::<()>(
                Method::GET,
                &format!("download-report/{}", timeframe.label()),
                None,
            )
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn active_counts(&self, date: Option<NaiveDate>) -> Result<Vec<ActiveCount>> {
        let envelope: SuccessData<Vec<ActiveCount>> = match date {
            Some(date) => {
                self.send_json(Method::POST, "activeCount", &CountFilter { date })
                    .await?
            }
            None => self.get_json("activeCount").await?,
        };
        if !envelope.success {
            return Err(Error::Invalid {
                message: "API returned success: false".into(),
            });
        }
        Ok(envelope.data.unwrap_or_default())
    }

    async fn weekly_chart(&self, chart: WeeklyChart) -> Result<Option<ChartData>> {
        let response = self.request::<()>(Method::POST, chart.path(), None).await?;
        let envelope: ChartEnvelope = response.json().await?;
        Ok(envelope.chart_data.filter(|_| envelope.success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let config = AppConfig {
            backend_url: "http://localhost:5002/api/".into(),
            ..Default::default()
        };
        let api = HttpFleetApi::new(&config).expect("client");
        assert_eq!(api.base_url(), "http://localhost:5002/api");
        assert_eq!(api.url("/devices"), "http://localhost:5002/api/devices");
        assert_eq!(
            api.url("scheduled-tasks/7"),
            "http://localhost:5002/api/scheduled-tasks/7"
        );
    }

    #[test]
    fn test_group_devices_envelope() {
        let json = r#"{"success": true, "data": [
            {"groupInfo": {"id": "g-1", "name": "Block A"}, "deviceCount": 1,
             "devices": [{"devEui": "d1", "name": "R1"}]}
        ]}"#;
        let envelope: SuccessData<Vec<GroupDevicesEntry>> =
            serde_json::from_str(json).expect("decode");
        let groups: Vec<Group> = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(Group::from)
            .collect();
        assert_eq!(groups[0].name, "Block A");
        assert_eq!(groups[0].devices[0].dev_eui, "d1");
    }

    #[test]
    fn test_weather_envelope_without_data() {
        let envelope: SuccessData<TelemetryReading> =
            serde_json::from_str(r#"{"success": false}"#).expect("decode");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_result_list_without_result_is_empty() {
        let devices: ResultList<Device> =
            serde_json::from_str(r#"{"totalCount": 0}"#).expect("decode");
        assert!(devices.result.is_empty());
        let groups: ResultList<Group> = serde_json::from_str(
            r#"{"totalCount": "1", "result": [{"id": "g-1", "name": "Block A"}]}"#,
        )
        .expect("decode");
        assert_eq!(groups.result[0].id, "g-1");
    }

    #[test]
    fn test_chart_envelope() {
        let envelope: ChartEnvelope = serde_json::from_str(
            r#"{"success": true, "chartData": {"xAxis": {"categories": ["Mon"]}, "series": []}}"#,
        )
        .expect("decode");
        assert!(envelope.success);
        let chart = envelope.chart_data.expect("chart");
        assert_eq!(chart.categories(), vec!["Mon"]);
    }

    #[test]
    fn test_enqueue_body_shape() {
        let item = QueueItem::for_action(crate::domain::command::RobotAction::Home);
        let body = serde_json::to_value(EnqueueBody { queue_item: &item }).expect("encode");
        assert_eq!(body["queueItem"]["data"], "BA==");
        assert_eq!(body["queueItem"]["confirmed"], true);
    }

    #[test]
    fn test_trigger_all_body_shape() {
        let ids = vec!["g1".to_string()];
        let body = serde_json::to_value(TriggerAllBody {
            group_id: &ids,
            data: "AQ==",
        })
        .expect("encode");
        assert_eq!(body, serde_json::json!({"groupId": ["g1"], "data": "AQ=="}));
    }
}
