//! Telemetry Poller
//!
//! Fetches weather, device activity and fleet inventory, and publishes the
//! results into shared state. Poll methods never fail: fetch problems are
//! turned into connectivity warnings and the next tick simply tries again.

use std::sync::Arc;

use ahash::AHashSet;
use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::{CONNECTIVITY_FAILED, CONNECTIVITY_NO_DATA, GROUP_STATUS_DEVICE_LIMIT};
use crate::domain::battery::{BatteryBoard, RobotBattery};
use crate::domain::device::{DashboardSummary, DeviceChannels};
use crate::domain::fault::FaultReport;
use crate::domain::report::{ChartData, WeeklyChart};
use crate::domain::threshold::{Evaluation, ThresholdConfig};
use crate::error::{Error, Result};
use crate::services::api::SavedThresholds;
use crate::services::context::ServiceContext;
use crate::services::events::{Notification, ServiceEvent};
use crate::services::supervisor::Supervisor;

pub struct TelemetryPoller {
    ctx: ServiceContext,
    weather_feed: Supervisor,
    activity_feed: Supervisor,
    dashboard_feed: Supervisor,
    /// Devices whose channel fetch is still outstanding
    in_flight: Arc<Mutex<AHashSet<String>>>,
}

impl TelemetryPoller {
    pub fn new(ctx: ServiceContext) -> Self {
        let tx = ctx.sender();
        Self {
            weather_feed: Supervisor::new("weather", tx.clone()),
            activity_feed: Supervisor::new("activity", tx.clone()),
            dashboard_feed: Supervisor::new("dashboard", tx),
            in_flight: Arc::new(Mutex::new(AHashSet::new())),
            ctx,
        }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    // ==================== Weather ====================

    /// Fetch the current weather and re-evaluate the gate
    pub async fn poll_weather(&self) -> Evaluation {
        let (reading, connectivity) = match self.ctx.api.weather().await {
            Ok(Some(reading)) => {
                self.weather_feed.on_success();
                (Some(reading), None)
            }
            Ok(None) => {
                self.weather_feed.on_success();
                (None, Some(CONNECTIVITY_NO_DATA))
            }
            Err(e) => {
                warn!("Weather fetch failed: {e}");
                self.weather_feed.on_failure(&e.to_string());
                (None, Some(CONNECTIVITY_FAILED))
            }
        };

        let (evaluation, was_disabled) = {
            let mut weather = self.ctx.weather.write().await;
            let was_disabled = weather.operations_disabled();
            weather.set_connectivity(connectivity.map(str::to_string));
            (weather.set_reading(reading).clone(), was_disabled)
        };
        self.publish(&evaluation, was_disabled).await;
        evaluation
    }

    async fn publish(&self, evaluation: &Evaluation, was_disabled: bool) {
        self.ctx.emit(ServiceEvent::WeatherEvaluated {
            warnings: evaluation.warnings().to_vec(),
            operations_disabled: evaluation.operations_disabled(),
        });
        match (was_disabled, evaluation.operations_disabled()) {
            (false, true) => {
                self.ctx
                    .notify(Notification::warning(
                        "Weather Alert",
                        evaluation.warnings().join("\n"),
                    ))
                    .await
            }
            (true, false) => {
                self.ctx
                    .notify(Notification::info(
                        "Weather Cleared",
                        "Robot operations are available again",
                    ))
                    .await
            }
            _ => {}
        }
    }

    /// Reload thresholds from the backend and re-evaluate
    pub async fn refresh_thresholds(&self) -> Result<Option<ThresholdConfig>> {
        let thresholds = self.ctx.api.thresholds().await?;
        if thresholds.is_none() {
            debug!("No thresholds configured; weather gate stays open");
        }
        let (evaluation, was_disabled) = {
            let mut weather = self.ctx.weather.write().await;
            let was_disabled = weather.operations_disabled();
            (weather.set_thresholds(thresholds.clone()).clone(), was_disabled)
        };
        self.publish(&evaluation, was_disabled).await;
        Ok(thresholds)
    }

    /// Store new thresholds, then fetch them back
    pub async fn save_thresholds(&self, thresholds: &ThresholdConfig) -> Result<SavedThresholds> {
        if let Some(field) = thresholds.first_negative() {
            return Err(Error::validation(format!("{field} threshold cannot be negative")));
        }
        let saved = match self.ctx.api.save_thresholds(thresholds).await {
            Ok(saved) => saved,
            Err(e) => {
                self.ctx
                    .notify(Notification::error(
                        "Threshold Update Failed",
                        format!("Failed to update thresholds: {e}"),
                    ))
                    .await;
                return Err(e);
            }
        };
        self.ctx
            .notify(Notification::success(
                "Thresholds Updated",
                saved
                    .message
                    .as_deref()
                    .unwrap_or("Thresholds updated successfully"),
            ))
            .await;
        if let Err(e) = self.refresh_thresholds().await {
            warn!("Re-fetch after threshold save failed: {e}");
        }
        Ok(saved)
    }

    // ==================== Activity ====================

    /// Refresh group membership and per-device running flags.
    ///
    /// Returns the number of running robots.
    pub async fn poll_activity(&self) -> usize {
        let groups = match self.ctx.api.group_devices().await {
            Ok(groups) => {
                self.activity_feed.on_success();
                groups
            }
            Err(e) => {
                warn!("Group device fetch failed: {e}");
                self.activity_feed.on_failure(&e.to_string());
                return self.ctx.fleet.read().await.running_count();
            }
        };

        let candidates: Vec<String> = groups
            .iter()
            .flat_map(|g| {
                g.devices
                    .iter()
                    .take(GROUP_STATUS_DEVICE_LIMIT)
                    .map(|d| d.dev_eui.clone())
            })
            .collect();
        let results = self.fetch_channels(candidates).await;

        let (running, total) = {
            let mut fleet = self.ctx.fleet.write().await;
            fleet.set_group_members(groups);
            for (dev_eui, channels) in results {
                fleet.set_channels(&dev_eui, channels);
            }
            (fleet.running_count(), fleet.member_count())
        };
        self.ctx
            .emit(ServiceEvent::ActivityRefreshed { running, total });
        running
    }

    /// Fetch channels for `candidates`, skipping devices with a fetch already
    /// outstanding. A failed fetch yields `None`.
    async fn fetch_channels(&self, candidates: Vec<String>) -> Vec<(String, Option<DeviceChannels>)> {
        let claimed: Vec<String> = {
            let mut in_flight = self.in_flight.lock().await;
            candidates
                .into_iter()
                .filter(|id| in_flight.insert(id.clone()))
                .collect()
        };

        let api = &self.ctx.api;
        let results = join_all(claimed.iter().map(|dev_eui| async move {
            let channels = match api.device_channels(dev_eui).await {
                Ok(channels) => Some(channels),
                Err(e) => {
                    debug!(dev_eui = %dev_eui, "channel fetch failed: {e}");
                    None
                }
            };
            (dev_eui.clone(), channels)
        }))
        .await;

        let mut in_flight = self.in_flight.lock().await;
        for dev_eui in &claimed {
            in_flight.remove(dev_eui);
        }
        results
    }

    // ==================== Faults ====================

    /// Scan the whole device inventory for CH7 faults, grouped or not
    pub async fn poll_faults(&self) -> Result<Vec<FaultReport>> {
        let devices = self.ctx.api.devices().await?;
        let candidates = devices.iter().map(|d| d.dev_eui.clone()).collect();
        let results = self.fetch_channels(candidates).await;

        let mut fleet = self.ctx.fleet.write().await;
        fleet.set_devices(devices, Utc::now());
        for (dev_eui, channels) in results {
            fleet.set_channels(&dev_eui, channels);
        }
        let faults = fleet.faults();
        info!(faulted = faults.len(), "Fault scan finished");
        Ok(faults)
    }

    // ==================== Dashboard ====================

    /// Refresh groups and devices and rebuild the fleet summary
    pub async fn poll_dashboard(&self) -> Option<DashboardSummary> {
        let (groups, devices) = futures::join!(self.ctx.api.groups(), self.ctx.api.devices());
        let (groups, devices) = match (groups, devices) {
            (Ok(groups), Ok(devices)) => (groups, devices),
            (Err(e), _) | (_, Err(e)) => {
                warn!("Dashboard refresh failed: {e}");
                self.dashboard_feed.on_failure(&e.to_string());
                return None;
            }
        };
        self.dashboard_feed.on_success();

        let summary = self
            .ctx
            .fleet
            .write()
            .await
            .set_inventory(devices, groups, Utc::now())
            .clone();
        info!(
            groups = summary.group_count,
            devices = summary.device_total,
            active = summary.active_count(),
            "Dashboard refreshed"
        );
        self.ctx.emit(ServiceEvent::DashboardRefreshed {
            groups: summary.group_count,
            devices: summary.device_total,
            active: summary.active_count(),
            inactive: summary.inactive_count(),
        });
        Some(summary)
    }

    // ==================== Battery ====================

    /// Battery voltage for every grouped robot; unreachable robots show as offline
    pub async fn battery_board(&self) -> Result<BatteryBoard> {
        let groups = self.ctx.api.group_devices().await?;
        let api = &self.ctx.api;
        let readings = join_all(groups.iter().flat_map(|group| {
            group.devices.iter().map(move |device| async move {
                let voltage = api.robot_battery(&device.dev_eui).await.unwrap_or_else(|e| {
                    debug!(dev_eui = %device.dev_eui, "battery fetch failed: {e}");
                    None
                });
                RobotBattery {
                    dev_eui: device.dev_eui.clone(),
                    name: device.display_name().to_string(),
                    description: device.description.clone(),
                    group_name: group.name.clone(),
                    voltage,
                }
            })
        }))
        .await;
        Ok(BatteryBoard::from_readings(readings))
    }
}

impl TelemetryPoller {
    /// Weekly trend chart, or `None` when there is nothing to plot
    pub async fn weekly_chart(&self, chart: WeeklyChart) -> Result<Option<ChartData>> {
        let data = self.ctx.api.weekly_chart(chart).await?;
        if data.is_none() {
            debug!(chart = chart.label(), "weekly chart unavailable");
        }
        Ok(data.filter(|d| !d.categories().is_empty()))
    }
}

impl std::fmt::Debug for TelemetryPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryPoller")
            .field("weather", &self.weather_feed)
            .field("activity", &self.activity_feed)
            .field("dashboard", &self.dashboard_feed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::device::{Device, Group};
    use crate::domain::fault::RobotFault;
    use crate::domain::telemetry::TelemetryReading;
    use crate::services::api::mock::Reply;
    use crate::services::context::testing::{context, titles};

    fn limits() -> ThresholdConfig {
        ThresholdConfig {
            rain_gauge: Some(5.0),
            wind_speed: Some(10.0),
            ..Default::default()
        }
    }

    fn reading(rain: f64, wind: f64) -> TelemetryReading {
        TelemetryReading {
            rain_gauge: Some(rain),
            wind_speed: Some(wind),
            ..Default::default()
        }
    }

    fn group(id: &str, devices: &[&str]) -> Group {
        Group {
            id: id.into(),
            name: format!("Block {id}"),
            region: None,
            devices: devices
                .iter()
                .map(|d| Device {
                    dev_eui: d.to_string(),
                    name: d.to_uppercase(),
                    description: Some(format!("Row {d}")),
                    last_seen_at: None,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_weather_poll_raises_gate() {
        let (ctx, mock, rx) = context();
        mock.set_thresholds(Some(limits()));
        mock.set_weather(Reply::Ok(Some(reading(7.0, 4.0))));
        let poller = TelemetryPoller::new(ctx.clone());

        poller.refresh_thresholds().await.expect("thresholds");
        let evaluation = poller.poll_weather().await;

        assert_eq!(
            evaluation.warnings(),
            ["Rain gauge (7mm) exceeds threshold (5mm)"]
        );
        assert!(ctx.weather.read().await.operations_disabled());
        assert!(titles(&rx).contains(&"Weather Alert".to_string()));
    }

    #[tokio::test]
    async fn test_weather_failure_fails_open() {
        let (ctx, mock, _rx) = context();
        mock.set_thresholds(Some(limits()));
        mock.set_weather(Reply::Ok(Some(reading(7.0, 4.0))));
        let poller = TelemetryPoller::new(ctx.clone());
        poller.refresh_thresholds().await.expect("thresholds");
        poller.poll_weather().await;

        mock.set_weather(Reply::Transport);
        let evaluation = poller.poll_weather().await;

        assert!(!evaluation.operations_disabled());
        let weather = ctx.weather.read().await;
        assert_eq!(weather.connectivity_warning(), Some(CONNECTIVITY_FAILED));
        assert_eq!(weather.display_reading(), TelemetryReading::placeholder());
    }

    #[tokio::test]
    async fn test_missing_weather_data_is_not_a_failure() {
        let (ctx, mock, _rx) = context();
        mock.set_weather(Reply::Ok(None));
        let poller = TelemetryPoller::new(ctx.clone());
        poller.poll_weather().await;
        assert_eq!(
            ctx.weather.read().await.connectivity_warning(),
            Some(CONNECTIVITY_NO_DATA)
        );
        assert_eq!(mock.count("GET /weatherData"), 1);
    }

    #[tokio::test]
    async fn test_save_thresholds_refetches() {
        let (ctx, mock, rx) = context();
        let poller = TelemetryPoller::new(ctx);
        poller.save_thresholds(&limits()).await.expect("save");
        assert_eq!(
            mock.calls(),
            ["PUT /weather-thresolds", "GET /weather-thresold"]
        );
        assert!(titles(&rx).contains(&"Thresholds Updated".to_string()));
    }

    #[tokio::test]
    async fn test_negative_threshold_rejected_without_call() {
        let (ctx, mock, _rx) = context();
        let poller = TelemetryPoller::new(ctx);
        let bad = ThresholdConfig {
            humidity: Some(-1.0),
            ..Default::default()
        };
        let err = poller.save_thresholds(&bad).await.expect_err("negative");
        assert!(matches!(err, Error::Validation { .. }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_activity_marks_failed_fetch_not_running() {
        let (ctx, mock, _rx) = context();
        mock.set_groups(vec![group("1", &["a", "b", "c"])]);
        mock.set_channels(
            "a",
            DeviceChannels {
                ch2: Some(1.0),
                ch7: None,
            },
        );
        mock.fail_target("b");
        let poller = TelemetryPoller::new(ctx.clone());

        assert_eq!(poller.poll_activity().await, 1);
        let fleet = ctx.fleet.read().await;
        assert!(fleet.is_running("a"));
        assert!(!fleet.is_running("b"));
        assert!(!fleet.is_running("c"));
    }

    #[tokio::test]
    async fn test_activity_caps_devices_per_group() {
        let (ctx, mock, _rx) = context();
        let ids: Vec<String> = (0..60).map(|i| format!("d{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        mock.set_groups(vec![group("1", &refs)]);
        let poller = TelemetryPoller::new(ctx);

        poller.poll_activity().await;
        assert_eq!(mock.count("GET /devices/"), GROUP_STATUS_DEVICE_LIMIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_skips_devices_already_in_flight() {
        let (ctx, mock, _rx) = context();
        mock.set_groups(vec![group("1", &["a", "b"])]);
        mock.set_delay(Duration::from_secs(2));
        let poller = Arc::new(TelemetryPoller::new(ctx));

        let first = tokio::spawn({
            let poller = poller.clone();
            async move { poller.poll_activity().await }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        poller.poll_activity().await;
        first.await.expect("join");

        assert_eq!(mock.count("GET /devices/a/data"), 1);
        assert_eq!(mock.count("GET /devices/b/data"), 1);
    }

    #[tokio::test]
    async fn test_dashboard_summary() {
        let (ctx, mock, rx) = context();
        let now = Utc::now();
        mock.set_groups(vec![group("1", &[]), group("2", &[])]);
        mock.set_devices(vec![
            Device {
                dev_eui: "a".into(),
                name: "A".into(),
                description: None,
                last_seen_at: Some(now - chrono::Duration::minutes(3)),
            },
            Device {
                dev_eui: "b".into(),
                name: "B".into(),
                description: None,
                last_seen_at: Some(now - chrono::Duration::hours(2)),
            },
        ]);
        let poller = TelemetryPoller::new(ctx);

        let summary = poller.poll_dashboard().await.expect("summary");
        assert_eq!(summary.group_count, 2);
        assert_eq!(summary.active_count(), 1);
        assert_eq!(summary.inactive_count(), 1);
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, ServiceEvent::DashboardRefreshed { active: 1, .. })));
    }

    #[tokio::test]
    async fn test_regroup_keeps_running_within_total() {
        let (ctx, mock, rx) = context();
        mock.set_groups(vec![group("1", &["a", "b"])]);
        mock.set_channels(
            "a",
            DeviceChannels {
                ch2: Some(1.0),
                ch7: None,
            },
        );
        let poller = TelemetryPoller::new(ctx.clone());
        assert_eq!(poller.poll_activity().await, 1);

        // a leaves every group
        mock.set_groups(vec![group("1", &["b"])]);
        assert_eq!(poller.poll_activity().await, 0);
        assert!(!ctx.fleet.read().await.is_running("a"));
        let last = rx
            .try_iter()
            .filter_map(|e| match e {
                ServiceEvent::ActivityRefreshed { running, total } => Some((running, total)),
                _ => None,
            })
            .last();
        assert_eq!(last, Some((0, 1)));
    }

    #[tokio::test]
    async fn test_fault_scan_covers_ungrouped_robots() {
        let (ctx, mock, _rx) = context();
        mock.set_groups(vec![group("1", &["a"])]);
        mock.set_devices(vec![
            Device {
                dev_eui: "a".into(),
                name: "A".into(),
                description: None,
                last_seen_at: None,
            },
            Device {
                dev_eui: "loose".into(),
                name: "Loose".into(),
                description: Some("Yard".into()),
                last_seen_at: None,
            },
        ]);
        mock.set_channels(
            "loose",
            DeviceChannels {
                ch2: Some(0.0),
                ch7: Some(0b1001),
            },
        );
        let poller = TelemetryPoller::new(ctx);

        let faults = poller.poll_faults().await.expect("faults");
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].robot_name, "Loose");
        assert_eq!(faults[0].location.as_deref(), Some("Yard"));
        assert_eq!(
            faults[0].faults,
            vec![RobotFault::Encoder, RobotFault::LowBattery]
        );
        assert_eq!(mock.count("GET /devices/loose/data"), 1);
    }

    #[tokio::test]
    async fn test_battery_board_keeps_group_order() {
        let (ctx, mock, _rx) = context();
        mock.set_groups(vec![group("2", &["c"]), group("1", &["a", "b"])]);
        mock.set_battery("a", 19.5);
        mock.set_battery("b", 26.0);
        mock.set_battery("c", 22.0);
        let poller = TelemetryPoller::new(ctx);

        let board = poller.battery_board().await.expect("board");
        let blocks: Vec<_> = board.blocks().map(|(name, _)| name.as_str()).collect();
        assert_eq!(blocks, vec!["Block 2", "Block 1"]);
        let csv = board.to_csv().expect("csv");
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Block,Robot Name,batteryVolt",
                "Row c,C,22",
                "Row a,A,19.5",
                "Row b,B,26",
            ]
        );
    }

    #[tokio::test]
    async fn test_weekly_chart_without_categories_is_empty() {
        let (ctx, mock, _rx) = context();
        let panels: ChartData = serde_json::from_str(
            r#"{"xAxis": {"categories": ["Mon", "Tue"]}, "series": [{"name": "A", "data": [5, 7]}]}"#,
        )
        .expect("chart");
        mock.set_chart(WeeklyChart::Panels, panels);
        mock.set_chart(WeeklyChart::Battery, ChartData::default());
        let poller = TelemetryPoller::new(ctx);

        let chart = poller
            .weekly_chart(WeeklyChart::Panels)
            .await
            .expect("panels")
            .expect("data");
        assert_eq!(chart.rows()[1], ("Tue".to_string(), vec![Some(7.0)]));
        assert!(poller
            .weekly_chart(WeeklyChart::Battery)
            .await
            .expect("battery")
            .is_none());
        assert_eq!(
            mock.calls(),
            ["POST /robot-panels-report/weekly", "POST /robot-battery-report/weekly"]
        );
    }

    #[tokio::test]
    async fn test_battery_board_marks_unreachable_offline() {
        let (ctx, mock, _rx) = context();
        mock.set_groups(vec![group("1", &["a", "b"])]);
        mock.set_battery("a", 24.5);
        mock.fail_target("b");
        let poller = TelemetryPoller::new(ctx);

        let board = poller.battery_board().await.expect("board");
        assert_eq!(board.robot_count(), 2);
        let csv = board.to_csv().expect("csv");
        assert!(csv.contains("Row a,A,24.5"));
        assert!(csv.contains("Row b,B,N/A"));
    }
}
