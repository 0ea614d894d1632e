//! Command Dispatcher
//!
//! Turns a robot action into downlink queue requests. Motion actions are
//! refused while the weather gate is closed, every action kind allows one
//! request in flight, and scheduled downlinks get a status watcher.

use std::sync::atomic::{AtomicBool, Ordering};

use ahash::AHashSet;
use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TaskWatchConfig;
use crate::domain::command::{
    DispatchOutcome, DispatchReport, DispatchTarget, QueueItem, RobotAction,
};
use crate::domain::task::{ScheduleRequest, ScheduledTask};
use crate::error::{Error, Result};
use crate::services::context::ServiceContext;
use crate::services::events::Notification;
use crate::services::watcher::{TaskStatusWatcher, WatchOutcome};
use crate::utils::format_time;

/// Clears its busy flag when dropped
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, action: &str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| BusyGuard(flag))
            .map_err(|_| Error::Busy {
                action: action.to_string(),
            })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A freshly scheduled task and the watcher following it
#[derive(Debug)]
pub struct TaskWatch {
    pub task: ScheduledTask,
    pub handle: JoinHandle<WatchOutcome>,
}

pub struct CommandDispatcher {
    ctx: ServiceContext,
    watch_config: TaskWatchConfig,
    /// One flag per `RobotAction`
    busy: [AtomicBool; RobotAction::ALL.len()],
    scheduling: AtomicBool,
    /// Groups with a status refresh outstanding
    refreshing: Mutex<AHashSet<String>>,
}

impl CommandDispatcher {
    pub fn new(ctx: ServiceContext, watch_config: TaskWatchConfig) -> Self {
        Self {
            ctx,
            watch_config,
            busy: std::array::from_fn(|_| AtomicBool::new(false)),
            scheduling: AtomicBool::new(false),
            refreshing: Mutex::new(AHashSet::new()),
        }
    }

    /// Whether a request for `action` is currently outstanding
    pub fn is_busy(&self, action: RobotAction) -> bool {
        self.busy[action.index()].load(Ordering::Acquire)
    }

    // ==================== Immediate commands ====================

    /// Send `action` to every target.
    ///
    /// Refusals (no targets, weather gate, disabled robot, already busy)
    /// happen before any request is made. Partial delivery is reported as
    /// `Ok` with `DispatchOutcome::Partial`; only a total failure is an error.
    pub async fn dispatch(
        &self,
        target: &DispatchTarget,
        action: RobotAction,
    ) -> Result<DispatchReport> {
        if target.is_empty() {
            let err = Error::validation(format!("Please select at least one {}", target.kind()));
            self.ctx
                .notify(Notification::warning("Nothing Selected", err.to_string()))
                .await;
            return Err(err);
        }

        if action.is_motion() {
            self.check_weather().await?;
            self.check_not_disabled(target).await?;
        }

        let _busy = BusyGuard::acquire(&self.busy[action.index()], action.label())?;
        let request_id = Uuid::new_v4().to_string();
        info!(
            request_id = %request_id,
            action = %action,
            kind = target.kind(),
            targets = target.ids().len(),
            "Dispatching command"
        );

        let toggled = self.apply_disabled(target, action).await;

        let item = QueueItem::for_action(action);
        let api = &self.ctx.api;
        let results = join_all(target.ids().iter().map(|id| {
            let item = &item;
            async move {
                let result = match target {
                    DispatchTarget::Devices(_) => api.enqueue_device(id, item).await,
                    DispatchTarget::Groups(_) => api.enqueue_group(id, item).await,
                };
                (id.clone(), result)
            }
        }))
        .await;

        let mut report = DispatchReport {
            request_id,
            action,
            delivered: Vec::new(),
            failed: Vec::new(),
        };
        for (id, result) in results {
            match result {
                Ok(receipt) => report.delivered.push((id, receipt)),
                Err(e) => {
                    warn!(request_id = %report.request_id, target = %id, "Downlink failed: {e}");
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        self.revert_disabled(&toggled, &report, action).await;
        self.report(target, &report).await?;
        Ok(report)
    }

    pub async fn set_robot_enabled(&self, dev_eui: &str, enabled: bool) -> Result<DispatchReport> {
        let action = if enabled {
            RobotAction::Enable
        } else {
            RobotAction::Disable
        };
        self.dispatch(&DispatchTarget::Devices(vec![dev_eui.to_string()]), action)
            .await
    }

    /// Ask every robot in a group to report its status
    pub async fn refresh_group(&self, group_id: &str) -> Result<()> {
        if group_id.trim().is_empty() {
            return Err(Error::validation("Please select a group"));
        }
        if !self.refreshing.lock().await.insert(group_id.to_string()) {
            return Err(Error::Busy {
                action: format!("refresh {group_id}"),
            });
        }

        let payload = RobotAction::Refresh.payload();
        let result = self
            .ctx
            .api
            .trigger_all(&[group_id.to_string()], &payload)
            .await;
        self.refreshing.lock().await.remove(group_id);

        let name = self.group_label(&[group_id.to_string()]).await;
        match &result {
            Ok(()) => {
                self.ctx
                    .notify(Notification::info(
                        "Status Requested",
                        format!("Requested status from group {name}"),
                    ))
                    .await
            }
            Err(e) => {
                self.ctx
                    .notify(Notification::error(
                        "Refresh Failed",
                        format!("Failed to refresh group {name}: {e}"),
                    ))
                    .await
            }
        }
        result
    }

    async fn check_weather(&self) -> Result<()> {
        let warnings = {
            let weather = self.ctx.weather.read().await;
            if !weather.operations_disabled() {
                return Ok(());
            }
            weather.warnings().to_vec()
        };
        let err = Error::WeatherGated { warnings };
        self.ctx
            .notify(Notification::warning("Weather Alert", err.to_string()))
            .await;
        Err(err)
    }

    async fn check_not_disabled(&self, target: &DispatchTarget) -> Result<()> {
        let DispatchTarget::Devices(ids) = target else {
            return Ok(());
        };
        let disabled = self.ctx.disabled.read().await;
        match ids.iter().find(|id| disabled.contains(id)) {
            Some(id) => Err(Error::RobotDisabled {
                dev_eui: id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Optimistically record enable/disable for device targets.
    ///
    /// Returns the ids whose cached state actually changed.
    async fn apply_disabled(&self, target: &DispatchTarget, action: RobotAction) -> Vec<String> {
        let (DispatchTarget::Devices(ids), Some(disable)) = (target, disable_flag(action)) else {
            return Vec::new();
        };
        let mut disabled = self.ctx.disabled.write().await;
        let changed: Vec<String> = ids
            .iter()
            .filter(|id| disabled.set_disabled(id, disable))
            .cloned()
            .collect();
        if !changed.is_empty() {
            if let Err(e) = disabled.save() {
                warn!("Failed to persist disabled devices: {e}");
            }
        }
        changed
    }

    /// Undo the optimistic change for robots that did not get the command
    async fn revert_disabled(&self, toggled: &[String], report: &DispatchReport, action: RobotAction) {
        let Some(disable) = disable_flag(action) else {
            return;
        };
        let failed: Vec<&String> = toggled
            .iter()
            .filter(|id| report.failed.iter().any(|(f, _)| f == *id))
            .collect();
        if failed.is_empty() {
            return;
        }
        let mut disabled = self.ctx.disabled.write().await;
        for id in failed {
            disabled.set_disabled(id, !disable);
        }
        if let Err(e) = disabled.save() {
            warn!("Failed to persist disabled devices: {e}");
        }
    }

    async fn report(&self, target: &DispatchTarget, report: &DispatchReport) -> Result<()> {
        let action = report.action;
        if report.delivered.is_empty() {
            self.ctx
                .notify(Notification::error(
                    "Command Failed",
                    format!("Failed to send {} command", action.label()),
                ))
                .await;
            return Err(Error::Dispatch {
                action: action.label().to_string(),
            });
        }

        let delivered: Vec<String> = report.delivered_ids().map(str::to_string).collect();
        let message = match (target, action) {
            (DispatchTarget::Devices(_), RobotAction::Enable) => "Robot successfully enabled".to_string(),
            (DispatchTarget::Devices(_), RobotAction::Disable) => {
                "Robot successfully disabled".to_string()
            }
            (DispatchTarget::Groups(_), _) => format!(
                "Successfully sent {} command to group {}",
                action.label(),
                self.group_label(&delivered).await
            ),
            (DispatchTarget::Devices(_), _) => format!(
                "Successfully sent {} command to {} robot(s)",
                action.label(),
                delivered.len()
            ),
        };

        match report.outcome() {
            DispatchOutcome::Complete => {
                self.ctx
                    .notify(Notification::success("Command Sent", message))
                    .await
            }
            DispatchOutcome::Partial => {
                let unreachable: Vec<&str> = report.failed.iter().map(|(id, _)| id.as_str()).collect();
                self.ctx
                    .notify(Notification::warning(
                        "Command Partially Sent",
                        format!(
                            "{message}; {} of {} {} target(s) unreachable: {}",
                            report.failed.len(),
                            target.ids().len(),
                            target.kind(),
                            unreachable.join(", ")
                        ),
                    ))
                    .await
            }
        }
        Ok(())
    }

    async fn group_label(&self, ids: &[String]) -> String {
        self.ctx.fleet.read().await.group_names(ids).join(", ")
    }

    // ==================== Scheduled commands ====================

    /// Schedule a downlink for `group_ids` and start watching it
    pub async fn schedule_task(
        &self,
        group_ids: Vec<String>,
        schedule_time: DateTime<Utc>,
    ) -> Result<TaskWatch> {
        if group_ids.is_empty() {
            return Err(Error::validation("Please select at least one group"));
        }
        if schedule_time <= Utc::now() {
            return Err(Error::validation("Schedule time must be in the future"));
        }
        let _busy = BusyGuard::acquire(&self.scheduling, "schedule")?;

        let request = ScheduleRequest {
            group_ids,
            schedule_time,
        };
        let receipt = match self.ctx.api.schedule_downlink(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                let message = match &e {
                    Error::Status { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                self.ctx
                    .notify(Notification::error("Cannot Schedule Downlink", message))
                    .await;
                return Err(e);
            }
        };

        let mut task = receipt.into_task(&request);
        task.group_names = self.ctx.fleet.read().await.group_names(&task.group_ids);
        self.ctx.tasks.write().await.upsert(task.clone());

        let at = task
            .schedule_time
            .unwrap_or(request.schedule_time)
            .with_timezone(&Local);
        info!(task_id = %task.id, groups = ?task.group_ids, "Task scheduled");
        self.ctx
            .notify(Notification::info(
                "Task Scheduled",
                format!("Task scheduled for {}. Monitoring status...", format_time(&at)),
            ))
            .await;

        let watcher = TaskStatusWatcher::new(self.ctx.clone(), self.watch_config.clone());
        let task_id = task.id.clone();
        let handle = tokio::spawn(async move { watcher.watch(&task_id).await });
        Ok(TaskWatch { task, handle })
    }

    /// Delete a task, then reload the task list whatever the outcome
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let result = self.ctx.api.cancel_task(task_id).await;
        match &result {
            Ok(()) => {
                self.ctx
                    .notify(Notification::success(
                        "Task Cancelled",
                        "Scheduled task cancelled successfully",
                    ))
                    .await
            }
            Err(e) => {
                self.ctx
                    .notify(Notification::error(
                        "Cancel Failed",
                        format!("Error cancelling task: {e}"),
                    ))
                    .await
            }
        }
        if let Err(e) = self.refresh_tasks().await {
            warn!("Task list refresh after cancel failed: {e}");
        }
        result
    }

    pub async fn refresh_tasks(&self) -> Result<Vec<ScheduledTask>> {
        match self.ctx.api.scheduled_tasks().await {
            Ok(tasks) => {
                self.ctx.tasks.write().await.replace_all(tasks.clone());
                Ok(tasks)
            }
            Err(e) => {
                self.ctx
                    .notify(Notification::error(
                        "Task List Unavailable",
                        "Error fetching scheduled tasks.",
                    ))
                    .await;
                Err(e)
            }
        }
    }
}

/// `Some(true)` for disable, `Some(false)` for enable
fn disable_flag(action: RobotAction) -> Option<bool> {
    match action {
        RobotAction::Disable => Some(true),
        RobotAction::Enable => Some(false),
        _ => None,
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let busy: Vec<&str> = RobotAction::ALL
            .iter()
            .filter(|a| self.is_busy(**a))
            .map(|a| a.label())
            .collect();
        f.debug_struct("CommandDispatcher")
            .field("busy", &busy)
            .field("scheduling", &self.scheduling.load(Ordering::Acquire))
            .finish()
    }
}
