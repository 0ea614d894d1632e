//! Task Status Watcher
//!
//! Polls one scheduled task until it reaches a terminal status, the backend
//! says it is gone (404) or broken (5xx), or the watch budget runs out.

use chrono::Utc;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

use crate::config::TaskWatchConfig;
use crate::domain::task::{ScheduledTask, TaskStatus};
use crate::services::context::ServiceContext;
use crate::services::events::{Notification, NotificationLevel, ServiceEvent};

/// Why a watch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Terminal(TaskStatus),
    NotFound,
    ServerError(u16),
    BudgetElapsed,
}

impl WatchOutcome {
    pub fn label(&self) -> String {
        match self {
            WatchOutcome::Terminal(status) => status.label().to_string(),
            WatchOutcome::NotFound => "task not found".into(),
            WatchOutcome::ServerError(code) => format!("server error {code}"),
            WatchOutcome::BudgetElapsed => "watch budget elapsed".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskStatusWatcher {
    ctx: ServiceContext,
    config: TaskWatchConfig,
}

impl TaskStatusWatcher {
    pub fn new(ctx: ServiceContext, config: TaskWatchConfig) -> Self {
        Self { ctx, config }
    }

    pub async fn watch(&self, task_id: &str) -> WatchOutcome {
        let start = Instant::now();
        let deadline = sleep_until(start + self.config.budget());
        tokio::pin!(deadline);

        let period = self.config.interval();
        let mut ticker = interval_at(start + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(task_id, "Watching task");
        loop {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    info!(task_id, "Stopped watching task after {:?}", self.config.budget());
                    return WatchOutcome::BudgetElapsed;
                }
                _ = ticker.tick() => {}
            }

            if let Some(outcome) = self.poll_once(task_id).await {
                return outcome;
            }
        }
    }

    /// One status fetch; `Some` ends the watch
    async fn poll_once(&self, task_id: &str) -> Option<WatchOutcome> {
        match self.ctx.api.scheduled_task(task_id).await {
            Ok(task) => self.on_task(task_id, task).await,
            Err(e) => match e.status() {
                Some(404) => {
                    self.notify_once(
                        task_id,
                        Notification::error(
                            "Task Not Found",
                            "The scheduled task could not be found. It may have been deleted.",
                        ),
                    )
                    .await;
                    Some(WatchOutcome::NotFound)
                }
                Some(code) if code >= 500 => {
                    self.notify_once(
                        task_id,
                        Notification::error(
                            "Server Error",
                            "Unable to check task status due to a server error. Please check the task list later.",
                        ),
                    )
                    .await;
                    Some(WatchOutcome::ServerError(code))
                }
                _ => {
                    warn!(task_id, "Transient task status failure: {e}");
                    None
                }
            },
        }
    }

    async fn on_task(&self, task_id: &str, mut task: ScheduledTask) -> Option<WatchOutcome> {
        let status = task.status;
        let (first_terminal, announce) = {
            let mut tasks = self.ctx.tasks.write().await;
            if task.group_names.is_empty() {
                if let Some(known) = tasks.get(task_id) {
                    task.group_names = known.group_names.clone();
                }
            }
            tasks.upsert(task.clone());

            let due_soon = status == TaskStatus::Scheduled
                && task
                    .seconds_until(Utc::now())
                    .is_some_and(|secs| (0..self.config.soon_secs).contains(&secs));
            (
                status.is_terminal() && tasks.mark_notified(task_id),
                due_soon && tasks.mark_announced(task_id),
            )
        };
        self.ctx.emit(ServiceEvent::TaskUpdated(task.clone()));

        if status.is_terminal() {
            info!(task_id, status = status.label(), "Task finished");
            if first_terminal {
                if let Some((title, message)) = task.terminal_message() {
                    let level = match status {
                        TaskStatus::Completed => NotificationLevel::Success,
                        TaskStatus::Skipped => NotificationLevel::Warning,
                        _ => NotificationLevel::Error,
                    };
                    self.ctx
                        .notify(
                            Notification::new(level, title, message)
                                .with_key(format!("task-{}-{task_id}", status.label())),
                        )
                        .await;
                }
            }
            return Some(WatchOutcome::Terminal(status));
        }

        if announce {
            let secs = task.seconds_until(Utc::now()).unwrap_or(0).max(0);
            self.ctx
                .notify(Notification::info(
                    "Task Executing Soon",
                    format!("Task will execute in {secs} seconds"),
                ))
                .await;
        }
        None
    }

    async fn notify_once(&self, task_id: &str, notification: Notification) {
        let first = self.ctx.tasks.write().await.mark_notified(task_id);
        if first {
            self.ctx.notify(notification).await;
        }
    }
}
