//! Poll Scheduler
//!
//! One background task owns every polling cadence. Each tick fetches once
//! and writes the shared state before the next tick is considered, so the
//! feeds never interleave their writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::config::PollConfig;
use crate::services::poller::TelemetryPoller;

struct Running {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct PollScheduler {
    poller: Arc<TelemetryPoller>,
    config: PollConfig,
    running: Option<Running>,
}

impl PollScheduler {
    pub fn new(poller: Arc<TelemetryPoller>, config: PollConfig) -> Self {
        Self {
            poller,
            config,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Spawn the polling loop; returns false if it is already running
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(self.poller.clone(), self.config.clone(), shutdown_rx));
        self.running = Some(Running {
            shutdown_tx,
            handle,
        });
        true
    }

    /// Signal shutdown and wait for the loop to exit
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.handle.await {
            warn!("Poll scheduler task ended abnormally: {e}");
        }
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown_tx.send(true);
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run(poller: Arc<TelemetryPoller>, config: PollConfig, mut shutdown_rx: watch::Receiver<bool>) {
    info!(
        weather_secs = config.weather_secs,
        activity_secs = config.activity_secs,
        dashboard_secs = config.dashboard_secs,
        "Poll scheduler started"
    );

    if let Err(e) = poller.refresh_thresholds().await {
        warn!("Initial threshold fetch failed: {e}");
    }

    // all three fire immediately on the first pass
    let mut weather = ticker(config.weather());
    let mut activity = ticker(config.activity());
    let mut dashboard = ticker(config.dashboard());

    loop {
        tokio::select! {
            biased;
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = weather.tick() => {
                poller.poll_weather().await;
            }
            _ = dashboard.tick() => {
                poller.poll_dashboard().await;
                if let Err(e) = poller.refresh_thresholds().await {
                    warn!("Threshold refresh failed: {e}");
                }
            }
            _ = activity.tick() => {
                poller.poll_activity().await;
            }
        }
    }
    info!("Poll scheduler stopped");
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish()
    }
}
