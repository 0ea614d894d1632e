//! Service Hub
//!
//! Central orchestrator for all services. Builds the backend client and the
//! shared state, owns the poll scheduler, and hands out the event receiver.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::domain::threshold::ThresholdEvaluator;
use crate::error::Result;
use crate::services::api::FleetApi;
use crate::services::context::ServiceContext;
use crate::services::dispatcher::CommandDispatcher;
use crate::services::events::ServiceEvent;
use crate::services::http::HttpFleetApi;
use crate::services::poller::TelemetryPoller;
use crate::services::scheduler::PollScheduler;
use crate::state::{DisabledDevices, FleetState, WeatherState};

/// Central hub for all console services
pub struct ServiceHub {
    ctx: ServiceContext,
    poller: Arc<TelemetryPoller>,
    dispatcher: Arc<CommandDispatcher>,
    scheduler: Arc<Mutex<PollScheduler>>,
    config: Arc<AppConfig>,
    /// Event receiver (for the console front end)
    rx: Receiver<ServiceEvent>,
}

impl ServiceHub {
    /// Create a hub talking to the configured backend over HTTP
    pub fn new(config: AppConfig) -> Result<Self> {
        let api = Arc::new(HttpFleetApi::new(&config)?);
        let disabled = DisabledDevices::load(config.disabled_devices_path()?);
        Ok(Self::assemble(api, config, disabled))
    }

    /// Create a hub over any backend implementation
    pub fn with_api(api: Arc<dyn FleetApi>, config: AppConfig) -> Self {
        Self::assemble(api, config, DisabledDevices::in_memory())
    }

    fn assemble(api: Arc<dyn FleetApi>, config: AppConfig, disabled: DisabledDevices) -> Self {
        let (tx, rx): (Sender<ServiceEvent>, _) = crossbeam_channel::unbounded();

        let ctx = ServiceContext::new(
            api,
            WeatherState::new(ThresholdEvaluator::new(config.wind_speed_unit)),
            FleetState::new(config.activity_window()),
            disabled,
            tx,
        );
        let poller = Arc::new(TelemetryPoller::new(ctx.clone()));
        let dispatcher = Arc::new(CommandDispatcher::new(
            ctx.clone(),
            config.task_watch.clone(),
        ));
        let scheduler = Arc::new(Mutex::new(PollScheduler::new(
            poller.clone(),
            config.poll.clone(),
        )));

        Self {
            ctx,
            poller,
            dispatcher,
            scheduler,
            config: Arc::new(config),
            rx,
        }
    }

    /// Get the event receiver
    ///
    /// Events from all services are multiplexed into this single channel.
    pub fn events(&self) -> Receiver<ServiceEvent> {
        self.rx.clone()
    }

    /// Start background polling
    pub async fn start(&self) {
        tracing::info!(backend = %self.config.backend_url, "Starting services");
        self.scheduler.lock().await.start();
    }

    /// Stop background polling and wait for it to wind down
    pub async fn stop(&self) {
        tracing::info!("Stopping services");
        self.scheduler.lock().await.stop().await;
    }

    pub async fn is_polling(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    pub fn poller(&self) -> &TelemetryPoller {
        &self.poller
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Clone for ServiceHub {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            poller: self.poller.clone(),
            dispatcher: self.dispatcher.clone(),
            scheduler: self.scheduler.clone(),
            config: self.config.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl std::fmt::Debug for ServiceHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHub")
            .field("backend", &self.config.backend_url)
            .field("poller", &self.poller)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
