//! Service Context
//!
//! Handles shared by every service: the backend client, the state modules
//! and the event channel.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tokio::sync::RwLock;

use crate::services::api::FleetApi;
use crate::services::events::{Notification, NotificationLevel, ServiceEvent};
use crate::state::{DisabledDevices, FleetState, NotificationState, TasksState, WeatherState};

#[derive(Clone)]
pub struct ServiceContext {
    pub api: Arc<dyn FleetApi>,
    pub weather: Arc<RwLock<WeatherState>>,
    pub fleet: Arc<RwLock<FleetState>>,
    pub tasks: Arc<RwLock<TasksState>>,
    pub disabled: Arc<RwLock<DisabledDevices>>,
    pub notifications: Arc<RwLock<NotificationState>>,
    tx: Sender<ServiceEvent>,
}

impl ServiceContext {
    pub fn new(
        api: Arc<dyn FleetApi>,
        weather: WeatherState,
        fleet: FleetState,
        disabled: DisabledDevices,
        tx: Sender<ServiceEvent>,
    ) -> Self {
        Self {
            api,
            weather: Arc::new(RwLock::new(weather)),
            fleet: Arc::new(RwLock::new(fleet)),
            tasks: Arc::new(RwLock::new(TasksState::default())),
            disabled: Arc::new(RwLock::new(disabled)),
            notifications: Arc::new(RwLock::new(NotificationState::default())),
            tx,
        }
    }

    pub fn sender(&self) -> Sender<ServiceEvent> {
        self.tx.clone()
    }

    pub fn emit(&self, event: ServiceEvent) {
        let _ = self.tx.send(event);
    }

    /// Record, log and publish a notification
    pub async fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                tracing::error!(title = %notification.title, "{}", notification.message)
            }
            NotificationLevel::Warning => {
                tracing::warn!(title = %notification.title, "{}", notification.message)
            }
            _ => tracing::info!(title = %notification.title, "{}", notification.message),
        }
        self.notifications.write().await.push(notification.clone());
        self.emit(ServiceEvent::Notify(notification));
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::services::api::mock::MockFleetApi;
    use crossbeam_channel::Receiver;

    /// Context over a fresh mock, plus the mock and the event receiver
    pub(crate) fn context() -> (ServiceContext, Arc<MockFleetApi>, Receiver<ServiceEvent>) {
        let mock = Arc::new(MockFleetApi::new());
        let (tx, rx) = crossbeam_channel::unbounded();
        let ctx = ServiceContext::new(
            mock.clone(),
            WeatherState::default(),
            FleetState::default(),
            DisabledDevices::in_memory(),
            tx,
        );
        (ctx, mock, rx)
    }

    /// Notification titles seen on the channel so far
    pub(crate) fn titles(rx: &Receiver<ServiceEvent>) -> Vec<String> {
        rx.try_iter()
            .filter_map(|e| match e {
                ServiceEvent::Notify(n) => Some(n.title.to_string()),
                _ => None,
            })
            .collect()
    }
}
