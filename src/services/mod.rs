//! Service Layer
//!
//! Talks to the fleet backend, keeps the shared state current and turns
//! operator intent into downlinks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         ServiceHub                           │
//! │  ┌───────────────┐  ┌────────────────────┐  ┌─────────────┐  │
//! │  │ PollScheduler │─▶│  TelemetryPoller   │  │ Dispatcher  │  │
//! │  │  (cadences)   │  │ (weather/activity) │  │ (+ watcher) │  │
//! │  └───────────────┘  └────────────────────┘  └─────────────┘  │
//! │                 FleetApi (HTTP backend)                      │
//! └──────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼ ServiceEvent
//! ┌──────────────────────────────────────────────────────────────┐
//! │           State Layer (WeatherState, FleetState, ...)        │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
mod context;
mod dispatcher;
mod events;
mod http;
mod hub;
mod poller;
mod scheduler;
mod supervisor;
mod watcher;

pub use api::{FleetApi, SavedThresholds};
pub use context::*;
pub use dispatcher::*;
pub use events::*;
pub use http::*;
pub use hub::*;
pub use poller::*;
pub use scheduler::*;
pub use supervisor::*;
pub use watcher::*;
