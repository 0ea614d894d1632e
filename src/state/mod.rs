//! State - Shared Console State
//!
//! Each module owns one piece of state written by a single service and
//! read by everyone else. Services hold them behind `Arc<RwLock<_>>`.

pub mod disabled_state;
pub mod fleet_state;
pub mod notification_state;
pub mod tasks_state;
pub mod weather_state;

pub use disabled_state::DisabledDevices;
pub use fleet_state::FleetState;
pub use notification_state::{NotificationEntry, NotificationState};
pub use tasks_state::TasksState;
pub use weather_state::WeatherState;
