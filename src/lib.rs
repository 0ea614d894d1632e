//! SCR Ops Library
//!
//! Operations core for fleets of solar-panel cleaning robots on a LoRaWAN
//! network server: weather-gated command dispatch, device activity and
//! battery monitoring, and scheduled downlinks watched to completion.

pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod helpers;
pub mod services;
pub mod state;
pub mod utils;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use services::ServiceHub;
