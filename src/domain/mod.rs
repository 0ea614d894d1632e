//! Domain - Pure Data Structures and Protocol Types
//!
//! These types don't perform I/O and represent the fleet operations domain.

pub mod battery;
pub mod command;
pub mod device;
pub mod event_log;
pub mod fault;
pub mod report;
pub mod task;
pub mod telemetry;
pub mod threshold;
