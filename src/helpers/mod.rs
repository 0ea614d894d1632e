//! Helper Utilities
//!
//! Common utilities used across the crate.

mod fs;
pub mod lenient;

pub use fs::*;
