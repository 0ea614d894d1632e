//! Utilities - Formatting Helpers for Console Output

mod format;

pub use format::*;
