//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, format_last_sync, format_relative_timestamp, truncate_string};
