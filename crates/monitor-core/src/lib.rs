//! Shared domain layer for the automation monitor.
//!
//! Holds the backend entity models, the error taxonomy, CLI settings with
//! persisted preferences, and the formatting / timestamp helpers used by the
//! runtime and UI crates.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;

pub use error::{MonitorError, Result};
