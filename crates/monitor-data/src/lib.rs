//! Backend access layer for the automation monitor.
//!
//! Wraps the automation backend's REST API in [`client::ApiClient`] and
//! exposes it to the runtime through the [`backend::AutomationBackend`] trait.

pub mod backend;
pub mod client;

pub use backend::AutomationBackend;
pub use client::ApiClient;
pub use monitor_core as core;
