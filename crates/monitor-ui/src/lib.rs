//! Terminal UI layer for the automation monitor.
//!
//! Themes, header and indicator components, one view per tab (overview,
//! audit log, approvals, rules, agent runs) and the root [`app::App`] shell
//! that ties them to the runtime, all rendered with [`ratatui`].

pub mod agents_view;
pub mod app;
pub mod approvals_view;
pub mod audit_view;
pub mod components;
pub mod overview_view;
pub mod rules_view;
pub mod themes;

pub use monitor_core as core;
