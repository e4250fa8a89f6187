//! Runtime layer for the automation monitor.
//!
//! Background tasks that keep the dashboard in sync with the backend: the
//! polling synchronizer, the realtime channel, the agent run browser and the
//! approval action flow.

pub mod agent_runs;
pub mod approvals;
pub mod realtime;
pub mod state;
pub mod synchronizer;

#[cfg(test)]
pub(crate) mod testing;

pub use agent_runs::{AgentRunBrowser, DetailState, RunBrowserCommand, RunBrowserHandle, RunBrowserState};
pub use approvals::{spawn_decision, submit_decision, DecisionOutcome};
pub use realtime::{spawn_refresh_watcher, RealtimeChannel, RealtimeHandle, RealtimeStatus};
pub use state::{DashboardState, Slice};
pub use synchronizer::{RefreshHandle, RefreshReason, SyncConfig, SyncHandle, Synchronizer};

pub use monitor_core as core;
pub use monitor_data as data;
