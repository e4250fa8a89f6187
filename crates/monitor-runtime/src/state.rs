//! Published dashboard state and the per-slice merge rule.
//!
//! Every fetch cycle produces a [`FetchOutcome`] in which each slice is
//! `Some` (fresh data) or `None` (that sub-fetch failed). [`DashboardState::merge`]
//! replaces only the fresh slices; failed ones keep their last good value and
//! bump a failure counter, so the UI shows stale data instead of an empty panel.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use monitor_core::models::{AgentRun, AuditLogEntry, HealthStatus, Rule, RunStatusCounts, Stats};

use crate::synchronizer::RefreshReason;

/// Independently fetched parts of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slice {
    Health,
    Stats,
    AuditLogs,
    Approvals,
    Rules,
    RecentRuns,
}

impl Slice {
    pub const ALL: [Slice; 6] = [
        Slice::Health,
        Slice::Stats,
        Slice::AuditLogs,
        Slice::Approvals,
        Slice::Rules,
        Slice::RecentRuns,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Slice::Health => "health",
            Slice::Stats => "stats",
            Slice::AuditLogs => "audit log",
            Slice::Approvals => "approvals",
            Slice::Rules => "rules",
            Slice::RecentRuns => "agent runs",
        }
    }
}

/// Freshness bookkeeping for one slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceHealth {
    /// Failed sub-fetches since the last success.
    pub consecutive_failures: u32,
    /// When the slice was last replaced with fresh data.
    pub last_updated: Option<DateTime<Utc>>,
}

impl SliceHealth {
    pub fn is_stale(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Result of one fan-out; `None` marks a failed sub-fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub health: Option<HealthStatus>,
    pub stats: Option<Stats>,
    pub audit_logs: Option<Vec<AuditLogEntry>>,
    pub approvals: Option<Vec<AuditLogEntry>>,
    pub rules: Option<Vec<Rule>>,
    pub recent_runs: Option<Vec<AgentRun>>,
}

/// Everything the dashboard renders, as last synchronised with the backend.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub health: Option<HealthStatus>,
    pub stats: Stats,
    pub audit_logs: Vec<AuditLogEntry>,
    /// Audit entries still awaiting a decision.
    pub approvals: Vec<AuditLogEntry>,
    pub rules: Vec<Rule>,
    pub recent_runs: Vec<AgentRun>,
    /// Number of completed fetch cycles.
    pub cycle: u64,
    /// What triggered the most recent cycle.
    pub last_reason: Option<RefreshReason>,
    /// Last cycle in which at least one slice succeeded.
    pub last_success: Option<DateTime<Utc>>,
    slices: BTreeMap<Slice, SliceHealth>,
}

impl DashboardState {
    /// Fold one cycle's outcome into the state.
    pub fn merge(&mut self, outcome: FetchOutcome, reason: RefreshReason, now: DateTime<Utc>) {
        let FetchOutcome {
            health,
            stats,
            audit_logs,
            approvals,
            rules,
            recent_runs,
        } = outcome;

        let approvals = approvals.map(|mut entries| {
            // The queue only ever shows pending entries, even if the backend
            // ignores the status filter.
            entries.retain(AuditLogEntry::is_pending);
            entries
        });

        let mut any_success = false;
        any_success |= self.apply(Slice::Health, health.map(Some), now, |s| &mut s.health);
        any_success |= self.apply(Slice::Stats, stats, now, |s| &mut s.stats);
        any_success |= self.apply(Slice::AuditLogs, audit_logs, now, |s| &mut s.audit_logs);
        any_success |= self.apply(Slice::Approvals, approvals, now, |s| &mut s.approvals);
        any_success |= self.apply(Slice::Rules, rules, now, |s| &mut s.rules);
        any_success |= self.apply(Slice::RecentRuns, recent_runs, now, |s| &mut s.recent_runs);

        self.cycle += 1;
        self.last_reason = Some(reason);
        if any_success {
            self.last_success = Some(now);
        }
    }

    fn apply<T>(
        &mut self,
        slice: Slice,
        fresh: Option<T>,
        now: DateTime<Utc>,
        slot: impl FnOnce(&mut Self) -> &mut T,
    ) -> bool {
        match fresh {
            Some(value) => {
                *slot(self) = value;
                let h = self.slices.entry(slice).or_default();
                h.consecutive_failures = 0;
                h.last_updated = Some(now);
                true
            }
            None => {
                self.slices.entry(slice).or_default().consecutive_failures += 1;
                false
            }
        }
    }

    pub fn slice_health(&self, slice: Slice) -> SliceHealth {
        self.slices.get(&slice).cloned().unwrap_or_default()
    }

    /// Slices whose most recent sub-fetch failed.
    pub fn stale_slices(&self) -> Vec<Slice> {
        Slice::ALL
            .into_iter()
            .filter(|s| self.slice_health(*s).is_stale())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.approvals.len()
    }

    pub fn run_counts(&self) -> RunStatusCounts {
        RunStatusCounts::from_runs(&self.recent_runs)
    }

    /// `true` once any slice has been loaded at least once.
    pub fn has_data(&self) -> bool {
        self.slices.values().any(|h| h.last_updated.is_some())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
