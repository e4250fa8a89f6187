//! Dashboard polling synchronizer.
//!
//! One tokio task owns the [`DashboardState`]. Refreshes are requested through
//! a bounded queue shared by the interval timer, the realtime watcher, the
//! approval flow and the UI. The task drains every request that is already
//! queued when a cycle starts, so a burst of triggers costs a single fetch,
//! and cycles never overlap. Each completed cycle publishes a full snapshot
//! over an `mpsc` channel for the TUI event loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use monitor_core::models::{AuditLogQuery, RealtimeEventKind, RunFilter};
use monitor_data::AutomationBackend;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::{DashboardState, FetchOutcome};

// ── Public types ──────────────────────────────────────────────────────────────

/// Why a fetch cycle was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    Timer,
    Realtime(RealtimeEventKind),
    ApprovalAction,
    Manual,
}

impl RefreshReason {
    pub fn label(&self) -> &'static str {
        match self {
            RefreshReason::Startup => "startup",
            RefreshReason::Timer => "timer",
            RefreshReason::Realtime(kind) => kind.as_str(),
            RefreshReason::ApprovalAction => "approval",
            RefreshReason::Manual => "manual",
        }
    }
}

/// Tunables for the synchronizer loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub interval: Duration,
    /// Page size for both the recent audit log and the pending queue.
    pub audit_limit: u32,
    pub run_page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            audit_limit: 50,
            run_page_size: monitor_core::models::DEFAULT_RUN_PAGE_SIZE,
        }
    }
}

/// Capacity of the request queue. When full, the new request is dropped:
/// a cycle is already pending and will pick up the latest data anyway.
const QUEUE_CAPACITY: usize = 8;

/// Cloneable sender side of the refresh queue.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    tx: mpsc::Sender<RefreshReason>,
}

impl RefreshHandle {
    /// A handle plus the receiving end, for callers that drive their own loop.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<RefreshReason>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Ask for a fetch cycle. Returns `false` only if the synchronizer has
    /// shut down.
    pub fn request(&self, reason: RefreshReason) -> bool {
        match self.tx.try_send(reason) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(reason = reason.label(), "refresh already queued; coalescing");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

// ── Synchronizer ──────────────────────────────────────────────────────────────

/// Background dashboard poller.
///
/// Call [`Synchronizer::start`] to spawn the loop; it fetches immediately,
/// then on every interval tick and on every queued request.
pub struct Synchronizer<B: AutomationBackend> {
    backend: Arc<B>,
    config: SyncConfig,
}

impl<B: AutomationBackend> Synchronizer<B> {
    pub fn new(backend: Arc<B>, config: SyncConfig) -> Self {
        Self { backend, config }
    }

    /// Start the loop. Returns the snapshot receiver and a [`SyncHandle`]
    /// for requesting refreshes and stopping the task.
    pub fn start(self) -> (mpsc::Receiver<DashboardState>, SyncHandle) {
        let (tx, rx) = mpsc::channel(16);
        let (refresh, queue) = RefreshHandle::channel(QUEUE_CAPACITY);

        let handle = tokio::spawn(async move {
            self.sync_loop(queue, tx).await;
        });

        (rx, SyncHandle { handle, refresh })
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn sync_loop(
        self,
        mut queue: mpsc::Receiver<RefreshReason>,
        tx: mpsc::Sender<DashboardState>,
    ) {
        let mut state = DashboardState::default();
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.interval.as_secs(),
            "dashboard synchronizer started"
        );

        loop {
            // The first tick completes immediately and becomes the startup cycle.
            let reason = tokio::select! {
                _ = interval.tick() => {
                    if state.cycle == 0 { RefreshReason::Startup } else { RefreshReason::Timer }
                }
                request = queue.recv() => match request {
                    Some(reason) => reason,
                    None => break,
                },
            };

            let mut coalesced = 0usize;
            while queue.try_recv().is_ok() {
                coalesced += 1;
            }

            if tx.is_closed() {
                debug!("dashboard channel closed; exiting loop");
                break;
            }

            debug!(reason = reason.label(), coalesced, "starting fetch cycle");
            let outcome = self.fetch_all().await;
            state.merge(outcome, reason, Utc::now());

            let stale = state.stale_slices();
            if !stale.is_empty() {
                let names: Vec<&str> = stale.iter().map(|s| s.label()).collect();
                warn!(cycle = state.cycle, ?names, "serving stale slices");
            }

            if tx.send(state.clone()).await.is_err() {
                debug!("dashboard receiver dropped; exiting loop");
                break;
            }
        }
    }

    /// Issue every read concurrently; each one fails independently.
    async fn fetch_all(&self) -> FetchOutcome {
        let backend = &self.backend;
        let recent = AuditLogQuery::recent(self.config.audit_limit);
        let pending = AuditLogQuery::pending(self.config.audit_limit);
        let runs = RunFilter {
            limit: self.config.run_page_size,
            ..RunFilter::default()
        };

        let (health, stats, audit_logs, approvals, rules, recent_runs) = tokio::join!(
            backend.health(),
            backend.stats(),
            backend.audit_logs(&recent),
            backend.audit_logs(&pending),
            backend.rules(),
            backend.agent_runs(&runs),
        );

        FetchOutcome {
            health,
            stats,
            audit_logs,
            approvals,
            rules,
            recent_runs,
        }
    }
}

// ── SyncHandle ────────────────────────────────────────────────────────────────

/// Handle to the running synchronizer task.
pub struct SyncHandle {
    handle: JoinHandle<()>,
    refresh: RefreshHandle,
}

impl SyncHandle {
    /// A cloneable sender for refresh requests.
    pub fn refresher(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    pub fn request(&self, reason: RefreshReason) -> bool {
        self.refresh.request(reason)
    }

    /// Immediately abort the loop.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
