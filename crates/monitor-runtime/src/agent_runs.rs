//! Agent run browser: filtered run list with a drill-down detail view.
//!
//! [`RunBrowserState`] is pure and holds the rules for which responses may be
//! applied. Every list fetch gets a [`ListTicket`]; a response is applied only
//! if it belongs to the current filter generation and is newer than the last
//! applied one, so a slow response for an old filter can never overwrite the
//! list for the new one. [`AgentRunBrowser`] drives the state from a tokio
//! task with its own polling interval and publishes it through `watch`.

use std::sync::Arc;
use std::time::Duration;

use monitor_core::models::{AgentRun, AgentRunDetail, RunFilter, RunStatus, RunStatusCounts};
use monitor_data::AutomationBackend;
use tokio::sync::{mpsc, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

// ── State ─────────────────────────────────────────────────────────────────────

/// Identifies one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTicket {
    pub seq: u64,
    pub generation: u64,
    pub filter: RunFilter,
}

/// Drill-down panel state.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum DetailState {
    #[default]
    Closed,
    Loading(String),
    Loaded(AgentRunDetail),
    /// The detail fetch failed and nothing was loaded before.
    Unavailable(String),
}

impl DetailState {
    pub fn run_id(&self) -> Option<&str> {
        match self {
            DetailState::Closed => None,
            DetailState::Loading(id) | DetailState::Unavailable(id) => Some(id),
            DetailState::Loaded(detail) => Some(&detail.run.id),
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DetailState::Closed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunBrowserState {
    pub filter: RunFilter,
    /// Selectable agent types, loaded once.
    pub agent_types: Vec<String>,
    pub runs: Vec<AgentRun>,
    /// A list request for the current filter is in flight.
    pub loading: bool,
    /// The most recent list request failed; `runs` may be stale.
    pub last_fetch_failed: bool,
    pub detail: DetailState,
    generation: u64,
    issued_seq: u64,
    applied_seq: u64,
}

impl RunBrowserState {
    pub fn new(page_size: u32) -> Self {
        Self {
            filter: RunFilter {
                limit: page_size,
                ..RunFilter::default()
            },
            ..Self::default()
        }
    }

    /// Replace the filter. An unchanged filter is a no-op; a changed one
    /// invalidates every outstanding list request and clears the list.
    pub fn set_filter(&mut self, filter: RunFilter) -> bool {
        if filter == self.filter {
            return false;
        }
        self.filter = filter;
        self.generation += 1;
        self.runs.clear();
        self.last_fetch_failed = false;
        true
    }

    pub fn begin_list_fetch(&mut self) -> ListTicket {
        self.issued_seq += 1;
        self.loading = true;
        ListTicket {
            seq: self.issued_seq,
            generation: self.generation,
            filter: self.filter.clone(),
        }
    }

    /// Apply a list response. Returns `true` if it was accepted.
    ///
    /// `None` (failed fetch) keeps the current list.
    pub fn apply_list(&mut self, ticket: &ListTicket, runs: Option<Vec<AgentRun>>) -> bool {
        if ticket.generation != self.generation || ticket.seq <= self.applied_seq {
            debug!(
                seq = ticket.seq,
                generation = ticket.generation,
                "discarding stale run list response"
            );
            return false;
        }
        if ticket.seq == self.issued_seq {
            self.loading = false;
        }
        match runs {
            Some(runs) => {
                self.runs = runs;
                self.applied_seq = ticket.seq;
                self.last_fetch_failed = false;
                true
            }
            None => {
                self.last_fetch_failed = true;
                false
            }
        }
    }

    pub fn open_detail(&mut self, run_id: &str) {
        self.detail = DetailState::Loading(run_id.to_string());
    }

    /// Apply a detail response; responses for a run that is no longer
    /// selected are discarded.
    pub fn apply_detail(&mut self, run_id: &str, detail: Option<AgentRunDetail>) -> bool {
        if self.detail.run_id() != Some(run_id) {
            return false;
        }
        match detail {
            Some(detail) => {
                self.detail = DetailState::Loaded(detail);
                true
            }
            None => {
                if matches!(self.detail, DetailState::Loading(_)) {
                    self.detail = DetailState::Unavailable(run_id.to_string());
                }
                false
            }
        }
    }

    /// Back to the list; the list itself is untouched.
    pub fn close_detail(&mut self) {
        self.detail = DetailState::Closed;
    }

    pub fn status_counts(&self) -> RunStatusCounts {
        RunStatusCounts::from_runs(&self.runs)
    }

    /// Filter with the agent type advanced: all, then each known type, then all again.
    pub fn next_type_filter(&self) -> RunFilter {
        let next = match &self.filter.agent_type {
            None => self.agent_types.first().cloned(),
            Some(current) => self
                .agent_types
                .iter()
                .position(|t| t == current)
                .and_then(|i| self.agent_types.get(i + 1))
                .cloned(),
        };
        RunFilter {
            agent_type: next,
            ..self.filter.clone()
        }
    }

    /// Filter with the status advanced: all, then each filterable status.
    pub fn next_status_filter(&self) -> RunFilter {
        let statuses = RunStatus::FILTERABLE;
        let next = match self.filter.status {
            None => statuses.first().copied(),
            Some(current) => statuses
                .iter()
                .position(|s| *s == current)
                .and_then(|i| statuses.get(i + 1))
                .copied(),
        };
        RunFilter {
            status: next,
            ..self.filter.clone()
        }
    }
}

// ── Driver ────────────────────────────────────────────────────────────────────

/// Requests from the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum RunBrowserCommand {
    SetFilter(RunFilter),
    Open(String),
    Close,
    Refresh,
}

enum FetchResult {
    Types(Option<Vec<String>>),
    List(ListTicket, Option<Vec<AgentRun>>),
    Detail(String, Option<AgentRunDetail>),
}

pub struct AgentRunBrowser<B: AutomationBackend> {
    backend: Arc<B>,
    interval: Duration,
    page_size: u32,
}

impl<B: AutomationBackend> AgentRunBrowser<B> {
    pub fn new(backend: Arc<B>, interval: Duration, page_size: u32) -> Self {
        Self {
            backend,
            interval,
            page_size,
        }
    }

    pub fn start(self) -> (watch::Receiver<RunBrowserState>, RunBrowserHandle) {
        let (state_tx, state_rx) = watch::channel(RunBrowserState::new(self.page_size));
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let handle = tokio::spawn(async move {
            self.browse_loop(cmd_rx, state_tx).await;
        });

        (
            state_rx,
            RunBrowserHandle {
                commands: cmd_tx,
                handle,
            },
        )
    }

    async fn browse_loop(
        self,
        mut commands: mpsc::Receiver<RunBrowserCommand>,
        state_tx: watch::Sender<RunBrowserState>,
    ) {
        let (result_tx, mut results) = mpsc::channel::<FetchResult>(32);
        let mut state = RunBrowserState::new(self.page_size);

        {
            let backend = self.backend.clone();
            let tx = result_tx.clone();
            tokio::spawn(async move {
                let _ = tx.send(FetchResult::Types(backend.agent_types().await)).await;
            });
        }

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "agent run browser started");

        loop {
            tokio::select! {
                _ = interval.tick() => self.spawn_list(&mut state, &result_tx),
                command = commands.recv() => match command {
                    None => break,
                    Some(RunBrowserCommand::SetFilter(filter)) => {
                        if state.set_filter(filter) {
                            self.spawn_list(&mut state, &result_tx);
                        }
                    }
                    Some(RunBrowserCommand::Open(id)) => {
                        state.open_detail(&id);
                        self.spawn_detail(id, &result_tx);
                    }
                    Some(RunBrowserCommand::Close) => state.close_detail(),
                    Some(RunBrowserCommand::Refresh) => {
                        self.spawn_list(&mut state, &result_tx);
                        if let Some(id) = state.detail.run_id() {
                            self.spawn_detail(id.to_string(), &result_tx);
                        }
                    }
                },
                Some(result) = results.recv() => match result {
                    FetchResult::Types(Some(types)) => state.agent_types = types,
                    FetchResult::Types(None) => {}
                    FetchResult::List(ticket, runs) => {
                        state.apply_list(&ticket, runs);
                    }
                    FetchResult::Detail(id, detail) => {
                        state.apply_detail(&id, detail);
                    }
                },
            }

            if state_tx.send(state.clone()).is_err() {
                debug!("run browser receiver dropped; exiting loop");
                break;
            }
        }
    }

    fn spawn_list(&self, state: &mut RunBrowserState, results: &mpsc::Sender<FetchResult>) {
        let ticket = state.begin_list_fetch();
        let backend = self.backend.clone();
        let tx = results.clone();
        tokio::spawn(async move {
            let runs = backend.agent_runs(&ticket.filter).await;
            let _ = tx.send(FetchResult::List(ticket, runs)).await;
        });
    }

    fn spawn_detail(&self, run_id: String, results: &mpsc::Sender<FetchResult>) {
        let backend = self.backend.clone();
        let tx = results.clone();
        tokio::spawn(async move {
            let detail = backend.agent_run(&run_id).await;
            let _ = tx.send(FetchResult::Detail(run_id, detail)).await;
        });
    }
}

/// Handle to the run browser task.
pub struct RunBrowserHandle {
    commands: mpsc::Sender<RunBrowserCommand>,
    handle: JoinHandle<()>,
}

impl RunBrowserHandle {
    /// Queue a command; `false` if the browser has stopped or is saturated.
    pub fn send(&self, command: RunBrowserCommand) -> bool {
        self.commands.try_send(command).is_ok()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Abort handle that outlives this handle being moved into the UI.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.abort_handle()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{run, ScriptedBackend};
    use monitor_core::models::{AgentStep, StepStatus};

    fn forecast_failed() -> RunFilter {
        RunFilter {
            agent_type: Some("forecast".to_string()),
            status: Some(RunStatus::Failed),
            limit: 20,
        }
    }

    fn detail(id: &str) -> AgentRunDetail {
        AgentRunDetail {
            run: run(id, "forecast", RunStatus::Failed),
            steps: vec![AgentStep {
                step_index: 0,
                step_name: "load".to_string(),
                status: StepStatus::Failed,
                started_at: None,
                completed_at: None,
                error: Some("timeout".to_string()),
            }],
        }
    }

    async fn wait_for(
        rx: &mut watch::Receiver<RunBrowserState>,
        pred: impl FnMut(&RunBrowserState) -> bool,
    ) -> RunBrowserState {
        time::timeout(Duration::from_secs(5), rx.wait_for(pred))
            .await
            .expect("timed out waiting for browser state")
            .expect("browser stopped")
            .clone()
    }

    // ── pure state ────────────────────────────────────────────────────────

    #[test]
    fn test_default_filter_uses_page_size() {
        let state = RunBrowserState::new(20);
        assert_eq!(state.filter.limit, 20);
        assert_eq!(state.filter.agent_type, None);
        assert_eq!(state.filter.status, None);
    }

    #[test]
    fn test_response_for_old_filter_is_discarded() {
        let mut state = RunBrowserState::new(20);
        let old = state.begin_list_fetch();

        assert!(state.set_filter(forecast_failed()));
        let new = state.begin_list_fetch();

        assert!(state.apply_list(&new, Some(vec![run("f1", "forecast", RunStatus::Failed)])));
        assert!(!state.apply_list(&old, Some(vec![run("x", "reconcile", RunStatus::Running)])));

        assert_eq!(state.runs.len(), 1);
        assert_eq!(state.runs[0].id, "f1");
        assert!(!state.loading);
    }

    #[test]
    fn test_out_of_order_same_filter_keeps_newest() {
        let mut state = RunBrowserState::new(20);
        let first = state.begin_list_fetch();
        let second = state.begin_list_fetch();

        assert!(state.apply_list(&second, Some(vec![run("new", "a", RunStatus::Completed)])));
        assert!(!state.apply_list(&first, Some(vec![run("old", "a", RunStatus::Running)])));
        assert_eq!(state.runs[0].id, "new");
    }

    #[test]
    fn test_failed_list_keeps_runs() {
        let mut state = RunBrowserState::new(20);
        let t = state.begin_list_fetch();
        state.apply_list(&t, Some(vec![run("a", "x", RunStatus::Running)]));

        let t = state.begin_list_fetch();
        assert!(!state.apply_list(&t, None));
        assert_eq!(state.runs.len(), 1);
        assert!(state.last_fetch_failed);
        assert!(!state.loading);
    }

    #[test]
    fn test_unchanged_filter_is_noop() {
        let mut state = RunBrowserState::new(20);
        let t = state.begin_list_fetch();
        state.apply_list(&t, Some(vec![run("a", "x", RunStatus::Running)]));

        assert!(!state.set_filter(state.filter.clone()));
        assert_eq!(state.runs.len(), 1);
    }

    #[test]
    fn test_detail_lifecycle() {
        let mut state = RunBrowserState::new(20);
        let t = state.begin_list_fetch();
        state.apply_list(&t, Some(vec![run("r1", "forecast", RunStatus::Failed)]));

        state.open_detail("r1");
        assert_eq!(state.detail, DetailState::Loading("r1".to_string()));
        assert!(!state.apply_detail("r2", Some(detail("r2"))));
        assert!(state.apply_detail("r1", Some(detail("r1"))));
        assert!(matches!(state.detail, DetailState::Loaded(_)));

        // A failed refresh of an already loaded detail keeps it.
        assert!(!state.apply_detail("r1", None));
        assert!(matches!(state.detail, DetailState::Loaded(_)));

        state.close_detail();
        assert!(!state.detail.is_open());
        assert_eq!(state.runs.len(), 1);
        assert!(!state.apply_detail("r1", Some(detail("r1"))));
    }

    #[test]
    fn test_missing_detail_is_unavailable() {
        let mut state = RunBrowserState::new(20);
        state.open_detail("gone");
        state.apply_detail("gone", None);
        assert_eq!(state.detail, DetailState::Unavailable("gone".to_string()));
    }

    #[test]
    fn test_status_counts() {
        let mut state = RunBrowserState::new(20);
        let t = state.begin_list_fetch();
        state.apply_list(
            &t,
            Some(vec![
                run("1", "a", RunStatus::Running),
                run("2", "a", RunStatus::Failed),
                run("3", "b", RunStatus::Failed),
            ]),
        );
        let counts = state.status_counts();
        assert_eq!(counts.get(RunStatus::Failed), 2);
        assert_eq!(counts.get(RunStatus::Running), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_filter_cycling_wraps_to_all() {
        let mut state = RunBrowserState::new(20);
        state.agent_types = vec!["forecast".to_string(), "reconcile".to_string()];

        let f = state.next_type_filter();
        assert_eq!(f.agent_type.as_deref(), Some("forecast"));
        state.set_filter(f);
        let f = state.next_type_filter();
        assert_eq!(f.agent_type.as_deref(), Some("reconcile"));
        state.set_filter(f);
        assert_eq!(state.next_type_filter().agent_type, None);

        let mut status = state.next_status_filter();
        assert_eq!(status.status, Some(RunStatus::FILTERABLE[0]));
        for _ in 0..RunStatus::FILTERABLE.len() {
            state.set_filter(status);
            status = state.next_status_filter();
        }
        assert_eq!(status.status, None);
        assert_eq!(status.limit, 20);
    }

    // ── driver ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_browser_loads_types_and_runs() {
        let backend = Arc::new(ScriptedBackend::default());
        backend
            .runs
            .lock()
            .unwrap()
            .insert(None, vec![run("r1", "forecast", RunStatus::Completed)]);

        let (mut rx, handle) =
            AgentRunBrowser::new(backend, Duration::from_secs(60), 20).start();
        let state = wait_for(&mut rx, |s| !s.runs.is_empty() && !s.agent_types.is_empty()).await;
        assert_eq!(state.runs[0].id, "r1");
        assert_eq!(state.agent_types, vec!["forecast", "reconcile"]);
        handle.abort();
    }

    #[tokio::test]
    async fn test_filter_change_discards_slow_old_response() {
        let backend = Arc::new(ScriptedBackend::default());
        backend
            .runs
            .lock()
            .unwrap()
            .insert(None, vec![run("old", "reconcile", RunStatus::Running)]);
        backend.runs.lock().unwrap().insert(
            Some("forecast".to_string()),
            vec![
                run("f1", "forecast", RunStatus::Failed),
                run("f2", "forecast", RunStatus::Completed),
            ],
        );
        backend
            .run_delays
            .lock()
            .unwrap()
            .insert(None, Duration::from_millis(200));

        let (mut rx, handle) =
            AgentRunBrowser::new(backend.clone(), Duration::from_secs(60), 20).start();
        assert!(handle.send(RunBrowserCommand::SetFilter(forecast_failed())));

        let state = wait_for(&mut rx, |s| !s.runs.is_empty()).await;
        assert_eq!(state.runs.len(), 1);
        assert_eq!(state.runs[0].id, "f1");

        // Let the slow unfiltered response land; it must not replace the list.
        time::sleep(Duration::from_millis(350)).await;
        let state = rx.borrow().clone();
        assert_eq!(state.filter, forecast_failed());
        assert_eq!(state.runs.len(), 1);
        assert_eq!(state.runs[0].id, "f1");

        let queries = backend.run_queries.lock().unwrap().clone();
        assert!(queries.contains(&forecast_failed()));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_tick_reissues_current_filter() {
        let backend = Arc::new(ScriptedBackend::default());
        let (_rx, handle) =
            AgentRunBrowser::new(backend.clone(), Duration::from_secs(10), 20).start();
        assert!(handle.send(RunBrowserCommand::SetFilter(forecast_failed())));

        fn filtered(queries: &[RunFilter]) -> usize {
            queries.iter().filter(|q| **q == forecast_failed()).count()
        }

        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(filtered(&backend.run_queries.lock().unwrap()), 1);

        time::sleep(Duration::from_secs(10)).await;
        let queries = backend.run_queries.lock().unwrap().clone();
        assert_eq!(filtered(&queries), 2);
        assert_eq!(queries.last(), Some(&forecast_failed()));
        handle.abort();
    }

    #[tokio::test]
    async fn test_open_and_close_detail() {
        let backend = Arc::new(ScriptedBackend::default());
        backend
            .runs
            .lock()
            .unwrap()
            .insert(None, vec![run("r1", "forecast", RunStatus::Failed)]);
        backend
            .details
            .lock()
            .unwrap()
            .insert("r1".to_string(), detail("r1"));

        let (mut rx, handle) =
            AgentRunBrowser::new(backend, Duration::from_secs(60), 20).start();
        wait_for(&mut rx, |s| !s.runs.is_empty()).await;

        handle.send(RunBrowserCommand::Open("r1".to_string()));
        let state = wait_for(&mut rx, |s| matches!(s.detail, DetailState::Loaded(_))).await;
        if let DetailState::Loaded(d) = &state.detail {
            assert_eq!(d.steps[0].error.as_deref(), Some("timeout"));
        }

        handle.send(RunBrowserCommand::Close);
        let state = wait_for(&mut rx, |s| !s.detail.is_open()).await;
        assert_eq!(state.runs.len(), 1);
        handle.abort();
    }
}
