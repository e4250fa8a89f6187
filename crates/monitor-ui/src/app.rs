//! Root shell: tab navigation, role switching and the TUI event loop.
//!
//! [`App`] owns everything the views read (dashboard snapshot, run browser
//! state, realtime status) plus the handles it needs to act: the refresh
//! queue, the run browser, the realtime channel and the backend for
//! approval decisions.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    cursor::Show,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    text::{Line, Span, Text},
    widgets::{Paragraph, Tabs},
    Frame, Terminal,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use monitor_core::models::{RecordId, Role};
use monitor_core::settings::Preferences;
use monitor_core::time_utils::TimezoneHandler;
use monitor_runtime::data::AutomationBackend;
use monitor_runtime::{
    spawn_decision, spawn_refresh_watcher, DashboardState, DecisionOutcome, RealtimeChannel,
    RealtimeHandle, RealtimeStatus, RefreshHandle, RefreshReason, RunBrowserCommand,
    RunBrowserHandle, RunBrowserState, Slice,
};

use crate::agents_view;
use crate::approvals_view::{self, clamp_cursor};
use crate::audit_view;
use crate::components::header::Header;
use crate::components::indicators::{ConnectionIndicator, HealthIndicator};
use crate::overview_view::{self, InsightsData};
use crate::rules_view;
use crate::themes::Theme;

const TICK_RATE: Duration = Duration::from_millis(250);
const TOAST_TTL: Duration = Duration::from_secs(5);

// ── Tab ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    AuditLog,
    Approvals,
    Rules,
    Agents,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Overview,
        Tab::AuditLog,
        Tab::Approvals,
        Tab::Rules,
        Tab::Agents,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::AuditLog => "Audit Log",
            Tab::Approvals => "Approvals",
            Tab::Rules => "Rules",
            Tab::Agents => "Agent Runs",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

// ── Key mapping ───────────────────────────────────────────────────────────────

/// What a key press asks the shell to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    None,
    Quit,
    SwitchTab(Tab),
    NextTab,
    PrevTab,
    CycleRole,
    Refresh,
    CursorUp,
    CursorDown,
    Decide { approved: bool },
    CycleTypeFilter,
    CycleStatusFilter,
    OpenDetail,
    CloseDetail,
}

/// Translate a key press on `tab` into an action. Keys that only make sense
/// on one tab map to [`AppAction::None`] elsewhere.
pub fn map_key(key: KeyEvent, tab: Tab) -> AppAction {
    if key.kind == KeyEventKind::Release {
        return AppAction::None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => AppAction::Quit,
        KeyCode::Char('q') | KeyCode::Char('Q') => AppAction::Quit,
        KeyCode::Tab => AppAction::NextTab,
        KeyCode::BackTab => AppAction::PrevTab,
        KeyCode::Char(c @ '1'..='5') => {
            let idx = c as usize - '1' as usize;
            AppAction::SwitchTab(Tab::ALL[idx])
        }
        KeyCode::Char('o') => AppAction::CycleRole,
        KeyCode::Char('R') | KeyCode::F(5) => AppAction::Refresh,
        KeyCode::Up | KeyCode::Char('k') => AppAction::CursorUp,
        KeyCode::Down | KeyCode::Char('j') => AppAction::CursorDown,
        KeyCode::Char('a') if tab == Tab::Approvals => AppAction::Decide { approved: true },
        KeyCode::Char('r') if tab == Tab::Approvals => AppAction::Decide { approved: false },
        KeyCode::Char('t') if tab == Tab::Agents => AppAction::CycleTypeFilter,
        KeyCode::Char('s') if tab == Tab::Agents => AppAction::CycleStatusFilter,
        KeyCode::Enter if tab == Tab::Agents => AppAction::OpenDetail,
        KeyCode::Esc if tab == Tab::Agents => AppAction::CloseDetail,
        _ => AppAction::None,
    }
}

// ── Toast ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

/// Short-lived status line message.
#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub shown_at: Instant,
}

impl Toast {
    fn new(message: impl Into<String>, level: ToastLevel) -> Self {
        Self {
            message: message.into(),
            level,
            shown_at: Instant::now(),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= TOAST_TTL
    }
}

// ── Links ─────────────────────────────────────────────────────────────────────

/// Handles into the background runtime.
pub struct AppLinks<B: AutomationBackend> {
    pub backend: Arc<B>,
    pub refresher: RefreshHandle,
    pub runs: RunBrowserHandle,
    /// Websocket base URL; `None` keeps the realtime channel off.
    pub realtime_base: Option<String>,
    /// Where the selected role is persisted; `None` skips persistence.
    pub prefs_path: Option<PathBuf>,
    /// Recorded as `approved_by` on decisions.
    pub approver: String,
}

/// The realtime connection for the current role plus its refresh watcher.
struct RealtimeLink {
    handle: RealtimeHandle,
    watcher: JoinHandle<()>,
    status: watch::Receiver<RealtimeStatus>,
}

impl RealtimeLink {
    fn open(base: Option<&str>, role: &Role, refresher: RefreshHandle) -> Self {
        let handle = match base {
            Some(base) => RealtimeChannel::connect(base, Some(role.clone())),
            None => RealtimeChannel::connect("", None),
        };
        let status = handle.subscribe();
        let watcher = spawn_refresh_watcher(handle.subscribe(), refresher);
        Self {
            handle,
            watcher,
            status,
        }
    }

    fn close(&mut self) {
        self.handle.close();
        self.watcher.abort();
    }
}

// ── Terminal restore ──────────────────────────────────────────────────────────

/// Calls `restore` when dropped, including when the event loop future is
/// cancelled mid-await.
struct RestoreGuard<F: FnMut()> {
    restore: F,
}

impl<F: FnMut()> Drop for RestoreGuard<F> {
    fn drop(&mut self) {
        (self.restore)();
    }
}

fn restore_terminal() {
    if let Err(e) = disable_raw_mode() {
        warn!(error = %e, "failed to leave raw mode");
    }
    if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
        warn!(error = %e, "failed to leave alternate screen");
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App<B: AutomationBackend> {
    pub theme: Theme,
    pub timezone: String,
    pub tz: TimezoneHandler,
    pub tab: Tab,
    pub role: Role,
    pub dashboard: DashboardState,
    pub runs: RunBrowserState,
    pub realtime: RealtimeStatus,
    pub toast: Option<Toast>,
    pub approval_cursor: usize,
    pub run_cursor: usize,
    pub should_quit: bool,
    /// Audit log ids with a decision still in flight.
    in_flight: HashSet<RecordId>,
    links: AppLinks<B>,
    realtime_link: RealtimeLink,
    outcome_tx: mpsc::Sender<DecisionOutcome>,
    outcome_rx: mpsc::Receiver<DecisionOutcome>,
}

impl<B: AutomationBackend> App<B> {
    /// Build the shell and open the realtime channel for `role`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(theme_name: &str, timezone: String, role: Role, page_size: u32, links: AppLinks<B>) -> Self {
        let realtime_link =
            RealtimeLink::open(links.realtime_base.as_deref(), &role, links.refresher.clone());
        let (outcome_tx, outcome_rx) = mpsc::channel(16);
        Self {
            theme: Theme::from_name(theme_name),
            tz: TimezoneHandler::new(&timezone),
            timezone,
            tab: Tab::Overview,
            role,
            dashboard: DashboardState::default(),
            runs: RunBrowserState::new(page_size),
            realtime: RealtimeStatus::default(),
            toast: None,
            approval_cursor: 0,
            run_cursor: 0,
            should_quit: false,
            in_flight: HashSet::new(),
            links,
            realtime_link,
            outcome_tx,
            outcome_rx,
        }
    }

    pub fn realtime_enabled(&self) -> bool {
        self.links.realtime_base.is_some()
    }

    // ── Event loop ────────────────────────────────────────────────────────────

    /// Run the TUI until the user quits or the synchronizer goes away.
    ///
    /// Terminal input is polled with a short timeout; dashboard snapshots,
    /// run browser state, realtime status and decision outcomes are drained
    /// between polls.
    pub async fn run(
        mut self,
        mut dashboard_rx: mpsc::Receiver<DashboardState>,
        mut runs_rx: watch::Receiver<RunBrowserState>,
    ) -> io::Result<()> {
        enable_raw_mode()?;
        let _restore = RestoreGuard {
            restore: restore_terminal,
        };
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = loop {
            if let Err(e) = terminal.draw(|frame| self.render(frame)) {
                break Err(e);
            }

            match event::poll(TICK_RATE) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => {
                        let action = map_key(key, self.tab);
                        self.apply(action);
                    }
                    Ok(_) => {}
                    Err(e) => break Err(e),
                },
                Ok(false) => {}
                Err(e) => break Err(e),
            }

            loop {
                match dashboard_rx.try_recv() {
                    Ok(state) => self.update_dashboard(state),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        warn!("synchronizer stopped");
                        self.should_quit = true;
                        break;
                    }
                }
            }

            if runs_rx.has_changed().unwrap_or(false) {
                let state = runs_rx.borrow_and_update().clone();
                self.update_runs(state);
            }
            self.poll_realtime();
            while let Ok(outcome) = self.outcome_rx.try_recv() {
                self.handle_outcome(outcome);
            }
            self.expire_toast(Instant::now());

            if self.should_quit {
                break Ok(());
            }
        };

        self.realtime_link.close();
        result
    }

    // ── State updates ─────────────────────────────────────────────────────────

    pub fn update_dashboard(&mut self, state: DashboardState) {
        self.dashboard = state;
        self.approval_cursor = clamp_cursor(self.approval_cursor, self.dashboard.approvals.len());
        self.in_flight
            .retain(|id| self.dashboard.approvals.iter().any(|a| &a.id == id));
    }

    pub fn update_runs(&mut self, state: RunBrowserState) {
        self.runs = state;
        self.run_cursor = clamp_cursor(self.run_cursor, self.runs.runs.len());
    }

    fn poll_realtime(&mut self) {
        if self.realtime_link.status.has_changed().unwrap_or(false) {
            self.realtime = self.realtime_link.status.borrow_and_update().clone();
        }
    }

    fn expire_toast(&mut self, now: Instant) {
        if self.toast.as_ref().is_some_and(|t| t.expired(now)) {
            self.toast = None;
        }
    }

    pub fn handle_outcome(&mut self, outcome: DecisionOutcome) {
        self.in_flight.remove(&outcome.audit_log_id);
        self.toast = Some(match &outcome.result {
            Ok(()) => Toast::new(
                format!(
                    "{} #{}",
                    if outcome.approved { "Approved" } else { "Rejected" },
                    outcome.audit_log_id
                ),
                ToastLevel::Info,
            ),
            Err(message) => Toast::new(
                format!("Could not {} #{}: {}", outcome.verb(), outcome.audit_log_id, message),
                ToastLevel::Error,
            ),
        });
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    pub fn apply(&mut self, action: AppAction) {
        match action {
            AppAction::None => {}
            AppAction::Quit => self.should_quit = true,
            AppAction::SwitchTab(tab) => self.tab = tab,
            AppAction::NextTab => self.tab = self.tab.next(),
            AppAction::PrevTab => self.tab = self.tab.prev(),
            AppAction::CycleRole => self.switch_role(self.role.next()),
            AppAction::Refresh => {
                self.links.refresher.request(RefreshReason::Manual);
                if self.tab == Tab::Agents {
                    self.links.runs.send(RunBrowserCommand::Refresh);
                }
            }
            AppAction::CursorUp => self.move_cursor(-1),
            AppAction::CursorDown => self.move_cursor(1),
            AppAction::Decide { approved } => self.decide(approved),
            AppAction::CycleTypeFilter => {
                self.run_cursor = 0;
                self.links
                    .runs
                    .send(RunBrowserCommand::SetFilter(self.runs.next_type_filter()));
            }
            AppAction::CycleStatusFilter => {
                self.run_cursor = 0;
                self.links
                    .runs
                    .send(RunBrowserCommand::SetFilter(self.runs.next_status_filter()));
            }
            AppAction::OpenDetail => {
                if let Some(run) = self.runs.runs.get(self.run_cursor) {
                    self.links.runs.send(RunBrowserCommand::Open(run.id.clone()));
                }
            }
            AppAction::CloseDetail => {
                self.links.runs.send(RunBrowserCommand::Close);
            }
        }
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.tab {
            Tab::Approvals => (&mut self.approval_cursor, self.dashboard.approvals.len()),
            Tab::Agents => (&mut self.run_cursor, self.runs.runs.len()),
            _ => return,
        };
        let moved = cursor.saturating_add_signed(delta);
        *cursor = clamp_cursor(moved, len);
    }

    /// Persist the new role and reopen the realtime channel for it.
    pub fn switch_role(&mut self, role: Role) {
        if role == self.role {
            return;
        }
        info!(from = %self.role, to = %role, "switching dashboard role");

        if let Some(path) = &self.links.prefs_path {
            if let Err(e) = Preferences::store_role(path, &role) {
                warn!(error = %e, "failed to persist dashboard role");
            }
        }

        self.realtime_link.close();
        self.realtime_link = RealtimeLink::open(
            self.links.realtime_base.as_deref(),
            &role,
            self.links.refresher.clone(),
        );
        self.realtime = RealtimeStatus::default();
        self.role = role;
    }

    fn decide(&mut self, approved: bool) {
        let Some(entry) = self.dashboard.approvals.get(self.approval_cursor) else {
            self.toast = Some(Toast::new("Nothing selected", ToastLevel::Info));
            return;
        };
        let id = entry.id.clone();
        if !self.in_flight.insert(id.clone()) {
            debug!(audit_log_id = %id, "decision already in flight");
            return;
        }

        let verb = if approved { "Approving" } else { "Rejecting" };
        self.toast = Some(Toast::new(format!("{verb} #{id}…"), ToastLevel::Info));
        spawn_decision(
            Arc::clone(&self.links.backend),
            self.links.refresher.clone(),
            id,
            approved,
            self.links.approver.clone(),
            self.outcome_tx.clone(),
        );
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    pub fn tab_titles(&self) -> Vec<String> {
        Tab::ALL
            .iter()
            .enumerate()
            .map(|(i, tab)| match tab {
                Tab::Approvals if self.dashboard.pending_count() > 0 => {
                    format!("{} {} ({})", i + 1, tab.title(), self.dashboard.pending_count())
                }
                _ => format!("{} {}", i + 1, tab.title()),
            })
            .collect()
    }

    pub fn build_status_line(&self) -> Line<'_> {
        let stale = self.dashboard.slice_health(Slice::Health).is_stale();
        let mut spans = ConnectionIndicator::new(self.realtime_enabled(), &self.realtime, &self.theme)
            .to_line()
            .spans;
        spans.push(Span::raw("  "));
        spans.push(HealthIndicator::new(self.dashboard.health.as_ref(), stale, &self.theme).to_span());
        spans.push(Span::raw("  "));
        match &self.toast {
            Some(toast) => {
                let style = match toast.level {
                    ToastLevel::Info => self.theme.notification_info,
                    ToastLevel::Error => self.theme.notification_error,
                };
                spans.push(Span::styled(toast.message.clone(), style));
            }
            None => spans.push(Span::styled(
                "q quit · tab/1-5 switch · o role · R refresh",
                self.theme.dim,
            )),
        }
        Line::from(spans)
    }

    fn render(&self, frame: &mut Frame) {
        let [header_area, tabs_area, body, status_area] = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let header = Header::new(self.role.as_str(), &self.timezone, &self.theme);
        frame.render_widget(Paragraph::new(Text::from(header.to_lines())), header_area);

        let tabs = Tabs::new(self.tab_titles())
            .select(self.tab.index())
            .style(self.theme.tab_inactive)
            .highlight_style(self.theme.tab_active)
            .divider("│");
        frame.render_widget(tabs, tabs_area);

        let theme = &self.theme;
        let stale = |slice: Slice| self.dashboard.slice_health(slice).is_stale();
        match self.tab {
            Tab::Overview => {
                let data = InsightsData {
                    dashboard: &self.dashboard,
                    realtime: &self.realtime,
                    realtime_enabled: self.realtime_enabled(),
                    tz: &self.tz,
                };
                overview_view::render_overview(frame, body, &self.role, &data, theme);
            }
            Tab::AuditLog => audit_view::render_audit_view(
                frame,
                body,
                &self.dashboard.audit_logs,
                stale(Slice::AuditLogs),
                &self.tz,
                theme,
            ),
            Tab::Approvals => approvals_view::render_approvals_view(
                frame,
                body,
                &self.dashboard.approvals,
                self.approval_cursor,
                &self.links.approver,
                stale(Slice::Approvals),
                &self.tz,
                theme,
            ),
            Tab::Rules => {
                rules_view::render_rules_view(frame, body, &self.dashboard.rules, stale(Slice::Rules), theme)
            }
            Tab::Agents => {
                agents_view::render_agents_view(frame, body, &self.runs, self.run_cursor, &self.tz, theme)
            }
        }

        frame.render_widget(Paragraph::new(self.build_status_line()), status_area);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
