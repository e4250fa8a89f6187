//! Agent Run Browser: filterable run list with a step-by-step detail pane.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use monitor_core::formatting::{format_duration_secs, format_tokens};
use monitor_core::models::{AgentRun, AgentRunDetail, StepStatus};
use monitor_core::time_utils::{duration_between, TimezoneHandler};
use monitor_runtime::{DetailState, RunBrowserState};

use crate::approvals_view::clamp_cursor;
use crate::components::indicators::status_badge;
use crate::components::status_mix::RunStatusBar;
use crate::themes::Theme;

fn step_marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "✓",
        StepStatus::Failed => "✗",
        StepStatus::Running => "▶",
        StepStatus::Pending => "·",
        StepStatus::Skipped => "-",
        StepStatus::Unknown => "?",
    }
}

fn run_duration(run: &AgentRun, tz: &TimezoneHandler) -> String {
    duration_between(tz, run.started_at.as_deref(), run.completed_at.as_deref())
        .map(format_duration_secs)
        .unwrap_or_else(|| "-".to_string())
}

// ── Filter strip ──────────────────────────────────────────────────────────────

pub fn build_filter_line(state: &RunBrowserState, theme: &Theme) -> Line<'static> {
    let agent_type = state.filter.agent_type.clone().unwrap_or_else(|| "all".to_string());
    let status = state
        .filter
        .status
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "all".to_string());

    let mut spans = vec![
        Span::styled("type: ", theme.label),
        Span::styled(agent_type, theme.value),
        Span::styled("  status: ", theme.label),
        Span::styled(status, theme.value),
        Span::styled(format!("  limit {}", state.filter.limit), theme.dim),
        Span::styled("  (t/s cycle, enter open, esc close)", theme.dim),
    ];
    if state.loading {
        spans.push(Span::styled("  loading…", theme.info));
    }
    if state.last_fetch_failed {
        spans.push(Span::styled("  fetch failed, showing last list", theme.warning));
    }
    Line::from(spans)
}

// ── Detail ────────────────────────────────────────────────────────────────────

/// Run metadata followed by its steps in index order.
pub fn build_detail_lines(
    detail: &AgentRunDetail,
    tz: &TimezoneHandler,
    theme: &Theme,
) -> Vec<Line<'static>> {
    let run = &detail.run;
    let field = |name: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{name:<11}"), theme.label),
            Span::styled(value, theme.value),
        ])
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled(format!("Run {} ", run.id), theme.bold),
            status_badge(run.status.as_str(), theme.run_status_style(run.status)),
        ]),
        field("Agent", run.agent_type.clone()),
        field("Trigger", run.trigger_type.clone().unwrap_or_else(|| "-".to_string())),
        field("Started", tz.format_timestamp(run.started_at.as_deref())),
        field("Completed", tz.format_timestamp(run.completed_at.as_deref())),
        field("Duration", run_duration(run, tz)),
        field(
            "Tokens",
            run.token_usage.map(format_tokens).unwrap_or_else(|| "-".to_string()),
        ),
    ];
    if let Some(err) = &run.error {
        lines.push(Line::from(vec![
            Span::styled(format!("{:<11}", "Error"), theme.label),
            Span::styled(err.clone(), theme.error),
        ]));
    }

    let steps = detail.ordered_steps();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("Steps ({})", steps.len()),
        theme.bold,
    )));
    if steps.is_empty() {
        lines.push(Line::from(Span::styled("  no steps recorded", theme.dim)));
    }
    for step in steps {
        let style = theme.step_status_style(step.status);
        lines.push(Line::from(vec![
            Span::styled(format!("  {} ", step_marker(step.status)), style),
            Span::styled(format!("{}. {}", step.step_index, step.step_name), style),
            Span::raw(" "),
            status_badge(step.status.as_str(), style),
        ]));
        if let Some(err) = &step.error {
            lines.push(Line::from(Span::styled(format!("      {err}"), theme.error)));
        }
    }
    lines
}

fn render_detail(frame: &mut Frame, area: Rect, detail: &DetailState, tz: &TimezoneHandler, theme: &Theme) {
    let block = Block::default().borders(Borders::ALL).title(" Run Detail ");
    let text = match detail {
        DetailState::Closed => return,
        DetailState::Loading(id) => Text::from(Span::styled(format!("Loading run {id}…"), theme.dim)),
        DetailState::Unavailable(id) => Text::from(Span::styled(
            format!("Run {id} could not be loaded"),
            theme.warning,
        )),
        DetailState::Loaded(d) => Text::from(build_detail_lines(d, tz, theme)),
    };
    frame.render_widget(
        Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

// ── List ──────────────────────────────────────────────────────────────────────

fn render_run_list(
    frame: &mut Frame,
    area: Rect,
    state: &RunBrowserState,
    cursor: usize,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Agent Runs ({}) ", state.runs.len()));

    if state.runs.is_empty() {
        let msg = if state.loading { "Loading runs…" } else { "No runs match the filter" };
        frame.render_widget(Paragraph::new(Span::styled(msg, theme.dim)).block(block), area);
        return;
    }

    let open_id = state.detail.run_id();
    let header = Row::new(
        ["", "ID", "Agent", "Status", "Steps", "Tokens", "Started", "Duration"]
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header)),
    );
    let rows: Vec<Row> = state
        .runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            let style = if i % 2 == 0 {
                theme.table_row
            } else {
                theme.table_row_alt
            };
            let marker = if open_id == Some(run.id.as_str()) { "●" } else { " " };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(run.id.clone()),
                Cell::from(run.agent_type.clone()),
                Cell::from(run.status.as_str()).style(theme.run_status_style(run.status)),
                Cell::from(run.total_steps.to_string()),
                Cell::from(run.token_usage.map(format_tokens).unwrap_or_else(|| "-".to_string())),
                Cell::from(tz.format_timestamp(run.started_at.as_deref())),
                Cell::from(run_duration(run, tz)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(8),
        Constraint::Min(14),
        Constraint::Length(10),
        Constraint::Length(6),
        Constraint::Length(8),
        Constraint::Length(20),
        Constraint::Length(9),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .style(theme.text)
        .row_highlight_style(theme.selected)
        .highlight_symbol("▶ ");
    let mut table_state = TableState::default();
    table_state.select(Some(clamp_cursor(cursor, state.runs.len())));
    frame.render_stateful_widget(table, area, &mut table_state);
}

pub fn render_agents_view(
    frame: &mut Frame,
    area: Rect,
    state: &RunBrowserState,
    cursor: usize,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let [filter_area, mix_area, body] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(3),
    ])
    .areas(area);

    frame.render_widget(Paragraph::new(build_filter_line(state, theme)), filter_area);

    let counts = state.status_counts();
    let bar_width = mix_area.width.saturating_sub(2).min(40);
    frame.render_widget(
        Paragraph::new(RunStatusBar::new(&counts, theme).with_width(bar_width).to_line()),
        mix_area,
    );

    if state.detail.is_open() {
        let [list_area, detail_area] =
            Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(body);
        render_run_list(frame, list_area, state, cursor, tz, theme);
        render_detail(frame, detail_area, &state.detail, tz, theme);
    } else {
        render_run_list(frame, body, state, cursor, tz, theme);
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
