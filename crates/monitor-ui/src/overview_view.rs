//! Overview tab: stats cards on top, insights panel below.
//!
//! The panel title names the active role, so each role gets its own
//! dashboard heading over the same data.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use monitor_core::formatting::{format_stat_value, humanize_key};
use monitor_core::models::{Role, Stats};
use monitor_core::time_utils::TimezoneHandler;
use monitor_runtime::{DashboardState, RealtimeStatus, Slice};

use crate::components::indicators::{ConnectionIndicator, HealthIndicator, SyncIndicator};
use crate::components::status_mix::RunStatusBar;
use crate::themes::Theme;

const CARDS_PER_ROW: usize = 4;
const CARD_HEIGHT: u16 = 3;

/// `(title, value)` for every numeric stats field, in key order.
pub fn stat_cards(stats: &Stats) -> Vec<(String, String)> {
    stats
        .numeric_fields()
        .map(|(key, value)| (humanize_key(key), format_stat_value(value)))
        .collect()
}

/// Everything the insights panel reads.
pub struct InsightsData<'a> {
    pub dashboard: &'a DashboardState,
    pub realtime: &'a RealtimeStatus,
    pub realtime_enabled: bool,
    pub tz: &'a TimezoneHandler,
}

pub fn build_insights_lines<'a>(data: &InsightsData<'a>, theme: &'a Theme) -> Vec<Line<'a>> {
    let dashboard = data.dashboard;
    let stale = dashboard.stale_slices();

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Backend:        ", theme.label),
            HealthIndicator::new(
                dashboard.health.as_ref(),
                stale.contains(&Slice::Health),
                theme,
            )
            .to_span(),
        ]),
        {
            let mut spans = vec![Span::styled("Realtime:       ", theme.label)];
            spans.extend(
                ConnectionIndicator::new(data.realtime_enabled, data.realtime, theme)
                    .to_line()
                    .spans,
            );
            Line::from(spans)
        },
        Line::from(vec![
            Span::styled("Last event:     ", theme.label),
            match &data.realtime.last_message {
                Some(msg) => Span::styled(msg.kind.clone(), theme.info),
                None => Span::styled("none", theme.dim),
            },
        ]),
        Line::from(vec![
            Span::styled("Pending:        ", theme.label),
            Span::styled(
                format!("{} awaiting approval", dashboard.pending_count()),
                if dashboard.pending_count() > 0 {
                    theme.warning
                } else {
                    theme.success
                },
            ),
        ]),
    ];

    let counts = dashboard.run_counts();
    let mut runs = vec![Span::styled("Recent runs:    ", theme.label)];
    runs.extend(RunStatusBar::new(&counts, theme).to_line().spans);
    lines.push(Line::from(runs));

    lines.push(Line::from(""));
    lines.push(Line::from(
        SyncIndicator {
            last_success: dashboard.last_success,
            stale: &stale,
            tz: data.tz,
            theme,
        }
        .to_spans(),
    ));
    for slice in &stale {
        let failures = dashboard.slice_health(*slice).consecutive_failures;
        lines.push(Line::from(Span::styled(
            format!(
                "  {}: {} failed fetch{}, showing last data",
                slice.label(),
                failures,
                if failures == 1 { "" } else { "es" }
            ),
            theme.dim,
        )));
    }
    lines
}

/// Height of the card panel for `card_count` cards, borders included.
pub fn cards_height(card_count: usize) -> u16 {
    let rows = u16::try_from(card_count.div_ceil(CARDS_PER_ROW).max(1)).unwrap_or(u16::MAX);
    rows.saturating_mul(CARD_HEIGHT).saturating_add(2)
}

pub fn render_overview(
    frame: &mut Frame,
    area: Rect,
    role: &Role,
    data: &InsightsData,
    theme: &Theme,
) {
    let cards = stat_cards(&data.dashboard.stats);
    let [cards_area, insights_area] = Layout::vertical([
        Constraint::Length(cards_height(cards.len())),
        Constraint::Min(0),
    ])
    .areas(area);

    let title = format!(" {} Dashboard ", humanize_key(role.as_str()));
    let outer = Block::default().borders(Borders::ALL).title(title);
    let inner = outer.inner(cards_area);
    frame.render_widget(outer, cards_area);

    if cards.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No stats yet", theme.dim)),
            inner,
        );
    } else {
        render_cards(frame, inner, &cards, theme);
    }

    let insights = build_insights_lines(data, theme);
    frame.render_widget(
        Paragraph::new(Text::from(insights))
            .block(Block::default().borders(Borders::ALL).title(" Insights ")),
        insights_area,
    );
}

fn render_cards(frame: &mut Frame, area: Rect, cards: &[(String, String)], theme: &Theme) {
    let rows = Layout::vertical(
        cards
            .chunks(CARDS_PER_ROW)
            .map(|_| Constraint::Length(CARD_HEIGHT)),
    )
    .split(area);

    for (row_area, chunk) in rows.iter().zip(cards.chunks(CARDS_PER_ROW)) {
        let cols = Layout::horizontal(
            (0..CARDS_PER_ROW).map(|_| Constraint::Ratio(1, CARDS_PER_ROW as u32)),
        )
        .split(*row_area);
        for (col, (title, value)) in cols.iter().zip(chunk) {
            let card = Paragraph::new(Span::styled(value.clone(), theme.value)).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.table_border)
                    .title(Span::styled(title.clone(), theme.label)),
            );
            frame.render_widget(card, *col);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn stats() -> Stats {
        serde_json::from_value(json!({
            "total_automations": 1520,
            "success_rate": 97.456,
            "period": "today",
        }))
        .unwrap()
    }

    #[test]
    fn test_cards_height_saturates() {
        assert_eq!(cards_height(0), CARD_HEIGHT + 2);
        assert_eq!(cards_height(4), CARD_HEIGHT + 2);
        assert_eq!(cards_height(5), 2 * CARD_HEIGHT + 2);
        assert_eq!(cards_height(100_000), u16::MAX);
        assert_eq!(cards_height(usize::MAX), u16::MAX);
    }

    #[test]
    fn test_stat_cards_skip_non_numeric() {
        let cards = stat_cards(&stats());
        assert_eq!(
            cards,
            vec![
                ("Success Rate".to_string(), "97.46".to_string()),
                ("Total Automations".to_string(), "1,520".to_string()),
            ]
        );
    }

    #[test]
    fn test_insights_before_first_sync() {
        let theme = Theme::dark();
        let dashboard = DashboardState::default();
        let realtime = RealtimeStatus::default();
        let tz = TimezoneHandler::default();
        let data = InsightsData {
            dashboard: &dashboard,
            realtime: &realtime,
            realtime_enabled: false,
            tz: &tz,
        };
        let t = text(&build_insights_lines(&data, &theme));
        assert!(t.contains("realtime off"), "got: {t}");
        assert!(t.contains("0 awaiting approval"), "got: {t}");
        assert!(t.contains("no runs"), "got: {t}");
        assert!(t.contains("waiting for first sync"), "got: {t}");
    }

    #[test]
    fn test_insights_list_stale_slices() {
        use chrono::Utc;
        use monitor_runtime::state::FetchOutcome;
        use monitor_runtime::RefreshReason;

        let theme = Theme::dark();
        let mut dashboard = DashboardState::default();
        dashboard.merge(
            FetchOutcome {
                stats: Some(stats()),
                ..FetchOutcome::default()
            },
            RefreshReason::Startup,
            Utc::now(),
        );
        let realtime = RealtimeStatus::default();
        let tz = TimezoneHandler::default();
        let data = InsightsData {
            dashboard: &dashboard,
            realtime: &realtime,
            realtime_enabled: true,
            tz: &tz,
        };
        let t = text(&build_insights_lines(&data, &theme));
        assert!(t.contains("synced"), "got: {t}");
        assert!(t.contains("rules: 1 failed fetch, showing last data"), "got: {t}");
        assert!(t.contains("API unreachable"), "got: {t}");
    }

    #[test]
    fn test_render_overview_does_not_panic() {
        let backend = TestBackend::new(120, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let mut dashboard = DashboardState::default();
        dashboard.stats = stats();
        let realtime = RealtimeStatus::default();
        let tz = TimezoneHandler::default();
        let data = InsightsData {
            dashboard: &dashboard,
            realtime: &realtime,
            realtime_enabled: true,
            tz: &tz,
        };

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_overview(frame, area, &Role::new("sales"), &data, &theme);
            })
            .unwrap();
    }

    #[test]
    fn test_render_overview_empty_small_terminal_does_not_panic() {
        let backend = TestBackend::new(40, 10);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::light();
        let dashboard = DashboardState::default();
        let realtime = RealtimeStatus::default();
        let tz = TimezoneHandler::default();
        let data = InsightsData {
            dashboard: &dashboard,
            realtime: &realtime,
            realtime_enabled: false,
            tz: &tz,
        };

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_overview(frame, area, &Role::default(), &data, &theme);
            })
            .unwrap();
    }
}
