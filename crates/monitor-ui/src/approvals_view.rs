//! Pending approvals with a selection cursor.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};
use serde_json::Value;

use monitor_core::formatting::percentage;
use monitor_core::models::AuditLogEntry;
use monitor_core::time_utils::TimezoneHandler;

use crate::components::indicators::fit_width;
use crate::themes::Theme;

const LABEL_WIDTH: usize = 40;

fn record_ref(entry: &AuditLogEntry) -> String {
    let model = entry.model.as_deref().unwrap_or("-");
    match &entry.record_id {
        Some(Value::Null) | None => model.to_string(),
        Some(Value::String(s)) => format!("{model}#{s}"),
        Some(other) => format!("{model}#{other}"),
    }
}

/// Clamp a cursor into `0..len`; `0` for an empty list.
pub fn clamp_cursor(cursor: usize, len: usize) -> usize {
    cursor.min(len.saturating_sub(1))
}

pub fn build_hint_line(theme: &Theme, approver: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled("a", theme.bold),
        Span::styled(" approve  ", theme.dim),
        Span::styled("r", theme.bold),
        Span::styled(" reject  ", theme.dim),
        Span::styled("↑/↓", theme.bold),
        Span::styled(" select  ", theme.dim),
        Span::styled(format!("as {approver}"), theme.label),
    ])
}

#[allow(clippy::too_many_arguments)]
pub fn render_approvals_view(
    frame: &mut Frame,
    area: Rect,
    approvals: &[AuditLogEntry],
    cursor: usize,
    approver: &str,
    stale: bool,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let [list_area, hint_area] =
        Layout::vertical([Constraint::Min(3), Constraint::Length(1)]).areas(area);

    let title = format!(
        " Pending Approvals ({}){} ",
        approvals.len(),
        if stale { " · stale" } else { "" }
    );
    let block = Block::default().borders(Borders::ALL).title(title);

    if approvals.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("Nothing awaiting approval", theme.success)).block(block),
            list_area,
        );
        return;
    }

    let cursor = clamp_cursor(cursor, approvals.len());
    let header = Row::new(
        ["ID", "Rule", "Record", "Confidence", "Created"]
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header)),
    );

    let rows: Vec<Row> = approvals
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i % 2 == 0 {
                theme.table_row
            } else {
                theme.table_row_alt
            };
            let confidence = match entry.confidence {
                Some(c) => {
                    Cell::from(format!("{}%", percentage(c, 1.0, 0))).style(theme.confidence_style(c))
                }
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(entry.id.to_string()),
                Cell::from(fit_width(entry.label(), LABEL_WIDTH)),
                Cell::from(record_ref(entry)),
                confidence,
                Cell::from(tz.format_timestamp(entry.created_at.as_deref())),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Min(20),
        Constraint::Length(22),
        Constraint::Length(11),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .style(theme.text)
        .row_highlight_style(theme.selected)
        .highlight_symbol("▶ ");
    let mut table_state = TableState::default();
    table_state.select(Some(cursor));
    frame.render_stateful_widget(table, list_area, &mut table_state);
    frame.render_widget(Paragraph::new(build_hint_line(theme, approver)), hint_area);
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use serde_json::json;

    fn pending() -> Vec<AuditLogEntry> {
        serde_json::from_value(json!([
            {"id": 7, "status": "pending", "rule_name": "Large refund", "model": "account.move", "record_id": 42, "confidence": 0.55},
            {"id": "8", "status": "pending", "action_type": "cancel_order"}
        ]))
        .unwrap()
    }

    #[test]
    fn test_clamp_cursor() {
        assert_eq!(clamp_cursor(0, 0), 0);
        assert_eq!(clamp_cursor(5, 2), 1);
        assert_eq!(clamp_cursor(1, 3), 1);
    }

    #[test]
    fn test_record_ref() {
        let p = pending();
        assert_eq!(record_ref(&p[0]), "account.move#42");
        assert_eq!(record_ref(&p[1]), "-");
    }

    #[test]
    fn test_hint_line_names_approver() {
        let theme = Theme::dark();
        let text: String = build_hint_line(&theme, "ops-lead")
            .spans
            .iter()
            .map(|s| s.content.as_ref())
            .collect();
        assert!(text.contains("a approve"));
        assert!(text.contains("r reject"));
        assert!(text.ends_with("as ops-lead"));
    }

    #[test]
    fn test_render_approvals_marks_cursor() {
        let backend = TestBackend::new(100, 10);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let tz = TimezoneHandler::default();
        let p = pending();

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_approvals_view(frame, area, &p, 9, "dashboard", false, &tz, &theme);
            })
            .unwrap();

        let buffer = terminal.backend().buffer().clone();
        let rendered: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(rendered.contains("Pending Approvals (2)"));
        assert!(rendered.contains("cancel_order"));
        assert_eq!(rendered.matches('▶').count(), 1);
    }

    #[test]
    fn test_render_approvals_scrolls_to_cursor() {
        let backend = TestBackend::new(100, 15);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let tz = TimezoneHandler::default();
        let entries: Vec<AuditLogEntry> = (0..40)
            .map(|i| {
                serde_json::from_value(json!({
                    "id": i, "status": "pending", "rule_name": format!("rule-{i}")
                }))
                .unwrap()
            })
            .collect();

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_approvals_view(frame, area, &entries, 30, "dashboard", false, &tz, &theme);
            })
            .unwrap();

        let buffer = terminal.backend().buffer().clone();
        let width = buffer.area.width as usize;
        let symbols: Vec<&str> = buffer.content().iter().map(|c| c.symbol()).collect();
        let lines: Vec<String> = symbols.chunks(width).map(|row| row.concat()).collect();

        let marked: Vec<&String> = lines.iter().filter(|l| l.contains('▶')).collect();
        assert_eq!(marked.len(), 1, "{lines:#?}");
        assert!(marked[0].contains("rule-30"), "{lines:#?}");
        assert!(!lines.iter().any(|l| l.contains("rule-0 ")), "{lines:#?}");
    }

    #[test]
    fn test_render_approvals_empty_does_not_panic() {
        let backend = TestBackend::new(50, 6);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let tz = TimezoneHandler::default();

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_approvals_view(frame, area, &[], 0, "dashboard", true, &tz, &theme);
            })
            .unwrap();
    }
}
