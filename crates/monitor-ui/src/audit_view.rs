//! Audit log table.

use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use monitor_core::formatting::percentage;
use monitor_core::models::AuditLogEntry;
use monitor_core::time_utils::TimezoneHandler;

use crate::components::indicators::fit_width;
use crate::themes::Theme;

const RULE_WIDTH: usize = 36;

const HEADERS: [&str; 7] = ["ID", "Status", "Rule", "Action", "Model", "Confidence", "Created"];

/// Plain-text cells for one entry, in [`HEADERS`] order.
pub fn audit_row_cells(entry: &AuditLogEntry, tz: &TimezoneHandler) -> [String; 7] {
    [
        entry.id.to_string(),
        entry.status.as_str().to_string(),
        entry
            .rule_name
            .as_deref()
            .map(|r| fit_width(r, RULE_WIDTH))
            .unwrap_or_else(|| "-".to_string()),
        entry.action_type.clone().unwrap_or_else(|| "-".to_string()),
        entry.model.clone().unwrap_or_else(|| "-".to_string()),
        entry
            .confidence
            .map(|c| format!("{}%", percentage(c, 1.0, 0)))
            .unwrap_or_else(|| "-".to_string()),
        tz.format_timestamp(entry.created_at.as_deref()),
    ]
}

pub fn render_audit_view(
    frame: &mut Frame,
    area: Rect,
    entries: &[AuditLogEntry],
    stale: bool,
    tz: &TimezoneHandler,
    theme: &Theme,
) {
    let title = if stale {
        format!(" Audit Log ({}) · stale ", entries.len())
    } else {
        format!(" Audit Log ({}) ", entries.len())
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    if entries.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No audit entries", theme.dim)).block(block),
            area,
        );
        return;
    }

    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h).style(theme.table_header)));

    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let row_style = if i % 2 == 0 {
                theme.table_row
            } else {
                theme.table_row_alt
            };
            let [id, status, rule, action, model, confidence, created] = audit_row_cells(entry, tz);
            let confidence_style = entry
                .confidence
                .map(|c| theme.confidence_style(c))
                .unwrap_or(row_style);
            Row::new(vec![
                Cell::from(id),
                Cell::from(status).style(theme.audit_status_style(entry.status)),
                Cell::from(rule),
                Cell::from(action),
                Cell::from(model),
                Cell::from(confidence).style(confidence_style),
                Cell::from(created),
            ])
            .style(row_style)
        })
        .collect();

    let widths = [
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Min(18),
        Constraint::Length(16),
        Constraint::Length(18),
        Constraint::Length(11),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .style(theme.text);
    frame.render_widget(table, area);
}

// ── Tests ──────────────────────────────────────────────────────────────────────
