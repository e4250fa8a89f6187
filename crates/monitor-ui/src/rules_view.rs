//! Automation rules panel.

use ratatui::{
    layout::{Constraint, Rect},
    text::Span,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use monitor_core::models::Rule;

use crate::themes::Theme;

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn render_rules_view(frame: &mut Frame, area: Rect, rules: &[Rule], stale: bool, theme: &Theme) {
    let enabled = rules.iter().filter(|r| r.enabled).count();
    let title = format!(
        " Rules ({enabled}/{} enabled){} ",
        rules.len(),
        if stale { " · stale" } else { "" }
    );
    let block = Block::default().borders(Borders::ALL).title(title);

    if rules.is_empty() {
        frame.render_widget(
            Paragraph::new(Span::styled("No automation rules", theme.dim)).block(block),
            area,
        );
        return;
    }

    let header = Row::new(
        ["Name", "Trigger", "Action", "Enabled", "Approval"]
            .iter()
            .map(|h| Cell::from(*h).style(theme.table_header)),
    );

    let rows: Vec<Row> = rules
        .iter()
        .map(|rule| {
            let style = if rule.enabled { theme.table_row } else { theme.dim };
            Row::new(vec![
                Cell::from(rule.name.clone()),
                Cell::from(rule.trigger.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(rule.action.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(yes_no(rule.enabled)).style(if rule.enabled {
                    theme.success
                } else {
                    theme.dim
                }),
                Cell::from(yes_no(rule.requires_approval)).style(if rule.requires_approval {
                    theme.warning
                } else {
                    style
                }),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Min(24),
        Constraint::Length(20),
        Constraint::Length(20),
        Constraint::Length(8),
        Constraint::Length(9),
    ];

    frame.render_widget(
        Table::new(rows, widths).header(header).block(block).style(theme.text),
        area,
    );
}
