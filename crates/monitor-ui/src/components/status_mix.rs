use crate::themes::Theme;
use monitor_core::models::{RunStatus, RunStatusCounts};
use ratatui::text::{Line, Span};

// ── RunStatusBar ─────────────────────────────────────────────────────────────

/// Proportional multi-coloured bar of run statuses.
///
/// Each status is a contiguous segment whose width follows its share of the
/// listed runs; `status: count` labels follow the bar.
pub struct RunStatusBar<'a> {
    pub counts: &'a RunStatusCounts,
    pub theme: &'a Theme,
    /// Total width of the bar in terminal columns.
    pub width: u16,
}

impl<'a> RunStatusBar<'a> {
    pub fn new(counts: &'a RunStatusCounts, theme: &'a Theme) -> Self {
        Self {
            counts,
            theme,
            width: 40,
        }
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = width;
        self
    }

    /// Segment widths in status order. Widths sum to `width` whenever there
    /// is at least one run; rounding slack goes to the largest segment.
    pub fn segments(&self) -> Vec<(RunStatus, usize)> {
        let total = self.counts.total();
        if total == 0 {
            return Vec::new();
        }
        let width = self.width as usize;
        let mut segments: Vec<(RunStatus, usize)> = self
            .counts
            .0
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(s, n)| (*s, n * width / total))
            .collect();

        let used: usize = segments.iter().map(|(_, w)| w).sum();
        if let Some(largest) = segments
            .iter_mut()
            .max_by_key(|(s, _)| self.counts.get(*s))
        {
            largest.1 += width.saturating_sub(used);
        }
        segments
    }

    pub fn to_line(&self) -> Line<'static> {
        let segments = self.segments();
        if segments.is_empty() {
            return Line::from(Span::styled("no runs", self.theme.dim));
        }

        let mut spans: Vec<Span<'static>> = segments
            .iter()
            .filter(|(_, w)| *w > 0)
            .map(|(status, w)| Span::styled("█".repeat(*w), self.theme.run_status_style(*status)))
            .collect();

        spans.push(Span::raw(" "));

        for (status, _) in &segments {
            spans.push(Span::styled(
                format!("{}: {} ", status, self.counts.get(*status)),
                self.theme.run_status_style(*status),
            ));
        }

        Line::from(spans)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
