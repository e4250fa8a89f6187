use crate::themes::Theme;
use chrono::{DateTime, Utc};
use monitor_core::models::HealthStatus;
use monitor_core::time_utils::TimezoneHandler;
use monitor_runtime::{RealtimeStatus, Slice};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// A bracketed status label, e.g. `[pending]`.
pub fn status_badge<'a>(label: &str, style: Style) -> Span<'a> {
    Span::styled(format!("[{label}]"), style)
}

/// Cut `text` to at most `max` display columns, ending in `…` when shortened.
pub fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

// ── ConnectionIndicator ──────────────────────────────────────────────────────

/// Realtime channel state for the status bar.
///
/// | State                  | Text                     |
/// |------------------------|--------------------------|
/// | disabled               | `○ realtime off`         |
/// | connected              | `● live`                 |
/// | retrying               | `◌ reconnecting (n)`     |
/// | first attempt pending  | `◌ connecting`           |
pub struct ConnectionIndicator<'a> {
    pub enabled: bool,
    pub status: &'a RealtimeStatus,
    pub theme: &'a Theme,
}

impl<'a> ConnectionIndicator<'a> {
    pub fn new(enabled: bool, status: &'a RealtimeStatus, theme: &'a Theme) -> Self {
        Self {
            enabled,
            status,
            theme,
        }
    }

    pub fn label(&self) -> String {
        if !self.enabled {
            "○ realtime off".to_string()
        } else if self.status.is_connected {
            "● live".to_string()
        } else if self.status.reconnect_attempts > 0 {
            format!("◌ reconnecting ({})", self.status.reconnect_attempts)
        } else {
            "◌ connecting".to_string()
        }
    }

    pub fn to_line(&self) -> Line<'a> {
        let style = if self.enabled {
            self.theme.connection_style(self.status.is_connected)
        } else {
            self.theme.dim
        };
        let mut spans = vec![Span::styled(self.label(), style)];
        if let Some(msg) = &self.status.last_message {
            spans.push(Span::styled(format!("  last: {}", msg.kind), self.theme.dim));
        }
        Line::from(spans)
    }
}

// ── HealthIndicator ──────────────────────────────────────────────────────────

/// Backend health from `GET /health`.
pub struct HealthIndicator<'a> {
    pub health: Option<&'a HealthStatus>,
    /// The latest health probe failed.
    pub stale: bool,
    pub theme: &'a Theme,
}

impl<'a> HealthIndicator<'a> {
    pub fn new(health: Option<&'a HealthStatus>, stale: bool, theme: &'a Theme) -> Self {
        Self {
            health,
            stale,
            theme,
        }
    }

    pub fn to_span(&self) -> Span<'a> {
        match self.health {
            _ if self.stale => Span::styled("API unreachable", self.theme.error),
            None => Span::styled("API …", self.theme.dim),
            Some(h) if h.is_healthy() => Span::styled(format!("API {}", h.status), self.theme.success),
            Some(h) => Span::styled(format!("API {}", h.status), self.theme.warning),
        }
    }
}

// ── SyncIndicator ────────────────────────────────────────────────────────────

/// Last successful sync time plus any slices currently served stale.
pub struct SyncIndicator<'a> {
    pub last_success: Option<DateTime<Utc>>,
    pub stale: &'a [Slice],
    pub tz: &'a TimezoneHandler,
    pub theme: &'a Theme,
}

impl<'a> SyncIndicator<'a> {
    pub fn to_spans(&self) -> Vec<Span<'static>> {
        let mut spans = vec![match self.last_success {
            Some(t) => Span::styled(format!("synced {}", self.tz.format_clock(t)), self.theme.label),
            None => Span::styled("waiting for first sync", self.theme.dim),
        }];
        if !self.stale.is_empty() {
            let names: Vec<&str> = self.stale.iter().map(|s| s.label()).collect();
            spans.push(Span::styled(
                format!("  stale: {}", names.join(", ")),
                self.theme.warning,
            ));
        }
        spans
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
