use monitor_core::models::{AuditStatus, RunStatus, StepStatus};
use ratatui::style::{Color, Modifier, Style};

/// Terminal background type detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackgroundType {
    Dark,
    Light,
    Unknown,
}

/// Detect terminal background type from the `COLORFGBG` environment variable.
///
/// The variable has the format `"foreground;background"`. Background values
/// 0–6 are dark, 7–15 light. Absent or unparseable means dark.
pub fn detect_background() -> BackgroundType {
    if let Ok(val) = std::env::var("COLORFGBG") {
        if let Some(bg) = val.split(';').next_back() {
            if let Ok(bg_num) = bg.parse::<u8>() {
                return if bg_num <= 6 {
                    BackgroundType::Dark
                } else {
                    BackgroundType::Light
                };
            }
        }
    }
    BackgroundType::Dark
}

/// Every style the dashboard renders with.
#[derive(Debug, Clone)]
pub struct Theme {
    // ── Header ───────────────────────────────────────────────────────────────
    pub header: Style,
    pub header_sparkle: Style,
    pub separator: Style,

    // ── Text ─────────────────────────────────────────────────────────────────
    pub text: Style,
    pub dim: Style,
    pub bold: Style,
    pub label: Style,
    pub value: Style,

    // ── Status ───────────────────────────────────────────────────────────────
    pub info: Style,
    pub success: Style,
    pub warning: Style,
    pub error: Style,

    // ── Tabs ─────────────────────────────────────────────────────────────────
    pub tab_active: Style,
    pub tab_inactive: Style,
    /// Cursor row in lists.
    pub selected: Style,

    // ── Table ────────────────────────────────────────────────────────────────
    pub table_header: Style,
    pub table_border: Style,
    pub table_row: Style,
    pub table_row_alt: Style,

    // ── Notifications ────────────────────────────────────────────────────────
    pub notification_info: Style,
    pub notification_error: Style,

    // ── Lifecycle badges ─────────────────────────────────────────────────────
    /// Waiting: pending approvals, queued runs.
    pub status_waiting: Style,
    /// In progress: running or suspended runs.
    pub status_active: Style,
    /// Finished well: approved, executed, completed.
    pub status_done: Style,
    /// Finished badly: rejected, failed.
    pub status_failed: Style,
    /// Cancelled, skipped or unrecognised.
    pub status_muted: Style,

    // ── Confidence ───────────────────────────────────────────────────────────
    pub confidence_high: Style,
    pub confidence_medium: Style,
    pub confidence_low: Style,
}

impl Theme {
    // ── Constructors ─────────────────────────────────────────────────────────

    /// Dark-background terminal theme (default).
    pub fn dark() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            header_sparkle: Style::default().fg(Color::Yellow),
            separator: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            bold: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::Gray),
            value: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),

            info: Style::default().fg(Color::Cyan),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            tab_active: Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::Gray),
            selected: Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),

            table_header: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            table_border: Style::default().fg(Color::DarkGray),
            table_row: Style::default().fg(Color::White),
            table_row_alt: Style::default().fg(Color::Gray),

            notification_info: Style::default().fg(Color::Cyan),
            notification_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            status_waiting: Style::default().fg(Color::Yellow),
            status_active: Style::default().fg(Color::Cyan),
            status_done: Style::default().fg(Color::Green),
            status_failed: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            status_muted: Style::default().fg(Color::Gray),

            confidence_high: Style::default().fg(Color::Green),
            confidence_medium: Style::default().fg(Color::Yellow),
            confidence_low: Style::default().fg(Color::Red),
        }
    }

    /// Light-background terminal theme.
    pub fn light() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            header_sparkle: Style::default().fg(Color::Magenta),
            separator: Style::default().fg(Color::Gray),

            text: Style::default().fg(Color::Black),
            dim: Style::default().fg(Color::Gray),
            bold: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
            label: Style::default().fg(Color::DarkGray),
            value: Style::default()
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),

            info: Style::default().fg(Color::Blue),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            tab_active: Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            tab_inactive: Style::default().fg(Color::DarkGray),
            selected: Style::default()
                .bg(Color::Gray)
                .add_modifier(Modifier::BOLD),

            table_header: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            table_border: Style::default().fg(Color::Gray),
            table_row: Style::default().fg(Color::Black),
            table_row_alt: Style::default().fg(Color::DarkGray),

            notification_info: Style::default().fg(Color::Blue),
            notification_error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),

            status_waiting: Style::default().fg(Color::Yellow),
            status_active: Style::default().fg(Color::Blue),
            status_done: Style::default().fg(Color::Green),
            status_failed: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            status_muted: Style::default().fg(Color::DarkGray),

            confidence_high: Style::default().fg(Color::Green),
            confidence_medium: Style::default().fg(Color::Yellow),
            confidence_low: Style::default().fg(Color::Red),
        }
    }

    /// Basic 8-colour ANSI palette without bold modifiers.
    pub fn classic() -> Self {
        Self {
            header: Style::default().fg(Color::Cyan),
            header_sparkle: Style::default().fg(Color::White),
            separator: Style::default().fg(Color::DarkGray),

            text: Style::default().fg(Color::White),
            dim: Style::default().fg(Color::DarkGray),
            bold: Style::default().fg(Color::White),
            label: Style::default().fg(Color::Gray),
            value: Style::default().fg(Color::White),

            info: Style::default().fg(Color::Cyan),
            success: Style::default().fg(Color::Green),
            warning: Style::default().fg(Color::Yellow),
            error: Style::default().fg(Color::Red),

            tab_active: Style::default().fg(Color::Black).bg(Color::White),
            tab_inactive: Style::default().fg(Color::Gray),
            selected: Style::default().fg(Color::Black).bg(Color::White),

            table_header: Style::default().fg(Color::Cyan),
            table_border: Style::default().fg(Color::DarkGray),
            table_row: Style::default().fg(Color::White),
            table_row_alt: Style::default().fg(Color::Gray),

            notification_info: Style::default().fg(Color::Cyan),
            notification_error: Style::default().fg(Color::Red),

            status_waiting: Style::default().fg(Color::Yellow),
            status_active: Style::default().fg(Color::Cyan),
            status_done: Style::default().fg(Color::Green),
            status_failed: Style::default().fg(Color::Red),
            status_muted: Style::default().fg(Color::White),

            confidence_high: Style::default().fg(Color::Green),
            confidence_medium: Style::default().fg(Color::Yellow),
            confidence_low: Style::default().fg(Color::Red),
        }
    }

    /// Choose a theme automatically based on the detected terminal background.
    pub fn auto_detect() -> Self {
        match detect_background() {
            BackgroundType::Light => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Construct a theme by name. Unknown names fall back to `auto_detect`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "light" => Self::light(),
            "dark" => Self::dark(),
            "classic" => Self::classic(),
            _ => Self::auto_detect(),
        }
    }

    // ── Style helpers ────────────────────────────────────────────────────────

    pub fn audit_status_style(&self, status: AuditStatus) -> Style {
        match status {
            AuditStatus::Pending => self.status_waiting,
            AuditStatus::Approved | AuditStatus::Executed => self.status_done,
            AuditStatus::Rejected | AuditStatus::Failed => self.status_failed,
            AuditStatus::Other => self.status_muted,
        }
    }

    pub fn run_status_style(&self, status: RunStatus) -> Style {
        match status {
            RunStatus::Pending => self.status_waiting,
            RunStatus::Running | RunStatus::Suspended => self.status_active,
            RunStatus::Completed => self.status_done,
            RunStatus::Failed => self.status_failed,
            RunStatus::Cancelled | RunStatus::Unknown => self.status_muted,
        }
    }

    /// Failed steps use the error style so they stand out in the detail view.
    pub fn step_status_style(&self, status: StepStatus) -> Style {
        match status {
            StepStatus::Pending => self.status_waiting,
            StepStatus::Running => self.status_active,
            StepStatus::Completed => self.status_done,
            StepStatus::Failed => self.error,
            StepStatus::Skipped | StepStatus::Unknown => self.status_muted,
        }
    }

    /// Confidence in `0.0..=1.0`:
    ///
    /// * `≥ 0.8`    → `confidence_high`
    /// * `0.5–0.8`  → `confidence_medium`
    /// * `< 0.5`    → `confidence_low`
    pub fn confidence_style(&self, confidence: f64) -> Style {
        if confidence >= 0.8 {
            self.confidence_high
        } else if confidence >= 0.5 {
            self.confidence_medium
        } else {
            self.confidence_low
        }
    }

    pub fn connection_style(&self, connected: bool) -> Style {
        if connected {
            self.success
        } else {
            self.warning
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Theme construction ───────────────────────────────────────────────────

    #[test]
    fn test_dark_theme_creation() {
        let t = Theme::dark();
        assert_eq!(t.header.fg, Some(Color::Cyan));
        assert_eq!(t.success.fg, Some(Color::Green));
        assert_eq!(t.error.fg, Some(Color::Red));
        assert_eq!(t.tab_active.bg, Some(Color::Cyan));
        assert_eq!(t.status_waiting.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_light_theme_creation() {
        let t = Theme::light();
        assert_eq!(t.header.fg, Some(Color::Blue));
        assert_eq!(t.text.fg, Some(Color::Black));
        assert_eq!(t.table_row.fg, Some(Color::Black));
        assert_eq!(t.status_active.fg, Some(Color::Blue));
    }

    #[test]
    fn test_classic_theme_has_no_bold() {
        let t = Theme::classic();
        assert!(!t.bold.add_modifier.contains(Modifier::BOLD));
        assert!(!t.status_failed.add_modifier.contains(Modifier::BOLD));
        assert!(!t.notification_error.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Theme::from_name("dark").header.fg, Some(Color::Cyan));
        assert_eq!(Theme::from_name("light").header.fg, Some(Color::Blue));
        assert!(!Theme::from_name("classic")
            .header
            .add_modifier
            .contains(Modifier::BOLD));
        assert!(Theme::from_name("does-not-exist").header.fg.is_some());
    }

    // ── status styles ────────────────────────────────────────────────────────

    #[test]
    fn test_audit_status_style() {
        let t = Theme::dark();
        assert_eq!(t.audit_status_style(AuditStatus::Pending), t.status_waiting);
        assert_eq!(t.audit_status_style(AuditStatus::Executed), t.status_done);
        assert_eq!(t.audit_status_style(AuditStatus::Rejected), t.status_failed);
        assert_eq!(t.audit_status_style(AuditStatus::Other), t.status_muted);
    }

    #[test]
    fn test_run_status_style() {
        let t = Theme::dark();
        assert_eq!(t.run_status_style(RunStatus::Running), t.status_active);
        assert_eq!(t.run_status_style(RunStatus::Suspended), t.status_active);
        assert_eq!(t.run_status_style(RunStatus::Failed), t.status_failed);
        assert_eq!(t.run_status_style(RunStatus::Cancelled), t.status_muted);
    }

    #[test]
    fn test_failed_step_uses_error_style() {
        let t = Theme::dark();
        assert_eq!(t.step_status_style(StepStatus::Failed), t.error);
        assert_ne!(t.step_status_style(StepStatus::Completed), t.error);
    }

    #[test]
    fn test_confidence_thresholds() {
        let t = Theme::dark();
        assert_eq!(t.confidence_style(0.95).fg, Some(Color::Green));
        assert_eq!(t.confidence_style(0.8).fg, Some(Color::Green));
        assert_eq!(t.confidence_style(0.6).fg, Some(Color::Yellow));
        assert_eq!(t.confidence_style(0.2).fg, Some(Color::Red));
    }

    #[test]
    fn test_connection_style() {
        let t = Theme::dark();
        assert_eq!(t.connection_style(true), t.success);
        assert_eq!(t.connection_style(false), t.warning);
    }
}
