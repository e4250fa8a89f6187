use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const APP_DIR: &str = ".automation-monitor";

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Create `<base>/.automation-monitor/logs/` and return the app directory.
pub fn ensure_directories_in(base: &Path) -> anyhow::Result<PathBuf> {
    let dir = base.join(APP_DIR);
    std::fs::create_dir_all(dir.join("logs"))?;
    Ok(dir)
}

/// `~/.automation-monitor/`, or `./.automation-monitor/` without a home directory.
pub fn ensure_directories() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    ensure_directories_in(&home)
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map the CLI level names onto an [`EnvFilter`] directive.
///
/// `RUST_LOG` wins when set.
pub fn filter_directive(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

/// Initialise the global `tracing` subscriber, writing to `log_file` or
/// `<app_dir>/logs/monitor.log`.
///
/// The terminal belongs to the TUI, so nothing is written to stderr.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>, app_dir: &Path) -> anyhow::Result<PathBuf> {
    let path = log_file
        .cloned()
        .unwrap_or_else(|| app_dir.join("logs").join("monitor.log"));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()?;

    Ok(path)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories_in() {
        let tmp = TempDir::new().expect("tempdir");
        let dir = ensure_directories_in(tmp.path()).expect("ensure_directories_in");

        assert_eq!(dir, tmp.path().join(".automation-monitor"));
        assert!(dir.join("logs").is_dir(), "logs subdir must exist");

        // Idempotent.
        ensure_directories_in(tmp.path()).expect("second call");
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("DEBUG"), "debug");
        assert_eq!(filter_directive("critical"), "debug");
        assert_eq!(filter_directive("WARNING"), "warn");
        assert_eq!(filter_directive("ERROR"), "error");
        assert_eq!(filter_directive("INFO"), "info");
        assert_eq!(filter_directive("verbose"), "info");
    }

    #[test]
    fn test_setup_logging_creates_log_file() {
        let tmp = TempDir::new().expect("tempdir");
        let custom = tmp.path().join("nested").join("custom.log");

        // Only one global subscriber per process; a second init is an error
        // but the file must still be created first.
        let _ = setup_logging("INFO", Some(&custom), tmp.path());

        assert!(custom.is_file(), "log file must be created");
    }
}
