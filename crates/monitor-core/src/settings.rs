use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::Role;
use crate::time_utils::TimezoneHandler;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Terminal dashboard for the Odoo AI Automation backend
#[derive(Parser, Debug, Clone)]
#[command(
    name = "automation-monitor",
    about = "Terminal dashboard for the Odoo AI Automation backend",
    version
)]
pub struct Settings {
    /// Backend REST base URL
    #[arg(long, env = "AUTOMATION_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Realtime websocket base URL (derived from --api-url when omitted)
    #[arg(long, env = "AUTOMATION_WS_URL")]
    pub ws_url: Option<String>,

    /// Dashboard role (defaults to the last used role, then "overview")
    #[arg(long)]
    pub role: Option<String>,

    /// Do not open the realtime websocket channel
    #[arg(long)]
    pub no_realtime: bool,

    /// Dashboard polling interval in seconds (1-300)
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..=300))]
    pub refresh_interval: u64,

    /// Agent run browser polling interval in seconds (1-300)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..=300))]
    pub agent_refresh_interval: u64,

    /// Number of audit log entries to fetch
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub audit_limit: u32,

    /// Agent run list page size
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(u32).range(1..=500))]
    pub run_page_size: u32,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..=120))]
    pub request_timeout: u64,

    /// Name recorded as the approver on approve / reject actions
    #[arg(long, env = "AUTOMATION_APPROVER", default_value = "dashboard")]
    pub approver: String,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "classic", "auto"])]
    pub theme: String,

    /// Timezone used to display timestamps (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path (defaults to ~/.automation-monitor/logs/monitor.log)
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved preferences
    #[arg(long)]
    pub clear: bool,

    /// Resolved dashboard role; filled in by the loader.
    #[arg(skip)]
    pub resolved_role: Role,
}

impl Settings {
    /// Websocket base URL: `--ws-url` if given, otherwise the API URL with
    /// its scheme swapped to `ws` / `wss`.
    pub fn realtime_base_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.trim_end_matches('/').to_string();
        }
        let api = self.api_url.trim_end_matches('/');
        if let Some(rest) = api.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = api.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            api.to_string()
        }
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }

    pub fn agent_refresh_period(&self) -> Duration {
        Duration::from_secs(self.agent_refresh_interval)
    }

    /// `None` when the realtime channel is disabled.
    pub fn realtime_url(&self) -> Option<String> {
        (!self.no_realtime).then(|| self.realtime_base_url())
    }
}

// ── Preferences ────────────────────────────────────────────────────────────────

/// UI preferences persisted across sessions in
/// `~/.automation-monitor/preferences.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl Preferences {
    /// Return the default path to the preferences file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the preferences path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".automation-monitor").join("preferences.json")
    }

    /// Load preferences from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// The persisted role, or `overview` when none was saved.
    pub fn role(&self) -> Role {
        self.dashboard_role
            .as_deref()
            .map(Role::new)
            .unwrap_or_default()
    }

    /// Atomically write preferences to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Persist a newly selected role, keeping the other stored fields.
    pub fn store_role(path: &std::path::Path, role: &Role) -> Result<(), std::io::Error> {
        let mut prefs = Self::load_from(path);
        prefs.dashboard_role = Some(role.as_str().to_string());
        prefs.save_to(path)
    }

    /// Delete the preferences file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with persisted preferences where no explicit
    /// CLI value was provided, resolve `"auto"` values, and persist the result.
    pub fn load_with_preferences() -> Self {
        Self::load_with_preferences_impl(std::env::args_os().collect(), &Preferences::config_path())
    }

    /// Full implementation – accepts args and an explicit preferences path so
    /// that tests can redirect to a temporary directory.
    pub fn load_with_preferences_impl(
        args: Vec<std::ffi::OsString>,
        prefs_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = Preferences::clear_at(prefs_path);
            settings.resolved_role = settings.role.as_deref().map(Role::new).unwrap_or_default();
            return Self::resolve_auto_values(settings);
        }

        let prefs = Preferences::load_from(prefs_path);

        // CLI always wins over the stored role.
        settings.resolved_role = match settings.role.as_deref() {
            Some(r) => Role::new(r),
            None => prefs.role(),
        };
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = prefs.theme.clone() {
                settings.theme = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        let updated = Preferences {
            dashboard_role: Some(settings.resolved_role.as_str().to_string()),
            theme: Some(settings.theme.clone()),
        };
        if updated != prefs {
            if let Err(e) = updated.save_to(prefs_path) {
                tracing::warn!(error = %e, path = %prefs_path.display(), "failed to persist preferences");
            }
        }

        settings
    }

    /// Resolve `"auto"` sentinel values and apply the `--debug` flag.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if !TimezoneHandler::validate_timezone(&settings.timezone) {
            tracing::warn!(timezone = %settings.timezone, "unknown timezone, using UTC");
            settings.timezone = "UTC".to_string();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
