mod bootstrap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use monitor_core::settings::{Preferences, Settings};
use monitor_data::ApiClient;
use monitor_runtime::{AgentRunBrowser, SyncConfig, Synchronizer};
use monitor_ui::app::{App, AppLinks};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_preferences();

    let app_dir = bootstrap::ensure_directories()?;
    let log_path = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref(), &app_dir)?;

    tracing::info!("automation-monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        api = %settings.api_url,
        role = %settings.resolved_role,
        realtime = !settings.no_realtime,
        log = %log_path.display(),
        "configuration loaded"
    );

    let client = Arc::new(ApiClient::new(
        &settings.api_url,
        Duration::from_secs(settings.request_timeout),
    )?);

    let sync_config = SyncConfig {
        interval: settings.refresh_period(),
        audit_limit: settings.audit_limit,
        run_page_size: settings.run_page_size,
    };
    let (dashboard_rx, sync_handle) = Synchronizer::new(Arc::clone(&client), sync_config).start();

    let (runs_rx, runs_handle) = AgentRunBrowser::new(
        Arc::clone(&client),
        settings.agent_refresh_period(),
        settings.run_page_size,
    )
    .start();
    let runs_abort = runs_handle.abort_handle();

    let links = AppLinks {
        backend: client,
        refresher: sync_handle.refresher(),
        runs: runs_handle,
        realtime_base: settings.realtime_url(),
        prefs_path: Some(Preferences::config_path()),
        approver: settings.approver.clone(),
    };

    let app = App::new(
        &settings.theme,
        settings.timezone.clone(),
        settings.resolved_role.clone(),
        settings.run_page_size,
        links,
    );

    // Ctrl+C is also caught at the OS level so that a signal received while
    // the terminal is in raw mode still shuts the background tasks down.
    tokio::select! {
        result = app.run(dashboard_rx, runs_rx) => {
            sync_handle.abort();
            runs_abort.abort();
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; shutting down");
            sync_handle.abort();
            runs_abort.abort();
        }
    }

    tracing::info!("automation-monitor stopped");
    Ok(())
}
