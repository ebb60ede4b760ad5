//! Connection maintenance commands.
//!
//! Both commands build the same state the server runs with, so they need
//! the full connector environment (see `ConnectorConfig::from_env`).

use checkout_pos_connector::audit::SystemAudit;
use checkout_pos_connector::config::ConnectorConfig;
use checkout_pos_connector::connection::ConnectionController;
use checkout_pos_connector::db;
use checkout_pos_connector::lifecycle;
use checkout_pos_connector::state::{AppState, Backends};
use checkout_pos_core::AuditSeverity;

async fn connector_state() -> Result<AppState, Box<dyn std::error::Error>> {
    let config = ConnectorConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let backends = Backends::production(pool, &config)?;
    let state = AppState::new(config, backends);

    let environment = lifecycle::current_environment(state.options()).await?;
    state.reload_endpoints(environment);
    Ok(state)
}

/// Run the system audit and log every message.
pub async fn audit() -> Result<(), Box<dyn std::error::Error>> {
    let state = connector_state().await?;
    tracing::info!(environment = %state.endpoints().label(), "Running system audit...");

    let report = SystemAudit::new(&state).perform().await;
    for entry in &report.entries {
        match entry.severity {
            AuditSeverity::Error => tracing::error!("{}", entry.message),
            AuditSeverity::Warning => tracing::warn!("{}", entry.message),
            AuditSeverity::Success => tracing::info!("{}", entry.message),
        }
    }

    if report.passed {
        Ok(())
    } else {
        Err("system audit failed".into())
    }
}

/// Disconnect from Checkout POS.
///
/// Without `--force` nothing happens: a CLI run has no acting user, and an
/// unforced disconnect needs one with the connection permission.
pub async fn disconnect(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !force {
        tracing::warn!("Refusing to disconnect without --force");
        return Ok(());
    }

    let state = connector_state().await?;
    let controller = ConnectionController::new(&state);
    let was_connected = controller.is_connected().await?;
    let webhooks_removed = controller.force_disconnect().await?;

    tracing::info!(was_connected, webhooks_removed, "Connection cleared");
    Ok(())
}
