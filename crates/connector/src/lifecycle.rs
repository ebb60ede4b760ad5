//! Process lifecycle: start-up, activation and teardown.

use serde_json::Value as JsonValue;
use tracing::instrument;

use checkout_pos_core::Environment;

use crate::audit::{AuditReport, SystemAudit};
use crate::connection::{ConnectionController, ConnectionError};
use crate::db::options::get_string;
use crate::db::{OptionStore, RepositoryError, keys};
use crate::guard::EnvironmentGuard;
use crate::state::AppState;

/// Whether the plugin is active. An unset flag counts as active.
///
/// # Errors
///
/// Returns the store's error if the flag cannot be read.
pub async fn is_plugin_active(options: &dyn OptionStore) -> Result<bool, RepositoryError> {
    Ok(get_string(options, keys::PLUGIN_ACTIVE)
        .await?
        .is_none_or(|flag| flag == "yes"))
}

/// Stored environment selection.
///
/// # Errors
///
/// Returns the store's error if the option cannot be read.
pub async fn current_environment(options: &dyn OptionStore) -> Result<Environment, RepositoryError> {
    Ok(get_string(options, keys::TEST_ENVIRONMENT)
        .await?
        .map_or(Environment::Production, |flag| {
            Environment::from_test_flag(&flag)
        }))
}

/// Start-up pass: resolve the endpoints from the stored selection, then run
/// the domain and environment-selection checks.
///
/// # Errors
///
/// Returns an error if the stored records cannot be read or cleared.
#[instrument(skip(state))]
pub async fn initialize(state: &AppState) -> Result<(), ConnectionError> {
    let environment = current_environment(state.options()).await?;
    state.reload_endpoints(environment);

    let guard = EnvironmentGuard::new(state);
    guard.check_site_domain().await?;
    guard.ensure_environment_selected().await?;
    Ok(())
}

/// Mark the plugin active and audit the host. A failed audit deactivates it
/// again.
///
/// # Errors
///
/// Returns an error if the flag cannot be written or a deactivation fails.
#[instrument(skip(state))]
pub async fn activate(state: &AppState) -> Result<AuditReport, ConnectionError> {
    state
        .options()
        .set(keys::PLUGIN_ACTIVE, &JsonValue::String("yes".to_string()))
        .await?;
    tracing::info!("Plugin activated");

    let report = SystemAudit::new(state).perform().await;
    if !report.passed {
        tracing::warn!("System audit failed, deactivating");
        deactivate(state).await?;
    }
    Ok(report)
}

/// Drop the connection and mark the plugin inactive.
///
/// # Errors
///
/// Returns an error if the records cannot be cleared or the flag written.
#[instrument(skip(state))]
pub async fn deactivate(state: &AppState) -> Result<(), ConnectionError> {
    ConnectionController::new(state).force_disconnect().await?;
    state
        .options()
        .set(keys::PLUGIN_ACTIVE, &JsonValue::String("no".to_string()))
        .await?;
    tracing::info!("Plugin deactivated");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::MemoryOptionStore;

    #[tokio::test]
    async fn test_unset_flag_means_active() {
        let options = MemoryOptionStore::default();
        assert!(is_plugin_active(&options).await.unwrap());

        options.set(keys::PLUGIN_ACTIVE, &json!("no")).await.unwrap();
        assert!(!is_plugin_active(&options).await.unwrap());

        options.set(keys::PLUGIN_ACTIVE, &json!(true)).await.unwrap();
        assert!(is_plugin_active(&options).await.unwrap());
    }

    #[tokio::test]
    async fn test_current_environment() {
        let options = MemoryOptionStore::default();
        assert_eq!(
            current_environment(&options).await.unwrap(),
            Environment::Production
        );

        options
            .set(keys::TEST_ENVIRONMENT, &json!("yes"))
            .await
            .unwrap();
        assert_eq!(current_environment(&options).await.unwrap(), Environment::Test);
    }
}
