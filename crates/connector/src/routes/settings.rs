//! Checkout POS settings page and admin actions.

use askama::Template;
use axum::{
    Form, Router,
    extract::{Query, State},
    response::{AppendHeaders, Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::instrument;

use checkout_pos_core::{MerchantDetails, SyncDirection, SyncTarget};

use crate::audit::{AuditEntry, SystemAudit};
use crate::connection::{ConnectionController, ConnectionError};
use crate::db::options::get_string;
use crate::db::{ConnectionRepository, keys};
use crate::error::AppError;
use crate::guard::{EnvironmentGuard, SettingChange};
use crate::lifecycle;
use crate::middleware::{RequireStoreManager, RequireUser};
use crate::models::User;
use crate::notices::Notice;
use crate::state::AppState;

pub const SETTINGS_PATH: &str = "/kis";

// =============================================================================
// Templates
// =============================================================================

/// Merchant details as shown on the page.
#[derive(Debug, Clone)]
pub struct MerchantView {
    pub name: String,
    pub email: String,
    pub merchant_id: String,
    pub mode: String,
    pub phone: String,
    pub address: String,
}

impl From<&MerchantDetails> for MerchantView {
    fn from(merchant: &MerchantDetails) -> Self {
        Self {
            name: merchant.merchant_name.clone().unwrap_or_default(),
            email: merchant.owner_email.clone(),
            merchant_id: merchant
                .merchant_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            mode: merchant.merchant_mode.clone().unwrap_or_default(),
            phone: merchant.owner_phone_number.clone().unwrap_or_default(),
            address: merchant.formatted_address(),
        }
    }
}

/// One sync-direction select.
#[derive(Debug, Clone)]
pub struct SyncSelect {
    pub name: &'static str,
    pub title: &'static str,
    pub options: Vec<SyncOption>,
}

#[derive(Debug, Clone)]
pub struct SyncOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

/// Settings page template.
#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub site_domain: String,
    pub plugin_active: bool,
    pub connected: bool,
    pub can_manage: bool,
    pub merchant: Option<MerchantView>,
    pub environment_label: String,
    pub cancel_url: String,
    pub test_environment: bool,
    pub auth_params: bool,
    pub tax_calculation: bool,
    pub sync_selects: Vec<SyncSelect>,
    pub notices: Vec<Notice>,
    pub audit: Vec<AuditEntry>,
}

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(SETTINGS_PATH, get(settings_page))
        .route("/kis/connect", get(connect))
        .route("/kis/connect/woocommerce", get(connect_woocommerce))
        .route("/kis/settings", post(save_settings))
        .route("/kis/activate", post(activate))
        .route("/kis/deactivate", post(deactivate))
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Commands Checkout POS and the page itself append to the settings URL.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsCommands {
    pub woo_auth_success: Option<String>,
    pub kis_oauth_cancel: Option<String>,
    pub merchant_details: Option<String>,
    pub kis_auth_error: Option<String>,
    pub sys_audit: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Map failures the controller already turned into a notice to `None`.
fn tolerate<T>(result: Result<T, ConnectionError>) -> Result<Option<T>, AppError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(
            e @ (ConnectionError::PermissionDenied
            | ConnectionError::InvalidPayload(_)
            | ConnectionError::NotConnected
            | ConnectionError::MissingApplication
            | ConnectionError::Inactive),
        ) => {
            tracing::info!(error = %e, "Settings command not applied");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Settings Page
// =============================================================================

/// Run the callback commands, then render the settings page.
///
/// GET /kis
#[instrument(skip(state, user, commands), fields(user_id = %user.id))]
async fn settings_page(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(commands): Query<SettingsCommands>,
) -> Result<Response, AppError> {
    let controller = ConnectionController::new(&state);

    if present(commands.woo_auth_success.as_ref()).is_some() {
        tolerate(controller.complete_local_authorization().await)?;
    }
    if present(commands.kis_oauth_cancel.as_ref()).is_some() {
        tolerate(controller.disconnect(true, false, Some(&user)).await)?;
    }
    if let Some(payload) = present(commands.merchant_details.as_ref()) {
        tolerate(controller.complete_connect(Some(&user), payload).await)?;
    }
    if let Some(code) = present(commands.kis_auth_error.as_ref()) {
        state.notices().push_for(user.id, Notice::for_auth_error(code));
    }
    if present(commands.sys_audit.as_ref()).is_some() {
        SystemAudit::new(&state).perform().await;
    }

    let template = build_template(&state, &user).await?;
    Ok(Html(template.render()?).into_response())
}

async fn build_template(state: &AppState, viewer: &User) -> Result<SettingsTemplate, AppError> {
    let options = state.options();
    let connection = ConnectionRepository::new(options).load(state.users()).await?;
    let controller = ConnectionController::new(state);
    let flag = |value: Option<String>| value.is_some_and(|v| v == "yes");

    let mut sync_selects = Vec::with_capacity(3);
    for (target, title) in [
        (SyncTarget::Product, "Product export"),
        (SyncTarget::Order, "Order export"),
        (SyncTarget::Stock, "Stock export"),
    ] {
        let current = get_string(options, target.option_key())
            .await?
            .and_then(|v| v.parse::<SyncDirection>().ok())
            .unwrap_or_default();
        sync_selects.push(SyncSelect {
            name: target.option_key(),
            title,
            options: target
                .allowed()
                .iter()
                .map(|direction| SyncOption {
                    value: direction.as_str(),
                    label: direction.label(),
                    selected: *direction == current,
                })
                .collect(),
        });
    }

    Ok(SettingsTemplate {
        site_domain: state.local_domain(),
        plugin_active: lifecycle::is_plugin_active(options).await?,
        connected: connection.is_connected,
        can_manage: viewer.can_manage_connection(),
        merchant: connection.merchant.as_ref().map(MerchantView::from),
        environment_label: state.endpoints().label(),
        cancel_url: controller.cancel_url()?.into(),
        test_environment: flag(get_string(options, keys::TEST_ENVIRONMENT).await?),
        auth_params: flag(get_string(options, keys::AUTH_PARAMS).await?),
        tax_calculation: flag(get_string(options, keys::TAX_CALCULATION).await?),
        sync_selects,
        notices: state.notices().drain_for(viewer.id),
        audit: SystemAudit::new(state).take_report().await,
    })
}

// =============================================================================
// Connect
// =============================================================================

/// Send the admin to Checkout POS to authorize the connection.
///
/// GET /kis/connect
#[instrument(skip(state, _user))]
async fn connect(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
) -> Result<Redirect, AppError> {
    let url = ConnectionController::new(&state).begin_connect().await?;
    Ok(Redirect::to(url.as_str()))
}

/// Register the store-side OAuth application and hand it to Checkout POS.
///
/// GET /kis/connect/woocommerce
#[instrument(skip(state, _user))]
async fn connect_woocommerce(
    State(state): State<AppState>,
    RequireStoreManager(_user): RequireStoreManager,
) -> Result<Redirect, AppError> {
    let url = ConnectionController::new(&state)
        .register_application()
        .await?;
    Ok(Redirect::to(url.as_str()))
}

// =============================================================================
// Settings Form
// =============================================================================

/// Settings form. Checkboxes are absent when unchecked.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub kis_test_environment_enabled: String,
    pub kis_woo_auth_params_enabled: Option<String>,
    pub kis_woo_tax_calc_enabled: Option<String>,
    pub kis_product_sync_direction: String,
    pub kis_order_sync_direction: String,
    pub kis_stock_sync_direction: String,
}

const fn yes_no(checked: bool) -> &'static str {
    if checked { "yes" } else { "no" }
}

fn parse_direction(target: SyncTarget, raw: &str) -> Result<SyncDirection, AppError> {
    raw.parse::<SyncDirection>()
        .ok()
        .filter(|direction| target.accepts(*direction))
        .ok_or_else(|| AppError::BadRequest(format!("invalid {}: {raw}", target.option_key())))
}

/// Save the settings form.
///
/// POST /kis/settings
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
async fn save_settings(
    State(state): State<AppState>,
    RequireStoreManager(user): RequireStoreManager,
    Form(form): Form<SettingsForm>,
) -> Result<Response, AppError> {
    let directions = [
        (
            SyncTarget::Product,
            parse_direction(SyncTarget::Product, &form.kis_product_sync_direction)?,
        ),
        (
            SyncTarget::Order,
            parse_direction(SyncTarget::Order, &form.kis_order_sync_direction)?,
        ),
        (
            SyncTarget::Stock,
            parse_direction(SyncTarget::Stock, &form.kis_stock_sync_direction)?,
        ),
    ];
    let environment = match form.kis_test_environment_enabled.as_str() {
        flag @ ("yes" | "no") => flag,
        other => {
            return Err(AppError::BadRequest(format!(
                "invalid environment selection: {other}"
            )));
        }
    };

    let options = state.options();
    for (target, direction) in directions {
        options
            .set(
                target.option_key(),
                &JsonValue::String(direction.as_str().to_string()),
            )
            .await?;
    }
    options
        .set(
            keys::TAX_CALCULATION,
            &JsonValue::String(yes_no(form.kis_woo_tax_calc_enabled.is_some()).to_string()),
        )
        .await?;

    let watched = [
        (keys::TEST_ENVIRONMENT, environment),
        (
            keys::AUTH_PARAMS,
            yes_no(form.kis_woo_auth_params_enabled.is_some()),
        ),
    ];
    let guard = EnvironmentGuard::new(&state);
    let mut reload = false;
    for (key, new) in watched {
        let old = get_string(options, key).await?;
        options.set(key, &JsonValue::String(new.to_string())).await?;
        // Adding a setting for the first time is not a change.
        let Some(old) = old else {
            continue;
        };
        if guard.on_setting_changed(key, new, &old).await? == SettingChange::Reloaded {
            reload = true;
        }
    }

    state
        .notices()
        .push_for(user.id, Notice::success("Your settings have been saved."));

    let redirect = Redirect::to(SETTINGS_PATH);
    if reload {
        Ok((AppendHeaders([("Refresh", "0")]), redirect).into_response())
    } else {
        Ok(redirect.into_response())
    }
}

// =============================================================================
// Activation
// =============================================================================

/// Activate the plugin and run the system audit.
///
/// POST /kis/activate
#[instrument(skip(state, _user))]
async fn activate(
    State(state): State<AppState>,
    RequireStoreManager(_user): RequireStoreManager,
) -> Result<Redirect, AppError> {
    lifecycle::activate(&state).await?;
    Ok(Redirect::to(SETTINGS_PATH))
}

/// Deactivate the plugin, dropping the connection.
///
/// POST /kis/deactivate
#[instrument(skip(state, _user))]
async fn deactivate(
    State(state): State<AppState>,
    RequireStoreManager(_user): RequireStoreManager,
) -> Result<Redirect, AppError> {
    lifecycle::deactivate(&state).await?;
    Ok(Redirect::to(SETTINGS_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direction_respects_target() {
        assert!(parse_direction(SyncTarget::Order, "both").is_ok());
        assert!(parse_direction(SyncTarget::Product, "both").is_err());
        assert!(parse_direction(SyncTarget::Stock, "sideways").is_err());
    }

    #[test]
    fn test_present_ignores_blank_values() {
        assert_eq!(present(Some(&"  ".to_string())), None);
        assert_eq!(present(Some(&"1".to_string())), Some("1"));
        assert_eq!(present(None), None);
    }

    #[test]
    fn test_tolerate_keeps_server_errors() {
        assert!(matches!(
            tolerate::<()>(Err(ConnectionError::PermissionDenied)),
            Ok(None)
        ));
        assert!(
            tolerate::<()>(Err(ConnectionError::Repository(
                crate::db::RepositoryError::NotFound
            )))
            .is_err()
        );
    }
}
