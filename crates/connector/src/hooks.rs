//! Host event dispatch.
//!
//! The host site forwards the events the connector cares about as signed
//! JSON documents, tagged by event name. Each event maps to exactly one
//! handler below.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use checkout_pos_core::{ProductId, UserId};

use crate::audit::{AuditReport, HostReport};
use crate::connection::{ConnectionController, ConnectionError};
use crate::db::deleted_products::PRODUCT_POST_TYPE;
use crate::db::DeletedProductRepository;
use crate::guard::{EnvironmentGuard, SettingChange};
use crate::lifecycle;
use crate::models::User;
use crate::state::AppState;

/// An event raised by the host site.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HookEvent {
    Init,
    OptionUpdated {
        key: String,
        #[serde(default)]
        new: String,
        #[serde(default)]
        old: String,
    },
    AccessTokenGranted {
        consumer_key: String,
        user_id: UserId,
    },
    ProductDeleted {
        product_id: ProductId,
        post_type: String,
    },
    ProductTrashed {
        product_id: ProductId,
        post_type: String,
    },
    ProductUntrashed {
        product_id: ProductId,
    },
    HostEnvironment(HostReport),
    UserUpserted(User),
    UserDeleted {
        user_id: UserId,
    },
    Activate,
    Deactivate,
}

impl HookEvent {
    /// Event name as sent on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::OptionUpdated { .. } => "option_updated",
            Self::AccessTokenGranted { .. } => "access_token_granted",
            Self::ProductDeleted { .. } => "product_deleted",
            Self::ProductTrashed { .. } => "product_trashed",
            Self::ProductUntrashed { .. } => "product_untrashed",
            Self::HostEnvironment(_) => "host_environment",
            Self::UserUpserted(_) => "user_upserted",
            Self::UserDeleted { .. } => "user_deleted",
            Self::Activate => "activate",
            Self::Deactivate => "deactivate",
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookOutcome {
    pub event: &'static str,
    /// Whether the event changed any stored state.
    pub changed: bool,
    /// Whether the admin page has to be reloaded.
    pub reload: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditReport>,
}

impl HookOutcome {
    const fn new(event: &'static str, changed: bool) -> Self {
        Self {
            event,
            changed,
            reload: false,
            audit: None,
        }
    }
}

/// Run the handler registered for `event`.
///
/// # Errors
///
/// Returns the handler's error; remote failures inside handlers are logged
/// and never surface here.
#[instrument(skip(state, event), fields(event = event.name()))]
pub async fn dispatch(state: &AppState, event: HookEvent) -> Result<HookOutcome, ConnectionError> {
    let name = event.name();
    let outcome = match event {
        HookEvent::Init => {
            lifecycle::initialize(state).await?;
            HookOutcome::new(name, false)
        }
        HookEvent::OptionUpdated { key, new, old } => {
            let change = EnvironmentGuard::new(state)
                .on_setting_changed(&key, &new, &old)
                .await?;
            let reloaded = change == SettingChange::Reloaded;
            HookOutcome {
                reload: reloaded,
                ..HookOutcome::new(name, reloaded)
            }
        }
        HookEvent::AccessTokenGranted {
            consumer_key,
            user_id,
        } => {
            let owner_set = ConnectionController::new(state)
                .handle_access_token_granted(&consumer_key, user_id)
                .await?;
            HookOutcome::new(name, owner_set)
        }
        HookEvent::ProductDeleted {
            product_id,
            post_type,
        }
        | HookEvent::ProductTrashed {
            product_id,
            post_type,
        } => {
            let added = if post_type == PRODUCT_POST_TYPE {
                DeletedProductRepository::new(state.options())
                    .mark_deleted(product_id, chrono::Utc::now().timestamp())
                    .await?
            } else {
                false
            };
            HookOutcome::new(name, added)
        }
        HookEvent::ProductUntrashed { product_id } => {
            let removed = DeletedProductRepository::new(state.options())
                .restore(product_id)
                .await?;
            HookOutcome::new(name, removed)
        }
        HookEvent::HostEnvironment(report) => {
            report.store(state.options()).await?;
            HookOutcome::new(name, true)
        }
        HookEvent::UserUpserted(user) => {
            state.users().upsert(&user).await?;
            HookOutcome::new(name, true)
        }
        HookEvent::UserDeleted { user_id } => {
            let deleted = state.users().delete(user_id).await?;
            HookOutcome::new(name, deleted)
        }
        HookEvent::Activate => {
            let report = lifecycle::activate(state).await?;
            HookOutcome {
                audit: Some(report),
                ..HookOutcome::new(name, true)
            }
        }
        HookEvent::Deactivate => {
            lifecycle::deactivate(state).await?;
            HookOutcome::new(name, true)
        }
    };

    tracing::debug!(changed = outcome.changed, "Handled host event");
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_events_parse_by_tag() {
        let event: HookEvent = serde_json::from_value(json!({
            "event": "product_trashed",
            "product_id": 42,
            "post_type": "product"
        }))
        .unwrap();
        assert_eq!(
            event,
            HookEvent::ProductTrashed {
                product_id: ProductId::new(42),
                post_type: "product".to_string()
            }
        );

        let event: HookEvent = serde_json::from_value(json!({
            "event": "option_updated",
            "key": "kis_test_environment_enabled",
            "new": "yes"
        }))
        .unwrap();
        assert_eq!(event.name(), "option_updated");
        assert!(matches!(event, HookEvent::OptionUpdated { ref old, .. } if old.is_empty()));

        let event: HookEvent = serde_json::from_value(json!({
            "event": "host_environment",
            "ini": {"memory_limit": "256M"},
            "active_plugins": ["woocommerce/woocommerce.php"],
            "options": {"woocommerce_calc_taxes": "yes"}
        }))
        .unwrap();
        assert!(matches!(
            event,
            HookEvent::HostEnvironment(ref r)
                if r.active_plugins.len() == 1
                    && r.options.get("woocommerce_calc_taxes") == Some(&json!("yes"))
        ));

        let event: HookEvent = serde_json::from_value(json!({
            "event": "user_upserted",
            "id": 7,
            "email": "owner@shop.fi",
            "display_name": "Owner",
            "role": "shop_manager"
        }))
        .unwrap();
        assert!(matches!(event, HookEvent::UserUpserted(ref u) if u.can_manage_connection()));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result = serde_json::from_value::<HookEvent>(json!({"event": "plugins_loaded"}));
        assert!(result.is_err());
    }
}
