//! Domain-change detection and environment switching.

#![allow(clippy::unwrap_used)]

use serde_json::json;

use checkout_pos_connector::config::EndpointOverrides;
use checkout_pos_connector::db::{ConnectionRepository, OptionStore, keys};
use checkout_pos_connector::endpoints::RemoteEndpoints;
use checkout_pos_connector::guard::{EnvironmentGuard, SettingChange};
use checkout_pos_connector::lifecycle;
use checkout_pos_connector::notices::NoticeLevel;
use checkout_pos_core::Environment;
use checkout_pos_integration_tests::{TestContext, test_config};

#[tokio::test]
async fn test_domain_change_disconnects_with_one_warning() {
    let ctx = TestContext::new();
    let owner = ctx.connect().await.unwrap();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("no")).await.unwrap();
    ctx.set_option(keys::CONNECTED_SITE_URL, json!("https://old-shop.example.fi/"))
        .await
        .unwrap();
    ctx.state.notices().drain_for(owner.id);

    lifecycle::initialize(&ctx.state).await.unwrap();

    assert!(!ctx.is_connected().await.unwrap());
    // Raised at start-up, so any store manager may see it.
    let notices = ctx.state.notices().drain_for(owner.id);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert!(notices[0].message.contains("https://old-shop.example.fi/"));
    assert!(notices[0].message.contains("https://shop.example.fi/"));
    assert_eq!(ctx.pos.revoke_calls().await.len(), 1);

    // The recorded URL is gone, so the next pass is quiet.
    assert!(
        ConnectionRepository::new(ctx.options.as_ref())
            .connected_site_url()
            .await
            .unwrap()
            .is_none()
    );
    lifecycle::initialize(&ctx.state).await.unwrap();
    assert!(ctx.state.notices().is_empty());
}

#[tokio::test]
async fn test_same_domain_keeps_connection() {
    let ctx = TestContext::new();
    let owner = ctx.connect().await.unwrap();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("no")).await.unwrap();
    ctx.state.notices().drain_for(owner.id);

    lifecycle::initialize(&ctx.state).await.unwrap();

    assert!(ctx.is_connected().await.unwrap());
    assert!(ctx.state.notices().is_empty());
    assert!(ctx.pos.revoke_calls().await.is_empty());
}

#[tokio::test]
async fn test_switching_to_test_environment_disconnects_before_reload() {
    let ctx = TestContext::new();
    ctx.connect().await.unwrap();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("no")).await.unwrap();
    lifecycle::initialize(&ctx.state).await.unwrap();
    let production = ctx.state.endpoints();
    assert_eq!(production.environment, Environment::Production);

    ctx.set_option(keys::TEST_ENVIRONMENT, json!("yes")).await.unwrap();
    let change = EnvironmentGuard::new(&ctx.state)
        .on_setting_changed(keys::TEST_ENVIRONMENT, "yes", "no")
        .await
        .unwrap();

    assert_eq!(change, SettingChange::Reloaded);
    assert!(!ctx.is_connected().await.unwrap());

    // The remote side was told through the production endpoint, so the
    // disconnect ran before the endpoints switched.
    let calls = ctx.pos.revoke_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].delete_url, production.kassa_delete_oauth_url);

    let reloaded = ctx.state.endpoints();
    assert_eq!(reloaded.environment, Environment::Test);
    assert_eq!(
        reloaded,
        RemoteEndpoints::resolve(Environment::Test, &EndpointOverrides::default())
    );
}

#[tokio::test]
async fn test_auth_params_change_keeps_stored_environment() {
    let ctx = TestContext::new();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("yes")).await.unwrap();
    lifecycle::initialize(&ctx.state).await.unwrap();

    let change = EnvironmentGuard::new(&ctx.state)
        .on_setting_changed(keys::AUTH_PARAMS, "yes", "no")
        .await
        .unwrap();

    assert_eq!(change, SettingChange::Reloaded);
    assert_eq!(ctx.state.endpoints().environment, Environment::Test);
}

#[tokio::test]
async fn test_unwatched_or_unchanged_settings_are_ignored() {
    let ctx = TestContext::new();
    ctx.connect().await.unwrap();
    let guard = EnvironmentGuard::new(&ctx.state);

    for (key, new, old) in [
        (keys::TAX_CALCULATION, "yes", "no"),
        (keys::TEST_ENVIRONMENT, "no", "no"),
        (keys::TEST_ENVIRONMENT, "", "yes"),
    ] {
        let change = guard.on_setting_changed(key, new, old).await.unwrap();
        assert_eq!(change, SettingChange::Unchanged, "{key}: {old} -> {new}");
    }
    assert!(ctx.is_connected().await.unwrap());
}

#[tokio::test]
async fn test_missing_environment_defaults_to_production() {
    let ctx = TestContext::new();
    ctx.connect().await.unwrap();

    lifecycle::initialize(&ctx.state).await.unwrap();

    assert!(!ctx.is_connected().await.unwrap());
    assert_eq!(
        ctx.options.get(keys::TEST_ENVIRONMENT).await.unwrap(),
        Some(json!("no"))
    );
    assert_eq!(ctx.state.endpoints().environment, Environment::Production);
}

#[tokio::test]
async fn test_overrides_mark_environment_custom() {
    let mut config = test_config();
    config.endpoint_overrides = EndpointOverrides {
        kassa_oauth_url: Some("https://pos.staging.example/oauth".to_string()),
        ..EndpointOverrides::default()
    };
    let ctx = TestContext::with_config(config);
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("yes")).await.unwrap();
    lifecycle::initialize(&ctx.state).await.unwrap();

    let endpoints = ctx.state.endpoints();
    assert!(endpoints.custom);
    assert_eq!(endpoints.kassa_oauth_url, "https://pos.staging.example/oauth");
    assert!(endpoints.label().starts_with("CUSTOM"));
    assert!(
        endpoints
            .webhook_url
            .starts_with("https://woocommerce.qa.op-kassa.fi/")
    );
}
