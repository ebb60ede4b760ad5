//! Router-level tests: signing, permissions and the REST endpoints.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use checkout_pos_connector::connection::{CANCEL_DENIED, ConnectionController};
use checkout_pos_connector::db::{DeletedProductRepository, OptionStore, UserDirectory, keys};
use checkout_pos_connector::middleware::auth::{
    SIGNATURE_HEADER, USER_HEADER, request_message, sign,
};
use checkout_pos_core::{ApiKeyId, Environment, ProductId, UserId, UserRole};
use checkout_pos_integration_tests::{SHARED_SECRET, TestContext};

fn signed(method: Method, uri: &str, user: UserId) -> axum::http::request::Builder {
    let message = request_message(&method, uri, user);
    Request::builder()
        .method(method)
        .uri(uri)
        .header(USER_HEADER, user.to_string())
        .header(SIGNATURE_HEADER, sign(SHARED_SECRET.as_bytes(), message.as_bytes()))
}

fn signed_get(uri: &str, user: UserId) -> Request<Body> {
    signed(Method::GET, uri, user).body(Body::empty()).unwrap()
}

fn hook(body: &Value) -> Request<Body> {
    let raw = body.to_string();
    Request::builder()
        .method(Method::POST)
        .uri("/kis/hooks")
        .header(header::CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, sign(SHARED_SECRET.as_bytes(), raw.as_bytes()))
        .body(Body::from(raw))
        .unwrap()
}

async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoints() {
    let ctx = TestContext::new();

    let response = ctx
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");

    let response = ctx
        .router()
        .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Signatures and permissions
// ============================================================================

#[tokio::test]
async fn test_settings_page_needs_signed_user() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();

    let unsigned = ctx
        .router()
        .oneshot(Request::get("/kis").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

    let forged = Request::get("/kis")
        .header(USER_HEADER, admin.id.to_string())
        .header(SIGNATURE_HEADER, "00".repeat(32))
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(forged).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Signed for a different path.
    let replayed = Request::get("/kis?sys_audit=1")
        .header(USER_HEADER, admin.id.to_string())
        .header(
            SIGNATURE_HEADER,
            sign(
                SHARED_SECRET.as_bytes(),
                request_message(&Method::GET, "/kis", admin.id).as_bytes(),
            ),
        )
        .body(Body::empty())
        .unwrap();
    let response = ctx.router().oneshot(replayed).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rest_endpoints_need_store_manager() {
    let ctx = TestContext::new();
    let editor = ctx.add_user(4, UserRole::Editor).await.unwrap();

    for uri in [
        "/wp-json/wc/v3/deleted_products",
        "/wp-json/wc/v3/delete_auth_token?token_id=1",
    ] {
        let response = ctx
            .router()
            .oneshot(signed_get(uri, editor.id))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");

        let anonymous = ctx
            .router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::FORBIDDEN, "{uri}");
    }
}

// ============================================================================
// REST endpoints
// ============================================================================

#[tokio::test]
async fn test_deleted_products_filter() {
    let ctx = TestContext::new();
    let manager = ctx.add_user(2, UserRole::ShopManager).await.unwrap();
    let tracker = DeletedProductRepository::new(ctx.options.as_ref());
    tracker.mark_deleted(ProductId::new(10), 1_000).await.unwrap();
    tracker.mark_deleted(ProductId::new(11), 2_000).await.unwrap();
    tracker.mark_deleted(ProductId::new(12), 3_000).await.unwrap();

    let response = ctx
        .router()
        .oneshot(signed_get("/wp-json/wc/v3/deleted_products", manager.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"10": 1000, "11": 2000, "12": 3000})
    );

    let response = ctx
        .router()
        .oneshot(signed_get(
            "/wp-json/wc/v3/deleted_products?deleted_after=2000",
            manager.id,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"12": 3000}));

    let response = ctx
        .router()
        .oneshot(signed_get(
            "/wp-json/wc/v3/deleted_products?deleted_after=soon",
            manager.id,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_auth_token() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();
    ctx.api_keys.insert(ApiKeyId::new(17)).await;

    let response = ctx
        .router()
        .oneshot(signed_get("/wp-json/wc/v3/delete_auth_token?token_id=17", admin.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"deleted": true}));
    assert!(!ctx.api_keys.contains(ApiKeyId::new(17)).await);

    let response = ctx
        .router()
        .oneshot(signed_get("/wp-json/wc/v3/delete_auth_token?token_id=17", admin.id))
        .await
        .unwrap();
    assert_eq!(body_json(response).await, json!({"deleted": false}));

    for uri in [
        "/wp-json/wc/v3/delete_auth_token",
        "/wp-json/wc/v3/delete_auth_token?token_id=abc",
    ] {
        let response = ctx.router().oneshot(signed_get(uri, admin.id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

// ============================================================================
// Hooks
// ============================================================================

#[tokio::test]
async fn test_product_hooks_feed_the_tracker() {
    let ctx = TestContext::new();

    let response = ctx
        .router()
        .oneshot(hook(&json!({
            "event": "product_trashed",
            "product_id": 42,
            "post_type": "product"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome = body_json(response).await;
    assert_eq!(outcome["event"], "product_trashed");
    assert_eq!(outcome["changed"], true);

    // Only products are tracked.
    let response = ctx
        .router()
        .oneshot(hook(&json!({
            "event": "product_deleted",
            "product_id": 43,
            "post_type": "shop_order"
        })))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["changed"], false);

    let deleted = DeletedProductRepository::new(ctx.options.as_ref())
        .list(None)
        .await
        .unwrap();
    assert_eq!(deleted.keys().copied().collect::<Vec<_>>(), vec![ProductId::new(42)]);

    ctx.router()
        .oneshot(hook(&json!({"event": "product_untrashed", "product_id": 42})))
        .await
        .unwrap();
    assert!(
        DeletedProductRepository::new(ctx.options.as_ref())
            .list(None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_hook_signature_and_shape_are_checked() {
    let ctx = TestContext::new();

    let unsigned = Request::post("/kis/hooks")
        .body(Body::from(json!({"event": "init"}).to_string()))
        .unwrap();
    let response = ctx.router().oneshot(unsigned).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let tampered = Request::post("/kis/hooks")
        .header(
            SIGNATURE_HEADER,
            sign(SHARED_SECRET.as_bytes(), br#"{"event":"init"}"#),
        )
        .body(Body::from(r#"{"event":"deactivate"}"#))
        .unwrap();
    let response = ctx.router().oneshot(tampered).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = ctx
        .router()
        .oneshot(hook(&json!({"event": "wp_loaded"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_environment_hook_asks_for_reload() {
    let ctx = TestContext::new();
    ctx.connect().await.unwrap();

    let response = ctx
        .router()
        .oneshot(hook(&json!({
            "event": "option_updated",
            "key": keys::TEST_ENVIRONMENT,
            "new": "yes",
            "old": "no"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["refresh"], "0");
    assert_eq!(body_json(response).await["reload"], true);
    assert!(!ctx.is_connected().await.unwrap());
    assert_eq!(ctx.state.endpoints().environment, Environment::Test);
}

#[tokio::test]
async fn test_user_hooks_mirror_users() {
    let ctx = TestContext::new();

    ctx.router()
        .oneshot(hook(&json!({
            "event": "user_upserted",
            "id": 8,
            "email": "manager@shop.example.fi",
            "display_name": "Manager",
            "role": "shop_manager"
        })))
        .await
        .unwrap();
    assert!(ctx.state.users().find(UserId::new(8)).await.unwrap().is_some());

    let response = ctx
        .router()
        .oneshot(hook(&json!({"event": "user_deleted", "user_id": 8})))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["changed"], true);
    assert!(ctx.state.users().find(UserId::new(8)).await.unwrap().is_none());
}

// ============================================================================
// Settings page
// ============================================================================

#[tokio::test]
async fn test_settings_page_shows_auth_error_once() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();

    let response = ctx
        .router()
        .oneshot(signed_get("/kis?kis_auth_error=wc", admin.id))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("WooCommerce authorization failed."));
    assert!(page.contains("Not connected."));

    let response = ctx.router().oneshot(signed_get("/kis", admin.id)).await.unwrap();
    assert!(!body_text(response).await.contains("WooCommerce authorization failed."));
}

#[tokio::test]
async fn test_settings_notices_are_shown_to_the_acting_user() {
    let ctx = TestContext::new();
    let owner = ctx.connect().await.unwrap();
    let manager = ctx.add_user(2, UserRole::ShopManager).await.unwrap();
    let customer = ctx.add_user(9, UserRole::Customer).await.unwrap();

    // A customer trying to cancel is denied; the notice is theirs alone.
    let denied = ConnectionController::new(&ctx.state)
        .disconnect(true, false, Some(&customer))
        .await;
    assert!(denied.is_err());
    assert!(ctx.is_connected().await.unwrap());

    for user in [owner.id, manager.id] {
        let response = ctx.router().oneshot(signed_get("/kis", user)).await.unwrap();
        let page = body_text(response).await;
        assert!(page.contains("Connected to Checkout POS."));
        assert!(!page.contains(CANCEL_DENIED), "user {user} saw a notice for someone else");
    }

    let response = ctx.router().oneshot(signed_get("/kis", customer.id)).await.unwrap();
    assert!(body_text(response).await.contains(CANCEL_DENIED));
    assert!(ctx.state.notices().is_empty());
}

#[tokio::test]
async fn test_settings_page_completes_connect() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();
    let payload = checkout_pos_integration_tests::merchant_payload(&json!({
        "merchant_id": "77",
        "owner_email": "owner@shop.example.fi",
        "merchant_name": "Kahvila Oy"
    }));
    let uri = format!("/kis?merchant_details={payload}");

    let response = ctx.router().oneshot(signed_get(&uri, admin.id)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(ctx.is_connected().await.unwrap());
    let page = body_text(response).await;
    assert!(page.contains("Kahvila Oy"));
    assert!(page.contains("Cancel connection"));
}

#[tokio::test]
async fn test_connect_redirects_to_checkout_pos() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();

    let response = ctx
        .router()
        .oneshot(signed_get("/kis/connect", admin.id))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with(&ctx.state.endpoints().kassa_oauth_url));
    assert!(location.contains("domain=shop.example.fi"));
}

fn settings_form(user: UserId, body: &str) -> Request<Body> {
    signed(Method::POST, "/kis/settings", user)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_settings_form_validates_and_saves() {
    let ctx = TestContext::new();
    let admin = ctx.add_user(1, UserRole::Administrator).await.unwrap();

    let invalid = "kis_test_environment_enabled=no\
        &kis_product_sync_direction=both\
        &kis_order_sync_direction=both\
        &kis_stock_sync_direction=off";
    let response = ctx
        .router()
        .oneshot(settings_form(admin.id, invalid))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let valid = "kis_test_environment_enabled=no\
        &kis_woo_tax_calc_enabled=yes\
        &kis_product_sync_direction=woo_to_kassa\
        &kis_order_sync_direction=both\
        &kis_stock_sync_direction=woo_to_kassa";
    let response = ctx
        .router()
        .oneshot(settings_form(admin.id, valid))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/kis");

    assert_eq!(
        ctx.options.get(keys::TAX_CALCULATION).await.unwrap(),
        Some(json!("yes"))
    );
    assert_eq!(
        ctx.options.get(keys::AUTH_PARAMS).await.unwrap(),
        Some(json!("no"))
    );
    assert_eq!(
        ctx.options.get("kis_order_sync_direction").await.unwrap(),
        Some(json!("both"))
    );
}

#[tokio::test]
async fn test_settings_form_environment_switch_reloads() {
    let ctx = TestContext::new();
    let owner = ctx.connect().await.unwrap();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("no")).await.unwrap();

    let body = "kis_test_environment_enabled=yes\
        &kis_product_sync_direction=off\
        &kis_order_sync_direction=off\
        &kis_stock_sync_direction=off";
    let response = ctx
        .router()
        .oneshot(settings_form(owner.id, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()["refresh"], "0");
    assert!(!ctx.is_connected().await.unwrap());
    assert_eq!(ctx.state.endpoints().environment, Environment::Test);
}

#[tokio::test]
async fn test_first_settings_save_keeps_connection() {
    let ctx = TestContext::new();
    let owner = ctx.connect().await.unwrap();
    ctx.set_option(keys::TEST_ENVIRONMENT, json!("no")).await.unwrap();

    let body = "kis_test_environment_enabled=no\
        &kis_product_sync_direction=woo_to_kassa\
        &kis_order_sync_direction=off\
        &kis_stock_sync_direction=off";
    let response = ctx
        .router()
        .oneshot(settings_form(owner.id, body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers().get("refresh").is_none());
    assert!(ctx.is_connected().await.unwrap());
    assert_eq!(
        ctx.options.get(keys::AUTH_PARAMS).await.unwrap(),
        Some(json!("no"))
    );
    assert!(ctx.pos.revoke_calls().await.is_empty());
}

#[tokio::test]
async fn test_settings_form_needs_store_manager() {
    let ctx = TestContext::new();
    let author = ctx.add_user(3, UserRole::Author).await.unwrap();

    let response = ctx
        .router()
        .oneshot(settings_form(
            author.id,
            "kis_test_environment_enabled=no&kis_product_sync_direction=off\
             &kis_order_sync_direction=off&kis_stock_sync_direction=off",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
