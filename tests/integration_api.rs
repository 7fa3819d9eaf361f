//! End-to-end API tests: register/login, cart, and the checkout command
//! skeleton from SPEC_FULL §4.3.1.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use storefront_core::aggregate::Aggregate;
use storefront_core::api::{self, routes::AppState};
use storefront_core::cart::CartRegistry;
use storefront_core::domain::Money;
use storefront_core::email::{EmailQueue, MockEmailService};
use storefront_core::event_store::EventStore;
use storefront_core::payment::{MockPaymentGateway, PaymentGateway};
use storefront_core::projection::ProjectionService;
use storefront_core::storage::{ImageRepository, MockImageRepository};
use storefront_core::token::TokenService;
use storefront_core::Config;

mod common;

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        database_max_connections: 5,
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        jwt_secret: "test-secret".to_string(),
        app_base_url: "http://localhost:3000".to_string(),
        payment_provider_key: String::new(),
        email_provider_key: String::new(),
        email_from_address: "no-reply@example.com".to_string(),
        static_asset_base_url: "http://localhost:3000/assets".to_string(),
    }
}

async fn build_app(pool: sqlx::PgPool) -> (axum::Router, ProjectionService, EventStore) {
    let event_store = EventStore::new(pool.clone());
    let projection = ProjectionService::new(pool.clone());
    let cart_registry = CartRegistry::new(projection.clone());
    let token_service = TokenService::new(pool.clone(), "test-secret".to_string());

    let email_service: Arc<dyn storefront_core::email::EmailService> = Arc::new(MockEmailService);
    let email_queue = EmailQueue::new(pool.clone(), email_service);

    let payment_gateway: Arc<dyn PaymentGateway> = Arc::new(MockPaymentGateway);
    let image_repository: Arc<dyn ImageRepository> =
        Arc::new(MockImageRepository::new("http://localhost:3000/assets".to_string()));

    let state = AppState {
        event_store: event_store.clone(),
        projection: projection.clone(),
        cart_registry,
        email_queue,
        payment_gateway,
        image_repository,
        token_service,
        config: test_config(),
    };

    (api::create_router(state), projection, event_store)
}

/// Seed a published, in-stock product directly through the event log and
/// projection, bypassing the admin HTTP surface (there is no bootstrap
/// route for creating the very first admin account).
async fn seed_product(
    event_store: &EventStore,
    projection: &ProjectionService,
    category_id: Uuid,
    stock: u32,
    price_minor_units: i64,
) -> Uuid {
    use storefront_core::aggregate::Product;

    let product_id = Uuid::new_v4();
    let (_product, event) = Product::create(
        product_id,
        "Widget".to_string(),
        "A fine widget".to_string(),
        Money::new(price_minor_units).unwrap(),
        category_id,
        stock,
    );

    event_store
        .append(product_id, Product::aggregate_type(), &[event.clone()], 0)
        .await
        .unwrap();
    projection.apply_product_event(&event, 1).await.unwrap();

    product_id
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_register_and_login() {
    let pool = common::setup_test_db().await;
    let (app, _projection, _event_store) = build_app(pool).await;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "shopper@example.com", "name": "Shopper", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "shopper@example.com", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["access_token"].as_str().unwrap().len() > 0);
    assert!(body["refresh_token"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let pool = common::setup_test_db().await;
    let (app, _projection, _event_store) = build_app(pool).await;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "shopper2@example.com", "name": "Shopper", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    app.clone().oneshot(req).await.unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "shopper2@example.com", "password": "wrong-password"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_catalog_get_requires_no_auth() {
    let pool = common::setup_test_db().await;
    let (app, projection, event_store) = build_app(pool).await;

    let category_id = Uuid::new_v4();
    projection.create_category(category_id, "Gadgets").await.unwrap();
    let product_id = seed_product(&event_store, &projection, category_id, 5, 1000).await;

    let req = Request::builder()
        .method("GET")
        .uri(format!("/products/{product_id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["stock"], 5);
}

async fn register_and_login(app: &axum::Router, email: &str) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": email, "name": "Shopper", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(json!({"email": email, "password": "hunter22"}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    body["access_token"].as_str().unwrap().to_string()
}

/// Scenario 1 from SPEC_FULL §8: cash-on-delivery checkout with a two-unit
/// line item produces subtotal=2000, shippingFee=300, total=2300, one stock
/// decrease, no payment event.
#[tokio::test]
async fn test_checkout_cash_on_delivery_e2e() {
    let pool = common::setup_test_db().await;
    let (app, projection, event_store) = build_app(pool).await;

    let category_id = Uuid::new_v4();
    projection.create_category(category_id, "Gadgets").await.unwrap();
    let product_id = seed_product(&event_store, &projection, category_id, 5, 1000).await;

    let access_token = register_and_login(&app, "cod-shopper@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/cart/items")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(json!({"product_id": product_id, "quantity": 2}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let req = Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(
            json!({
                "shipping_address": {
                    "recipient_name": "Shopper",
                    "postal_code": "100-0001",
                    "prefecture": "Tokyo",
                    "city": "Chiyoda",
                    "street_line": "1-1-1",
                    "phone_number": "0312345678",
                },
                "payment_method": "cash_on_delivery",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["subtotal_minor_units"], 2000);
    assert_eq!(body["shipping_fee_minor_units"], 300);
    assert_eq!(body["total_minor_units"], 2300);
    assert!(body["transaction_id"].is_null());
    assert!(body["payment_code"].is_null());

    let product = projection.get_product(product_id).await.unwrap().unwrap();
    assert_eq!(product.stock, 3);

    // Cart was cleared after checkout.
    let req = Request::builder()
        .method("GET")
        .uri("/cart")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let body = json_body(response).await;
    assert!(body["lines"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_empty_cart_rejected() {
    let pool = common::setup_test_db().await;
    let (app, _projection, _event_store) = build_app(pool).await;

    let access_token = register_and_login(&app, "empty-cart@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/checkout")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(
            json!({
                "shipping_address": {
                    "recipient_name": "Shopper",
                    "postal_code": "100-0001",
                    "prefecture": "Tokyo",
                    "city": "Chiyoda",
                    "street_line": "1-1-1",
                    "phone_number": "0312345678",
                },
                "payment_method": "cash_on_delivery",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "CART_EMPTY");
}

#[tokio::test]
async fn test_cart_add_rejects_insufficient_stock() {
    let pool = common::setup_test_db().await;
    let (app, projection, event_store) = build_app(pool).await;

    let category_id = Uuid::new_v4();
    projection.create_category(category_id, "Gadgets").await.unwrap();
    let product_id = seed_product(&event_store, &projection, category_id, 1, 1000).await;

    let access_token = register_and_login(&app, "stock-shopper@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/cart/items")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(json!({"product_id": product_id, "quantity": 5}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_admin_route_rejects_customer_token() {
    let pool = common::setup_test_db().await;
    let (app, _projection, _event_store) = build_app(pool).await;

    let access_token = register_and_login(&app, "plain-customer@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/products")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(
            json!({
                "name": "Gizmo",
                "description": "desc",
                "price_minor_units": 500,
                "category_id": Uuid::new_v4(),
                "initial_stock": 1,
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

/// SPEC_FULL §8 scenario 5: the 5th consecutive login failure locks the
/// account, so even a correct password is rejected until the lock expires.
#[tokio::test]
async fn test_fifth_consecutive_login_failure_locks_account() {
    let pool = common::setup_test_db().await;
    let (app, _projection, _event_store) = build_app(pool).await;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "lockout@example.com", "name": "Shopper", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    app.clone().oneshot(req).await.unwrap();

    for _ in 0..4 {
        let req = Request::builder()
            .method("POST")
            .uri("/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"email": "lockout@example.com", "password": "wrong-password"}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");
    }

    // 5th failure trips the lock; the append batches LoginFailed+AccountLocked
    // at consecutive versions instead of colliding on the same one.
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "lockout@example.com", "password": "wrong-password"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INVALID_CREDENTIALS");

    // Even the correct password is now rejected with ACCOUNT_LOCKED.
    let req = Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"email": "lockout@example.com", "password": "hunter22"}).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::from_u16(423).unwrap());
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "ACCOUNT_LOCKED");
}

#[tokio::test]
async fn test_wishlist_duplicate_rejected() {
    let pool = common::setup_test_db().await;
    let (app, projection, event_store) = build_app(pool).await;

    let category_id = Uuid::new_v4();
    projection.create_category(category_id, "Gadgets").await.unwrap();
    let product_id = seed_product(&event_store, &projection, category_id, 5, 1000).await;

    let access_token = register_and_login(&app, "wishlist-shopper@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/wishlist")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(json!({"product_id": product_id}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("POST")
        .uri("/wishlist")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(json!({"product_id": product_id}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "WISHLIST_DUPLICATE");
}

/// Wishlist reads are joined against the catalog (SPEC_FULL §4.3.8), so a
/// line carries the product's current name/price/availability, not just an id.
#[tokio::test]
async fn test_wishlist_list_joins_current_catalog_state() {
    let pool = common::setup_test_db().await;
    let (app, projection, event_store) = build_app(pool).await;

    let category_id = Uuid::new_v4();
    projection.create_category(category_id, "Gadgets").await.unwrap();
    let product_id = seed_product(&event_store, &projection, category_id, 5, 1500).await;

    let access_token = register_and_login(&app, "wishlist-reader@example.com").await;

    let req = Request::builder()
        .method("POST")
        .uri("/wishlist")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::from(json!({"product_id": product_id}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("GET")
        .uri("/wishlist")
        .header("authorization", format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], product_id.to_string());
    assert_eq!(items[0]["name"], "Widget");
    assert_eq!(items[0]["price_minor_units"], 1500);
    assert_eq!(items[0]["in_stock"], true);
}
