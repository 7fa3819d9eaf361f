//! API Routes
//!
//! HTTP endpoint definitions (SPEC_FULL §6.1). Handlers are constructed
//! per-request from `AppState`, the same way the teacher wires a fresh
//! `CreateUserHandler::new(pool)` inside each route function rather than
//! holding long-lived handler instances.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::{CartRegistry, CartView};
use crate::config::Config;
use crate::domain::{DomainError, OperationContext, OrderLineItem, PaymentMethod, ProductChanges, ShippingAddress};
use crate::email::EmailQueue;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::handlers::{
    AssociateImageHandler, CancelOrderCommand, CancelOrderHandler, CheckoutHandler, CompleteOrderHandler,
    CreateOrderCommand, CreateProductCommand, CreateProductHandler, DeleteProductHandler, LoginCommand,
    LoginHandler, LogoutHandler, RefreshHandler, RefundOrderCommand, RefundOrderHandler, RegisterCommand,
    RegisterHandler, RequestPasswordResetCommand, RequestPasswordResetHandler, ResetPasswordCommand,
    ResetPasswordHandler, ShipOrderHandler, UpdateProductHandler, UpdateStockHandler, VerifyEmailCommand,
    VerifyEmailHandler,
};
use crate::payment::{CreditCardDetails, PaymentGateway};
use crate::projection::{
    AddressRow, CategoryRow, OrderRow, ProductRow, ProjectionService, UserRow, WishlistItemRow,
};
use crate::storage::ImageRepository;
use crate::token::TokenService;

use super::middleware::{auth_middleware, logging_middleware, require_admin_middleware};

/// Everything a route needs to build and run a command handler.
#[derive(Clone)]
pub struct AppState {
    pub event_store: EventStore,
    pub projection: ProjectionService,
    pub cart_registry: CartRegistry,
    pub email_queue: EmailQueue,
    pub payment_gateway: Arc<dyn PaymentGateway>,
    pub image_repository: Arc<dyn ImageRepository>,
    pub token_service: TokenService,
    pub config: Config,
}

fn actor_id(context: &OperationContext) -> AppResult<Uuid> {
    context.actor_id.ok_or(AppError::Unauthenticated)
}

// =========================================================================
// Request / Response DTOs
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_minor_units: i64,
    pub category_id: Uuid,
    pub stock: i64,
    pub published: bool,
    pub image_urls: Vec<String>,
}

impl From<ProductRow> for ProductResponse {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price_minor_units: row.price_minor_units,
            category_id: row.category_id,
            stock: row.stock,
            published: row.published,
            image_urls: row.image_urls,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ProductsQuery {
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<CategoryRow> for CategoryResponse {
    fn from(row: CategoryRow) -> Self {
        Self { id: row.id, name: row.name }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub price_minor_units: i64,
    pub category_id: Uuid,
    pub initial_stock: u32,
}

#[derive(Debug, Serialize)]
pub struct ProductIdResponse {
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_minor_units: Option<i64>,
    pub category_id: Option<Uuid>,
    pub published: Option<bool>,
}

impl From<UpdateProductRequest> for ProductChanges {
    fn from(request: UpdateProductRequest) -> Self {
        Self {
            name: request.name,
            description: request.description,
            price_minor_units: request.price_minor_units,
            category_id: request.category_id,
            published: request.published,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub stock: u32,
}

#[derive(Debug, Deserialize)]
pub struct AssociateImageRequest {
    pub image_url: String,
}

#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub lines: Vec<crate::cart::CartLine>,
    pub total_minor_units: i64,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            lines: view.lines,
            total_minor_units: view.total_minor_units,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub credit_card: Option<CreditCardDetails>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub status: String,
    pub subtotal_minor_units: i64,
    pub shipping_fee_minor_units: i64,
    pub total_minor_units: i64,
    pub transaction_id: Option<String>,
    pub payment_code: Option<String>,
}

impl From<crate::handlers::OrderResult> for OrderResponse {
    fn from(result: crate::handlers::OrderResult) -> Self {
        Self {
            order_id: result.order_id,
            status: result.status,
            subtotal_minor_units: result.subtotal_minor_units,
            shipping_fee_minor_units: result.shipping_fee_minor_units,
            total_minor_units: result.total_minor_units,
            transaction_id: result.transaction_id,
            payment_code: result.payment_code,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderSummaryResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub status: String,
    pub total_minor_units: i64,
    pub items: serde_json::Value,
    pub shipping_address: serde_json::Value,
}

impl From<OrderRow> for OrderSummaryResponse {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            status: row.status,
            total_minor_units: row.total_minor_units,
            items: row.items,
            shipping_address: row.shipping_address,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusUpdateRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct WishlistItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub price_minor_units: i64,
    pub published: bool,
    pub in_stock: bool,
}

impl From<WishlistItemRow> for WishlistItemResponse {
    fn from(row: WishlistItemRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.name,
            price_minor_units: row.price_minor_units,
            published: row.published,
            in_stock: row.in_stock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WishlistResponse {
    pub items: Vec<WishlistItemResponse>,
}

#[derive(Debug, Deserialize)]
pub struct WishlistAddRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AddressRequest {
    pub recipient_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub street_line: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub id: Uuid,
    pub recipient_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub street_line: String,
    pub phone_number: String,
}

impl From<AddressRow> for AddressResponse {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            recipient_name: row.recipient_name,
            postal_code: row.postal_code,
            prefecture: row.prefecture,
            city: row.city,
            street_line: row.street_line,
            phone_number: row.phone_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddressListResponse {
    pub addresses: Vec<AddressResponse>,
}

#[derive(Debug, Serialize)]
pub struct CustomerResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
}

impl From<UserRow> for CustomerResponse {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            email_verified: row.email_verified,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerResponse>,
}

// =========================================================================
// Router assembly
// =========================================================================

/// Build the full application router: an unauthenticated public surface, a
/// customer surface gated on a valid bearer access token, and an admin
/// surface gated on that token additionally carrying the admin role.
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/password-reset", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
        .route("/auth/verify-email", post(verify_email))
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/categories", get(list_categories));

    let customer_routes = Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_cart_item))
        .route("/cart/items/:product_id", put(update_cart_item).delete(remove_cart_item))
        .route("/checkout", post(checkout))
        .route("/orders", get(list_my_orders))
        .route("/orders/:id", get(get_my_order))
        .route("/wishlist", get(list_wishlist).post(add_to_wishlist))
        .route("/wishlist/:product_id", delete(remove_from_wishlist))
        .route("/addresses", get(list_addresses).post(create_address))
        .route("/addresses/:id", put(update_address).delete(delete_address))
        .layer(middleware::from_fn_with_state(state.token_service.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/admin/products", get(admin_list_products).post(admin_create_product))
        .route("/admin/products/:id", put(admin_update_product).delete(admin_delete_product))
        .route("/admin/products/:id/stock", put(admin_update_stock))
        .route("/admin/products/:id/images", post(admin_associate_image))
        .route("/admin/categories", get(list_categories).post(admin_create_category))
        .route("/admin/categories/:id", delete(admin_delete_category))
        .route("/admin/orders", get(admin_list_orders))
        .route("/admin/orders/:id/status", put(admin_update_order_status))
        .route("/admin/orders/:id/cancel", post(admin_cancel_order))
        .route("/admin/orders/:id/refund", post(admin_refund_order))
        .route("/admin/customers", get(admin_list_customers))
        .route("/admin/customers/:id", get(admin_get_customer))
        .route("/admin/images", post(admin_upload_image))
        .layer(middleware::from_fn(require_admin_middleware))
        .layer(middleware::from_fn_with_state(state.token_service.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(customer_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

// =========================================================================
// Auth
// =========================================================================

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let handler = RegisterHandler::new(
        state.event_store,
        state.projection,
        state.token_service,
        state.email_queue,
        state.config.app_base_url,
    );
    let result = handler
        .execute(RegisterCommand {
            email: request.email,
            name: request.name,
            password: request.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id: result.user_id })))
}

async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> AppResult<Json<LoginResponse>> {
    let handler = LoginHandler::new(state.event_store, state.projection, state.token_service);
    let result = handler
        .execute(LoginCommand {
            email: request.email,
            password: request.password,
        })
        .await?;

    Ok(Json(LoginResponse {
        access_token: result.access_token,
        refresh_token: result.refresh_token,
        user_id: result.user_id,
    }))
}

async fn refresh(State(state): State<AppState>, Json(request): Json<RefreshRequest>) -> AppResult<Json<RefreshResponse>> {
    let handler = RefreshHandler::new(state.event_store, state.token_service);
    let result = handler.execute(&request.refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: result.access_token,
    }))
}

async fn logout(State(state): State<AppState>, Json(request): Json<LogoutRequest>) -> AppResult<StatusCode> {
    let handler = LogoutHandler::new(state.token_service);
    handler.execute(&request.refresh_token, &OperationContext::new()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn request_password_reset(
    State(state): State<AppState>,
    Json(request): Json<RequestPasswordResetRequest>,
) -> AppResult<StatusCode> {
    let handler = RequestPasswordResetHandler::new(
        state.event_store,
        state.projection,
        state.token_service,
        state.email_queue,
        state.config.app_base_url,
    );
    handler
        .execute(RequestPasswordResetCommand { email: request.email })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    let handler = ResetPasswordHandler::new(state.event_store, state.projection, state.token_service);
    handler
        .execute(ResetPasswordCommand {
            token: request.token,
            new_password: request.new_password,
        })
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_email(State(state): State<AppState>, Json(request): Json<VerifyEmailRequest>) -> AppResult<StatusCode> {
    let handler = VerifyEmailHandler::new(state.event_store, state.projection, state.token_service);
    handler.execute(VerifyEmailCommand { token: request.token }).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Catalog (public)
// =========================================================================

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> AppResult<Json<ProductListResponse>> {
    let rows = state.projection.list_published_products(query.category_id).await?;
    Ok(Json(ProductListResponse {
        products: rows.into_iter().map(ProductResponse::from).collect(),
    }))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<ProductResponse>> {
    let row = state
        .projection
        .get_published_product(id)
        .await?
        .ok_or_else(|| DomainError::ProductNotFound(id.to_string()))?;
    Ok(Json(row.into()))
}

async fn list_categories(State(state): State<AppState>) -> AppResult<Json<CategoryListResponse>> {
    let rows = state.projection.list_categories().await?;
    Ok(Json(CategoryListResponse {
        categories: rows.into_iter().map(CategoryResponse::from).collect(),
    }))
}

// =========================================================================
// Cart (customer)
// =========================================================================

async fn get_cart(State(state): State<AppState>, Extension(context): Extension<OperationContext>) -> AppResult<Json<CartResponse>> {
    let customer_id = actor_id(&context)?;
    let view = state.cart_registry.get(customer_id).await?;
    Ok(Json(view.into()))
}

async fn add_cart_item(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<AddCartItemRequest>,
) -> AppResult<Json<CartResponse>> {
    let customer_id = actor_id(&context)?;
    let view = state
        .cart_registry
        .add_item(customer_id, request.product_id, request.quantity)
        .await?;
    Ok(Json(view.into()))
}

async fn update_cart_item(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> AppResult<Json<CartResponse>> {
    let customer_id = actor_id(&context)?;
    let view = state
        .cart_registry
        .update_item(customer_id, product_id, request.quantity)
        .await?;
    Ok(Json(view.into()))
}

async fn remove_cart_item(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<CartResponse>> {
    let customer_id = actor_id(&context)?;
    let view = state.cart_registry.remove_item(customer_id, product_id).await?;
    Ok(Json(view.into()))
}

async fn clear_cart(State(state): State<AppState>, Extension(context): Extension<OperationContext>) -> AppResult<StatusCode> {
    let customer_id = actor_id(&context)?;
    state.cart_registry.clear(customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Checkout / orders (customer)
// =========================================================================

async fn checkout(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<OrderResponse>> {
    let customer_id = actor_id(&context)?;

    let customer = state
        .projection
        .get_user(customer_id)
        .await?
        .ok_or_else(|| DomainError::UserNotFound(customer_id.to_string()))?;

    let cart = state.cart_registry.get(customer_id).await?;
    if cart.lines.is_empty() {
        return Err(AppError::Domain(DomainError::CartEmpty));
    }

    let items: Vec<OrderLineItem> = cart
        .lines
        .iter()
        .map(|line| OrderLineItem {
            product_id: line.product_id,
            name: line.product_name.clone(),
            unit_price_minor_units: line.unit_price_minor_units,
            quantity: line.quantity,
        })
        .collect();

    let handler = CheckoutHandler::new(
        state.event_store,
        state.projection,
        state.payment_gateway,
        state.email_queue,
    );
    let result = handler
        .execute(
            CreateOrderCommand {
                customer_id,
                customer_email: customer.email,
                items,
                shipping_address: request.shipping_address,
                payment_method: request.payment_method,
                credit_card: request.credit_card,
            },
            &context,
        )
        .await?;

    state.cart_registry.clear(customer_id).await?;

    Ok(Json(result.into()))
}

async fn list_my_orders(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<OrderListResponse>> {
    let customer_id = actor_id(&context)?;
    let rows = state.projection.list_orders_for_customer(customer_id).await?;
    Ok(Json(OrderListResponse {
        orders: rows.into_iter().map(OrderSummaryResponse::from).collect(),
    }))
}

async fn get_my_order(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderSummaryResponse>> {
    let customer_id = actor_id(&context)?;
    let row = state
        .projection
        .get_order(id)
        .await?
        .ok_or_else(|| DomainError::OrderNotFound(id.to_string()))?;

    if row.customer_id != customer_id && !context.is_admin() {
        return Err(AppError::Forbidden("cannot view another customer's order".to_string()));
    }

    Ok(Json(row.into()))
}

// =========================================================================
// Wishlist (customer)
// =========================================================================

async fn list_wishlist(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<WishlistResponse>> {
    let customer_id = actor_id(&context)?;
    let rows = state.projection.list_wishlist(customer_id).await?;
    Ok(Json(WishlistResponse {
        items: rows.into_iter().map(WishlistItemResponse::from).collect(),
    }))
}

async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<WishlistAddRequest>,
) -> AppResult<StatusCode> {
    let customer_id = actor_id(&context)?;

    state
        .projection
        .get_published_product(request.product_id)
        .await?
        .ok_or_else(|| DomainError::ProductNotFound(request.product_id.to_string()))?;

    if state.projection.wishlist_contains(customer_id, request.product_id).await? {
        return Err(AppError::Domain(DomainError::WishlistDuplicate));
    }

    state.projection.add_to_wishlist(customer_id, request.product_id).await?;
    Ok(StatusCode::CREATED)
}

async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let customer_id = actor_id(&context)?;
    state.projection.remove_from_wishlist(customer_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Addresses (customer)
// =========================================================================

/// Address book entries are capped at this many per customer (SPEC_FULL §8).
const MAX_ADDRESSES_PER_CUSTOMER: i64 = 10;

async fn list_addresses(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<AddressListResponse>> {
    let customer_id = actor_id(&context)?;
    let rows = state.projection.list_addresses(customer_id).await?;
    Ok(Json(AddressListResponse {
        addresses: rows.into_iter().map(AddressResponse::from).collect(),
    }))
}

async fn create_address(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<AddressRequest>,
) -> AppResult<(StatusCode, Json<AddressResponse>)> {
    let customer_id = actor_id(&context)?;

    if state.projection.count_addresses(customer_id).await? >= MAX_ADDRESSES_PER_CUSTOMER {
        return Err(AppError::Domain(DomainError::AddressBookLimitExceeded));
    }

    let address_id = Uuid::new_v4();
    state
        .projection
        .create_address(
            address_id,
            customer_id,
            &request.recipient_name,
            &request.postal_code,
            &request.prefecture,
            &request.city,
            &request.street_line,
            &request.phone_number,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AddressResponse {
            id: address_id,
            recipient_name: request.recipient_name,
            postal_code: request.postal_code,
            prefecture: request.prefecture,
            city: request.city,
            street_line: request.street_line,
            phone_number: request.phone_number,
        }),
    ))
}

async fn update_address(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddressRequest>,
) -> AppResult<StatusCode> {
    let customer_id = actor_id(&context)?;
    let rows_affected = state
        .projection
        .update_address(
            customer_id,
            id,
            &request.recipient_name,
            &request.postal_code,
            &request.prefecture,
            &request.city,
            &request.street_line,
            &request.phone_number,
        )
        .await?;

    if rows_affected == 0 {
        return Err(AppError::Domain(DomainError::AddressNotFound(id.to_string())));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_address(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let customer_id = actor_id(&context)?;
    let rows_affected = state.projection.delete_address(customer_id, id).await?;
    if rows_affected == 0 {
        return Err(AppError::Domain(DomainError::AddressNotFound(id.to_string())));
    }
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Admin: catalog
// =========================================================================

async fn admin_list_products(State(state): State<AppState>) -> AppResult<Json<ProductListResponse>> {
    // Admins review the full catalog, including unpublished/deleted-stock
    // items, by sweeping every category rather than filtering on `published`.
    let mut products = Vec::new();
    for category in state.projection.list_categories().await? {
        products.extend(state.projection.list_published_products(Some(category.id)).await?);
    }
    Ok(Json(ProductListResponse {
        products: products.into_iter().map(ProductResponse::from).collect(),
    }))
}

async fn admin_create_product(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<ProductIdResponse>)> {
    let handler = CreateProductHandler::new(state.event_store, state.projection);
    let result = handler
        .execute(
            CreateProductCommand {
                name: request.name,
                description: request.description,
                price_minor_units: request.price_minor_units,
                category_id: request.category_id,
                initial_stock: request.initial_stock,
            },
            &context,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ProductIdResponse { product_id: result.product_id })))
}

async fn admin_update_product(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> AppResult<StatusCode> {
    let handler = UpdateProductHandler::new(state.event_store, state.projection);
    handler.execute(id, request.into(), &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_delete_product(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let handler = DeleteProductHandler::new(state.event_store, state.projection);
    handler.execute(id, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_update_stock(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStockRequest>,
) -> AppResult<StatusCode> {
    let handler = UpdateStockHandler::new(state.event_store, state.projection);
    handler.execute(id, request.stock, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_associate_image(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssociateImageRequest>,
) -> AppResult<StatusCode> {
    let handler = AssociateImageHandler::new(state.event_store, state.projection);
    handler.execute(id, request.image_url, &context).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn admin_create_category(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> AppResult<(StatusCode, Json<CategoryResponse>)> {
    let id = Uuid::new_v4();
    state.projection.create_category(id, &request.name).await?;
    Ok((StatusCode::CREATED, Json(CategoryResponse { id, name: request.name })))
}

async fn admin_delete_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<StatusCode> {
    state
        .projection
        .get_category(id)
        .await?
        .ok_or_else(|| DomainError::CategoryNotFound(id.to_string()))?;

    if state.projection.category_has_products(id).await? {
        return Err(AppError::Domain(DomainError::CategoryHasProducts));
    }

    state.projection.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =========================================================================
// Admin: images
// =========================================================================

async fn admin_upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<ImageUploadResponse>> {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::MissingHeader("Content-Type".to_string()))?
        .to_string();

    let key = format!("products/{}", Uuid::new_v4());
    let url = state
        .image_repository
        .upload(body.to_vec(), &content_type, &key)
        .await
        .map_err(|e| AppError::Domain(DomainError::UnsupportedImageFormat(e.to_string())))?;

    Ok(Json(ImageUploadResponse { url }))
}

// =========================================================================
// Admin: orders
// =========================================================================

async fn admin_list_orders(State(state): State<AppState>) -> AppResult<Json<OrderListResponse>> {
    let rows = state.projection.list_orders().await?;
    Ok(Json(OrderListResponse {
        orders: rows.into_iter().map(OrderSummaryResponse::from).collect(),
    }))
}

async fn admin_update_order_status(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<OrderStatusUpdateRequest>,
) -> AppResult<Json<OrderResponse>> {
    let result = match request.status.as_str() {
        "SHIPPED" => {
            let handler = ShipOrderHandler::new(state.event_store, state.projection);
            handler.execute(id, &context).await?
        }
        "COMPLETED" => {
            let handler = CompleteOrderHandler::new(state.event_store, state.projection);
            handler.execute(id, &context).await?
        }
        other => {
            return Err(AppError::Domain(DomainError::invalid_transition("?", other)));
        }
    };

    Ok(Json(result.into()))
}

async fn admin_cancel_order(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> AppResult<Json<OrderResponse>> {
    let handler = CancelOrderHandler::new(state.event_store, state.projection, state.payment_gateway);
    let result = handler
        .execute(
            CancelOrderCommand {
                order_id: id,
                reason: request.reason,
            },
            &context,
        )
        .await?;
    Ok(Json(result.into()))
}

async fn admin_refund_order(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<OrderResponse>> {
    let handler = RefundOrderHandler::new(
        state.event_store,
        state.projection,
        state.payment_gateway,
        state.email_queue,
    );
    let result = handler.execute(RefundOrderCommand { order_id: id }, &context).await?;
    Ok(Json(result.into()))
}

// =========================================================================
// Admin: customers
// =========================================================================

async fn admin_list_customers(State(state): State<AppState>) -> AppResult<Json<CustomerListResponse>> {
    let rows = state.projection.list_customers().await?;
    Ok(Json(CustomerListResponse {
        customers: rows.into_iter().map(CustomerResponse::from).collect(),
    }))
}

async fn admin_get_customer(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<CustomerResponse>> {
    let row = state
        .projection
        .get_user(id)
        .await?
        .ok_or_else(|| DomainError::UserNotFound(id.to_string()))?;
    Ok(Json(row.into()))
}
