//! Command definitions
//!
//! Commands represent intentions to change system state; results are what a
//! handler hands back to the HTTP layer once a command has succeeded.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{OrderLineItem, PaymentMethod, ShippingAddress};
use crate::payment::CreditCardDetails;

// -------------------------------------------------------------------
// Checkout / order lifecycle
// -------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderCommand {
    pub customer_id: Uuid,
    pub customer_email: String,
    pub items: Vec<OrderLineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub credit_card: Option<CreditCardDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub order_id: Uuid,
    pub status: String,
    pub subtotal_minor_units: i64,
    pub shipping_fee_minor_units: i64,
    pub total_minor_units: i64,
    pub transaction_id: Option<String>,
    pub payment_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOrderCommand {
    pub order_id: Uuid,
}

// -------------------------------------------------------------------
// Product / catalog admin
// -------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProductCommand {
    pub name: String,
    pub description: String,
    pub price_minor_units: i64,
    pub category_id: Uuid,
    pub initial_stock: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResult {
    pub product_id: Uuid,
}

// -------------------------------------------------------------------
// Auth
// -------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCommand {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResult {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResult {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPasswordResetCommand {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordCommand {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailCommand {
    pub token: String,
}
