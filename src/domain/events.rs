//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Product-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProductEvent {
    ProductCreated {
        product_id: Uuid,
        name: String,
        description: String,
        price_minor_units: i64,
        category_id: Uuid,
        initial_stock: u32,
        created_at: DateTime<Utc>,
    },

    ProductUpdated {
        product_id: Uuid,
        changes: ProductChanges,
        updated_at: DateTime<Utc>,
    },

    ProductDeleted {
        product_id: Uuid,
        deleted_at: DateTime<Utc>,
    },

    StockUpdated {
        product_id: Uuid,
        new_stock: u32,
        updated_at: DateTime<Utc>,
    },

    StockDecreased {
        product_id: Uuid,
        quantity: u32,
        order_id: Uuid,
        decreased_at: DateTime<Utc>,
    },

    StockIncreased {
        product_id: Uuid,
        quantity: u32,
        order_id: Uuid,
        increased_at: DateTime<Utc>,
    },

    ProductImageAssociated {
        product_id: Uuid,
        image_url: String,
        associated_at: DateTime<Utc>,
    },
}

impl ProductEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated { .. } => "ProductCreated",
            ProductEvent::ProductUpdated { .. } => "ProductUpdated",
            ProductEvent::ProductDeleted { .. } => "ProductDeleted",
            ProductEvent::StockUpdated { .. } => "StockUpdated",
            ProductEvent::StockDecreased { .. } => "StockDecreased",
            ProductEvent::StockIncreased { .. } => "StockIncreased",
            ProductEvent::ProductImageAssociated { .. } => "ProductImageAssociated",
        }
    }

    pub fn product_id(&self) -> Uuid {
        match self {
            ProductEvent::ProductCreated { product_id, .. } => *product_id,
            ProductEvent::ProductUpdated { product_id, .. } => *product_id,
            ProductEvent::ProductDeleted { product_id, .. } => *product_id,
            ProductEvent::StockUpdated { product_id, .. } => *product_id,
            ProductEvent::StockDecreased { product_id, .. } => *product_id,
            ProductEvent::StockIncreased { product_id, .. } => *product_id,
            ProductEvent::ProductImageAssociated { product_id, .. } => *product_id,
        }
    }
}

/// Changes made to a product
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_minor_units: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// Order-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrderEvent {
    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        items: Vec<OrderLineItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        subtotal_minor_units: i64,
        shipping_fee_minor_units: i64,
        created_at: DateTime<Utc>,
    },

    PaymentCompleted {
        order_id: Uuid,
        transaction_id: String,
        completed_at: DateTime<Utc>,
    },

    ConvenienceStorePaymentIssued {
        order_id: Uuid,
        payment_code: String,
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    },

    OrderShipped {
        order_id: Uuid,
        shipped_at: DateTime<Utc>,
    },

    OrderCompleted {
        order_id: Uuid,
        completed_at: DateTime<Utc>,
    },

    OrderCancelled {
        order_id: Uuid,
        reason: String,
        cancelled_at: DateTime<Utc>,
    },

    RefundCompleted {
        order_id: Uuid,
        amount_minor_units: i64,
        completed_at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated { .. } => "OrderCreated",
            OrderEvent::PaymentCompleted { .. } => "PaymentCompleted",
            OrderEvent::ConvenienceStorePaymentIssued { .. } => "ConvenienceStorePaymentIssued",
            OrderEvent::OrderShipped { .. } => "OrderShipped",
            OrderEvent::OrderCompleted { .. } => "OrderCompleted",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
            OrderEvent::RefundCompleted { .. } => "RefundCompleted",
        }
    }

    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::OrderCreated { order_id, .. } => *order_id,
            OrderEvent::PaymentCompleted { order_id, .. } => *order_id,
            OrderEvent::ConvenienceStorePaymentIssued { order_id, .. } => *order_id,
            OrderEvent::OrderShipped { order_id, .. } => *order_id,
            OrderEvent::OrderCompleted { order_id, .. } => *order_id,
            OrderEvent::OrderCancelled { order_id, .. } => *order_id,
            OrderEvent::RefundCompleted { order_id, .. } => *order_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price_minor_units: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub street_line: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    ConvenienceStore,
    CashOnDelivery,
}

/// User-related events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UserEvent {
    UserRegistered {
        user_id: Uuid,
        email: String,
        name: String,
        password_hash: String,
        registered_at: DateTime<Utc>,
    },

    EmailVerified {
        user_id: Uuid,
        verified_at: DateTime<Utc>,
    },

    PasswordResetRequested {
        user_id: Uuid,
        requested_at: DateTime<Utc>,
    },

    PasswordReset {
        user_id: Uuid,
        new_password_hash: String,
        reset_at: DateTime<Utc>,
    },

    LoginFailed {
        user_id: Uuid,
        failed_at: DateTime<Utc>,
    },

    AccountLocked {
        user_id: Uuid,
        locked_until: DateTime<Utc>,
        locked_at: DateTime<Utc>,
    },

    AccountUnlocked {
        user_id: Uuid,
        unlocked_at: DateTime<Utc>,
    },
}

impl UserEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered { .. } => "UserRegistered",
            UserEvent::EmailVerified { .. } => "EmailVerified",
            UserEvent::PasswordResetRequested { .. } => "PasswordResetRequested",
            UserEvent::PasswordReset { .. } => "PasswordReset",
            UserEvent::LoginFailed { .. } => "LoginFailed",
            UserEvent::AccountLocked { .. } => "AccountLocked",
            UserEvent::AccountUnlocked { .. } => "AccountUnlocked",
        }
    }

    pub fn user_id(&self) -> Uuid {
        match self {
            UserEvent::UserRegistered { user_id, .. } => *user_id,
            UserEvent::EmailVerified { user_id, .. } => *user_id,
            UserEvent::PasswordResetRequested { user_id, .. } => *user_id,
            UserEvent::PasswordReset { user_id, .. } => *user_id,
            UserEvent::LoginFailed { user_id, .. } => *user_id,
            UserEvent::AccountLocked { user_id, .. } => *user_id,
            UserEvent::AccountUnlocked { user_id, .. } => *user_id,
        }
    }
}

/// A generic domain event wrapper for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub version: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_event_serialization() {
        let event = ProductEvent::StockDecreased {
            product_id: Uuid::new_v4(),
            quantity: 2,
            order_id: Uuid::new_v4(),
            decreased_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StockDecreased"));

        let deserialized: ProductEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
    }

    #[test]
    fn test_payment_method_serde_tag() {
        let method = PaymentMethod::CashOnDelivery;
        let json = serde_json::to_string(&method).unwrap();
        assert_eq!(json, r#""cash_on_delivery""#);
    }
}
