//! Order Aggregate
//!
//! Order is the aggregate for checkout and post-purchase lifecycle: payment,
//! shipping, completion, cancellation and refund. State is derived from
//! events, never directly mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    DomainError, Money, OrderEvent, OrderLineItem, PaymentMethod, ShippingAddress,
};

use super::Aggregate;

/// Fixed shipping fee charged for cash-on-delivery orders, in minor units.
pub const COD_SHIPPING_FEE_MINOR_UNITS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Accepted,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Order Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    customer_id: Uuid,
    items: Vec<OrderLineItem>,
    shipping_address: Option<ShippingAddress>,
    payment_method: Option<PaymentMethod>,
    subtotal: Money,
    shipping_fee: Money,
    status: OrderStatus,
    transaction_id: Option<String>,
    payment_code: Option<String>,
    payment_code_expires_at: Option<DateTime<Utc>>,
    refund_completed: bool,
    version: i64,
    created_at: Option<DateTime<Utc>>,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            customer_id: Uuid::nil(),
            items: Vec::new(),
            shipping_address: None,
            payment_method: None,
            subtotal: Money::ZERO,
            shipping_fee: Money::ZERO,
            status: OrderStatus::Accepted,
            transaction_id: None,
            payment_code: None,
            payment_code_expires_at: None,
            refund_completed: false,
            version: 0,
            created_at: None,
        }
    }
}

impl Order {
    /// Shipping fee for a given payment method: flat 300 for cash-on-delivery, else free.
    pub fn shipping_fee_for(payment_method: PaymentMethod) -> Money {
        if payment_method == PaymentMethod::CashOnDelivery {
            Money::new(COD_SHIPPING_FEE_MINOR_UNITS).expect("constant fee is valid")
        } else {
            Money::ZERO
        }
    }

    pub fn create(
        order_id: Uuid,
        customer_id: Uuid,
        items: Vec<OrderLineItem>,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethod,
        subtotal: Money,
    ) -> (Self, OrderEvent) {
        let now = Utc::now();
        let shipping_fee = Self::shipping_fee_for(payment_method);

        let event = OrderEvent::OrderCreated {
            order_id,
            customer_id,
            items: items.clone(),
            shipping_address: shipping_address.clone(),
            payment_method,
            subtotal_minor_units: subtotal.minor_units(),
            shipping_fee_minor_units: shipping_fee.minor_units(),
            created_at: now,
        };

        let order = Self {
            id: order_id,
            customer_id,
            items,
            shipping_address: Some(shipping_address),
            payment_method: Some(payment_method),
            subtotal,
            shipping_fee,
            status: OrderStatus::Accepted,
            transaction_id: None,
            payment_code: None,
            payment_code_expires_at: None,
            refund_completed: false,
            version: 1,
            created_at: Some(now),
        };

        (order, event)
    }

    pub fn complete_payment(&self, transaction_id: String) -> OrderEvent {
        OrderEvent::PaymentCompleted {
            order_id: self.id,
            transaction_id,
            completed_at: Utc::now(),
        }
    }

    pub fn issue_convenience_store_payment(
        &self,
        payment_code: String,
        expires_at: DateTime<Utc>,
    ) -> OrderEvent {
        OrderEvent::ConvenienceStorePaymentIssued {
            order_id: self.id,
            payment_code,
            expires_at,
            issued_at: Utc::now(),
        }
    }

    pub fn ship(&self) -> Result<OrderEvent, DomainError> {
        match self.status {
            OrderStatus::Accepted => Ok(OrderEvent::OrderShipped {
                order_id: self.id,
                shipped_at: Utc::now(),
            }),
            OrderStatus::Completed => Err(DomainError::OrderAlreadyCompleted),
            OrderStatus::Cancelled => Err(DomainError::OrderAlreadyCancelled),
            OrderStatus::Shipped => {
                Err(DomainError::invalid_transition(self.status.as_str(), "ship"))
            }
        }
    }

    pub fn complete(&self) -> Result<OrderEvent, DomainError> {
        match self.status {
            OrderStatus::Shipped => Ok(OrderEvent::OrderCompleted {
                order_id: self.id,
                completed_at: Utc::now(),
            }),
            OrderStatus::Completed => Err(DomainError::OrderAlreadyCompleted),
            OrderStatus::Cancelled => Err(DomainError::OrderAlreadyCancelled),
            OrderStatus::Accepted => Err(DomainError::invalid_transition(
                self.status.as_str(),
                "complete",
            )),
        }
    }

    pub fn cancel(&self, reason: String) -> Result<OrderEvent, DomainError> {
        match self.status {
            OrderStatus::Accepted | OrderStatus::Shipped => Ok(OrderEvent::OrderCancelled {
                order_id: self.id,
                reason,
                cancelled_at: Utc::now(),
            }),
            OrderStatus::Completed => Err(DomainError::OrderAlreadyCompleted),
            OrderStatus::Cancelled => Err(DomainError::OrderAlreadyCancelled),
        }
    }

    /// Refund the order total. Only valid once, for a cancelled order.
    pub fn refund(&self, amount: Money) -> Result<OrderEvent, DomainError> {
        if self.status != OrderStatus::Cancelled {
            return Err(DomainError::OrderNotCancelled);
        }
        if self.refund_completed {
            return Err(DomainError::OrderAlreadyRefunded);
        }

        Ok(OrderEvent::RefundCompleted {
            order_id: self.id,
            amount_minor_units: amount.minor_units(),
            completed_at: Utc::now(),
        })
    }

    pub fn customer_id(&self) -> Uuid {
        self.customer_id
    }

    pub fn items(&self) -> &[OrderLineItem] {
        &self.items
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_fee(&self) -> Money {
        self.shipping_fee
    }

    pub fn total(&self) -> Money {
        self.subtotal
            .try_add(&self.shipping_fee)
            .expect("subtotal + shipping fee stays within the money ceiling")
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn payment_code(&self) -> Option<&str> {
        self.payment_code.as_deref()
    }

    pub fn refund_completed(&self) -> bool {
        self.refund_completed
    }

    /// The set of statuses reachable from the current one, for error reporting.
    pub fn allowed_next_statuses(&self) -> Vec<&'static str> {
        match self.status {
            OrderStatus::Accepted => vec!["SHIPPED", "CANCELLED"],
            OrderStatus::Shipped => vec!["COMPLETED", "CANCELLED"],
            OrderStatus::Completed | OrderStatus::Cancelled => vec![],
        }
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            OrderEvent::OrderCreated {
                order_id,
                customer_id,
                items,
                shipping_address,
                payment_method,
                subtotal_minor_units,
                shipping_fee_minor_units,
                created_at,
            } => {
                self.id = order_id;
                self.customer_id = customer_id;
                self.items = items;
                self.shipping_address = Some(shipping_address);
                self.payment_method = Some(payment_method);
                self.subtotal = Money::new(subtotal_minor_units).unwrap_or(Money::ZERO);
                self.shipping_fee = Money::new(shipping_fee_minor_units).unwrap_or(Money::ZERO);
                self.status = OrderStatus::Accepted;
                self.created_at = Some(created_at);
            }

            OrderEvent::PaymentCompleted { transaction_id, .. } => {
                self.transaction_id = Some(transaction_id);
            }

            OrderEvent::ConvenienceStorePaymentIssued {
                payment_code,
                expires_at,
                ..
            } => {
                self.payment_code = Some(payment_code);
                self.payment_code_expires_at = Some(expires_at);
            }

            OrderEvent::OrderShipped { .. } => {
                self.status = OrderStatus::Shipped;
            }

            OrderEvent::OrderCompleted { .. } => {
                self.status = OrderStatus::Completed;
            }

            OrderEvent::OrderCancelled { .. } => {
                self.status = OrderStatus::Cancelled;
            }

            OrderEvent::RefundCompleted { .. } => {
                self.refund_completed = true;
            }
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, qty: u32) -> OrderLineItem {
        OrderLineItem {
            product_id: Uuid::new_v4(),
            name: "Widget".to_string(),
            unit_price_minor_units: price,
            quantity: qty,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient_name: "Jane Doe".to_string(),
            postal_code: "100-0001".to_string(),
            prefecture: "Tokyo".to_string(),
            city: "Chiyoda".to_string(),
            street_line: "1-1-1".to_string(),
            phone_number: "03-0000-0000".to_string(),
        }
    }

    #[test]
    fn test_cod_shipping_fee_and_total() {
        let items = vec![item(1000, 2)];
        let subtotal = Money::new(2000).unwrap();
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            items,
            address(),
            PaymentMethod::CashOnDelivery,
            subtotal,
        );

        assert_eq!(order.shipping_fee().minor_units(), 300);
        assert_eq!(order.total().minor_units(), 2300);
    }

    #[test]
    fn test_credit_card_shipping_is_free() {
        let items = vec![item(1000, 1)];
        let subtotal = Money::new(1000).unwrap();
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            items,
            address(),
            PaymentMethod::CreditCard,
            subtotal,
        );

        assert_eq!(order.shipping_fee().minor_units(), 0);
        assert_eq!(order.total().minor_units(), 1000);
    }

    #[test]
    fn test_ship_then_complete_then_cancel_fails() {
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![item(500, 1)],
            address(),
            PaymentMethod::CreditCard,
            Money::new(500).unwrap(),
        );

        let order = order.apply(order.ship().unwrap());
        assert_eq!(order.status(), OrderStatus::Shipped);

        let order = order.apply(order.complete().unwrap());
        assert_eq!(order.status(), OrderStatus::Completed);

        let result = order.cancel("changed mind".to_string());
        assert!(matches!(result, Err(DomainError::OrderAlreadyCompleted)));
    }

    #[test]
    fn test_cancel_from_accepted_then_refund() {
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![item(500, 1)],
            address(),
            PaymentMethod::CreditCard,
            Money::new(500).unwrap(),
        );

        let order = order.apply(order.cancel("out of stock".to_string()).unwrap());
        assert_eq!(order.status(), OrderStatus::Cancelled);

        let event = order.refund(order.total()).unwrap();
        let order = order.apply(event);
        assert!(order.refund_completed());

        let second = order.refund(order.total());
        assert!(matches!(second, Err(DomainError::OrderAlreadyRefunded)));
    }

    #[test]
    fn test_refund_requires_cancelled_order() {
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![item(500, 1)],
            address(),
            PaymentMethod::CreditCard,
            Money::new(500).unwrap(),
        );

        let result = order.refund(order.total());
        assert!(matches!(result, Err(DomainError::OrderNotCancelled)));
    }

    #[test]
    fn test_allowed_next_statuses() {
        let (order, _) = Order::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            vec![item(500, 1)],
            address(),
            PaymentMethod::CreditCard,
            Money::new(500).unwrap(),
        );
        assert_eq!(order.allowed_next_statuses(), vec!["SHIPPED", "CANCELLED"]);
    }
}
