//! Checkout Handler
//!
//! Implements the Checkout / CreateOrder command (SPEC_FULL §4.3.1):
//! identify → load → decide → append → project → notify, grounded in the
//! teacher's `TransferHandler` shape — one struct per command, holding
//! `EventStore` + `ProjectionService`, with an `execute(command, context)`
//! method — generalized here to also hold the payment gateway and email
//! queue this command needs to call out to.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, Product};
use crate::domain::{DomainError, Money, OperationContext, PaymentMethod};
use crate::email::EmailQueue;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::payment::PaymentGateway;
use crate::projection::ProjectionService;

use super::{CreateOrderCommand, OrderResult};

/// Payment calls are bounded by this timeout; a timeout surfaces as
/// `PAYMENT_TIMEOUT` rather than hanging the request indefinitely.
const PAYMENT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct CheckoutHandler {
    event_store: EventStore,
    projection: ProjectionService,
    payment_gateway: Arc<dyn PaymentGateway>,
    email_queue: EmailQueue,
}

impl CheckoutHandler {
    pub fn new(
        event_store: EventStore,
        projection: ProjectionService,
        payment_gateway: Arc<dyn PaymentGateway>,
        email_queue: EmailQueue,
    ) -> Self {
        Self {
            event_store,
            projection,
            payment_gateway,
            email_queue,
        }
    }

    pub async fn execute(&self, command: CreateOrderCommand, context: &OperationContext) -> AppResult<OrderResult> {
        if !context.authorizes(command.customer_id) {
            return Err(AppError::Forbidden("cannot checkout for another customer".to_string()));
        }

        if command.items.is_empty() {
            return Err(DomainError::CartEmpty.into());
        }

        let subtotal_minor_units: i64 = command
            .items
            .iter()
            .map(|item| item.unit_price_minor_units * item.quantity as i64)
            .sum();
        let subtotal = Money::new(subtotal_minor_units)
            .map_err(|e| AppError::Domain(DomainError::Validation(e.to_string())))?;

        let order_id = Uuid::new_v4();
        let (mut order, created_event) = Order::create(
            order_id,
            command.customer_id,
            command.items.clone(),
            command.shipping_address.clone(),
            command.payment_method,
            subtotal,
        );

        self.event_store
            .append(order_id, Order::aggregate_type(), &[created_event.clone()], 0)
            .await?;
        self.projection.apply_order_event(&created_event, 1).await?;

        match command.payment_method {
            PaymentMethod::CreditCard => {
                let card = command
                    .credit_card
                    .as_ref()
                    .ok_or_else(|| AppError::Domain(DomainError::Validation("credit card details required".to_string())))?;

                let charge = tokio::time::timeout(
                    PAYMENT_TIMEOUT,
                    self.payment_gateway.charge_credit_card(order.total(), card),
                )
                .await
                .map_err(|_| AppError::Domain(DomainError::PaymentTimeout))?
                .map_err(|_| AppError::Domain(DomainError::PaymentDeclined))?;

                let event = order.complete_payment(charge.transaction_id);
                self.event_store
                    .append(order_id, Order::aggregate_type(), &[event.clone()], order.version())
                    .await?;
                self.projection.apply_order_event(&event, order.version() + 1).await?;
                order = order.apply(event);
            }
            PaymentMethod::ConvenienceStore => {
                let issued = tokio::time::timeout(
                    PAYMENT_TIMEOUT,
                    self.payment_gateway.issue_convenience_store_payment(order.total()),
                )
                .await
                .map_err(|_| AppError::Domain(DomainError::PaymentTimeout))?
                .map_err(|_| AppError::Domain(DomainError::PaymentDeclined))?;

                let event = order.issue_convenience_store_payment(issued.payment_code, issued.expires_at);
                self.event_store
                    .append(order_id, Order::aggregate_type(), &[event.clone()], order.version())
                    .await?;
                self.projection.apply_order_event(&event, order.version() + 1).await?;
                order = order.apply(event);
            }
            PaymentMethod::CashOnDelivery => {}
        }

        for item in &command.items {
            let product: Product = self
                .event_store
                .load_aggregate(item.product_id)
                .await?
                .ok_or_else(|| DomainError::ProductNotFound(item.product_id.to_string()))?;

            let event = product.decrease_stock(item.quantity, order_id)?;
            self.event_store
                .append(item.product_id, Product::aggregate_type(), &[event.clone()], product.version())
                .await?;
            self.projection.apply_product_event(&event, product.version() + 1).await?;
        }

        self.email_queue
            .enqueue_order_confirmation(order_id, &command.customer_email, order.total().minor_units())
            .await
            .map_err(AppError::from)?;

        Ok(OrderResult {
            order_id,
            status: "ACCEPTED".to_string(),
            subtotal_minor_units: order.subtotal().minor_units(),
            shipping_fee_minor_units: order.shipping_fee().minor_units(),
            total_minor_units: order.total().minor_units(),
            transaction_id: order.transaction_id().map(|s| s.to_string()),
            payment_code: order.payment_code().map(|s| s.to_string()),
        })
    }
}
