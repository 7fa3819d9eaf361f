//! Order Lifecycle Handlers
//!
//! Cancel, refund, ship and complete (SPEC_FULL §4.3.2-4.3.4), grounded in
//! the same identify → load → decide → append → project → notify skeleton
//! as `CheckoutHandler`.

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Order, Product};
use crate::domain::{DomainError, OperationContext, PaymentMethod};
use crate::email::EmailQueue;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::payment::PaymentGateway;
use crate::projection::ProjectionService;

use super::{CancelOrderCommand, OrderResult, RefundOrderCommand};

async fn load_order(event_store: &EventStore, order_id: Uuid) -> AppResult<Order> {
    event_store
        .load_aggregate(order_id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::OrderNotFound(order_id.to_string())))
}

fn order_result(order: &Order) -> OrderResult {
    OrderResult {
        order_id: order.id(),
        status: order.status().as_str().to_string(),
        subtotal_minor_units: order.subtotal().minor_units(),
        shipping_fee_minor_units: order.shipping_fee().minor_units(),
        total_minor_units: order.total().minor_units(),
        transaction_id: order.transaction_id().map(|s| s.to_string()),
        payment_code: order.payment_code().map(|s| s.to_string()),
    }
}

pub struct CancelOrderHandler {
    event_store: EventStore,
    projection: ProjectionService,
    payment_gateway: Arc<dyn PaymentGateway>,
}

impl CancelOrderHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService, payment_gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            event_store,
            projection,
            payment_gateway,
        }
    }

    pub async fn execute(&self, command: CancelOrderCommand, context: &OperationContext) -> AppResult<OrderResult> {
        let order = load_order(&self.event_store, command.order_id).await?;
        if !context.is_admin() && !context.authorizes(order.customer_id()) {
            return Err(AppError::Forbidden("cannot cancel another customer's order".to_string()));
        }

        let event = order.cancel(command.reason)?;
        self.event_store
            .append(order.id(), Order::aggregate_type(), &[event.clone()], order.version())
            .await?;
        self.projection.apply_order_event(&event, order.version() + 1).await?;
        let order = order.apply(event);

        for item in order.items() {
            let product: Product = self
                .event_store
                .load_aggregate(item.product_id)
                .await?
                .ok_or_else(|| DomainError::ProductNotFound(item.product_id.to_string()))?;

            let restock_event = product.increase_stock(item.quantity, order.id())?;
            self.event_store
                .append(item.product_id, Product::aggregate_type(), &[restock_event.clone()], product.version())
                .await?;
            self.projection.apply_product_event(&restock_event, product.version() + 1).await?;
        }

        if order.payment_method() == Some(PaymentMethod::ConvenienceStore) {
            if let Some(code) = order.payment_code() {
                let _ = self.payment_gateway.void_convenience_store_payment(code).await;
            }
        }

        Ok(order_result(&order))
    }
}

pub struct RefundOrderHandler {
    event_store: EventStore,
    projection: ProjectionService,
    payment_gateway: Arc<dyn PaymentGateway>,
    email_queue: EmailQueue,
}

impl RefundOrderHandler {
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

    pub async fn execute(&self, command: RefundOrderCommand, context: &OperationContext) -> AppResult<OrderResult> {
        if !context.is_admin() {
            return Err(AppError::Forbidden("refunds require an admin actor".to_string()));
        }

        let order = load_order(&self.event_store, command.order_id).await?;

        if order.payment_method() == Some(PaymentMethod::CreditCard) {
            let transaction_id = order
                .transaction_id()
                .ok_or(DomainError::RefundTransactionNotFound)?;
            self.payment_gateway
                .refund(transaction_id, order.total())
                .await
                .map_err(|_| AppError::Domain(DomainError::PaymentDeclined))?;
        }

        let event = order.refund(order.total())?;
        self.event_store
            .append(order.id(), Order::aggregate_type(), &[event.clone()], order.version())
            .await?;
        self.projection.apply_order_event(&event, order.version() + 1).await?;
        let order = order.apply(event);

        let customer = self
            .projection
            .get_user(order.customer_id())
            .await?
            .ok_or_else(|| DomainError::UserNotFound(order.customer_id().to_string()))?;

        self.email_queue
            .enqueue_refund_notification(order.id(), &customer.email, order.total().minor_units())
            .await
            .map_err(AppError::from)?;

        Ok(order_result(&order))
    }
}

pub struct ShipOrderHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl ShipOrderHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, order_id: Uuid, context: &OperationContext) -> AppResult<OrderResult> {
        if !context.is_admin() {
            return Err(AppError::Forbidden("shipping requires an admin actor".to_string()));
        }

        let order = load_order(&self.event_store, order_id).await?;
        let event = order.ship()?;
        self.event_store
            .append(order_id, Order::aggregate_type(), &[event.clone()], order.version())
            .await?;
        self.projection.apply_order_event(&event, order.version() + 1).await?;
        let order = order.apply(event);

        Ok(order_result(&order))
    }
}

pub struct CompleteOrderHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl CompleteOrderHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, order_id: Uuid, context: &OperationContext) -> AppResult<OrderResult> {
        if !context.is_admin() {
            return Err(AppError::Forbidden("completing an order requires an admin actor".to_string()));
        }

        let order = load_order(&self.event_store, order_id).await?;
        let event = order.complete()?;
        self.event_store
            .append(order_id, Order::aggregate_type(), &[event.clone()], order.version())
            .await?;
        self.projection.apply_order_event(&event, order.version() + 1).await?;
        let order = order.apply(event);

        Ok(order_result(&order))
    }
}
