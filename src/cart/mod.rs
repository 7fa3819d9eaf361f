//! Cart Actor
//!
//! Per-customer single-threaded cart state (SPEC_FULL §3.6, §4.5, §5): one
//! `tokio::task` per customer owns the cart's mutable state exclusively, fed
//! by a bounded `mpsc` inbox, so concurrent requests for the same customer
//! serialise naturally while different customers run fully in parallel.
//! Grounded in the teacher's single-owner-resource idiom (one struct per
//! concern) generalized from a single shared resource to a per-key actor
//! pool.
//!
//! Stock and price are never cached in the actor: every `get`/`addItem`/
//! `updateItem` re-reads the catalog projection so the cart can never quote
//! a stale price or a product that has since sold out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crate::domain::DomainError;
use crate::projection::ProjectionService;

/// Cart actors are reaped after this much inactivity (SPEC_FULL §9).
pub const CART_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

const INBOX_CAPACITY: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price_minor_units: i64,
    pub quantity: u32,
    pub subtotal_minor_units: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total_minor_units: i64,
}

type Reply = oneshot::Sender<Result<CartView, DomainError>>;

enum CartCommand {
    Get(Reply),
    AddItem { product_id: Uuid, quantity: u32, reply: Reply },
    UpdateItem { product_id: Uuid, quantity: u32, reply: Reply },
    RemoveItem { product_id: Uuid, reply: Reply },
    Clear(Reply),
}

/// Single-threaded owner of one customer's cart contents.
struct CartActor {
    items: HashMap<Uuid, u32>,
    projection: ProjectionService,
    inbox: mpsc::Receiver<CartCommand>,
}

impl CartActor {
    fn new(projection: ProjectionService, inbox: mpsc::Receiver<CartCommand>) -> Self {
        Self {
            items: HashMap::new(),
            projection,
            inbox,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.inbox.recv().await {
            match command {
                CartCommand::Get(reply) => {
                    let view = self.view().await;
                    let _ = reply.send(view);
                }
                CartCommand::AddItem { product_id, quantity, reply } => {
                    let result = self.add_item(product_id, quantity).await;
                    let _ = reply.send(result);
                }
                CartCommand::UpdateItem { product_id, quantity, reply } => {
                    let result = self.update_item(product_id, quantity).await;
                    let _ = reply.send(result);
                }
                CartCommand::RemoveItem { product_id, reply } => {
                    self.items.remove(&product_id);
                    let result = self.view().await;
                    let _ = reply.send(result);
                }
                CartCommand::Clear(reply) => {
                    self.items.clear();
                    let _ = reply.send(Ok(CartView::default()));
                }
            }
        }
    }

    /// Authoritative stock/availability check shared by add and update.
    async fn check_availability(&self, product_id: Uuid, requested: u32) -> Result<(), DomainError> {
        let product = self
            .projection
            .get_published_product(product_id)
            .await
            .map_err(|e| DomainError::Validation(e.to_string()))?
            .ok_or_else(|| DomainError::ProductNotFound(product_id.to_string()))?;

        if !product.in_stock() {
            return Err(DomainError::OutOfStock);
        }
        if requested as i64 > product.stock {
            return Err(DomainError::insufficient_stock(requested, product.stock as u32));
        }

        Ok(())
    }

    async fn add_item(&mut self, product_id: Uuid, quantity: u32) -> Result<CartView, DomainError> {
        let existing = self.items.get(&product_id).copied().unwrap_or(0);
        let new_quantity = existing + quantity;
        self.check_availability(product_id, new_quantity).await?;
        self.items.insert(product_id, new_quantity);
        self.view().await
    }

    async fn update_item(&mut self, product_id: Uuid, quantity: u32) -> Result<CartView, DomainError> {
        if quantity == 0 {
            self.items.remove(&product_id);
        } else {
            self.check_availability(product_id, quantity).await?;
            self.items.insert(product_id, quantity);
        }
        self.view().await
    }

    /// Recompute line items against the live catalog view. Products that
    /// have since been unpublished or deleted are silently dropped from the
    /// view rather than surfaced as an error — the shopper sees a smaller
    /// cart, not a broken one.
    async fn view(&self) -> Result<CartView, DomainError> {
        let mut lines = Vec::with_capacity(self.items.len());
        let mut total: i64 = 0;

        for (&product_id, &quantity) in self.items.iter() {
            let product = self
                .projection
                .get_published_product(product_id)
                .await
                .map_err(|e| DomainError::Validation(e.to_string()))?;

            let Some(product) = product else { continue };

            let subtotal = product.price_minor_units * quantity as i64;
            total += subtotal;
            lines.push(CartLine {
                product_id,
                product_name: product.name,
                unit_price_minor_units: product.price_minor_units,
                quantity,
                subtotal_minor_units: subtotal,
            });
        }

        Ok(CartView {
            lines,
            total_minor_units: total,
        })
    }
}

struct ActorHandle {
    sender: mpsc::Sender<CartCommand>,
    last_active: Arc<Mutex<Instant>>,
}

/// Registry of live cart actors, one per customer. New actors are spawned
/// lazily on first use and reaped by `reap_idle` after `CART_IDLE_TTL`.
#[derive(Clone)]
pub struct CartRegistry {
    actors: Arc<Mutex<HashMap<Uuid, ActorHandle>>>,
    projection: ProjectionService,
}

impl CartRegistry {
    pub fn new(projection: ProjectionService) -> Self {
        Self {
            actors: Arc::new(Mutex::new(HashMap::new())),
            projection,
        }
    }

    async fn handle_for(&self, customer_id: Uuid) -> (mpsc::Sender<CartCommand>, Arc<Mutex<Instant>>) {
        let mut actors = self.actors.lock().await;

        if let Some(handle) = actors.get(&customer_id) {
            return (handle.sender.clone(), handle.last_active.clone());
        }

        let (sender, inbox) = mpsc::channel(INBOX_CAPACITY);
        let actor = CartActor::new(self.projection.clone(), inbox);
        tokio::spawn(actor.run());

        let last_active = Arc::new(Mutex::new(Instant::now()));
        actors.insert(
            customer_id,
            ActorHandle {
                sender: sender.clone(),
                last_active: last_active.clone(),
            },
        );

        (sender, last_active)
    }

    async fn dispatch(
        &self,
        customer_id: Uuid,
        build: impl FnOnce(Reply) -> CartCommand,
    ) -> Result<CartView, DomainError> {
        let (sender, last_active) = self.handle_for(customer_id).await;
        *last_active.lock().await = Instant::now();

        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(build(reply_tx))
            .await
            .map_err(|_| DomainError::Validation("cart actor unavailable".to_string()))?;

        reply_rx
            .await
            .map_err(|_| DomainError::Validation("cart actor unavailable".to_string()))?
    }

    pub async fn get(&self, customer_id: Uuid) -> Result<CartView, DomainError> {
        self.dispatch(customer_id, CartCommand::Get).await
    }

    pub async fn add_item(&self, customer_id: Uuid, product_id: Uuid, quantity: u32) -> Result<CartView, DomainError> {
        self.dispatch(customer_id, |reply| CartCommand::AddItem {
            product_id,
            quantity,
            reply,
        })
        .await
    }

    pub async fn update_item(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> Result<CartView, DomainError> {
        self.dispatch(customer_id, |reply| CartCommand::UpdateItem {
            product_id,
            quantity,
            reply,
        })
        .await
    }

    pub async fn remove_item(&self, customer_id: Uuid, product_id: Uuid) -> Result<CartView, DomainError> {
        self.dispatch(customer_id, |reply| CartCommand::RemoveItem { product_id, reply })
            .await
    }

    pub async fn clear(&self, customer_id: Uuid) -> Result<CartView, DomainError> {
        self.dispatch(customer_id, CartCommand::Clear).await
    }

    /// Drop actors that have not handled a command in `ttl`. Dropping the
    /// registry's `Sender` closes the actor's inbox, so its task exits on
    /// its own the next time the loop polls `recv`.
    pub async fn reap_idle(&self, ttl: Duration) {
        let mut actors = self.actors.lock().await;
        let mut stale = Vec::new();

        for (customer_id, handle) in actors.iter() {
            if handle.last_active.lock().await.elapsed() > ttl {
                stale.push(*customer_id);
            }
        }

        for customer_id in stale {
            actors.remove(&customer_id);
            tracing::info!(%customer_id, "reaped idle cart actor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_view_default_is_empty() {
        let view = CartView::default();
        assert!(view.lines.is_empty());
        assert_eq!(view.total_minor_units, 0);
    }
}
