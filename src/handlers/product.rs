//! Product / Catalog Admin Handlers
//!
//! Create/update/delete, stock update, and image association (SPEC_FULL
//! §4.3.5) — admin-only, following the same identify → load → decide →
//! append → project skeleton as the order handlers.

use uuid::Uuid;

use crate::aggregate::{Aggregate, Product};
use crate::domain::{DomainError, Money, OperationContext, ProductChanges};
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::projection::ProjectionService;

use super::{CreateProductCommand, ProductResult};

fn require_admin(context: &OperationContext) -> AppResult<()> {
    if !context.is_admin() {
        return Err(AppError::Forbidden("product catalog changes require an admin actor".to_string()));
    }
    Ok(())
}

async fn load_product(event_store: &EventStore, product_id: Uuid) -> AppResult<Product> {
    event_store
        .load_aggregate(product_id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::ProductNotFound(product_id.to_string())))
}

pub struct CreateProductHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl CreateProductHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, command: CreateProductCommand, context: &OperationContext) -> AppResult<ProductResult> {
        require_admin(context)?;

        self.projection
            .get_category(command.category_id)
            .await?
            .ok_or_else(|| DomainError::CategoryNotFound(command.category_id.to_string()))?;

        let price = Money::new(command.price_minor_units)
            .map_err(|e| AppError::Domain(DomainError::Validation(e.to_string())))?;

        let product_id = Uuid::new_v4();
        let (_product, event) = Product::create(
            product_id,
            command.name,
            command.description,
            price,
            command.category_id,
            command.initial_stock,
        );

        self.event_store
            .append(product_id, Product::aggregate_type(), &[event.clone()], 0)
            .await?;
        self.projection.apply_product_event(&event, 1).await?;

        Ok(ProductResult { product_id })
    }
}

pub struct UpdateProductHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl UpdateProductHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, product_id: Uuid, changes: ProductChanges, context: &OperationContext) -> AppResult<()> {
        require_admin(context)?;

        if let Some(category_id) = changes.category_id {
            self.projection
                .get_category(category_id)
                .await?
                .ok_or_else(|| DomainError::CategoryNotFound(category_id.to_string()))?;
        }
        if let Some(price_minor_units) = changes.price_minor_units {
            Money::new(price_minor_units).map_err(|e| AppError::Domain(DomainError::Validation(e.to_string())))?;
        }

        let product = load_product(&self.event_store, product_id).await?;
        if !product.is_published() {
            return Err(AppError::Domain(DomainError::ProductNotFound(product_id.to_string())));
        }

        let event = product.update(changes)?;
        self.event_store
            .append(product_id, Product::aggregate_type(), &[event.clone()], product.version())
            .await?;
        self.projection.apply_product_event(&event, product.version() + 1).await?;

        Ok(())
    }
}

pub struct DeleteProductHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl DeleteProductHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, product_id: Uuid, context: &OperationContext) -> AppResult<()> {
        require_admin(context)?;

        let product = load_product(&self.event_store, product_id).await?;
        let event = product.delete()?;
        self.event_store
            .append(product_id, Product::aggregate_type(), &[event.clone()], product.version())
            .await?;
        self.projection.apply_product_event(&event, product.version() + 1).await?;

        Ok(())
    }
}

pub struct UpdateStockHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl UpdateStockHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, product_id: Uuid, new_stock: u32, context: &OperationContext) -> AppResult<()> {
        require_admin(context)?;

        let product = load_product(&self.event_store, product_id).await?;
        let event = product.update_stock(new_stock)?;
        self.event_store
            .append(product_id, Product::aggregate_type(), &[event.clone()], product.version())
            .await?;
        self.projection.apply_product_event(&event, product.version() + 1).await?;

        Ok(())
    }
}

pub struct AssociateImageHandler {
    event_store: EventStore,
    projection: ProjectionService,
}

impl AssociateImageHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService) -> Self {
        Self { event_store, projection }
    }

    pub async fn execute(&self, product_id: Uuid, image_url: String, context: &OperationContext) -> AppResult<()> {
        require_admin(context)?;

        let product = load_product(&self.event_store, product_id).await?;
        let event = product.associate_image(image_url)?;
        self.event_store
            .append(product_id, Product::aggregate_type(), &[event.clone()], product.version())
            .await?;
        self.projection.apply_product_event(&event, product.version() + 1).await?;

        Ok(())
    }
}
