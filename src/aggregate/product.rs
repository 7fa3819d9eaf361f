//! Product Aggregate
//!
//! Product is the core aggregate for the catalog: pricing, stock, and images.
//! State is derived from events, never directly mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DomainError, Money, ProductChanges, ProductEvent};

use super::Aggregate;

/// Maximum number of images a product may carry.
pub const MAX_IMAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductStatus {
    Published,
    Unpublished,
}

impl Default for ProductStatus {
    fn default() -> Self {
        Self::Published
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockStatus {
    InStock,
    OutOfStock,
}

/// Product Aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    name: String,
    description: String,
    price: Money,
    category_id: Uuid,
    stock: u32,
    status: ProductStatus,
    image_urls: Vec<String>,
    version: i64,
    created_at: Option<DateTime<Utc>>,
}

impl Default for Product {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            description: String::new(),
            price: Money::ZERO,
            category_id: Uuid::nil(),
            stock: 0,
            status: ProductStatus::Published,
            image_urls: Vec::new(),
            version: 0,
            created_at: None,
        }
    }
}

impl Product {
    pub fn create(
        product_id: Uuid,
        name: String,
        description: String,
        price: Money,
        category_id: Uuid,
        initial_stock: u32,
    ) -> (Self, ProductEvent) {
        let now = Utc::now();

        let event = ProductEvent::ProductCreated {
            product_id,
            name: name.clone(),
            description: description.clone(),
            price_minor_units: price.minor_units(),
            category_id,
            initial_stock,
            created_at: now,
        };

        let product = Self {
            id: product_id,
            name,
            description,
            price,
            category_id,
            stock: initial_stock,
            status: ProductStatus::Published,
            image_urls: Vec::new(),
            version: 1,
            created_at: Some(now),
        };

        (product, event)
    }

    pub fn update(&self, changes: ProductChanges) -> Result<ProductEvent, DomainError> {
        if self.status == ProductStatus::Unpublished {
            return Err(DomainError::ProductNotFound(self.id.to_string()));
        }

        Ok(ProductEvent::ProductUpdated {
            product_id: self.id,
            changes,
            updated_at: Utc::now(),
        })
    }

    pub fn delete(&self) -> Result<ProductEvent, DomainError> {
        Ok(ProductEvent::ProductDeleted {
            product_id: self.id,
            deleted_at: Utc::now(),
        })
    }

    pub fn update_stock(&self, new_stock: u32) -> Result<ProductEvent, DomainError> {
        Ok(ProductEvent::StockUpdated {
            product_id: self.id,
            new_stock,
            updated_at: Utc::now(),
        })
    }

    /// Decrease stock for a checkout line item. Rejects if insufficient.
    pub fn decrease_stock(&self, quantity: u32, order_id: Uuid) -> Result<ProductEvent, DomainError> {
        if self.stock == 0 {
            return Err(DomainError::OutOfStock);
        }
        if quantity > self.stock {
            return Err(DomainError::insufficient_stock(quantity, self.stock));
        }

        Ok(ProductEvent::StockDecreased {
            product_id: self.id,
            quantity,
            order_id,
            decreased_at: Utc::now(),
        })
    }

    /// Increase stock when an order is cancelled (restock).
    pub fn increase_stock(&self, quantity: u32, order_id: Uuid) -> Result<ProductEvent, DomainError> {
        Ok(ProductEvent::StockIncreased {
            product_id: self.id,
            quantity,
            order_id,
            increased_at: Utc::now(),
        })
    }

    pub fn associate_image(&self, image_url: String) -> Result<ProductEvent, DomainError> {
        if self.image_urls.len() >= MAX_IMAGES {
            return Err(DomainError::ImageLimitExceeded);
        }

        Ok(ProductEvent::ProductImageAssociated {
            product_id: self.id,
            image_url,
            associated_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn category_id(&self) -> Uuid {
        self.category_id
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn stock_status(&self) -> StockStatus {
        if self.stock > 0 {
            StockStatus::InStock
        } else {
            StockStatus::OutOfStock
        }
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_published(&self) -> bool {
        self.status == ProductStatus::Published
    }

    pub fn image_urls(&self) -> &[String] {
        &self.image_urls
    }
}

impl Aggregate for Product {
    type Event = ProductEvent;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(mut self, event: Self::Event) -> Self {
        match event {
            ProductEvent::ProductCreated {
                product_id,
                name,
                description,
                price_minor_units,
                category_id,
                initial_stock,
                created_at,
            } => {
                self.id = product_id;
                self.name = name;
                self.description = description;
                // Construction always goes through Money::new before the event is
                // emitted, so a stored event's price is trusted as valid here.
                self.price = Money::new(price_minor_units).unwrap_or(Money::ZERO);
                self.category_id = category_id;
                self.stock = initial_stock;
                self.status = ProductStatus::Published;
                self.created_at = Some(created_at);
            }

            ProductEvent::ProductUpdated { changes, .. } => {
                if let Some(name) = changes.name {
                    self.name = name;
                }
                if let Some(description) = changes.description {
                    self.description = description;
                }
                if let Some(price_minor_units) = changes.price_minor_units {
                    self.price = Money::new(price_minor_units).unwrap_or(self.price);
                }
                if let Some(category_id) = changes.category_id {
                    self.category_id = category_id;
                }
                if let Some(published) = changes.published {
                    self.status = if published {
                        ProductStatus::Published
                    } else {
                        ProductStatus::Unpublished
                    };
                }
            }

            ProductEvent::ProductDeleted { .. } => {
                self.status = ProductStatus::Unpublished;
            }

            ProductEvent::StockUpdated { new_stock, .. } => {
                self.stock = new_stock;
            }

            ProductEvent::StockDecreased { quantity, .. } => {
                self.stock = self.stock.saturating_sub(quantity);
            }

            ProductEvent::StockIncreased { quantity, .. } => {
                self.stock += quantity;
            }

            ProductEvent::ProductImageAssociated { image_url, .. } => {
                if self.image_urls.len() < MAX_IMAGES {
                    self.image_urls.push(image_url);
                }
            }
        }

        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price(minor_units: i64) -> Money {
        Money::new(minor_units).unwrap()
    }

    #[test]
    fn test_product_create() {
        let product_id = Uuid::new_v4();
        let category_id = Uuid::new_v4();

        let (product, event) = Product::create(
            product_id,
            "Widget".to_string(),
            "A fine widget".to_string(),
            price(1000),
            category_id,
            5,
        );

        assert_eq!(product.id(), product_id);
        assert_eq!(product.stock(), 5);
        assert_eq!(product.version(), 1);
        assert!(matches!(event, ProductEvent::ProductCreated { .. }));
    }

    #[test]
    fn test_stock_decrease_clamps_at_zero_on_replay() {
        let (product, _) = Product::create(
            Uuid::new_v4(),
            "Widget".to_string(),
            String::new(),
            price(1000),
            Uuid::new_v4(),
            2,
        );

        let order_id = Uuid::new_v4();
        let event = product.decrease_stock(2, order_id).unwrap();
        let product = product.apply(event);
        assert_eq!(product.stock(), 0);
        assert_eq!(product.stock_status(), StockStatus::OutOfStock);

        // A second decrease beyond the command surface should still clamp on replay
        let clamped = product.apply(ProductEvent::StockDecreased {
            product_id: product.id(),
            quantity: 3,
            order_id,
            decreased_at: Utc::now(),
        });
        assert_eq!(clamped.stock(), 0);
    }

    #[test]
    fn test_decrease_stock_rejects_insufficient() {
        let (product, _) = Product::create(
            Uuid::new_v4(),
            "Widget".to_string(),
            String::new(),
            price(1000),
            Uuid::new_v4(),
            1,
        );

        let result = product.decrease_stock(5, Uuid::new_v4());
        assert!(matches!(
            result,
            Err(DomainError::InsufficientStock { requested: 5, available: 1 })
        ));
    }

    #[test]
    fn test_out_of_stock_rejects_decrease() {
        let (product, _) = Product::create(
            Uuid::new_v4(),
            "Widget".to_string(),
            String::new(),
            price(1000),
            Uuid::new_v4(),
            0,
        );

        let result = product.decrease_stock(1, Uuid::new_v4());
        assert!(matches!(result, Err(DomainError::OutOfStock)));
    }

    #[test]
    fn test_image_cap_enforced_and_silently_dropped_on_replay() {
        let (mut product, _) = Product::create(
            Uuid::new_v4(),
            "Widget".to_string(),
            String::new(),
            price(1000),
            Uuid::new_v4(),
            1,
        );

        for i in 0..MAX_IMAGES {
            let event = product.associate_image(format!("https://img/{i}")).unwrap();
            product = product.apply(event);
        }
        assert_eq!(product.image_urls().len(), MAX_IMAGES);

        let result = product.associate_image("https://img/overflow".to_string());
        assert!(matches!(result, Err(DomainError::ImageLimitExceeded)));

        // Replay-time safety net: even a raw event past the cap is dropped.
        let product = product.apply(ProductEvent::ProductImageAssociated {
            product_id: product.id(),
            image_url: "https://img/overflow".to_string(),
            associated_at: Utc::now(),
        });
        assert_eq!(product.image_urls().len(), MAX_IMAGES);
    }

    #[test]
    fn test_deleted_product_is_unpublished() {
        let (product, _) = Product::create(
            Uuid::new_v4(),
            "Widget".to_string(),
            String::new(),
            price(1000),
            Uuid::new_v4(),
            1,
        );

        let event = product.delete().unwrap();
        let product = product.apply(event);
        assert!(!product.is_published());
    }
}
