//! Projection Service
//!
//! Updates read-model tables from events. This is the "Q" in CQRS: queries
//! never touch the event log directly, they read these denormalised,
//! best-effort tables instead. Every `apply_*_event` method is a total
//! function over its aggregate's event variants; if the target row is
//! missing for an update-style event the write is a no-op, because the
//! event log remains the source of truth (see SPEC_FULL §4.4).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{OrderEvent, PaymentMethod, ProductEvent, UserEvent};

/// Row shape returned for catalog reads.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price_minor_units: i64,
    pub category_id: Uuid,
    pub stock: i64,
    pub published: bool,
    pub image_urls: Vec<String>,
    pub version: i64,
}

impl ProductRow {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub items: serde_json::Value,
    pub shipping_address: serde_json::Value,
    pub payment_method: String,
    pub subtotal_minor_units: i64,
    pub shipping_fee_minor_units: i64,
    pub total_minor_units: i64,
    pub status: String,
    pub transaction_id: Option<String>,
    pub payment_code: Option<String>,
    pub payment_code_expires_at: Option<DateTime<Utc>>,
    pub version: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: Uuid,
    pub name: String,
}

/// A wishlist line joined against the current catalog row, so callers never
/// see a stale price or availability (SPEC_FULL §4.3.8).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WishlistItemRow {
    pub product_id: Uuid,
    pub name: String,
    pub price_minor_units: i64,
    pub published: bool,
    pub in_stock: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AddressRow {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub recipient_name: String,
    pub postal_code: String,
    pub prefecture: String,
    pub city: String,
    pub street_line: String,
    pub phone_number: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn payment_method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CreditCard => "CREDIT_CARD",
        PaymentMethod::ConvenienceStore => "CONVENIENCE_STORE",
        PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
    }
}

/// Projection Service for updating and querying read models.
#[derive(Debug, Clone)]
pub struct ProjectionService {
    pool: PgPool,
}

impl ProjectionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // ---------------------------------------------------------------
    // Products
    // ---------------------------------------------------------------

    pub async fn apply_product_event(
        &self,
        event: &ProductEvent,
        version: i64,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;
        self.apply_product_event_tx(&mut tx, event, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn apply_product_event_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &ProductEvent,
        version: i64,
    ) -> Result<(), ProjectionError> {
        match event {
            ProductEvent::ProductCreated {
                product_id,
                name,
                description,
                price_minor_units,
                category_id,
                initial_stock,
                ..
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO products_rm
                        (id, name, description, price_minor_units, category_id, stock, published, image_urls, version)
                    VALUES ($1, $2, $3, $4, $5, $6, TRUE, '{}', $7)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(product_id)
                .bind(name)
                .bind(description)
                .bind(price_minor_units)
                .bind(category_id)
                .bind(*initial_stock as i64)
                .bind(version)
                .execute(&mut **tx)
                .await?;
            }

            ProductEvent::ProductUpdated {
                product_id,
                changes,
                ..
            } => {
                sqlx::query(
                    r#"
                    UPDATE products_rm SET
                        name = COALESCE($2, name),
                        description = COALESCE($3, description),
                        price_minor_units = COALESCE($4, price_minor_units),
                        category_id = COALESCE($5, category_id),
                        published = COALESCE($6, published),
                        version = $7
                    WHERE id = $1
                    "#,
                )
                .bind(product_id)
                .bind(&changes.name)
                .bind(&changes.description)
                .bind(changes.price_minor_units)
                .bind(changes.category_id)
                .bind(changes.published)
                .bind(version)
                .execute(&mut **tx)
                .await?;
            }

            ProductEvent::ProductDeleted { product_id, .. } => {
                sqlx::query("UPDATE products_rm SET published = FALSE, version = $2 WHERE id = $1")
                    .bind(product_id)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            ProductEvent::StockUpdated {
                product_id,
                new_stock,
                ..
            } => {
                sqlx::query("UPDATE products_rm SET stock = $2, version = $3 WHERE id = $1")
                    .bind(product_id)
                    .bind(*new_stock as i64)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            ProductEvent::StockDecreased {
                product_id,
                quantity,
                ..
            } => {
                // Non-atomic read-then-write, matching the teacher's balance
                // update precedent: acceptable because the event log is
                // authoritative (SPEC_FULL §4.4, §9).
                let current: Option<i64> =
                    sqlx::query_scalar("SELECT stock FROM products_rm WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                if let Some(current) = current {
                    let updated = (current - *quantity as i64).max(0);
                    sqlx::query("UPDATE products_rm SET stock = $2, version = $3 WHERE id = $1")
                        .bind(product_id)
                        .bind(updated)
                        .bind(version)
                        .execute(&mut **tx)
                        .await?;
                }
            }

            ProductEvent::StockIncreased {
                product_id,
                quantity,
                ..
            } => {
                let current: Option<i64> =
                    sqlx::query_scalar("SELECT stock FROM products_rm WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut **tx)
                        .await?;
                if let Some(current) = current {
                    sqlx::query("UPDATE products_rm SET stock = $2, version = $3 WHERE id = $1")
                        .bind(product_id)
                        .bind(current + *quantity as i64)
                        .bind(version)
                        .execute(&mut **tx)
                        .await?;
                }
            }

            ProductEvent::ProductImageAssociated {
                product_id,
                image_url,
                ..
            } => {
                sqlx::query(
                    r#"
                    UPDATE products_rm
                    SET image_urls = array_append(image_urls, $2), version = $3
                    WHERE id = $1 AND COALESCE(array_length(image_urls, 1), 0) < 10
                    "#,
                )
                .bind(product_id)
                .bind(image_url)
                .bind(version)
                .execute(&mut **tx)
                .await?;
            }
        }

        Ok(())
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<Option<ProductRow>, ProjectionError> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products_rm WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Catalog-visible product lookup: absent or unpublished both read as `None`.
    pub async fn get_published_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductRow>, ProjectionError> {
        Ok(self.get_product(product_id).await?.filter(|p| p.published))
    }

    pub async fn list_published_products(
        &self,
        category_id: Option<Uuid>,
    ) -> Result<Vec<ProductRow>, ProjectionError> {
        let rows = match category_id {
            Some(category_id) => {
                sqlx::query_as::<_, ProductRow>(
                    "SELECT * FROM products_rm WHERE published = TRUE AND category_id = $1 ORDER BY name",
                )
                .bind(category_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ProductRow>(
                    "SELECT * FROM products_rm WHERE published = TRUE ORDER BY name",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Categories
    // ---------------------------------------------------------------

    pub async fn list_categories(&self) -> Result<Vec<CategoryRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories_rm ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get_category(&self, category_id: Uuid) -> Result<Option<CategoryRow>, ProjectionError> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT * FROM categories_rm WHERE id = $1")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn create_category(&self, id: Uuid, name: &str) -> Result<(), ProjectionError> {
        sqlx::query("INSERT INTO categories_rm (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn category_has_products(&self, category_id: Uuid) -> Result<bool, ProjectionError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products_rm WHERE category_id = $1 AND published = TRUE",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM categories_rm WHERE id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Orders
    // ---------------------------------------------------------------

    pub async fn apply_order_event(
        &self,
        event: &OrderEvent,
        version: i64,
    ) -> Result<(), ProjectionError> {
        let mut tx = self.pool.begin().await?;
        self.apply_order_event_tx(&mut tx, event, version).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn apply_order_event_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OrderEvent,
        version: i64,
    ) -> Result<(), ProjectionError> {
        match event {
            OrderEvent::OrderCreated {
                order_id,
                customer_id,
                items,
                shipping_address,
                payment_method,
                subtotal_minor_units,
                shipping_fee_minor_units,
                ..
            } => {
                let items_json = serde_json::to_value(items)?;
                let address_json = serde_json::to_value(shipping_address)?;
                let total = subtotal_minor_units + shipping_fee_minor_units;

                sqlx::query(
                    r#"
                    INSERT INTO orders_rm
                        (id, customer_id, items, shipping_address, payment_method,
                         subtotal_minor_units, shipping_fee_minor_units, total_minor_units, status, version)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'ACCEPTED', $9)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(order_id)
                .bind(customer_id)
                .bind(items_json)
                .bind(address_json)
                .bind(payment_method_str(*payment_method))
                .bind(subtotal_minor_units)
                .bind(shipping_fee_minor_units)
                .bind(total)
                .bind(version)
                .execute(&mut **tx)
                .await?;
            }

            OrderEvent::PaymentCompleted {
                order_id,
                transaction_id,
                ..
            } => {
                sqlx::query("UPDATE orders_rm SET transaction_id = $2, version = $3 WHERE id = $1")
                    .bind(order_id)
                    .bind(transaction_id)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            OrderEvent::ConvenienceStorePaymentIssued {
                order_id,
                payment_code,
                expires_at,
                ..
            } => {
                sqlx::query(
                    "UPDATE orders_rm SET payment_code = $2, payment_code_expires_at = $3, version = $4 WHERE id = $1",
                )
                .bind(order_id)
                .bind(payment_code)
                .bind(expires_at)
                .bind(version)
                .execute(&mut **tx)
                .await?;
            }

            OrderEvent::OrderShipped { order_id, .. } => {
                sqlx::query("UPDATE orders_rm SET status = 'SHIPPED', version = $2 WHERE id = $1")
                    .bind(order_id)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            OrderEvent::OrderCompleted { order_id, .. } => {
                sqlx::query("UPDATE orders_rm SET status = 'COMPLETED', version = $2 WHERE id = $1")
                    .bind(order_id)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            OrderEvent::OrderCancelled { order_id, .. } => {
                sqlx::query("UPDATE orders_rm SET status = 'CANCELLED', version = $2 WHERE id = $1")
                    .bind(order_id)
                    .bind(version)
                    .execute(&mut **tx)
                    .await?;
            }

            // No-op for the order row: refund state lives on the aggregate,
            // the read model doesn't track it separately (SPEC_FULL §4.4).
            OrderEvent::RefundCompleted { .. } => {}
        }

        Ok(())
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderRow>, ProjectionError> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders_rm WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_orders_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders_rm WHERE customer_id = $1 ORDER BY id DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_orders(&self) -> Result<Vec<OrderRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders_rm ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Users (write-through: written directly by the register/login
    // handlers alongside the event append, not solely event-derived)
    // ---------------------------------------------------------------

    pub async fn apply_user_event(&self, event: &UserEvent) -> Result<(), ProjectionError> {
        match event {
            UserEvent::UserRegistered {
                user_id,
                email,
                name,
                password_hash,
                ..
            } => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, email, name, password_hash, role, email_verified)
                    VALUES ($1, $2, $3, $4, 'CUSTOMER', FALSE)
                    ON CONFLICT (id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(email)
                .bind(name)
                .bind(password_hash)
                .execute(&self.pool)
                .await?;
            }

            UserEvent::EmailVerified { user_id, .. } => {
                sqlx::query("UPDATE users SET email_verified = TRUE WHERE id = $1")
                    .bind(user_id)
                    .execute(&self.pool)
                    .await?;
            }

            UserEvent::PasswordReset {
                user_id,
                new_password_hash,
                ..
            } => {
                sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(new_password_hash)
                    .execute(&self.pool)
                    .await?;
            }

            UserEvent::PasswordResetRequested { .. }
            | UserEvent::LoginFailed { .. }
            | UserEvent::AccountLocked { .. }
            | UserEvent::AccountUnlocked { .. } => {
                // Lockout/reset-request state lives on the replayed
                // aggregate; the users table doesn't track it.
            }
        }

        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, ProjectionError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<UserRow>, ProjectionError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list_customers(&self) -> Result<Vec<UserRow>, ProjectionError> {
        let rows =
            sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE role = 'CUSTOMER' ORDER BY email")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    // ---------------------------------------------------------------
    // Addresses (not event-sourced: a plain owned-by-customer record)
    // ---------------------------------------------------------------

    pub async fn count_addresses(&self, customer_id: Uuid) -> Result<i64, ProjectionError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM addresses WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn list_addresses(&self, customer_id: Uuid) -> Result<Vec<AddressRow>, ProjectionError> {
        let rows = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE customer_id = $1 ORDER BY id",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<Option<AddressRow>, ProjectionError> {
        let row = sqlx::query_as::<_, AddressRow>(
            "SELECT * FROM addresses WHERE id = $1 AND customer_id = $2",
        )
        .bind(address_id)
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create_address(
        &self,
        address_id: Uuid,
        customer_id: Uuid,
        recipient_name: &str,
        postal_code: &str,
        prefecture: &str,
        city: &str,
        street_line: &str,
        phone_number: &str,
    ) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO addresses
                (id, customer_id, recipient_name, postal_code, prefecture, city, street_line, phone_number)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(address_id)
        .bind(customer_id)
        .bind(recipient_name)
        .bind(postal_code)
        .bind(prefecture)
        .bind(city)
        .bind(street_line)
        .bind(phone_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
    ) -> Result<u64, ProjectionError> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND customer_id = $2")
            .bind(address_id)
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_address(
        &self,
        customer_id: Uuid,
        address_id: Uuid,
        recipient_name: &str,
        postal_code: &str,
        prefecture: &str,
        city: &str,
        street_line: &str,
        phone_number: &str,
    ) -> Result<u64, ProjectionError> {
        let result = sqlx::query(
            r#"
            UPDATE addresses
            SET recipient_name = $3, postal_code = $4, prefecture = $5, city = $6,
                street_line = $7, phone_number = $8
            WHERE id = $1 AND customer_id = $2
            "#,
        )
        .bind(address_id)
        .bind(customer_id)
        .bind(recipient_name)
        .bind(postal_code)
        .bind(prefecture)
        .bind(city)
        .bind(street_line)
        .bind(phone_number)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // ---------------------------------------------------------------
    // Wishlist (not event-sourced)
    // ---------------------------------------------------------------

    pub async fn wishlist_contains(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<bool, ProjectionError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM wishlists WHERE customer_id = $1 AND product_id = $2)",
        )
        .bind(customer_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn add_to_wishlist(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ProjectionError> {
        sqlx::query("INSERT INTO wishlists (customer_id, product_id) VALUES ($1, $2)")
            .bind(customer_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_from_wishlist(
        &self,
        customer_id: Uuid,
        product_id: Uuid,
    ) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM wishlists WHERE customer_id = $1 AND product_id = $2")
            .bind(customer_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Joined against `products_rm` so prices/availability are never stale,
    /// the same rationale as the cart view (SPEC_FULL §4.3.8, §4.5).
    pub async fn list_wishlist(&self, customer_id: Uuid) -> Result<Vec<WishlistItemRow>, ProjectionError> {
        let rows: Vec<WishlistItemRow> = sqlx::query_as(
            r#"
            SELECT w.product_id AS product_id, p.name AS name,
                   p.price_minor_units AS price_minor_units,
                   p.published AS published, (p.stock > 0) AS in_stock
            FROM wishlists w
            JOIN products_rm p ON p.id = w.product_id
            WHERE w.customer_id = $1
            ORDER BY w.product_id
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
