//! Common test utilities
//!
//! Brings up a Postgres-backed pool against a throwaway schema and leaves it
//! truncated between tests. There is no migration tool in this crate (the
//! relational schema is an external collaborator per SPEC_FULL §6.3) so
//! tests create the tables they need directly, matching the table list
//! `db::check_schema` enforces at boot.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Bring up a pool against `DATABASE_URL`, create the schema if it isn't
/// already there, and truncate every table for a clean slate.
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database");

    create_schema(&pool).await;
    truncate_all(&pool).await;

    pool
}

async fn create_schema(pool: &PgPool) {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS domain_events (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            aggregate_type TEXT NOT NULL,
            aggregate_id UUID NOT NULL,
            version BIGINT NOT NULL,
            event_type TEXT NOT NULL,
            event_data JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (aggregate_id, version)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS categories_rm (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS products_rm (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price_minor_units BIGINT NOT NULL,
            category_id UUID NOT NULL,
            stock BIGINT NOT NULL,
            published BOOLEAN NOT NULL DEFAULT TRUE,
            image_urls TEXT[] NOT NULL DEFAULT '{}',
            version BIGINT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS orders_rm (
            id UUID PRIMARY KEY,
            customer_id UUID NOT NULL,
            items JSONB NOT NULL,
            shipping_address JSONB NOT NULL,
            payment_method TEXT NOT NULL,
            subtotal_minor_units BIGINT NOT NULL,
            shipping_fee_minor_units BIGINT NOT NULL,
            total_minor_units BIGINT NOT NULL,
            status TEXT NOT NULL,
            transaction_id TEXT,
            payment_code TEXT,
            payment_code_expires_at TIMESTAMPTZ,
            version BIGINT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'CUSTOMER',
            email_verified BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS addresses (
            id UUID PRIMARY KEY,
            customer_id UUID NOT NULL,
            recipient_name TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            prefecture TEXT NOT NULL,
            city TEXT NOT NULL,
            street_line TEXT NOT NULL,
            phone_number TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS wishlists (
            customer_id UUID NOT NULL,
            product_id UUID NOT NULL,
            PRIMARY KEY (customer_id, product_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS refresh_tokens (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            revoked_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            used_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS email_verification_tokens (
            id UUID PRIMARY KEY,
            user_id UUID NOT NULL,
            token_hash TEXT NOT NULL UNIQUE,
            expires_at TIMESTAMPTZ NOT NULL,
            used_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS email_send_attempts (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            dedupe_key TEXT NOT NULL,
            email_type TEXT NOT NULL,
            recipient_email TEXT NOT NULL,
            payload JSONB NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INT NOT NULL DEFAULT 0,
            max_attempts INT NOT NULL DEFAULT 3,
            last_error TEXT,
            next_attempt_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            sent_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            UNIQUE (dedupe_key, email_type)
        )
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .expect("failed to create test schema");
    }
}

async fn truncate_all(pool: &PgPool) {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            domain_events,
            products_rm,
            categories_rm,
            orders_rm,
            users,
            addresses,
            wishlists,
            refresh_tokens,
            password_reset_tokens,
            email_verification_tokens,
            email_send_attempts
        "#,
    )
    .execute(pool)
    .await
    .expect("failed to truncate test tables");
}
