//! Email Queue
//!
//! Transactional email is an external collaborator specified only by
//! interface (SPEC_FULL §1, §6.4) plus a durable, idempotent outbox in
//! front of it (SPEC_FULL §4.6): order confirmation, refund notification,
//! password reset, and email verification sends are enqueued under a
//! dedupe key, then drained by `EmailQueue::tick` with bounded retry.
//!
//! Grounded on the teacher's `jobs/mod.rs` periodic-tick idiom generalized
//! from rate-limit-bucket maintenance to outbox draining, and on
//! `idempotency/repository.rs`'s status-ledger idiom generalized from
//! "has this request already run" to "has this email already been sent".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Attempts are abandoned (left `failed`) after this many tries.
pub const MAX_ATTEMPTS: i32 = 3;
/// Delay before a failed send is retried.
pub const RETRY_DELAY_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    OrderConfirmation,
    RefundNotification,
    PasswordReset,
    EmailVerification,
}

impl EmailType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::OrderConfirmation => "order_confirmation",
            Self::RefundNotification => "refund_notification",
            Self::PasswordReset => "password_reset",
            Self::EmailVerification => "email_verification",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email provider error: {0}")]
    Provider(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EmailQueueError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Narrow trait behind which the concrete email provider lives. Neither the
/// queue nor callers ever see a transport, only this interface.
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_order_confirmation(
        &self,
        to_email: &str,
        order_id: Uuid,
        total_minor_units: i64,
    ) -> Result<(), EmailError>;

    async fn send_refund_notification(
        &self,
        to_email: &str,
        order_id: Uuid,
        refund_minor_units: i64,
    ) -> Result<(), EmailError>;

    async fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<(), EmailError>;

    async fn send_email_verification(&self, to_email: &str, verification_url: &str) -> Result<(), EmailError>;
}

/// Test/dev double. Logs what would have been sent instead of calling a
/// provider.
pub struct MockEmailService;

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_order_confirmation(
        &self,
        to_email: &str,
        order_id: Uuid,
        total_minor_units: i64,
    ) -> Result<(), EmailError> {
        tracing::info!(%to_email, %order_id, total_minor_units, "order confirmation email sent");
        Ok(())
    }

    async fn send_refund_notification(
        &self,
        to_email: &str,
        order_id: Uuid,
        refund_minor_units: i64,
    ) -> Result<(), EmailError> {
        tracing::info!(%to_email, %order_id, refund_minor_units, "refund notification email sent");
        Ok(())
    }

    async fn send_password_reset(&self, to_email: &str, reset_url: &str) -> Result<(), EmailError> {
        tracing::info!(%to_email, %reset_url, "password reset email sent");
        Ok(())
    }

    async fn send_email_verification(&self, to_email: &str, verification_url: &str) -> Result<(), EmailError> {
        tracing::info!(%to_email, %verification_url, "email verification email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct DueAttempt {
    id: Uuid,
    email_type: String,
    recipient_email: String,
    payload: serde_json::Value,
    attempts: i32,
}

/// Payload shapes stored per email type. Kept untagged-by-field since each
/// `EmailType` only ever round-trips through its own `enqueue_*` method.
#[derive(Debug, Serialize, Deserialize)]
struct OrderConfirmationPayload {
    order_id: Uuid,
    total_minor_units: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefundNotificationPayload {
    order_id: Uuid,
    refund_minor_units: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PasswordResetPayload {
    reset_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmailVerificationPayload {
    verification_url: String,
}

/// Durable outbox in front of `EmailService`. Enqueue is idempotent per
/// `(dedupe_key, email_type)`; `tick` drains due rows with bounded retry.
#[derive(Clone)]
pub struct EmailQueue {
    pool: PgPool,
    service: std::sync::Arc<dyn EmailService>,
}

impl EmailQueue {
    pub fn new(pool: PgPool, service: std::sync::Arc<dyn EmailService>) -> Self {
        Self { pool, service }
    }

    async fn enqueue(
        &self,
        dedupe_key: &str,
        email_type: EmailType,
        recipient_email: &str,
        payload: serde_json::Value,
    ) -> Result<(), EmailQueueError> {
        sqlx::query(
            r#"
            INSERT INTO email_send_attempts
                (id, dedupe_key, email_type, recipient_email, payload, status, attempts, max_attempts, next_attempt_at, created_at)
            VALUES
                ($1, $2, $3, $4, $5, 'pending', 0, $6, NOW(), NOW())
            ON CONFLICT (dedupe_key, email_type) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(dedupe_key)
        .bind(email_type.as_str())
        .bind(recipient_email)
        .bind(payload)
        .bind(MAX_ATTEMPTS)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn enqueue_order_confirmation(
        &self,
        order_id: Uuid,
        recipient_email: &str,
        total_minor_units: i64,
    ) -> Result<(), EmailQueueError> {
        let payload = serde_json::to_value(OrderConfirmationPayload {
            order_id,
            total_minor_units,
        })?;
        self.enqueue(
            &order_id.to_string(),
            EmailType::OrderConfirmation,
            recipient_email,
            payload,
        )
        .await
    }

    pub async fn enqueue_refund_notification(
        &self,
        order_id: Uuid,
        recipient_email: &str,
        refund_minor_units: i64,
    ) -> Result<(), EmailQueueError> {
        let payload = serde_json::to_value(RefundNotificationPayload {
            order_id,
            refund_minor_units,
        })?;
        self.enqueue(
            &order_id.to_string(),
            EmailType::RefundNotification,
            recipient_email,
            payload,
        )
        .await
    }

    pub async fn enqueue_password_reset(
        &self,
        dedupe_key: &str,
        recipient_email: &str,
        reset_url: String,
    ) -> Result<(), EmailQueueError> {
        let payload = serde_json::to_value(PasswordResetPayload { reset_url })?;
        self.enqueue(dedupe_key, EmailType::PasswordReset, recipient_email, payload)
            .await
    }

    pub async fn enqueue_email_verification(
        &self,
        dedupe_key: &str,
        recipient_email: &str,
        verification_url: String,
    ) -> Result<(), EmailQueueError> {
        let payload = serde_json::to_value(EmailVerificationPayload { verification_url })?;
        self.enqueue(dedupe_key, EmailType::EmailVerification, recipient_email, payload)
            .await
    }

    /// Drain every row due for (re)send. Always acknowledges each row —
    /// there is no host-platform redelivery to lean on, so failure handling
    /// lives entirely in this ledger (SPEC_FULL §4.6).
    pub async fn tick(&self) -> Result<usize, EmailQueueError> {
        let due: Vec<DueAttempt> = sqlx::query_as(
            r#"
            SELECT id, email_type, recipient_email, payload, attempts
            FROM email_send_attempts
            WHERE status = 'pending' AND next_attempt_at <= NOW()
            ORDER BY next_attempt_at
            LIMIT 100
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut processed = 0;
        for attempt in due {
            self.process_attempt(attempt).await?;
            processed += 1;
        }

        Ok(processed)
    }

    async fn process_attempt(&self, attempt: DueAttempt) -> Result<(), EmailQueueError> {
        let result = self.dispatch(&attempt).await;

        match result {
            Ok(()) => {
                sqlx::query("UPDATE email_send_attempts SET status = 'sent', sent_at = NOW() WHERE id = $1")
                    .bind(attempt.id)
                    .execute(&self.pool)
                    .await?;
            }
            Err(err) => {
                let attempts = attempt.attempts + 1;
                if attempts >= MAX_ATTEMPTS {
                    sqlx::query(
                        "UPDATE email_send_attempts SET status = 'failed', attempts = $2, last_error = $3 WHERE id = $1",
                    )
                    .bind(attempt.id)
                    .bind(attempts)
                    .bind(err.to_string())
                    .execute(&self.pool)
                    .await?;
                } else {
                    sqlx::query(
                        r#"
                        UPDATE email_send_attempts
                        SET attempts = $2,
                            last_error = $3,
                            next_attempt_at = NOW() + ($4 || ' minutes')::interval
                        WHERE id = $1
                        "#,
                    )
                    .bind(attempt.id)
                    .bind(attempts)
                    .bind(err.to_string())
                    .bind(RETRY_DELAY_MINUTES.to_string())
                    .execute(&self.pool)
                    .await?;
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, attempt: &DueAttempt) -> Result<(), EmailError> {
        match attempt.email_type.as_str() {
            "order_confirmation" => {
                let payload: OrderConfirmationPayload = serde_json::from_value(attempt.payload.clone())
                    .map_err(|e| EmailError::Provider(e.to_string()))?;
                self.service
                    .send_order_confirmation(&attempt.recipient_email, payload.order_id, payload.total_minor_units)
                    .await
            }
            "refund_notification" => {
                let payload: RefundNotificationPayload = serde_json::from_value(attempt.payload.clone())
                    .map_err(|e| EmailError::Provider(e.to_string()))?;
                self.service
                    .send_refund_notification(&attempt.recipient_email, payload.order_id, payload.refund_minor_units)
                    .await
            }
            "password_reset" => {
                let payload: PasswordResetPayload = serde_json::from_value(attempt.payload.clone())
                    .map_err(|e| EmailError::Provider(e.to_string()))?;
                self.service
                    .send_password_reset(&attempt.recipient_email, &payload.reset_url)
                    .await
            }
            "email_verification" => {
                let payload: EmailVerificationPayload = serde_json::from_value(attempt.payload.clone())
                    .map_err(|e| EmailError::Provider(e.to_string()))?;
                self.service
                    .send_email_verification(&attempt.recipient_email, &payload.verification_url)
                    .await
            }
            other => Err(EmailError::Provider(format!("unknown email type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_type_as_str_round_trips_dispatch_match() {
        assert_eq!(EmailType::OrderConfirmation.as_str(), "order_confirmation");
        assert_eq!(EmailType::RefundNotification.as_str(), "refund_notification");
        assert_eq!(EmailType::PasswordReset.as_str(), "password_reset");
        assert_eq!(EmailType::EmailVerification.as_str(), "email_verification");
    }

    #[tokio::test]
    async fn test_mock_email_service_accepts_sends() {
        let service = MockEmailService;
        assert!(service
            .send_order_confirmation("jane@example.com", Uuid::new_v4(), 1000)
            .await
            .is_ok());
        assert!(service
            .send_password_reset("jane@example.com", "https://example.com/reset?token=abc")
            .await
            .is_ok());
    }
}
