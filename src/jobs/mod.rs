//! Scheduled Jobs
//!
//! Background jobs for periodic maintenance tasks (SPEC_FULL §9): sweeping
//! expired/used tokens out of their tables, reaping idle cart actors, and
//! draining the email retry queue.

use std::time::Duration;

use sqlx::PgPool;
use tokio::time::interval;

use crate::cart::{CartRegistry, CART_IDLE_TTL};
use crate::email::EmailQueue;

/// Token rows are kept around for this long past expiry/use before being
/// swept, to leave a little slack for any concurrent in-flight request.
const TOKEN_RETENTION: &str = "1 hour";

/// Delete refresh token rows that have expired or were revoked, past the
/// retention window.
pub async fn cleanup_refresh_tokens(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(&format!(
        "DELETE FROM refresh_tokens WHERE expires_at < NOW() - INTERVAL '{TOKEN_RETENTION}' \
         OR (revoked_at IS NOT NULL AND revoked_at < NOW() - INTERVAL '{TOKEN_RETENTION}')"
    ))
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();
    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "cleaned up expired/revoked refresh tokens");
    }
    Ok(rows_deleted)
}

/// Delete password-reset token rows that have expired or been consumed,
/// past the retention window.
pub async fn cleanup_password_reset_tokens(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(&format!(
        "DELETE FROM password_reset_tokens WHERE expires_at < NOW() - INTERVAL '{TOKEN_RETENTION}' \
         OR (used_at IS NOT NULL AND used_at < NOW() - INTERVAL '{TOKEN_RETENTION}')"
    ))
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();
    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "cleaned up expired/used password reset tokens");
    }
    Ok(rows_deleted)
}

/// Delete email-verification token rows that have expired or been
/// consumed, past the retention window.
pub async fn cleanup_email_verification_tokens(pool: &PgPool) -> Result<u64, JobError> {
    let result = sqlx::query(&format!(
        "DELETE FROM email_verification_tokens WHERE expires_at < NOW() - INTERVAL '{TOKEN_RETENTION}' \
         OR (used_at IS NOT NULL AND used_at < NOW() - INTERVAL '{TOKEN_RETENTION}')"
    ))
    .execute(pool)
    .await?;

    let rows_deleted = result.rows_affected();
    if rows_deleted > 0 {
        tracing::info!(rows_deleted, "cleaned up expired/used email verification tokens");
    }
    Ok(rows_deleted)
}

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for token table cleanup (default: 10 minutes).
    pub token_cleanup_interval: Duration,
    /// Interval for idle cart actor reaping (default: 5 minutes).
    pub cart_reap_interval: Duration,
    /// Interval for draining the email retry queue (default: 30 seconds).
    pub email_tick_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            token_cleanup_interval: Duration::from_secs(10 * 60),
            cart_reap_interval: Duration::from_secs(5 * 60),
            email_tick_interval: Duration::from_secs(30),
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    cart_registry: CartRegistry,
    email_queue: EmailQueue,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    /// Create a new job scheduler
    pub fn new(pool: PgPool, cart_registry: CartRegistry, email_queue: EmailQueue) -> Self {
        Self {
            pool,
            cart_registry,
            email_queue,
            config: JobSchedulerConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(
        pool: PgPool,
        cart_registry: CartRegistry,
        email_queue: EmailQueue,
        config: JobSchedulerConfig,
    ) -> Self {
        Self {
            pool,
            cart_registry,
            email_queue,
            config,
        }
    }

    /// Start the job scheduler in the background
    /// Returns a handle that can be used to abort the scheduler
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the scheduler loop
    async fn run(&self) {
        tracing::info!("job scheduler started");

        let mut token_interval = interval(self.config.token_cleanup_interval);
        let mut cart_interval = interval(self.config.cart_reap_interval);
        let mut email_interval = interval(self.config.email_tick_interval);

        loop {
            tokio::select! {
                _ = token_interval.tick() => {
                    if let Err(e) = cleanup_refresh_tokens(&self.pool).await {
                        tracing::error!(error = %e, "refresh token cleanup failed");
                    }
                    if let Err(e) = cleanup_password_reset_tokens(&self.pool).await {
                        tracing::error!(error = %e, "password reset token cleanup failed");
                    }
                    if let Err(e) = cleanup_email_verification_tokens(&self.pool).await {
                        tracing::error!(error = %e, "email verification token cleanup failed");
                    }
                }
                _ = cart_interval.tick() => {
                    self.cart_registry.reap_idle(CART_IDLE_TTL).await;
                }
                _ = email_interval.tick() => {
                    if let Err(e) = self.email_queue.tick().await {
                        tracing::error!(error = %e, "email queue tick failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match cleanup_refresh_tokens(&self.pool).await {
            Ok(count) => report.refresh_tokens_cleaned = count,
            Err(e) => report.errors.push(format!("refresh token cleanup: {e}")),
        }

        match cleanup_password_reset_tokens(&self.pool).await {
            Ok(count) => report.password_reset_tokens_cleaned = count,
            Err(e) => report.errors.push(format!("password reset token cleanup: {e}")),
        }

        match cleanup_email_verification_tokens(&self.pool).await {
            Ok(count) => report.email_verification_tokens_cleaned = count,
            Err(e) => report.errors.push(format!("email verification token cleanup: {e}")),
        }

        self.cart_registry.reap_idle(CART_IDLE_TTL).await;

        match self.email_queue.tick().await {
            Ok(count) => report.emails_processed = count as u64,
            Err(e) => report.errors.push(format!("email queue tick: {e}")),
        }

        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub refresh_tokens_cleaned: u64,
    pub password_reset_tokens_cleaned: u64,
    pub email_verification_tokens_cleaned: u64,
    pub emails_processed: u64,
    pub errors: Vec<String>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_scheduler_config_default() {
        let config = JobSchedulerConfig::default();
        assert_eq!(config.token_cleanup_interval, Duration::from_secs(600));
        assert_eq!(config.cart_reap_interval, Duration::from_secs(300));
        assert_eq!(config.email_tick_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_maintenance_report_default() {
        let report = MaintenanceReport::default();
        assert_eq!(report.refresh_tokens_cleaned, 0);
        assert_eq!(report.errors.len(), 0);
    }
}
