//! Password Reset / Email Verification Handlers
//!
//! Request-reset/reset/verify-email flows (SPEC_FULL §4.3.7), following the
//! same identify → load → decide → append → project skeleton as the other
//! auth handlers. Request-reset deliberately never reveals whether an email
//! is registered — it always reports success, the same non-enumeration
//! posture the teacher's login path takes toward invalid credentials.

use sha2::{Digest, Sha256};

use crate::aggregate::{Aggregate, User};
use crate::domain::DomainError;
use crate::email::EmailQueue;
use crate::error::{AppError, AppResult};
use crate::event_store::EventStore;
use crate::projection::ProjectionService;
use crate::token::TokenService;

use super::{RequestPasswordResetCommand, ResetPasswordCommand, VerifyEmailCommand};

const MIN_PASSWORD_LENGTH: usize = 8;

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"storefront-password:");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct RequestPasswordResetHandler {
    event_store: EventStore,
    projection: ProjectionService,
    token_service: TokenService,
    email_queue: EmailQueue,
    app_base_url: String,
}

impl RequestPasswordResetHandler {
    pub fn new(
        event_store: EventStore,
        projection: ProjectionService,
        token_service: TokenService,
        email_queue: EmailQueue,
        app_base_url: String,
    ) -> Self {
        Self {
            event_store,
            projection,
            token_service,
            email_queue,
            app_base_url,
        }
    }

    /// Always returns `Ok(())`, whether or not the email is registered, to
    /// avoid leaking account existence to an unauthenticated caller.
    pub async fn execute(&self, command: RequestPasswordResetCommand) -> AppResult<()> {
        let Some(row) = self.projection.get_user_by_email(&command.email).await? else {
            return Ok(());
        };

        let user: User = match self.event_store.load_aggregate(row.id).await? {
            Some(user) => user,
            None => return Ok(()),
        };

        let event = user.request_password_reset();
        self.event_store
            .append(row.id, User::aggregate_type(), &[event.clone()], user.version())
            .await?;
        self.projection.apply_user_event(&event).await?;

        let reset_token = self.token_service.issue_password_reset_token(row.id).await?;
        let reset_url = format!("{}/reset-password?token={reset_token}", self.app_base_url);
        self.email_queue
            .enqueue_password_reset(&row.id.to_string(), &command.email, reset_url)
            .await?;

        Ok(())
    }
}

pub struct ResetPasswordHandler {
    event_store: EventStore,
    projection: ProjectionService,
    token_service: TokenService,
}

impl ResetPasswordHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService, token_service: TokenService) -> Self {
        Self {
            event_store,
            projection,
            token_service,
        }
    }

    pub async fn execute(&self, command: ResetPasswordCommand) -> AppResult<()> {
        if command.new_password.len() < MIN_PASSWORD_LENGTH {
            return Err(AppError::Domain(DomainError::InvalidPassword));
        }

        let user_id = self.token_service.consume_password_reset_token(&command.token).await?;

        let user: User = self
            .event_store
            .load_aggregate(user_id)
            .await?
            .ok_or_else(|| AppError::Domain(DomainError::UserNotFound(user_id.to_string())))?;

        let new_hash = hash_password(&command.new_password);
        let event = user.reset_password(new_hash);
        self.event_store
            .append(user_id, User::aggregate_type(), &[event.clone()], user.version())
            .await?;
        self.projection.apply_user_event(&event).await?;

        self.token_service.revoke_all_refresh_tokens_for_user(user_id).await?;

        Ok(())
    }
}

pub struct VerifyEmailHandler {
    event_store: EventStore,
    projection: ProjectionService,
    token_service: TokenService,
}

impl VerifyEmailHandler {
    pub fn new(event_store: EventStore, projection: ProjectionService, token_service: TokenService) -> Self {
        Self {
            event_store,
            projection,
            token_service,
        }
    }

    /// Looks up the owning user without consuming the token, applies the
    /// projection, then marks the token used — in that order, so a crash
    /// between the two steps leaves a retryable rather than a lost state
    /// (SPEC_FULL §4.3.7).
    pub async fn execute(&self, command: VerifyEmailCommand) -> AppResult<()> {
        let user_id = self.token_service.peek_email_verification_token(&command.token).await?;

        let user: User = self
            .event_store
            .load_aggregate(user_id)
            .await?
            .ok_or_else(|| AppError::Domain(DomainError::UserNotFound(user_id.to_string())))?;

        let event = user.verify_email();
        self.event_store
            .append(user_id, User::aggregate_type(), &[event.clone()], user.version())
            .await?;
        self.projection.apply_user_event(&event).await?;

        self.token_service
            .mark_email_verification_token_used(&command.token)
            .await?;

        Ok(())
    }
}
