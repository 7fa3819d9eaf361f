//! Token / Session Store
//!
//! Refresh-token lifecycle plus single-use verification/reset token issuance
//! (SPEC_FULL §4.3.6, §4.3.7). Access-token signing/verification is treated
//! as an opaque primitive per SPEC_FULL §1 — this module implements a
//! minimal HMAC-SHA256 compact token as the concrete stand-in, the same way
//! the teacher hashes API keys with `sha2` rather than reaching for a
//! dedicated crypto crate.
//!
//! Refresh/reset/verification tokens themselves are opaque random strings
//! (grounded on `idempotency/repository.rs`'s request-hash/status-ledger
//! idiom, generalized from "has this exact request already run" to "has
//! this token already been consumed"), never JWTs — only the access token
//! is a signed, stateless credential.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::aggregate::UserRole;

/// Access tokens: 1 hour TTL (SPEC_FULL §5).
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
/// Refresh tokens: 30 day TTL.
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;
/// Password-reset tokens: 1 hour TTL.
pub const PASSWORD_RESET_TTL_HOURS: i64 = 1;
/// Email-verification tokens: 24 hour TTL.
pub const EMAIL_VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token is malformed or the signature does not match")]
    Invalid,
    #[error("token not found")]
    NotFound,
    #[error("token has already been used")]
    AlreadyUsed,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Claims carried by a signed access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub role: UserRole,
    pub expires_at: DateTime<Utc>,
}

/// Generate an opaque, URL-safe random token.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Refresh/reset/verification tokens and signed access tokens, backed by the
/// relational store per SPEC_FULL §3.5 / §6.3.
#[derive(Clone)]
pub struct TokenService {
    pool: PgPool,
    jwt_secret: String,
}

impl TokenService {
    pub fn new(pool: PgPool, jwt_secret: String) -> Self {
        Self { pool, jwt_secret }
    }

    // -----------------------------------------------------------------
    // Access tokens (stateless, signed, never persisted)
    // -----------------------------------------------------------------

    /// Issue a signed access token for the given user, valid for one hour.
    pub fn issue_access_token(&self, user_id: Uuid, role: UserRole) -> String {
        let claims = AccessClaims {
            user_id,
            role,
            expires_at: Utc::now() + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        };
        let payload = serde_json::to_string(&claims).expect("claims always serialize");
        let payload_hex = hex::encode(payload.as_bytes());
        let signature = self.sign(&payload_hex);
        format!("{payload_hex}.{signature}")
    }

    /// Verify a signed access token, rejecting bad signatures and expiry.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let (payload_hex, signature) = token.split_once('.').ok_or(TokenError::Invalid)?;

        let expected = self.sign(payload_hex);
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(TokenError::Invalid);
        }

        let payload_bytes = hex::decode(payload_hex).map_err(|_| TokenError::Invalid)?;
        let claims: AccessClaims =
            serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Invalid)?;

        if claims.expires_at < Utc::now() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    fn sign(&self, payload_hex: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.jwt_secret.as_bytes());
        hasher.update(b":");
        hasher.update(payload_hex.as_bytes());
        hex::encode(hasher.finalize())
    }

    // -----------------------------------------------------------------
    // Refresh tokens
    // -----------------------------------------------------------------

    pub async fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        let token = random_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Verify a refresh token is live (not expired, not revoked) and return
    /// the user it belongs to.
    pub async fn verify_refresh_token(&self, token: &str) -> Result<Uuid, TokenError> {
        let token_hash = hash_token(token);

        let row: Option<(Uuid, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let (user_id, expires_at, revoked_at) = row.ok_or(TokenError::NotFound)?;

        if revoked_at.is_some() {
            return Err(TokenError::Invalid);
        }
        if expires_at < Utc::now() {
            return Err(TokenError::Expired);
        }

        Ok(user_id)
    }

    pub async fn revoke_refresh_token(&self, token: &str) -> Result<(), TokenError> {
        let token_hash = hash_token(token);
        sqlx::query("UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Invalidate every refresh token for a user. Called on password reset
    /// (SPEC_FULL §4.3.7).
    pub async fn revoke_all_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<(), TokenError> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Password reset tokens (single-use)
    // -----------------------------------------------------------------

    pub async fn issue_password_reset_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        let token = random_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::hours(PASSWORD_RESET_TTL_HOURS);

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token_hash, expires_at, used_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Consume a password-reset token: returns the owning user id and marks
    /// the row used. Expired rows raise `Expired`; used or missing rows
    /// raise `AlreadyUsed`/`NotFound` (SPEC_FULL §4.3.7).
    pub async fn consume_password_reset_token(&self, token: &str) -> Result<Uuid, TokenError> {
        let token_hash = hash_token(token);

        let row: Option<(Uuid, Uuid, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT id, user_id, expires_at, used_at FROM password_reset_tokens WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let (id, user_id, expires_at, used_at) = row.ok_or(TokenError::NotFound)?;

        if used_at.is_some() {
            return Err(TokenError::AlreadyUsed);
        }
        if expires_at < Utc::now() {
            return Err(TokenError::Expired);
        }

        sqlx::query("UPDATE password_reset_tokens SET used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(user_id)
    }

    // -----------------------------------------------------------------
    // Email verification tokens (single-use)
    // -----------------------------------------------------------------

    pub async fn issue_email_verification_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        let token = random_token();
        let token_hash = hash_token(&token);
        let expires_at = Utc::now() + Duration::hours(EMAIL_VERIFICATION_TTL_HOURS);

        sqlx::query(
            r#"
            INSERT INTO email_verification_tokens (id, user_id, token_hash, expires_at, used_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(token)
    }

    /// Look up (without consuming) the owning user of an email verification
    /// token. Used so the caller can apply the `EmailVerified` projection
    /// *before* marking the token consumed (SPEC_FULL §4.3.7 crash-safety
    /// note): a crash between the two leaves a retryable, not a lost, state.
    pub async fn peek_email_verification_token(&self, token: &str) -> Result<Uuid, TokenError> {
        let token_hash = hash_token(token);

        let row: Option<(Uuid, DateTime<Utc>, Option<DateTime<Utc>>)> = sqlx::query_as(
            "SELECT user_id, expires_at, used_at FROM email_verification_tokens WHERE token_hash = $1",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let (user_id, expires_at, used_at) = row.ok_or(TokenError::NotFound)?;

        if used_at.is_some() {
            return Err(TokenError::AlreadyUsed);
        }
        if expires_at < Utc::now() {
            return Err(TokenError::Expired);
        }

        Ok(user_id)
    }

    pub async fn mark_email_verification_token_used(&self, token: &str) -> Result<(), TokenError> {
        let token_hash = hash_token(token);
        sqlx::query("UPDATE email_verification_tokens SET used_at = NOW() WHERE token_hash = $1")
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
    }

    #[test]
    fn test_random_token_is_unique_and_hex() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert!(hex::decode(&a).is_ok());
    }
}
