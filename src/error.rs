//! Error handling module
//!
//! Centralized application error type and its HTTP boundary mapping. Typed
//! failures flow up unmodified from domain/event-store/projection layers;
//! this is the single place they get translated into the wire envelope
//! `{"error": {"code", "message", "fields"}}` (SPEC_FULL §6.2, §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DomainError;
use crate::email::EmailQueueError;
use crate::event_store::EventStoreError;
use crate::projection::ProjectionError;
use crate::token::TokenError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types. Each variant carries enough to reproduce the
/// taxonomy table in SPEC_FULL §7; variants not already covered by
/// `DomainError` stay infrastructure-specific here.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("missing or malformed bearer token")]
    Unauthenticated,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl From<EventStoreError> for AppError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::VersionConflict { expected, actual, .. } => {
                AppError::Domain(DomainError::VersionConflict {
                    expected,
                    found: actual,
                })
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ProjectionError> for AppError {
    fn from(err: ProjectionError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::Domain(DomainError::TokenExpired),
            TokenError::Invalid | TokenError::NotFound => AppError::Domain(DomainError::InvalidToken),
            TokenError::AlreadyUsed => AppError::Domain(DomainError::VerificationTokenUsed),
            TokenError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<EmailQueueError> for AppError {
    fn from(err: EmailQueueError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Error response envelope per SPEC_FULL §6.2.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, String) {
        match self {
            AppError::Domain(domain_err) => (status_for_domain_error(domain_err), domain_err.code().to_string()),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN".to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN".to_string()),
            AppError::MissingHeader(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR".to_string()),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR".to_string()),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR".to_string()),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR".to_string()),
        }
    }
}

/// Maps a `DomainError` to the HTTP status bucket from SPEC_FULL §7.
fn status_for_domain_error(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation(_)
        | DomainError::InvalidEmail
        | DomainError::InvalidPassword
        | DomainError::InvalidAddressFields(_)
        | DomainError::CartEmpty
        | DomainError::UnsupportedImageFormat(_)
        | DomainError::ImageLimitExceeded
        | DomainError::AddressBookLimitExceeded
        | DomainError::InvalidAmount(_) => StatusCode::BAD_REQUEST,

        DomainError::InvalidCredentials
        | DomainError::TokenExpired
        | DomainError::InvalidToken
        | DomainError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,

        DomainError::PaymentDeclined => StatusCode::PAYMENT_REQUIRED,

        DomainError::Forbidden(_) | DomainError::Unauthorized(_) => StatusCode::FORBIDDEN,

        DomainError::ProductNotFound(_)
        | DomainError::OrderNotFound(_)
        | DomainError::UserNotFound(_)
        | DomainError::CategoryNotFound(_)
        | DomainError::AddressNotFound(_) => StatusCode::NOT_FOUND,

        DomainError::DuplicateEmail
        | DomainError::VersionConflict { .. }
        | DomainError::WishlistDuplicate
        | DomainError::CategoryHasProducts
        | DomainError::OutOfStock
        | DomainError::InsufficientStock { .. }
        | DomainError::OrderAlreadyCompleted
        | DomainError::OrderAlreadyCancelled
        | DomainError::OrderAlreadyRefunded
        | DomainError::DuplicateOperation { .. } => StatusCode::CONFLICT,

        DomainError::VerificationTokenExpired | DomainError::VerificationTokenUsed => StatusCode::GONE,

        DomainError::OrderNotCancelled
        | DomainError::RefundTransactionNotFound
        | DomainError::InvalidOrderStatusTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,

        DomainError::AccountLocked { .. } => StatusCode::from_u16(423).unwrap(),

        DomainError::PaymentTimeout => StatusCode::GATEWAY_TIMEOUT,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal server error");
        }

        let message = self.to_string();
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message,
                fields: Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}
