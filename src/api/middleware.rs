//! API Middleware
//!
//! Bearer-token authentication and request logging (SPEC_FULL §4.2, §6.1).

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::aggregate::UserRole;
use crate::domain::{ActorRole, OperationContext};
use crate::token::TokenService;

fn unauthorized(code: &str, message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"code": code, "message": message}})),
    )
        .into_response()
}

/// Validate the bearer access token and install an `OperationContext` carrying
/// the authenticated actor's id/role into request extensions. Routes that
/// accept anonymous traffic don't have this layered onto them at all — see
/// `routes::create_router`'s split between public and authenticated sub-routers.
pub async fn auth_middleware(
    State(token_service): State<TokenService>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = match headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return Err(unauthorized("INVALID_TOKEN", "missing or malformed bearer token")),
    };

    let claims = match token_service.verify_access_token(token) {
        Ok(claims) => claims,
        Err(_) => return Err(unauthorized("INVALID_TOKEN", "missing or malformed bearer token")),
    };

    let actor_role = match claims.role {
        UserRole::Customer => ActorRole::Customer,
        UserRole::Admin => ActorRole::Admin,
    };

    let correlation_id = headers
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let context = OperationContext::new()
        .with_actor(claims.user_id, actor_role)
        .with_correlation_id(correlation_id);

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Rejects a request whose `OperationContext` doesn't carry the admin role.
/// Must run after `auth_middleware` on the same stack.
pub async fn require_admin_middleware(request: Request<Body>, next: Next) -> Result<Response, Response> {
    let is_admin = request
        .extensions()
        .get::<OperationContext>()
        .map(|ctx| ctx.is_admin())
        .unwrap_or(false);

    if !is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": "FORBIDDEN", "message": "admin role required"}})),
        )
            .into_response());
    }

    Ok(next.run(request).await)
}

/// Headers that should be masked in logs.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging.
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request/response logging middleware. Layered outermost so it covers
/// public routes too, which never pass through `auth_middleware` — so the
/// correlation id is read straight off the header rather than off
/// `OperationContext`, which wouldn't exist yet at this point in the stack.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .headers()
        .get("X-Correlation-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok());

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "incoming request"
    );

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        correlation_id = ?correlation_id,
        "request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_headers_for_logging() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("authorization", "Bearer secret-token".parse().unwrap());

        let masked = mask_headers_for_logging(&headers);

        let auth = masked.iter().find(|(k, _)| k == "authorization");
        let content_type = masked.iter().find(|(k, _)| k == "content-type");

        assert_eq!(auth.unwrap().1, "[REDACTED]");
        assert_eq!(content_type.unwrap().1, "application/json");
    }

    #[test]
    fn test_sensitive_headers_list() {
        assert!(SENSITIVE_HEADERS.contains(&"authorization"));
        assert!(!SENSITIVE_HEADERS.contains(&"content-type"));
    }
}
