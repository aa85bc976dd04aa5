use crate::error::AppError;
use axum::{
    body::Body,
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Shared admin credential, injected as a request extension.
#[derive(Clone)]
pub struct AdminToken(Arc<str>);

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self(Arc::from(token))
    }

    /// Constant-time comparison against a presented token.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

/// Extract Bearer token from Authorization header.
fn extract_bearer(req: &Request<Body>) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Middleware: admin routes require `Authorization: Bearer <admin.token>`.
pub async fn require_admin(request: Request<Body>, next: Next) -> Result<Response, Response> {
    let expected = request
        .extensions()
        .get::<AdminToken>()
        .cloned()
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "admin token not configured",
            )
                .into_response()
        })?;

    let authorized = extract_bearer(&request).is_some_and(|presented| expected.matches(presented));
    if !authorized {
        tracing::warn!(path = %request.uri().path(), "rejected admin request");
        return Err(AppError::Auth("invalid or missing admin token".to_string()).into_response());
    }

    Ok(next.run(request).await)
}
