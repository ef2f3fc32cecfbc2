use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::OrderError;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Compares a presented key with the configured one in constant time. Both are MACed under the
/// configured key so inputs of different lengths compare the same way.
pub fn admin_key_matches(presented: &str, expected: &str) -> bool {
    let tag = |input: &str| {
        HmacSha256::new_from_slice(expected.as_bytes()).map(|mut mac| {
            mac.update(input.as_bytes());
            mac
        })
    };

    match (tag(presented), tag(expected)) {
        (Ok(presented), Ok(expected)) => presented
            .verify_slice(&expected.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

/// Guards the moderation routes. With no admin key configured every request is refused.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, OrderError> {
    let expected = state.admin_api_key.as_deref().ok_or_else(|| {
        tracing::warn!("Admin request refused: ADMIN_API_KEY is not configured");
        OrderError::Unauthenticated
    })?;

    match bearer_token(req.headers()) {
        Some(token) if admin_key_matches(token, expected) => Ok(next.run(req).await),
        _ => Err(OrderError::Unauthenticated),
    }
}

/// The caller's bearer credential, as yet unverified.
#[derive(Debug, Clone)]
pub struct BearerCredential(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerCredential
where
    S: Send + Sync,
{
    type Rejection = OrderError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .map(|token| BearerCredential(token.to_string()))
            .ok_or(OrderError::Unauthenticated)
    }
}
