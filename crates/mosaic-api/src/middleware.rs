use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use mosaic_types::api::Claims;

/// Extract and validate JWT from Authorization header.
/// Missing or invalid tokens fail the request before the handler runs.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let claims = claims_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Same extraction, but absence of a token is not an error — handlers see
/// `MaybeClaims` and degrade (no is_liked / is_following).
pub async fn optional_auth(mut req: Request, next: Next) -> Response {
    if let Some(claims) = claims_from_headers(req.headers()) {
        req.extensions_mut().insert(claims);
    }
    next.run(req).await
}

/// Claims when a valid token accompanied the request, for routes layered
/// with `optional_auth`. Extraction never fails; absence reads as `None`.
#[derive(Debug, Clone)]
pub struct MaybeClaims(pub Option<Claims>);

impl<S> FromRequestParts<S> for MaybeClaims
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Claims>().cloned()))
    }
}

fn claims_from_headers(headers: &HeaderMap) -> Option<Claims> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;

    let secret =
        std::env::var("MOSAIC_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}
