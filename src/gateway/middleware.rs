//! HTTP middleware for the two admission stages.
//!
//! Install [`authenticate`] outside [`rate_limit`] so that the identity is
//! in the request extensions before the rate check reads it.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::admission::AdmissionGateway;
use super::rejection::Rejection;
use crate::identity::Identity;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Stage A middleware.
///
/// Resolves the caller and stores the [`Identity`] in the request extensions.
pub async fn authenticate(
    State(gateway): State<Arc<AdmissionGateway>>,
    mut request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    // Non UTF-8 bytes can never match a configured key; keep them lossy so
    // the request is rejected as invalid rather than missing.
    let credential = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

    let identity = gateway.authenticate(credential.as_deref())?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Stage B middleware.
pub async fn rate_limit(
    State(gateway): State<Arc<AdmissionGateway>>,
    request: Request,
    next: Next,
) -> Result<Response, Rejection> {
    gateway.check_rate(request.extensions().get::<Identity>())?;
    Ok(next.run(request).await)
}

/// Extractor giving handlers the identity admitted by the gateway.
pub struct CallerIdentity(pub Identity);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CallerIdentity)
            .ok_or((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Missing caller identity (authenticate middleware may not have run)",
            ))
    }
}
