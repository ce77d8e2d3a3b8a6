//! Route Middleware
//!
//! `require_access_token` turns a Bearer header into verified claims in
//! the request extensions; `api_rate_limit` applies the general API
//! budget per origin. Both reject before the handler runs.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

use platform::rate_limit::{OperationClass, RateLimitKey};

use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Extract the token from an `Authorization: Bearer ...` header
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Reject requests without a valid access token; stores the verified
/// claims in request extensions for the handler.
pub async fn require_access_token<R, A>(
    State(state): State<AuthAppState<R, A>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let token =
        bearer_token(request.headers()).ok_or_else(AuthError::authentication_failed)?;
    let claims = state.issuer.verify_access(token)?;

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Per-origin budget for the general API class; every request counts
pub async fn api_rate_limit<R, A>(
    State(state): State<AuthAppState<R, A>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let key = RateLimitKey::origin(ip);
    state
        .limiter
        .hit(OperationClass::Api, &key)
        .await
        .map_err(|retry_after| AuthError::RateLimited { retry_after })?;

    Ok(next.run(request).await)
}
