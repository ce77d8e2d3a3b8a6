//! HTTP Handlers

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::Extension;
use std::net::SocketAddr;
use std::sync::Arc;

use kernel::error::app_error::AppResult;
use platform::client::RequestOrigin;
use platform::password::PasswordHasher;
use platform::rate_limit::{InMemoryRateLimitStore, RateLimiter};

use crate::application::config::AuthConfig;
use crate::application::{
    RefreshUseCase, SignInInput, SignInUseCase, SignOutUseCase, VerifyTotpInput, VerifyTotpUseCase,
};
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::error::AuthResult;
use crate::presentation::dto::{
    LoginRequest, LoginResponse, MeResponse, RefreshResponse, VerifyRequest, VerifyResponse,
};
use crate::presentation::middleware::bearer_token;
use crate::token::{TokenClaims, TokenIssuer};

/// Shared state for auth handlers
pub struct AuthAppState<R, A>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub audit: Arc<A>,
    pub config: Arc<AuthConfig>,
    pub issuer: Arc<TokenIssuer>,
    pub hasher: Arc<PasswordHasher>,
    pub limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
}

impl<R, A> AuthAppState<R, A>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    pub fn new(repo: R, audit: A, config: AuthConfig) -> AppResult<Self> {
        let issuer = Arc::new(config.token_issuer());
        let hasher = Arc::new(config.password_hasher()?);
        let limiter = Arc::new(RateLimiter::new(
            InMemoryRateLimitStore::new(),
            config.rate_limits.clone(),
        ));

        Ok(Self {
            repo: Arc::new(repo),
            audit: Arc::new(audit),
            config: Arc::new(config),
            issuer,
            hasher,
            limiter,
        })
    }
}

impl<R, A> Clone for AuthAppState<R, A>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            audit: Arc::clone(&self.audit),
            config: Arc::clone(&self.config),
            issuer: Arc::clone(&self.issuer),
            hasher: Arc::clone(&self.hasher),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

// ============================================================================
// Login (password step)
// ============================================================================

/// POST /api/auth/login
pub async fn login<R, A>(
    State(state): State<AuthAppState<R, A>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<LoginResponse>>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let origin = RequestOrigin::from_request(&headers, Some(addr.ip()));

    let use_case = SignInUseCase::new(
        state.repo.clone(),
        state.audit.clone(),
        state.limiter.clone(),
        state.hasher.clone(),
    );

    let input = SignInInput {
        email: req.email,
        password: req.password,
    };

    let output = use_case.execute(input, origin).await?;
    Ok(Json(output.into()))
}

// ============================================================================
// Verify (TOTP step)
// ============================================================================

/// POST /api/auth/verify
pub async fn verify<R, A>(
    State(state): State<AuthAppState<R, A>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(req): Json<VerifyRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let origin = RequestOrigin::from_request(&headers, Some(addr.ip()));

    let use_case = VerifyTotpUseCase::new(
        state.repo.clone(),
        state.audit.clone(),
        state.limiter.clone(),
        state.issuer.clone(),
        state.config.clone(),
    );

    let input = VerifyTotpInput {
        email: req.email,
        code: req.code,
    };

    let output = use_case.execute(input, origin).await?;

    // Refresh token travels only in the HTTP-only cookie; the body
    // carries the access token and public identity fields
    let cookie = platform::cookie::set_cookie_header(
        &state.config.refresh_cookie(),
        &output.tokens.refresh,
    );

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(VerifyResponse::from_output(&output)),
    ))
}

// ============================================================================
// Refresh
// ============================================================================

/// POST /api/auth/refresh
pub async fn refresh<R, A>(
    State(state): State<AuthAppState<R, A>>,
    headers: HeaderMap,
) -> AuthResult<Json<RefreshResponse>>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let cookie_config = state.config.refresh_cookie();
    let token = platform::cookie::extract_cookie(&headers, &cookie_config.name);

    let use_case = RefreshUseCase::new(state.repo.clone(), state.issuer.clone());
    let access_token = use_case.execute(token.as_deref()).await?;

    Ok(Json(RefreshResponse { access_token }))
}

// ============================================================================
// Logout
// ============================================================================

/// POST /api/auth/logout
pub async fn logout<R, A>(
    State(state): State<AuthAppState<R, A>>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> AuthResult<impl IntoResponse>
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    let origin = RequestOrigin::from_request(&headers, Some(addr.ip()));

    // Best-effort actor attribution; an anonymous logout still clears
    // the cookie and gets audited
    let actor = bearer_token(&headers)
        .and_then(|token| state.issuer.verify_access(token).ok())
        .map(|claims| claims.sub);

    SignOutUseCase::new(state.audit.clone()).execute(actor, &origin);

    let cookie = state.config.refresh_cookie().build_delete_cookie();
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

// ============================================================================
// Me (protected; exercised through the middleware stack)
// ============================================================================

/// GET /api/auth/me
pub async fn me(Extension(claims): Extension<TokenClaims>) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}
