//! Auth Router

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use kernel::error::app_error::AppResult;
use sqlx::PgPool;

use crate::application::config::AuthConfig;
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::infra::postgres::{PgAuditSink, PgIdentityRepository};
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{api_rate_limit, require_access_token};

/// Create the auth router backed by PostgreSQL
pub fn auth_router(pool: PgPool, config: AuthConfig) -> AppResult<Router> {
    let state = AuthAppState::new(
        PgIdentityRepository::new(pool.clone()),
        PgAuditSink::new(pool),
        config,
    )?;
    Ok(auth_router_generic(state))
}

/// Create the auth router for any repository/sink implementation
pub fn auth_router_generic<R, A>(state: AuthAppState<R, A>) -> Router
where
    R: IdentityRepository + Send + Sync + 'static,
    A: AuditSink + Send + Sync + 'static,
{
    // Rate limit runs before token verification on protected routes
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(from_fn_with_state(
            state.clone(),
            require_access_token::<R, A>,
        ))
        .route_layer(from_fn_with_state(state.clone(), api_rate_limit::<R, A>));

    Router::new()
        .route("/login", post(handlers::login::<R, A>))
        .route("/verify", post(handlers::verify::<R, A>))
        .route("/refresh", post(handlers::refresh::<R, A>))
        .route("/logout", post(handlers::logout::<R, A>))
        .merge(protected)
        .with_state(state)
}
