//! Auth Error Types
//!
//! This module provides auth-specific error variants that integrate
//! with the unified `kernel::error::AppError` system.
//!
//! The taxonomy is deliberately small:
//! - `Validation` messages are safe to show the caller verbatim.
//! - `AuthenticationFailed` is opaque: unknown identity, deactivated
//!   identity, wrong password and wrong TOTP code all produce the same
//!   wording, so responses cannot be used to enumerate accounts.
//! - `RateLimited` reveals only how long to wait.
//! - Store and internal failures never leak detail to the caller.

use std::time::Duration;

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

use crate::token::TokenError;

/// Auth-specific result type alias
pub type AuthResult<T> = Result<T, AuthError>;

/// Auth-specific error variants
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input failed validation; message is safe to reveal
    #[error("{0}")]
    Validation(String),

    /// Opaque credential failure. Construct only via
    /// [`AuthError::authentication_failed`].
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Request budget exhausted for this origin/identity
    #[error("Too many attempts, retry later")]
    RateLimited { retry_after: Duration },

    /// Identity not found (post-password-step lookups only)
    #[error("Identity not found")]
    NotFound,

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// The single construction point for the opaque credential failure.
    ///
    /// Every failure path that must not be distinguishable from the
    /// outside (unknown identity, inactive identity, wrong password,
    /// wrong TOTP code, bad refresh token) funnels through here.
    pub fn authentication_failed() -> Self {
        AuthError::AuthenticationFailed
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Validation(_) => ErrorKind::UnprocessableEntity,
            AuthError::AuthenticationFailed => ErrorKind::Unauthorized,
            AuthError::RateLimited { .. } => ErrorKind::TooManyRequests,
            AuthError::NotFound => ErrorKind::NotFound,
            AuthError::Database(_) | AuthError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError; internal detail never crosses this boundary
    pub fn to_app_error(&self) -> AppError {
        match self {
            AuthError::Database(_) | AuthError::Internal(_) => {
                AppError::new(self.kind(), "Internal server error")
            }
            _ => AppError::new(self.kind(), self.to_string()),
        }
    }

    /// Log the error with appropriate level
    fn log(&self) {
        match self {
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Auth database error");
            }
            AuthError::Internal(msg) => {
                tracing::error!(message = %msg, "Auth internal error");
            }
            AuthError::AuthenticationFailed => {
                tracing::warn!("Failed authentication attempt");
            }
            AuthError::RateLimited { retry_after } => {
                tracing::warn!(retry_after_secs = retry_after.as_secs(), "Rate limited");
            }
            _ => {
                tracing::debug!(error = %self, "Auth error");
            }
        }
    }

    fn retry_after_secs(&self) -> Option<u64> {
        match self {
            // Round up so "wait 1" never means "already allowed"
            AuthError::RateLimited { retry_after } => {
                Some(retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0))
            }
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        let retry_after = self.retry_after_secs();
        let mut response = self.to_app_error().into_response();

        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<AppError> for AuthError {
    fn from(err: AppError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Bad tokens are a credential failure, not a validation failure:
/// expired and forged tokens must look identical to the caller.
impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        AuthError::authentication_failed()
    }
}
