//! Refresh Use Case
//!
//! Exchanges a valid refresh token for a new access token. The refresh
//! token itself is not rotated: its 30-day lifetime is the hard bound
//! on a session, after which a full re-login is required.
//!
//! Any failure (missing cookie, expired or forged token, vanished or
//! deactivated identity) collapses into the opaque failure, which the
//! client treats as "log in again".

use std::sync::Arc;

use crate::domain::repository::IdentityRepository;
use crate::domain::value_object::identity_id::IdentityId;
use crate::error::{AuthError, AuthResult};
use crate::token::TokenIssuer;

/// Refresh use case
pub struct RefreshUseCase<R>
where
    R: IdentityRepository,
{
    repo: Arc<R>,
    issuer: Arc<TokenIssuer>,
}

impl<R> RefreshUseCase<R>
where
    R: IdentityRepository + Sync,
{
    pub fn new(repo: Arc<R>, issuer: Arc<TokenIssuer>) -> Self {
        Self { repo, issuer }
    }

    /// Returns a new access token. `refresh_token` is the raw cookie
    /// value, if the request carried one.
    pub async fn execute(&self, refresh_token: Option<&str>) -> AuthResult<String> {
        let token = refresh_token.ok_or_else(AuthError::authentication_failed)?;
        let claims = self.issuer.verify_refresh(token)?;

        // Re-check the live record: deactivation and role changes must
        // take effect at the next refresh, not at the next login
        let identity_id = IdentityId::from_uuid(claims.sub);
        let identity = self
            .repo
            .find_by_id(&identity_id)
            .await?
            .ok_or_else(AuthError::authentication_failed)?;

        if !identity.can_authenticate() {
            return Err(AuthError::authentication_failed());
        }

        tracing::debug!(identity_id = %identity.identity_id, "Access token refreshed");

        self.issuer
            .issue_access(&identity.identity_id, &identity.email, identity.role)
            .map_err(|e| AuthError::Internal(format!("Token issuance failed: {e}")))
    }
}
