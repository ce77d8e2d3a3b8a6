//! Verify TOTP Use Case
//!
//! Second authentication step. A correct code completes enrollment on
//! first use (atomic confirmation at the store) and always ends with
//! the access/refresh token pair.

use std::sync::Arc;

use platform::client::RequestOrigin;
use platform::rate_limit::{InMemoryRateLimitStore, OperationClass, RateLimitKey, RateLimiter};
use uuid::Uuid;

use crate::application::config::AuthConfig;
use crate::application::emit_audit;
use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, role::Role, totp_secret::TotpSecret,
};
use crate::error::{AuthError, AuthResult};
use crate::token::{TokenIssuer, TokenPair};

/// Verify TOTP input
pub struct VerifyTotpInput {
    pub email: String,
    pub code: String,
}

/// Successful authentication: tokens plus the public identity fields.
/// Never the hash, never the secret.
#[derive(Debug)]
pub struct VerifyTotpOutput {
    pub tokens: TokenPair,
    pub identity_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

/// Verify TOTP use case
pub struct VerifyTotpUseCase<R, A>
where
    R: IdentityRepository,
    A: AuditSink + Send + Sync + 'static,
{
    repo: Arc<R>,
    audit: Arc<A>,
    limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
    issuer: Arc<TokenIssuer>,
    config: Arc<AuthConfig>,
}

impl<R, A> VerifyTotpUseCase<R, A>
where
    R: IdentityRepository + Sync,
    A: AuditSink + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        audit: Arc<A>,
        limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
        issuer: Arc<TokenIssuer>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            repo,
            audit,
            limiter,
            issuer,
            config,
        }
    }

    pub async fn execute(
        &self,
        input: VerifyTotpInput,
        origin: RequestOrigin,
    ) -> AuthResult<VerifyTotpOutput> {
        let email = Email::new(&input.email)
            .map_err(|e| AuthError::Validation(e.message().to_string()))?;

        let origin_key = RateLimitKey::origin(origin.ip);
        let identity_key = RateLimitKey::origin_identity(origin.ip, email.as_str());
        self.check_budget(&origin_key).await?;
        self.check_budget(&identity_key).await?;

        let code = TotpSecret::normalize_code(&input.code)
            .map_err(|e| AuthError::Validation(e.to_string()))?;

        // This step follows a successful password step, so existence
        // is no longer a secret: a plain NotFound is fine here.
        let identity = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !identity.can_authenticate() {
            return Err(self
                .reject(
                    Some(identity.identity_id),
                    &origin_key,
                    &identity_key,
                    &origin,
                    "inactive identity",
                )
                .await);
        }

        let secret = identity.totp_secret.as_ref().ok_or_else(|| {
            AuthError::Validation("TOTP enrollment has not been started".into())
        })?;

        let code_valid = secret.verify(&code, self.config.totp_skew, identity.email.as_str())?;
        if !code_valid {
            return Err(self
                .reject(
                    Some(identity.identity_id),
                    &origin_key,
                    &identity_key,
                    &origin,
                    "totp code mismatch",
                )
                .await);
        }

        // First successful code completes enrollment; the store flips
        // both flags in one conditional update, so a concurrent
        // confirmation simply loses the race without error
        if !identity.totp_verified {
            let confirmed = self.repo.confirm_totp(&identity.identity_id).await?;
            if confirmed {
                tracing::info!(identity_id = %identity.identity_id, "TOTP enrollment confirmed");
            }
        }

        let tokens = self
            .issuer
            .issue_pair(&identity.identity_id, &identity.email, identity.role)
            .map_err(|e| AuthError::Internal(format!("Token issuance failed: {e}")))?;

        emit_audit(
            &self.audit,
            AuditEvent::login_success(identity.identity_id, &origin),
        );
        tracing::info!(identity_id = %identity.identity_id, "User authenticated");

        Ok(VerifyTotpOutput {
            tokens,
            identity_id: *identity.identity_id.as_uuid(),
            email: identity.email.as_str().to_string(),
            full_name: identity.full_name.clone(),
            role: identity.role,
        })
    }

    async fn check_budget(&self, key: &RateLimitKey) -> AuthResult<()> {
        self.limiter
            .check(OperationClass::TotpCheck, key)
            .await
            .map_err(|retry_after| AuthError::RateLimited { retry_after })
    }

    async fn reject(
        &self,
        actor_id: Option<IdentityId>,
        origin_key: &RateLimitKey,
        identity_key: &RateLimitKey,
        origin: &RequestOrigin,
        detail: &str,
    ) -> AuthError {
        self.limiter
            .penalize(OperationClass::TotpCheck, origin_key)
            .await;
        self.limiter
            .penalize(OperationClass::TotpCheck, identity_key)
            .await;
        emit_audit(&self.audit, AuditEvent::login_failure(actor_id, detail, origin));
        AuthError::authentication_failed()
    }
}
