//! Sign In Use Case
//!
//! First authentication step: verifies the password, then routes the
//! caller to TOTP enrollment (first login) or the TOTP challenge
//! (every subsequent login). Never issues tokens itself.
//!
//! Anti-enumeration: unknown email, deactivated identity and wrong
//! password all collapse into the same opaque failure, penalize the
//! limiter identically, and leave an audit record.

use std::sync::Arc;

use platform::client::RequestOrigin;
use platform::password::{ClearTextPassword, PasswordHasher};
use platform::rate_limit::{InMemoryRateLimitStore, OperationClass, RateLimitKey, RateLimiter};
use uuid::Uuid;

use crate::application::emit_audit;
use crate::domain::entity::audit_event::AuditEvent;
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, totp_secret::{TotpProvisioning, TotpSecret},
};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// Sign in outcome: exactly one of the two, and never tokens
#[derive(Debug)]
pub enum SignInOutput {
    /// First login: the one-time enrollment payload
    EnrollmentRequired(TotpProvisioning),
    /// Enrolled: answer the TOTP challenge next. The secret and QR are
    /// never re-exposed here.
    ChallengeRequired { identity_ref: Uuid },
}

/// Sign in use case
pub struct SignInUseCase<R, A>
where
    R: IdentityRepository,
    A: AuditSink + Send + Sync + 'static,
{
    repo: Arc<R>,
    audit: Arc<A>,
    limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
    hasher: Arc<PasswordHasher>,
}

impl<R, A> SignInUseCase<R, A>
where
    R: IdentityRepository + Sync,
    A: AuditSink + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        audit: Arc<A>,
        limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
        hasher: Arc<PasswordHasher>,
    ) -> Self {
        Self {
            repo,
            audit,
            limiter,
            hasher,
        }
    }

    pub async fn execute(
        &self,
        input: SignInInput,
        origin: RequestOrigin,
    ) -> AuthResult<SignInOutput> {
        if input.password.is_empty() {
            return Err(AuthError::Validation("Password must not be empty".into()));
        }
        // Malformed input is rejected before any lookup, so the
        // response cannot depend on whether the account exists
        let password = ClearTextPassword::new(input.password)
            .map_err(|e| AuthError::Validation(e.to_string()))?;
        let email = Email::new(&input.email)
            .map_err(|e| AuthError::Validation(e.message().to_string()))?;

        // Budget check before any hashing work; read-only, so
        // successful logins never consume budget
        let origin_key = RateLimitKey::origin(origin.ip);
        let identity_key = RateLimitKey::origin_identity(origin.ip, email.as_str());
        self.check_budget(&origin_key).await?;
        self.check_budget(&identity_key).await?;

        let Some(identity) = self.repo.find_by_email(&email).await? else {
            return Err(self
                .reject(None, &origin_key, &identity_key, &origin, "unknown identity")
                .await);
        };

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

        // Argon2 is CPU-heavy on purpose; keep it off the async runtime
        let hasher = Arc::clone(&self.hasher);
        let hash = identity.password_hash.clone();
        let password_valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))?;

        if !password_valid {
            return Err(self
                .reject(
                    Some(identity.identity_id),
                    &origin_key,
                    &identity_key,
                    &origin,
                    "password mismatch",
                )
                .await);
        }

        if identity.totp_confirmed() {
            tracing::debug!(identity_id = %identity.identity_id, "Password accepted, TOTP challenge pending");
            return Ok(SignInOutput::ChallengeRequired {
                identity_ref: *identity.identity_id.as_uuid(),
            });
        }

        // First login (or retried enrollment): a fresh secret replaces
        // any unconfirmed one. The store refuses this once confirmed.
        let secret = TotpSecret::generate();
        self.repo
            .store_totp_secret(&identity.identity_id, &secret)
            .await?;

        let provisioning = secret.provision(identity.email.as_str())?;

        tracing::info!(identity_id = %identity.identity_id, "TOTP enrollment started");
        Ok(SignInOutput::EnrollmentRequired(provisioning))
    }

    async fn check_budget(&self, key: &RateLimitKey) -> AuthResult<()> {
        self.limiter
            .check(OperationClass::PasswordLogin, key)
            .await
            .map_err(|retry_after| AuthError::RateLimited { retry_after })
    }

    /// The one failure path: penalize both keys, audit, and hand back
    /// the opaque error.
    async fn reject(
        &self,
        actor_id: Option<IdentityId>,
        origin_key: &RateLimitKey,
        identity_key: &RateLimitKey,
        origin: &RequestOrigin,
        detail: &str,
    ) -> AuthError {
        self.limiter
            .penalize(OperationClass::PasswordLogin, origin_key)
            .await;
        self.limiter
            .penalize(OperationClass::PasswordLogin, identity_key)
            .await;
        emit_audit(&self.audit, AuditEvent::login_failure(actor_id, detail, origin));
        AuthError::authentication_failed()
    }
}
