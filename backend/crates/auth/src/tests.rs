//! End-to-end authentication flow tests against in-memory fakes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use platform::client::RequestOrigin;
use platform::password::{ClearTextPassword, HashingParams, PasswordHasher};
use platform::rate_limit::{InMemoryRateLimitStore, RateLimitConfig, RateLimiter};

use crate::application::config::AuthConfig;
use crate::application::{
    RefreshUseCase, SignInInput, SignInOutput, SignInUseCase, SignOutUseCase, VerifyTotpInput,
    VerifyTotpUseCase,
};
use crate::domain::entity::audit_event::{AuditAction, AuditEvent};
use crate::domain::entity::identity::Identity;
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, role::Role, totp_secret::TotpSecret,
};
use crate::error::{AuthError, AuthResult};
use crate::token::{TokenClaims, TokenIssuer};

// ============================================================================
// In-memory fakes
// ============================================================================

#[derive(Clone, Default)]
struct InMemoryIdentityRepository {
    identities: Arc<Mutex<HashMap<Uuid, Identity>>>,
}

impl InMemoryIdentityRepository {
    async fn insert(&self, identity: Identity) {
        self.identities
            .lock()
            .await
            .insert(*identity.identity_id.as_uuid(), identity);
    }

    async fn get(&self, id: &IdentityId) -> Option<Identity> {
        self.identities.lock().await.get(id.as_uuid()).cloned()
    }

    async fn set_active(&self, id: &IdentityId, active: bool) {
        if let Some(identity) = self.identities.lock().await.get_mut(id.as_uuid()) {
            identity.active = active;
        }
    }
}

impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        Ok(self
            .identities
            .lock()
            .await
            .values()
            .find(|i| i.email == *email)
            .cloned())
    }

    async fn find_by_id(&self, identity_id: &IdentityId) -> AuthResult<Option<Identity>> {
        Ok(self.identities.lock().await.get(identity_id.as_uuid()).cloned())
    }

    async fn store_totp_secret(
        &self,
        identity_id: &IdentityId,
        secret: &TotpSecret,
    ) -> AuthResult<()> {
        let mut identities = self.identities.lock().await;
        let identity = identities
            .get_mut(identity_id.as_uuid())
            .ok_or(AuthError::NotFound)?;

        if identity.totp_verified {
            return Err(AuthError::Internal(
                "Cannot replace a confirmed TOTP secret".into(),
            ));
        }
        identity.totp_secret = Some(secret.clone());
        identity.totp_enabled = false;
        Ok(())
    }

    async fn confirm_totp(&self, identity_id: &IdentityId) -> AuthResult<bool> {
        let mut identities = self.identities.lock().await;
        let identity = identities
            .get_mut(identity_id.as_uuid())
            .ok_or(AuthError::NotFound)?;

        if identity.totp_verified {
            return Ok(false);
        }
        identity.totp_enabled = true;
        identity.totp_verified = true;
        Ok(true)
    }
}

#[derive(Clone, Default)]
struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    async fn record(&self, event: &AuditEvent) -> AuthResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

const PASSWORD: &str = "C0rrect-H0rse!";

struct Harness {
    repo: Arc<InMemoryIdentityRepository>,
    audit: Arc<InMemoryAuditSink>,
    limiter: Arc<RateLimiter<InMemoryRateLimitStore>>,
    hasher: Arc<PasswordHasher>,
    issuer: Arc<TokenIssuer>,
    config: Arc<AuthConfig>,
}

impl Harness {
    fn new() -> Self {
        let mut config = AuthConfig::development();
        // Cheap hashing so the suite stays fast
        config.hashing = HashingParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        // Tight budgets so exhaustion is reachable
        config.rate_limits.password_login = RateLimitConfig::new(3, 60);
        config.rate_limits.totp_check = RateLimitConfig::new(3, 60);
        Self::with_config(config)
    }

    fn with_config(config: AuthConfig) -> Self {
        let issuer = Arc::new(config.token_issuer());
        let hasher = Arc::new(config.password_hasher().unwrap());
        let limiter = Arc::new(RateLimiter::new(
            InMemoryRateLimitStore::new(),
            config.rate_limits.clone(),
        ));

        Self {
            repo: Arc::new(InMemoryIdentityRepository::default()),
            audit: Arc::new(InMemoryAuditSink::default()),
            limiter,
            hasher,
            issuer,
            config: Arc::new(config),
        }
    }

    async fn seed(&self, email: &str) -> Identity {
        let password = ClearTextPassword::new(PASSWORD.to_string()).unwrap();
        let identity = Identity::new(
            Email::new(email).unwrap(),
            "Avery Broker".to_string(),
            self.hasher.hash(&password).unwrap(),
            Role::User,
        );
        self.repo.insert(identity.clone()).await;
        identity
    }

    /// Seed an identity that already completed TOTP enrollment
    async fn seed_enrolled(&self, email: &str) -> (Identity, TotpSecret) {
        let mut identity = self.seed(email).await;
        let secret = TotpSecret::generate();
        identity.totp_secret = Some(secret.clone());
        identity.confirm_totp();
        self.repo.insert(identity.clone()).await;
        (identity, secret)
    }

    fn sign_in(&self) -> SignInUseCase<InMemoryIdentityRepository, InMemoryAuditSink> {
        SignInUseCase::new(
            self.repo.clone(),
            self.audit.clone(),
            self.limiter.clone(),
            self.hasher.clone(),
        )
    }

    fn verify_totp(&self) -> VerifyTotpUseCase<InMemoryIdentityRepository, InMemoryAuditSink> {
        VerifyTotpUseCase::new(
            self.repo.clone(),
            self.audit.clone(),
            self.limiter.clone(),
            self.issuer.clone(),
            self.config.clone(),
        )
    }

    fn refresh(&self) -> RefreshUseCase<InMemoryIdentityRepository> {
        RefreshUseCase::new(self.repo.clone(), self.issuer.clone())
    }

    fn sign_out(&self) -> SignOutUseCase<InMemoryAuditSink> {
        SignOutUseCase::new(self.audit.clone())
    }
}

fn origin() -> RequestOrigin {
    RequestOrigin::new("203.0.113.10".parse().ok(), Some("FlowTest/1.0".into()))
}

fn login_input(email: &str, password: &str) -> SignInInput {
    SignInInput {
        email: email.to_string(),
        password: password.to_string(),
    }
}

fn code_input(email: &str, code: &str) -> VerifyTotpInput {
    VerifyTotpInput {
        email: email.to_string(),
        code: code.to_string(),
    }
}

/// Let fire-and-forget audit tasks run
async fn drain_audit() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn wrong_code(right: &str) -> &'static str {
    if right == "000000" { "111111" } else { "000000" }
}

// ============================================================================
// Flow tests
// ============================================================================

#[tokio::test]
async fn test_full_enrollment_then_challenge_flow() {
    let h = Harness::new();
    let email = "broker@example.com";
    let seeded = h.seed(email).await;

    // First login: enrollment payload, no tokens anywhere
    let output = h.sign_in().execute(login_input(email, PASSWORD), origin()).await.unwrap();
    let SignInOutput::EnrollmentRequired(provisioning) = output else {
        panic!("expected enrollment for un-enrolled identity");
    };
    assert!(!provisioning.secret_base32.is_empty());
    assert!(!provisioning.qr_code_base64.is_empty());
    assert!(provisioning.otpauth_url.starts_with("otpauth://totp/"));

    // The persisted secret matches what the client was shown
    let stored = h.repo.get(&seeded.identity_id).await.unwrap();
    let secret = stored.totp_secret.clone().unwrap();
    assert_eq!(secret.as_base32(), provisioning.secret_base32);
    assert!(!stored.totp_verified);

    // First correct code confirms enrollment and issues the pair
    let code = secret.generate_current(email).unwrap();
    let verified = h.verify_totp().execute(code_input(email, &code), origin()).await.unwrap();

    let stored = h.repo.get(&seeded.identity_id).await.unwrap();
    assert!(stored.totp_enabled && stored.totp_verified);

    let claims = h.issuer.verify_access(&verified.tokens.access).unwrap();
    assert_eq!(claims.sub, *seeded.identity_id.as_uuid());
    assert_eq!(claims.email, email);
    assert!(h.issuer.verify_refresh(&verified.tokens.refresh).is_ok());

    // Second login: challenge only, the secret is never re-exposed
    let output = h.sign_in().execute(login_input(email, PASSWORD), origin()).await.unwrap();
    let SignInOutput::ChallengeRequired { identity_ref } = output else {
        panic!("expected challenge for enrolled identity");
    };
    assert_eq!(identity_ref, *seeded.identity_id.as_uuid());

    // And the challenge still accepts a current code
    let code = secret.generate_current(email).unwrap();
    assert!(h.verify_totp().execute(code_input(email, &code), origin()).await.is_ok());

    drain_audit().await;
    let events = h.audit.events().await;
    assert!(events.iter().any(|e| e.action == AuditAction::Login && e.success));
}

#[tokio::test]
async fn test_credential_failures_are_indistinguishable() {
    let h = Harness::new();
    let (identity, _) = h.seed_enrolled("broker@example.com").await;
    h.repo.set_active(&identity.identity_id, false).await;

    let wrong_password = h
        .sign_in()
        .execute(login_input("broker@example.com", "Wrong-Passw0rd!"), origin())
        .await
        .unwrap_err();
    let unknown_email = h
        .sign_in()
        .execute(login_input("nobody@example.com", PASSWORD), origin())
        .await
        .unwrap_err();
    let inactive = h
        .sign_in()
        .execute(login_input("broker@example.com", PASSWORD), origin())
        .await
        .unwrap_err();

    // Same variant, same wording
    for err in [&wrong_password, &unknown_email, &inactive] {
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    assert_eq!(unknown_email.to_string(), inactive.to_string());

    drain_audit().await;
    let events = h.audit.events().await;
    let failures: Vec<_> = events.iter().filter(|e| !e.success).collect();
    assert_eq!(failures.len(), 3);
    // Unknown email leaves no actor attribution
    assert!(failures.iter().any(|e| e.actor_id.is_none()));
}

#[tokio::test]
async fn test_login_budget_exhaustion_and_penalty_on_failure_only() {
    let h = Harness::new();
    h.seed_enrolled("broker@example.com").await;

    // Budget is 3: three failures are answered opaquely...
    for _ in 0..3 {
        let err = h
            .sign_in()
            .execute(login_input("broker@example.com", "Wrong-Passw0rd!"), origin())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    // ...the fourth attempt is refused up front, correct password or not
    let err = h
        .sign_in()
        .execute(login_input("broker@example.com", PASSWORD), origin())
        .await
        .unwrap_err();
    let AuthError::RateLimited { retry_after } = err else {
        panic!("expected rate limited, got {err:?}");
    };
    assert!(retry_after.as_secs() <= 60);
}

#[tokio::test]
async fn test_successful_logins_never_consume_budget() {
    let h = Harness::new();
    h.seed_enrolled("broker@example.com").await;

    // Budget is 3, but successes only check, never consume
    for _ in 0..10 {
        let output = h
            .sign_in()
            .execute(login_input("broker@example.com", PASSWORD), origin())
            .await
            .unwrap();
        assert!(matches!(output, SignInOutput::ChallengeRequired { .. }));
    }
}

#[tokio::test]
async fn test_wrong_totp_code_penalizes_and_exhausts() {
    let h = Harness::new();
    let (_, secret) = h.seed_enrolled("broker@example.com").await;
    let right = secret.generate_current("broker@example.com").unwrap();
    let wrong = wrong_code(&right);

    for _ in 0..3 {
        let err = h
            .verify_totp()
            .execute(code_input("broker@example.com", wrong), origin())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    let err = h
        .verify_totp()
        .execute(code_input("broker@example.com", &right), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimited { .. }));
}

#[tokio::test]
async fn test_same_code_accepted_across_login_cycles() {
    let h = Harness::new();
    let (_, secret) = h.seed_enrolled("broker@example.com").await;

    let code = secret.generate_current("broker@example.com").unwrap();
    let first = h
        .verify_totp()
        .execute(code_input("broker@example.com", &code), origin())
        .await;
    assert!(first.is_ok());

    // Codes are bounded by their time step plus the skew window, not
    // replay-tracked: the same code passes a second login cycle
    let second = h
        .verify_totp()
        .execute(code_input("broker@example.com", &code), origin())
        .await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_totp_step_validation_errors() {
    let h = Harness::new();
    h.seed_enrolled("broker@example.com").await;

    // Malformed codes are validation failures, not credential failures
    for bad in ["12345", "abcdef", ""] {
        let err = h
            .verify_totp()
            .execute(code_input("broker@example.com", bad), origin())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)), "{bad:?}: {err:?}");
    }

    // Unknown identity at this step is a plain NotFound
    let err = h
        .verify_totp()
        .execute(code_input("nobody@example.com", "123456"), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound));

    // Enrollment never started
    h.seed("fresh@example.com").await;
    let err = h
        .verify_totp()
        .execute(code_input("fresh@example.com", "123456"), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}

#[tokio::test]
async fn test_refresh_issues_new_access_without_rotation() {
    let h = Harness::new();
    let (identity, secret) = h.seed_enrolled("broker@example.com").await;

    let code = secret.generate_current("broker@example.com").unwrap();
    let verified = h
        .verify_totp()
        .execute(code_input("broker@example.com", &code), origin())
        .await
        .unwrap();

    let access = h.refresh().execute(Some(&verified.tokens.refresh)).await.unwrap();
    let claims = h.issuer.verify_access(&access).unwrap();
    assert_eq!(claims.sub, *identity.identity_id.as_uuid());

    // The same refresh token keeps working (no rotation)
    assert!(h.refresh().execute(Some(&verified.tokens.refresh)).await.is_ok());

    // Wrong class, garbage, and missing tokens are all opaque failures
    for bad in [Some(verified.tokens.access.as_str()), Some("garbage"), None] {
        let err = h.refresh().execute(bad).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    // Deactivation takes effect at the next refresh
    h.repo.set_active(&identity.identity_id, false).await;
    let err = h.refresh().execute(Some(&verified.tokens.refresh)).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn test_expired_refresh_token_never_yields_access() {
    let h = Harness::new();
    let (identity, _) = h.seed_enrolled("broker@example.com").await;

    // A correctly signed refresh token whose expiry has passed
    let now = chrono::Utc::now().timestamp();
    let claims = TokenClaims {
        sub: *identity.identity_id.as_uuid(),
        email: identity.email.as_str().to_string(),
        role: identity.role,
        iat: now - 7200,
        exp: now - 3600,
    };
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(&h.config.refresh_secret),
    )
    .unwrap();

    let err = h.refresh().execute(Some(&expired)).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn test_logout_audits_but_does_not_revoke_access() {
    let h = Harness::new();
    let (identity, secret) = h.seed_enrolled("broker@example.com").await;

    let code = secret.generate_current("broker@example.com").unwrap();
    let verified = h
        .verify_totp()
        .execute(code_input("broker@example.com", &code), origin())
        .await
        .unwrap();

    h.sign_out().execute(Some(*identity.identity_id.as_uuid()), &origin());

    // Bearer tokens have no revocation: the access token outlives logout
    assert!(h.issuer.verify_access(&verified.tokens.access).is_ok());

    drain_audit().await;
    let events = h.audit.events().await;
    let logout = events
        .iter()
        .find(|e| e.action == AuditAction::Logout)
        .expect("logout audit event");
    assert!(logout.success);
    assert_eq!(
        logout.actor_id.as_ref().map(|id| *id.as_uuid()),
        Some(*identity.identity_id.as_uuid())
    );
}

#[tokio::test]
async fn test_malformed_password_rejected_before_lookup() {
    let h = Harness::new();
    h.seed_enrolled("broker@example.com").await;

    // Control characters fail hygiene for known and unknown accounts
    // alike; the response must not depend on account existence
    let known = h
        .sign_in()
        .execute(login_input("broker@example.com", "bad\u{0007}password"), origin())
        .await
        .unwrap_err();
    let unknown = h
        .sign_in()
        .execute(login_input("nobody@example.com", "bad\u{0007}password"), origin())
        .await
        .unwrap_err();

    assert!(matches!(known, AuthError::Validation(_)));
    assert!(matches!(unknown, AuthError::Validation(_)));
    assert_eq!(known.to_string(), unknown.to_string());
}

#[tokio::test]
async fn test_empty_inputs_are_validation_failures() {
    let h = Harness::new();

    let err = h
        .sign_in()
        .execute(login_input("", "whatever"), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let err = h
        .sign_in()
        .execute(login_input("broker@example.com", ""), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    let err = h
        .sign_in()
        .execute(login_input("not-an-email", "whatever"), origin())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));
}
