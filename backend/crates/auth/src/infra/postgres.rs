//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::password::HashedPassword;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{audit_event::AuditEvent, identity::Identity};
use crate::domain::repository::{AuditSink, IdentityRepository};
use crate::domain::value_object::{
    email::Email, identity_id::IdentityId, role::Role, totp_secret::TotpSecret,
};
use crate::error::{AuthError, AuthResult};

const IDENTITY_COLUMNS: &str = r#"
    identity_id,
    email,
    full_name,
    password_hash,
    totp_secret,
    totp_enabled,
    totp_verified,
    active,
    role,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed identity repository
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IdentityRepository for PgIdentityRepository {
    async fn find_by_email(&self, email: &Email) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_identity()).transpose()
    }

    async fn find_by_id(&self, identity_id: &IdentityId) -> AuthResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities WHERE identity_id = $1"
        ))
        .bind(identity_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_identity()).transpose()
    }

    async fn store_totp_secret(
        &self,
        identity_id: &IdentityId,
        secret: &TotpSecret,
    ) -> AuthResult<()> {
        // Only while unconfirmed: a confirmed secret is frozen
        let updated = sqlx::query(
            r#"
            UPDATE identities
            SET totp_secret = $2,
                totp_enabled = false,
                updated_at = now()
            WHERE identity_id = $1 AND totp_verified = false
            "#,
        )
        .bind(identity_id.as_uuid())
        .bind(secret.as_base32())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AuthError::Internal(
                "Cannot replace a confirmed TOTP secret".to_string(),
            ));
        }

        Ok(())
    }

    async fn confirm_totp(&self, identity_id: &IdentityId) -> AuthResult<bool> {
        // Single conditional update: both flags flip together, at most
        // once, no matter how many verifications race
        let updated = sqlx::query(
            r#"
            UPDATE identities
            SET totp_enabled = true,
                totp_verified = true,
                updated_at = now()
            WHERE identity_id = $1 AND totp_verified = false
            "#,
        )
        .bind(identity_id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }
}

// ============================================================================
// Audit Sink Implementation
// ============================================================================

/// PostgreSQL-backed append-only audit sink
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl AuditSink for PgAuditSink {
    async fn record(&self, event: &AuditEvent) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                event_id,
                actor_id,
                action,
                success,
                detail,
                origin_ip,
                origin_agent,
                recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id)
        .bind(event.actor_id.as_ref().map(|id| *id.as_uuid()))
        .bind(event.action.as_str())
        .bind(event.success)
        .bind(&event.detail)
        .bind(&event.origin_ip)
        .bind(&event.origin_agent)
        .bind(event.recorded_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct IdentityRow {
    identity_id: Uuid,
    email: String,
    full_name: String,
    password_hash: String,
    totp_secret: Option<String>,
    totp_enabled: bool,
    totp_verified: bool,
    active: bool,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self) -> AuthResult<Identity> {
        let role = Role::from_code(&self.role).ok_or_else(|| {
            AuthError::Internal(format!("Unknown role code in store: {}", self.role))
        })?;

        let totp_secret = self
            .totp_secret
            .map(TotpSecret::from_base32)
            .transpose()
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(Identity {
            identity_id: IdentityId::from_uuid(self.identity_id),
            email: Email::new(&self.email)
                .map_err(|e| AuthError::Internal(e.to_string()))?,
            full_name: self.full_name,
            password_hash: HashedPassword::from_phc_string(self.password_hash)
                .map_err(|e| AuthError::Internal(e.to_string()))?,
            totp_secret,
            totp_enabled: self.totp_enabled,
            totp_verified: self.totp_verified,
            active: self.active,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
