//! JWT Issuance and Verification
//!
//! Two token classes signed with HS256 under distinct secrets:
//! - access tokens: short-lived, sent as `Authorization: Bearer ...`
//! - refresh tokens: long-lived, held in an HTTP-only cookie
//!
//! Separate secrets mean a refresh token can never pass access-token
//! verification and vice versa. Tokens are pure bearer credentials:
//! there is no per-token revocation, an issued access token stays
//! valid until its `exp`.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_object::{email::Email, identity_id::IdentityId, role::Role};

/// Claims carried by both token classes.
///
/// The shape is closed: payloads with unknown or missing fields are
/// rejected at verification, not silently accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// Identity UUID
    pub sub: uuid::Uuid,
    /// Normalized email at issuance time
    pub email: String,
    /// Role at issuance time
    pub role: Role,
    /// Issued-at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

/// Token verification/issuance failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Correctly signed but past its expiry
    #[error("token expired")]
    Expired,

    /// Forged, corrupt, wrong-class or otherwise unverifiable
    #[error("token invalid")]
    Invalid,

    /// Signing failed (should not happen with valid keys)
    #[error("token signing failed")]
    Signing,
}

/// An access/refresh pair issued together at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues and verifies both token classes.
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(
        access_secret: &[u8],
        refresh_secret: &[u8],
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    fn claims(&self, id: &IdentityId, email: &Email, role: Role, ttl: Duration) -> TokenClaims {
        let now = Utc::now().timestamp();
        TokenClaims {
            sub: *id.as_uuid(),
            email: email.as_str().to_string(),
            role,
            iat: now,
            exp: now + ttl.as_secs() as i64,
        }
    }

    fn sign(&self, claims: &TokenClaims, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, key).map_err(|e| {
            tracing::error!(error = %e, "JWT signing failed");
            TokenError::Signing
        })
    }

    fn verify(&self, token: &str, key: &DecodingKey) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<TokenClaims>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn issue_access(
        &self,
        id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<String, TokenError> {
        let claims = self.claims(id, email, role, self.access_ttl);
        self.sign(&claims, &self.access_encoding)
    }

    pub fn issue_refresh(
        &self,
        id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<String, TokenError> {
        let claims = self.claims(id, email, role, self.refresh_ttl);
        self.sign(&claims, &self.refresh_encoding)
    }

    pub fn issue_pair(
        &self,
        id: &IdentityId,
        email: &Email,
        role: Role,
    ) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue_access(id, email, role)?,
            refresh: self.issue_refresh(id, email, role)?,
        })
    }

    pub fn verify_access(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify(token, &self.access_decoding)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<TokenClaims, TokenError> {
        self.verify(token, &self.refresh_decoding)
    }
}
