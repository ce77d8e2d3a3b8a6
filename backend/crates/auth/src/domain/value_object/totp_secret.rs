//! TOTP Secret Value Object
//!
//! Wraps a TOTP secret for the second authentication factor.
//! Uses Google Authenticator compatible settings (SHA-1, 6 digits,
//! 30-second step).

use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use totp_rs::{Algorithm, Secret, TOTP};

/// TOTP configuration constants
const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_ISSUER: &str = "Meridian Brokerage";

/// Default accepted clock drift, in 30-second steps on either side.
/// Authenticator apps on phones routinely drift by up to a minute.
pub const DEFAULT_TOTP_SKEW: u8 = 2;

/// Malformed TOTP code input (a validation-class failure, distinct
/// from a well-formed but wrong code)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Code must be exactly 6 digits")]
pub struct MalformedCode;

/// Everything the enrolling client needs, returned exactly once
#[derive(Debug, Clone)]
pub struct TotpProvisioning {
    /// Base32 secret for manual entry
    pub secret_base32: String,
    /// otpauth:// URL (issuer + account label)
    pub otpauth_url: String,
    /// QR code as base64-encoded PNG
    pub qr_code_base64: String,
}

/// TOTP Secret for the second factor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotpSecret {
    /// Base32-encoded secret
    secret_base32: String,
}

impl TotpSecret {
    /// Generate a new random TOTP secret (160 bits)
    pub fn generate() -> Self {
        let secret = Secret::generate_secret();
        Self {
            secret_base32: secret.to_encoded().to_string(),
        }
    }

    /// Create from a base32-encoded string (from database)
    pub fn from_base32(secret: impl Into<String>) -> AppResult<Self> {
        let secret_str = secret.into();
        // Validate by trying to decode
        Secret::Encoded(secret_str.clone())
            .to_bytes()
            .map_err(|e| AppError::internal(format!("Invalid TOTP secret: {}", e)))?;

        Ok(Self {
            secret_base32: secret_str,
        })
    }

    /// Get the base32-encoded secret for storage
    pub fn as_base32(&self) -> &str {
        &self.secret_base32
    }

    /// Strip ASCII whitespace and require exactly 6 ASCII digits.
    /// Users type codes with spaces ("123 456"); apps show them grouped.
    pub fn normalize_code(raw: &str) -> Result<String, MalformedCode> {
        let code: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        if code.len() == TOTP_DIGITS && code.chars().all(|c| c.is_ascii_digit()) {
            Ok(code)
        } else {
            Err(MalformedCode)
        }
    }

    /// Create a TOTP instance for this secret
    fn to_totp(&self, skew: u8, account_label: &str) -> AppResult<TOTP> {
        let secret = Secret::Encoded(self.secret_base32.clone());

        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            skew,
            TOTP_STEP,
            secret
                .to_bytes()
                .map_err(|e| AppError::internal(format!("Invalid TOTP secret: {}", e)))?,
            Some(TOTP_ISSUER.to_string()),
            account_label.to_string(),
        )
        .map_err(|e| AppError::internal(format!("Failed to create TOTP: {}", e)))
    }

    /// Verify a code against the current time, accepting +-skew steps
    pub fn verify(&self, code: &str, skew: u8, account_label: &str) -> AppResult<bool> {
        let totp = self.to_totp(skew, account_label)?;
        Ok(totp.check_current(code).unwrap_or(false))
    }

    /// Verify a code at an explicit unix timestamp (skew boundary tests)
    pub fn verify_at(
        &self,
        code: &str,
        skew: u8,
        account_label: &str,
        at_unix: u64,
    ) -> AppResult<bool> {
        let totp = self.to_totp(skew, account_label)?;
        Ok(totp.check(code, at_unix))
    }

    /// Generate the code for an explicit unix timestamp (for testing)
    #[cfg(test)]
    pub fn generate_at(&self, account_label: &str, at_unix: u64) -> AppResult<String> {
        let totp = self.to_totp(0, account_label)?;
        Ok(totp.generate(at_unix))
    }

    /// Generate the current code (for testing)
    #[cfg(test)]
    pub fn generate_current(&self, account_label: &str) -> AppResult<String> {
        let totp = self.to_totp(0, account_label)?;
        totp.generate_current()
            .map_err(|e| AppError::internal(format!("Failed to generate TOTP: {}", e)))
    }

    /// Build the one-time enrollment payload: base32 secret, otpauth
    /// URL and QR code. Never called again after enrollment.
    pub fn provision(&self, account_label: &str) -> AppResult<TotpProvisioning> {
        let totp = self.to_totp(DEFAULT_TOTP_SKEW, account_label)?;

        let qr_code_base64 = totp
            .get_qr_base64()
            .map_err(|e| AppError::internal(format!("Failed to generate QR code: {}", e)))?;

        Ok(TotpProvisioning {
            secret_base32: self.secret_base32.clone(),
            otpauth_url: totp.get_url(),
            qr_code_base64,
        })
    }
}
