//! Email Value Object
//!
//! Case-insensitively normalized email address. Lookup and rate-limit
//! keying both rely on the normalized form, so normalization happens
//! exactly once, at construction.

use kernel::error::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const MAX_EMAIL_LENGTH: usize = 254;

/// Normalized email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Validate and normalize (trim + ASCII lowercase).
    pub fn new(raw: &str) -> AppResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(AppError::unprocessable("Email must not be empty"));
        }
        if normalized.len() > MAX_EMAIL_LENGTH {
            return Err(AppError::unprocessable("Email is too long"));
        }

        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(AppError::unprocessable("Invalid email address"));
        };

        if local.is_empty()
            || domain.is_empty()
            || domain.contains('@')
            || !domain.contains('.')
            || normalized.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(AppError::unprocessable("Invalid email address"));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_normalization() {
        let email = Email::new("  Broker@Example.COM ").unwrap();
        assert_eq!(email.as_str(), "broker@example.com");
    }

    #[test]
    fn test_equal_after_normalization() {
        let a = Email::new("A@example.com").unwrap();
        let b = Email::new("a@EXAMPLE.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_emails_rejected() {
        for raw in ["", "no-at-sign", "@example.com", "a@", "a@nodot", "a b@x.com", "a@b@c.com"] {
            assert!(Email::new(raw).is_err(), "accepted: {raw:?}");
        }
    }
}
