//! Password Hashing and Verification
//!
//! Back-office credential handling with:
//! - Argon2id hashing (memory-hard, cost tunable via configuration)
//! - A strength policy that reports every violated rule at once
//! - Zeroization of sensitive data
//! - Constant-time comparison
//!
//! Hashing cost is configured through [`HashingParams`]; the defaults are
//! the OWASP-recommended Argon2id parameters, which cost on the order of
//! a few hundred milliseconds per hash on commodity hardware.

use std::fmt;

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Minimum password length in Unicode code points
pub const MIN_PASSWORD_LENGTH: usize = 10;

/// Maximum password length (keeps hashing cost bounded)
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ============================================================================
// Error Types
// ============================================================================

/// A single rule of the password strength policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    MinLength,
    MaxLength,
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl PasswordRule {
    pub const fn description(&self) -> &'static str {
        match self {
            PasswordRule::MinLength => "must be at least 10 characters",
            PasswordRule::MaxLength => "must be at most 128 characters",
            PasswordRule::Lowercase => "must contain a lowercase letter",
            PasswordRule::Uppercase => "must contain an uppercase letter",
            PasswordRule::Digit => "must contain a digit",
            PasswordRule::Symbol => "must contain a symbol",
        }
    }
}

/// Strength policy rejection carrying every violated rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeakPassword {
    pub violations: Vec<PasswordRule>,
}

impl fmt::Display for WeakPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "password does not meet the strength policy: ")?;
        for (i, rule) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", rule.description())?;
        }
        Ok(())
    }
}

impl std::error::Error for WeakPassword {}

/// Password hashing/verification errors
#[derive(Debug, Error)]
pub enum PasswordError {
    /// Plaintext failed the strength policy
    #[error(transparent)]
    Weak(#[from] WeakPassword),

    /// Password is empty or whitespace only
    #[error("password cannot be empty")]
    Empty,

    /// Password contains control characters
    #[error("password contains invalid control characters")]
    InvalidCharacter,

    /// Hashing operation failed
    #[error("password hashing failed: {0}")]
    HashingFailed(String),

    /// Invalid PHC hash format
    #[error("invalid password hash format")]
    InvalidHashFormat,

    /// Invalid Argon2 cost parameters
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),
}

// ============================================================================
// Strength policy
// ============================================================================

/// Validate a plaintext against the strength policy.
///
/// Collects every violated rule so the caller can present the complete
/// list to the user in one round trip.
pub fn validate_strength(password: &str) -> Result<(), WeakPassword> {
    let mut violations = Vec::new();

    let char_count = password.chars().count();
    if char_count < MIN_PASSWORD_LENGTH {
        violations.push(PasswordRule::MinLength);
    }
    if char_count > MAX_PASSWORD_LENGTH {
        violations.push(PasswordRule::MaxLength);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        violations.push(PasswordRule::Lowercase);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        violations.push(PasswordRule::Uppercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push(PasswordRule::Digit);
    }
    if !password
        .chars()
        .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
    {
        violations.push(PasswordRule::Symbol);
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(WeakPassword { violations })
    }
}

// ============================================================================
// Clear Text Password (Zeroized on drop)
// ============================================================================

/// Clear text password with automatic memory zeroization
///
/// Securely erased from memory on drop. Does not implement `Clone`, and
/// Debug output is redacted. Construction applies NFKC normalization and
/// basic hygiene only; the strength policy is enforced by
/// [`PasswordHasher::hash`], because verification must accept any stored
/// credential regardless of the policy in force when it was created.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Create a new clear text password.
    ///
    /// Rejects empty/whitespace-only input and control characters.
    pub fn new(raw: String) -> Result<Self, PasswordError> {
        let normalized: String = raw.nfkc().collect();

        if normalized.trim().is_empty() {
            return Err(PasswordError::Empty);
        }

        for ch in normalized.chars() {
            if ch.is_control() && ch != ' ' && ch != '\t' {
                return Err(PasswordError::InvalidCharacter);
            }
        }

        Ok(Self(normalized))
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed Password (Safe to store)
// ============================================================================

/// Hashed password in PHC string format
///
/// Carries algorithm, version, cost parameters, salt and digest, so the
/// stored hash stays verifiable when the configured cost changes.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    /// Create from PHC string (e.g., from database)
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordError> {
        let hash = s.into();

        PasswordHash::new(&hash).map_err(|_| PasswordError::InvalidHashFormat)?;

        Ok(Self { hash })
    }

    /// Get the PHC string for storage
    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}

// ============================================================================
// Hasher service
// ============================================================================

/// Argon2id cost parameters.
///
/// Defaults are the OWASP-recommended m=19456 (19 MiB), t=2, p=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashingParams {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Password hashing service.
///
/// Pure function over its inputs; holds only the Argon2 instance and an
/// optional application-wide pepper. Hashing is CPU-heavy by design and
/// callers on an async runtime should off-load it to a blocking thread.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    pepper: Option<Vec<u8>>,
}

impl PasswordHasher {
    /// Create a hasher with the given cost parameters and optional pepper.
    pub fn new(params: HashingParams, pepper: Option<Vec<u8>>) -> Result<Self, PasswordError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            None,
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            pepper,
        })
    }

    /// Hash a password, enforcing the strength policy first.
    ///
    /// Produces a salted PHC-formatted Argon2id hash.
    pub fn hash(&self, password: &ClearTextPassword) -> Result<HashedPassword, PasswordError> {
        validate_strength(password.as_str())?;

        let password_bytes = self.peppered(password);

        // 128-bit random salt
        let salt = SaltString::generate(OsRng);

        let hash = argon2::PasswordHasher::hash_password(&self.argon2, &password_bytes, &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(HashedPassword {
            hash: hash.to_string(),
        })
    }

    /// Verify a password against a stored hash.
    ///
    /// Argon2 uses constant-time comparison internally. A mismatch or a
    /// malformed stored hash both yield `false`; this never panics.
    pub fn verify(&self, password: &ClearTextPassword, hash: &HashedPassword) -> bool {
        let password_bytes = self.peppered(password);

        let parsed_hash = match PasswordHash::new(hash.as_phc_string()) {
            Ok(h) => h,
            Err(_) => return false,
        };

        self.argon2
            .verify_password(&password_bytes, &parsed_hash)
            .is_ok()
    }

    fn peppered(&self, password: &ClearTextPassword) -> Vec<u8> {
        match &self.pepper {
            Some(p) => {
                let mut combined = password.as_bytes().to_vec();
                combined.extend_from_slice(p);
                combined
            }
            None => password.as_bytes().to_vec(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> PasswordHasher {
        PasswordHasher::new(HashingParams::default(), None).unwrap()
    }

    #[test]
    fn test_strength_collects_all_violations() {
        let err = validate_strength("short").unwrap_err();
        assert!(err.violations.contains(&PasswordRule::MinLength));
        assert!(err.violations.contains(&PasswordRule::Uppercase));
        assert!(err.violations.contains(&PasswordRule::Digit));
        assert!(err.violations.contains(&PasswordRule::Symbol));
        assert!(!err.violations.contains(&PasswordRule::Lowercase));
    }

    #[test]
    fn test_strength_single_violation() {
        let err = validate_strength("Longenough1x").unwrap_err();
        assert_eq!(err.violations, vec![PasswordRule::Symbol]);
    }

    #[test]
    fn test_strength_accepts_valid() {
        assert!(validate_strength("Str0ng!Pass").is_ok());
        assert!(validate_strength("MySecure#Pass2024").is_ok());
    }

    #[test]
    fn test_strength_message_enumerates_rules() {
        let err = validate_strength("alllowercase").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("uppercase"));
        assert!(msg.contains("digit"));
        assert!(msg.contains("symbol"));
    }

    #[test]
    fn test_password_empty() {
        assert!(matches!(
            ClearTextPassword::new("".to_string()),
            Err(PasswordError::Empty)
        ));
        assert!(matches!(
            ClearTextPassword::new("        ".to_string()),
            Err(PasswordError::Empty)
        ));
    }

    #[test]
    fn test_password_control_characters() {
        assert!(matches!(
            ClearTextPassword::new("pass\u{0000}word".to_string()),
            Err(PasswordError::InvalidCharacter)
        ));
    }

    #[test]
    fn test_hash_rejects_weak_password() {
        let password = ClearTextPassword::new("tooweak".to_string()).unwrap();
        let result = hasher().hash(&password);
        assert!(matches!(result, Err(PasswordError::Weak(_))));
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = hasher();
        let password = ClearTextPassword::new("Str0ng!Pass".to_string()).unwrap();
        let hashed = hasher.hash(&password).unwrap();

        assert!(hasher.verify(&password, &hashed));

        let wrong = ClearTextPassword::new("Wr0ng!Pass!".to_string()).unwrap();
        assert!(!hasher.verify(&wrong, &hashed));
    }

    #[test]
    fn test_hash_with_pepper() {
        let password = ClearTextPassword::new("Str0ng!Pass".to_string()).unwrap();
        let peppered =
            PasswordHasher::new(HashingParams::default(), Some(b"app_pepper".to_vec())).unwrap();
        let plain = hasher();

        let hashed = peppered.hash(&password).unwrap();

        assert!(peppered.verify(&password, &hashed));
        assert!(!plain.verify(&password, &hashed));
    }

    #[test]
    fn test_phc_string_roundtrip() {
        let hasher = hasher();
        let password = ClearTextPassword::new("Str0ng!Pass".to_string()).unwrap();
        let hashed = hasher.hash(&password).unwrap();

        let phc_string = hashed.as_phc_string().to_string();
        let restored = HashedPassword::from_phc_string(phc_string).unwrap();

        assert!(hasher.verify(&password, &restored));
    }

    #[test]
    fn test_invalid_phc_string() {
        assert!(HashedPassword::from_phc_string("not_a_valid_hash").is_err());
    }

    #[test]
    fn test_debug_redaction() {
        let password = ClearTextPassword::new("Sup3r!Secret".to_string()).unwrap();
        let debug_output = format!("{:?}", password);
        assert!(debug_output.contains("REDACTED"));
        assert!(!debug_output.contains("Secret"));
    }
}
