//! Role Value Object
//!
//! Closed role set. Unknown codes are rejected, never defaulted.

use serde::{Deserialize, Serialize};

/// Identity role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    User,
}

impl Role {
    /// Parse a stored role code. Unknown codes return `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_codes_round_trip() {
        for role in [Role::Owner, Role::Admin, Role::User] {
            assert_eq!(Role::from_code(role.as_code()), Some(role));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(Role::from_code("superadmin"), None);
        assert_eq!(Role::from_code(""), None);
        assert_eq!(Role::from_code("Admin"), None);
    }
}
