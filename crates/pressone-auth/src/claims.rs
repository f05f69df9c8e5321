//! JWT Claims structure
//!
//! Operators are scoped to one account; admins may act on any account.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller role carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Operator => write!(f, "operator"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (operator or service name)
    pub sub: String,

    pub role: Role,

    /// Account an operator is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Claims for an operator of one account
    ///
    /// # Examples
    ///
    /// ```
    /// use pressone_auth::{Claims, Role};
    ///
    /// let claims = Claims::operator("bot", 42);
    /// assert_eq!(claims.role, Role::Operator);
    /// assert!(claims.can_access_account(42));
    /// assert!(!claims.can_access_account(7));
    /// ```
    pub fn operator(subject: &str, account_id: i64) -> Self {
        Self {
            sub: subject.to_string(),
            role: Role::Operator,
            account_id: Some(account_id),
            iat: Utc::now().timestamp(),
            exp: 0, // Will be set by JwtService
        }
    }

    /// Claims for an administrator
    pub fn admin(subject: &str) -> Self {
        Self {
            sub: subject.to_string(),
            role: Role::Admin,
            account_id: None,
            iat: Utc::now().timestamp(),
            exp: 0,
        }
    }

    /// Set an explicit lifetime
    pub fn expires_in(mut self, secs: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(secs)).timestamp();
        self
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins reach every account, operators only their own
    pub fn can_access_account(&self, account_id: i64) -> bool {
        self.is_admin() || self.account_id == Some(account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_scope() {
        let claims = Claims::operator("bot", 3);
        assert!(!claims.is_admin());
        assert!(claims.can_access_account(3));
        assert!(!claims.can_access_account(4));
    }

    #[test]
    fn test_admin_scope() {
        let claims = Claims::admin("root");
        assert!(claims.is_admin());
        assert!(claims.can_access_account(3));
        assert!(claims.can_access_account(999));
    }

    #[test]
    fn test_expiration() {
        let claims = Claims::admin("root").expires_in(3600);
        assert!(!claims.is_expired());

        let claims = Claims::admin("root").expires_in(-10);
        assert!(claims.is_expired());
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_value(Claims::operator("bot", 1)).unwrap();
        assert_eq!(json["role"], "operator");
        assert_eq!(json["account_id"], 1);

        let json = serde_json::to_value(Claims::admin("root")).unwrap();
        assert!(json.get("account_id").is_none());
        assert_eq!(json["role"], "admin");
    }
}
