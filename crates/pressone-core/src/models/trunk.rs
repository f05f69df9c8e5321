//! Trunk identity model
//!
//! Each account dials through its own signalling endpoint. The endpoint
//! name is stored on the row; nothing derives it at call time.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrunkStatus {
    #[default]
    Active,
    Disabled,
}

impl fmt::Display for TrunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrunkStatus::Active => write!(f, "active"),
            TrunkStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl TrunkStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(TrunkStatus::Active),
            "disabled" | "inactive" => Some(TrunkStatus::Disabled),
            _ => None,
        }
    }
}

/// Outbound route owned by one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrunkIdentity {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    /// Switch endpoint the channel is dialed through, e.g. `PJSIP/{dest}@{endpoint}`
    pub endpoint: String,
    pub max_channels: i32,
    pub status: TrunkStatus,
}

impl TrunkIdentity {
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.status == TrunkStatus::Active && !self.endpoint.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_trunk() {
        let mut trunk = TrunkIdentity {
            id: 1,
            account_id: 7,
            name: "main".to_string(),
            endpoint: "acme_trunk".to_string(),
            max_channels: 10,
            status: TrunkStatus::Active,
        };
        assert!(trunk.is_usable());

        trunk.status = TrunkStatus::Disabled;
        assert!(!trunk.is_usable());

        trunk.status = TrunkStatus::Active;
        trunk.endpoint.clear();
        assert!(!trunk.is_usable());
    }
}
