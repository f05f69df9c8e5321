//! Ledger audit entries and change notifications

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of balance movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// Debit for a settled call, referenced by `call_id`
    CallCharge,
    /// Credit for a completed payment, referenced by `track_id`
    PaymentCredit,
}

impl fmt::Display for LedgerEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEntryKind::CallCharge => write!(f, "call_charge"),
            LedgerEntryKind::PaymentCredit => write!(f, "payment_credit"),
        }
    }
}

impl LedgerEntryKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "call_charge" => Some(LedgerEntryKind::CallCharge),
            "payment_credit" => Some(LedgerEntryKind::PaymentCredit),
            _ => None,
        }
    }
}

/// One balance movement; `(kind, reference)` is unique
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    pub kind: LedgerEntryKind,
    /// Signed amount applied to the balance
    pub amount: Decimal,
    pub balance_after: Decimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Notification published after a reconciliation commits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LedgerEvent {
    CallSettled {
        call_id: String,
        account_id: i64,
        campaign_id: Option<i64>,
        state: String,
        billed_cost: Decimal,
    },
    BalanceChanged {
        account_id: i64,
        credit_balance: Decimal,
        reference: String,
    },
    CampaignCompleted {
        campaign_id: i64,
        account_id: i64,
    },
}

impl LedgerEvent {
    /// Account the event belongs to
    pub fn account_id(&self) -> i64 {
        match self {
            LedgerEvent::CallSettled { account_id, .. }
            | LedgerEvent::BalanceChanged { account_id, .. }
            | LedgerEvent::CampaignCompleted { account_id, .. } => *account_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_event_wire_format() {
        let event = LedgerEvent::BalanceChanged {
            account_id: 3,
            credit_balance: dec!(9.2),
            reference: "T1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "balance_changed");
        assert_eq!(json["data"]["account_id"], 3);
        assert_eq!(event.account_id(), 3);
    }

    #[test]
    fn test_kind_strings() {
        assert_eq!(LedgerEntryKind::CallCharge.to_string(), "call_charge");
        assert_eq!(
            LedgerEntryKind::from_str("payment_credit"),
            Some(LedgerEntryKind::PaymentCredit)
        );
    }
}
