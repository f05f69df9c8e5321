//! Lifecycle events delivered by the switch and the payment processor
//!
//! These are the normalized forms handed to the reconciler; the HTTP layer
//! owns the wire payloads and their field aliases.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// DTMF result for a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtmfEvent {
    pub call_id: String,
    pub digit: String,
    /// Some switches report the talk time along with the digit
    pub duration_seconds: Option<i32>,
    /// Present when the DTMF report is also the call's final event
    pub hangup_cause: Option<String>,
    pub campaign_id: Option<i64>,
    pub campaign_item_id: Option<i64>,
}

impl DtmfEvent {
    pub fn pressed_one(&self) -> bool {
        self.digit.trim() == "1"
    }

    /// The hangup carried by a combined DTMF + hangup report
    pub fn as_hangup(&self) -> Option<HangupEvent> {
        self.hangup_cause.as_ref().map(|cause| HangupEvent {
            call_id: self.call_id.clone(),
            duration_seconds: self.duration_seconds.unwrap_or(0),
            hangup_cause: cause.clone(),
            campaign_id: self.campaign_id,
            campaign_item_id: self.campaign_item_id,
        })
    }
}

/// Final event of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HangupEvent {
    pub call_id: String,
    /// Seconds from answer to hangup, as measured by the switch
    pub duration_seconds: i32,
    pub hangup_cause: String,
    pub campaign_id: Option<i64>,
    pub campaign_item_id: Option<i64>,
}

/// Payment processor callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub track_id: String,
    pub status: String,
    pub amount: Option<Decimal>,
    pub tx_hash: Option<String>,
}

/// Result of handing one event to the reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// State changed and was committed
    Applied,
    /// Already applied earlier; nothing changed
    Duplicate,
    /// No call or payment matches the key
    UnknownKey,
    /// Recognised but carries nothing to apply (e.g. a failed payment status)
    Ignored,
    /// Contradicts the stored record
    Rejected(String),
}

impl ReconcileOutcome {
    /// Whether the event source should consider delivery successful
    pub fn is_accepted(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied | ReconcileOutcome::Duplicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dtmf(digit: &str, cause: Option<&str>) -> DtmfEvent {
        DtmfEvent {
            call_id: "c-1".to_string(),
            digit: digit.to_string(),
            duration_seconds: Some(12),
            hangup_cause: cause.map(str::to_string),
            campaign_id: Some(4),
            campaign_item_id: None,
        }
    }

    #[test]
    fn test_pressed_one() {
        assert!(dtmf("1", None).pressed_one());
        assert!(dtmf(" 1 ", None).pressed_one());
        assert!(!dtmf("2", None).pressed_one());
        assert!(!dtmf("", None).pressed_one());
        assert!(!dtmf("11", None).pressed_one());
    }

    #[test]
    fn test_combined_dtmf_hangup() {
        assert!(dtmf("1", None).as_hangup().is_none());

        let hangup = dtmf("1", Some("NORMAL_CLEARING")).as_hangup().unwrap();
        assert_eq!(hangup.call_id, "c-1");
        assert_eq!(hangup.duration_seconds, 12);
        assert_eq!(hangup.campaign_id, Some(4));
    }

    #[test]
    fn test_outcome_acceptance() {
        assert!(ReconcileOutcome::Applied.is_accepted());
        assert!(ReconcileOutcome::Duplicate.is_accepted());
        assert!(!ReconcileOutcome::UnknownKey.is_accepted());
        assert!(!ReconcileOutcome::Rejected("campaign mismatch".to_string()).is_accepted());
    }
}
