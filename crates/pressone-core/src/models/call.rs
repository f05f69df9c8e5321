//! Call model
//!
//! One record per outbound attempt, keyed by the correlation id handed to
//! the switch at origination. A call is settled once `billed_cost` is set;
//! after that nothing on the row changes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Call lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallState {
    /// Row created, origination not yet sent
    #[default]
    Queued,
    /// Origination request handed to the switch
    Originating,
    /// Answered without a DTMF result
    Answered,
    /// Answered and the callee pressed 1
    DtmfPressed,
    /// Answered and the callee pressed something else or nothing
    NoDtmf,
    NoAnswer,
    Busy,
    Failed,
}

impl CallState {
    pub const ALL: [CallState; 8] = [
        CallState::Queued,
        CallState::Originating,
        CallState::Answered,
        CallState::DtmfPressed,
        CallState::NoDtmf,
        CallState::NoAnswer,
        CallState::Busy,
        CallState::Failed,
    ];

    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Queued => "QUEUED",
            CallState::Originating => "ORIGINATING",
            CallState::Answered => "ANSWERED",
            CallState::DtmfPressed => "DTMF_PRESSED",
            CallState::NoDtmf => "NO_DTMF",
            CallState::NoAnswer => "NO_ANSWER",
            CallState::Busy => "BUSY",
            CallState::Failed => "FAILED",
        }
    }

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|state| state.as_str() == upper)
    }

    /// States a call can be in before the switch has reported anything final
    pub fn is_pending(&self) -> bool {
        matches!(self, CallState::Queued | CallState::Originating)
    }

    /// The callee picked up
    pub fn is_answered(&self) -> bool {
        matches!(
            self,
            CallState::Answered | CallState::DtmfPressed | CallState::NoDtmf
        )
    }

    /// Carries a DTMF result from the IVR
    pub fn has_dtmf(&self) -> bool {
        matches!(self, CallState::DtmfPressed | CallState::NoDtmf)
    }

    /// Apply a DTMF result to an unsettled call.
    ///
    /// Returns `None` when the annotation would not move the call forward:
    /// a pressed-1 result is never downgraded.
    pub fn annotate_dtmf(self, pressed_one: bool) -> Option<CallState> {
        match (self, pressed_one) {
            (CallState::DtmfPressed, _) => None,
            (CallState::NoDtmf, false) => None,
            (_, true) => Some(CallState::DtmfPressed),
            (_, false) => Some(CallState::NoDtmf),
        }
    }

    /// Final state once the hangup has been observed
    pub fn settle_with(self, outcome: HangupOutcome) -> CallState {
        if self.has_dtmf() {
            return self;
        }

        match outcome {
            HangupOutcome::Answered => CallState::Answered,
            HangupOutcome::Busy => CallState::Busy,
            HangupOutcome::NoAnswer => CallState::NoAnswer,
            HangupOutcome::Failed => CallState::Failed,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome classified from a switch hangup cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HangupOutcome {
    Answered,
    Busy,
    NoAnswer,
    Failed,
}

impl HangupOutcome {
    /// Map an Asterisk dial status or Q.850 cause to an outcome.
    ///
    /// Unknown causes are failures.
    pub fn from_hangup_cause(cause: &str) -> Self {
        match cause.trim().to_ascii_uppercase().as_str() {
            "ANSWER" | "ANSWERED" | "NORMAL_CLEARING" | "NORMAL" | "16" => {
                HangupOutcome::Answered
            }
            "BUSY" | "USER_BUSY" | "17" => HangupOutcome::Busy,
            "NOANSWER" | "NO_ANSWER" | "NO_USER_RESPONSE" | "CANCEL" | "18" | "19" => {
                HangupOutcome::NoAnswer
            }
            _ => HangupOutcome::Failed,
        }
    }
}

/// Call record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    /// Correlation id issued at origination
    pub call_id: String,
    pub campaign_id: Option<i64>,
    pub campaign_item_id: Option<i64>,
    pub account_id: i64,
    pub trunk_id: i64,
    pub destination: String,
    pub caller_id: Option<String>,
    pub state: CallState,
    pub duration_seconds: i32,
    /// Set exactly once, when the call is settled
    pub billed_cost: Option<Decimal>,
    pub hangup_cause: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Call {
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.billed_cost.is_some()
    }
}

impl Default for Call {
    fn default() -> Self {
        Self {
            call_id: String::new(),
            campaign_id: None,
            campaign_item_id: None,
            account_id: 0,
            trunk_id: 0,
            destination: String::new(),
            caller_id: None,
            state: CallState::Queued,
            duration_seconds: 0,
            billed_cost: None,
            hangup_cause: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            ended_at: None,
        }
    }
}

/// Data needed to insert a QUEUED call
#[derive(Debug, Clone)]
pub struct NewCall {
    pub call_id: String,
    pub campaign_id: Option<i64>,
    pub campaign_item_id: Option<i64>,
    pub account_id: i64,
    pub trunk_id: i64,
    pub destination: String,
    pub caller_id: Option<String>,
}

/// Strip everything but ASCII digits from a phone number
pub fn normalize_number(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// A dialable destination has 7 to 15 digits once formatting is removed
pub fn is_valid_destination(number: &str) -> bool {
    let digits = normalize_number(number);
    (7..=15).contains(&digits.len())
}

/// Check a caller-supplied channel variable before it reaches the switch
///
/// Names are `[A-Za-z0-9_]`, up to 64 characters, so they cannot call
/// dialplan functions. Values may not contain CR, LF or NUL and are capped
/// at 256 characters.
pub fn validate_channel_variable(name: &str, value: &str) -> Result<(), String> {
    if name.is_empty()
        || name.len() > 64
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(format!("invalid variable name {:?}", name));
    }
    if value.len() > 256 || value.contains(['\r', '\n', '\0']) {
        return Err(format!("invalid value for variable {}", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_variable_validation() {
        assert!(validate_channel_variable("LANG", "es").is_ok());
        assert!(validate_channel_variable("PROMPT_2", "welcome back").is_ok());
        assert!(validate_channel_variable("", "1").is_err());
        assert!(validate_channel_variable("TIMEOUT(absolute)", "1").is_err());
        assert!(validate_channel_variable("A=B", "1").is_err());
        assert!(validate_channel_variable(
            "X",
            "1\r\nChannel: PJSIP/15550009999@acct9_trunk"
        )
        .is_err());
        assert!(validate_channel_variable("X", "a\0b").is_err());
        assert!(validate_channel_variable("X", &"9".repeat(257)).is_err());
    }

    #[test]
    fn test_state_round_trip_strings() {
        for state in CallState::ALL {
            assert_eq!(CallState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(CallState::from_str("dtmf_pressed"), Some(CallState::DtmfPressed));
        assert_eq!(CallState::from_str("ringing"), None);
    }

    #[test]
    fn test_hangup_cause_mapping() {
        assert_eq!(HangupOutcome::from_hangup_cause("ANSWER"), HangupOutcome::Answered);
        assert_eq!(HangupOutcome::from_hangup_cause("normal_clearing"), HangupOutcome::Answered);
        assert_eq!(HangupOutcome::from_hangup_cause("16"), HangupOutcome::Answered);
        assert_eq!(HangupOutcome::from_hangup_cause("BUSY"), HangupOutcome::Busy);
        assert_eq!(HangupOutcome::from_hangup_cause("17"), HangupOutcome::Busy);
        assert_eq!(HangupOutcome::from_hangup_cause("NOANSWER"), HangupOutcome::NoAnswer);
        assert_eq!(HangupOutcome::from_hangup_cause("CANCEL"), HangupOutcome::NoAnswer);
        assert_eq!(HangupOutcome::from_hangup_cause("CONGESTION"), HangupOutcome::Failed);
        assert_eq!(HangupOutcome::from_hangup_cause("CHANUNAVAIL"), HangupOutcome::Failed);
        assert_eq!(HangupOutcome::from_hangup_cause("something else"), HangupOutcome::Failed);
        assert_eq!(HangupOutcome::from_hangup_cause(""), HangupOutcome::Failed);
    }

    #[test]
    fn test_dtmf_annotation_never_downgrades() {
        assert_eq!(
            CallState::Originating.annotate_dtmf(true),
            Some(CallState::DtmfPressed)
        );
        assert_eq!(
            CallState::Originating.annotate_dtmf(false),
            Some(CallState::NoDtmf)
        );
        assert_eq!(CallState::NoDtmf.annotate_dtmf(true), Some(CallState::DtmfPressed));
        assert_eq!(CallState::NoDtmf.annotate_dtmf(false), None);
        assert_eq!(CallState::DtmfPressed.annotate_dtmf(false), None);
        assert_eq!(CallState::DtmfPressed.annotate_dtmf(true), None);
    }

    #[test]
    fn test_settle_keeps_dtmf_annotation() {
        assert_eq!(
            CallState::DtmfPressed.settle_with(HangupOutcome::Answered),
            CallState::DtmfPressed
        );
        // a DTMF result means the call was answered whatever the cause says
        assert_eq!(
            CallState::NoDtmf.settle_with(HangupOutcome::Failed),
            CallState::NoDtmf
        );
        assert_eq!(
            CallState::Originating.settle_with(HangupOutcome::Busy),
            CallState::Busy
        );
        assert_eq!(
            CallState::Originating.settle_with(HangupOutcome::Answered),
            CallState::Answered
        );
    }

    #[test]
    fn test_destination_validation() {
        assert!(is_valid_destination("+1 (555) 123-4567"));
        assert!(is_valid_destination("5551234"));
        assert!(!is_valid_destination("12345"));
        assert!(!is_valid_destination("1234567890123456"));
        assert!(!is_valid_destination("not a number"));
    }
}
