//! Webhook payloads
//!
//! Wire formats posted by the Asterisk dialplan and the Oxapay payment
//! processor, and the acknowledgement returned to them.

use pressone_core::models::{DtmfEvent, HangupEvent, PaymentEvent, ReconcileOutcome};
use pressone_core::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTMF report from the IVR
///
/// The dialplan sends either `digit` or the legacy integer `dtmf_pressed`.
/// A payload that also carries `hangup_cause` is the call's final event.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DtmfWebhookPayload {
    #[validate(length(min = 1, max = 128))]
    pub call_id: String,

    #[serde(default)]
    pub digit: Option<String>,

    #[serde(default, deserialize_with = "deserialize_digit")]
    pub dtmf_pressed: Option<String>,

    #[serde(default, alias = "duration_seconds")]
    #[validate(range(min = 0))]
    pub duration: Option<i32>,

    #[serde(default)]
    pub hangup_cause: Option<String>,

    #[serde(default)]
    pub campaign_id: Option<i64>,

    #[serde(default)]
    pub campaign_item_id: Option<i64>,
}

impl DtmfWebhookPayload {
    pub fn into_event(self) -> Result<DtmfEvent, AppError> {
        let digit = self
            .digit
            .or(self.dtmf_pressed)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::InvalidInput("digit is required".to_string()))?;

        Ok(DtmfEvent {
            call_id: self.call_id,
            digit,
            duration_seconds: self.duration,
            hangup_cause: self.hangup_cause.filter(|c| !c.trim().is_empty()),
            campaign_id: self.campaign_id,
            campaign_item_id: self.campaign_item_id,
        })
    }
}

/// Final event of a call
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HangupWebhookPayload {
    #[validate(length(min = 1, max = 128))]
    pub call_id: String,

    /// Billable seconds; absent for calls that never connected
    #[serde(default, alias = "duration_seconds", alias = "billsec")]
    #[validate(range(min = 0))]
    pub duration: i32,

    #[serde(alias = "cause")]
    #[validate(length(min = 1, max = 64))]
    pub hangup_cause: String,

    #[serde(default)]
    pub campaign_id: Option<i64>,

    #[serde(default)]
    pub campaign_item_id: Option<i64>,
}

impl From<HangupWebhookPayload> for HangupEvent {
    fn from(payload: HangupWebhookPayload) -> Self {
        Self {
            call_id: payload.call_id,
            duration_seconds: payload.duration,
            hangup_cause: payload.hangup_cause,
            campaign_id: payload.campaign_id,
            campaign_item_id: payload.campaign_item_id,
        }
    }
}

/// Oxapay payment callback
///
/// The tracking key arrives as `trackId`, `track_id` or `orderId`, in that
/// order of preference.
#[derive(Debug, Clone, Deserialize)]
pub struct OxapayWebhookPayload {
    #[serde(default, rename = "trackId")]
    pub track_id_camel: Option<String>,

    #[serde(default)]
    pub track_id: Option<String>,

    #[serde(default, rename = "orderId")]
    pub order_id: Option<String>,

    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub amount: Option<Decimal>,

    #[serde(default, rename = "txID", alias = "tx_hash")]
    pub tx_hash: Option<String>,
}

impl OxapayWebhookPayload {
    pub fn into_event(self) -> Result<PaymentEvent, AppError> {
        let track_id = [self.track_id_camel, self.track_id, self.order_id]
            .into_iter()
            .flatten()
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
            .ok_or_else(|| AppError::InvalidInput("trackId is required".to_string()))?;

        Ok(PaymentEvent {
            track_id,
            status: self.status,
            amount: self.amount,
            tx_hash: self.tx_hash.filter(|h| !h.is_empty()),
        })
    }
}

/// Acknowledgement returned to webhook callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            reason: None,
        }
    }

    pub fn ignored(reason: impl Into<String>) -> Self {
        Self {
            status: "ignored".to_string(),
            reason: Some(reason.into()),
        }
    }
}

impl From<ReconcileOutcome> for WebhookAck {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Applied | ReconcileOutcome::Duplicate => Self::ok(),
            ReconcileOutcome::UnknownKey => Self::ignored("unknown key"),
            ReconcileOutcome::Ignored => Self::ignored("nothing to apply"),
            ReconcileOutcome::Rejected(reason) => Self::ignored(reason),
        }
    }
}

/// Accept a DTMF digit as either a JSON string or an integer
fn deserialize_digit<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct DigitVisitor;

    impl<'de> Visitor<'de> for DigitVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a digit as an integer or a string")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(value.to_string()))
        }
    }

    deserializer.deserialize_any(DigitVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_legacy_integer_digit() {
        let payload: DtmfWebhookPayload =
            serde_json::from_str(r#"{"call_id": "c-1", "dtmf_pressed": 1}"#).unwrap();
        let event = payload.into_event().unwrap();
        assert_eq!(event.digit, "1");
        assert!(event.pressed_one());
        assert!(event.hangup_cause.is_none());
    }

    #[test]
    fn test_digit_wins_over_legacy_field() {
        let payload: DtmfWebhookPayload = serde_json::from_str(
            r#"{"call_id": "c-1", "digit": "2", "dtmf_pressed": "1", "hangup_cause": "NORMAL_CLEARING", "duration": 14}"#,
        )
        .unwrap();
        let event = payload.into_event().unwrap();
        assert_eq!(event.digit, "2");
        assert!(!event.pressed_one());

        let hangup = event.as_hangup().unwrap();
        assert_eq!(hangup.duration_seconds, 14);
    }

    #[test]
    fn test_dtmf_without_digit_is_invalid() {
        let payload: DtmfWebhookPayload =
            serde_json::from_str(r#"{"call_id": "c-1", "dtmf_pressed": null}"#).unwrap();
        assert!(matches!(
            payload.into_event(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_oxapay_key_preference() {
        let payload: OxapayWebhookPayload = serde_json::from_str(
            r#"{"orderId": "O-9", "trackId": "T1", "status": "Paid", "amount": 20, "txID": "0xabc"}"#,
        )
        .unwrap();
        let event = payload.into_event().unwrap();
        assert_eq!(event.track_id, "T1");
        assert_eq!(event.amount, Some(dec!(20)));
        assert_eq!(event.tx_hash.as_deref(), Some("0xabc"));

        let payload: OxapayWebhookPayload =
            serde_json::from_str(r#"{"orderId": "O-9", "status": "paid"}"#).unwrap();
        assert_eq!(payload.into_event().unwrap().track_id, "O-9");

        let payload: OxapayWebhookPayload =
            serde_json::from_str(r#"{"status": "paid"}"#).unwrap();
        assert!(payload.into_event().is_err());
    }

    #[test]
    fn test_ack_from_outcome() {
        assert_eq!(WebhookAck::from(ReconcileOutcome::Duplicate), WebhookAck::ok());
        let ack = WebhookAck::from(ReconcileOutcome::Rejected("campaign mismatch".into()));
        assert_eq!(ack.status, "ignored");
        assert_eq!(ack.reason.as_deref(), Some("campaign mismatch"));
    }
}
