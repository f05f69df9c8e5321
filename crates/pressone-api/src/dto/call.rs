//! Call origination DTOs

use pressone_core::models::validate_channel_variable;
use pressone_services::OriginateRequest;
use serde::Deserialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

fn validate_variables(variables: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if variables.len() > 32 {
        return Err(ValidationError::new("too_many_variables"));
    }
    for (name, value) in variables {
        if let Err(reason) = validate_channel_variable(name, value) {
            let mut err = ValidationError::new("invalid_variable");
            err.message = Some(reason.into());
            return Err(err);
        }
    }
    Ok(())
}

/// Single outbound call outside any campaign
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OriginateCallRequest {
    /// Target account; operators may omit it
    pub account_id: Option<i64>,

    pub trunk_id: i64,

    #[validate(length(min = 1, max = 32, message = "Destination is required"))]
    pub destination: String,

    pub caller_id: Option<String>,

    /// Extra channel variables for the IVR
    #[serde(default)]
    #[validate(custom(function = "validate_variables"))]
    pub variables: BTreeMap<String, String>,
}

impl OriginateCallRequest {
    pub fn into_request(self, account_id: i64, caller_id: Option<String>) -> OriginateRequest {
        OriginateRequest {
            account_id,
            campaign_id: None,
            campaign_item_id: None,
            trunk_id: self.trunk_id,
            destination: self.destination,
            caller_id,
            variables: self.variables,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(variables: serde_json::Value) -> OriginateCallRequest {
        serde_json::from_value(json!({
            "trunk_id": 1,
            "destination": "15551230001",
            "variables": variables
        }))
        .unwrap()
    }

    #[test]
    fn test_plain_variables_pass() {
        assert!(request(json!({"LANG": "en", "PROMPT": "offer_2"})).validate().is_ok());
    }

    #[test]
    fn test_header_smuggling_is_rejected() {
        let req = request(json!({"X": "1\r\nChannel: PJSIP/15550009999@acct9_trunk"}));
        assert!(req.validate().is_err());

        let req = request(json!({"X\r\nChannel: PJSIP/1@acct9_trunk\r\nY": "1"}));
        assert!(req.validate().is_err());

        let req = request(json!({"TIMEOUT(absolute)": "99999"}));
        assert!(req.validate().is_err());
    }
}
