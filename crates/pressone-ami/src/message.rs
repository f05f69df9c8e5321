//! AMI message parsing and representation
//!
//! Manager messages are blocks of `Key: Value` lines terminated by an empty
//! line. Actions, responses and events share the same shape; only the first
//! header tells them apart. Keys may repeat (`Variable` on Originate), so
//! headers keep their order instead of living in a map.

use crate::error::AmiError;
use std::fmt;

/// A header key or value would break the line framing
fn check_field(kind: &str, field: &str) -> Result<(), AmiError> {
    if field.contains(['\r', '\n', '\0']) {
        return Err(AmiError::InvalidHeader(format!(
            "{} {:?} contains a line break or NUL",
            kind, field
        )));
    }
    Ok(())
}

/// A single AMI action, response or event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmiMessage {
    headers: Vec<(String, String)>,
}

impl AmiMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an action message (`Action: <name>`)
    pub fn action(name: &str) -> Self {
        Self::new().with_header("Action", name)
    }

    /// Builder-style header append
    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.push_header(key, value);
        self
    }

    /// Append a header, keeping any existing one with the same key
    pub fn push_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.push((key.to_string(), value.into()));
    }

    /// Replace every header with this key by a single value
    pub fn set_header(&mut self, key: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self.push_header(key, value);
    }

    /// Parse a message from its text block (without the terminating blank line)
    ///
    /// Lines without a colon are kept under an empty key so command output
    /// (`Response: Follows`) is not lost.
    pub fn parse(raw: &str) -> Self {
        let headers = raw
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(|line| match line.split_once(':') {
                Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
                None => (String::new(), line.to_string()),
            })
            .collect();

        Self { headers }
    }

    /// First value of a header, matched case-insensitively
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a repeated header
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// `Response` header (Success, Error, Goodbye, Follows)
    pub fn response(&self) -> Option<&str> {
        self.get_header("Response")
    }

    /// `Event` header; set only on unsolicited events
    pub fn event_name(&self) -> Option<&str> {
        self.get_header("Event")
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get_header("ActionID")
    }

    /// Human readable `Message` header
    pub fn message(&self) -> Option<&str> {
        self.get_header("Message")
    }

    pub fn is_event(&self) -> bool {
        self.event_name().is_some()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.response(), Some(r) if r.eq_ignore_ascii_case("success"))
    }

    /// Serialize to the wire format, including the terminating blank line
    ///
    /// Fails if a key or value contains CR, LF or NUL, which would let it
    /// forge extra headers or a second action.
    pub fn to_wire(&self) -> Result<String, AmiError> {
        let mut out = String::with_capacity(self.headers.len() * 24 + 2);
        for (key, value) in &self.headers {
            check_field("header", key)?;
            check_field("value", value)?;
            if key.is_empty() || key.contains(':') {
                return Err(AmiError::InvalidHeader(format!("bad header name {:?}", key)));
            }
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        Ok(out)
    }
}

impl fmt::Display for AmiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(event) = self.event_name() {
            write!(f, "AmiEvent({})", event)
        } else if let Some(response) = self.response() {
            write!(
                f,
                "AmiResponse({}, {})",
                response,
                self.message().unwrap_or("-")
            )
        } else if let Some(action) = self.get_header("Action") {
            write!(f, "AmiAction({})", action)
        } else {
            write!(f, "AmiMessage({} headers)", self.headers.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let raw = "Response: Success\r\nActionID: 7\r\nMessage: Originate successfully queued\r\n";
        let msg = AmiMessage::parse(raw);

        assert!(msg.is_success());
        assert!(!msg.is_event());
        assert_eq!(msg.action_id(), Some("7"));
        assert_eq!(msg.message(), Some("Originate successfully queued"));
        assert_eq!(msg.get_header("actionid"), Some("7"));
    }

    #[test]
    fn test_parse_event_with_colon_in_value() {
        let msg = AmiMessage::parse("Event: Newchannel\r\nChannel: PJSIP/acme-00000001\r\nUniqueid: 1700000000.12\r\n");
        assert_eq!(msg.event_name(), Some("Newchannel"));
        assert_eq!(msg.get_header("Uniqueid"), Some("1700000000.12"));

        let msg = AmiMessage::parse("Response: Error\r\nMessage: Channel: not found\r\n");
        assert!(!msg.is_success());
        assert_eq!(msg.message(), Some("Channel: not found"));
    }

    #[test]
    fn test_repeated_headers_keep_order() {
        let msg = AmiMessage::action("Originate")
            .with_header("Variable", "A=1")
            .with_header("Variable", "B=2");

        assert_eq!(msg.get_all("Variable"), vec!["A=1", "B=2"]);
        assert_eq!(
            msg.to_wire().unwrap(),
            "Action: Originate\r\nVariable: A=1\r\nVariable: B=2\r\n\r\n"
        );
    }

    #[test]
    fn test_line_breaks_never_reach_the_wire() {
        let msg = AmiMessage::action("Originate")
            .with_header("Channel", "PJSIP/15551230001@acct1_trunk")
            .with_header("Variable", "X=1\r\nChannel: PJSIP/15550009999@acct9_trunk");
        assert!(matches!(msg.to_wire(), Err(AmiError::InvalidHeader(_))));

        let msg = AmiMessage::action("Ping").with_header("ActionID", "1\r\n\r\nAction: Logoff");
        assert!(msg.to_wire().is_err());

        let msg = AmiMessage::action("Ping").with_header("ActionID", "a\0b");
        assert!(msg.to_wire().is_err());

        let msg = AmiMessage::action("Ping").with_header("Bad: Key", "1");
        assert!(msg.to_wire().is_err());
    }

    #[test]
    fn test_set_header_replaces() {
        let mut msg = AmiMessage::action("Ping").with_header("ActionID", "1");
        msg.set_header("ActionID", "2");
        assert_eq!(msg.get_all("ActionID"), vec!["2"]);
        assert_eq!(msg.to_string(), "AmiAction(Ping)");
    }
}
