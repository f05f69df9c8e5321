//! Asterisk Manager Interface (AMI) integration for PressOne
//!
//! Implements the `SwitchClient` trait by issuing asynchronous `Originate`
//! actions over a single authenticated manager connection.
//!
//! # Architecture
//!
//! ```text
//!  OriginationGateway
//!         |
//!         v
//!    AmiClient (SwitchClient, lazy reconnect)
//!         |
//!         v
//!  AmiConnection (login, ActionID matching)
//!         |
//!         v
//!    AmiCodec (banner + blank-line framed blocks)
//!         |
//!         v
//!  Asterisk manager port (TCP 5038)
//! ```
//!
//! Lifecycle events (DTMF, hangup) do not come back over this connection;
//! the dialplan posts them to the HTTP webhooks.

pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod message;

pub use client::AmiClient;
pub use codec::{AmiCodec, AmiFrame};
pub use connection::AmiConnection;
pub use error::AmiError;
pub use message::AmiMessage;

/// AMI protocol constants
pub mod constants {
    pub const ACTION_LOGIN: &str = "Login";
    pub const ACTION_LOGOFF: &str = "Logoff";
    pub const ACTION_PING: &str = "Ping";
    pub const ACTION_ORIGINATE: &str = "Originate";

    /// Channel technology used for trunk endpoints
    pub const CHANNEL_TECH: &str = "PJSIP";

    /// Largest message block accepted before the stream is treated as garbage
    pub const MAX_FRAME_BYTES: usize = 64 * 1024;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(constants::ACTION_ORIGINATE, "Originate");
        assert!(constants::MAX_FRAME_BYTES >= 4096);
    }
}
