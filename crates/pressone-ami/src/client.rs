//! Switch client over the manager interface
//!
//! One lazily opened connection is shared by every caller behind an async
//! mutex. Any transport error drops it, so the next action reconnects.

use crate::connection::AmiConnection;
use crate::constants::{ACTION_ORIGINATE, ACTION_PING, CHANNEL_TECH};
use crate::error::AmiError;
use crate::message::AmiMessage;
use async_trait::async_trait;
use pressone_core::config::{AmiConfig, DialerConfig};
use pressone_core::models::validate_channel_variable;
use pressone_core::traits::{OriginateCommand, OriginateOutcome, SwitchClient};
use pressone_core::{AppError, AppResult};
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

pub struct AmiClient {
    config: AmiConfig,
    context: String,
    originate_timeout_ms: u64,
    max_call_secs: u64,
    connection: Mutex<Option<AmiConnection>>,
}

impl fmt::Debug for AmiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmiClient")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .field("secret", &"[REDACTED]")
            .field("context", &self.context)
            .finish()
    }
}

impl AmiClient {
    pub fn new(config: AmiConfig, dialer: &DialerConfig) -> Self {
        Self {
            config,
            context: dialer.ivr_context.clone(),
            originate_timeout_ms: dialer.originate_timeout_ms,
            max_call_secs: dialer.max_call_secs,
            connection: Mutex::new(None),
        }
    }

    /// Build the Originate action for a call
    ///
    /// The channel dials `{destination}` through the trunk endpoint and, once
    /// answered, drops into the IVR context at the destination extension.
    /// `TIMEOUT(absolute)` caps the call so the switch always hangs up, and
    /// reports, before the stale-call sweeper would give up on it.
    ///
    /// Caller-supplied variables are checked here as well; a name or value
    /// that could forge a header fails with `InvalidHeader`.
    pub fn build_originate(&self, command: &OriginateCommand) -> Result<AmiMessage, AmiError> {
        for (key, value) in &command.variables {
            validate_channel_variable(key, value).map_err(AmiError::InvalidHeader)?;
        }

        let mut action = AmiMessage::action(ACTION_ORIGINATE)
            .with_header(
                "Channel",
                format!("{}/{}@{}", CHANNEL_TECH, command.destination, command.endpoint),
            )
            .with_header("Context", self.context.as_str())
            .with_header("Exten", command.destination.as_str())
            .with_header("Priority", "1")
            .with_header("Timeout", self.originate_timeout_ms.to_string())
            .with_header("Async", "true")
            .with_header("ChannelId", command.call_id.as_str())
            .with_header(
                "Variable",
                format!("TIMEOUT(absolute)={}", self.max_call_secs),
            );

        if let Some(caller_id) = &command.caller_id {
            action.push_header("CallerID", caller_id.as_str());
        }

        for (key, value) in &command.variables {
            action.push_header("Variable", format!("{}={}", key, value));
        }

        // every field must survive framing, including the ones built from trunk data
        action.to_wire()?;
        Ok(action)
    }

    /// Run one action on the shared connection, reconnecting if needed
    async fn execute(&self, action: AmiMessage) -> Result<AmiMessage, AmiError> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            let conn = AmiConnection::connect(
                &self.config.host,
                self.config.port,
                &self.config.username,
                &self.config.secret,
                Duration::from_secs(self.config.connect_timeout_secs),
                Duration::from_secs(self.config.action_timeout_secs),
            )
            .await?;
            *guard = Some(conn);
        }

        let Some(conn) = guard.as_mut() else {
            return Err(AmiError::Closed);
        };

        match conn.send_action(action).await {
            Ok(reply) => Ok(reply),
            // rejected by the encoder before anything was written
            Err(e @ AmiError::InvalidHeader(_)) => Err(e),
            Err(e) => {
                warn!("Dropping manager connection to {}: {}", conn.server_id(), e);
                *guard = None;
                Err(e)
            }
        }
    }

    /// Round-trip a Ping action
    #[instrument(skip(self))]
    pub async fn ping(&self) -> AppResult<()> {
        let reply = self.execute(AmiMessage::action(ACTION_PING)).await?;
        if reply.is_success() {
            Ok(())
        } else {
            Err(AppError::SwitchProtocol(format!("unexpected ping reply: {}", reply)))
        }
    }

    /// Log off and close the shared connection
    pub async fn shutdown(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            info!("Closing manager connection to {}", conn.server_id());
            conn.logoff().await;
        }
    }
}

#[async_trait]
impl SwitchClient for AmiClient {
    #[instrument(skip(self, command), fields(call_id = %command.call_id))]
    async fn originate(&self, command: &OriginateCommand) -> AppResult<OriginateOutcome> {
        let action = self.build_originate(command)?;
        let reply = self.execute(action).await?;

        if reply.is_success() {
            debug!("Originate queued for {}", command.destination);
            Ok(OriginateOutcome::Accepted)
        } else {
            let reason = reply
                .message()
                .unwrap_or("originate rejected")
                .to_string();
            warn!("Switch rejected originate to {}: {}", command.destination, reason);
            Ok(OriginateOutcome::Rejected { reason })
        }
    }
}
