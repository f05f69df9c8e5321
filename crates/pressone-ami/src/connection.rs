//! Authenticated manager connection
//!
//! Owns one TCP stream. Actions are sent one at a time; while waiting for a
//! reply, unsolicited events and replies to other action ids are skipped.

use crate::codec::{AmiCodec, AmiFrame};
use crate::constants::{ACTION_LOGIN, ACTION_LOGOFF};
use crate::error::AmiError;
use crate::message::AmiMessage;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

pub struct AmiConnection {
    framed: Framed<TcpStream, AmiCodec>,
    server_id: String,
    banner: String,
    next_action_id: u64,
    action_timeout: Duration,
}

impl AmiConnection {
    /// Connect, read the banner and log in
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        secret: &str,
        connect_timeout: Duration,
        action_timeout: Duration,
    ) -> Result<Self, AmiError> {
        let server_id = format!("{}:{}", host, port);
        info!("Connecting to manager interface: {}", server_id);

        let stream = timeout(connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| AmiError::Timeout("connect"))??;
        stream.set_nodelay(true)?;

        let mut framed = Framed::new(stream, AmiCodec::new());

        let banner = match timeout(connect_timeout, framed.next())
            .await
            .map_err(|_| AmiError::Timeout("banner"))?
        {
            Some(Ok(AmiFrame::Greeting(banner))) => banner,
            Some(Ok(AmiFrame::Message(msg))) => {
                return Err(AmiError::Protocol(format!("expected banner, got {}", msg)))
            }
            Some(Err(e)) => return Err(e),
            None => return Err(AmiError::Closed),
        };

        if !banner.contains("Call Manager") {
            warn!("Unexpected manager banner from {}: {}", server_id, banner);
        }
        debug!("Received banner from {}: {}", server_id, banner);

        let mut conn = Self {
            framed,
            server_id,
            banner,
            next_action_id: 1,
            action_timeout,
        };

        let login = AmiMessage::action(ACTION_LOGIN)
            .with_header("Username", username)
            .with_header("Secret", secret)
            .with_header("Events", "off");

        let reply = conn.send_action(login).await?;
        if !reply.is_success() {
            return Err(AmiError::LoginRejected(
                reply.message().unwrap_or("no message").to_string(),
            ));
        }

        info!("Authenticated to manager interface: {}", conn.server_id);
        Ok(conn)
    }

    /// Send an action and wait for its response
    ///
    /// Any `ActionID` already on the message is replaced.
    pub async fn send_action(&mut self, mut action: AmiMessage) -> Result<AmiMessage, AmiError> {
        let action_id = self.next_action_id.to_string();
        self.next_action_id += 1;
        action.set_header("ActionID", action_id.clone());

        debug!("Sending {} to {}", action, self.server_id);
        self.framed.send(action).await?;

        timeout(self.action_timeout, self.await_reply(&action_id))
            .await
            .map_err(|_| AmiError::Timeout("action response"))?
    }

    async fn await_reply(&mut self, action_id: &str) -> Result<AmiMessage, AmiError> {
        loop {
            match self.framed.next().await {
                Some(Ok(AmiFrame::Message(msg))) => {
                    if msg.is_event() {
                        debug!("Skipping event while waiting for response: {}", msg);
                        continue;
                    }
                    match msg.action_id() {
                        Some(id) if id == action_id => return Ok(msg),
                        // Some builds omit ActionID on errors
                        None if msg.response().is_some() => return Ok(msg),
                        _ => {
                            debug!("Skipping response for another action: {}", msg);
                            continue;
                        }
                    }
                }
                Some(Ok(AmiFrame::Greeting(_))) => {
                    return Err(AmiError::Protocol("unexpected second banner".to_string()))
                }
                Some(Err(e)) => return Err(e),
                None => return Err(AmiError::Closed),
            }
        }
    }

    /// Log off politely; errors are ignored since the socket is dropped anyway
    pub async fn logoff(mut self) {
        if let Err(e) = self.send_action(AmiMessage::action(ACTION_LOGOFF)).await {
            debug!("Logoff from {} failed: {}", self.server_id, e);
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }
}
