//! WebSocket handler for ledger notifications
//!
//! Streams committed `LedgerEvent`s to connected clients. Operators only see
//! events of their own account; admins see everything.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures::StreamExt;
use pressone_auth::AuthenticatedUser;
use pressone_core::models::LedgerEvent;
use pressone_services::Notifier;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

/// Control messages; ledger events are sent as-is
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Sent once after the upgrade
    #[serde(rename = "connected")]
    Connected { account_id: Option<i64> },
    /// Notifications were dropped because the client fell behind
    #[serde(rename = "lagged")]
    Lagged { skipped: u64 },
    #[serde(rename = "pong")]
    Pong,
}

/// Which events a subscriber may receive
#[derive(Debug, Clone, Copy)]
struct EventFilter {
    account_id: Option<i64>,
    admin: bool,
}

impl EventFilter {
    fn allows(&self, event: &LedgerEvent) -> bool {
        self.admin || self.account_id == Some(event.account_id())
    }
}

/// WebSocket connection handler
///
/// GET /ws
pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    notifier: web::Data<Notifier>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let client_ip = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();

    let filter = EventFilter {
        account_id: user.account_id(),
        admin: user.is_admin(),
    };

    info!(
        client = %client_ip,
        subject = %user.subject,
        "WebSocket connection established"
    );

    // subscribe before spawning the session task
    let events = notifier.subscribe();
    actix_web::rt::spawn(async move {
        ws_session(session, msg_stream, events, filter, client_ip).await;
    });

    Ok(response)
}

async fn send_json<T: Serialize>(session: &mut Session, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => session.text(json).await.is_ok(),
        Err(e) => {
            error!("Failed to serialize websocket message: {}", e);
            true
        }
    }
}

/// Handle WebSocket session
async fn ws_session(
    mut session: Session,
    mut msg_stream: actix_ws::MessageStream,
    mut events: Receiver<LedgerEvent>,
    filter: EventFilter,
    client_ip: String,
) {
    let hello = WsMessage::Connected {
        account_id: filter.account_id,
    };
    if !send_json(&mut session, &hello).await {
        warn!(client = %client_ip, "Failed to send greeting, closing connection");
        return;
    }

    let mut ping_interval = interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            Some(msg) = msg_stream.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        debug!(client = %client_ip, "Received text: {}", text);
                        if text.contains("ping") && !send_json(&mut session, &WsMessage::Pong).await {
                            break;
                        }
                    }
                    Ok(Message::Ping(msg)) => {
                        if session.pong(&msg).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(reason)) => {
                        info!(client = %client_ip, "Client closed connection: {:?}", reason);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(client = %client_ip, "WebSocket error: {}", e);
                        break;
                    }
                }
            }

            received = events.recv() => {
                match received {
                    Ok(event) => {
                        if filter.allows(&event) && !send_json(&mut session, &event).await {
                            warn!(client = %client_ip, "Failed to send event, closing connection");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client = %client_ip, skipped, "WebSocket subscriber lagged");
                        if !send_json(&mut session, &WsMessage::Lagged { skipped }).await {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => {
                        info!(client = %client_ip, "Notifier closed");
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                if session.ping(b"").await.is_err() {
                    warn!(client = %client_ip, "Failed to send ping, closing connection");
                    break;
                }
            }
        }
    }

    info!(client = %client_ip, "WebSocket connection closed");
    let _ = session.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance_event(account_id: i64) -> LedgerEvent {
        LedgerEvent::BalanceChanged {
            account_id,
            credit_balance: dec!(4.5),
            reference: "T1".to_string(),
        }
    }

    #[test]
    fn test_operator_sees_only_own_account() {
        let filter = EventFilter {
            account_id: Some(3),
            admin: false,
        };
        assert!(filter.allows(&balance_event(3)));
        assert!(!filter.allows(&balance_event(4)));
    }

    #[test]
    fn test_admin_sees_everything() {
        let filter = EventFilter {
            account_id: None,
            admin: true,
        };
        assert!(filter.allows(&balance_event(3)));
        assert!(filter.allows(&balance_event(99)));
    }

    #[test]
    fn test_control_message_format() {
        let json = serde_json::to_string(&WsMessage::Lagged { skipped: 7 }).unwrap();
        assert_eq!(json, r#"{"type":"lagged","data":{"skipped":7}}"#);
    }
}
