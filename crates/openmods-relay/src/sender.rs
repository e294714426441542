//! Transport layer: delivering one event to one relay.
//!
//! The sender is an explicitly constructed, injected collaborator so the
//! publisher never reaches for hidden process-wide connection state and
//! tests can script a fake.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use openmods_core::Event;

use crate::error::{Result, SendError};

/// Delivers signed events to relays.
#[async_trait]
pub trait RelaySender: Send + Sync {
    /// Send the event to one relay and wait for its acknowledgement.
    /// Returns once the relay accepts; a rejection or transport failure
    /// is an error.
    async fn send(&self, relay: &str, event: &Event) -> Result<()>;

    /// Release pooled transport resources. Idempotent, and safe to call
    /// when nothing was ever published.
    async fn close(&self);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket sender with one pooled connection per relay.
///
/// Connections are shared across concurrent endpoint tasks; each relay's
/// stream is guarded by its own lock so one slow relay never serializes
/// the rest.
pub struct WsRelaySender {
    connections: Mutex<HashMap<String, Arc<Mutex<WsStream>>>>,
}

impl WsRelaySender {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Get or establish the pooled connection for a relay.
    async fn connection(&self, relay: &str) -> Result<Arc<Mutex<WsStream>>> {
        let url = Url::parse(relay)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(SendError::InvalidUrl(format!(
                "URL must use ws:// or wss:// scheme, got: {}",
                url.scheme()
            )));
        }

        {
            let connections = self.connections.lock().await;
            if let Some(conn) = connections.get(relay) {
                return Ok(Arc::clone(conn));
            }
        }

        debug!("Connecting to relay: {}", relay);
        let (stream, _) = connect_async(relay)
            .await
            .map_err(|e| SendError::WebSocket(e.to_string()))?;

        let conn = Arc::new(Mutex::new(stream));
        let mut connections = self.connections.lock().await;
        // A concurrent task may have connected meanwhile; keep the first.
        Ok(Arc::clone(
            connections
                .entry(relay.to_string())
                .or_insert_with(|| Arc::clone(&conn)),
        ))
    }

    /// Drop a pooled connection after a transport failure so the next
    /// attempt reconnects.
    async fn evict(&self, relay: &str) {
        self.connections.lock().await.remove(relay);
    }

    /// Wait for the OK acknowledging `event_id` on an open stream.
    async fn await_ok(stream: &mut WsStream, event_id: &str) -> Result<()> {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    let value: Value = serde_json::from_str(text.as_str())?;
                    let Some(arr) = value.as_array() else {
                        continue;
                    };
                    if arr.first().and_then(Value::as_str) != Some("OK") {
                        continue;
                    }
                    if arr.len() < 4 {
                        return Err(SendError::Protocol(
                            "OK message requires at least 4 elements".into(),
                        ));
                    }
                    if arr[1].as_str() != Some(event_id) {
                        continue;
                    }
                    let accepted = arr[2].as_bool().ok_or_else(|| {
                        SendError::Protocol("OK accepted field must be a boolean".into())
                    })?;
                    let message = arr[3].as_str().unwrap_or_default().to_string();
                    return if accepted {
                        Ok(())
                    } else {
                        Err(SendError::Rejected(message))
                    };
                }
                Some(Ok(Message::Ping(data))) => {
                    stream
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| SendError::WebSocket(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Err(SendError::ConnectionClosed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(SendError::WebSocket(e.to_string())),
            }
        }
    }
}

impl Default for WsRelaySender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelaySender for WsRelaySender {
    async fn send(&self, relay: &str, event: &Event) -> Result<()> {
        let conn = self.connection(relay).await?;
        let msg_text = serde_json::to_string(&json!(["EVENT", event]))?;
        debug!("Sending to {}: {}", relay, msg_text);

        let result = {
            let mut stream = conn.lock().await;
            match stream.send(Message::Text(msg_text.into())).await {
                Ok(()) => Self::await_ok(&mut stream, &event.id).await,
                Err(e) => Err(SendError::WebSocket(e.to_string())),
            }
        };

        if let Err(e) = &result {
            match e {
                // The relay answered; the connection is still usable.
                SendError::Rejected(_) => {}
                _ => {
                    warn!("Dropping connection to {} after error: {}", relay, e);
                    self.evict(relay).await;
                }
            }
        }

        result
    }

    async fn close(&self) {
        let connections: Vec<(String, Arc<Mutex<WsStream>>)> =
            self.connections.lock().await.drain().collect();
        for (relay, conn) in connections {
            let mut stream = conn.lock().await;
            if let Err(e) = stream.close(None).await {
                debug!("Error closing connection to {}: {}", relay, e);
            }
        }
    }
}
