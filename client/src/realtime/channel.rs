//! WebSocket connection to the realtime endpoint.

use std::sync::Arc;

use futures::{SinkExt, Stream, StreamExt};
use stockroom_engine::EntityKind;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};

use super::protocol::{decode, Inbound};
use super::registry::{SubscriberRegistry, Subscription};
use crate::error::Result;

/// An open realtime connection.
///
/// Owns a reader task that publishes decoded frames to the registry and a
/// writer task that sends pongs and the closing handshake. When the reader
/// stops, every subscription stream ends.
#[derive(Debug)]
pub struct RealtimeChannel {
    conn_id: String,
    registry: Arc<SubscriberRegistry>,
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Connect to `url` with a fresh registry.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, SubscriberRegistry::new_shared()).await
    }

    /// Connect to `url`, publishing into an existing registry.
    pub async fn connect_with(url: &str, registry: Arc<SubscriberRegistry>) -> Result<Self> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let conn_id = uuid::Uuid::new_v4().to_string();

        // The URL carries the credential, so it is not logged.
        tracing::info!(conn_id = %conn_id, "Realtime channel connected");

        let (mut ws_sender, ws_receiver) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = ws_sender.send(msg).await {
                    tracing::warn!("Failed to send WebSocket message: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = tokio::spawn(read_loop(
            ws_receiver,
            tx.clone(),
            Arc::clone(&registry),
            conn_id.clone(),
        ));

        Ok(Self {
            conn_id,
            registry,
            outbound: tx,
            reader,
            writer,
        })
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Receive every notification for `target` from now on.
    pub fn subscribe(&self, target: EntityKind) -> Subscription {
        self.registry.subscribe(target)
    }

    /// Whether the reader has stopped.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Send the closing handshake and stop both tasks.
    pub async fn close(mut self) {
        if self.outbound.send(Message::Close(None)).is_ok() {
            let _ = (&mut self.writer).await;
        }
        self.reader.abort();
        self.registry.close_all();
        tracing::info!(conn_id = %self.conn_id, "Realtime channel closed by client");
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// Read frames until the server closes or the transport fails.
async fn read_loop<S>(
    mut ws_receiver: S,
    outbound: mpsc::UnboundedSender<Message>,
    registry: Arc<SubscriberRegistry>,
    conn_id: String,
) where
    S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    let mut frames = 0usize;

    while let Some(result) = ws_receiver.next().await {
        let message = match result {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        };

        match decode(message) {
            Inbound::Change(notification) => {
                frames += 1;
                registry.publish(&notification);
            }
            Inbound::Ping(payload) => {
                let _ = outbound.send(Message::Pong(payload));
            }
            Inbound::Close => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Inbound::Skip(reason) => {
                tracing::debug!(conn_id = %conn_id, reason = %reason, "Frame skipped");
            }
        }
    }

    registry.close_all();
    tracing::info!(
        conn_id = %conn_id,
        frames = frames,
        "Realtime channel disconnected"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::json;
    use stockroom_engine::Action;

    fn text(value: serde_json::Value) -> std::result::Result<Message, tungstenite::Error> {
        Ok(Message::Text(value.to_string()))
    }

    #[tokio::test]
    async fn test_read_loop_dispatches_and_answers_pings() {
        let registry = SubscriberRegistry::new_shared();
        let mut docs = registry.subscribe(EntityKind::DocsWarehouse);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let frames = stream::iter(vec![
            text(json!({"target": "docs_warehouse", "action": "edit", "result": [{"id": 1}]})),
            Ok(Message::Ping(vec![7])),
            text(json!({"target": "warehouses", "action": "create", "result": [{"id": 2}]})),
            Ok(Message::Text("garbage".to_string())),
            text(json!({"target": "docs_warehouse", "action": "delete", "result": [1]})),
        ]);

        read_loop(frames, tx, Arc::clone(&registry), "test".to_string()).await;

        assert_eq!(docs.recv().await.map(|n| n.action), Some(Action::Edit));
        assert_eq!(docs.recv().await.map(|n| n.action), Some(Action::Delete));
        // Stream ended, so the subscription closes.
        assert!(docs.recv().await.is_none());

        assert_eq!(rx.recv().await, Some(Message::Pong(vec![7])));
    }

    #[tokio::test]
    async fn test_read_loop_stops_on_close() {
        let registry = SubscriberRegistry::new_shared();
        let mut docs = registry.subscribe(EntityKind::DocsSales);
        let (tx, _rx) = mpsc::unbounded_channel();

        let frames = stream::iter(vec![
            Ok(Message::Close(None)),
            text(json!({"target": "docs_sales", "action": "edit", "result": [{"id": 1}]})),
        ]);

        read_loop(frames, tx, registry, "test".to_string()).await;
        assert!(docs.recv().await.is_none());
    }
}
