use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_live::types::{ServerEvent, Setup};
use gemini_live::{Config, ServerRx};
use secrecy::SecretString;
use sudo_core::live_api::{LiveConnector, LiveLink};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

/// Opens live links through the `gemini_live` WebSocket client.
pub struct GeminiConnector {
    api_key: SecretString,
    base_url: Option<String>,
    capacity: usize,
}

impl GeminiConnector {
    pub fn new(api_key: SecretString, capacity: usize) -> Self {
        Self {
            api_key,
            base_url: None,
            capacity,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    fn client_config(&self, model: &str) -> Config {
        let builder = Config::builder(self.api_key.clone()).with_model(model);
        match &self.base_url {
            Some(base_url) => builder.with_base_url(base_url).build(),
            None => builder.build(),
        }
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(&self, setup: Setup) -> Result<LiveLink> {
        let config = self.client_config(setup.model());
        let mut client = gemini_live::connect_with_config(self.capacity, config)
            .await
            .context("Failed to connect to the live API")?;

        // Subscribe before the setup frame goes out so `Open` is not missed.
        let server_events = client.server_events()?;
        let outbound = client.sender()?;
        client
            .send_setup(setup)
            .await
            .context("Failed to send session setup")?;

        let (event_tx, event_rx) = mpsc::channel(self.capacity);
        let forwarder = tokio::spawn(forward_events(server_events, event_tx));

        Ok(LiveLink::new(outbound, event_rx).with_closer(move || {
            forwarder.abort();
            client.close();
        }))
    }
}

/// Moves broadcast events into the link's queue. Ends after the first
/// `Close`, or when either side goes away. Falling behind the broadcast is
/// fatal: dropped frames may hold tool calls that would never be answered.
pub async fn forward_events(mut server_events: ServerRx, event_tx: mpsc::Sender<ServerEvent>) {
    loop {
        match server_events.recv().await {
            Ok(event) => {
                let closing = matches!(event, ServerEvent::Close { .. });
                if event_tx.send(event).await.is_err() || closing {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::error!("Live event stream lagged by {} messages.", n);
                let _ = event_tx
                    .send(ServerEvent::Error {
                        message: format!("live event stream lagged by {n} messages"),
                    })
                    .await;
                break;
            }
            Err(RecvError::Closed) => {
                tracing::info!("Live event channel closed.");
                let _ = event_tx.send(ServerEvent::Close { reason: None }).await;
                break;
            }
        }
    }
    tracing::debug!("live event forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_live::types::ServerMessage;
    use tokio::sync::broadcast;

    #[tokio::test]
    async fn test_forward_events_in_order_until_close() {
        // Arrange
        let (server_tx, server_rx) = broadcast::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        server_tx.send(ServerEvent::Open).unwrap();
        server_tx
            .send(ServerEvent::Message(Box::new(ServerMessage::default())))
            .unwrap();
        server_tx
            .send(ServerEvent::Close {
                reason: Some("bye".to_string()),
            })
            .unwrap();
        server_tx.send(ServerEvent::Open).unwrap();

        // Act
        forward_events(server_rx, event_tx).await;

        // Assert
        assert_eq!(event_rx.recv().await, Some(ServerEvent::Open));
        assert!(matches!(event_rx.recv().await, Some(ServerEvent::Message(_))));
        assert_eq!(
            event_rx.recv().await,
            Some(ServerEvent::Close {
                reason: Some("bye".to_string())
            })
        );
        assert_eq!(event_rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_dropped_broadcast_becomes_close() {
        let (server_tx, server_rx) = broadcast::channel(8);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        drop(server_tx);

        forward_events(server_rx, event_tx).await;

        assert_eq!(
            event_rx.recv().await,
            Some(ServerEvent::Close { reason: None })
        );
    }

    #[tokio::test]
    async fn test_lagged_receiver_fails_the_link() {
        // Arrange
        let (server_tx, server_rx) = broadcast::channel(2);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let tool_call: ServerMessage = serde_json::from_value(serde_json::json!({
            "toolCall": {"functionCalls": [{"id": "c1", "name": "execute_command", "args": {"command": "ls"}}]}
        }))
        .unwrap();
        server_tx
            .send(ServerEvent::Message(Box::new(tool_call)))
            .unwrap();
        server_tx
            .send(ServerEvent::Message(Box::new(ServerMessage::default())))
            .unwrap();
        server_tx
            .send(ServerEvent::Close { reason: None })
            .unwrap();

        // Act
        forward_events(server_rx, event_tx).await;

        // Assert
        assert!(matches!(
            event_rx.recv().await,
            Some(ServerEvent::Error { message }) if message.contains("lagged by 1")
        ));
        assert_eq!(event_rx.recv().await, None);
    }
}
