use crate::types::{self, ClientMessage, ServerEvent, ServerMessage};
use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

pub mod config;
mod consts;
mod utils;

pub type ClientTx = tokio::sync::mpsc::Sender<ClientMessage>;
type ServerTx = tokio::sync::broadcast::Sender<ServerEvent>;
pub type ServerRx = tokio::sync::broadcast::Receiver<ServerEvent>;

struct Connection {
    send_handle: tokio::task::JoinHandle<()>,
    recv_handle: tokio::task::JoinHandle<()>,
}

/// A client for the Gemini Live bidirectional streaming API.
///
/// Holds the capacity for its channels, the client/server transmitters and
/// the handles of the two tasks that own the WebSocket halves.
pub struct Client {
    capacity: usize,
    config: config::Config,
    c_tx: Option<ClientTx>,
    s_tx: Option<ServerTx>,
    connection: Option<Connection>,
}

impl Client {
    fn new(capacity: usize, config: config::Config) -> Self {
        Self {
            capacity,
            config,
            c_tx: None,
            s_tx: None,
            connection: None,
        }
    }

    async fn connect(&mut self) -> Result<()> {
        if self.c_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }

        let request = utils::build_request(&self.config)?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!("connected to live endpoint, model={}", self.config.model());

        let (mut write, mut read) = ws_stream.split();

        let (c_tx, mut c_rx) = tokio::sync::mpsc::channel::<ClientMessage>(self.capacity);
        let (s_tx, _) = tokio::sync::broadcast::channel(self.capacity);

        self.c_tx = Some(c_tx);
        self.s_tx = Some(s_tx.clone());

        // Drains the outbound queue into the socket until every sender is gone.
        let send_handle = tokio::spawn(async move {
            while let Some(message) = c_rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send message: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize message: {}", e);
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close socket: {}", e);
            }
        });

        // The live API delivers JSON in both text and binary frames.
        let recv_handle = tokio::spawn(async move {
            let mut close_reason = None;
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::error!("failed to read message: {}", e);
                        let _ = s_tx.send(ServerEvent::Error {
                            message: e.to_string(),
                        });
                        break;
                    }
                    Ok(message) => message,
                };
                let text = match message {
                    Message::Text(text) => text,
                    Message::Binary(bin) => match String::from_utf8(bin) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("unexpected non-utf8 binary message: {}", e);
                            continue;
                        }
                    },
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        close_reason = reason.map(|v| v.reason.to_string());
                        break;
                    }
                    _ => continue,
                };

                tracing::trace!("received frame: {}", utils::frame_kind(&text));
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        if let Err(e) = s_tx.send(ServerEvent::from_message(message)) {
                            tracing::debug!("no subscriber for server event: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to deserialize frame: {}, text=> {:?}", e, text);
                    }
                }
            }
            if let Err(e) = s_tx.send(ServerEvent::Close {
                reason: close_reason,
            }) {
                tracing::debug!("no subscriber for close event: {}", e);
            }
        });

        self.connection = Some(Connection {
            send_handle,
            recv_handle,
        });
        Ok(())
    }

    /// Subscribes to server events. Subscribe before sending the setup frame,
    /// otherwise `Open` may be missed.
    pub fn server_events(&self) -> Result<ServerRx> {
        match self.s_tx {
            Some(ref tx) => Ok(tx.subscribe()),
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// A handle onto the outbound queue, for producers that outlive a borrow
    /// of the client (capture taps, tool responders).
    pub fn sender(&self) -> Result<ClientTx> {
        self.c_tx
            .clone()
            .ok_or_else(|| anyhow::anyhow!("not connected yet"))
    }

    /// Sends the initial session configuration. Must be the first frame.
    pub async fn send_setup(&mut self, setup: types::Setup) -> Result<()> {
        match self.c_tx {
            Some(ref tx) => {
                tx.send(ClientMessage::Setup(setup)).await?;
                Ok(())
            }
            None => Err(anyhow::anyhow!("not connected yet")),
        }
    }

    /// Drops the outbound queue and stops both socket tasks. Idempotent.
    pub fn close(&mut self) {
        self.c_tx = None;
        self.s_tx = None;
        if let Some(connection) = self.connection.take() {
            connection.send_handle.abort();
            connection.recv_handle.abort();
            tracing::debug!("live connection tasks stopped");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

/// Creates a client with a specific config and connects it.
pub async fn connect_with_config(capacity: usize, config: config::Config) -> Result<Client> {
    let mut client = Client::new(capacity, config);
    client.connect().await?;
    Ok(client)
}
