//! Real-time gateway transport.
//!
//! A connection is a pair of channels: typed [`ClientMessage`]s go out,
//! raw JSON text frames come in. Decoding is left to the consumer so a
//! malformed frame can be dropped without touching the transport. The
//! inbound channel closing means the connection is gone.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use hearth_shared::protocol::ClientMessage;

use crate::error::{NetError, Result};

const CHANNEL_CAPACITY: usize = 256;

/// Live gateway connection. Dropping it tears the transport down.
pub struct GatewayConnection {
    outbound: mpsc::Sender<ClientMessage>,
    inbound: mpsc::Receiver<String>,
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayConnection {
    /// Wrap a channel pair. Transports that own background tasks attach them
    /// with [`GatewayConnection::with_tasks`].
    pub fn new(outbound: mpsc::Sender<ClientMessage>, inbound: mpsc::Receiver<String>) -> Self {
        Self {
            outbound,
            inbound,
            tasks: Vec::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks = tasks;
        self
    }

    pub async fn send(&self, message: ClientMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| NetError::Closed)
    }

    /// Extra sender for tasks that write alongside the main loop.
    pub fn sender(&self) -> mpsc::Sender<ClientMessage> {
        self.outbound.clone()
    }

    /// Next text frame, or `None` once the connection has closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

impl Drop for GatewayConnection {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<GatewayConnection>;
}

/// Gateway URL with the protocol version and encoding pinned.
pub fn gateway_url(base: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.query_pairs_mut()
        .append_pair("version", "1")
        .append_pair("format", "json");
    Ok(url)
}

/// [`Gateway`] over a WebSocket.
#[derive(Debug, Default, Clone)]
pub struct WsGateway;

#[async_trait]
impl Gateway for WsGateway {
    async fn connect(&self, url: &Url) -> Result<GatewayConnection> {
        info!(url = %url, "connecting to gateway");

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::channel::<ClientMessage>(CHANNEL_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json.into())).await {
                    warn!(error = %e, "gateway write failed");
                    break;
                }
            }
            let _ = write.close().await;
            debug!("gateway writer stopped");
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text.to_string(),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        info!(frame = ?frame, "gateway closed by server");
                        break;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "gateway read failed");
                        break;
                    }
                };
                if in_tx.send(text).await.is_err() {
                    break;
                }
            }
            debug!("gateway reader stopped");
        });

        Ok(GatewayConnection::new(out_tx, in_rx).with_tasks(vec![writer, reader]))
    }
}
