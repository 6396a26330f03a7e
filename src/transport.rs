//! Transport seam for the connection layer.
//!
//! [`Transport`] abstracts a connected bidirectional text channel so the
//! client loop can run against a real WebSocket or a scripted test
//! double. [`WsTransport`] is the production implementation; it owns the
//! only socket in the process and is the only place one is opened or
//! closed.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// How many times to try establishing the connection.
pub const CONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between connection attempts.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection-layer errors.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Every connection attempt failed; the session is unrecoverable
    /// without a manual restart.
    #[error("connection failed after {attempts} attempts: {source}")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    /// The connection (or the client driving it) is gone.
    #[error("connection closed")]
    Closed,
}

/// A connected text channel.
///
/// `recv` returns `None` on clean close and `Some(Err(_))` on failure;
/// either way the transport is finished afterwards.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, message: String) -> Result<(), NetError>;
    async fn recv(&mut self) -> Option<Result<String, NetError>>;
    async fn close(&mut self) -> Result<(), NetError>;
}

/// Re-establishes a transport after the previous one dropped.
///
/// Implementations apply their own retry bound; exhausting it returns
/// [`NetError::ConnectFailed`].
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self) -> Result<Box<dyn Transport>, NetError>;
}

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsTransport {
    /// Connect with the default retry bound and delay.
    pub async fn connect(url: &str) -> Result<Self, NetError> {
        Self::connect_with(url, CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY).await
    }

    /// Connect, retrying up to `attempts` times with a fixed `delay`
    /// between tries.
    pub async fn connect_with(
        url: &str,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, NetError> {
        let attempts = attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            match connect_async(url).await {
                Ok((stream, _response)) => {
                    debug!("connected to {url} on attempt {attempt}");
                    return Ok(Self { stream });
                }
                Err(e) => {
                    warn!("connect attempt {attempt}/{attempts} to {url} failed: {e}");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(NetError::ConnectFailed {
            attempts,
            // last_err is always set here: attempts >= 1 and every
            // iteration either returned or stored an error.
            source: Box::new(last_err.expect("at least one attempt was made")),
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, message: String) -> Result<(), NetError> {
        self.stream.send(Message::Text(message.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, NetError>> {
        while let Some(item) = self.stream.next().await {
            match item {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Control frames are handled by tungstenite; binary
                // frames are not part of this protocol.
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> Result<(), NetError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// [`Connector`] that redials a WebSocket URL.
pub struct WsConnector {
    url: String,
    attempts: u32,
    delay: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, attempts: u32, delay: Duration) -> Self {
        Self {
            url: url.into(),
            attempts,
            delay,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&mut self) -> Result<Box<dyn Transport>, NetError> {
        let transport = WsTransport::connect_with(&self.url, self.attempts, self.delay).await?;
        Ok(Box::new(transport))
    }
}
