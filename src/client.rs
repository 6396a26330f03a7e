//! Connection manager.
//!
//! [`Client`] is a thin handle over a background loop that owns the
//! transport. Outbound [`ClientCommand`]s are queued on an unbounded
//! channel and serialized by the loop; inbound text is decoded into
//! [`ServerEvent`]s and fanned out to every current subscriber in the
//! order the transport received it.
//!
//! The loop never interprets game semantics. It reports connectivity
//! ([`ClientEvent::Connected`], [`ClientEvent::ConnectionLost`]) and
//! forwards decoded events; deciding what they mean for the session is
//! the state layer's job.
//!
//! Subscriptions are plain bounded channels: [`Client::subscribe`] on
//! setup, drop the receiver on teardown and the loop prunes it. A
//! subscriber that falls behind loses events (with a warning) rather
//! than stalling the loop; `ConnectionLost` is always delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::protocol::{ClientCommand, ServerEvent};
use crate::transport::{Connector, NetError, Transport, WsConnector};

/// Default capacity of each subscriber's event channel.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default timeout for graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Connection configuration.
///
/// Only the URL is required; retry parameters default to the bounded
/// fixed-backoff policy described in [`crate::transport`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the game server.
    pub url: String,
    /// Connection attempts before giving up, initial and after a drop.
    pub connect_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Capacity of each subscriber channel.
    pub event_channel_capacity: usize,
    /// How long [`Client::shutdown`] waits before aborting the loop.
    pub shutdown_timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_attempts: crate::transport::CONNECT_ATTEMPTS,
            retry_delay: crate::transport::CONNECT_RETRY_DELAY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_connect_attempts(mut self, attempts: u32) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// What subscribers receive: connectivity changes plus decoded server
/// events, in transport receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The transport is up (also emitted after a successful
    /// re-establishment).
    Connected,
    /// A decoded event from the server.
    Server(ServerEvent),
    /// The transport is gone and every re-establishment attempt failed.
    /// Always the final event on the channel.
    ConnectionLost { reason: Option<String> },
}

/// Handle to the connection loop.
///
/// Command methods queue and return immediately; there is no round-trip
/// await. Dropping the handle aborts the loop.
pub struct Client {
    cmd_tx: mpsc::UnboundedSender<ClientCommand>,
    sub_tx: mpsc::UnboundedSender<mpsc::Sender<ClientEvent>>,
    connected: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_timeout: Duration,
    event_capacity: usize,
}

impl Client {
    /// Connect to the configured URL (bounded retries, fixed delay) and
    /// start the loop. Mid-session drops are re-established through the
    /// same policy.
    pub async fn connect(
        config: ClientConfig,
    ) -> Result<(Self, mpsc::Receiver<ClientEvent>), NetError> {
        let mut connector = WsConnector::new(
            config.url.clone(),
            config.connect_attempts,
            config.retry_delay,
        );
        let transport = connector.connect().await?;
        Ok(Self::start_boxed(
            transport,
            Some(Box::new(connector)),
            config,
        ))
    }

    /// Start the loop over an already-connected transport. Without a
    /// connector a dropped transport is immediately terminal.
    pub fn start(
        transport: impl Transport + 'static,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        Self::start_boxed(Box::new(transport), None, config)
    }

    /// Start the loop with an explicit re-establishment policy.
    pub fn start_with_connector(
        transport: impl Transport + 'static,
        connector: Box<dyn Connector>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        Self::start_boxed(Box::new(transport), Some(connector), config)
    }

    fn start_boxed(
        transport: Box<dyn Transport>,
        connector: Option<Box<dyn Connector>>,
        config: ClientConfig,
    ) -> (Self, mpsc::Receiver<ClientEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (sub_tx, sub_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let capacity = config.event_channel_capacity.max(1);
        let (event_tx, event_rx) = mpsc::channel(capacity);

        let connected = Arc::new(AtomicBool::new(true));

        let task = tokio::spawn(connection_loop(
            transport,
            connector,
            cmd_rx,
            sub_rx,
            vec![event_tx],
            Arc::clone(&connected),
            shutdown_rx,
        ));

        let client = Self {
            cmd_tx,
            sub_tx,
            connected,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
            shutdown_timeout: config.shutdown_timeout,
            event_capacity: capacity,
        };

        (client, event_rx)
    }

    /// Queue a command for the server.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Closed`] once the connection is gone.
    pub fn send(&self, command: ClientCommand) -> Result<(), NetError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(NetError::Closed);
        }
        self.cmd_tx.send(command).map_err(|_| NetError::Closed)
    }

    /// Register a new subscriber.
    ///
    /// The subscription sees events from this point forward. Dropping
    /// the receiver unsubscribes; the loop prunes it on the next
    /// delivery.
    pub fn subscribe(&self) -> mpsc::Receiver<ClientEvent> {
        let (tx, rx) = mpsc::channel(self.event_capacity);
        // If the loop is gone the sender is dropped and the receiver
        // reports closed, which is the right signal.
        let _ = self.sub_tx.send(tx);
        rx
    }

    /// Whether the transport is believed to be up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Shut down the loop, closing the transport.
    ///
    /// Subscribers receive a final [`ClientEvent::ConnectionLost`]; if
    /// the loop does not exit within the configured timeout it is
    /// aborted.
    pub async fn shutdown(&mut self) {
        debug!("client shutdown requested");

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("connection loop terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("connection loop did not exit within timeout; aborting");
                    task.abort();
                    let _ = task.await;
                }
            }
        }

        self.connected.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("connected", &self.is_connected())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // No executor context to drive a graceful close here; aborting
        // the task drops the loop future and the transport with it.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Connection loop ─────────────────────────────────────────────────

async fn connection_loop(
    mut transport: Box<dyn Transport>,
    mut connector: Option<Box<dyn Connector>>,
    mut cmd_rx: mpsc::UnboundedReceiver<ClientCommand>,
    mut sub_rx: mpsc::UnboundedReceiver<mpsc::Sender<ClientEvent>>,
    mut subscribers: Vec<mpsc::Sender<ClientEvent>>,
    connected: Arc<AtomicBool>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!("connection loop started");
    broadcast(&mut subscribers, ClientEvent::Connected);

    loop {
        tokio::select! {
            // Outgoing command from the handle.
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(command) => {
                        match serde_json::to_string(&command) {
                            Ok(json) => {
                                if let Err(e) = transport.send(json).await {
                                    error!("transport send error: {e}");
                                    if !reestablish(&mut connector, &mut transport, &mut subscribers, &connected).await {
                                        finish(&mut subscribers, &connected,
                                            Some(format!("transport send error: {e}"))).await;
                                        break;
                                    }
                                }
                            }
                            // A command that cannot serialize is a
                            // programming bug, not a dead connection.
                            Err(e) => error!("failed to serialize command: {e}"),
                        }
                    }
                    None => {
                        debug!("command channel closed, shutting down connection loop");
                        let _ = transport.close().await;
                        finish(&mut subscribers, &connected, Some("client shut down".into())).await;
                        break;
                    }
                }
            }

            // New subscriber registration.
            Some(tx) = sub_rx.recv() => {
                subscribers.push(tx);
            }

            // Shutdown signal.
            _ = &mut shutdown_rx => {
                debug!("shutdown signal received");
                let _ = transport.close().await;
                finish(&mut subscribers, &connected, Some("client shut down".into())).await;
                break;
            }

            // Incoming message from the server.
            incoming = transport.recv() => {
                match incoming {
                    Some(Ok(text)) => {
                        match serde_json::from_str::<ServerEvent>(&text) {
                            Ok(event) => {
                                debug!("received {}", event.kind());
                                broadcast(&mut subscribers, ClientEvent::Server(event));
                            }
                            Err(e) => {
                                warn!("failed to decode server event: {e} — raw: {text}");
                            }
                        }
                    }
                    Some(Err(e)) => {
                        error!("transport receive error: {e}");
                        if !reestablish(&mut connector, &mut transport, &mut subscribers, &connected).await {
                            finish(&mut subscribers, &connected,
                                Some(format!("transport receive error: {e}"))).await;
                            break;
                        }
                    }
                    None => {
                        debug!("transport closed by server");
                        if !reestablish(&mut connector, &mut transport, &mut subscribers, &connected).await {
                            finish(&mut subscribers, &connected, None).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("connection loop exited");
}

/// Try to bring the connection back after a drop. The connector applies
/// its own bounded retry policy; `false` means the session is done.
async fn reestablish(
    connector: &mut Option<Box<dyn Connector>>,
    transport: &mut Box<dyn Transport>,
    subscribers: &mut Vec<mpsc::Sender<ClientEvent>>,
    connected: &AtomicBool,
) -> bool {
    let Some(connector) = connector.as_mut() else {
        return false;
    };

    connected.store(false, Ordering::Release);
    match connector.connect().await {
        Ok(new_transport) => {
            *transport = new_transport;
            connected.store(true, Ordering::Release);
            debug!("connection re-established");
            broadcast(subscribers, ClientEvent::Connected);
            true
        }
        Err(e) => {
            error!("re-establishment failed: {e}");
            false
        }
    }
}

/// Deliver an event to every live subscriber, pruning closed ones. A
/// full subscriber loses the event rather than stalling the loop.
fn broadcast(subscribers: &mut Vec<mpsc::Sender<ClientEvent>>, event: ClientEvent) {
    subscribers.retain(|tx| match tx.try_send(event.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("subscriber channel full, dropping event");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

/// Mark the connection dead and deliver the final `ConnectionLost` to
/// every subscriber. Awaited, never dropped.
async fn finish(
    subscribers: &mut Vec<mpsc::Sender<ClientEvent>>,
    connected: &AtomicBool,
    reason: Option<String>,
) {
    connected.store(false, Ordering::Release);
    for tx in subscribers.drain(..) {
        let _ = tx
            .send(ClientEvent::ConnectionLost {
                reason: reason.clone(),
            })
            .await;
    }
}
