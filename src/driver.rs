//! Session driver.
//!
//! Owns the [`Client`] handle and the [`DuelState`] together: lobby
//! requests and key presses flow down into the state machine and the
//! commands it produces go out through the client; client events flow
//! back in through [`SessionDriver::apply`]. Subscription happens once
//! at construction and ends when the driver is dropped.
//!
//! Key handling is non-blocking: `Enter` queues the guess command and
//! returns immediately, the acknowledgement event completes the cycle
//! later.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::{Client, ClientEvent};
use crate::state::{DuelState, Effect, Notice, SessionError};
use crate::transport::NetError;

/// Keyboard-style input, already stripped of presentation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Letter(char),
    Backspace,
    Enter,
}

/// Driver errors: local validation from the state machine, or a dead
/// connection.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Net(#[from] NetError),
}

/// Extract a game id from a shared-link query string.
///
/// Accepts a bare query (`gameId=ABCDE`), one with a leading `?`, or a
/// full URL containing one.
pub fn game_id_from_query(query: &str) -> Option<String> {
    let query = query.rsplit_once('?').map_or(query, |(_, q)| q);
    for pair in query.split('&') {
        if let Some(("gameId", value)) = pair.split_once('=') {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Wires a connection to a duel state machine.
pub struct SessionDriver {
    client: Client,
    events: mpsc::Receiver<ClientEvent>,
    state: DuelState,
}

impl SessionDriver {
    /// Take ownership of a client and its event subscription.
    pub fn new(client: Client, events: mpsc::Receiver<ClientEvent>) -> Self {
        Self {
            client,
            events,
            state: DuelState::new(),
        }
    }

    pub fn state(&self) -> &DuelState {
        &self.state
    }

    // ── Lobby actions ───────────────────────────────────────────────

    /// Request a new game.
    pub fn create_game(&mut self) -> Result<(), DriverError> {
        let cmd = self.state.request_create()?;
        self.client.send(cmd)?;
        Ok(())
    }

    /// Join an existing game by id.
    pub fn join_game(&mut self, game_id: &str) -> Result<(), DriverError> {
        let cmd = self.state.request_join(game_id)?;
        self.client.send(cmd)?;
        Ok(())
    }

    /// Evaluate the entry context (a shared link) and auto-join at most
    /// once. Returns whether a join was issued; calling again is always
    /// a no-op.
    pub fn resume_from_link(&mut self, entry: &str) -> Result<bool, DriverError> {
        let Some(game_id) = game_id_from_query(entry) else {
            return Ok(false);
        };
        match self.state.auto_join(&game_id) {
            Some(cmd) => {
                debug!("auto-joining game {game_id} from entry link");
                self.client.send(cmd)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Input ───────────────────────────────────────────────────────

    /// Process one key press. Admission is decided by the state machine;
    /// inadmissible input is silently dropped, like any other key the
    /// board has no use for.
    pub fn handle_key(&mut self, key: Key) -> Result<(), DriverError> {
        match key {
            Key::Letter(c) => {
                self.state.append_letter(c);
            }
            Key::Backspace => {
                self.state.delete_letter();
            }
            Key::Enter => {
                if let Some(cmd) = self.state.submit_guess() {
                    self.client.send(cmd)?;
                }
            }
        }
        Ok(())
    }

    // ── Events ──────────────────────────────────────────────────────

    /// Wait for the next client event and apply it. `None` when the
    /// event channel is closed.
    pub async fn pump(&mut self) -> Option<Vec<Effect>> {
        let event = self.events.recv().await?;
        Some(self.apply(event))
    }

    /// Apply one client event to the state machine, returning the
    /// effects for the presentation layer.
    pub fn apply(&mut self, event: ClientEvent) -> Vec<Effect> {
        match event {
            ClientEvent::Connected => {
                debug!("connection up");
                vec![]
            }
            ClientEvent::ConnectionLost { reason } => {
                // Terminal connectivity failure: the session state is
                // left frozen; only a manual restart recovers.
                let message = match reason {
                    Some(reason) => format!("Connection lost: {reason}"),
                    None => "Connection lost".to_string(),
                };
                vec![Effect::Notify(Notice::error(message))]
            }
            ClientEvent::Server(event) => match self.state.apply(event) {
                Ok(effects) => effects,
                Err(e) => {
                    warn!("ignoring server event: {e}");
                    vec![]
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientConfig;
    use crate::protocol::{ClientCommand, PlayerRole, ServerEvent};
    use crate::state::{SessionPhase, Severity};
    use crate::transport::Transport;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    /// Transport that records sends and never produces input.
    struct SilentTransport {
        sent: Arc<StdMutex<Vec<String>>>,
    }

    impl SilentTransport {
        fn new() -> (Self, Arc<StdMutex<Vec<String>>>) {
            let sent = Arc::new(StdMutex::new(Vec::new()));
            (
                Self {
                    sent: Arc::clone(&sent),
                },
                sent,
            )
        }
    }

    #[async_trait]
    impl Transport for SilentTransport {
        async fn send(&mut self, message: String) -> Result<(), NetError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn recv(&mut self) -> Option<Result<String, NetError>> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), NetError> {
            Ok(())
        }
    }

    fn driver() -> (SessionDriver, Arc<StdMutex<Vec<String>>>) {
        let (transport, sent) = SilentTransport::new();
        let (client, events) = Client::start(transport, ClientConfig::new("ws://mock"));
        (SessionDriver::new(client, events), sent)
    }

    async fn sent_commands(sent: &Arc<StdMutex<Vec<String>>>) -> Vec<ClientCommand> {
        // Give the connection loop a moment to drain the queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        sent.lock()
            .unwrap()
            .iter()
            .map(|json| serde_json::from_str(json).unwrap())
            .collect()
    }

    fn bring_to_playing(driver: &mut SessionDriver) {
        driver.create_game().unwrap();
        driver.apply(ClientEvent::Server(ServerEvent::GameCreated {
            game_id: "ABCDE".into(),
            player_id: PlayerRole::PlayerOne,
            status: "waiting".into(),
        }));
        driver.apply(ClientEvent::Server(ServerEvent::GameStart));
    }

    #[test]
    fn test_game_id_from_query() {
        assert_eq!(game_id_from_query("gameId=ABCDE"), Some("ABCDE".into()));
        assert_eq!(game_id_from_query("?gameId=ABCDE"), Some("ABCDE".into()));
        assert_eq!(
            game_id_from_query("https://example.com/?foo=1&gameId=ABCDE"),
            Some("ABCDE".into())
        );
        assert_eq!(game_id_from_query("gameId="), None);
        assert_eq!(game_id_from_query("foo=bar"), None);
        assert_eq!(game_id_from_query(""), None);
    }

    #[tokio::test]
    async fn test_create_game_sends_command() {
        let (mut driver, sent) = driver();

        driver.create_game().unwrap();
        assert_eq!(driver.state().phase(), SessionPhase::CreatingOrJoining);

        let commands = sent_commands(&sent).await;
        assert_eq!(commands, vec![ClientCommand::CreateGame]);
    }

    #[tokio::test]
    async fn test_resume_from_link_fires_once() {
        let (mut driver, sent) = driver();

        assert!(driver.resume_from_link("?gameId=ABCDE").unwrap());
        // Re-evaluation of the same entry context is a no-op.
        assert!(!driver.resume_from_link("?gameId=ABCDE").unwrap());

        let commands = sent_commands(&sent).await;
        assert_eq!(
            commands,
            vec![ClientCommand::JoinGame {
                game_id: "ABCDE".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_keys_drive_the_board() {
        let (mut driver, sent) = driver();
        bring_to_playing(&mut driver);

        for c in "cranes".chars() {
            driver.handle_key(Key::Letter(c)).unwrap();
        }
        driver.handle_key(Key::Backspace).unwrap();
        driver.handle_key(Key::Letter('e')).unwrap();
        driver.handle_key(Key::Enter).unwrap();

        let commands = sent_commands(&sent).await;
        assert_eq!(
            commands.last(),
            Some(&ClientCommand::MakeGuess {
                game_id: "ABCDE".into(),
                player_id: PlayerRole::PlayerOne,
                guess: "crane".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_enter_without_full_word_sends_nothing() {
        let (mut driver, sent) = driver();
        bring_to_playing(&mut driver);

        driver.handle_key(Key::Letter('c')).unwrap();
        driver.handle_key(Key::Enter).unwrap();

        let commands = sent_commands(&sent).await;
        // Only the lobby command went out.
        assert_eq!(commands, vec![ClientCommand::CreateGame]);
    }

    #[tokio::test]
    async fn test_connection_lost_freezes_session() {
        let (mut driver, _sent) = driver();
        bring_to_playing(&mut driver);

        let effects = driver.apply(ClientEvent::ConnectionLost { reason: None });

        assert!(
            matches!(effects.as_slice(), [Effect::Notify(n)] if n.severity == Severity::Error)
        );
        // Phase untouched; the session is frozen, not torn down.
        assert_eq!(driver.state().phase(), SessionPhase::Playing);
    }

    #[tokio::test]
    async fn test_invalid_server_event_is_logged_not_fatal() {
        let (mut driver, _sent) = driver();

        // A disconnect notification with no match in progress.
        let effects = driver.apply(ClientEvent::Server(ServerEvent::PlayerDisconnected));

        assert!(effects.is_empty());
        assert_eq!(driver.state().phase(), SessionPhase::Uninitialized);
    }
}
