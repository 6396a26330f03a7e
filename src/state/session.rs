//! Session lifecycle state machine.
//!
//! Tracks one session from the lobby through play to a terminal state and
//! validates every transition.
//!
//! # State Diagram
//!
//! ```text
//! ┌───────────────┐ request_create / request_join ┌───────────────────┐
//! │ Uninitialized │──────────────────────────────▶│ CreatingOrJoining │
//! └───────────────┘                               └─────────┬─────────┘
//!         ▲                                  game_created   │   game_joined
//!         │ reset ("game not found or full")        ▼       │
//!         │                                  ┌───────────┐  │
//!         ├─────────────────────────────────▶│  Waiting  │  │
//!         │                                  └─────┬─────┘  │
//!         │                              game_start│        │
//!         │                                        ▼        ▼
//!         │                                  ┌─────────────────┐
//!         │                                  │     Playing     │
//!         │                                  └───┬─────────┬───┘
//!         │                           game_over  │         │  opponent left
//!         │                                      ▼         ▼
//!         │                              ┌──────────┐ ┌──────────────┐
//!         │                              │ Finished │ │ Disconnected │
//!         │                              └──────────┘ └──────────────┘
//! ```
//!
//! Creation leads through `Waiting` (the creator holds the lobby open);
//! joining goes straight to `Playing` because a joinable game already has
//! its first player present.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::protocol::{ClientCommand, PlayerRole};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Fresh lobby; nothing requested yet.
    #[default]
    Uninitialized,
    /// A create or join command is in flight.
    CreatingOrJoining,
    /// Created, waiting for an opponent to join.
    Waiting,
    /// Both players present; match underway.
    Playing,
    /// Match resolved normally.
    Finished,
    /// Opponent left mid-match.
    Disconnected,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "init",
            Self::CreatingOrJoining => "joining",
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Disconnected => "disconnected",
        }
    }

    /// Phases before the match starts. The "game not found or full"
    /// error resets the session only from these.
    pub fn is_pre_playing(&self) -> bool {
        matches!(
            self,
            Self::Uninitialized | Self::CreatingOrJoining | Self::Waiting
        )
    }

    /// Terminal phases; no further transitions except a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Disconnected)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when a request or server event is not valid for the current
/// phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Create/join requested outside the lobby.
    NotInLobby { phase: SessionPhase },
    /// Join requested with an empty game id. Never reaches the network.
    EmptyGameId,
    /// A server event arrived in a phase where it has no meaning.
    InvalidEvent {
        phase: SessionPhase,
        event: &'static str,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInLobby { phase } => {
                write!(f, "Cannot create or join a game while {phase}")
            }
            Self::EmptyGameId => write!(f, "Please enter a game ID"),
            Self::InvalidEvent { phase, event } => {
                write!(f, "Event {event} is not valid while {phase}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Session lifecycle state.
///
/// Pure state: methods validate the transition, record identifiers, and
/// hand back the command to put on the wire. Sending is the connection
/// layer's job.
#[derive(Debug, Clone)]
pub struct Session {
    phase: SessionPhase,

    /// Server-issued identifier, or the one supplied via a resumption
    /// link. Set before the session leaves the lobby phases.
    game_id: Option<String>,

    /// Seat assigned by the server. Immutable once set.
    role: Option<PlayerRole>,

    /// One-shot guard for link resumption.
    auto_join_attempted: bool,

    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Uninitialized,
            game_id: None,
            role: None,
            auto_join_attempted: false,
            created_at: Utc::now(),
        }
    }

    // ── Lobby requests ──────────────────────────────────────────────

    /// Request a new game. Only valid from a fresh lobby.
    pub fn request_create(&mut self) -> Result<ClientCommand, SessionError> {
        if self.phase != SessionPhase::Uninitialized {
            return Err(SessionError::NotInLobby { phase: self.phase });
        }
        self.phase = SessionPhase::CreatingOrJoining;
        Ok(ClientCommand::CreateGame)
    }

    /// Request to join an existing game. Only valid from a fresh lobby;
    /// an empty id is rejected locally.
    pub fn request_join(&mut self, game_id: &str) -> Result<ClientCommand, SessionError> {
        if self.phase != SessionPhase::Uninitialized {
            return Err(SessionError::NotInLobby { phase: self.phase });
        }
        if game_id.is_empty() {
            return Err(SessionError::EmptyGameId);
        }
        self.phase = SessionPhase::CreatingOrJoining;
        self.game_id = Some(game_id.to_string());
        Ok(ClientCommand::JoinGame {
            game_id: game_id.to_string(),
        })
    }

    /// Join once from an externally supplied id (a shared link).
    ///
    /// Returns `None` when the guard has already fired, the session has
    /// left the lobby, or the id is empty. The guard survives a reset so
    /// a stale link cannot re-join in a loop; manual joins are
    /// unaffected.
    pub fn auto_join(&mut self, game_id: &str) -> Option<ClientCommand> {
        if self.auto_join_attempted
            || self.phase != SessionPhase::Uninitialized
            || game_id.is_empty()
        {
            return None;
        }
        self.auto_join_attempted = true;
        self.request_join(game_id).ok()
    }

    // ── Server events ───────────────────────────────────────────────

    /// Creation acknowledged: record the id and seat, hold the lobby
    /// open for the opponent.
    pub fn game_created(
        &mut self,
        game_id: String,
        role: PlayerRole,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::CreatingOrJoining {
            return Err(self.invalid("game_created"));
        }
        self.game_id = Some(game_id);
        self.role = Some(role);
        self.phase = SessionPhase::Waiting;
        Ok(())
    }

    /// Join acknowledged: the opponent is already present, so play
    /// begins immediately.
    pub fn game_joined(&mut self, role: PlayerRole) -> Result<(), SessionError> {
        if self.phase != SessionPhase::CreatingOrJoining {
            return Err(self.invalid("game_joined"));
        }
        self.role = Some(role);
        self.phase = SessionPhase::Playing;
        Ok(())
    }

    /// The opponent joined the game this session created.
    pub fn game_start(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Waiting {
            return Err(self.invalid("game_start"));
        }
        self.phase = SessionPhase::Playing;
        Ok(())
    }

    /// The match resolved.
    pub fn finish(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Playing {
            return Err(self.invalid("game_over"));
        }
        self.phase = SessionPhase::Finished;
        Ok(())
    }

    /// The opponent left mid-match.
    pub fn opponent_disconnected(&mut self) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Playing {
            return Err(self.invalid("player_disconnected"));
        }
        self.phase = SessionPhase::Disconnected;
        Ok(())
    }

    /// Full reset back to a fresh lobby. Identifiers are cleared; the
    /// auto-join guard is not.
    pub fn reset(&mut self) {
        self.phase = SessionPhase::Uninitialized;
        self.game_id = None;
        self.role = None;
    }

    fn invalid(&self, event: &'static str) -> SessionError {
        SessionError::InvalidEvent {
            phase: self.phase,
            event,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn game_id(&self) -> Option<&str> {
        self.game_id.as_deref()
    }

    pub fn role(&self) -> Option<PlayerRole> {
        self.role
    }

    pub fn is_playing(&self) -> bool {
        self.phase == SessionPhase::Playing
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_initial_state() {
        let session = Session::new();
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        assert_eq!(session.game_id(), None);
        assert_eq!(session.role(), None);
    }

    #[test]
    fn test_create_flow() {
        let mut session = Session::new();

        let cmd = session.request_create().unwrap();
        assert_eq!(cmd, ClientCommand::CreateGame);
        assert_eq!(session.phase(), SessionPhase::CreatingOrJoining);

        session
            .game_created("ABCDE".to_string(), PlayerRole::PlayerOne)
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Waiting);
        assert_eq!(session.game_id(), Some("ABCDE"));
        assert_eq!(session.role(), Some(PlayerRole::PlayerOne));

        session.game_start().unwrap();
        assert_eq!(session.phase(), SessionPhase::Playing);
    }

    #[test]
    fn test_join_flow_skips_waiting() {
        let mut session = Session::new();

        let cmd = session.request_join("ABCDE").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::JoinGame {
                game_id: "ABCDE".to_string()
            }
        );
        assert_eq!(session.game_id(), Some("ABCDE"));

        session.game_joined(PlayerRole::PlayerTwo).unwrap();
        assert_eq!(session.phase(), SessionPhase::Playing);
        assert_eq!(session.role(), Some(PlayerRole::PlayerTwo));
    }

    #[test]
    fn test_join_rejects_empty_id() {
        let mut session = Session::new();
        assert_eq!(session.request_join(""), Err(SessionError::EmptyGameId));
        assert_eq!(session.phase(), SessionPhase::Uninitialized);
    }

    #[test]
    fn test_create_only_from_lobby() {
        let mut session = Session::new();
        session.request_create().unwrap();

        let result = session.request_create();
        assert!(matches!(result, Err(SessionError::NotInLobby { .. })));
    }

    #[test]
    fn test_auto_join_fires_once() {
        let mut session = Session::new();

        let cmd = session.auto_join("ABCDE");
        assert!(cmd.is_some());
        assert_eq!(session.phase(), SessionPhase::CreatingOrJoining);

        // Re-evaluating the entry context must not fire again, even
        // after a reset.
        session.reset();
        assert_eq!(session.auto_join("ABCDE"), None);
    }

    #[test]
    fn test_auto_join_skipped_outside_lobby() {
        let mut session = Session::new();
        session.request_create().unwrap();
        assert_eq!(session.auto_join("ABCDE"), None);
    }

    #[test]
    fn test_reset_clears_identifiers() {
        let mut session = Session::new();
        session.request_join("ABCDE").unwrap();
        session.reset();

        assert_eq!(session.phase(), SessionPhase::Uninitialized);
        assert_eq!(session.game_id(), None);
        assert_eq!(session.role(), None);

        // Manual join still possible after reset.
        assert!(session.request_join("FGHIJ").is_ok());
    }

    #[test]
    fn test_events_rejected_in_wrong_phase() {
        let mut session = Session::new();

        // Nothing in flight yet.
        assert!(session.game_start().is_err());
        assert!(session.finish().is_err());
        assert!(session.opponent_disconnected().is_err());
        assert!(session
            .game_created("X".to_string(), PlayerRole::PlayerOne)
            .is_err());

        // Disconnect only applies while playing.
        session.request_create().unwrap();
        assert!(session.opponent_disconnected().is_err());
        assert_eq!(session.phase(), SessionPhase::CreatingOrJoining);
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SessionPhase::Finished.is_terminal());
        assert!(SessionPhase::Disconnected.is_terminal());
        assert!(!SessionPhase::Playing.is_terminal());
        assert!(SessionPhase::Waiting.is_pre_playing());
        assert!(!SessionPhase::Playing.is_pre_playing());
    }
}
