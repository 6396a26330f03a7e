//! Wire protocol for the Worduel server.
//!
//! Messages are JSON objects tagged by a `type` field, matching the event
//! names the server dispatches on. Commands flow client → server, events
//! server → client. Everything here is pure data; the connection layer in
//! [`crate::client`] owns encoding and decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error message the server sends when a join or create cannot be honored.
///
/// This exact string is the one error that forces a full session reset
/// instead of a transient notice.
pub const GAME_NOT_FOUND: &str = "Game not found or full";

/// Which seat a player occupies for the lifetime of a session.
///
/// Assigned by the server: the creator is [`PlayerRole::PlayerOne`], the
/// joiner is [`PlayerRole::PlayerTwo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    #[serde(rename = "player1")]
    PlayerOne,
    #[serde(rename = "player2")]
    PlayerTwo,
}

impl PlayerRole {
    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Self::PlayerOne => Self::PlayerTwo,
            Self::PlayerTwo => Self::PlayerOne,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerOne => "player1",
            Self::PlayerTwo => "player2",
        }
    }
}

impl fmt::Display for PlayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-position verdict on one guessed letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMark {
    /// Right letter, right position.
    Correct,
    /// Right letter, wrong position.
    Present,
    /// Letter not in the word at any remaining position.
    Absent,
}

impl FeedbackMark {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Present => "present",
            Self::Absent => "absent",
        }
    }
}

/// Commands the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Request a new session; the server assigns an id and the
    /// [`PlayerRole::PlayerOne`] seat.
    CreateGame,
    /// Request to join an existing session as [`PlayerRole::PlayerTwo`].
    JoinGame { game_id: String },
    /// Submit one five-letter guess for evaluation.
    MakeGuess {
        game_id: String,
        player_id: PlayerRole,
        guess: String,
    },
}

/// Events the server delivers to the client.
///
/// Delivery order is whatever the transport received; nothing here is
/// correlated to the command that caused it. In particular `GuessMade`
/// carries only the guessing player's role, not a request token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Creation acknowledged; the session now exists server-side.
    GameCreated {
        game_id: String,
        player_id: PlayerRole,
        /// Lobby status as announced by the server. Carried for wire
        /// fidelity; the state machine derives its phase from the event
        /// kind, not from this string.
        status: String,
    },
    /// Join acknowledged; both players are present.
    GameJoined { player_id: PlayerRole },
    /// Both players present; the match may begin.
    GameStart,
    /// An evaluated guess from either player.
    GuessMade {
        player_id: PlayerRole,
        guess: String,
        result: Vec<FeedbackMark>,
    },
    /// Terminal result. `winner` is absent when neither player solved
    /// the word.
    GameOver {
        winner: Option<PlayerRole>,
        word: String,
    },
    /// The opponent left mid-match.
    PlayerDisconnected,
    /// Generic failure report.
    Error { message: String },
}

impl ServerEvent {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GameCreated { .. } => "game_created",
            Self::GameJoined { .. } => "game_joined",
            Self::GameStart => "game_start",
            Self::GuessMade { .. } => "guess_made",
            Self::GameOver { .. } => "game_over",
            Self::PlayerDisconnected => "player_disconnected",
            Self::Error { .. } => "error",
        }
    }
}
