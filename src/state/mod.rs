//! Client-side state for one Worduel session.
//!
//! Two layers, both pure:
//!
//! - `session` - Session lifecycle state machine (lobby, waiting,
//!   playing, terminal) with validated transitions.
//! - `board` - In-match state: pending input, both guess histories,
//!   terminal outcome.
//!
//! [`DuelState`] combines them and is the single place server events and
//! local input are applied. Every transition is synchronous; commands to
//! put on the wire are returned to the caller, never sent from here.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        DuelState                         │
//! │                                                          │
//! │  ┌─────────────────────┐   ┌──────────────────────────┐  │
//! │  │       Session       │   │      Option<Board>       │  │
//! │  │                     │   │                          │  │
//! │  │ phase, game_id,     │   │ pending input,           │  │
//! │  │ role, link guard    │   │ guess histories, outcome │  │
//! │  └─────────────────────┘   └──────────────────────────┘  │
//! │                                                          │
//! │  apply(ServerEvent) → Vec<Effect>                        │
//! │  append_letter / delete_letter / submit_guess            │
//! │  request_create / request_join / auto_join               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The board exists exactly while the session is playing or finished;
//! entering play creates it, returning to the lobby (or an opponent
//! disconnect) discards it.

pub mod board;
pub mod session;

pub use board::{Board, BoardError, Guess, GuessTrack, Outcome, MAX_GUESSES, WORD_LENGTH};
pub use session::{Session, SessionError, SessionPhase};

use crate::protocol::{ClientCommand, PlayerRole, ServerEvent, GAME_NOT_FOUND};

/// How a notice should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A transient, dismissable user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Side effects a transition asks the presentation layer to perform.
///
/// State changes themselves are visible through accessors; effects carry
/// only the ephemeral signals a projection of current state cannot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Show a transient notification.
    Notify(Notice),
    /// The server rejected the pending guess; the buffer is retained so
    /// the player can correct and resubmit.
    InvalidGuess,
    /// The session was torn down to a fresh lobby.
    Reset,
}

/// Error applying a server event to the combined state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    Session(SessionError),
    Board(BoardError),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(e) => e.fmt(f),
            Self::Board(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for StateError {}

impl From<SessionError> for StateError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

impl From<BoardError> for StateError {
    fn from(e: BoardError) -> Self {
        Self::Board(e)
    }
}

/// Combined client state for one duel.
#[derive(Debug, Clone, Default)]
pub struct DuelState {
    session: Session,
    board: Option<Board>,
}

impl DuelState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lobby requests ──────────────────────────────────────────────

    /// Request a new game. See [`Session::request_create`].
    pub fn request_create(&mut self) -> Result<ClientCommand, SessionError> {
        self.session.request_create()
    }

    /// Request to join an existing game. See [`Session::request_join`].
    pub fn request_join(&mut self, game_id: &str) -> Result<ClientCommand, SessionError> {
        self.session.request_join(game_id)
    }

    /// One-shot join from a resumption link. See [`Session::auto_join`].
    pub fn auto_join(&mut self, game_id: &str) -> Option<ClientCommand> {
        self.session.auto_join(game_id)
    }

    // ── Local input ─────────────────────────────────────────────────
    //
    // All input is admitted per-call: phase, history room, and buffer
    // room are re-checked every time, never latched.

    /// Append a letter to the pending guess. No-op outside play.
    pub fn append_letter(&mut self, c: char) -> bool {
        if !self.session.is_playing() {
            return false;
        }
        self.board.as_mut().is_some_and(|b| b.append_letter(c))
    }

    /// Delete the last pending letter. No-op outside play.
    pub fn delete_letter(&mut self) -> bool {
        if !self.session.is_playing() {
            return false;
        }
        self.board.as_mut().is_some_and(|b| b.delete_letter())
    }

    /// The guess command to send, when the buffer holds a complete word
    /// and input is admitted. Returns `None` otherwise.
    ///
    /// The pending buffer is not cleared here; it stays visible until
    /// the acknowledgement arrives.
    pub fn submit_guess(&mut self) -> Option<ClientCommand> {
        if !self.session.is_playing() {
            return None;
        }
        let letters = self.board.as_ref()?.submission()?.to_string();
        let game_id = self.session.game_id()?.to_string();
        let player_id = self.session.role()?;
        Some(ClientCommand::MakeGuess {
            game_id,
            player_id,
            guess: letters,
        })
    }

    // ── Server events ───────────────────────────────────────────────

    /// Apply one server event.
    ///
    /// Events invalid for the current phase are rejected with an error
    /// and change nothing. The one idempotent repeat is `game_over`
    /// after the match already finished, which is a silent no-op.
    pub fn apply(&mut self, event: ServerEvent) -> Result<Vec<Effect>, StateError> {
        match event {
            ServerEvent::GameCreated {
                game_id, player_id, ..
            } => {
                self.session.game_created(game_id, player_id)?;
                Ok(vec![Effect::Notify(Notice::info(
                    "Game created successfully! Share the game link with your friend.",
                ))])
            }

            ServerEvent::GameJoined { player_id } => {
                self.session.game_joined(player_id)?;
                self.board = Some(Board::new());
                Ok(vec![Effect::Notify(Notice::info(
                    "Successfully joined the game!",
                ))])
            }

            ServerEvent::GameStart => {
                self.session.game_start()?;
                self.board = Some(Board::new());
                Ok(vec![])
            }

            ServerEvent::GuessMade {
                player_id,
                guess,
                result,
            } => {
                let (local_role, board) = self.playing_board("guess_made")?;
                let guess = Guess::new(&guess, &result)?;
                board.record_ack(local_role, player_id, guess)?;
                Ok(vec![])
            }

            ServerEvent::GameOver { winner, word } => {
                if self.session.phase() == SessionPhase::Finished {
                    // Duplicate terminal event; the first one decided.
                    return Ok(vec![]);
                }
                let (_, board) = self.playing_board("game_over")?;
                board.resolve(Outcome { winner, word });
                self.session.finish()?;
                Ok(vec![])
            }

            ServerEvent::PlayerDisconnected => {
                self.session.opponent_disconnected()?;
                self.board = None;
                Ok(vec![])
            }

            ServerEvent::Error { message } => Ok(self.handle_error(message)),
        }
    }

    /// Route a server error by phase: the not-found case resets the
    /// session, errors during play reject the pending guess, anything
    /// else surfaces as a transient notice.
    fn handle_error(&mut self, message: String) -> Vec<Effect> {
        if message == GAME_NOT_FOUND && self.session.phase().is_pre_playing() {
            self.session.reset();
            self.board = None;
            return vec![Effect::Notify(Notice::error(message)), Effect::Reset];
        }
        if self.session.is_playing() {
            return vec![Effect::InvalidGuess];
        }
        vec![Effect::Notify(Notice::error(message))]
    }

    /// The board, only while playing. Also hands out the local role,
    /// which the playing invariant guarantees is set.
    fn playing_board(
        &mut self,
        event: &'static str,
    ) -> Result<(PlayerRole, &mut Board), StateError> {
        let phase = self.session.phase();
        let role = self.session.role();
        match (self.session.is_playing(), role, self.board.as_mut()) {
            (true, Some(role), Some(board)) => Ok((role, board)),
            _ => Err(SessionError::InvalidEvent { phase, event }.into()),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    /// Whether a submission would currently be admitted.
    pub fn can_submit(&self) -> bool {
        self.session.is_playing() && self.board.as_ref().is_some_and(|b| b.can_submit())
    }
}
