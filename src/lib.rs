//! Worduel Client Library
//!
//! This crate provides the client session layer for Worduel, a realtime
//! two-player word-guessing duel.
//!
//! # Overview
//!
//! The crate is split along the only seam that matters: pure state on
//! one side, the network on the other.
//!
//! - **State machines** ([`state`]) - Session lifecycle with validated
//!   transitions (lobby, waiting, playing, terminal) and the in-match
//!   board (pending input, both guess histories, outcome). Synchronous,
//!   lock-free, fully testable without a server.
//!
//! - **Wire protocol** ([`protocol`]) - Typed commands and events with
//!   their JSON encoding.
//!
//! - **Connection layer** ([`transport`], [`client`]) - The one
//!   WebSocket in the process, with bounded fixed-delay retries, a
//!   command queue, and in-order event fan-out to subscribers.
//!
//! - **Driver** ([`driver`]) - Glue that owns a client and a state
//!   machine together and turns key presses into commands and events
//!   into effects.
//!
//! # Design Principles
//!
//! 1. **State machines validate transitions** - An event that has no
//!    meaning in the current phase is rejected, never silently applied.
//!
//! 2. **Commands are returned, not sent** - State transitions hand the
//!    outbound command back to the caller; only the connection layer
//!    touches the socket.
//!
//! 3. **Admission is re-checked per event** - Input gating is never
//!    latched into a flag; every key press re-evaluates phase, buffer
//!    room, and history room.
//!
//! # Example
//!
//! ```rust
//! use worduel_client::protocol::{FeedbackMark, PlayerRole, ServerEvent};
//! use worduel_client::state::{DuelState, SessionPhase};
//!
//! let mut duel = DuelState::new();
//!
//! // Ask the server for a new game; the returned command goes on the wire.
//! let _create = duel.request_create().unwrap();
//!
//! // The acknowledgement assigns our id and seat, then the opponent joins.
//! duel.apply(ServerEvent::GameCreated {
//!     game_id: "ABCDE".into(),
//!     player_id: PlayerRole::PlayerOne,
//!     status: "waiting".into(),
//! }).unwrap();
//! assert_eq!(duel.phase(), SessionPhase::Waiting);
//!
//! duel.apply(ServerEvent::GameStart).unwrap();
//! assert_eq!(duel.phase(), SessionPhase::Playing);
//!
//! // Type a guess and submit it.
//! for c in "crane".chars() {
//!     duel.append_letter(c);
//! }
//! let _guess = duel.submit_guess().unwrap();
//!
//! // The server's evaluation lands in the local history.
//! duel.apply(ServerEvent::GuessMade {
//!     player_id: PlayerRole::PlayerOne,
//!     guess: "crane".into(),
//!     result: vec![FeedbackMark::Correct; 5],
//! }).unwrap();
//! assert_eq!(duel.board().unwrap().local_guesses().len(), 1);
//! ```

pub mod client;
pub mod driver;
pub mod protocol;
pub mod state;
pub mod transport;

// Re-export the types most callers need at the crate root
pub use client::{Client, ClientConfig, ClientEvent};
pub use driver::{game_id_from_query, Key, SessionDriver};
pub use protocol::{ClientCommand, FeedbackMark, PlayerRole, ServerEvent};
pub use state::{
    Board, DuelState, Effect, Guess, Notice, Outcome, Session, SessionPhase, Severity,
    MAX_GUESSES, WORD_LENGTH,
};
pub use transport::{NetError, Transport, WsTransport};
