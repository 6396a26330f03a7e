//! Match board state.
//!
//! Owns everything that exists only while a match is underway: the local
//! player's in-progress guess buffer, both players' evaluated guess
//! histories, and the terminal outcome. The board never talks to the
//! network; it records acknowledgements the session layer routes to it
//! and admits or ignores local input.
//!
//! Input admission is re-checked on every call rather than latched into
//! a flag, so a burst of key events interleaved with network events can
//! never overrun the buffer or the history.

use chrono::{DateTime, Utc};

use crate::protocol::{FeedbackMark, PlayerRole};

/// Letters per guess.
pub const WORD_LENGTH: usize = 5;

/// Maximum guesses per player per match.
pub const MAX_GUESSES: usize = 6;

/// One evaluated guess: five letters and their positional feedback.
///
/// Feedback only ever comes from a server acknowledgement; a guess never
/// enters a history without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    letters: String,
    feedback: [FeedbackMark; WORD_LENGTH],
}

impl Guess {
    /// Build a guess from acknowledged wire data, normalizing letters to
    /// lowercase.
    pub fn new(letters: &str, feedback: &[FeedbackMark]) -> Result<Self, BoardError> {
        let letters = letters.to_lowercase();
        if letters.len() != WORD_LENGTH {
            return Err(BoardError::InvalidWordLength(letters.len()));
        }
        if !letters.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(BoardError::InvalidWordCharacters);
        }
        let feedback: [FeedbackMark; WORD_LENGTH] = feedback
            .try_into()
            .map_err(|_| BoardError::InvalidFeedbackLength(feedback.len()))?;
        Ok(Self { letters, feedback })
    }

    pub fn letters(&self) -> &str {
        &self.letters
    }

    pub fn feedback(&self) -> &[FeedbackMark; WORD_LENGTH] {
        &self.feedback
    }

    /// True when every position came back [`FeedbackMark::Correct`].
    pub fn is_winning(&self) -> bool {
        self.feedback.iter().all(|m| *m == FeedbackMark::Correct)
    }
}

/// Terminal result of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Winning seat, or `None` when neither player solved the word.
    pub winner: Option<PlayerRole>,
    /// The secret word, revealed by the server.
    pub word: String,
}

/// Which history an acknowledgement landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessTrack {
    Local,
    Opponent,
}

/// Board errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    InvalidWordLength(usize),
    InvalidWordCharacters,
    InvalidFeedbackLength(usize),
    HistoryFull,
}

impl std::fmt::Display for BoardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidWordLength(len) => {
                write!(f, "Guess must be exactly {WORD_LENGTH} letters, got {len}")
            }
            Self::InvalidWordCharacters => write!(f, "Guess must be ASCII letters only"),
            Self::InvalidFeedbackLength(len) => {
                write!(f, "Feedback must have {WORD_LENGTH} marks, got {len}")
            }
            Self::HistoryFull => write!(f, "Guess history is already full"),
        }
    }
}

impl std::error::Error for BoardError {}

/// In-match state for one session.
///
/// Created when the session enters play, retained through the finished
/// screen, and discarded when the session returns to the lobby.
#[derive(Debug, Clone)]
pub struct Board {
    /// Local player's acknowledged guesses, append-only.
    local_guesses: Vec<Guess>,

    /// Opponent's acknowledged guesses, append-only.
    opponent_guesses: Vec<Guess>,

    /// Guess under construction, 0..=WORD_LENGTH lowercase letters.
    pending: String,

    /// Set exactly once, on the server's terminal event.
    outcome: Option<Outcome>,

    /// When the match began.
    pub started_at: DateTime<Utc>,

    /// When the outcome arrived.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Board {
    pub fn new() -> Self {
        Self {
            local_guesses: Vec::new(),
            opponent_guesses: Vec::new(),
            pending: String::new(),
            outcome: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    // ── Admission ───────────────────────────────────────────────────

    /// Whether local input is currently admitted: the match is unresolved
    /// and the local history has room.
    ///
    /// The session layer adds the phase check on top; within the board
    /// this predicate is consulted on every input call.
    pub fn can_guess(&self) -> bool {
        self.outcome.is_none() && self.local_guesses.len() < MAX_GUESSES
    }

    /// Whether the pending buffer is complete and may be submitted.
    pub fn can_submit(&self) -> bool {
        self.can_guess() && self.pending.len() == WORD_LENGTH
    }

    // ── Local input ─────────────────────────────────────────────────

    /// Append one letter to the pending buffer.
    ///
    /// No-op (returns `false`) when input is not admitted, the buffer is
    /// full, or the character is not a single ASCII letter. Letters are
    /// normalized to lowercase.
    pub fn append_letter(&mut self, c: char) -> bool {
        if !self.can_guess() || self.pending.len() >= WORD_LENGTH || !c.is_ascii_alphabetic() {
            return false;
        }
        self.pending.push(c.to_ascii_lowercase());
        true
    }

    /// Remove the last letter from the pending buffer, if any.
    pub fn delete_letter(&mut self) -> bool {
        if !self.can_guess() {
            return false;
        }
        self.pending.pop().is_some()
    }

    /// The letters to submit, if submission is currently admitted.
    ///
    /// Does not clear the buffer: it stays visible until the server
    /// acknowledges the guess, and is retained unchanged on rejection so
    /// the player can correct and resubmit.
    pub fn submission(&self) -> Option<&str> {
        if self.can_submit() {
            Some(&self.pending)
        } else {
            None
        }
    }

    // ── Server events ───────────────────────────────────────────────

    /// Record an acknowledged guess.
    ///
    /// Acknowledgements are matched by role only: one for `local_role`
    /// lands in the local history and clears the pending buffer, any
    /// other lands in the opponent history.
    pub fn record_ack(
        &mut self,
        local_role: PlayerRole,
        player: PlayerRole,
        guess: Guess,
    ) -> Result<GuessTrack, BoardError> {
        if player == local_role {
            if self.local_guesses.len() >= MAX_GUESSES {
                return Err(BoardError::HistoryFull);
            }
            self.local_guesses.push(guess);
            self.pending.clear();
            Ok(GuessTrack::Local)
        } else {
            if self.opponent_guesses.len() >= MAX_GUESSES {
                return Err(BoardError::HistoryFull);
            }
            self.opponent_guesses.push(guess);
            Ok(GuessTrack::Opponent)
        }
    }

    /// Record the terminal outcome.
    ///
    /// Returns `false` without changing anything when an outcome is
    /// already set; the first resolution wins.
    pub fn resolve(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        self.pending.clear();
        true
    }

    /// Drop any in-progress input. Called when the session leaves play
    /// without an outcome (opponent disconnect).
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn local_guesses(&self) -> &[Guess] {
        &self.local_guesses
    }

    pub fn opponent_guesses(&self) -> &[Guess] {
        &self.opponent_guesses
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ack(letters: &str) -> Guess {
        Guess::new(letters, &[FeedbackMark::Absent; WORD_LENGTH]).unwrap()
    }

    fn winning(letters: &str) -> Guess {
        Guess::new(letters, &[FeedbackMark::Correct; WORD_LENGTH]).unwrap()
    }

    #[test]
    fn test_guess_validation() {
        assert!(Guess::new("crane", &[FeedbackMark::Absent; 5]).is_ok());
        assert!(matches!(
            Guess::new("cran", &[FeedbackMark::Absent; 5]),
            Err(BoardError::InvalidWordLength(4))
        ));
        assert!(matches!(
            Guess::new("cran3", &[FeedbackMark::Absent; 5]),
            Err(BoardError::InvalidWordCharacters)
        ));
        assert!(matches!(
            Guess::new("crane", &[FeedbackMark::Absent; 3]),
            Err(BoardError::InvalidFeedbackLength(3))
        ));
    }

    #[test]
    fn test_guess_normalizes_case() {
        let guess = Guess::new("CrAnE", &[FeedbackMark::Absent; 5]).unwrap();
        assert_eq!(guess.letters(), "crane");
    }

    #[test]
    fn test_append_caps_at_word_length() {
        let mut board = Board::new();
        for c in "cranes".chars() {
            board.append_letter(c);
        }
        // Sixth letter is a no-op.
        assert_eq!(board.pending(), "crane");

        for c in "abcdefghij".chars() {
            board.append_letter(c);
        }
        assert_eq!(board.pending().len(), WORD_LENGTH);
    }

    #[test]
    fn test_append_rejects_non_letters() {
        let mut board = Board::new();
        assert!(!board.append_letter('3'));
        assert!(!board.append_letter(' '));
        assert!(!board.append_letter('é'));
        assert!(board.append_letter('A'));
        assert_eq!(board.pending(), "a");
    }

    #[test]
    fn test_delete_letter() {
        let mut board = Board::new();
        board.append_letter('a');
        board.append_letter('b');
        assert!(board.delete_letter());
        assert_eq!(board.pending(), "a");
        assert!(board.delete_letter());
        assert!(!board.delete_letter());
        assert_eq!(board.pending(), "");
    }

    #[test]
    fn test_submission_requires_full_buffer() {
        let mut board = Board::new();
        assert_eq!(board.submission(), None);
        for c in "cran".chars() {
            board.append_letter(c);
        }
        assert_eq!(board.submission(), None);
        board.append_letter('e');
        assert_eq!(board.submission(), Some("crane"));
    }

    #[test]
    fn test_submission_does_not_clear_buffer() {
        let mut board = Board::new();
        for c in "crane".chars() {
            board.append_letter(c);
        }
        let _ = board.submission();
        assert_eq!(board.pending(), "crane");
    }

    #[test]
    fn test_local_ack_appends_and_clears_pending() {
        let mut board = Board::new();
        for c in "crane".chars() {
            board.append_letter(c);
        }

        let track = board
            .record_ack(PlayerRole::PlayerOne, PlayerRole::PlayerOne, ack("crane"))
            .unwrap();

        assert_eq!(track, GuessTrack::Local);
        assert_eq!(board.local_guesses().len(), 1);
        assert_eq!(board.pending(), "");
    }

    #[test]
    fn test_opponent_ack_keeps_pending() {
        let mut board = Board::new();
        board.append_letter('c');

        let track = board
            .record_ack(PlayerRole::PlayerOne, PlayerRole::PlayerTwo, ack("slate"))
            .unwrap();

        assert_eq!(track, GuessTrack::Opponent);
        assert_eq!(board.opponent_guesses().len(), 1);
        assert!(board.local_guesses().is_empty());
        assert_eq!(board.pending(), "c");
    }

    #[test]
    fn test_history_caps_at_max_guesses() {
        let mut board = Board::new();
        for _ in 0..MAX_GUESSES {
            board
                .record_ack(PlayerRole::PlayerOne, PlayerRole::PlayerOne, ack("crane"))
                .unwrap();
        }
        assert_eq!(board.local_guesses().len(), MAX_GUESSES);

        let result = board.record_ack(PlayerRole::PlayerOne, PlayerRole::PlayerOne, ack("crane"));
        assert_eq!(result, Err(BoardError::HistoryFull));
        assert_eq!(board.local_guesses().len(), MAX_GUESSES);
    }

    #[test]
    fn test_full_history_blocks_input() {
        let mut board = Board::new();
        for _ in 0..MAX_GUESSES {
            board
                .record_ack(PlayerRole::PlayerOne, PlayerRole::PlayerOne, ack("crane"))
                .unwrap();
        }

        assert!(!board.can_guess());
        assert!(!board.append_letter('a'));
        assert_eq!(board.pending(), "");
        assert_eq!(board.submission(), None);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut board = Board::new();
        let first = Outcome {
            winner: Some(PlayerRole::PlayerOne),
            word: "crane".to_string(),
        };

        assert!(board.resolve(first.clone()));
        assert!(!board.resolve(Outcome {
            winner: Some(PlayerRole::PlayerTwo),
            word: "slate".to_string(),
        }));
        assert_eq!(board.outcome(), Some(&first));
    }

    #[test]
    fn test_resolve_clears_pending_and_blocks_input() {
        let mut board = Board::new();
        for c in "cra".chars() {
            board.append_letter(c);
        }
        board.resolve(Outcome {
            winner: None,
            word: "crane".to_string(),
        });

        assert_eq!(board.pending(), "");
        assert!(!board.append_letter('x'));
        assert!(board.finished_at.is_some());
    }

    #[test]
    fn test_winning_guess() {
        assert!(winning("crane").is_winning());
        assert!(!ack("crane").is_winning());
    }
}
