//! Puzzle lifecycle: guess submission and hint reveals.
//!
//! Every transition takes the current state by reference and returns a new
//! one together with the session effects it wants delivered. Nothing here
//! performs I/O.

use crate::constants::{MAX_ATTEMPTS, SO_CLOSE_THRESHOLD};
use crate::data::{FjordOption, Puzzle};
use crate::geo::{Coordinates, Direction, calculate_proximity};
use crate::session::{GuessRecord, SessionCompletion, SessionEffect, SessionUpdate};
use crate::state::{GameState, GameStatus, Guess, HintKind, Toast};

/// A player's resolved autocomplete selection.
#[derive(Debug, Clone, PartialEq)]
pub struct GuessSubmission {
    pub fjord_id: u32,
    pub fjord_name: String,
    pub coordinates: Coordinates,
}

impl GuessSubmission {
    #[must_use]
    pub fn new(fjord_id: u32, fjord_name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            fjord_id,
            fjord_name: fjord_name.into(),
            coordinates,
        }
    }
}

impl From<&FjordOption> for GuessSubmission {
    fn from(option: &FjordOption) -> Self {
        Self::new(option.id, option.name.clone(), option.coordinates())
    }
}

/// What a submission did to the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// No puzzle loaded yet; state unchanged.
    NoPuzzle,
    /// Puzzle already won or lost; state unchanged.
    GameOver,
    /// Fjord already guessed; only the toast changed.
    Duplicate,
    Accepted,
}

impl Disposition {
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuessOutcome {
    pub state: GameState,
    pub is_correct: bool,
    pub disposition: Disposition,
    pub effects: Vec<SessionEffect>,
}

impl GuessOutcome {
    fn rejected(state: GameState, disposition: Disposition) -> Self {
        Self {
            state,
            is_correct: false,
            disposition,
            effects: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HintOutcome {
    pub state: GameState,
    /// `false` when the hint was already open.
    pub changed: bool,
    pub effects: Vec<SessionEffect>,
}

/// Fresh `Playing` state for `puzzle`.
#[must_use]
pub fn create_initial_game_state(puzzle: Puzzle, session_id: Option<String>) -> GameState {
    GameState {
        puzzle: Some(puzzle),
        session_id,
        ..GameState::default()
    }
}

/// Attempts left; never negative.
#[must_use]
pub const fn remaining_attempts(state: &GameState) -> u32 {
    state.remaining_attempts()
}

/// Whether the submit button should be enabled for the current selection.
#[must_use]
pub fn can_submit_guess(state: &GameState, selection: Option<&FjordOption>) -> bool {
    state.puzzle.is_some()
        && !state.is_finished()
        && selection.is_some_and(|fjord| !fjord.name.trim().is_empty())
}

/// Apply one guess.
///
/// Guard paths (no puzzle, finished game, repeated fjord) return the input
/// state unchanged apart from the duplicate toast, with no effects.
#[must_use]
pub fn submit_guess(state: &GameState, submission: &GuessSubmission) -> GuessOutcome {
    let Some(puzzle) = state.puzzle.as_ref() else {
        return GuessOutcome::rejected(state.clone(), Disposition::NoPuzzle);
    };
    if state.is_finished() {
        return GuessOutcome::rejected(state.clone(), Disposition::GameOver);
    }
    if state.has_guessed(submission.fjord_id) {
        log::debug!("duplicate guess of fjord {}", submission.fjord_id);
        let mut next = state.clone();
        next.toast = Some(Toast::DuplicateGuess {
            fjord_name: submission.fjord_name.clone(),
        });
        return GuessOutcome::rejected(next, Disposition::Duplicate);
    }

    let target = &puzzle.fjord;
    let is_correct = submission.fjord_id == target.id;
    let (distance, direction, proximity_percent) = if is_correct {
        (0, Direction::ExactHit, 100.0)
    } else {
        let distance = submission.coordinates.distance_to(target.coordinates());
        let arrow = submission.coordinates.direction_to(target.coordinates());
        (distance, Direction::Compass(arrow), calculate_proximity(distance))
    };

    let mut next = state.clone();
    next.attempts_used += 1;
    let guess = Guess {
        fjord_id: submission.fjord_id,
        fjord_name: submission.fjord_name.clone(),
        distance,
        direction,
        proximity_percent,
        is_correct,
        attempt_number: next.attempts_used,
    };
    next.guesses.push(guess);

    next.game_status = if is_correct {
        GameStatus::Won
    } else if next.attempts_used >= MAX_ATTEMPTS {
        GameStatus::Lost
    } else {
        GameStatus::Playing
    };

    next.toast = select_toast(&mut next, is_correct, proximity_percent);

    log::debug!(
        "puzzle {} attempt {}: fjord {} -> {} km {} {}% ({})",
        puzzle.id,
        next.attempts_used,
        submission.fjord_id,
        distance,
        direction,
        proximity_percent,
        next.game_status
    );

    let effects = next
        .session_id
        .as_deref()
        .map(|session_id| guess_effects(session_id, puzzle.id, state.game_status, &next))
        .unwrap_or_default();

    GuessOutcome {
        state: next,
        is_correct,
        disposition: Disposition::Accepted,
        effects,
    }
}

/// At most one toast per submission. Keep-going outranks so-close and fires
/// once per attempt.
fn select_toast(next: &mut GameState, is_correct: bool, proximity_percent: f64) -> Option<Toast> {
    if is_correct {
        return None;
    }
    if next.attempts_used == 1 && !next.keep_going_message_shown {
        next.keep_going_message_shown = true;
        return Some(Toast::KeepGoing);
    }
    if proximity_percent > SO_CLOSE_THRESHOLD {
        return Some(Toast::SoClose);
    }
    None
}

fn guess_effects(
    session_id: &str,
    puzzle_id: u32,
    previous_status: GameStatus,
    next: &GameState,
) -> Vec<SessionEffect> {
    let Some(guess) = next.last_guess() else {
        return Vec::new();
    };
    let won = next.game_status == GameStatus::Won;
    let completed = next.is_finished();

    let mut effects = vec![
        SessionEffect::RecordGuess(GuessRecord {
            session_id: session_id.to_string(),
            puzzle_id,
            guessed_fjord_id: guess.fjord_id,
            is_correct: guess.is_correct,
            distance_km: guess.distance,
            proximity_percent: guess.proximity_percent,
            attempt_number: guess.attempt_number,
        }),
        SessionEffect::UpdateSession {
            session_id: session_id.to_string(),
            update: SessionUpdate {
                attempts_used: Some(next.attempts_used),
                won: Some(won),
                completed: Some(completed),
            },
        },
    ];
    if completed && !previous_status.is_terminal() {
        effects.push(SessionEffect::CompleteSession {
            session_id: session_id.to_string(),
            completion: SessionCompletion {
                attempts_used: next.attempts_used,
                won,
            },
        });
    }
    effects
}

/// Open a hint. Idempotent, never consumes an attempt.
#[must_use]
pub fn reveal_hint(state: &GameState, kind: HintKind) -> HintOutcome {
    let mut next = state.clone();
    let changed = next.hints_used.reveal(kind);
    let effects = match next.session_id.as_deref() {
        Some(session_id) if changed => vec![SessionEffect::UpdateSessionHints {
            session_id: session_id.to_string(),
            hints: next.hints_used,
        }],
        _ => Vec::new(),
    };
    if changed {
        log::debug!("hint {kind} revealed ({} open)", next.hints_used.count());
    }
    HintOutcome {
        state: next,
        changed,
        effects,
    }
}
