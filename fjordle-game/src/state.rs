use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

use crate::constants::{MAX_ATTEMPTS, TOAST_DUPLICATE_GUESS, TOAST_KEEP_GOING, TOAST_SO_CLOSE};
use crate::data::Puzzle;
use crate::geo::Direction;

/// Guess ledger. Never longer than `MAX_ATTEMPTS`, so it stays inline.
pub type GuessList = SmallVec<[Guess; MAX_ATTEMPTS as usize]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    #[default]
    Playing,
    Won,
    Lost,
}

impl GameStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Playing)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "playing" => Ok(Self::Playing),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            _ => Err(()),
        }
    }
}

/// One accepted submission. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guess {
    pub fjord_id: u32,
    pub fjord_name: String,
    /// Whole kilometres to the target centre.
    pub distance: u32,
    pub direction: Direction,
    pub proximity_percent: f64,
    pub is_correct: bool,
    /// 1-based.
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HintKind {
    FirstLetter,
    Satellite,
    Municipalities,
    Counties,
    Measurements,
    Weather,
}

impl HintKind {
    pub const ALL: [Self; 6] = [
        Self::FirstLetter,
        Self::Satellite,
        Self::Municipalities,
        Self::Counties,
        Self::Measurements,
        Self::Weather,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FirstLetter => "firstLetter",
            Self::Satellite => "satellite",
            Self::Municipalities => "municipalities",
            Self::Counties => "counties",
            Self::Measurements => "measurements",
            Self::Weather => "weather",
        }
    }
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Independent, monotonic hint flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct HintState {
    pub first_letter: bool,
    pub satellite: bool,
    pub municipalities: bool,
    pub counties: bool,
    pub measurements: bool,
    pub weather: bool,
}

impl HintState {
    #[must_use]
    pub const fn is_revealed(&self, kind: HintKind) -> bool {
        match kind {
            HintKind::FirstLetter => self.first_letter,
            HintKind::Satellite => self.satellite,
            HintKind::Municipalities => self.municipalities,
            HintKind::Counties => self.counties,
            HintKind::Measurements => self.measurements,
            HintKind::Weather => self.weather,
        }
    }

    /// Set the flag for `kind`. Returns `true` when it was previously unset.
    pub const fn reveal(&mut self, kind: HintKind) -> bool {
        let flag = match kind {
            HintKind::FirstLetter => &mut self.first_letter,
            HintKind::Satellite => &mut self.satellite,
            HintKind::Municipalities => &mut self.municipalities,
            HintKind::Counties => &mut self.counties,
            HintKind::Measurements => &mut self.measurements,
            HintKind::Weather => &mut self.weather,
        };
        let changed = !*flag;
        *flag = true;
        changed
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        HintKind::ALL
            .iter()
            .map(|kind| u32::from(self.is_revealed(*kind)))
            .sum()
    }

    /// Every flag set in `self` is also set in `later`.
    #[must_use]
    pub fn is_subset_of(&self, later: &Self) -> bool {
        HintKind::ALL
            .iter()
            .all(|kind| !self.is_revealed(*kind) || later.is_revealed(*kind))
    }
}

/// Transient notification requested by a transition, cleared after display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Toast {
    #[serde(rename = "KEEP_GOING_MESSAGE")]
    KeepGoing,
    SoClose,
    DuplicateGuess { fjord_name: String },
}

impl Toast {
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        match self {
            Self::KeepGoing => TOAST_KEEP_GOING,
            Self::SoClose => TOAST_SO_CLOSE,
            Self::DuplicateGuess { .. } => TOAST_DUPLICATE_GUESS,
        }
    }
}

/// Aggregate root for one puzzle attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameState {
    pub puzzle: Option<Puzzle>,
    pub guesses: GuessList,
    pub attempts_used: u32,
    pub game_status: GameStatus,
    pub hints_used: HintState,
    pub keep_going_message_shown: bool,
    pub toast: Option<Toast>,
    pub session_id: Option<String>,
    pub stats_updated: bool,
}

impl GameState {
    #[must_use]
    pub fn puzzle_id(&self) -> Option<u32> {
        self.puzzle.as_ref().map(|puzzle| puzzle.id)
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.game_status.is_terminal()
    }

    #[must_use]
    pub fn has_guessed(&self, fjord_id: u32) -> bool {
        self.guesses.iter().any(|guess| guess.fjord_id == fjord_id)
    }

    #[must_use]
    pub fn last_guess(&self) -> Option<&Guess> {
        self.guesses.last()
    }

    /// Acknowledge the toast once the UI has shown it.
    pub fn clear_toast(&mut self) {
        self.toast = None;
    }

    /// Attempts left before the puzzle is lost.
    #[must_use]
    pub const fn remaining_attempts(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts_used)
    }
}
