//! Persisted per-puzzle progress and its validating decoder.
//!
//! The JSON shape matches what the web client writes to local storage, so a
//! snapshot written by either side can be read by the other.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::{MAX_ATTEMPTS, SNAPSHOT_CLOCK_SKEW_MS, SNAPSHOT_EARLIEST_TIMESTAMP_MS};
use crate::data::Puzzle;
use crate::state::{GameState, GameStatus, Guess, GuessList, HintState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub puzzle_id: u32,
    pub guesses: Vec<Guess>,
    pub attempts_used: u32,
    pub game_status: GameStatus,
    pub stats_updated: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub keep_going_message_shown: bool,
    #[serde(default)]
    pub hints_used: HintState,
}

impl ProgressSnapshot {
    /// Freeze the persistent part of `state`.
    #[must_use]
    pub fn capture(puzzle_id: u32, state: &GameState, now_ms: i64) -> Self {
        Self {
            session_id: state.session_id.clone(),
            puzzle_id,
            guesses: state.guesses.to_vec(),
            attempts_used: state.attempts_used,
            game_status: state.game_status,
            stats_updated: state.stats_updated,
            timestamp: now_ms,
            keep_going_message_shown: state.keep_going_message_shown,
            hints_used: state.hints_used,
        }
    }

    /// Serialize to the stored JSON form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why a stored snapshot was refused.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("snapshot belongs to puzzle {found}, expected {expected}")]
    PuzzleMismatch { expected: u32, found: u32 },
    #[error("attemptsUsed is {attempts} but {guesses} guesses are stored")]
    AttemptCountMismatch { attempts: u32, guesses: usize },
    #[error("{0} attempts exceeds the maximum")]
    TooManyAttempts(u32),
    #[error("guess {index} has attempt number {found}")]
    AttemptOutOfSequence { index: usize, found: u32 },
    #[error("fjord {0} guessed more than once")]
    DuplicateGuess(u32),
    #[error("proximity {0} outside 0..=100")]
    ProximityOutOfRange(f64),
    #[error("timestamp {timestamp} outside accepted window (now {now})")]
    TimestampOutOfRange { timestamp: i64, now: i64 },
    #[error("correct guess at position {0} is not the last guess")]
    CorrectGuessNotLast(usize),
    #[error("status {status} inconsistent with stored guesses")]
    InconsistentStatus { status: GameStatus },
    #[error("{found} guesses do not extend the {stored} already stored")]
    GuessesRegressed { stored: usize, found: usize },
    #[error("a hint revealed earlier is missing")]
    HintsRegressed,
}

/// Parse and validate a stored snapshot.
///
/// Checks run in a fixed order and the first failure wins.
///
/// # Errors
///
/// Returns the [`SnapshotError`] describing the first failed check.
pub fn decode_snapshot(
    raw: &str,
    expected_puzzle_id: u32,
    now_ms: i64,
) -> Result<ProgressSnapshot, SnapshotError> {
    let snapshot: ProgressSnapshot = serde_json::from_str(raw)?;
    validate_snapshot(&snapshot, expected_puzzle_id, now_ms)?;
    Ok(snapshot)
}

/// Run the consistency checks on an already parsed snapshot.
///
/// # Errors
///
/// Returns the [`SnapshotError`] describing the first failed check.
pub fn validate_snapshot(
    snapshot: &ProgressSnapshot,
    expected_puzzle_id: u32,
    now_ms: i64,
) -> Result<(), SnapshotError> {
    if snapshot.puzzle_id != expected_puzzle_id {
        return Err(SnapshotError::PuzzleMismatch {
            expected: expected_puzzle_id,
            found: snapshot.puzzle_id,
        });
    }

    let guesses = &snapshot.guesses;
    if usize::try_from(snapshot.attempts_used).ok() != Some(guesses.len()) {
        return Err(SnapshotError::AttemptCountMismatch {
            attempts: snapshot.attempts_used,
            guesses: guesses.len(),
        });
    }
    if snapshot.attempts_used > MAX_ATTEMPTS {
        return Err(SnapshotError::TooManyAttempts(snapshot.attempts_used));
    }

    let mut seen = HashSet::with_capacity(guesses.len());
    for (index, guess) in guesses.iter().enumerate() {
        let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
        if guess.attempt_number != expected {
            return Err(SnapshotError::AttemptOutOfSequence {
                index,
                found: guess.attempt_number,
            });
        }
        if !seen.insert(guess.fjord_id) {
            return Err(SnapshotError::DuplicateGuess(guess.fjord_id));
        }
        if !(0.0..=100.0).contains(&guess.proximity_percent) {
            return Err(SnapshotError::ProximityOutOfRange(guess.proximity_percent));
        }
    }

    let latest = now_ms.saturating_add(SNAPSHOT_CLOCK_SKEW_MS);
    if snapshot.timestamp < SNAPSHOT_EARLIEST_TIMESTAMP_MS || snapshot.timestamp > latest {
        return Err(SnapshotError::TimestampOutOfRange {
            timestamp: snapshot.timestamp,
            now: now_ms,
        });
    }

    check_completion(snapshot)
}

fn check_completion(snapshot: &ProgressSnapshot) -> Result<(), SnapshotError> {
    let guesses = &snapshot.guesses;
    if let Some(index) = guesses
        .iter()
        .position(|guess| guess.is_correct)
        .filter(|index| index + 1 != guesses.len())
    {
        return Err(SnapshotError::CorrectGuessNotLast(index));
    }

    let last_correct = guesses.last().is_some_and(|guess| guess.is_correct);
    let consistent = match snapshot.game_status {
        GameStatus::Won => last_correct,
        GameStatus::Lost => !last_correct && snapshot.attempts_used == MAX_ATTEMPTS,
        GameStatus::Playing => !last_correct && snapshot.attempts_used < MAX_ATTEMPTS,
    };
    if consistent {
        Ok(())
    } else {
        Err(SnapshotError::InconsistentStatus {
            status: snapshot.game_status,
        })
    }
}

/// Check that `next` only moves `previous` forward: the stored guesses stay
/// a prefix and no revealed hint is lost.
///
/// # Errors
///
/// Returns [`SnapshotError::GuessesRegressed`] or
/// [`SnapshotError::HintsRegressed`].
pub fn check_progression(
    previous: &ProgressSnapshot,
    next: &ProgressSnapshot,
) -> Result<(), SnapshotError> {
    if !next.guesses.starts_with(&previous.guesses) {
        return Err(SnapshotError::GuessesRegressed {
            stored: previous.guesses.len(),
            found: next.guesses.len(),
        });
    }
    if !previous.hints_used.is_subset_of(&next.hints_used) {
        return Err(SnapshotError::HintsRegressed);
    }
    Ok(())
}

impl GameState {
    /// Rebuild a runtime state from a validated snapshot. A session id in
    /// the snapshot wins over `session_id`.
    #[must_use]
    pub fn restore(puzzle: Puzzle, session_id: Option<String>, snapshot: ProgressSnapshot) -> Self {
        Self {
            puzzle: Some(puzzle),
            guesses: GuessList::from_vec(snapshot.guesses),
            attempts_used: snapshot.attempts_used,
            game_status: snapshot.game_status,
            hints_used: snapshot.hints_used,
            keep_going_message_shown: snapshot.keep_going_message_shown,
            toast: None,
            session_id: snapshot.session_id.or(session_id),
            stats_updated: snapshot.stats_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{CompassArrow, Direction};
    use crate::state::HintKind;

    const NOW: i64 = 1_750_000_000_000;

    fn miss(fjord_id: u32, attempt_number: u32) -> Guess {
        Guess {
            fjord_id,
            fjord_name: format!("Fjord {fjord_id}"),
            distance: 250,
            direction: Direction::Compass(CompassArrow::SouthWest),
            proximity_percent: 89.0,
            is_correct: false,
            attempt_number,
        }
    }

    fn hit(fjord_id: u32, attempt_number: u32) -> Guess {
        Guess {
            distance: 0,
            direction: Direction::ExactHit,
            proximity_percent: 100.0,
            is_correct: true,
            ..miss(fjord_id, attempt_number)
        }
    }

    fn snapshot(guesses: Vec<Guess>, status: GameStatus) -> ProgressSnapshot {
        ProgressSnapshot {
            session_id: None,
            puzzle_id: 7,
            attempts_used: u32::try_from(guesses.len()).unwrap(),
            guesses,
            game_status: status,
            stats_updated: false,
            timestamp: NOW - 60_000,
            keep_going_message_shown: true,
            hints_used: HintState::default(),
        }
    }

    fn check(snapshot: &ProgressSnapshot) -> Result<(), SnapshotError> {
        validate_snapshot(snapshot, 7, NOW)
    }

    #[test]
    fn accepts_consistent_snapshots() {
        check(&snapshot(vec![], GameStatus::Playing)).unwrap();
        check(&snapshot(vec![miss(1, 1), hit(2, 2)], GameStatus::Won)).unwrap();
        let six: Vec<Guess> = (1..=6).map(|n| miss(n, n)).collect();
        check(&snapshot(six, GameStatus::Lost)).unwrap();
    }

    #[test]
    fn progression_only_moves_forward() {
        let first = snapshot(vec![miss(1, 1)], GameStatus::Playing);
        let mut second = snapshot(vec![miss(1, 1), miss(3, 2)], GameStatus::Playing);
        second.hints_used.reveal(HintKind::Municipalities);
        check_progression(&first, &second).unwrap();
        check_progression(&second, &second).unwrap();

        assert!(matches!(
            check_progression(&second, &first),
            Err(SnapshotError::GuessesRegressed { stored: 2, found: 1 })
        ));
        let rewritten = snapshot(vec![miss(4, 1), miss(3, 2)], GameStatus::Playing);
        assert!(matches!(
            check_progression(&first, &rewritten),
            Err(SnapshotError::GuessesRegressed { .. })
        ));
        let mut unhinted = second.clone();
        unhinted.hints_used = HintState::default();
        assert!(matches!(
            check_progression(&second, &unhinted),
            Err(SnapshotError::HintsRegressed)
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(
            decode_snapshot("{not json", 7, NOW),
            Err(SnapshotError::Malformed(_))
        ));
        assert!(matches!(
            decode_snapshot(r#"{"puzzleId": 7}"#, 7, NOW),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_wrong_puzzle_and_counts() {
        let mut snap = snapshot(vec![miss(1, 1)], GameStatus::Playing);
        assert!(matches!(
            validate_snapshot(&snap, 8, NOW),
            Err(SnapshotError::PuzzleMismatch { expected: 8, found: 7 })
        ));

        snap.attempts_used = 2;
        assert!(matches!(
            check(&snap),
            Err(SnapshotError::AttemptCountMismatch { attempts: 2, guesses: 1 })
        ));

        let seven: Vec<Guess> = (1..=7).map(|n| miss(n, n)).collect();
        assert!(matches!(
            check(&snapshot(seven, GameStatus::Lost)),
            Err(SnapshotError::TooManyAttempts(7))
        ));
    }

    #[test]
    fn rejects_bad_guess_rows() {
        let gap = snapshot(vec![miss(1, 1), miss(2, 3)], GameStatus::Playing);
        assert!(matches!(
            check(&gap),
            Err(SnapshotError::AttemptOutOfSequence { index: 1, found: 3 })
        ));

        let dup = snapshot(vec![miss(4, 1), miss(4, 2)], GameStatus::Playing);
        assert!(matches!(check(&dup), Err(SnapshotError::DuplicateGuess(4))));

        let mut wild = miss(1, 1);
        wild.proximity_percent = 140.0;
        assert!(matches!(
            check(&snapshot(vec![wild], GameStatus::Playing)),
            Err(SnapshotError::ProximityOutOfRange(_))
        ));
    }

    #[test]
    fn timestamp_window() {
        let mut snap = snapshot(vec![], GameStatus::Playing);
        snap.timestamp = SNAPSHOT_EARLIEST_TIMESTAMP_MS - 1;
        assert!(matches!(check(&snap), Err(SnapshotError::TimestampOutOfRange { .. })));
        snap.timestamp = NOW + SNAPSHOT_CLOCK_SKEW_MS;
        check(&snap).unwrap();
        snap.timestamp = NOW + SNAPSHOT_CLOCK_SKEW_MS + 1;
        assert!(matches!(check(&snap), Err(SnapshotError::TimestampOutOfRange { .. })));
    }

    #[test]
    fn completion_must_match_status() {
        let early_hit = snapshot(vec![hit(1, 1), miss(2, 2)], GameStatus::Won);
        assert!(matches!(check(&early_hit), Err(SnapshotError::CorrectGuessNotLast(0))));

        let won_without_hit = snapshot(vec![miss(1, 1)], GameStatus::Won);
        assert!(matches!(
            check(&won_without_hit),
            Err(SnapshotError::InconsistentStatus { status: GameStatus::Won })
        ));

        let lost_early = snapshot(vec![miss(1, 1)], GameStatus::Lost);
        assert!(matches!(check(&lost_early), Err(SnapshotError::InconsistentStatus { .. })));

        let playing_after_hit = snapshot(vec![hit(1, 1)], GameStatus::Playing);
        assert!(matches!(
            check(&playing_after_hit),
            Err(SnapshotError::InconsistentStatus { status: GameStatus::Playing })
        ));
    }

    #[test]
    fn older_snapshots_without_new_fields_decode() {
        let raw = format!(
            r#"{{
                "puzzleId": 7,
                "guesses": [{{
                    "fjordId": 3, "fjordName": "Hardangerfjorden", "distance": 180,
                    "direction": "↗", "proximityPercent": 91, "isCorrect": false,
                    "attemptNumber": 1
                }}],
                "attemptsUsed": 1,
                "gameStatus": "playing",
                "statsUpdated": false,
                "timestamp": {ts}
            }}"#,
            ts = NOW - 1000
        );
        let snap = decode_snapshot(&raw, 7, NOW).unwrap();
        assert!(!snap.keep_going_message_shown);
        assert_eq!(snap.hints_used, HintState::default());
        assert_eq!(
            snap.guesses[0].direction,
            Direction::Compass(CompassArrow::NorthEast)
        );
    }
}
