//! Fjordle Game Engine
//!
//! Platform-agnostic core logic for the Fjordle daily fjord guessing game:
//! geo-scoring, the puzzle state machine, progress persistence and player
//! statistics. No UI, network or browser dependencies.

pub mod constants;
pub mod data;
pub mod engine;
pub mod geo;
pub mod numbers;
pub mod session;
pub mod share;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod storage;
pub mod weather;

// Re-export commonly used types
pub use data::{CatalogError, Fjord, FjordCatalog, FjordOption, Puzzle};
pub use engine::{
    Disposition, GuessOutcome, GuessSubmission, HintOutcome, can_submit_guess,
    create_initial_game_state, remaining_attempts, reveal_hint, submit_guess,
};
pub use geo::{
    CompassArrow, Coordinates, Direction, calculate_direction, calculate_distance,
    calculate_proximity, calculate_proximity_with_max,
};
#[cfg(feature = "async")]
pub use session::AsyncSessionStore;
pub use session::{
    DispatchReport, GuessRecord, Outbox, SessionCompletion, SessionEffect, SessionStore,
    SessionUpdate,
};
pub use share::share_text;
pub use snapshot::{ProgressSnapshot, SnapshotError, check_progression, decode_snapshot};
pub use state::{GameState, GameStatus, Guess, HintKind, HintState, Toast};
pub use stats::{Difficulty, PuzzleResult, StatsSummary, UserStats};
pub use storage::{
    DirStore, KeyValueStore, MemoryStore, ProgressIndex, ProgressRepository, StorageError,
    StoredProgress,
};
pub use weather::{Clock, Language, SystemClock, TtlCache, WeatherData};

use chrono::{DateTime, Utc};

/// Trait for abstracting puzzle lookups
/// Platform-specific implementations should provide this
pub trait PuzzleLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the puzzle with the given display number, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the puzzle source cannot be reached or parsed.
    fn load_puzzle(&self, puzzle_number: u32) -> Result<Option<Puzzle>, Self::Error>;

    /// Load the fjord catalog used for autocomplete.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or parsed.
    fn load_catalog(&self) -> Result<FjordCatalog, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("puzzle loader failed: {0}")]
    Loader(Box<dyn std::error::Error + Send + Sync>),
    #[error("puzzle #{0} not found")]
    PuzzleNotFound(u32),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Drives puzzles the way a client does: every transition is persisted, its
/// session effects are queued, and finished puzzles are counted once.
pub struct FjordleEngine<L, K>
where
    L: PuzzleLoader,
    K: KeyValueStore,
{
    loader: L,
    progress: ProgressRepository<K>,
    outbox: Outbox,
}

impl<L, K> FjordleEngine<L, K>
where
    L: PuzzleLoader,
    K: KeyValueStore,
{
    /// Create a new engine with the provided puzzle loader and store
    pub const fn new(loader: L, store: K) -> Self {
        Self {
            loader,
            progress: ProgressRepository::new(store),
            outbox: Outbox::new(),
        }
    }

    #[must_use]
    pub const fn progress(&self) -> &ProgressRepository<K> {
        &self.progress
    }

    pub const fn progress_mut(&mut self) -> &mut ProgressRepository<K> {
        &mut self.progress
    }

    #[must_use]
    pub const fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// # Errors
    ///
    /// Returns an error if the loader cannot produce the catalog.
    pub fn catalog(&self) -> Result<FjordCatalog, EngineError> {
        self.loader
            .load_catalog()
            .map_err(|err| EngineError::Loader(Box::new(err)))
    }

    /// Open a puzzle, resuming stored progress when it passes validation.
    ///
    /// Rejected progress is discarded and replaced by a fresh state. The
    /// backend session is requested once per puzzle and device session id.
    ///
    /// # Errors
    ///
    /// Returns an error if the puzzle cannot be loaded or the store fails.
    pub fn start(&mut self, puzzle_number: u32, now: DateTime<Utc>) -> Result<GameState, EngineError> {
        let puzzle = self
            .loader
            .load_puzzle(puzzle_number)
            .map_err(|err| EngineError::Loader(Box::new(err)))?
            .ok_or(EngineError::PuzzleNotFound(puzzle_number))?;
        let session_id = self.progress.session_id()?;
        let now_ms = now.timestamp_millis();

        match self.progress.load(puzzle.id, now_ms)? {
            StoredProgress::Valid(snapshot) => {
                log::debug!(
                    "resuming puzzle {} at attempt {}",
                    puzzle.id,
                    snapshot.attempts_used
                );
                return Ok(GameState::restore(puzzle, Some(session_id), snapshot));
            }
            StoredProgress::Rejected(err) => {
                log::warn!("discarding stored progress for puzzle {}: {err}", puzzle.id);
                self.progress.clear(puzzle.id)?;
            }
            StoredProgress::Missing => {}
        }

        let puzzle_id = puzzle.id;
        let state = create_initial_game_state(puzzle, Some(session_id.clone()));
        if self.progress.mark_session_opened(&session_id, puzzle_id)? {
            self.outbox.push(SessionEffect::CreateSession {
                session_id,
                puzzle_id,
            });
        } else {
            log::debug!("session {session_id} already open for puzzle {puzzle_id}");
        }
        self.persist(&state, now_ms)?;
        Ok(state)
    }

    /// Submit a guess and persist the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails. The transition itself never does.
    pub fn guess(
        &mut self,
        state: &GameState,
        submission: &GuessSubmission,
        now: DateTime<Utc>,
    ) -> Result<GuessOutcome, EngineError> {
        let mut outcome = submit_guess(state, submission);
        if !outcome.disposition.is_accepted() {
            return Ok(outcome);
        }
        let finishing = outcome.state.is_finished() && !outcome.state.stats_updated;
        outcome.state.stats_updated |= finishing;
        self.persist(&outcome.state, now.timestamp_millis())?;
        if finishing {
            self.record_stats(outcome.state.game_status == GameStatus::Won, now)?;
        }
        self.outbox.extend(outcome.effects.iter().cloned());
        Ok(outcome)
    }

    /// Reveal a hint and persist it when it was newly opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn reveal_hint(
        &mut self,
        state: &GameState,
        kind: HintKind,
        now: DateTime<Utc>,
    ) -> Result<HintOutcome, EngineError> {
        let outcome = reveal_hint(state, kind);
        if outcome.changed {
            self.persist(&outcome.state, now.timestamp_millis())?;
            self.outbox.extend(outcome.effects.iter().cloned());
        }
        Ok(outcome)
    }

    /// Deliver queued session effects. Failures are logged, never returned.
    pub fn dispatch<S: SessionStore + ?Sized>(&mut self, store: &mut S) -> DispatchReport {
        self.outbox.dispatch(store)
    }

    /// Hand the queued effects to the caller, e.g. for async delivery.
    pub fn take_effects(&mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn user_stats(&self) -> Result<UserStats, EngineError> {
        Ok(self.progress.load_stats()?)
    }

    fn record_stats(&mut self, won: bool, now: DateTime<Utc>) -> Result<(), EngineError> {
        let mut stats = self.progress.load_stats()?;
        stats.record_result(won, now.date_naive());
        self.progress.save_stats(&stats)?;
        log::debug!(
            "stats updated: {} played, streak {}",
            stats.games_played,
            stats.current_streak
        );
        Ok(())
    }

    fn persist(&mut self, state: &GameState, now_ms: i64) -> Result<(), EngineError> {
        if let Some(puzzle_id) = state.puzzle_id() {
            let snapshot = ProgressSnapshot::capture(puzzle_id, state, now_ms);
            self.progress.save(puzzle_id, &snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FixtureLoader {
        puzzles: HashMap<u32, Puzzle>,
    }

    impl FixtureLoader {
        fn with_geiranger() -> Self {
            let puzzle = Puzzle::from_json(
                r#"{
                    "id": 500,
                    "date": "2025-06-02",
                    "puzzle_number": 1,
                    "fjord": {
                        "id": 1, "name": "Geirangerfjorden", "svg_filename": "geiranger.svg",
                        "center_lat": 62.1049, "center_lng": 7.2067
                    }
                }"#,
            )
            .unwrap();
            Self {
                puzzles: HashMap::from([(1, puzzle)]),
            }
        }
    }

    impl PuzzleLoader for FixtureLoader {
        type Error = Infallible;

        fn load_puzzle(&self, puzzle_number: u32) -> Result<Option<Puzzle>, Self::Error> {
            Ok(self.puzzles.get(&puzzle_number).cloned())
        }

        fn load_catalog(&self) -> Result<FjordCatalog, Self::Error> {
            Ok(FjordCatalog::empty())
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("offline")]
    struct Offline;

    #[derive(Clone, Default)]
    struct FlakySessions {
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl SessionStore for FlakySessions {
        type Error = Offline;

        fn create_session(&mut self, _: &str, _: u32) -> Result<(), Offline> {
            self.log.borrow_mut().push("create");
            Ok(())
        }
        fn record_guess(&mut self, _: &GuessRecord) -> Result<(), Offline> {
            Err(Offline)
        }
        fn update_session(&mut self, _: &str, _: &SessionUpdate) -> Result<(), Offline> {
            self.log.borrow_mut().push("update");
            Ok(())
        }
        fn complete_session(&mut self, _: &str, _: &SessionCompletion) -> Result<(), Offline> {
            self.log.borrow_mut().push("complete");
            Ok(())
        }
        fn update_hints(&mut self, _: &str, _: &HintState) -> Result<(), Offline> {
            self.log.borrow_mut().push("hints");
            Ok(())
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn naeroy() -> GuessSubmission {
        GuessSubmission::new(2, "Nærøyfjorden", Coordinates::new(60.875, 6.75))
    }

    fn geiranger() -> GuessSubmission {
        GuessSubmission::new(1, "Geirangerfjorden", Coordinates::new(62.1049, 7.2067))
    }

    #[test]
    fn engine_resumes_stored_progress() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        let state = engine.start(1, at(2, 8)).unwrap();
        let session_id = state.session_id.clone().unwrap();
        let played = engine.guess(&state, &naeroy(), at(2, 9)).unwrap().state;

        let store = engine.progress.into_inner();
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), store);
        let resumed = engine.start(1, at(2, 10)).unwrap();
        assert_eq!(resumed.guesses, played.guesses);
        assert_eq!(resumed.attempts_used, 1);
        assert!(resumed.keep_going_message_shown);
        assert!(resumed.toast.is_none());
        assert_eq!(resumed.session_id.as_deref(), Some(session_id.as_str()));
        assert!(engine.outbox().is_empty());
    }

    #[test]
    fn corrupted_progress_falls_back_to_fresh_state() {
        let mut store = MemoryStore::new();
        store
            .set(&storage::progress_key(500), r#"{"puzzleId": 500, "attemptsUsed": 9}"#)
            .unwrap();
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), store);
        let state = engine.start(1, at(2, 8)).unwrap();
        assert_eq!(state.attempts_used, 0);
        assert_eq!(state.game_status, GameStatus::Playing);
        assert!(matches!(
            engine.progress().load(500, at(2, 8).timestamp_millis()).unwrap(),
            StoredProgress::Valid(_)
        ));
    }

    #[test]
    fn rejected_progress_keeps_the_existing_session() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        let first = engine.start(1, at(2, 8)).unwrap();
        engine
            .progress_mut()
            .store_mut()
            .set(&storage::progress_key(500), "{corrupt")
            .unwrap();
        let second = engine.start(1, at(2, 9)).unwrap();
        assert_eq!(second.attempts_used, 0);
        assert_eq!(second.session_id, first.session_id);

        let creates: Vec<_> = engine
            .outbox()
            .iter()
            .filter(|effect| matches!(effect, SessionEffect::CreateSession { .. }))
            .collect();
        assert_eq!(creates.len(), 1);
    }

    #[test]
    fn new_device_session_opens_the_puzzle_again() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        engine.start(1, at(2, 8)).unwrap();
        engine.take_effects();
        let store = engine.progress_mut().store_mut();
        store.remove(constants::SESSION_ID_KEY).unwrap();
        store.remove(&storage::progress_key(500)).unwrap();

        let state = engine.start(1, at(2, 9)).unwrap();
        let effects = engine.take_effects().take();
        assert_eq!(effects.len(), 1);
        assert!(matches!(
            &effects[0],
            SessionEffect::CreateSession { session_id, puzzle_id: 500 }
                if Some(session_id) == state.session_id.as_ref()
        ));
    }

    #[test]
    fn stale_state_cannot_overwrite_newer_progress() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        let state = engine.start(1, at(2, 8)).unwrap();
        let hinted = engine
            .reveal_hint(&state, HintKind::Counties, at(2, 8))
            .unwrap()
            .state;

        let stale = engine.guess(&state, &naeroy(), at(2, 9));
        assert!(matches!(
            stale,
            Err(EngineError::Storage(StorageError::Stale(SnapshotError::HintsRegressed)))
        ));
        let resumed = engine.start(1, at(2, 10)).unwrap();
        assert_eq!(resumed.hints_used, hinted.hints_used);
        assert_eq!(resumed.attempts_used, 0);
        assert!(
            !engine
                .outbox()
                .iter()
                .any(|effect| matches!(effect, SessionEffect::RecordGuess(_)))
        );
    }

    #[test]
    fn unknown_puzzle_is_an_error() {
        let mut engine = FjordleEngine::new(FixtureLoader::default(), MemoryStore::new());
        assert!(matches!(
            engine.start(3, at(2, 8)),
            Err(EngineError::PuzzleNotFound(3))
        ));
    }

    #[test]
    fn finished_puzzle_counts_once() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        let state = engine.start(1, at(2, 8)).unwrap();
        let won = engine.guess(&state, &geiranger(), at(2, 9)).unwrap();
        assert!(won.state.stats_updated);

        let stats = engine.user_stats().unwrap();
        assert_eq!(stats.games_played, 1);
        assert_eq!(stats.games_won, 1);
        assert_eq!(stats.last_played_date, NaiveDate::from_ymd_opt(2025, 6, 2));

        // A guess after the end is a no-op and does not count again.
        let again = engine.guess(&won.state, &naeroy(), at(2, 10)).unwrap();
        assert_eq!(again.disposition, Disposition::GameOver);
        assert_eq!(engine.user_stats().unwrap().games_played, 1);

        // Reopening the finished puzzle keeps the flag.
        let reopened = engine.start(1, at(2, 11)).unwrap();
        assert!(reopened.stats_updated);
        assert_eq!(reopened.game_status, GameStatus::Won);
    }

    #[test]
    fn session_failures_do_not_touch_local_state() {
        let mut engine = FjordleEngine::new(FixtureLoader::with_geiranger(), MemoryStore::new());
        let state = engine.start(1, at(2, 8)).unwrap();
        let hinted = engine
            .reveal_hint(&state, HintKind::Satellite, at(2, 8))
            .unwrap()
            .state;
        let first = engine.guess(&hinted, &naeroy(), at(2, 9)).unwrap().state;
        let done = engine.guess(&first, &geiranger(), at(2, 9)).unwrap().state;

        let mut sessions = FlakySessions::default();
        let report = engine.dispatch(&mut sessions);
        assert_eq!(report.failed, 2);
        assert_eq!(report.delivered, 5);
        assert_eq!(
            *sessions.log.borrow(),
            vec!["create", "hints", "update", "update", "complete"]
        );
        assert_eq!(done.game_status, GameStatus::Won);
        assert!(done.hints_used.is_revealed(HintKind::Satellite));
        assert!(engine.take_effects().is_empty());
    }
}
