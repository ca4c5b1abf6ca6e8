use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use fjordle_game::{AsyncSessionStore, GuessRecord, HintState, SessionCompletion, SessionUpdate};

#[derive(Debug, thiserror::Error)]
pub enum SessionLogError {
    #[error("session {0} was never created")]
    UnknownSession(String),
    #[error("session {0} already completed")]
    AlreadyCompleted(String),
}

#[derive(Debug, Default)]
struct Ledger {
    open: HashSet<String>,
    completed: HashSet<String>,
    puzzles: HashSet<(String, u32)>,
    counts: BTreeMap<&'static str, usize>,
}

impl Ledger {
    fn require_open(&self, session_id: &str) -> Result<(), SessionLogError> {
        if self.completed.contains(session_id) {
            return Err(SessionLogError::AlreadyCompleted(session_id.to_string()));
        }
        if !self.open.contains(session_id) {
            return Err(SessionLogError::UnknownSession(session_id.to_string()));
        }
        Ok(())
    }

    fn require_known(&self, session_id: &str) -> Result<(), SessionLogError> {
        if self.open.contains(session_id) || self.completed.contains(session_id) {
            Ok(())
        } else {
            Err(SessionLogError::UnknownSession(session_id.to_string()))
        }
    }

    fn bump(&mut self, label: &'static str) {
        *self.counts.entry(label).or_insert(0) += 1;
    }
}

/// In-process stand-in for the session backend.
///
/// Logs every call and rejects guesses or updates for sessions that were
/// never created or are already completed. The device session id is reused
/// across puzzles, so creating it for another puzzle reopens it.
#[derive(Debug, Default)]
pub struct LoggingSessionStore {
    ledger: Mutex<Ledger>,
}

impl LoggingSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Calls accepted so far, keyed by effect label.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        self.ledger().counts.clone()
    }

    #[must_use]
    pub fn completed_sessions(&self) -> usize {
        self.ledger().completed.len()
    }
}

#[async_trait]
impl AsyncSessionStore for LoggingSessionStore {
    type Error = SessionLogError;

    async fn session_exists(&self, session_id: &str, puzzle_id: u32) -> Result<bool, Self::Error> {
        Ok(self
            .ledger()
            .puzzles
            .contains(&(session_id.to_string(), puzzle_id)))
    }

    async fn create_session(&self, session_id: &str, puzzle_id: u32) -> Result<(), Self::Error> {
        log::info!("session {session_id} opened for puzzle {puzzle_id}");
        let mut ledger = self.ledger();
        ledger.puzzles.insert((session_id.to_string(), puzzle_id));
        ledger.completed.remove(session_id);
        ledger.open.insert(session_id.to_string());
        ledger.bump("create_session");
        Ok(())
    }

    async fn record_guess(&self, record: &GuessRecord) -> Result<(), Self::Error> {
        let mut ledger = self.ledger();
        ledger.require_open(&record.session_id)?;
        log::info!(
            "session {} guess #{}: fjord {} at {} km ({}%)",
            record.session_id,
            record.attempt_number,
            record.guessed_fjord_id,
            record.distance_km,
            record.proximity_percent
        );
        ledger.bump("record_guess");
        Ok(())
    }

    async fn update_session(
        &self,
        session_id: &str,
        update: &SessionUpdate,
    ) -> Result<(), Self::Error> {
        let mut ledger = self.ledger();
        ledger.require_open(session_id)?;
        log::debug!("session {session_id} update {update:?}");
        ledger.bump("update_session");
        Ok(())
    }

    async fn complete_session(
        &self,
        session_id: &str,
        completion: &SessionCompletion,
    ) -> Result<(), Self::Error> {
        let mut ledger = self.ledger();
        ledger.require_open(session_id)?;
        log::info!(
            "session {session_id} completed in {} attempts (won: {})",
            completion.attempts_used,
            completion.won
        );
        ledger.open.remove(session_id);
        ledger.completed.insert(session_id.to_string());
        ledger.bump("complete_session");
        Ok(())
    }

    async fn update_hints(&self, session_id: &str, hints: &HintState) -> Result<(), Self::Error> {
        let mut ledger = self.ledger();
        ledger.require_known(session_id)?;
        log::debug!("session {session_id} hints now {}", hints.count());
        ledger.bump("update_session_hints");
        Ok(())
    }
}
