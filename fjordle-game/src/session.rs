//! Remote session bookkeeping as data.
//!
//! Transitions never talk to the backend. They return [`SessionEffect`]
//! requests which the caller queues in an [`Outbox`] and dispatches to a
//! [`SessionStore`] whenever convenient. Delivery failures are logged and
//! dropped; local game state stays authoritative.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::state::HintState;

/// Payload of the record-guess call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuessRecord {
    pub session_id: String,
    pub puzzle_id: u32,
    pub guessed_fjord_id: u32,
    pub is_correct: bool,
    pub distance_km: u32,
    pub proximity_percent: f64,
    pub attempt_number: u32,
}

/// Aggregate counters pushed after every accepted guess. Absent fields are
/// left untouched by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub won: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompletion {
    pub attempts_used: u32,
    pub won: bool,
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEffect {
    CreateSession {
        session_id: String,
        puzzle_id: u32,
    },
    RecordGuess(GuessRecord),
    UpdateSession {
        session_id: String,
        update: SessionUpdate,
    },
    CompleteSession {
        session_id: String,
        completion: SessionCompletion,
    },
    UpdateSessionHints {
        session_id: String,
        hints: HintState,
    },
}

impl SessionEffect {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateSession { .. } => "create_session",
            Self::RecordGuess(_) => "record_guess",
            Self::UpdateSession { .. } => "update_session",
            Self::CompleteSession { .. } => "complete_session",
            Self::UpdateSessionHints { .. } => "update_session_hints",
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        match self {
            Self::RecordGuess(record) => &record.session_id,
            Self::CreateSession { session_id, .. }
            | Self::UpdateSession { session_id, .. }
            | Self::CompleteSession { session_id, .. }
            | Self::UpdateSessionHints { session_id, .. } => session_id,
        }
    }

    /// Deliver this effect to `store`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the store reports for the matching call.
    pub fn apply<S: SessionStore + ?Sized>(&self, store: &mut S) -> Result<(), S::Error> {
        match self {
            Self::CreateSession {
                session_id,
                puzzle_id,
            } => {
                if store.session_exists(session_id, *puzzle_id)? {
                    log::debug!("session {session_id} already exists for puzzle {puzzle_id}");
                    return Ok(());
                }
                store.create_session(session_id, *puzzle_id)
            }
            Self::RecordGuess(record) => store.record_guess(record),
            Self::UpdateSession { session_id, update } => store.update_session(session_id, update),
            Self::CompleteSession {
                session_id,
                completion,
            } => store.complete_session(session_id, completion),
            Self::UpdateSessionHints { session_id, hints } => store.update_hints(session_id, hints),
        }
    }
}

/// Remote session backend.
/// Platform-specific implementations should provide this
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether the backend already holds this session for the puzzle.
    /// Creation is skipped when it does. Backends that cannot tell keep the
    /// default and always get the create call.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be asked.
    fn session_exists(&self, _session_id: &str, _puzzle_id: u32) -> Result<bool, Self::Error> {
        Ok(false)
    }

    /// Register a new session for a puzzle.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    fn create_session(&mut self, session_id: &str, puzzle_id: u32) -> Result<(), Self::Error>;

    /// Record one accepted guess.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    fn record_guess(&mut self, record: &GuessRecord) -> Result<(), Self::Error>;

    /// Update aggregate session counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    fn update_session(&mut self, session_id: &str, update: &SessionUpdate)
    -> Result<(), Self::Error>;

    /// Mark the session finished.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    fn complete_session(
        &mut self,
        session_id: &str,
        completion: &SessionCompletion,
    ) -> Result<(), Self::Error>;

    /// Store which hints the player has opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the call.
    fn update_hints(&mut self, session_id: &str, hints: &HintState) -> Result<(), Self::Error>;
}

/// Outcome counts of one dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    #[must_use]
    pub const fn total(&self) -> usize {
        self.delivered + self.failed
    }
}

/// FIFO queue of pending session effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outbox {
    pending: VecDeque<SessionEffect>,
}

impl Outbox {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: VecDeque::new(),
        }
    }

    pub fn push(&mut self, effect: SessionEffect) {
        self.pending.push_back(effect);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionEffect> {
        self.pending.iter()
    }

    /// Take every pending effect, leaving the queue empty.
    pub fn take(&mut self) -> Vec<SessionEffect> {
        self.pending.drain(..).collect()
    }

    /// Deliver every pending effect in order. Failures are logged and the
    /// effect is dropped; nothing is retried.
    pub fn dispatch<S: SessionStore + ?Sized>(&mut self, store: &mut S) -> DispatchReport {
        let mut report = DispatchReport::default();
        while let Some(effect) = self.pending.pop_front() {
            match effect.apply(store) {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    log::warn!(
                        "session effect {} for {} failed: {err}",
                        effect.label(),
                        effect.session_id()
                    );
                    report.failed += 1;
                }
            }
        }
        if report.total() > 0 {
            log::debug!(
                "dispatched {} session effects ({} failed)",
                report.total(),
                report.failed
            );
        }
        report
    }
}

impl Extend<SessionEffect> for Outbox {
    fn extend<T: IntoIterator<Item = SessionEffect>>(&mut self, iter: T) {
        self.pending.extend(iter);
    }
}

#[cfg(feature = "async")]
pub use async_dispatch::AsyncSessionStore;

#[cfg(feature = "async")]
mod async_dispatch {
    use super::{
        DispatchReport, GuessRecord, HintState, Outbox, SessionCompletion, SessionEffect,
        SessionUpdate,
    };
    use std::sync::Arc;

    /// Session backend reached over the network.
    #[async_trait::async_trait]
    pub trait AsyncSessionStore: Send + Sync {
        type Error: std::error::Error + Send + Sync + 'static;

        async fn session_exists(
            &self,
            _session_id: &str,
            _puzzle_id: u32,
        ) -> Result<bool, Self::Error> {
            Ok(false)
        }
        async fn create_session(&self, session_id: &str, puzzle_id: u32)
        -> Result<(), Self::Error>;
        async fn record_guess(&self, record: &GuessRecord) -> Result<(), Self::Error>;
        async fn update_session(
            &self,
            session_id: &str,
            update: &SessionUpdate,
        ) -> Result<(), Self::Error>;
        async fn complete_session(
            &self,
            session_id: &str,
            completion: &SessionCompletion,
        ) -> Result<(), Self::Error>;
        async fn update_hints(&self, session_id: &str, hints: &HintState)
        -> Result<(), Self::Error>;
    }

    async fn apply_async<S: AsyncSessionStore + ?Sized>(
        effect: &SessionEffect,
        store: &S,
    ) -> Result<(), S::Error> {
        match effect {
            SessionEffect::CreateSession {
                session_id,
                puzzle_id,
            } => {
                if store.session_exists(session_id, *puzzle_id).await? {
                    log::debug!("session {session_id} already exists for puzzle {puzzle_id}");
                    return Ok(());
                }
                store.create_session(session_id, *puzzle_id).await
            }
            SessionEffect::RecordGuess(record) => store.record_guess(record).await,
            SessionEffect::UpdateSession { session_id, update } => {
                store.update_session(session_id, update).await
            }
            SessionEffect::CompleteSession {
                session_id,
                completion,
            } => store.complete_session(session_id, completion).await,
            SessionEffect::UpdateSessionHints { session_id, hints } => {
                store.update_hints(session_id, hints).await
            }
        }
    }

    async fn deliver_all<S: AsyncSessionStore + ?Sized>(
        effects: Vec<SessionEffect>,
        store: &S,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        for effect in effects {
            match apply_async(&effect, store).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    log::warn!(
                        "session effect {} for {} failed: {err}",
                        effect.label(),
                        effect.session_id()
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    impl Outbox {
        /// Async counterpart of [`Outbox::dispatch`].
        pub async fn dispatch_async<S: AsyncSessionStore + ?Sized>(
            &mut self,
            store: &S,
        ) -> DispatchReport {
            deliver_all(self.take(), store).await
        }

        /// Hand the pending effects to a background task on the current
        /// tokio runtime. The queue is empty when this returns.
        ///
        /// # Panics
        ///
        /// Panics if called outside a tokio runtime.
        pub fn spawn_dispatch<S>(&mut self, store: Arc<S>) -> tokio::task::JoinHandle<DispatchReport>
        where
            S: AsyncSessionStore + 'static,
        {
            let effects = self.take();
            tokio::spawn(async move { deliver_all(effects, store.as_ref()).await })
        }
    }

    impl DispatchReport {
        /// Fold the counts of several background dispatches together.
        #[must_use]
        pub fn combine(reports: impl IntoIterator<Item = Self>) -> Self {
            let mut total = Self::default();
            for report in reports {
                total.delivered += report.delivered;
                total.failed += report.failed;
            }
            total
        }
    }
}
