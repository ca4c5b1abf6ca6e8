#![cfg(feature = "async")]

use std::collections::HashSet;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fjordle_game::{
    AsyncSessionStore, Fjord, FjordCatalog, FjordOption, FjordleEngine, GuessRecord,
    GuessSubmission, HintKind, HintState, KeyValueStore, MemoryStore, Puzzle, PuzzleLoader, SessionCompletion,
    SessionUpdate,
};

#[derive(Clone)]
struct BundledLoader {
    fjords: Vec<Fjord>,
}

impl BundledLoader {
    fn new() -> Self {
        Self {
            fjords: serde_json::from_str(include_str!("../../fjordle-tester/data/fjords.json"))
                .unwrap(),
        }
    }
}

impl PuzzleLoader for BundledLoader {
    type Error = Infallible;

    fn load_puzzle(&self, puzzle_number: u32) -> Result<Option<Puzzle>, Infallible> {
        let fjord = self
            .fjords
            .iter()
            .find(|fjord| fjord.id == puzzle_number)
            .cloned();
        Ok(fjord.map(|fjord| Puzzle {
            id: 700 + puzzle_number,
            date: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap(),
            puzzle_number,
            fjord,
        }))
    }

    fn load_catalog(&self) -> Result<FjordCatalog, Infallible> {
        Ok(FjordCatalog::new(self.fjords.iter().map(FjordOption::from).collect()).unwrap())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("no such session")]
struct Missing;

/// Remote backend that remembers which (session, puzzle) pairs it holds.
#[derive(Default)]
struct Backend {
    calls: Mutex<Vec<&'static str>>,
    sessions: Mutex<HashSet<(String, u32)>>,
}

impl Backend {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AsyncSessionStore for Backend {
    type Error = Missing;

    async fn session_exists(&self, session_id: &str, puzzle_id: u32) -> Result<bool, Missing> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .contains(&(session_id.to_string(), puzzle_id)))
    }
    async fn create_session(&self, session_id: &str, puzzle_id: u32) -> Result<(), Missing> {
        self.sessions
            .lock()
            .unwrap()
            .insert((session_id.to_string(), puzzle_id));
        self.log("create");
        Ok(())
    }
    async fn record_guess(&self, record: &GuessRecord) -> Result<(), Missing> {
        if !self.session_exists(&record.session_id, record.puzzle_id).await? {
            return Err(Missing);
        }
        self.log("guess");
        Ok(())
    }
    async fn update_session(&self, _: &str, _: &SessionUpdate) -> Result<(), Missing> {
        self.log("update");
        Ok(())
    }
    async fn complete_session(&self, _: &str, _: &SessionCompletion) -> Result<(), Missing> {
        self.log("complete");
        Ok(())
    }
    async fn update_hints(&self, _: &str, _: &HintState) -> Result<(), Missing> {
        self.log("hints");
        Ok(())
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 4, hour, 0, 0).unwrap()
}

fn pick(catalog: &FjordCatalog, name: &str) -> GuessSubmission {
    GuessSubmission::from(catalog.find_by_name(name).unwrap())
}

fn puzzle_number(loader: &BundledLoader, name: &str) -> u32 {
    loader
        .fjords
        .iter()
        .find(|fjord| fjord.name == name)
        .unwrap()
        .id
}

#[tokio::test]
async fn engine_effects_reach_the_backend_in_order() {
    let loader = BundledLoader::new();
    let number = puzzle_number(&loader, "Geirangerfjorden");
    let mut engine = FjordleEngine::new(loader, MemoryStore::new());
    let catalog = engine.catalog().unwrap();

    let state = engine.start(number, at(8)).unwrap();
    let state = engine
        .reveal_hint(&state, HintKind::FirstLetter, at(8))
        .unwrap()
        .state;
    let state = engine
        .guess(&state, &pick(&catalog, "Nærøyfjorden"), at(9))
        .unwrap()
        .state;
    engine
        .guess(&state, &pick(&catalog, "Geirangerfjorden"), at(9))
        .unwrap();

    let backend = Arc::new(Backend::default());
    let report = engine
        .take_effects()
        .spawn_dispatch(Arc::clone(&backend))
        .await
        .unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.delivered, 7);
    assert_eq!(
        backend.calls(),
        vec!["create", "hints", "guess", "update", "guess", "update", "complete"]
    );
    assert!(engine.outbox().is_empty());
}

#[test]
fn resumed_and_recovered_puzzles_do_not_recreate_the_session() {
    let loader = BundledLoader::new();
    let number = puzzle_number(&loader, "Hardangerfjorden");
    let mut engine = FjordleEngine::new(loader, MemoryStore::new());
    let catalog = engine.catalog().unwrap();
    let backend = Backend::default();

    let state = engine.start(number, at(8)).unwrap();
    let session_id = state.session_id.clone().unwrap();
    engine
        .guess(&state, &pick(&catalog, "Sognefjorden"), at(9))
        .unwrap();
    let report = tokio_test::block_on(engine.take_effects().dispatch_async(&backend));
    assert_eq!(report.failed, 0);

    // Resuming queues nothing.
    engine.start(number, at(10)).unwrap();
    assert!(engine.outbox().is_empty());

    // Corrupt progress restarts the puzzle under the same session.
    engine
        .progress_mut()
        .store_mut()
        .set(&fjordle_game::storage::progress_key(700 + number), "{corrupt")
        .unwrap();
    let fresh = engine.start(number, at(11)).unwrap();
    assert_eq!(fresh.attempts_used, 0);
    assert_eq!(fresh.session_id.as_deref(), Some(session_id.as_str()));
    engine
        .guess(&fresh, &pick(&catalog, "Nordfjord"), at(11))
        .unwrap();
    let report = tokio_test::block_on(engine.take_effects().dispatch_async(&backend));
    assert_eq!(report.failed, 0);
    assert_eq!(
        backend.calls(),
        vec!["create", "guess", "update", "guess", "update"]
    );
}

#[test]
fn backend_that_already_holds_the_session_skips_creation() {
    let loader = BundledLoader::new();
    let number = puzzle_number(&loader, "Lysefjorden");
    let mut engine = FjordleEngine::new(loader, MemoryStore::new());
    let state = engine.start(number, at(8)).unwrap();

    let backend = Backend::default();
    backend
        .sessions
        .lock()
        .unwrap()
        .insert((state.session_id.clone().unwrap(), 700 + number));
    let report = tokio_test::block_on(engine.take_effects().dispatch_async(&backend));
    assert_eq!(report.delivered, 1);
    assert!(backend.calls().is_empty());
}
