use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use fjordle_game::{
    DirStore, Direction, FjordCatalog, FjordleEngine, GameState, GameStatus, GuessOutcome,
    GuessSubmission, HintKind, HintOutcome, KeyValueStore, MemoryStore, Outbox, StorageError,
    constants::MAX_ATTEMPTS,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::assets::TesterAssets;

/// Storage picked on the command line: in memory, or one directory per run.
#[derive(Debug, Clone)]
pub enum TesterStore {
    Memory(MemoryStore),
    Dir(DirStore),
}

impl TesterStore {
    /// Open a store for one iteration, wiping anything a previous run left.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or cleared.
    pub fn open(state_dir: Option<&PathBuf>, label: &str) -> Result<Self, StorageError> {
        let Some(root) = state_dir else {
            return Ok(Self::Memory(MemoryStore::new()));
        };
        let mut store = Self::Dir(DirStore::open(root.join(label))?);
        for key in store.keys()? {
            store.remove(&key)?;
        }
        Ok(store)
    }
}

impl KeyValueStore for TesterStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(store) => store.get(key),
            Self::Dir(store) => store.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.set(key, value),
            Self::Dir(store) => store.set(key, value),
        }
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.remove(key),
            Self::Dir(store) => store.remove(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        match self {
            Self::Memory(store) => store.keys(),
            Self::Dir(store) => store.keys(),
        }
    }
}

pub type TesterEngine = FjordleEngine<TesterAssets, TesterStore>;

/// Everything one scenario iteration gets to play with.
pub struct ScenarioRun {
    pub seed: u64,
    pub now: DateTime<Utc>,
    pub assets: TesterAssets,
    pub catalog: FjordCatalog,
    pub engine: TesterEngine,
    pub rng: ChaCha8Rng,
    verbose: bool,
}

impl ScenarioRun {
    /// # Errors
    ///
    /// Returns an error if the catalog or the store cannot be prepared.
    pub fn new(
        assets: &TesterAssets,
        store: TesterStore,
        seed: u64,
        verbose: bool,
    ) -> Result<Self> {
        let catalog = assets.catalog().context("building fjord catalog")?;
        Ok(Self {
            seed,
            now: Utc::now(),
            assets: assets.clone(),
            catalog,
            engine: FjordleEngine::new(assets.clone(), store),
            rng: ChaCha8Rng::seed_from_u64(seed),
            verbose,
        })
    }

    pub fn note(&self, message: impl AsRef<str>) {
        if self.verbose {
            println!("     · {}", message.as_ref());
        }
        log::debug!("[seed {}] {}", self.seed, message.as_ref());
    }

    /// # Errors
    ///
    /// Returns an error if the named fjord is not bundled or the engine fails.
    pub fn start_named(&mut self, fjord_name: &str) -> Result<GameState> {
        let number = self
            .assets
            .puzzle_number_for(fjord_name)
            .with_context(|| format!("no bundled puzzle for {fjord_name}"))?;
        self.start(number)
    }

    /// # Errors
    ///
    /// Returns an error if the puzzle is unknown or the engine fails.
    pub fn start(&mut self, puzzle_number: u32) -> Result<GameState> {
        let state = self
            .engine
            .start(puzzle_number, self.now)
            .with_context(|| format!("starting puzzle #{puzzle_number}"))?;
        self.note(format!(
            "puzzle #{puzzle_number} opened at attempt {}",
            state.attempts_used
        ));
        check_invariants(&state)?;
        Ok(state)
    }

    /// # Errors
    ///
    /// Returns an error if the fjord is not in the catalog, the store fails,
    /// or the resulting state breaks an invariant.
    pub fn guess_named(&mut self, state: &GameState, fjord_name: &str) -> Result<GuessOutcome> {
        let option = self
            .catalog
            .find_by_name(fjord_name)
            .with_context(|| format!("{fjord_name} is not in the catalog"))?;
        let submission = GuessSubmission::from(option);
        self.guess(state, &submission)
    }

    /// # Errors
    ///
    /// Returns an error if the store fails or the resulting state breaks an
    /// invariant.
    pub fn guess(&mut self, state: &GameState, submission: &GuessSubmission) -> Result<GuessOutcome> {
        let outcome = self
            .engine
            .guess(state, submission, self.now)
            .with_context(|| format!("guessing {}", submission.fjord_name))?;
        if let Some(guess) = outcome.state.guesses.last().filter(|_| outcome.disposition.is_accepted()) {
            self.note(format!(
                "guess {} {}: {} km {} {}%",
                guess.attempt_number,
                guess.fjord_name,
                guess.distance,
                guess.direction,
                guess.proximity_percent
            ));
        } else {
            self.note(format!(
                "guess {} ignored ({:?})",
                submission.fjord_name, outcome.disposition
            ));
        }
        check_invariants(&outcome.state)?;
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn reveal(&mut self, state: &GameState, kind: HintKind) -> Result<HintOutcome> {
        let outcome = self
            .engine
            .reveal_hint(state, kind, self.now)
            .with_context(|| format!("revealing {kind} hint"))?;
        self.note(format!("hint {kind} changed: {}", outcome.changed));
        Ok(outcome)
    }

    /// Queued session effects, ready for dispatch.
    pub fn take_effects(&mut self) -> Outbox {
        self.engine.take_effects()
    }
}

/// Structural rules every reachable state must satisfy.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn check_invariants(state: &GameState) -> Result<()> {
    ensure!(
        usize::try_from(state.attempts_used).ok() == Some(state.guesses.len()),
        "attempts_used {} disagrees with {} guesses",
        state.attempts_used,
        state.guesses.len()
    );
    ensure!(
        state.attempts_used <= MAX_ATTEMPTS,
        "attempts_used {} exceeds {MAX_ATTEMPTS}",
        state.attempts_used
    );

    let mut seen = Vec::with_capacity(state.guesses.len());
    for (index, guess) in state.guesses.iter().enumerate() {
        ensure!(
            usize::try_from(guess.attempt_number).ok() == Some(index + 1),
            "guess {} carries attempt number {}",
            index + 1,
            guess.attempt_number
        );
        ensure!(
            (0.0..=100.0).contains(&guess.proximity_percent),
            "proximity {} out of range",
            guess.proximity_percent
        );
        ensure!(
            guess.is_correct == (guess.direction == Direction::ExactHit),
            "guess {} direction {} disagrees with correctness",
            index + 1,
            guess.direction
        );
        ensure!(
            !guess.is_correct || guess.distance == 0,
            "correct guess reports {} km",
            guess.distance
        );
        ensure!(
            !seen.contains(&guess.fjord_id),
            "fjord {} guessed twice",
            guess.fjord_id
        );
        seen.push(guess.fjord_id);
        if guess.is_correct {
            ensure!(
                index + 1 == state.guesses.len(),
                "correct guess is not the last one"
            );
        }
    }

    let won = state.guesses.iter().any(|guess| guess.is_correct);
    let expected = if won {
        GameStatus::Won
    } else if state.attempts_used >= MAX_ATTEMPTS {
        GameStatus::Lost
    } else {
        GameStatus::Playing
    };
    ensure!(
        state.game_status == expected,
        "status {} but guesses imply {expected}",
        state.game_status
    );
    Ok(())
}
