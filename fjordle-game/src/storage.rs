//! Progress repository over a string key-value store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    OPENED_SESSIONS_KEY, PROGRESS_KEY_PREFIX, PROGRESS_KEY_SUFFIX, SESSION_ID_KEY, STATS_KEY,
};
use crate::snapshot::{ProgressSnapshot, SnapshotError, check_progression, decode_snapshot};
use crate::stats::UserStats;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("refusing to overwrite newer progress: {0}")]
    Stale(SnapshotError),
}

/// Flat string store in the manner of browser local storage.
pub trait KeyValueStore {
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium refuses the removal.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the key listing cannot be read.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

/// One `<key>.json` file per entry inside a directory. Keys are escaped
/// into file names reversibly, so `keys` returns exactly what was `set`.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

/// File-name form of a key: `[A-Za-z0-9_-]` pass through, every other byte
/// becomes `~XX`. Reversed by [`decode_key`].
fn encode_key(key: &str) -> String {
    let mut file = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            file.push(char::from(byte));
        } else {
            file.push_str(&format!("~{byte:02X}"));
        }
    }
    file
}

fn decode_key(file: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(file.len());
    let mut rest = file.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'~' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl KeyValueStore for DirStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(key) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(decode_key)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Storage key of a puzzle's progress snapshot.
#[must_use]
pub fn progress_key(puzzle_id: u32) -> String {
    format!("{PROGRESS_KEY_PREFIX}{puzzle_id}{PROGRESS_KEY_SUFFIX}")
}

/// Inverse of [`progress_key`].
#[must_use]
pub fn parse_progress_key(key: &str) -> Option<u32> {
    key.strip_prefix(PROGRESS_KEY_PREFIX)?
        .strip_suffix(PROGRESS_KEY_SUFFIX)?
        .parse()
        .ok()
}

/// Result of loading one puzzle's progress.
#[derive(Debug)]
pub enum StoredProgress {
    Missing,
    Valid(ProgressSnapshot),
    Rejected(SnapshotError),
}

#[derive(Debug, Default)]
pub struct ProgressIndex {
    pub entries: BTreeMap<u32, ProgressSnapshot>,
    /// Progress keys whose contents failed validation.
    pub corrupted_keys: Vec<String>,
}

/// Puzzles the current device session has already been opened for.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenedSessions {
    session_id: String,
    puzzle_ids: BTreeSet<u32>,
}

pub struct ProgressRepository<K: KeyValueStore> {
    store: K,
}

impl<K: KeyValueStore> ProgressRepository<K> {
    pub const fn new(store: K) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &K {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }

    pub fn into_inner(self) -> K {
        self.store
    }

    /// Store a puzzle's progress. Valid stored progress is only replaced by a
    /// snapshot that extends it; unreadable progress is overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Stale`] if the snapshot would drop stored
    /// guesses or hints, or an error if it cannot be serialized or written.
    pub fn save(&mut self, puzzle_id: u32, snapshot: &ProgressSnapshot) -> Result<(), StorageError> {
        if let StoredProgress::Valid(stored) = self.load(puzzle_id, snapshot.timestamp)? {
            check_progression(&stored, snapshot).map_err(StorageError::Stale)?;
        }
        let json = snapshot.to_json()?;
        self.store.set(&progress_key(puzzle_id), &json)
    }

    /// Load and validate a puzzle's progress. Invalid data is reported as
    /// [`StoredProgress::Rejected`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn load(&self, puzzle_id: u32, now_ms: i64) -> Result<StoredProgress, StorageError> {
        let Some(raw) = self.store.get(&progress_key(puzzle_id))? else {
            return Ok(StoredProgress::Missing);
        };
        Ok(match decode_snapshot(&raw, puzzle_id, now_ms) {
            Ok(snapshot) => StoredProgress::Valid(snapshot),
            Err(err) => StoredProgress::Rejected(err),
        })
    }

    /// Every valid stored snapshot keyed by puzzle id.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn list_all(&self, now_ms: i64) -> Result<ProgressIndex, StorageError> {
        let mut index = ProgressIndex::default();
        for key in self.store.keys()? {
            let Some(puzzle_id) = parse_progress_key(&key) else {
                continue;
            };
            match self.load(puzzle_id, now_ms)? {
                StoredProgress::Valid(snapshot) => {
                    index.entries.insert(puzzle_id, snapshot);
                }
                StoredProgress::Rejected(err) => {
                    log::warn!("skipping corrupted progress {key}: {err}");
                    index.corrupted_keys.push(key);
                }
                StoredProgress::Missing => {}
            }
        }
        Ok(index)
    }

    /// # Errors
    ///
    /// Returns an error if the store refuses the removal.
    pub fn clear(&mut self, puzzle_id: u32) -> Result<(), StorageError> {
        self.store.remove(&progress_key(puzzle_id))
    }

    /// Stable anonymous session id, created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the id cannot be read or stored.
    pub fn session_id(&mut self) -> Result<String, StorageError> {
        if let Some(existing) = self.store.get(SESSION_ID_KEY)?
            && !existing.trim().is_empty()
        {
            return Ok(existing);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.store.set(SESSION_ID_KEY, &id)?;
        log::debug!("created session id {id}");
        Ok(id)
    }

    /// Whether a session was already opened for `puzzle_id` under
    /// `session_id`. Entries recorded under another session id do not count.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn session_opened(&self, session_id: &str, puzzle_id: u32) -> Result<bool, StorageError> {
        Ok(self
            .opened_sessions(session_id)?
            .puzzle_ids
            .contains(&puzzle_id))
    }

    /// Remember that a session was opened for `puzzle_id`. Returns `false`
    /// when it already was.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or written.
    pub fn mark_session_opened(
        &mut self,
        session_id: &str,
        puzzle_id: u32,
    ) -> Result<bool, StorageError> {
        let mut opened = self.opened_sessions(session_id)?;
        if !opened.puzzle_ids.insert(puzzle_id) {
            return Ok(false);
        }
        let json = serde_json::to_string(&opened)?;
        self.store.set(OPENED_SESSIONS_KEY, &json)?;
        Ok(true)
    }

    fn opened_sessions(&self, session_id: &str) -> Result<OpenedSessions, StorageError> {
        let fresh = || OpenedSessions {
            session_id: session_id.to_string(),
            puzzle_ids: BTreeSet::new(),
        };
        let Some(raw) = self.store.get(OPENED_SESSIONS_KEY)? else {
            return Ok(fresh());
        };
        match serde_json::from_str::<OpenedSessions>(&raw) {
            Ok(opened) if opened.session_id == session_id => Ok(opened),
            Ok(_) => Ok(fresh()),
            Err(err) => {
                log::warn!("discarding unreadable session record: {err}");
                Ok(fresh())
            }
        }
    }

    /// Stored player stats; unreadable stats start over from zero.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    pub fn load_stats(&self) -> Result<UserStats, StorageError> {
        let Some(raw) = self.store.get(STATS_KEY)? else {
            return Ok(UserStats::default());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_else(|err| {
            log::warn!("discarding unreadable stats: {err}");
            UserStats::default()
        }))
    }

    /// # Errors
    ///
    /// Returns an error if the stats cannot be serialized or written.
    pub fn save_stats(&mut self, stats: &UserStats) -> Result<(), StorageError> {
        let json = serde_json::to_string(stats)?;
        self.store.set(STATS_KEY, &json)
    }
}
