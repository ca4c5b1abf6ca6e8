//! Centralized tuning constants for Fjordle game logic.
//!
//! These values define the deterministic scoring math and the persistence
//! contract. Keeping them together ensures that gameplay can only be adjusted
//! via code changes reviewed in version control, rather than through external
//! JSON assets.

// Game rules ---------------------------------------------------------------
/// Accepted guesses per puzzle. Fixed, not configurable per puzzle.
pub const MAX_ATTEMPTS: u32 = 6;

// Geo-scoring --------------------------------------------------------------
pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_MAX_DISTANCE_KM: u32 = 4000;
/// Upper edge of the fine-grained proximity segment.
pub const NEAR_THRESHOLD_KM: u32 = 20;
/// Distances at or below this keep two decimals of proximity.
pub const FINE_THRESHOLD_KM: u32 = 5;
pub const PROXIMITY_MAX: f64 = 100.0;
/// Proximity at `NEAR_THRESHOLD_KM`; both segments meet here.
pub const PROXIMITY_AT_NEAR: f64 = 95.0;
pub const SO_CLOSE_THRESHOLD: f64 = 95.0;

// Toast keys ---------------------------------------------------------------
pub const TOAST_KEEP_GOING: &str = "KEEP_GOING_MESSAGE";
pub const TOAST_SO_CLOSE: &str = "SO_CLOSE";
pub const TOAST_DUPLICATE_GUESS: &str = "DUPLICATE_GUESS";

// Persistence --------------------------------------------------------------
pub const PROGRESS_KEY_PREFIX: &str = "fjordle_puzzle_";
pub const PROGRESS_KEY_SUFFIX: &str = "_progress";
pub const SESSION_ID_KEY: &str = "fjordle-session-id";
pub const STATS_KEY: &str = "fjordle-stats";
pub const OPENED_SESSIONS_KEY: &str = "fjordle-opened-sessions";
/// 2024-01-01T00:00:00Z; snapshots older than the game itself are bogus.
pub const SNAPSHOT_EARLIEST_TIMESTAMP_MS: i64 = 1_704_067_200_000;
pub const SNAPSHOT_CLOCK_SKEW_MS: i64 = 24 * 60 * 60 * 1000;

// Weather ------------------------------------------------------------------
pub const WEATHER_CACHE_TTL_SECS: i64 = 2 * 60 * 60;

// Sharing ------------------------------------------------------------------
pub const SHARE_CORRECT_MARK: &str = "🟩";
pub const SHARE_UNUSED_MARK: &str = "⬜";
