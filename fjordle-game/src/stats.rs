//! Player statistics: streak bookkeeping and history analytics.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::numbers::{u32_to_f64, usize_to_f64};
use crate::state::{GameState, GameStatus, HintKind, HintState};

/// Lifetime counters kept on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub games_played: u32,
    pub games_won: u32,
    pub current_streak: u32,
    pub max_streak: u32,
    /// Stored as `""` when the player has never finished a puzzle.
    #[serde(with = "blank_date")]
    pub last_played_date: Option<NaiveDate>,
}

impl UserStats {
    /// Fold one finished puzzle into the counters.
    ///
    /// A win extends the streak only when the previous finish was the day
    /// before `today`; a loss breaks it.
    pub fn record_result(&mut self, won: bool, today: NaiveDate) {
        self.games_played += 1;
        if won {
            self.games_won += 1;
            let continues = self
                .last_played_date
                .is_some_and(|last| today.pred_opt() == Some(last));
            self.current_streak = if continues { self.current_streak + 1 } else { 1 };
            self.max_streak = self.max_streak.max(self.current_streak);
        } else {
            self.current_streak = 0;
        }
        self.last_played_date = Some(today);
    }

    /// Whole-number win percentage; 0 before the first game.
    #[must_use]
    pub fn win_percentage(&self) -> u32 {
        if self.games_played == 0 {
            return 0;
        }
        crate::numbers::round_f64_to_u32(
            u32_to_f64(self.games_won) / u32_to_f64(self.games_played) * 100.0,
        )
    }
}

mod blank_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.collect_str(&date.format(FORMAT)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(None);
        }
        NaiveDate::parse_from_str(raw.trim(), FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// Puzzle difficulty, derived from the weekday the puzzle ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon | Weekday::Tue => Self::Easy,
            Weekday::Wed | Weekday::Thu => Self::Medium,
            Weekday::Fri | Weekday::Sat | Weekday::Sun => Self::Hard,
        }
    }
}

/// One finished puzzle in the player's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleResult {
    pub puzzle_id: u32,
    pub date: NaiveDate,
    pub won: bool,
    pub attempts_used: u32,
    pub hints_used: HintState,
    pub total_hints_used: u32,
}

impl PuzzleResult {
    /// `None` while the puzzle is still in play or not loaded.
    #[must_use]
    pub fn from_state(state: &GameState) -> Option<Self> {
        let puzzle = state.puzzle.as_ref()?;
        if !state.is_finished() {
            return None;
        }
        Some(Self {
            puzzle_id: puzzle.id,
            date: puzzle.date,
            won: state.game_status == GameStatus::Won,
            attempts_used: state.attempts_used,
            hints_used: state.hints_used,
            total_hints_used: state.hints_used.count(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WinTally {
    pub won: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintAnalytics {
    pub total_hints_used: u32,
    pub by_type: BTreeMap<String, u32>,
    pub average_per_game: f64,
    pub games_without_hints: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPerformance {
    pub date: NaiveDate,
    pub win_rate: f64,
    pub games_played: u32,
    pub average_attempts: f64,
}

/// Derived view over a result history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub games_played: u32,
    pub games_won: u32,
    pub win_rate: f64,
    /// Over won games only; 0 when nothing was won.
    pub average_guesses: f64,
    pub hint_analytics: HintAnalytics,
    pub difficulty_breakdown: BTreeMap<Difficulty, WinTally>,
    pub performance: Vec<DailyPerformance>,
}

impl StatsSummary {
    #[must_use]
    pub fn from_results(results: &[PuzzleResult]) -> Self {
        if results.is_empty() {
            return Self::default();
        }
        let played = usize_to_f64(results.len());
        let won: Vec<&PuzzleResult> = results.iter().filter(|r| r.won).collect();

        let average_guesses = if won.is_empty() {
            0.0
        } else {
            won.iter().map(|r| u32_to_f64(r.attempts_used)).sum::<f64>() / usize_to_f64(won.len())
        };

        let mut difficulty_breakdown: BTreeMap<Difficulty, WinTally> = BTreeMap::new();
        let mut by_date: BTreeMap<NaiveDate, (u32, u32, u32)> = BTreeMap::new();
        for result in results {
            let tally = difficulty_breakdown
                .entry(Difficulty::for_date(result.date))
                .or_default();
            tally.total += 1;
            tally.won += u32::from(result.won);

            let day = by_date.entry(result.date).or_default();
            day.0 += 1;
            day.1 += u32::from(result.won);
            day.2 += result.attempts_used;
        }

        let performance = by_date
            .into_iter()
            .map(|(date, (games, wins, attempts))| DailyPerformance {
                date,
                win_rate: u32_to_f64(wins) / u32_to_f64(games) * 100.0,
                games_played: games,
                average_attempts: u32_to_f64(attempts) / u32_to_f64(games),
            })
            .collect();

        Self {
            games_played: u32::try_from(results.len()).unwrap_or(u32::MAX),
            games_won: u32::try_from(won.len()).unwrap_or(u32::MAX),
            win_rate: usize_to_f64(won.len()) / played * 100.0,
            average_guesses,
            hint_analytics: hint_analytics(results),
            difficulty_breakdown,
            performance,
        }
    }
}

fn hint_analytics(results: &[PuzzleResult]) -> HintAnalytics {
    let total: u32 = results.iter().map(|r| r.hints_used.count()).sum();
    let by_type = HintKind::ALL
        .iter()
        .map(|kind| {
            let uses = results
                .iter()
                .filter(|r| r.hints_used.is_revealed(*kind))
                .count();
            (kind.as_str().to_string(), u32::try_from(uses).unwrap_or(u32::MAX))
        })
        .collect();
    let without = results.iter().filter(|r| r.hints_used.count() == 0).count();
    HintAnalytics {
        total_hints_used: total,
        by_type,
        average_per_game: u32_to_f64(total) / usize_to_f64(results.len().max(1)),
        games_without_hints: u32::try_from(without).unwrap_or(u32::MAX),
    }
}
