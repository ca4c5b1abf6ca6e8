use std::fmt::Write as _;

use crate::constants::{MAX_ATTEMPTS, SHARE_CORRECT_MARK, SHARE_UNUSED_MARK};
use crate::state::{GameState, GameStatus};

/// Spoiler-free result summary for the clipboard.
///
/// Returns `None` when no puzzle is loaded.
#[must_use]
pub fn share_text(state: &GameState, site_url: &str) -> Option<String> {
    let puzzle = state.puzzle.as_ref()?;
    let score = if state.game_status == GameStatus::Won {
        state.guesses.len().to_string()
    } else {
        "X".to_string()
    };

    let mut text = format!("#Fjordle #{} {score}/{MAX_ATTEMPTS}\n\n", puzzle.puzzle_number);
    for guess in &state.guesses {
        if guess.is_correct {
            text.push_str(SHARE_CORRECT_MARK);
            text.push('\n');
        } else {
            let _ = writeln!(text, "{}%", guess.proximity_percent);
        }
    }
    if state.game_status == GameStatus::Lost {
        let padding = usize::try_from(MAX_ATTEMPTS)
            .unwrap_or(0)
            .saturating_sub(state.guesses.len());
        for _ in 0..padding {
            text.push_str(SHARE_UNUSED_MARK);
            text.push('\n');
        }
    }
    text.push('\n');
    text.push_str(site_url);
    Some(text)
}
