use anyhow::{Context, Result, bail, ensure};
use fjordle_game::{
    CompassArrow, Direction, Disposition, FjordOption, GameStatus, GuessSubmission, HintKind,
    SessionEffect, Toast, can_submit_guess, constants::SO_CLOSE_THRESHOLD, share_text,
};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::logic::ScenarioRun;

const RANDOM_PLAY_STEP_LIMIT: usize = 64;

/// Geirangerfjorden in two: a neighbour first, then the target.
pub fn smoke(run: &mut ScenarioRun) -> Result<()> {
    let state = run.start_named("Geirangerfjorden")?;
    ensure!(state.game_status == GameStatus::Playing, "new puzzle is not in play");

    let first = run.guess_named(&state, "Nærøyfjorden")?;
    let guess = first.state.last_guess().context("first guess was not recorded")?;
    ensure!(
        guess.distance.abs_diff(139) <= 10,
        "Nærøyfjorden should be about 139 km away, got {}",
        guess.distance
    );
    ensure!(
        guess.direction == Direction::Compass(CompassArrow::North),
        "target lies north, arrow was {}",
        guess.direction
    );
    ensure!(
        first.state.toast == Some(Toast::KeepGoing),
        "first miss should encourage the player"
    );

    let second = run.guess_named(&first.state, "Geirangerfjorden")?;
    ensure!(second.is_correct, "target guess was not correct");
    ensure!(
        second.state.game_status == GameStatus::Won && second.state.attempts_used == 2,
        "expected a win in 2, got {} after {}",
        second.state.game_status,
        second.state.attempts_used
    );
    ensure!(second.state.stats_updated, "finished puzzle did not update stats");

    let stats = run.engine.user_stats()?;
    ensure!(
        stats.games_played == 1 && stats.games_won == 1 && stats.current_streak == 1,
        "unexpected stats after one win: {stats:?}"
    );
    Ok(())
}

/// Repeats are refused without cost, finished games refuse everything.
pub fn duplicate_guard(run: &mut ScenarioRun) -> Result<()> {
    let state = run.start_named("Hardangerfjorden")?;
    let first = run.guess_named(&state, "Sognefjorden")?;
    let repeat = run.guess_named(&first.state, "Sognefjorden")?;
    ensure!(
        repeat.disposition == Disposition::Duplicate,
        "repeat was {:?}",
        repeat.disposition
    );
    ensure!(repeat.effects.is_empty(), "repeat produced session effects");
    ensure!(repeat.state.attempts_used == 1, "repeat consumed an attempt");
    ensure!(
        matches!(
            &repeat.state.toast,
            Some(Toast::DuplicateGuess { fjord_name }) if fjord_name == "Sognefjorden"
        ),
        "duplicate toast missing, got {:?}",
        repeat.state.toast
    );

    let win = run.guess_named(&repeat.state, "Hardangerfjorden")?;
    ensure!(win.state.game_status == GameStatus::Won, "target guess did not win");
    let after = run.guess_named(&win.state, "Nordfjord")?;
    ensure!(
        after.disposition == Disposition::GameOver && after.state == win.state,
        "finished game accepted another guess"
    );
    ensure!(
        !can_submit_guess(&after.state, run.catalog.find_by_name("Nordfjord")),
        "submit stays enabled after the game ended"
    );
    Ok(())
}

/// Six misses lose the puzzle and close the session exactly once.
pub fn exhaust_attempts(run: &mut ScenarioRun) -> Result<()> {
    let mut state = run.start_named("Lysefjorden")?;
    for name in [
        "Varangerfjorden",
        "Porsangerfjorden",
        "Lyngenfjorden",
        "Ofotfjorden",
        "Tysfjorden",
        "Saltfjorden",
    ] {
        state = run.guess_named(&state, name)?.state;
    }
    ensure!(
        state.game_status == GameStatus::Lost,
        "six misses left the game {}",
        state.game_status
    );
    ensure!(
        state
            .guesses
            .iter()
            .all(|guess| guess.proximity_percent <= SO_CLOSE_THRESHOLD),
        "arctic guesses scored as close to Lysefjorden"
    );

    let locked = run.guess_named(&state, "Lysefjorden")?;
    ensure!(
        locked.disposition == Disposition::GameOver,
        "seventh guess was {:?}",
        locked.disposition
    );

    let completions = run
        .engine
        .outbox()
        .iter()
        .filter(|effect| matches!(effect, SessionEffect::CompleteSession { .. }))
        .count();
    ensure!(completions == 1, "session completed {completions} times");

    let stats = run.engine.user_stats()?;
    ensure!(
        stats.games_played == 1 && stats.games_won == 0 && stats.current_streak == 0,
        "unexpected stats after a loss: {stats:?}"
    );
    Ok(())
}

/// A seeded player picks fjords at random, duplicates included, and sprinkles
/// in hints until the puzzle ends.
pub fn random_play(run: &mut ScenarioRun) -> Result<()> {
    let puzzle_number = run.rng.gen_range(1..=run.assets.puzzle_count());
    let mut state = run.start(puzzle_number)?;
    let options: Vec<FjordOption> = run.catalog.iter().cloned().collect();

    for _ in 0..RANDOM_PLAY_STEP_LIMIT {
        if state.is_finished() {
            break;
        }
        let pick = options.choose(&mut run.rng).context("catalog is empty")?;
        let outcome = run.guess(&state, &GuessSubmission::from(pick))?;
        match outcome.disposition {
            Disposition::Accepted => {
                ensure!(
                    outcome.state.attempts_used == state.attempts_used + 1,
                    "accepted guess did not consume exactly one attempt"
                );
            }
            Disposition::Duplicate => {
                ensure!(
                    state.has_guessed(pick.id) && outcome.state.guesses == state.guesses,
                    "duplicate disposition for a fresh fjord"
                );
            }
            other => bail!("unexpected {other:?} while the game is in play"),
        }
        state = outcome.state;

        if !state.is_finished() && run.rng.gen_bool(0.25) {
            let kind = HintKind::ALL[run.rng.gen_range(0..HintKind::ALL.len())];
            let hint = run.reveal(&state, kind)?;
            ensure!(
                hint.state.attempts_used == state.attempts_used,
                "hint consumed an attempt"
            );
            state = hint.state;
        }
    }

    ensure!(
        state.is_finished(),
        "puzzle #{puzzle_number} still in play after {RANDOM_PLAY_STEP_LIMIT} picks"
    );
    ensure!(state.stats_updated, "finished puzzle did not update stats");
    ensure!(
        run.engine.user_stats()?.games_played == 1,
        "stats counted the puzzle more than once"
    );
    let text = share_text(&state, "https://fjordle.test").context("no share text")?;
    ensure!(text.contains("/6"), "share text lacks a score: {text}");
    Ok(())
}
