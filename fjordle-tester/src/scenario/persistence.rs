use anyhow::{Context, Result, ensure};
use fjordle_game::{
    Fjord, GameState, HintKind, KeyValueStore, Language, ProgressSnapshot, PuzzleResult,
    SessionEffect, StatsSummary, TtlCache, WeatherData,
    constants::{MAX_ATTEMPTS, SHARE_CORRECT_MARK, SHARE_UNUSED_MARK},
    decode_snapshot, share_text,
    storage::progress_key,
    weather::{default_weather_ttl, weather_cache_key},
};

use crate::logic::ScenarioRun;

const SITE_URL: &str = "https://fjordle.test";

// Canned Open-Meteo reply standing in for the weather lookup.
const SAMPLE_WEATHER: &str = r#"{
    "latitude": 69.6,
    "longitude": 20.3,
    "current_weather": {
        "temperature": 4.26,
        "windspeed": 11.04,
        "winddirection": 205.0,
        "weathercode": 61,
        "time": "2025-06-04T12:00"
    }
}"#;

/// Weather hint lookup through the cache; only the first call decodes.
fn weather_for(
    cache: &mut TtlCache<WeatherData>,
    fjord: &Fjord,
    language: Language,
    decoded: &mut usize,
) -> Result<WeatherData> {
    let key = weather_cache_key(fjord.id, language);
    if let Some(hit) = cache.get(&key) {
        return Ok(hit.clone());
    }
    let reading = WeatherData::from_open_meteo(SAMPLE_WEATHER, language)?;
    *decoded += 1;
    cache.set(key, reading.clone(), default_weather_ttl());
    Ok(reading)
}

fn puzzle_number(state: &GameState) -> Result<u32> {
    state
        .puzzle
        .as_ref()
        .map(|puzzle| puzzle.puzzle_number)
        .context("no puzzle loaded")
}

/// Progress survives a reopen; tampered or corrupt progress does not.
pub fn snapshot_roundtrip(run: &mut ScenarioRun) -> Result<()> {
    let state = run.start_named("Sognefjorden")?;
    let state = run.reveal(&state, HintKind::Counties)?.state;
    let state = run.guess_named(&state, "Hardangerfjorden")?.state;
    let live = run.guess_named(&state, "Nordfjord")?.state;
    let number = puzzle_number(&live)?;
    let puzzle_id = live.puzzle_id().context("no puzzle id")?;
    let now_ms = run.now.timestamp_millis();

    let resumed = run.start(number)?;
    let mut expected = live.clone();
    expected.clear_toast();
    ensure!(resumed == expected, "reopened puzzle differs from the live game");

    let raw = ProgressSnapshot::capture(puzzle_id, &live, now_ms).to_json()?;
    ensure!(
        decode_snapshot(&raw, puzzle_id, now_ms).is_ok(),
        "fresh snapshot failed validation"
    );
    ensure!(
        decode_snapshot(&raw, puzzle_id + 1, now_ms).is_err(),
        "snapshot accepted for the wrong puzzle"
    );
    let mut tampered: serde_json::Value = serde_json::from_str(&raw)?;
    tampered["attemptsUsed"] = serde_json::json!(MAX_ATTEMPTS - 1);
    ensure!(
        decode_snapshot(&tampered.to_string(), puzzle_id, now_ms).is_err(),
        "snapshot with a forged attempt count was accepted"
    );

    run.engine
        .progress_mut()
        .store_mut()
        .set(&progress_key(puzzle_id), "{\"puzzleId\":")?;
    let fresh = run.start(number)?;
    ensure!(
        fresh.attempts_used == 0 && fresh.hints_used.count() == 0,
        "corrupt progress was not discarded"
    );
    let creates = run
        .engine
        .outbox()
        .iter()
        .filter(|effect| {
            matches!(
                effect,
                SessionEffect::CreateSession { puzzle_id: id, .. } if *id == puzzle_id
            )
        })
        .count();
    ensure!(creates == 1, "puzzle session requested {creates} times");

    let index = run.engine.progress().list_all(now_ms)?;
    ensure!(
        index.entries.contains_key(&puzzle_id) && index.corrupted_keys.is_empty(),
        "progress index is out of step: {:?}",
        index.corrupted_keys
    );
    Ok(())
}

/// Every hint opens once, costs nothing, and is remembered.
pub fn hint_reveal(run: &mut ScenarioRun) -> Result<()> {
    let mut state = run.start_named("Lyngenfjorden")?;
    let number = puzzle_number(&state)?;
    let fjord = state
        .puzzle
        .as_ref()
        .map(|puzzle| puzzle.fjord.clone())
        .context("no puzzle loaded")?;

    let mut weather_cache = TtlCache::new();
    let mut decoded = 0;
    for kind in HintKind::ALL {
        ensure!(fjord.hint_available(kind), "{kind} hint has no material");
        if kind == HintKind::Weather {
            for _ in 0..2 {
                let reading = weather_for(&mut weather_cache, &fjord, Language::No, &mut decoded)?;
                ensure!(
                    reading.conditions == "Lett regn" && reading.wind_label(Language::No) == "SSV",
                    "weather hint reads {} from {}",
                    reading.conditions,
                    reading.wind_label(Language::No)
                );
            }
            ensure!(decoded == 1, "weather decoded {decoded} times despite the cache");
        }
        let first = run.reveal(&state, kind)?;
        ensure!(first.changed, "{kind} hint did not open");
        ensure!(
            first.effects.len() == 1,
            "{kind} hint queued {} session effects",
            first.effects.len()
        );
        let again = run.reveal(&first.state, kind)?;
        ensure!(
            !again.changed && again.effects.is_empty(),
            "{kind} hint opened twice"
        );
        ensure!(again.state.attempts_used == 0, "hint consumed an attempt");
        state = again.state;
    }
    ensure!(
        state.hints_used.count() == 6,
        "expected six hints, saw {}",
        state.hints_used.count()
    );

    let resumed = run.start(number)?;
    ensure!(
        resumed.hints_used == state.hints_used,
        "hints were lost on reopen"
    );

    let won = run.guess_named(&resumed, "Lyngenfjorden")?.state;
    let result = PuzzleResult::from_state(&won).context("won puzzle has no result")?;
    let summary = StatsSummary::from_results(&[result]);
    ensure!(
        summary.hint_analytics.total_hints_used == 6
            && summary.hint_analytics.games_without_hints == 0,
        "hint analytics disagree: {:?}",
        summary.hint_analytics
    );
    Ok(())
}

/// Share text layout for won and lost puzzles.
pub fn share_text_layout(run: &mut ScenarioRun) -> Result<()> {
    let state = run.start_named("Aurlandsfjorden")?;
    ensure!(
        share_text(&GameState::default(), SITE_URL).is_none(),
        "share text produced without a puzzle"
    );
    let number = puzzle_number(&state)?;
    let near = run.guess_named(&state, "Nærøyfjorden")?.state;
    let won = run.guess_named(&near, "Aurlandsfjorden")?.state;
    let text = share_text(&won, SITE_URL).context("no share text for a win")?;
    let miss = near.last_guess().context("miss not recorded")?;
    let expected = format!(
        "#Fjordle #{number} 2/{MAX_ATTEMPTS}\n\n{}%\n{SHARE_CORRECT_MARK}\n\n{SITE_URL}",
        miss.proximity_percent
    );
    ensure!(text == expected, "win share text was {text:?}");

    let mut lost = run.start_named("Varangerfjorden")?;
    for name in [
        "Lysefjorden",
        "Oslofjorden",
        "Boknafjorden",
        "Hardangerfjorden",
        "Sognefjorden",
        "Geirangerfjorden",
    ] {
        lost = run.guess_named(&lost, name)?.state;
    }
    let text = share_text(&lost, SITE_URL).context("no share text for a loss")?;
    ensure!(text.contains(&format!("X/{MAX_ATTEMPTS}")), "loss not scored X");
    ensure!(
        text.lines().filter(|line| line.ends_with('%')).count() == 6,
        "loss should list six proximities"
    );
    ensure!(!text.contains(SHARE_UNUSED_MARK), "no attempts were left to pad");

    let stats = run.engine.user_stats()?;
    ensure!(
        stats.games_played == 2 && stats.games_won == 1 && stats.win_percentage() == 50,
        "unexpected stats after a win and a loss: {stats:?}"
    );
    Ok(())
}
