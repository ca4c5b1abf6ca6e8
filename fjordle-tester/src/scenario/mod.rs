use anyhow::Result;

use crate::logic::ScenarioRun;

pub mod persistence;
pub mod play;

/// A named check driven through the engine the way a client would.
#[derive(Debug, Clone, Copy)]
pub struct TestScenario {
    pub key: &'static str,
    pub name: &'static str,
    pub run: fn(&mut ScenarioRun) -> Result<()>,
}

const SCENARIOS: [TestScenario; 7] = [
    TestScenario {
        key: "smoke",
        name: "Geirangerfjorden End to End",
        run: play::smoke,
    },
    TestScenario {
        key: "duplicate-guard",
        name: "Duplicate and Finished-Game Guards",
        run: play::duplicate_guard,
    },
    TestScenario {
        key: "exhaust-attempts",
        name: "Six Misses Lose the Puzzle",
        run: play::exhaust_attempts,
    },
    TestScenario {
        key: "random-play",
        name: "Seeded Random Player",
        run: play::random_play,
    },
    TestScenario {
        key: "snapshot-roundtrip",
        name: "Progress Snapshot Round Trip",
        run: persistence::snapshot_roundtrip,
    },
    TestScenario {
        key: "hint-reveal",
        name: "Hint Reveal Bookkeeping",
        run: persistence::hint_reveal,
    },
    TestScenario {
        key: "share-text",
        name: "Share Text Layout",
        run: persistence::share_text_layout,
    },
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS
        .iter()
        .map(|scenario| (scenario.key, scenario.name))
        .collect()
}

pub fn all_scenario_keys() -> Vec<String> {
    SCENARIOS
        .iter()
        .map(|scenario| scenario.key.to_string())
        .collect()
}

pub fn get_scenario(name: &str) -> Option<TestScenario> {
    let key = match name.to_lowercase().as_str() {
        "duplicate" | "duplicates" => "duplicate-guard",
        "exhaust" | "lose" => "exhaust-attempts",
        "random" => "random-play",
        "snapshot" | "resume" => "snapshot-roundtrip",
        "hints" => "hint-reveal",
        "share" => "share-text",
        other => return SCENARIOS.iter().find(|scenario| scenario.key == other).copied(),
    };
    SCENARIOS.iter().find(|scenario| scenario.key == key).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_listed_scenarios() {
        assert_eq!(get_scenario("SMOKE").map(|s| s.key), Some("smoke"));
        assert_eq!(get_scenario("share").map(|s| s.key), Some("share-text"));
        assert!(get_scenario("vehicle-system").is_none());
        assert_eq!(list_scenarios().len(), all_scenario_keys().len());
    }
}
