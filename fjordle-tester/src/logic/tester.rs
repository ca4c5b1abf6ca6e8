use colored::Colorize;
use fjordle_game::{DispatchReport, Outbox};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::logic::assets::TesterAssets;
use crate::logic::harness::{ScenarioRun, TesterStore};
use crate::logic::sessions::LoggingSessionStore;
use crate::scenario::TestScenario;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_key: String,
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
    pub sessions: DispatchReport,
}

pub struct LogicTester {
    assets: TesterAssets,
    sessions: Arc<LoggingSessionStore>,
    state_dir: Option<PathBuf>,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(
        assets: TesterAssets,
        sessions: Arc<LoggingSessionStore>,
        state_dir: Option<PathBuf>,
        verbose: bool,
    ) -> Self {
        Self {
            assets,
            sessions,
            state_dir,
            verbose,
        }
    }

    pub async fn run_scenario(
        &self,
        scenario: &TestScenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {})",
                    scenario.name.bright_white(),
                    seed
                );
            }

            let result = self.run_single_scenario(scenario, seed, iterations).await;
            results.push(result);
        }

        results
    }

    async fn run_single_scenario(
        &self,
        scenario: &TestScenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut dispatches: Vec<JoinHandle<DispatchReport>> = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            let label = format!("{}-seed-{seed}-{}", scenario.key, i + 1);

            match self.run_iteration(scenario, iteration_seed, &label) {
                Ok(mut outbox) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    dispatches.push(outbox.spawn_dispatch(Arc::clone(&self.sessions)));
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?})",
                            i + 1,
                            iterations
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            message.clone().red()
                        );
                    }
                    failures.push(message);
                }
            }
        }

        let mut reports = Vec::with_capacity(dispatches.len());
        for handle in dispatches {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(err) => failures.push(format!("session dispatch task failed: {err}")),
            }
        }
        let sessions = DispatchReport::combine(reports);
        if sessions.failed > 0 {
            failures.push(format!(
                "{} of {} session effects were rejected",
                sessions.failed,
                sessions.total()
            ));
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_key: scenario.key.to_string(),
            scenario_name: scenario.name.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_duration,
            performance_data,
            sessions,
        }
    }

    fn run_iteration(
        &self,
        scenario: &TestScenario,
        seed: u64,
        label: &str,
    ) -> anyhow::Result<Outbox> {
        let store = TesterStore::open(self.state_dir.as_ref(), label)?;
        let mut run = ScenarioRun::new(&self.assets, store, seed, self.verbose)?;
        (scenario.run)(&mut run)?;
        Ok(run.take_effects())
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u64>::deserialize(deserializer)?;
        Ok(millis.into_iter().map(Duration::from_millis).collect())
    }
}
