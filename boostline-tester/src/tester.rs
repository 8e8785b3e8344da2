use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::harness::RunSummary;
use crate::scenarios::{Scenario, ScenarioCtx};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    pub commits: usize,
    pub engine_events: usize,
    pub simulated_seconds: f64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

pub struct ScenarioRunner {
    dt: f64,
    verbose: bool,
}

impl ScenarioRunner {
    pub const fn new(dt: f64, verbose: bool) -> Self {
        Self { dt, verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();

        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed}, dt: {:.4})",
                    scenario.key.bright_white(),
                    self.dt
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations));
        }

        results
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut totals = RunSummary::default();
        let mut performance_data = Vec::new();

        for i in 0..iterations {
            let start_time = Instant::now();
            let ctx = ScenarioCtx {
                seed: seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX)),
                dt: self.dt,
                verbose: self.verbose,
            };

            match (scenario.run)(&ctx) {
                Ok(summary) => {
                    successes += 1;
                    let duration = start_time.elapsed();
                    performance_data.push(duration);
                    totals.commits += summary.commits;
                    totals.events += summary.events;
                    totals.sim_seconds += summary.sim_seconds;
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) commits:{} events:{} ticks:{}",
                            i + 1,
                            iterations,
                            summary.commits,
                            summary.events,
                            summary.ticks
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {}): {err:#}", i + 1, ctx.seed);
                    if self.verbose {
                        println!(
                            "  ❌ Iteration {}/{} failed: {}",
                            i + 1,
                            iterations,
                            format!("{err:#}").red()
                        );
                    }
                    log::warn!("{} {message}", scenario.key);
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };

        ScenarioResult {
            scenario_name: scenario.key.to_string(),
            seed,
            passed: failures.is_empty() && iterations > 0,
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            commits: totals.commits,
            engine_events: totals.events,
            simulated_seconds: totals.sim_seconds,
            average_duration,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_micros().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let micros = u128::deserialize(deserializer)?;
        Ok(Duration::from_micros(u64::try_from(micros).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::get_scenario;

    #[test]
    fn runner_reports_one_result_per_seed() {
        let runner = ScenarioRunner::new(1.0 / 60.0, false);
        let scenario = get_scenario("booster-basic").unwrap();
        let results = runner.run_scenario(scenario, &[1, 2], 2);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.passed));
        assert!(results.iter().all(|r| r.successful_iterations == 2));
        assert_eq!(results[0].commits, 2);
    }

    #[test]
    fn zero_iterations_do_not_pass() {
        let runner = ScenarioRunner::new(0.1, false);
        let scenario = get_scenario("stacking").unwrap();
        let results = runner.run_scenario(scenario, &[7], 0);
        assert!(!results[0].passed);
    }

    #[test]
    fn bad_step_is_reported_as_failure() {
        let runner = ScenarioRunner::new(-1.0, false);
        let scenario = get_scenario("booster-basic").unwrap();
        let result = &runner.run_scenario(scenario, &[7], 1)[0];
        assert!(!result.passed);
        assert!(result.failures[0].contains("time step"));
    }
}
