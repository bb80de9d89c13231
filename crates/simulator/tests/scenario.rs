//! End-to-end scenario runs.

use resilience_core::{SimulationState, StopReason};
use resilience_simulator::{Scenario, ScenarioConfig, SimulatorError};
use tracing_test::traced_test;

const SMALL_RING: &str = r#"
[driver]
total_sim_time = 20000.0
transitory_time = 2000.0

[topology]
kind = "ring"
nodes = 6
wavelengths = 16

[strategy]
seed = 21
"#;

fn scenario(strategy: &str) -> Scenario {
    let mut config = ScenarioConfig::from_toml_str(SMALL_RING).unwrap();
    config.strategy.name = strategy.to_string();
    Scenario::new(config).unwrap()
}

#[traced_test]
#[test]
fn test_default_strategy_runs_to_the_horizon() {
    let outcome = scenario("restoration").run().unwrap();

    assert_eq!(
        outcome.state,
        SimulationState::Stopped(StopReason::EndOfSimulation)
    );
    assert!(outcome.driver_stats.events_processed > 0);
    assert_eq!(outcome.latency.events, outcome.driver_stats.events_processed);
    assert_eq!(outcome.latency.errors, 0);
    assert!(outcome.driver_stats.transitory_end_time.is_some());

    let text = outcome.render();
    assert!(text.contains("== resilience report =="));
    assert!(text.contains("== event latency =="));
    assert!(text.contains("stopped:                  Stopped(EndOfSimulation)"));
}

#[test]
fn test_every_strategy_runs() {
    for name in ["restoration", "local-repair", "protection", "wdm-restoration"] {
        let outcome = scenario(name)
            .run()
            .unwrap_or_else(|e| panic!("{name} failed: {e}"));
        assert!(outcome.report.contains(name));
    }
}

#[test]
fn test_same_seed_same_report() {
    let first = scenario("local-repair").run().unwrap();
    let second = scenario("local-repair").run().unwrap();
    assert_eq!(first.report, second.report);
    assert_eq!(
        first.driver_stats.events_processed,
        second.driver_stats.events_processed
    );
}

#[test]
fn test_unknown_strategy_fails_before_running() {
    let err = scenario("teleport").run().unwrap_err();
    assert!(matches!(err, SimulatorError::Recovery(_)));
    assert!(err.to_string().contains("teleport"));
}
