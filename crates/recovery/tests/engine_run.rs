//! Full resilience runs under the simulation driver.

use resilience_core::{SimulationState, StopReason};
use resilience_recovery::{
    EngineConfig, ResilienceEngine, StrategyParams, StrategyRegistry, LOCAL_REPAIR, RESTORATION,
};
use resilience_simulation::{DriverConfig, SimulationDriver};
use resilience_test_helpers::fixtures;
use resilience_types::ValidityOptions;
use tracing_test::traced_test;

const HORIZON: f64 = 20_000.0;

fn driver(strategy: &str, seed: u64) -> SimulationDriver<ResilienceEngine> {
    let fixture = fixtures::ring(8, 40.0, 300.0, 4.0);
    let mut engine = ResilienceEngine::from_registry(
        &fixture.state,
        &StrategyRegistry::default(),
        strategy,
        StrategyParams::new(),
        EngineConfig::default().with_failure_seed(seed),
    )
    .unwrap();
    let initial = engine.initial_events();
    let config = DriverConfig::default()
        .with_total_sim_time(HORIZON)
        .with_transitory_time(1000.0);
    let mut driver = SimulationDriver::new(config, engine).unwrap();
    driver.schedule_all(initial).unwrap();
    driver
}

/// Run to completion and return the report.
fn run(driver: &mut SimulationDriver<ResilienceEngine>) -> String {
    let state = driver.run();
    assert_eq!(state, SimulationState::Stopped(StopReason::EndOfSimulation));
    driver.sink_mut().observe_until(HORIZON);
    driver.sink_mut().report()
}

#[traced_test]
#[test]
fn test_run_reaches_time_limit_with_valid_state() {
    let mut driver = driver(RESTORATION, 7);
    let report = run(&mut driver);

    let engine = driver.sink();
    assert!(engine.events_handled() > 0);
    assert_eq!(engine.events_handled(), driver.stats().events_processed);
    assert!(engine
        .state()
        .check_validity(&ValidityOptions::default())
        .is_ok());
    assert!(driver.clock().current_time() <= HORIZON);
    let transitory_end = driver.stats().transitory_end_time.unwrap();
    assert!(transitory_end < 1000.0);

    let stats = engine.stats();
    assert!(stats.failures > 0);
    assert!((0.0..=1.0).contains(&stats.traffic_availability()));
    assert!(stats.worst_availability() <= stats.mean_availability());
    // Measurement starts when the transitory period ends.
    assert!((stats.observed_time() - (HORIZON - transitory_end)).abs() < 1e-6);

    assert!(report.starts_with("== resilience report =="));
    assert!(report.contains("strategy:                 restoration"));
    assert!(report.contains("== strategy =="));
    assert!(report.contains("end-to-end restoration"));
}

#[test]
fn test_same_seed_same_run() {
    let mut first = driver(RESTORATION, 11);
    let mut second = driver(RESTORATION, 11);
    let mut other = driver(RESTORATION, 12);

    let first_report = run(&mut first);
    assert_eq!(first_report, run(&mut second));
    assert_eq!(first.sink().state(), second.sink().state());
    assert_ne!(first_report, run(&mut other));
}

#[test]
fn test_reset_replays_the_same_run() {
    let mut driver = driver(LOCAL_REPAIR, 3);
    let first_report = run(&mut driver);
    let first_state = driver.sink().state().clone();

    driver.reset();
    driver.sink_mut().reset().unwrap();
    assert_eq!(driver.sink().state(), driver.sink().baseline());
    let initial = driver.sink_mut().initial_events();
    driver.schedule_all(initial).unwrap();

    assert_eq!(run(&mut driver), first_report);
    assert_eq!(driver.sink().state(), &first_state);
}

#[test]
fn test_every_builtin_strategy_completes() {
    let registry = StrategyRegistry::default();
    for name in registry.names() {
        let mut driver = driver(name, 5);
        let report = run(&mut driver);
        assert!(report.contains(name), "{name} missing from its report");
        assert!(driver.sink().stats().failures > 0, "{name} saw no failures");
    }
}

#[test]
fn test_unknown_strategy_is_a_configuration_error() {
    let fixture = fixtures::ring(4, 40.0, 300.0, 4.0);
    let result = ResilienceEngine::from_registry(
        &fixture.state,
        &StrategyRegistry::default(),
        "rewire-everything",
        StrategyParams::new(),
        EngineConfig::default(),
    );
    assert!(matches!(
        result,
        Err(resilience_recovery::RecoveryError::Configuration(_))
    ));
}
