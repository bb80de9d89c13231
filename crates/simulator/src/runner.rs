//! Scenario runner.

use crate::config::ScenarioConfig;
use crate::error::SimulatorError;
use crate::metered::{LatencySummary, MeteredSink};
use crate::topology;
use resilience_core::{SimulationState, StopReason};
use resilience_recovery::{ResilienceEngine, StrategyRegistry};
use resilience_simulation::{SimulationDriver, SimulationStats};
use resilience_types::NetworkState;
use tracing::info;

/// Result of one scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// State the driver stopped in.
    pub state: SimulationState,
    /// Engine and strategy report.
    pub report: String,
    pub latency: LatencySummary,
    pub driver_stats: SimulationStats,
}

impl ScenarioOutcome {
    /// Everything printed at the end of a run.
    pub fn render(&self) -> String {
        let mut out = self.report.clone();
        out.push_str(&self.latency.to_string());
        let transitory = self
            .driver_stats
            .transitory_end_time
            .map_or_else(|| "none".to_string(), |t| format!("ended at {t:.1}"));
        out.push_str("== driver ==\n");
        out.push_str(&format!(
            "events processed:         {}\n",
            self.driver_stats.events_processed
        ));
        out.push_str(&format!("transitory:               {transitory}\n"));
        out.push_str(&format!("stopped:                  {}\n", self.state));
        out
    }
}

/// A configured scenario: generated network plus strategy registry.
pub struct Scenario {
    config: ScenarioConfig,
    network: NetworkState,
    registry: StrategyRegistry,
}

impl Scenario {
    /// Generate the network described by `config`.
    pub fn new(config: ScenarioConfig) -> Result<Self, SimulatorError> {
        let network = topology::generate(&config.topology)?;
        Ok(Self {
            config,
            network,
            registry: StrategyRegistry::default(),
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn network(&self) -> &NetworkState {
        &self.network
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Run the configured strategy until the driver stops.
    ///
    /// A run that stops on a fault is an error.
    pub fn run(&self) -> Result<ScenarioOutcome, SimulatorError> {
        let driver_config = self.config.driver_config()?;
        let horizon = driver_config.total_sim_time;

        let mut engine = ResilienceEngine::from_registry(
            &self.network,
            &self.registry,
            &self.config.strategy.name,
            self.config.strategy_params(),
            self.config.engine_config(),
        )?;
        let initial = engine.initial_events();

        let mut driver = SimulationDriver::new(driver_config, MeteredSink::new(engine)?)?;
        let scheduled = driver.schedule_all(initial)?;
        info!(
            strategy = %self.config.strategy.name,
            seed = self.config.engine_config().failure_seed,
            scheduled,
            "Scenario starting"
        );

        let state = driver.run();
        if let SimulationState::Stopped(StopReason::Fault(fault)) = &state {
            return Err(SimulatorError::Fault(fault.clone()));
        }

        let driver_stats = driver.stats().clone();
        let latency = driver.sink().latency();
        let engine = driver.sink_mut().inner_mut();
        // Count the quiet time up to the horizon; without one, stop at the
        // last event.
        if let Some(horizon) = horizon {
            engine.observe_until(horizon);
        }
        let report = engine.report();

        info!(
            events = driver_stats.events_processed,
            availability = engine.stats().traffic_availability(),
            "Scenario finished"
        );
        Ok(ScenarioOutcome {
            state,
            report,
            latency,
            driver_stats,
        })
    }
}
