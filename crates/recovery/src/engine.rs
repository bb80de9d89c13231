//! The resilience engine: the event sink of resilience simulations.

use crate::effect::{expand_targets, EventEffect};
use crate::error::RecoveryError;
use crate::failures::SrgFailureModel;
use crate::registry::StrategyRegistry;
use crate::stats::AvailabilityStats;
use crate::status::{RouteStatus, StatusCounts};
use crate::strategy::{RecoveryStrategy, StrategyParams};
use resilience_core::{EventSink, EventTargets, NetworkEvent, SimulationState, TimedEvent};
use resilience_types::{ElementSet, NetworkState, RouteId, ValidityOptions};
use std::fmt::Write;
use tracing::{debug, info, trace};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Options for the baseline check and the per-event checks.
    pub validity: ValidityOptions,

    /// Check the working state after every event.
    pub check_validity_after_event: bool,

    /// Seed of the SRG failure model.
    pub failure_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            validity: ValidityOptions::default(),
            check_validity_after_event: true,
            failure_seed: 0,
        }
    }
}

impl EngineConfig {
    pub fn with_validity(mut self, validity: ValidityOptions) -> Self {
        self.validity = validity;
        self
    }

    pub fn with_validity_after_event(mut self, check: bool) -> Self {
        self.check_validity_after_event = check;
        self
    }

    pub fn with_failure_seed(mut self, seed: u64) -> Self {
        self.failure_seed = seed;
        self
    }
}

/// Drives a recovery strategy through failure and reparation events.
///
/// The engine owns a read-only baseline and a working copy of the network.
/// For every event it:
///
/// 1. integrates availability up to the event time
/// 2. computes the event's effect on the working state
/// 3. toggles the up state of the elements that change
/// 4. asks the strategy for provisioning actions and applies them in order
/// 5. re-derives route statuses and optionally checks validity
/// 6. returns the next event of the SRG's failure process, if any
pub struct ResilienceEngine {
    config: EngineConfig,
    params: StrategyParams,
    baseline: NetworkState,
    state: NetworkState,
    strategy: Box<dyn RecoveryStrategy>,
    failure_model: SrgFailureModel,
    stats: AvailabilityStats,
    statuses: Vec<RouteStatus>,
    /// Failures not yet repaired, in arrival order.
    active_failures: Vec<EventTargets>,
    events_handled: u64,
}

impl ResilienceEngine {
    /// Validate `baseline` and initialize `strategy` against it.
    pub fn new(
        baseline: &NetworkState,
        mut strategy: Box<dyn RecoveryStrategy>,
        params: StrategyParams,
        config: EngineConfig,
    ) -> Result<Self, RecoveryError> {
        baseline.check_validity(&config.validity)?;
        let baseline = baseline.unmodifiable_view();
        strategy.initialize(&baseline, &params)?;

        let state = baseline.copy();
        let statuses = RouteStatus::classify_all(&state, config.validity.precision)?;
        let failure_model = SrgFailureModel::new(&baseline, config.failure_seed);
        info!(
            strategy = strategy.name(),
            params = %params,
            nodes = baseline.num_nodes(),
            links = baseline.num_links(),
            demands = baseline.num_demands(),
            routes = baseline.num_routes(),
            srgs = failure_model.num_srgs(),
            "Resilience engine ready"
        );

        Ok(Self {
            stats: AvailabilityStats::new(baseline.num_demands()),
            config,
            params,
            baseline,
            state,
            strategy,
            failure_model,
            statuses,
            active_failures: Vec::new(),
            events_handled: 0,
        })
    }

    /// Build the strategy named `name` from `registry`.
    pub fn from_registry(
        baseline: &NetworkState,
        registry: &StrategyRegistry,
        name: &str,
        params: StrategyParams,
        config: EngineConfig,
    ) -> Result<Self, RecoveryError> {
        let strategy = registry.build(name)?;
        Self::new(baseline, strategy, params, config)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The read-only baseline the run started from.
    pub fn baseline(&self) -> &NetworkState {
        &self.baseline
    }

    /// The working state.
    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn stats(&self) -> &AvailabilityStats {
        &self.stats
    }

    /// Status of every route, in route order.
    pub fn statuses(&self) -> &[RouteStatus] {
        &self.statuses
    }

    pub fn route_status(&self, route: RouteId) -> Option<RouteStatus> {
        self.statuses.get(route.index()).copied()
    }

    pub fn events_handled(&self) -> u64 {
        self.events_handled
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Event processing
    // ═══════════════════════════════════════════════════════════════════════

    /// The first failure of every SRG.
    pub fn initial_events(&mut self) -> Vec<TimedEvent<NetworkEvent>> {
        self.failure_model.initial_events()
    }

    /// Elements kept down by failures other than the one `targets` repairs.
    fn held_down(&self, targets: &EventTargets) -> Result<ElementSet, RecoveryError> {
        let mut held = ElementSet::new();
        let mut skipped = false;
        for failure in &self.active_failures {
            if !skipped && failure == targets {
                skipped = true;
                continue;
            }
            held.extend(&expand_targets(&self.state, failure)?);
        }
        Ok(held)
    }

    /// Effect of `event` on the working state. Does not mutate anything.
    pub fn compute_effect(&self, event: &NetworkEvent) -> Result<EventEffect, RecoveryError> {
        let held_down = match event {
            NetworkEvent::Failure(_) => ElementSet::new(),
            NetworkEvent::Reparation(targets) => self.held_down(targets)?,
        };
        Ok(EventEffect::compute(&self.state, event, &held_down)?)
    }

    /// Process one event. Returns the follow-up events to schedule.
    pub fn handle_event(
        &mut self,
        event: &TimedEvent<NetworkEvent>,
    ) -> Result<Vec<TimedEvent<NetworkEvent>>, RecoveryError> {
        let time = event.time();
        trace!(time, event = %event.payload(), "Handling network event");
        self.stats.advance(&self.state, time);

        let effect = self.compute_effect(event.payload())?;
        match event.payload() {
            NetworkEvent::Failure(targets) => {
                self.active_failures.push(targets.clone());
                self.stats.failures += 1;
            }
            NetworkEvent::Reparation(targets) => {
                if let Some(index) = self.active_failures.iter().position(|f| f == targets) {
                    self.active_failures.remove(index);
                }
                self.stats.reparations += 1;
            }
        }

        self.state
            .set_elements_up(&effect.changed_elements(), !effect.is_failure())?;

        if let EventEffect::Failure(failure) = &effect {
            self.stats.routes_affected += failure.affected_routes.len() as u64;
            self.stats.routes_unrecoverable += failure.unrecoverable_routes.len() as u64;
            for route in &failure.unrecoverable_routes {
                info!(time, route = %route, "Route unrecoverable: demand endpoint isolated");
            }
        }

        let actions = self.strategy.process_event(&self.state, &effect, event)?;
        for action in &actions {
            trace!(action = %action, "Applying provisioning action");
            self.state.apply(action)?;
        }
        self.stats.actions_applied += actions.len() as u64;

        self.statuses = RouteStatus::classify_all(&self.state, self.config.validity.precision)?;
        if self.config.check_validity_after_event {
            self.state.check_validity(&self.config.validity)?;
        }
        self.events_handled += 1;

        debug!(
            time,
            event = event.payload().type_name(),
            actions = actions.len(),
            active_failures = self.active_failures.len(),
            "Network event handled"
        );
        Ok(self.failure_model.follow_up(event).into_iter().collect())
    }

    /// Integrate availability up to `time` without handling an event, e.g. up
    /// to the simulated time limit once the run stops.
    pub fn observe_until(&mut self, time: f64) {
        self.stats.advance(&self.state, time);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════════

    /// The end-of-run report: the engine section followed by the strategy's.
    pub fn report(&mut self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "== resilience report ==");
        let _ = writeln!(out, "strategy:                 {}", self.strategy.name());
        if !self.params.is_empty() {
            let _ = writeln!(out, "parameters:               {}", self.params);
        }
        let _ = writeln!(out, "events handled:           {}", self.events_handled);
        out.push_str(&self.stats.render(
            self.strategy.rolled_back_attempts(),
            &StatusCounts::tally(&self.statuses),
        ));
        let _ = writeln!(out, "== strategy ==");
        out.push_str(&self.strategy.finish(&self.state));
        out
    }

    /// Return to the baseline: working state, strategy, failure model and
    /// statistics.
    pub fn reset(&mut self) -> Result<(), RecoveryError> {
        self.strategy.initialize(&self.baseline, &self.params)?;
        self.state = self.baseline.copy();
        self.statuses = RouteStatus::classify_all(&self.state, self.config.validity.precision)?;
        self.failure_model.reset();
        self.stats = AvailabilityStats::new(self.baseline.num_demands());
        self.active_failures.clear();
        self.events_handled = 0;
        info!(strategy = self.strategy.name(), "Resilience engine reset");
        Ok(())
    }
}

impl std::fmt::Debug for ResilienceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilienceEngine")
            .field("strategy", &self.strategy.name())
            .field("events_handled", &self.events_handled)
            .field("active_failures", &self.active_failures.len())
            .finish()
    }
}

impl EventSink for ResilienceEngine {
    type Payload = NetworkEvent;
    type Error = RecoveryError;

    fn process_event(
        &mut self,
        event: TimedEvent<NetworkEvent>,
    ) -> Result<Vec<TimedEvent<NetworkEvent>>, RecoveryError> {
        self.handle_event(&event)
    }

    fn end_of_transitory(&mut self, time: f64) {
        self.stats.advance(&self.state, time);
        self.stats.restart_at(time);
        self.strategy.finish_transitory(time);
    }

    fn refresh(&mut self, force: bool) {
        debug!(
            force,
            events = self.events_handled,
            availability = self.stats.traffic_availability(),
            "Resilience progress"
        );
    }

    fn simulation_state_changed(&mut self, state: &SimulationState) {
        debug!(state = %state, "Resilience run state changed");
    }
}
