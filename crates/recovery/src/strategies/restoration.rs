//! End-to-end restoration.
//!
//! On failure, every affected route is rerouted from its ingress to its
//! egress over the capacity freed by the failure plus the capacity already
//! free, at its original volume (or at the widest path's bottleneck when
//! partial restoration is allowed). On reparation, routes away from their
//! primary path revert to it when it fits, and routes still out of service
//! are retried.

use crate::effect::{EventEffect, ReparationEffect};
use crate::error::RecoveryError;
use crate::ledger::{attempt_reroute, attempt_with, Attempt, CapacityLedger, Reservation};
use crate::paths::LinkCost;
use crate::strategy::{
    end_to_end_candidate, is_on_primary, needs_recovery, order_by_priority, recover_failure,
    revert_candidate, RecoveryStrategy, StrategyCounters, StrategyParams,
};
use resilience_core::{NetworkEvent, TimedEvent};
use resilience_types::{NetworkState, ProvisioningAction, Route, RouteId, StateError};
use tracing::{debug, info};

/// Registry name.
pub const RESTORATION: &str = "restoration";

#[derive(Debug, Clone, Default)]
pub struct RestorationStrategy {
    cost: LinkCost,
    allow_partial: bool,
    revert: bool,
    ledger: Option<CapacityLedger>,
    counters: StrategyCounters,
}

impl RestorationStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The strategy's capacity ledger, once initialized.
    pub fn ledger(&self) -> Option<&CapacityLedger> {
        self.ledger.as_ref()
    }

    pub fn counters(&self) -> &StrategyCounters {
        &self.counters
    }
}

/// Reroute one route end to end. Returns whether an action was emitted.
#[allow(clippy::too_many_arguments)]
pub(crate) fn restore_route(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    route: &Route,
    reservation: Reservation,
    cost: LinkCost,
    allow_partial: bool,
    counters: &mut StrategyCounters,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<bool, StateError> {
    let mut planning_error = None;
    let attempt = attempt_with(ledger, route, reservation, |ledger| {
        match end_to_end_candidate(state, ledger, route, cost, allow_partial) {
            Ok(candidate) => candidate,
            Err(e) => {
                planning_error = Some(e);
                None
            }
        }
    })?;
    if let Some(e) = planning_error {
        return Err(e);
    }
    let committed = attempt.is_committed();
    record(route.id, route.primary_traffic, attempt, counters, actions);
    Ok(committed)
}

/// Retry routes that are still out of service, in priority order. Their
/// reservations are held.
pub(crate) fn restore_routes(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    counters: &mut StrategyCounters,
    routes: &[RouteId],
    cost: LinkCost,
    allow_partial: bool,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<(), StateError> {
    for id in order_by_priority(state, routes) {
        let route = state.route(id)?;
        if !needs_recovery(state, route) {
            continue;
        }
        restore_route(
            state,
            ledger,
            route,
            Reservation::Held,
            cost,
            allow_partial,
            counters,
            actions,
        )?;
    }
    Ok(())
}

/// Move reparable routes back to their primary path, in priority order.
pub(crate) fn revert_routes(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    counters: &mut StrategyCounters,
    effect: &ReparationEffect,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<(), StateError> {
    for id in order_by_priority(state, &effect.reparable_routes) {
        let route = state.route(id)?;
        if is_on_primary(route) {
            continue;
        }
        if !effect.residual_allows(&route.primary_path, route.primary_traffic, ledger.tolerance()) {
            debug!(route = %id, "Primary path short of capacity");
            counters.no_candidate += 1;
            continue;
        }
        match attempt_reroute(ledger, route, |ledger| revert_candidate(state, ledger, route))? {
            Attempt::Committed {
                path,
                carried_traffic,
            } => {
                debug!(route = %id, "Reverted to primary path");
                counters.reverted += 1;
                actions.push(ProvisioningAction::ModifyRoute {
                    route: id,
                    path,
                    carried_traffic,
                });
            }
            Attempt::NoCandidate => counters.no_candidate += 1,
            Attempt::RolledBack => counters.rolled_back += 1,
        }
    }
    Ok(())
}

fn record(
    route: RouteId,
    original_volume: f64,
    attempt: Attempt,
    counters: &mut StrategyCounters,
    actions: &mut Vec<ProvisioningAction>,
) {
    match attempt {
        Attempt::Committed {
            path,
            carried_traffic,
        } => {
            let partial = carried_traffic < original_volume;
            debug!(route = %route, carried_traffic, partial, "Committed reroute");
            counters.rerouted += 1;
            if partial {
                counters.partial += 1;
            }
            actions.push(ProvisioningAction::ModifyRoute {
                route,
                path,
                carried_traffic,
            });
        }
        Attempt::NoCandidate => {
            debug!(route = %route, "No feasible reroute");
            counters.no_candidate += 1;
        }
        Attempt::RolledBack => {
            debug!(route = %route, "Reroute rolled back");
            counters.rolled_back += 1;
        }
    }
}

impl RecoveryStrategy for RestorationStrategy {
    fn name(&self) -> &'static str {
        RESTORATION
    }

    fn initialize(
        &mut self,
        baseline: &NetworkState,
        params: &StrategyParams,
    ) -> Result<(), RecoveryError> {
        self.cost = params.link_cost()?;
        self.allow_partial = params.bool_or("allowPartial", false)?;
        self.revert = params.bool_or("revert", true)?;
        self.ledger = Some(CapacityLedger::from_state(baseline));
        self.counters = StrategyCounters::default();
        info!(
            cost = ?self.cost,
            allow_partial = self.allow_partial,
            revert = self.revert,
            "Restoration strategy initialized"
        );
        Ok(())
    }

    fn process_event(
        &mut self,
        state: &NetworkState,
        effect: &EventEffect,
        _event: &TimedEvent<NetworkEvent>,
    ) -> Result<Vec<ProvisioningAction>, RecoveryError> {
        let ledger = self
            .ledger
            .as_mut()
            .ok_or(RecoveryError::NotInitialized(RESTORATION))?;
        let mut actions = Vec::new();
        match effect {
            EventEffect::Failure(effect) => {
                let (cost, allow_partial) = (self.cost, self.allow_partial);
                recover_failure(
                    state,
                    ledger,
                    effect,
                    &mut self.counters,
                    &mut actions,
                    |ledger, route, counters, actions| {
                        Ok(restore_route(
                            state,
                            ledger,
                            route,
                            Reservation::Released,
                            cost,
                            allow_partial,
                            counters,
                            actions,
                        )?)
                    },
                )?;
            }
            EventEffect::Reparation(effect) => {
                if self.revert {
                    revert_routes(
                        state,
                        ledger,
                        &mut self.counters,
                        effect,
                        &mut actions,
                    )?;
                }
                restore_routes(
                    state,
                    ledger,
                    &mut self.counters,
                    &effect.pending_routes,
                    self.cost,
                    self.allow_partial,
                    &mut actions,
                )?;
            }
        }
        Ok(actions)
    }

    fn finish(&mut self, _state: &NetworkState) -> String {
        let mut out = format!(
            "end-to-end restoration (cost={:?}, allowPartial={}, revert={})\n",
            self.cost, self.allow_partial, self.revert
        );
        self.counters.render(&mut out);
        out
    }

    fn rolled_back_attempts(&self) -> u64 {
        self.counters.rolled_back
    }
}
