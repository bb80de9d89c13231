//! The recovery strategy contract.

use crate::effect::{EventEffect, FailureEffect};
use crate::error::RecoveryError;
use crate::ledger::CapacityLedger;
use crate::paths::{constrained_shortest_path, widest_path, LinkCost};
use resilience_core::{ConfigurationError, NetworkEvent, TimedEvent};
use resilience_types::{
    link_path, NetworkState, PathElement, ProvisioningAction, Route, RouteId, StateError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Relative precision of the check between a strategy's ledger and the
/// residual capacities of a failure.
const RESIDUAL_PRECISION: f64 = 1e-9;

/// A pluggable recovery algorithm.
///
/// The engine computes the effect of every event, toggles the up state of
/// the elements involved, then asks the strategy for provisioning actions.
/// Strategies never mutate the network state themselves; the engine applies
/// the returned actions in order.
///
/// # Capacity accounting
///
/// Strategies keep their own [`CapacityLedger`] in step with the actions they
/// emit, and make every route change with
/// [`attempt_with`](crate::ledger::attempt_with) so that a rejected attempt
/// leaves the ledger untouched. On failure, [`recover_failure`] releases the
/// reservations of every affected route before any of them is planned, so
/// higher-priority routes are served first from all the capacity the failure
/// freed.
pub trait RecoveryStrategy: Send {
    /// Registry name of the strategy.
    fn name(&self) -> &'static str;

    /// One-time setup against the run's baseline state.
    fn initialize(
        &mut self,
        baseline: &NetworkState,
        params: &StrategyParams,
    ) -> Result<(), RecoveryError>;

    /// React to one event. `state` already reflects the event's topology change.
    fn process_event(
        &mut self,
        state: &NetworkState,
        effect: &EventEffect,
        event: &TimedEvent<NetworkEvent>,
    ) -> Result<Vec<ProvisioningAction>, RecoveryError>;

    /// Called once when the transitory period ends.
    fn finish_transitory(&mut self, _time: f64) {}

    /// Summary for the end-of-run report.
    fn finish(&mut self, state: &NetworkState) -> String;

    /// Attempts rejected by the capacity check so far.
    fn rolled_back_attempts(&self) -> u64 {
        0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════════════════════

/// Name/value parameters of a strategy.
///
/// Unknown keys are ignored by strategies; malformed values are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyParams {
    values: BTreeMap<String, String>,
}

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        self.values.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigurationError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| !v.is_nan())
                .ok_or_else(|| ConfigurationError::invalid(key, format!("not a number: {raw:?}"))),
        }
    }

    pub fn u32_or(&self, key: &str, default: u32) -> Result<u32, ConfigurationError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ConfigurationError::invalid(key, format!("not a non-negative integer: {raw:?}"))
            }),
        }
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigurationError> {
        match self.get(key).map(str::trim) {
            None => Ok(default),
            Some("true") | Some("1") | Some("yes") => Ok(true),
            Some("false") | Some("0") | Some("no") => Ok(false),
            Some(raw) => Err(ConfigurationError::invalid(
                key,
                format!("not a boolean: {raw:?}"),
            )),
        }
    }

    /// The `cost` parameter.
    pub fn link_cost(&self) -> Result<LinkCost, ConfigurationError> {
        self.get("cost")
            .map(LinkCost::parse)
            .unwrap_or(Ok(LinkCost::default()))
    }
}

impl<K, V> FromIterator<(K, V)> for StrategyParams
where
    K: Into<String>,
    V: ToString,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = StrategyParams::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.values {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
            first = false;
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Shared building blocks
// ═══════════════════════════════════════════════════════════════════════════

/// Order routes by descending priority, keeping the given order among equals.
pub fn order_by_priority(state: &NetworkState, routes: &[RouteId]) -> Vec<RouteId> {
    let mut ordered: Vec<(RouteId, i32)> = routes
        .iter()
        .map(|&id| (id, state.route(id).map(|r| r.priority).unwrap_or(i32::MIN)))
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered.into_iter().map(|(id, _)| id).collect()
}

/// Whether a route is out of service: its path is unusable, or it was
/// preempted down to no traffic.
pub fn needs_recovery(state: &NetworkState, route: &Route) -> bool {
    !state.is_path_usable(&route.path) || route.is_preempted()
}

/// Credit back the reservation of every route hit by `effect`.
///
/// The ledger then holds the effect's residual capacities. Any other result
/// means the ledger drifted from the committed routes, and nothing is
/// released.
pub fn release_affected(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    effect: &FailureEffect,
) -> Result<(), StateError> {
    let checkpoint = ledger.checkpoint();
    for &id in &effect.affected_routes {
        ledger.credit_route(state.route(id)?)?;
    }
    if let Some(mismatch) = ledger.mismatch(
        &effect.link_residual_capacity,
        &effect.segment_residual_capacity,
        RESIDUAL_PRECISION,
    ) {
        ledger.rollback(checkpoint);
        return Err(StateError::InvariantViolation(format!(
            "released capacity disagrees with the failure effect: {mismatch}"
        )));
    }
    ledger.commit(checkpoint);
    Ok(())
}

/// Give a route that got no action its old reservation back.
///
/// When higher-priority routes claimed part of it, the route stays on its
/// path carrying nothing, and the ledger keeps no reservation for it.
pub fn keep_or_preempt(
    ledger: &mut CapacityLedger,
    route: &Route,
    counters: &mut StrategyCounters,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<(), StateError> {
    if ledger.reserve_route(route)? {
        return Ok(());
    }
    debug!(route = %route.id, "Reservation claimed by higher-priority routes");
    counters.preempted += 1;
    actions.push(ProvisioningAction::ModifyRoute {
        route: route.id,
        path: route.path.clone(),
        carried_traffic: 0.0,
    });
    Ok(())
}

/// Recover the routes hit by a failure, highest priority first.
///
/// Every affected reservation is released up front. `recover` plans one
/// route against the released ledger and returns whether it emitted an
/// action. Routes that get none, unrecoverable ones included, go through
/// [`keep_or_preempt`] at their turn, before any lower-priority route is
/// planned.
pub fn recover_failure<F>(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    effect: &FailureEffect,
    counters: &mut StrategyCounters,
    actions: &mut Vec<ProvisioningAction>,
    mut recover: F,
) -> Result<(), RecoveryError>
where
    F: FnMut(
        &mut CapacityLedger,
        &Route,
        &mut StrategyCounters,
        &mut Vec<ProvisioningAction>,
    ) -> Result<bool, RecoveryError>,
{
    release_affected(state, ledger, effect)?;
    let unrecoverable: BTreeSet<RouteId> = effect.unrecoverable_routes.iter().copied().collect();
    for id in order_by_priority(state, &effect.affected_routes) {
        let route = state.route(id)?;
        let placed = if unrecoverable.contains(&id) {
            counters.skipped_unrecoverable += 1;
            false
        } else {
            recover(ledger, route, counters, actions)?
        };
        if !placed {
            keep_or_preempt(ledger, route, counters, actions)?;
        }
    }
    Ok(())
}

/// Whether a route sits on its primary path at its original volume.
pub fn is_on_primary(route: &Route) -> bool {
    route.path == route.primary_path && route.carried_traffic == route.primary_traffic
}

/// End-to-end candidate from the demand's ingress to its egress.
///
/// Looks for a path carrying the route's original volume; with
/// `allow_partial`, falls back to the widest path at its bottleneck.
pub fn end_to_end_candidate(
    state: &NetworkState,
    ledger: &CapacityLedger,
    route: &Route,
    cost: LinkCost,
    allow_partial: bool,
) -> Result<Option<(Vec<PathElement>, f64)>, StateError> {
    let demand = state.demand(route.demand)?;
    let volume = route.primary_traffic;
    if let Some(links) =
        constrained_shortest_path(state, ledger, demand.ingress, demand.egress, volume, cost)
    {
        return Ok(Some((link_path(&links), volume)));
    }
    if allow_partial {
        if let Some((links, bottleneck)) = widest_path(state, ledger, demand.ingress, demand.egress)
        {
            return Ok(Some((link_path(&links), bottleneck.min(volume))));
        }
    }
    Ok(None)
}

/// Candidate moving a route back to its primary path at its original volume.
pub fn revert_candidate(
    state: &NetworkState,
    ledger: &CapacityLedger,
    route: &Route,
) -> Option<(Vec<PathElement>, f64)> {
    (state.is_path_usable(&route.primary_path)
        && ledger.can_carry(&route.primary_path, route.primary_traffic))
    .then(|| (route.primary_path.clone(), route.primary_traffic))
}

/// Counters shared by the built-in strategies.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StrategyCounters {
    pub rerouted: u64,
    pub partial: u64,
    pub reverted: u64,
    pub no_candidate: u64,
    pub rolled_back: u64,
    pub skipped_unrecoverable: u64,
    /// Routes whose reservation went to higher-priority routes.
    pub preempted: u64,
}

impl StrategyCounters {
    pub fn render(&self, out: &mut String) {
        use std::fmt::Write;
        let _ = writeln!(out, "  rerouted routes:        {}", self.rerouted);
        let _ = writeln!(out, "  partially restored:     {}", self.partial);
        let _ = writeln!(out, "  reverted to primary:    {}", self.reverted);
        let _ = writeln!(out, "  no feasible candidate:  {}", self.no_candidate);
        let _ = writeln!(out, "  rolled back attempts:   {}", self.rolled_back);
        let _ = writeln!(out, "  unrecoverable skipped:  {}", self.skipped_unrecoverable);
        let _ = writeln!(out, "  preempted reservations: {}", self.preempted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_typed_getters() {
        let params = StrategyParams::new()
            .with("allowPartial", "true")
            .with("maxReachKm", 2500)
            .with("cost", "km")
            .with("broken", "x1");

        assert!(params.bool_or("allowPartial", false).unwrap());
        assert!(!params.bool_or("missing", false).unwrap());
        assert_eq!(params.f64_or("maxReachKm", 0.0).unwrap(), 2500.0);
        assert_eq!(params.u32_or("maxReachKm", 0).unwrap(), 2500);
        assert_eq!(params.link_cost().unwrap(), LinkCost::Km);
        assert!(matches!(
            params.f64_or("broken", 0.0),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
        assert!(params.bool_or("broken", true).is_err());
        assert_eq!(
            params.to_string(),
            "allowPartial=true, broken=x1, cost=km, maxReachKm=2500"
        );
    }

    #[test]
    fn test_unknown_cost_is_rejected() {
        let params: StrategyParams = [("cost", "euros")].into_iter().collect();
        assert!(params.link_cost().is_err());
        assert_eq!(StrategyParams::new().link_cost().unwrap(), LinkCost::Hops);
    }

    #[test]
    fn test_priority_order_is_stable() {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let ab = state.add_link(a, b, 100.0, 1.0).unwrap();
        let demand = state.add_demand(a, b, 100.0).unwrap();
        let routes: Vec<RouteId> = [1, 5, 1, 7, 5]
            .into_iter()
            .map(|p| state.add_route(demand, link_path(&[ab]), 1.0, p).unwrap())
            .collect();

        let ordered = order_by_priority(&state, &routes);
        assert_eq!(
            ordered,
            vec![routes[3], routes[1], routes[4], routes[0], routes[2]]
        );
    }
}
