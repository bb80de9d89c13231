//! Pre-provisioned segment protection.
//!
//! A route switches onto one of its backup segments whose endpoints lie on
//! its current path, replacing the portion of the path between them. The
//! traffic is debited from the segment's reserved capacity, not from the
//! member links.

use crate::effect::EventEffect;
use crate::error::RecoveryError;
use crate::ledger::{attempt_with, Attempt, CapacityLedger, Reservation};
use crate::strategies::restoration::revert_routes;
use crate::strategy::{
    needs_recovery, order_by_priority, recover_failure, RecoveryStrategy, StrategyCounters,
    StrategyParams,
};
use resilience_core::{NetworkEvent, TimedEvent};
use resilience_types::{NetworkState, PathElement, ProvisioningAction, Route, StateError};
use tracing::{debug, info};

/// Registry name.
pub const PROTECTION: &str = "protection";

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    switchovers: u64,
    unprotected: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProtectionStrategy {
    revert: bool,
    ledger: Option<CapacityLedger>,
    counters: StrategyCounters,
    tally: Tally,
}

impl ProtectionStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> Option<&CapacityLedger> {
        self.ledger.as_ref()
    }

    pub fn counters(&self) -> &StrategyCounters {
        &self.counters
    }

    /// Routes switched onto a backup segment.
    pub fn switchovers(&self) -> u64 {
        self.tally.switchovers
    }
}

/// `path` with elements `first..=last` replaced by `segment`.
fn bridge(path: &[PathElement], first: usize, last: usize, segment: PathElement) -> Vec<PathElement> {
    let mut bridged = Vec::with_capacity(path.len());
    bridged.extend_from_slice(&path[..first]);
    bridged.push(segment);
    bridged.extend_from_slice(&path[last + 1..]);
    bridged
}

/// First backup segment that bridges the failed portion of `route`.
fn protection_candidate(
    state: &NetworkState,
    ledger: &CapacityLedger,
    route: &Route,
) -> Result<Option<(Vec<PathElement>, f64)>, StateError> {
    let volume = route.primary_traffic;
    let endpoints = route
        .path
        .iter()
        .map(|e| state.element_endpoints(*e))
        .collect::<Result<Vec<_>, _>>()?;

    for &segment in &route.backup_segments {
        let element = PathElement::Segment(segment);
        if route.path.contains(&element) || !state.is_path_usable(&[element]) {
            continue;
        }
        let (origin, destination) = state.element_endpoints(element)?;
        let Some(first) = endpoints.iter().position(|(o, _)| *o == origin) else {
            continue;
        };
        let Some(last) = endpoints
            .iter()
            .skip(first)
            .position(|(_, d)| *d == destination)
            .map(|offset| first + offset)
        else {
            continue;
        };

        let candidate = bridge(&route.path, first, last, element);
        if state.is_path_usable(&candidate) && ledger.can_carry(&candidate, volume) {
            return Ok(Some((candidate, volume)));
        }
    }
    Ok(None)
}

/// Switch one route onto a backup segment. Returns whether an action was
/// emitted.
fn protect_route(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    route: &Route,
    reservation: Reservation,
    counters: &mut StrategyCounters,
    tally: &mut Tally,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<bool, StateError> {
    if route.backup_segments.is_empty() {
        tally.unprotected += 1;
        counters.no_candidate += 1;
        return Ok(false);
    }
    let mut planning_error = None;
    let attempt = attempt_with(ledger, route, reservation, |ledger| {
        match protection_candidate(state, ledger, route) {
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
    match attempt {
        Attempt::Committed {
            path,
            carried_traffic,
        } => {
            debug!(route = %route.id, "Switched onto protection segment");
            tally.switchovers += 1;
            counters.rerouted += 1;
            actions.push(ProvisioningAction::ModifyRoute {
                route: route.id,
                path,
                carried_traffic,
            });
            Ok(true)
        }
        Attempt::NoCandidate => {
            debug!(route = %route.id, "No usable protection segment");
            counters.no_candidate += 1;
            Ok(false)
        }
        Attempt::RolledBack => {
            counters.rolled_back += 1;
            Ok(false)
        }
    }
}

impl RecoveryStrategy for ProtectionStrategy {
    fn name(&self) -> &'static str {
        PROTECTION
    }

    fn initialize(
        &mut self,
        baseline: &NetworkState,
        params: &StrategyParams,
    ) -> Result<(), RecoveryError> {
        self.revert = params.bool_or("revert", true)?;
        self.ledger = Some(CapacityLedger::from_state(baseline));
        self.counters = StrategyCounters::default();
        self.tally = Tally::default();
        let protected = baseline
            .routes()
            .filter(|r| !r.backup_segments.is_empty())
            .count();
        info!(
            protected,
            routes = baseline.num_routes(),
            segments = baseline.num_segments(),
            "Protection strategy initialized"
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
            .ok_or(RecoveryError::NotInitialized(PROTECTION))?;
        let tally = &mut self.tally;
        let mut actions = Vec::new();
        match effect {
            EventEffect::Failure(effect) => {
                recover_failure(
                    state,
                    ledger,
                    effect,
                    &mut self.counters,
                    &mut actions,
                    |ledger, route, counters, actions| {
                        Ok(protect_route(
                            state,
                            ledger,
                            route,
                            Reservation::Released,
                            counters,
                            tally,
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
                for id in order_by_priority(state, &effect.pending_routes) {
                    let route = state.route(id)?;
                    if needs_recovery(state, route) {
                        protect_route(
                            state,
                            ledger,
                            route,
                            Reservation::Held,
                            &mut self.counters,
                            tally,
                            &mut actions,
                        )?;
                    }
                }
            }
        }
        Ok(actions)
    }

    fn finish(&mut self, _state: &NetworkState) -> String {
        let mut out = format!("segment protection (revert={})\n", self.revert);
        out.push_str(&format!("  switchovers:            {}\n", self.tally.switchovers));
        out.push_str(&format!("  unprotected failures:   {}\n", self.tally.unprotected));
        self.counters.render(&mut out);
        out
    }

    fn rolled_back_attempts(&self) -> u64 {
        self.counters.rolled_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::{link_path, LinkId};

    #[test]
    fn test_bridge_replaces_span() {
        let path = link_path(&[LinkId(0), LinkId(1), LinkId(2), LinkId(3)]);
        let segment = PathElement::Segment(resilience_types::SegmentId(0));
        assert_eq!(
            bridge(&path, 1, 2, segment),
            vec![path[0], segment, path[3]]
        );
        assert_eq!(bridge(&path, 0, 3, segment), vec![segment]);
    }
}
