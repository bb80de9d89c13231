//! Lightpath restoration for wavelength-routed networks.
//!
//! Every route is a lightpath: besides link capacity it holds one wavelength
//! per transparent segment. A reroute succeeds only when both the capacity
//! ledger and the wavelength table accept it; otherwise both are rolled back
//! together.

use crate::effect::{EventEffect, FailureEffect, ReparationEffect};
use crate::error::RecoveryError;
use crate::ledger::{Attempt, CapacityLedger, Reservation};
use crate::paths::{constrained_shortest_path, LinkCost};
use crate::strategy::{
    needs_recovery, order_by_priority, release_affected, RecoveryStrategy, StrategyCounters,
    StrategyParams,
};
use crate::wavelength::{LightpathAssignment, WavelengthTable};
use resilience_core::{NetworkEvent, TimedEvent};
use resilience_types::{
    link_path, LinkId, NetworkState, PathElement, ProvisioningAction, Route, RouteId, StateError,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Registry name.
pub const WDM_RESTORATION: &str = "wdm-restoration";

pub const DEFAULT_MAX_REACH_KM: f64 = 2500.0;
pub const DEFAULT_WAVELENGTHS: u32 = 40;

/// Capacity ledger, wavelength table and per-route assignments, updated as
/// one transaction.
#[derive(Debug, Clone)]
struct LightpathLedger {
    capacity: CapacityLedger,
    table: WavelengthTable,
    assignments: BTreeMap<RouteId, LightpathAssignment>,
}

impl LightpathLedger {
    /// Release the capacity and wavelengths of every route hit by `effect`.
    fn release_affected(
        &mut self,
        state: &NetworkState,
        effect: &FailureEffect,
    ) -> Result<(), StateError> {
        release_affected(state, &mut self.capacity, effect)?;
        let checkpoint = self.table.checkpoint();
        for id in &effect.affected_routes {
            if let Some(current) = self.assignments.get(id) {
                self.table.release(current)?;
            }
        }
        self.table.commit(checkpoint);
        Ok(())
    }

    /// Take back the capacity and wavelengths of a released route. When
    /// either was claimed by a higher-priority route, the route loses its
    /// lightpath and `false` is returned.
    fn keep(&mut self, route: &Route) -> Result<bool, StateError> {
        let capacity_checkpoint = self.capacity.checkpoint();
        let table_checkpoint = self.table.checkpoint();
        self.capacity.debit(&route.path, route.carried_traffic)?;
        if let Some(current) = self.assignments.get(&route.id) {
            self.table.occupy(current)?;
        }
        if self.capacity.has_negative_since(capacity_checkpoint) || self.table.has_conflicts() {
            self.capacity.rollback(capacity_checkpoint);
            self.table.rollback(table_checkpoint);
            self.assignments.remove(&route.id);
            return Ok(false);
        }
        self.capacity.commit(capacity_checkpoint);
        self.table.commit(table_checkpoint);
        Ok(true)
    }

    /// Credit / plan / debit / check for one route, across both ledgers.
    ///
    /// `plan` sees both ledgers with the route's reservation released. A
    /// route already released with its failure is not released again.
    fn attempt<F>(
        &mut self,
        route: &Route,
        reservation: Reservation,
        plan: F,
    ) -> Result<(Attempt, usize), StateError>
    where
        F: FnOnce(
            &CapacityLedger,
            &WavelengthTable,
        ) -> Result<Option<(LightpathAssignment, f64)>, StateError>,
    {
        let capacity_checkpoint = self.capacity.checkpoint();
        let table_checkpoint = self.table.checkpoint();

        if reservation == Reservation::Held {
            self.capacity.credit_route(route)?;
            if let Some(current) = self.assignments.get(&route.id) {
                self.table.release(current)?;
            }
        }

        let planned = match plan(&self.capacity, &self.table) {
            Ok(planned) => planned,
            Err(e) => {
                self.capacity.rollback(capacity_checkpoint);
                self.table.rollback(table_checkpoint);
                return Err(e);
            }
        };
        let Some((assignment, carried_traffic)) = planned else {
            self.capacity.rollback(capacity_checkpoint);
            self.table.rollback(table_checkpoint);
            return Ok((Attempt::NoCandidate, 0));
        };

        let path = link_path(&assignment.links);
        self.capacity.debit(&path, carried_traffic)?;
        self.table.occupy(&assignment)?;
        if self.capacity.has_negative_since(capacity_checkpoint) || self.table.has_conflicts() {
            self.capacity.rollback(capacity_checkpoint);
            self.table.rollback(table_checkpoint);
            return Ok((Attempt::RolledBack, 0));
        }

        self.capacity.commit(capacity_checkpoint);
        self.table.commit(table_checkpoint);
        let regenerators = assignment.num_regenerators();
        self.assignments.insert(route.id, assignment);
        Ok((
            Attempt::Committed {
                path,
                carried_traffic,
            },
            regenerators,
        ))
    }
}

#[derive(Debug, Clone)]
pub struct WdmRestorationStrategy {
    cost: LinkCost,
    max_reach_km: f64,
    wavelengths: u32,
    revert: bool,
    ledger: Option<LightpathLedger>,
    counters: StrategyCounters,
    regenerators_placed: u64,
    unassigned_baseline: u64,
}

impl Default for WdmRestorationStrategy {
    fn default() -> Self {
        Self {
            cost: LinkCost::default(),
            max_reach_km: DEFAULT_MAX_REACH_KM,
            wavelengths: DEFAULT_WAVELENGTHS,
            revert: true,
            ledger: None,
            counters: StrategyCounters::default(),
            regenerators_placed: 0,
            unassigned_baseline: 0,
        }
    }
}

impl WdmRestorationStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counters(&self) -> &StrategyCounters {
        &self.counters
    }

    pub fn capacity_ledger(&self) -> Option<&CapacityLedger> {
        self.ledger.as_ref().map(|l| &l.capacity)
    }

    pub fn wavelength_table(&self) -> Option<&WavelengthTable> {
        self.ledger.as_ref().map(|l| &l.table)
    }

    /// Current lightpath of a route, if it holds one.
    pub fn assignment(&self, route: RouteId) -> Option<&LightpathAssignment> {
        self.ledger.as_ref()?.assignments.get(&route)
    }

    fn record(
        &mut self,
        route: RouteId,
        outcome: (Attempt, usize),
        reverting: bool,
        actions: &mut Vec<ProvisioningAction>,
    ) {
        match outcome {
            (
                Attempt::Committed {
                    path,
                    carried_traffic,
                },
                regenerators,
            ) => {
                debug!(route = %route, regenerators, reverting, "Lightpath committed");
                self.regenerators_placed += regenerators as u64;
                if reverting {
                    self.counters.reverted += 1;
                } else {
                    self.counters.rerouted += 1;
                }
                actions.push(ProvisioningAction::ModifyRoute {
                    route,
                    path,
                    carried_traffic,
                });
            }
            (Attempt::NoCandidate, _) => self.counters.no_candidate += 1,
            (Attempt::RolledBack, _) => {
                debug!(route = %route, "Lightpath rolled back");
                self.counters.rolled_back += 1;
            }
        }
    }

    /// Restore one route onto a new lightpath. Returns whether an action was
    /// emitted.
    fn restore_route(
        &mut self,
        state: &NetworkState,
        route: &Route,
        reservation: Reservation,
        actions: &mut Vec<ProvisioningAction>,
    ) -> Result<bool, RecoveryError> {
        let (cost, reach) = (self.cost, self.max_reach_km);
        let ledger = self
            .ledger
            .as_mut()
            .ok_or(RecoveryError::NotInitialized(WDM_RESTORATION))?;
        let outcome = ledger.attempt(route, reservation, |capacity, table| {
            let demand = state.demand(route.demand)?;
            let volume = route.primary_traffic;
            let Some(links) = constrained_shortest_path(
                state,
                capacity,
                demand.ingress,
                demand.egress,
                volume,
                cost,
            ) else {
                return Ok(None);
            };
            Ok(table
                .first_fit(state, &links, reach)?
                .map(|assignment| (assignment, volume)))
        })?;
        let committed = outcome.0.is_committed();
        self.record(route.id, outcome, false, actions);
        Ok(committed)
    }

    /// Recover the routes hit by a failure, highest priority first, against
    /// the capacity and wavelengths released by all of them.
    fn recover_failure(
        &mut self,
        state: &NetworkState,
        effect: &FailureEffect,
        actions: &mut Vec<ProvisioningAction>,
    ) -> Result<(), RecoveryError> {
        self.ledger
            .as_mut()
            .ok_or(RecoveryError::NotInitialized(WDM_RESTORATION))?
            .release_affected(state, effect)?;
        let unrecoverable: BTreeSet<RouteId> =
            effect.unrecoverable_routes.iter().copied().collect();

        for id in order_by_priority(state, &effect.affected_routes) {
            let route = state.route(id)?;
            let placed = if unrecoverable.contains(&id) {
                self.counters.skipped_unrecoverable += 1;
                false
            } else {
                self.restore_route(state, route, Reservation::Released, actions)?
            };
            if placed {
                continue;
            }
            let ledger = self
                .ledger
                .as_mut()
                .ok_or(RecoveryError::NotInitialized(WDM_RESTORATION))?;
            if !ledger.keep(route)? {
                debug!(route = %id, "Lightpath claimed by higher-priority routes");
                self.counters.preempted += 1;
                actions.push(ProvisioningAction::ModifyRoute {
                    route: id,
                    path: route.path.clone(),
                    carried_traffic: 0.0,
                });
            }
        }
        Ok(())
    }

    /// Retry routes still out of service, in priority order.
    fn restore(
        &mut self,
        state: &NetworkState,
        routes: &[RouteId],
        actions: &mut Vec<ProvisioningAction>,
    ) -> Result<(), RecoveryError> {
        for id in order_by_priority(state, routes) {
            let route = state.route(id)?;
            if needs_recovery(state, route) {
                self.restore_route(state, route, Reservation::Held, actions)?;
            }
        }
        Ok(())
    }

    fn revert_to_primary(
        &mut self,
        state: &NetworkState,
        effect: &ReparationEffect,
        actions: &mut Vec<ProvisioningAction>,
    ) -> Result<(), RecoveryError> {
        for id in order_by_priority(state, &effect.reparable_routes) {
            let route = state.route(id)?;
            if route.is_on_primary() {
                continue;
            }
            let tolerance = self.capacity_ledger().map_or(0.0, CapacityLedger::tolerance);
            if !effect.residual_allows(&route.primary_path, route.primary_traffic, tolerance) {
                self.counters.no_candidate += 1;
                continue;
            }
            let Some(primary_links) = plain_links(&route.primary_path) else {
                continue;
            };
            let reach = self.max_reach_km;
            let ledger = self
                .ledger
                .as_mut()
                .ok_or(RecoveryError::NotInitialized(WDM_RESTORATION))?;
            let outcome = ledger.attempt(route, Reservation::Held, |capacity, table| {
                if !state.is_path_usable(&route.primary_path)
                    || !capacity.can_carry(&route.primary_path, route.primary_traffic)
                {
                    return Ok(None);
                }
                Ok(table
                    .first_fit(state, &primary_links, reach)?
                    .map(|assignment| (assignment, route.primary_traffic)))
            })?;
            self.record(id, outcome, true, actions);
        }
        Ok(())
    }
}

/// The links of a path made only of plain links.
fn plain_links(path: &[PathElement]) -> Option<Vec<LinkId>> {
    path.iter()
        .map(|e| match e {
            PathElement::Link(link) => Some(*link),
            PathElement::Segment(_) => None,
        })
        .collect()
}

impl RecoveryStrategy for WdmRestorationStrategy {
    fn name(&self) -> &'static str {
        WDM_RESTORATION
    }

    fn initialize(
        &mut self,
        baseline: &NetworkState,
        params: &StrategyParams,
    ) -> Result<(), RecoveryError> {
        self.cost = params.link_cost()?;
        self.max_reach_km = params.f64_or("maxReachKm", DEFAULT_MAX_REACH_KM)?;
        if self.max_reach_km <= 0.0 {
            return Err(RecoveryError::Strategy {
                strategy: WDM_RESTORATION,
                reason: format!("maxReachKm must be positive, got {}", self.max_reach_km),
            });
        }
        self.wavelengths = params.u32_or("wavelengths", DEFAULT_WAVELENGTHS)?;
        self.revert = params.bool_or("revert", true)?;
        self.counters = StrategyCounters::default();
        self.regenerators_placed = 0;
        self.unassigned_baseline = 0;

        let mut table = WavelengthTable::new(baseline, self.wavelengths);
        let start = table.checkpoint();
        let mut assignments = BTreeMap::new();
        for route in baseline.routes() {
            let assignment = match plain_links(&route.path) {
                Some(links) => table.first_fit(baseline, &links, self.max_reach_km)?,
                None => None,
            };
            match assignment {
                Some(assignment) => {
                    table.occupy(&assignment)?;
                    assignments.insert(route.id, assignment);
                }
                None => {
                    warn!(route = %route.id, "No wavelength assignment for baseline route");
                    self.unassigned_baseline += 1;
                }
            }
        }
        table.commit(start);

        info!(
            max_reach_km = self.max_reach_km,
            wavelengths = self.wavelengths,
            lightpaths = assignments.len(),
            occupied_slots = table.occupied_slots(),
            "WDM restoration strategy initialized"
        );
        self.ledger = Some(LightpathLedger {
            capacity: CapacityLedger::from_state(baseline),
            table,
            assignments,
        });
        Ok(())
    }

    fn process_event(
        &mut self,
        state: &NetworkState,
        effect: &EventEffect,
        _event: &TimedEvent<NetworkEvent>,
    ) -> Result<Vec<ProvisioningAction>, RecoveryError> {
        let mut actions = Vec::new();
        match effect {
            EventEffect::Failure(effect) => {
                self.recover_failure(state, effect, &mut actions)?;
            }
            EventEffect::Reparation(effect) => {
                if self.revert {
                    self.revert_to_primary(state, effect, &mut actions)?;
                }
                self.restore(state, &effect.pending_routes, &mut actions)?;
            }
        }
        Ok(actions)
    }

    fn finish(&mut self, _state: &NetworkState) -> String {
        let mut out = format!(
            "WDM lightpath restoration (cost={:?}, maxReachKm={}, wavelengths={})\n",
            self.cost, self.max_reach_km, self.wavelengths
        );
        let occupied = self
            .wavelength_table()
            .map_or(0, WavelengthTable::occupied_slots);
        out.push_str(&format!("  occupied wavelength slots: {occupied}\n"));
        out.push_str(&format!(
            "  regenerators placed:    {}\n",
            self.regenerators_placed
        ));
        out.push_str(&format!(
            "  unassigned at start:    {}\n",
            self.unassigned_baseline
        ));
        self.counters.render(&mut out);
        out
    }

    fn rolled_back_attempts(&self) -> u64 {
        self.counters.rolled_back
    }
}
