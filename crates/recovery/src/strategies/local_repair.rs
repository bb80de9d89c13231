//! Local repair around the failed portion of a route.
//!
//! The detour starts at the point of local repair (the last usable node
//! before the first failed link) and rejoins the current path at the merge
//! point (the first node after the last failed link). When the spliced path
//! traverses a link more than once, the link's free capacity is shared
//! fairly among the traversals.

use crate::effect::EventEffect;
use crate::error::RecoveryError;
use crate::ledger::{attempt_with, Attempt, CapacityLedger, Reservation};
use crate::paths::{fair_share_bottleneck, shortest_path, splice, LinkCost};
use crate::strategies::restoration::{restore_route, revert_routes};
use crate::strategy::{
    needs_recovery, order_by_priority, recover_failure, RecoveryStrategy, StrategyCounters,
    StrategyParams,
};
use resilience_core::{NetworkEvent, TimedEvent};
use resilience_types::{
    link_path, LinkId, NetworkState, PathElement, ProvisioningAction, Route, StateError,
};
use tracing::{debug, info};

/// Registry name.
pub const LOCAL_REPAIR: &str = "local-repair";

#[derive(Debug, Clone, Copy, Default)]
struct Settings {
    cost: LinkCost,
    allow_partial: bool,
    fallback_end_to_end: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    local_repairs: u64,
    fallbacks: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LocalRepairStrategy {
    settings: Settings,
    ledger: Option<CapacityLedger>,
    counters: StrategyCounters,
    tally: Tally,
}

impl LocalRepairStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> Option<&CapacityLedger> {
        self.ledger.as_ref()
    }

    pub fn counters(&self) -> &StrategyCounters {
        &self.counters
    }

    /// Routes repaired with a local detour.
    pub fn local_repairs(&self) -> u64 {
        self.tally.local_repairs
    }
}

/// Indices of the first and last unusable link of a link path.
fn failed_span(state: &NetworkState, links: &[LinkId]) -> Option<(usize, usize)> {
    let first = links.iter().position(|l| !state.is_link_usable(*l))?;
    let last = links.iter().rposition(|l| !state.is_link_usable(*l))?;
    Some((first, last))
}

/// Spliced candidate for `route`, planned against `ledger`.
fn local_candidate(
    state: &NetworkState,
    ledger: &CapacityLedger,
    route: &Route,
    cost: LinkCost,
    allow_partial: bool,
) -> Result<Option<(Vec<PathElement>, f64)>, StateError> {
    // Protection segments have no local structure to repair.
    if route
        .path
        .iter()
        .any(|e| matches!(e, PathElement::Segment(_)))
    {
        return Ok(None);
    }
    let links = state.expand_links(&route.path)?;
    let Some((first, last)) = failed_span(state, &links) else {
        return Ok(None);
    };
    let plr = state.link(links[first])?.origin;
    let merge_point = state.link(links[last])?.destination;

    let volume = route.primary_traffic;
    let tolerance = ledger.tolerance();
    let Some(detour) = shortest_path(state, plr, merge_point, |link| {
        (ledger.link_free(link.id) + tolerance >= volume).then(|| cost.weight(link))
    }) else {
        return Ok(None);
    };

    let merged = splice(&links, first, last, &detour);
    let carried = fair_share_bottleneck(ledger, &merged).min(volume);
    if carried + tolerance < volume && !allow_partial {
        return Ok(None);
    }
    if carried <= tolerance {
        return Ok(None);
    }
    Ok(Some((link_path(&merged), carried)))
}

/// Repair one route locally, or end to end when the detour fails and the
/// fallback is enabled. Returns whether an action was emitted.
#[allow(clippy::too_many_arguments)]
fn repair_route(
    state: &NetworkState,
    ledger: &mut CapacityLedger,
    route: &Route,
    reservation: Reservation,
    settings: Settings,
    counters: &mut StrategyCounters,
    tally: &mut Tally,
    actions: &mut Vec<ProvisioningAction>,
) -> Result<bool, StateError> {
    let mut planning_error = None;
    let attempt = attempt_with(ledger, route, reservation, |ledger| {
        match local_candidate(state, ledger, route, settings.cost, settings.allow_partial) {
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
            debug!(route = %route.id, carried_traffic, "Local repair committed");
            tally.local_repairs += 1;
            counters.rerouted += 1;
            if carried_traffic < route.primary_traffic {
                counters.partial += 1;
            }
            actions.push(ProvisioningAction::ModifyRoute {
                route: route.id,
                path,
                carried_traffic,
            });
            return Ok(true);
        }
        Attempt::RolledBack => counters.rolled_back += 1,
        Attempt::NoCandidate => {}
    }

    if !settings.fallback_end_to_end {
        counters.no_candidate += 1;
        return Ok(false);
    }
    tally.fallbacks += 1;
    restore_route(
        state,
        ledger,
        route,
        reservation,
        settings.cost,
        settings.allow_partial,
        counters,
        actions,
    )
}

impl RecoveryStrategy for LocalRepairStrategy {
    fn name(&self) -> &'static str {
        LOCAL_REPAIR
    }

    fn initialize(
        &mut self,
        baseline: &NetworkState,
        params: &StrategyParams,
    ) -> Result<(), RecoveryError> {
        self.settings = Settings {
            cost: params.link_cost()?,
            allow_partial: params.bool_or("allowPartial", false)?,
            fallback_end_to_end: params.bool_or("fallbackEndToEnd", true)?,
        };
        self.ledger = Some(CapacityLedger::from_state(baseline));
        self.counters = StrategyCounters::default();
        self.tally = Tally::default();
        info!(
            cost = ?self.settings.cost,
            fallback_end_to_end = self.settings.fallback_end_to_end,
            "Local repair strategy initialized"
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
            .ok_or(RecoveryError::NotInitialized(LOCAL_REPAIR))?;
        let settings = self.settings;
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
                        Ok(repair_route(
                            state,
                            ledger,
                            route,
                            Reservation::Released,
                            settings,
                            counters,
                            tally,
                            actions,
                        )?)
                    },
                )?;
            }
            EventEffect::Reparation(effect) => {
                revert_routes(
                    state,
                    ledger,
                    &mut self.counters,
                    effect,
                    &mut actions,
                )?;
                for id in order_by_priority(state, &effect.pending_routes) {
                    let route = state.route(id)?;
                    if needs_recovery(state, route) {
                        repair_route(
                            state,
                            ledger,
                            route,
                            Reservation::Held,
                            settings,
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
        let mut out = format!(
            "local repair (cost={:?}, fallbackEndToEnd={})\n",
            self.settings.cost, self.settings.fallback_end_to_end
        );
        out.push_str(&format!("  local detours:          {}\n", self.tally.local_repairs));
        out.push_str(&format!("  end-to-end fallbacks:   {}\n", self.tally.fallbacks));
        self.counters.render(&mut out);
        out
    }

    fn rolled_back_attempts(&self) -> u64 {
        self.counters.rolled_back
    }
}
