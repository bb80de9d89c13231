//! Effects of failure and reparation events.
//!
//! An effect is a pure function of the network state before the event and
//! the event itself. It is computed fresh for every event and never stored
//! in the network state.

use resilience_core::{EventTargets, NetworkEvent};
use resilience_types::{
    DemandId, ElementSet, LinkId, NetworkState, NodeId, PathElement, RouteId, StateError,
};
use std::collections::BTreeSet;

/// What a failure event does to the network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureEffect {
    /// Nodes that go down with this event (including SRG co-members).
    pub nodes_down: BTreeSet<NodeId>,
    /// Links that go down with this event (including SRG co-members).
    pub links_down: BTreeSet<LinkId>,
    /// Routes whose current path touches a failing element.
    pub affected_routes: Vec<RouteId>,
    /// Affected routes whose demand has an isolated endpoint after the failure.
    pub unrecoverable_routes: Vec<RouteId>,
    /// Per link: capacity minus reservations of routes not affected.
    pub link_residual_capacity: Vec<f64>,
    /// Per protection segment: reserved capacity minus traffic of routes not affected.
    pub segment_residual_capacity: Vec<f64>,
}

/// What a reparation event does to the network.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReparationEffect {
    /// Nodes that come back up with this event.
    pub nodes_up: BTreeSet<NodeId>,
    /// Links that come back up with this event.
    pub links_up: BTreeSet<LinkId>,
    /// Routes whose current path was down and is usable again.
    pub restored_routes: Vec<RouteId>,
    /// Routes away from their primary path or volume whose primary path is
    /// usable after the reparation.
    pub reparable_routes: Vec<RouteId>,
    /// Routes still down or preempted whose demand endpoints are no longer
    /// isolated.
    pub pending_routes: Vec<RouteId>,
    /// Per link: capacity minus reservations of routes not reparable.
    pub link_residual_capacity: Vec<f64>,
    /// Per protection segment: reserved capacity minus traffic of routes not reparable.
    pub segment_residual_capacity: Vec<f64>,
}

impl ReparationEffect {
    /// Whether `volume` fits on `path` with every reparable route's
    /// reservation released. No single revert can find more room than this.
    pub fn residual_allows(&self, path: &[PathElement], volume: f64, tolerance: f64) -> bool {
        let mut seen: Vec<(PathElement, usize)> = Vec::new();
        for element in path {
            match seen.iter_mut().find(|(e, _)| e == element) {
                Some((_, count)) => *count += 1,
                None => seen.push((*element, 1)),
            }
        }
        seen.into_iter().all(|(element, count)| {
            let residual = match element {
                PathElement::Link(link) => self.link_residual_capacity.get(link.index()),
                PathElement::Segment(segment) => {
                    self.segment_residual_capacity.get(segment.index())
                }
            };
            residual.is_some_and(|free| free + tolerance >= volume * count as f64)
        })
    }
}

/// The effect of one network event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEffect {
    Failure(FailureEffect),
    Reparation(ReparationEffect),
}

impl EventEffect {
    /// Compute the effect of `event` on `state`.
    ///
    /// `held_down` lists elements that stay down because of other failures
    /// still in progress; a reparation does not bring them back up.
    pub fn compute(
        state: &NetworkState,
        event: &NetworkEvent,
        held_down: &ElementSet,
    ) -> Result<Self, StateError> {
        match event {
            NetworkEvent::Failure(targets) => {
                compute_failure_effect(state, targets).map(EventEffect::Failure)
            }
            NetworkEvent::Reparation(targets) => {
                compute_reparation_effect(state, targets, held_down).map(EventEffect::Reparation)
            }
        }
    }

    /// Elements whose up state changes.
    pub fn changed_elements(&self) -> ElementSet {
        let (nodes, links) = match self {
            EventEffect::Failure(effect) => (&effect.nodes_down, &effect.links_down),
            EventEffect::Reparation(effect) => (&effect.nodes_up, &effect.links_up),
        };
        ElementSet {
            nodes: nodes.clone(),
            links: links.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, EventEffect::Failure(_))
    }

    pub fn link_residual_capacity(&self) -> &[f64] {
        match self {
            EventEffect::Failure(effect) => &effect.link_residual_capacity,
            EventEffect::Reparation(effect) => &effect.link_residual_capacity,
        }
    }
}

/// The event targets plus the co-members of the named SRGs.
pub fn expand_targets(
    state: &NetworkState,
    targets: &EventTargets,
) -> Result<ElementSet, StateError> {
    let mut set = state.expand_srgs(targets.srgs.iter().copied())?;
    for &node in &targets.nodes {
        state.node(node)?;
        set.nodes.insert(node);
    }
    for &link in &targets.links {
        state.link(link)?;
        set.links.insert(link);
    }
    Ok(set)
}

pub fn compute_failure_effect(
    state: &NetworkState,
    targets: &EventTargets,
) -> Result<FailureEffect, StateError> {
    let failing = expand_targets(state, targets)?;

    let nodes_down: BTreeSet<NodeId> = failing
        .nodes
        .iter()
        .copied()
        .filter(|&n| state.node(n).map(|n| n.up).unwrap_or(false))
        .collect();
    let links_down: BTreeSet<LinkId> = failing
        .links
        .iter()
        .copied()
        .filter(|&l| state.link(l).map(|l| l.up).unwrap_or(false))
        .collect();

    let mut affected_routes = Vec::new();
    for route in state.routes() {
        let links = state.expand_links(&route.path)?;
        let nodes = state.path_nodes(&route.path)?;
        if links.iter().any(|l| links_down.contains(l))
            || nodes.iter().any(|n| nodes_down.contains(n))
        {
            affected_routes.push(route.id);
        }
    }

    // Evaluate isolation on the topology after the failure. The copy shares
    // structure with `state`.
    let mut after = state.copy();
    after.set_elements_up(
        &ElementSet {
            nodes: nodes_down.clone(),
            links: links_down.clone(),
        },
        false,
    )?;
    let mut unrecoverable_routes = Vec::new();
    for &route in &affected_routes {
        let demand = state.route(route)?.demand;
        if is_demand_isolated(&after, demand)? {
            unrecoverable_routes.push(route);
        }
    }

    let excluded: BTreeSet<RouteId> = affected_routes.iter().copied().collect();
    let (link_residual_capacity, segment_residual_capacity) =
        residual_capacity_excluding(state, &excluded);

    Ok(FailureEffect {
        nodes_down,
        links_down,
        affected_routes,
        unrecoverable_routes,
        link_residual_capacity,
        segment_residual_capacity,
    })
}

pub fn compute_reparation_effect(
    state: &NetworkState,
    targets: &EventTargets,
    held_down: &ElementSet,
) -> Result<ReparationEffect, StateError> {
    let repaired = expand_targets(state, targets)?;

    let nodes_up: BTreeSet<NodeId> = repaired
        .nodes
        .iter()
        .copied()
        .filter(|n| !held_down.contains_node(*n))
        .filter(|&n| state.node(n).map(|n| !n.up).unwrap_or(false))
        .collect();
    let links_up: BTreeSet<LinkId> = repaired
        .links
        .iter()
        .copied()
        .filter(|l| !held_down.contains_link(*l))
        .filter(|&l| state.link(l).map(|l| !l.up).unwrap_or(false))
        .collect();

    let mut after = state.copy();
    after.set_elements_up(
        &ElementSet {
            nodes: nodes_up.clone(),
            links: links_up.clone(),
        },
        true,
    )?;

    let mut restored_routes = Vec::new();
    let mut reparable_routes = Vec::new();
    let mut pending_routes = Vec::new();
    for route in state.routes() {
        let was_up = state.is_path_usable(&route.path);
        let is_up = after.is_path_usable(&route.path);
        let away_from_primary =
            route.path != route.primary_path || route.carried_traffic != route.primary_traffic;

        if !was_up && is_up {
            restored_routes.push(route.id);
        }
        if away_from_primary && after.is_path_usable(&route.primary_path) {
            reparable_routes.push(route.id);
        } else if (!is_up || route.is_preempted())
            && !is_demand_isolated(&after, route.demand)?
        {
            pending_routes.push(route.id);
        }
    }

    let excluded: BTreeSet<RouteId> = reparable_routes.iter().copied().collect();
    let (link_residual_capacity, segment_residual_capacity) =
        residual_capacity_excluding(state, &excluded);

    Ok(ReparationEffect {
        nodes_up,
        links_up,
        restored_routes,
        reparable_routes,
        pending_routes,
        link_residual_capacity,
        segment_residual_capacity,
    })
}

/// A demand is isolated when one of its endpoints is down, its ingress has no
/// usable outgoing link, or its egress has no usable incoming link.
pub fn is_demand_isolated(state: &NetworkState, demand: DemandId) -> Result<bool, StateError> {
    let demand = state.demand(demand)?;
    if !state.node(demand.ingress)?.up || !state.node(demand.egress)?.up {
        return Ok(true);
    }
    let can_leave = state
        .outgoing_links(demand.ingress)
        .into_iter()
        .any(|l| state.is_link_usable(l));
    let can_arrive = state
        .incoming_links(demand.egress)
        .into_iter()
        .any(|l| state.is_link_usable(l));
    Ok(!(can_leave && can_arrive))
}

/// Free capacity per link and segment when the `excluded` routes release
/// their reservations. Independent of up state.
pub fn residual_capacity_excluding(
    state: &NetworkState,
    excluded: &BTreeSet<RouteId>,
) -> (Vec<f64>, Vec<f64>) {
    let mut links: Vec<f64> = state.links().map(|l| l.capacity).collect();
    let mut segments: Vec<f64> = state.segments().map(|s| s.reserved_capacity).collect();

    for segment in state.segments() {
        for link in &segment.links {
            if let Some(free) = links.get_mut(link.index()) {
                *free -= segment.reserved_capacity;
            }
        }
    }
    for route in state.routes().filter(|r| !excluded.contains(&r.id)) {
        for element in &route.path {
            let slot = match element {
                PathElement::Link(link) => links.get_mut(link.index()),
                PathElement::Segment(segment) => segments.get_mut(segment.index()),
            };
            if let Some(free) = slot {
                *free -= route.carried_traffic;
            }
        }
    }
    (links, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::link_path;

    /// a -> c direct (link 0), a -> b -> c (links 1, 2). One route on a -> c.
    fn triangle() -> (NetworkState, RouteId) {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let c = state.add_node("c").unwrap();
        let ac = state.add_link(a, c, 10.0, 100.0).unwrap();
        let ab = state.add_link(a, b, 10.0, 80.0).unwrap();
        let bc = state.add_link(b, c, 10.0, 80.0).unwrap();
        let demand = state.add_demand(a, c, 6.0).unwrap();
        let route = state.add_route(demand, link_path(&[ac]), 6.0, 0).unwrap();
        state
            .add_srg(
                100.0,
                1.0,
                BTreeSet::new(),
                [ab, bc].into_iter().collect(),
            )
            .unwrap();
        (state, route)
    }

    #[test]
    fn test_link_failure_effect() {
        let (state, route) = triangle();
        let effect = compute_failure_effect(&state, &EventTargets::link(LinkId(0))).unwrap();

        assert_eq!(effect.links_down, [LinkId(0)].into_iter().collect());
        assert_eq!(effect.affected_routes, vec![route]);
        assert!(effect.unrecoverable_routes.is_empty());
        // The affected route's reservation is excluded from the residuals.
        assert_eq!(effect.link_residual_capacity, vec![10.0, 10.0, 10.0]);
        // Pure: the input state is untouched.
        assert!(state.link(LinkId(0)).unwrap().up);
    }

    #[test]
    fn test_srg_failure_expands_members() {
        let (state, _) = triangle();
        let effect = compute_failure_effect(&state, &EventTargets::srg(resilience_types::SrgId(0)))
            .unwrap();
        assert_eq!(effect.links_down, [LinkId(1), LinkId(2)].into_iter().collect());
        assert!(effect.affected_routes.is_empty());
        assert_eq!(effect.link_residual_capacity, vec![4.0, 10.0, 10.0]);
    }

    #[test]
    fn test_endpoint_failure_is_unrecoverable() {
        let (state, route) = triangle();
        let effect = compute_failure_effect(&state, &EventTargets::node(NodeId(0))).unwrap();
        assert_eq!(effect.nodes_down, [NodeId(0)].into_iter().collect());
        assert_eq!(effect.affected_routes, vec![route]);
        assert_eq!(effect.unrecoverable_routes, vec![route]);
    }

    #[test]
    fn test_already_down_elements_are_not_reported() {
        let (mut state, _) = triangle();
        state.set_link_up(LinkId(0), false).unwrap();
        let effect = compute_failure_effect(&state, &EventTargets::link(LinkId(0))).unwrap();
        assert!(effect.links_down.is_empty());
        assert!(effect.affected_routes.is_empty());
    }

    #[test]
    fn test_reparation_effect_respects_held_down() {
        let (mut state, route) = triangle();
        state.set_link_up(LinkId(0), false).unwrap();

        let held = ElementSet {
            nodes: BTreeSet::new(),
            links: [LinkId(0)].into_iter().collect(),
        };
        let effect =
            compute_reparation_effect(&state, &EventTargets::link(LinkId(0)), &held).unwrap();
        assert!(effect.links_up.is_empty());
        assert!(effect.restored_routes.is_empty());
        assert_eq!(effect.pending_routes, vec![route]);

        let effect = compute_reparation_effect(
            &state,
            &EventTargets::link(LinkId(0)),
            &ElementSet::new(),
        )
        .unwrap();
        assert_eq!(effect.links_up, [LinkId(0)].into_iter().collect());
        assert_eq!(effect.restored_routes, vec![route]);
        assert!(effect.reparable_routes.is_empty());
    }

    #[test]
    fn test_reparation_exposes_reparable_routes() {
        let (mut state, route) = triangle();
        state.set_link_up(LinkId(0), false).unwrap();
        state
            .modify_route(route, link_path(&[LinkId(1), LinkId(2)]), 6.0)
            .unwrap();

        let effect = compute_reparation_effect(
            &state,
            &EventTargets::link(LinkId(0)),
            &ElementSet::new(),
        )
        .unwrap();
        assert_eq!(effect.reparable_routes, vec![route]);
        // The reparable route's detour reservation is released.
        assert_eq!(effect.link_residual_capacity, vec![10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_residual_allows_bounds_reverts() {
        let (mut state, route) = triangle();
        state.set_link_up(LinkId(0), false).unwrap();
        state
            .modify_route(route, link_path(&[LinkId(1), LinkId(2)]), 6.0)
            .unwrap();
        let effect = compute_reparation_effect(
            &state,
            &EventTargets::link(LinkId(0)),
            &ElementSet::new(),
        )
        .unwrap();

        let primary = link_path(&[LinkId(0)]);
        assert!(effect.residual_allows(&primary, 10.0, 1e-9));
        assert!(!effect.residual_allows(&primary, 10.5, 1e-9));
        // A path crossing the same link twice needs room for both crossings.
        assert!(!effect.residual_allows(&link_path(&[LinkId(0), LinkId(0)]), 6.0, 1e-9));
        assert!(!effect.residual_allows(&link_path(&[LinkId(7)]), 1.0, 1e-9));
    }

    #[test]
    fn test_preempted_route_is_pending() {
        let (mut state, route) = triangle();
        state
            .modify_route(route, link_path(&[LinkId(1), LinkId(2)]), 0.0)
            .unwrap();
        state.set_link_up(LinkId(0), false).unwrap();
        state.set_link_up(LinkId(2), false).unwrap();

        let effect = compute_reparation_effect(
            &state,
            &EventTargets::link(LinkId(2)),
            &ElementSet::new(),
        )
        .unwrap();
        assert_eq!(effect.restored_routes, vec![route]);
        assert!(effect.reparable_routes.is_empty());
        assert_eq!(effect.pending_routes, vec![route]);
    }

    #[test]
    fn test_isolation_by_missing_usable_links() {
        let (mut state, route) = triangle();
        let demand = state.route(route).unwrap().demand;
        assert!(!is_demand_isolated(&state, demand).unwrap());
        state.set_link_up(LinkId(0), false).unwrap();
        state.set_link_up(LinkId(1), false).unwrap();
        assert!(is_demand_isolated(&state, demand).unwrap());
    }
}
