//! The network state snapshot: arenas of nodes, links, demands, routes,
//! protection segments and SRGs.
//!
//! Arenas are `im::Vector`s, so [`NetworkState::copy`] and
//! [`NetworkState::unmodifiable_view`] are cheap structurally-shared snapshots
//! that never observe later mutations of the original.

use crate::{
    Demand, DemandId, ElementSet, Link, LinkId, Node, NodeId, PathElement, ProtectionSegment,
    ProvisioningAction, Route, RouteId, SegmentId, SharedRiskGroup, SrgId, StateError,
};
use im::Vector;
use std::collections::{BTreeMap, BTreeSet};

/// Options for [`NetworkState::check_validity`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidityOptions {
    /// Absolute tolerance for capacity and traffic comparisons.
    pub precision: f64,

    /// Accept links and segments whose committed traffic exceeds their capacity.
    pub allow_link_oversubscription: bool,

    /// Accept demands whose routes carry more than the offered traffic.
    pub allow_excess_carried_traffic: bool,
}

impl Default for ValidityOptions {
    fn default() -> Self {
        Self {
            precision: 1e-3,
            allow_link_oversubscription: false,
            allow_excess_carried_traffic: false,
        }
    }
}

impl ValidityOptions {
    /// Set the comparison tolerance.
    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    /// Allow link and segment oversubscription.
    pub fn with_link_oversubscription(mut self, allow: bool) -> Self {
        self.allow_link_oversubscription = allow;
        self
    }

    /// Allow carried traffic above offered traffic.
    pub fn with_excess_carried_traffic(mut self, allow: bool) -> Self {
        self.allow_excess_carried_traffic = allow;
        self
    }
}

/// Topology, demands, routes, protection segments and SRGs of a network design.
///
/// A run freezes one instance as its baseline (see [`unmodifiable_view`]) and
/// evolves a [`copy`] of it. Every mutator of a read-only view fails with
/// [`StateError::Unmodifiable`].
///
/// [`unmodifiable_view`]: NetworkState::unmodifiable_view
/// [`copy`]: NetworkState::copy
#[derive(Debug, Clone, Default)]
pub struct NetworkState {
    nodes: Vector<Node>,
    links: Vector<Link>,
    demands: Vector<Demand>,
    routes: Vector<Route>,
    segments: Vector<ProtectionSegment>,
    srgs: Vector<SharedRiskGroup>,
    read_only: bool,
}

/// Content equality. Read-only views compare equal to their source.
impl PartialEq for NetworkState {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
            && self.links == other.links
            && self.demands == other.demands
            && self.routes == other.routes
            && self.segments == other.segments
            && self.srgs == other.srgs
    }
}

fn check_amount(what: &str, value: f64) -> Result<(), StateError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StateError::InvalidParameter(format!(
            "{what} must be finite and non-negative, got {value}"
        )))
    }
}

impl NetworkState {
    /// Create an empty, mutable network state.
    pub fn new() -> Self {
        Self::default()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Snapshots
    // ═══════════════════════════════════════════════════════════════════════

    /// Deep, mutable copy independent of `self`.
    pub fn copy(&self) -> Self {
        Self {
            read_only: false,
            ..self.clone()
        }
    }

    /// Read-only snapshot. All of its mutators fail with
    /// [`StateError::Unmodifiable`].
    pub fn unmodifiable_view(&self) -> Self {
        Self {
            read_only: true,
            ..self.clone()
        }
    }

    /// Whether this instance is a read-only view.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn ensure_mutable(&self) -> Result<(), StateError> {
        if self.read_only {
            Err(StateError::Unmodifiable)
        } else {
            Ok(())
        }
    }

    /// Clear to an empty state.
    pub fn reset(&mut self) -> Result<(), StateError> {
        self.ensure_mutable()?;
        *self = Self::new();
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Element access
    // ═══════════════════════════════════════════════════════════════════════

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn num_demands(&self) -> usize {
        self.demands.len()
    }

    pub fn num_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    pub fn num_srgs(&self) -> usize {
        self.srgs.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, StateError> {
        self.nodes.get(id.index()).ok_or(StateError::UnknownNode(id))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link, StateError> {
        self.links.get(id.index()).ok_or(StateError::UnknownLink(id))
    }

    pub fn demand(&self, id: DemandId) -> Result<&Demand, StateError> {
        self.demands
            .get(id.index())
            .ok_or(StateError::UnknownDemand(id))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route, StateError> {
        self.routes.get(id.index()).ok_or(StateError::UnknownRoute(id))
    }

    pub fn segment(&self, id: SegmentId) -> Result<&ProtectionSegment, StateError> {
        self.segments
            .get(id.index())
            .ok_or(StateError::UnknownSegment(id))
    }

    pub fn srg(&self, id: SrgId) -> Result<&SharedRiskGroup, StateError> {
        self.srgs.get(id.index()).ok_or(StateError::UnknownSrg(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }

    pub fn demands(&self) -> impl Iterator<Item = &Demand> {
        self.demands.iter()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn segments(&self) -> impl Iterator<Item = &ProtectionSegment> {
        self.segments.iter()
    }

    pub fn srgs(&self) -> impl Iterator<Item = &SharedRiskGroup> {
        self.srgs.iter()
    }

    /// Routes carrying traffic of a demand, in route order.
    pub fn routes_of_demand(&self, demand: DemandId) -> Vec<RouteId> {
        self.routes
            .iter()
            .filter(|r| r.demand == demand)
            .map(|r| r.id)
            .collect()
    }

    /// Links leaving a node, regardless of their up state.
    pub fn outgoing_links(&self, node: NodeId) -> Vec<LinkId> {
        self.links
            .iter()
            .filter(|l| l.origin == node)
            .map(|l| l.id)
            .collect()
    }

    /// Links entering a node, regardless of their up state.
    pub fn incoming_links(&self, node: NodeId) -> Vec<LinkId> {
        self.links
            .iter()
            .filter(|l| l.destination == node)
            .map(|l| l.id)
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Paths
    // ═══════════════════════════════════════════════════════════════════════

    /// Origin and destination node of a path element.
    pub fn element_endpoints(&self, element: PathElement) -> Result<(NodeId, NodeId), StateError> {
        match element {
            PathElement::Link(id) => {
                let link = self.link(id)?;
                Ok((link.origin, link.destination))
            }
            PathElement::Segment(id) => {
                let segment = self.segment(id)?;
                let (first, last) = match (segment.links.first(), segment.links.last()) {
                    (Some(first), Some(last)) => (*first, *last),
                    _ => return Err(StateError::InvalidPath(format!("{id} has no links"))),
                };
                Ok((self.link(first)?.origin, self.link(last)?.destination))
            }
        }
    }

    /// Expand segments into their member links.
    pub fn expand_links(&self, path: &[PathElement]) -> Result<Vec<LinkId>, StateError> {
        let mut links = Vec::with_capacity(path.len());
        for element in path {
            match *element {
                PathElement::Link(id) => {
                    self.link(id)?;
                    links.push(id);
                }
                PathElement::Segment(id) => links.extend(self.segment(id)?.links.iter().copied()),
            }
        }
        Ok(links)
    }

    /// Node sequence traversed by a path, origin first.
    pub fn path_nodes(&self, path: &[PathElement]) -> Result<Vec<NodeId>, StateError> {
        let mut nodes = Vec::with_capacity(path.len() + 1);
        for link in self.expand_links(path)? {
            let link = self.link(link)?;
            if nodes.is_empty() {
                nodes.push(link.origin);
            }
            nodes.push(link.destination);
        }
        Ok(nodes)
    }

    /// Total length of a path in km. Unknown elements count as zero.
    pub fn path_length_km(&self, path: &[PathElement]) -> f64 {
        self.expand_links(path)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|l| self.link(l).ok())
            .map(|l| l.length_km)
            .sum()
    }

    /// A link is usable when it and both of its end nodes are up.
    pub fn is_link_usable(&self, link: LinkId) -> bool {
        let Ok(link) = self.link(link) else {
            return false;
        };
        link.up
            && self.node(link.origin).map(|n| n.up).unwrap_or(false)
            && self.node(link.destination).map(|n| n.up).unwrap_or(false)
    }

    /// Whether every link of a path is usable.
    pub fn is_path_usable(&self, path: &[PathElement]) -> bool {
        match self.expand_links(path) {
            Ok(links) => links.into_iter().all(|l| self.is_link_usable(l)),
            Err(_) => false,
        }
    }

    /// Whether a route's current path is fully usable.
    pub fn is_route_up(&self, route: RouteId) -> bool {
        self.route(route)
            .map(|r| self.is_path_usable(&r.path))
            .unwrap_or(false)
    }

    fn validate_path(
        &self,
        path: &[PathElement],
        from: NodeId,
        to: NodeId,
    ) -> Result<(), StateError> {
        if path.is_empty() {
            return Err(StateError::InvalidPath("empty path".to_string()));
        }
        let mut at = from;
        for element in path {
            let (origin, destination) = self.element_endpoints(*element)?;
            if origin != at {
                return Err(StateError::InvalidPath(format!(
                    "{element} starts at {origin}, expected {at}"
                )));
            }
            at = destination;
        }
        if at != to {
            return Err(StateError::InvalidPath(format!(
                "path ends at {at}, expected {to}"
            )));
        }
        Ok(())
    }

    fn validate_link_chain(&self, links: &[LinkId]) -> Result<(), StateError> {
        let mut previous: Option<NodeId> = None;
        for &id in links {
            let link = self.link(id)?;
            if let Some(at) = previous {
                if link.origin != at {
                    return Err(StateError::InvalidPath(format!(
                        "{id} starts at {}, expected {at}",
                        link.origin
                    )));
                }
            }
            previous = Some(link.destination);
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Occupancy
    // ═══════════════════════════════════════════════════════════════════════

    /// Occupied capacity per link: segment reservations plus traffic of routes
    /// traversing the link directly (once per traversal). Independent of up state.
    pub fn link_occupancy(&self) -> Vec<f64> {
        let mut occupied = vec![0.0; self.links.len()];
        for segment in &self.segments {
            for link in &segment.links {
                if let Some(slot) = occupied.get_mut(link.index()) {
                    *slot += segment.reserved_capacity;
                }
            }
        }
        for route in &self.routes {
            for element in &route.path {
                if let PathElement::Link(link) = element {
                    if let Some(slot) = occupied.get_mut(link.index()) {
                        *slot += route.carried_traffic;
                    }
                }
            }
        }
        occupied
    }

    /// Traffic committed on each protection segment (once per traversal).
    pub fn segment_occupancy(&self) -> Vec<f64> {
        let mut occupied = vec![0.0; self.segments.len()];
        for route in &self.routes {
            for element in &route.path {
                if let PathElement::Segment(segment) = element {
                    if let Some(slot) = occupied.get_mut(segment.index()) {
                        *slot += route.carried_traffic;
                    }
                }
            }
        }
        occupied
    }

    /// Occupied capacity of one link.
    pub fn link_occupied_capacity(&self, link: LinkId) -> f64 {
        self.link_occupancy()
            .get(link.index())
            .copied()
            .unwrap_or(0.0)
    }

    /// Traffic committed on one segment.
    pub fn segment_occupied_capacity(&self, segment: SegmentId) -> f64 {
        self.segment_occupancy()
            .get(segment.index())
            .copied()
            .unwrap_or(0.0)
    }

    /// Traffic committed by all routes of a demand.
    pub fn demand_carried_traffic(&self, demand: DemandId) -> f64 {
        self.routes
            .iter()
            .filter(|r| r.demand == demand)
            .map(|r| r.carried_traffic)
            .sum()
    }

    /// Traffic of a demand whose routes are currently up.
    pub fn demand_served_traffic(&self, demand: DemandId) -> f64 {
        self.routes
            .iter()
            .filter(|r| r.demand == demand && self.is_path_usable(&r.path))
            .map(|r| r.carried_traffic)
            .sum()
    }

    /// Union of the members of the given SRGs.
    pub fn expand_srgs<I>(&self, srgs: I) -> Result<ElementSet, StateError>
    where
        I: IntoIterator<Item = SrgId>,
    {
        let mut set = ElementSet::new();
        for id in srgs {
            let srg = self.srg(id)?;
            set.nodes.extend(srg.nodes.iter().copied());
            set.links.extend(srg.links.iter().copied());
        }
        Ok(set)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutators
    // ═══════════════════════════════════════════════════════════════════════

    pub fn add_node(&mut self, name: impl Into<String>) -> Result<NodeId, StateError> {
        self.ensure_mutable()?;
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push_back(Node {
            id,
            name: name.into(),
            up: true,
        });
        Ok(id)
    }

    pub fn add_link(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        capacity: f64,
        length_km: f64,
    ) -> Result<LinkId, StateError> {
        self.ensure_mutable()?;
        self.node(origin)?;
        self.node(destination)?;
        if origin == destination {
            return Err(StateError::InvalidParameter(format!(
                "self-loop link at {origin}"
            )));
        }
        check_amount("link capacity", capacity)?;
        check_amount("link length", length_km)?;
        let id = LinkId::from_index(self.links.len());
        self.links.push_back(Link {
            id,
            origin,
            destination,
            capacity,
            length_km,
            up: true,
            attributes: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Add a pair of opposite links with the same capacity and length.
    pub fn add_link_pair(
        &mut self,
        a: NodeId,
        b: NodeId,
        capacity: f64,
        length_km: f64,
    ) -> Result<(LinkId, LinkId), StateError> {
        let forward = self.add_link(a, b, capacity, length_km)?;
        let backward = self.add_link(b, a, capacity, length_km)?;
        Ok((forward, backward))
    }

    pub fn set_link_attribute(
        &mut self,
        link: LinkId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), StateError> {
        self.ensure_mutable()?;
        let link = self
            .links
            .get_mut(link.index())
            .ok_or(StateError::UnknownLink(link))?;
        link.attributes.insert(key.into(), value.into());
        Ok(())
    }

    pub fn add_demand(
        &mut self,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
    ) -> Result<DemandId, StateError> {
        self.ensure_mutable()?;
        self.node(ingress)?;
        self.node(egress)?;
        if ingress == egress {
            return Err(StateError::InvalidParameter(format!(
                "demand ingress and egress are both {ingress}"
            )));
        }
        check_amount("offered traffic", offered_traffic)?;
        let id = DemandId::from_index(self.demands.len());
        self.demands.push_back(Demand {
            id,
            ingress,
            egress,
            offered_traffic,
        });
        Ok(id)
    }

    /// Add a route; `path` becomes both its current and its primary path.
    pub fn add_route(
        &mut self,
        demand: DemandId,
        path: Vec<PathElement>,
        carried_traffic: f64,
        priority: i32,
    ) -> Result<RouteId, StateError> {
        self.ensure_mutable()?;
        let (ingress, egress) = {
            let d = self.demand(demand)?;
            (d.ingress, d.egress)
        };
        self.validate_path(&path, ingress, egress)?;
        check_amount("carried traffic", carried_traffic)?;
        let id = RouteId::from_index(self.routes.len());
        self.routes.push_back(Route {
            id,
            demand,
            primary_path: path.clone(),
            path,
            carried_traffic,
            primary_traffic: carried_traffic,
            priority,
            backup_segments: Vec::new(),
        });
        Ok(id)
    }

    /// Move a route onto a new path and volume. The primary path is kept.
    pub fn modify_route(
        &mut self,
        route: RouteId,
        path: Vec<PathElement>,
        carried_traffic: f64,
    ) -> Result<(), StateError> {
        self.ensure_mutable()?;
        let demand = self.route(route)?.demand;
        let (ingress, egress) = {
            let d = self.demand(demand)?;
            (d.ingress, d.egress)
        };
        self.validate_path(&path, ingress, egress)?;
        check_amount("carried traffic", carried_traffic)?;
        let entry = self
            .routes
            .get_mut(route.index())
            .ok_or(StateError::UnknownRoute(route))?;
        entry.path = path;
        entry.carried_traffic = carried_traffic;
        Ok(())
    }

    pub fn set_route_backup_segments(
        &mut self,
        route: RouteId,
        segments: Vec<SegmentId>,
    ) -> Result<(), StateError> {
        self.ensure_mutable()?;
        for &segment in &segments {
            self.segment(segment)?;
        }
        let entry = self
            .routes
            .get_mut(route.index())
            .ok_or(StateError::UnknownRoute(route))?;
        entry.backup_segments = segments;
        Ok(())
    }

    pub fn remove_all_routes(&mut self) -> Result<(), StateError> {
        self.ensure_mutable()?;
        self.routes.clear();
        Ok(())
    }

    pub fn add_segment(
        &mut self,
        links: Vec<LinkId>,
        reserved_capacity: f64,
    ) -> Result<SegmentId, StateError> {
        self.ensure_mutable()?;
        if links.is_empty() {
            return Err(StateError::InvalidPath("segment has no links".to_string()));
        }
        self.validate_link_chain(&links)?;
        check_amount("reserved capacity", reserved_capacity)?;
        let id = SegmentId::from_index(self.segments.len());
        self.segments.push_back(ProtectionSegment {
            id,
            links,
            reserved_capacity,
        });
        Ok(id)
    }

    pub fn add_srg(
        &mut self,
        mttf: f64,
        mttr: f64,
        nodes: BTreeSet<NodeId>,
        links: BTreeSet<LinkId>,
    ) -> Result<SrgId, StateError> {
        self.ensure_mutable()?;
        if !(mttf > 0.0 && mttf.is_finite() && mttr > 0.0 && mttr.is_finite()) {
            return Err(StateError::InvalidParameter(format!(
                "SRG needs positive finite MTTF/MTTR, got {mttf}/{mttr}"
            )));
        }
        for &node in &nodes {
            self.node(node)?;
        }
        for &link in &links {
            self.link(link)?;
        }
        let id = SrgId::from_index(self.srgs.len());
        self.srgs.push_back(SharedRiskGroup {
            id,
            mttf,
            mttr,
            nodes,
            links,
        });
        Ok(id)
    }

    pub fn set_node_up(&mut self, node: NodeId, up: bool) -> Result<(), StateError> {
        self.ensure_mutable()?;
        let entry = self
            .nodes
            .get_mut(node.index())
            .ok_or(StateError::UnknownNode(node))?;
        entry.up = up;
        Ok(())
    }

    pub fn set_link_up(&mut self, link: LinkId, up: bool) -> Result<(), StateError> {
        self.ensure_mutable()?;
        let entry = self
            .links
            .get_mut(link.index())
            .ok_or(StateError::UnknownLink(link))?;
        entry.up = up;
        Ok(())
    }

    /// Set the up state of every element of a set.
    pub fn set_elements_up(&mut self, elements: &ElementSet, up: bool) -> Result<(), StateError> {
        for &node in &elements.nodes {
            self.set_node_up(node, up)?;
        }
        for &link in &elements.links {
            self.set_link_up(link, up)?;
        }
        Ok(())
    }

    /// Apply a provisioning action. Returns the new route for `AddRoute`.
    pub fn apply(&mut self, action: &ProvisioningAction) -> Result<Option<RouteId>, StateError> {
        match action {
            ProvisioningAction::AddRoute {
                demand,
                path,
                carried_traffic,
                priority,
            } => self
                .add_route(*demand, path.clone(), *carried_traffic, *priority)
                .map(Some),
            ProvisioningAction::ModifyRoute {
                route,
                path,
                carried_traffic,
            } => self
                .modify_route(*route, path.clone(), *carried_traffic)
                .map(|_| None),
            ProvisioningAction::RemoveAllRoutes => self.remove_all_routes().map(|_| None),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Validity
    // ═══════════════════════════════════════════════════════════════════════

    /// Check the state's invariants. Fails with
    /// [`StateError::InvariantViolation`] naming the first offending element
    /// unless `options` relaxes the corresponding check.
    pub fn check_validity(&self, options: &ValidityOptions) -> Result<(), StateError> {
        let violation = |msg: String| Err(StateError::InvariantViolation(msg));

        for link in &self.links {
            if self.node(link.origin).is_err() || self.node(link.destination).is_err() {
                return violation(format!("{} has an unknown end node", link.id));
            }
            if !(link.capacity >= 0.0 && link.length_km >= 0.0) {
                return violation(format!("{} has negative capacity or length", link.id));
            }
        }

        for segment in &self.segments {
            if segment.links.is_empty() || self.validate_link_chain(&segment.links).is_err() {
                return violation(format!("{} is not a contiguous link chain", segment.id));
            }
            if !(segment.reserved_capacity >= 0.0) {
                return violation(format!("{} has negative reserved capacity", segment.id));
            }
        }

        for demand in &self.demands {
            if !(demand.offered_traffic >= 0.0) {
                return violation(format!("{} has negative offered traffic", demand.id));
            }
        }

        for route in &self.routes {
            let demand = match self.demand(route.demand) {
                Ok(demand) => demand,
                Err(_) => {
                    return violation(format!(
                        "{} references missing {}",
                        route.id, route.demand
                    ))
                }
            };
            if let Err(e) = self.validate_path(&route.path, demand.ingress, demand.egress) {
                return violation(format!("{} has an invalid path: {e}", route.id));
            }
            if !(route.carried_traffic >= 0.0) {
                return violation(format!("{} has negative carried traffic", route.id));
            }
        }

        for srg in &self.srgs {
            if srg.nodes.iter().any(|n| self.node(*n).is_err())
                || srg.links.iter().any(|l| self.link(*l).is_err())
            {
                return violation(format!("{} has an unknown member", srg.id));
            }
            if !(srg.mttf > 0.0 && srg.mttr > 0.0) {
                return violation(format!("{} has non-positive MTTF/MTTR", srg.id));
            }
        }

        if !options.allow_link_oversubscription {
            for (link, occupied) in self.links.iter().zip(self.link_occupancy()) {
                if occupied > link.capacity + options.precision {
                    return violation(format!(
                        "{} is oversubscribed: occupied {occupied} > capacity {}",
                        link.id, link.capacity
                    ));
                }
            }
            for (segment, occupied) in self.segments.iter().zip(self.segment_occupancy()) {
                if occupied > segment.reserved_capacity + options.precision {
                    return violation(format!(
                        "{} is oversubscribed: occupied {occupied} > reserved {}",
                        segment.id, segment.reserved_capacity
                    ));
                }
            }
        }

        if !options.allow_excess_carried_traffic {
            for demand in &self.demands {
                let carried = self.demand_carried_traffic(demand.id);
                if carried > demand.offered_traffic + options.precision {
                    return violation(format!(
                        "{} carries {carried} > offered {}",
                        demand.id, demand.offered_traffic
                    ));
                }
            }
        }

        Ok(())
    }
}
