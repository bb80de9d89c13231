//! Traffic elements: demands, routes and protection segments.

use crate::{DemandId, LinkId, NodeId, RouteId, SegmentId};
use std::fmt;

/// One hop of a route path: a plain link or a whole protection segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    Link(LinkId),
    Segment(SegmentId),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Link(link) => write!(f, "{link}"),
            PathElement::Segment(segment) => write!(f, "{segment}"),
        }
    }
}

/// Convert a plain link sequence into path elements.
pub fn link_path(links: &[LinkId]) -> Vec<PathElement> {
    links.iter().copied().map(PathElement::Link).collect()
}

/// Offered traffic between an ingress and an egress node.
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub id: DemandId,
    pub ingress: NodeId,
    pub egress: NodeId,
    pub offered_traffic: f64,
}

/// A route carrying (part of) a demand's traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub demand: DemandId,
    /// Path currently committed.
    pub path: Vec<PathElement>,
    /// Traffic currently committed along `path`.
    pub carried_traffic: f64,
    /// Path the route was provisioned on by the network design.
    pub primary_path: Vec<PathElement>,
    /// Traffic the route carried on its primary path.
    pub primary_traffic: f64,
    /// Higher values claim capacity first during recovery.
    pub priority: i32,
    /// Pre-provisioned protection segments this route may switch onto.
    pub backup_segments: Vec<SegmentId>,
}

impl Route {
    /// Whether the route is committed on its primary path at its original volume.
    pub fn is_on_primary(&self) -> bool {
        self.path == self.primary_path && self.carried_traffic == self.primary_traffic
    }

    /// Whether the route was provisioned with traffic but carries none, after
    /// higher-priority routes claimed its reservation.
    pub fn is_preempted(&self) -> bool {
        self.carried_traffic <= 0.0 && self.primary_traffic > 0.0
    }

    /// Whether the current path uses the given segment.
    pub fn uses_segment(&self, segment: SegmentId) -> bool {
        self.path.contains(&PathElement::Segment(segment))
    }
}

/// A pre-provisioned backup sub-path with reserved capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionSegment {
    pub id: SegmentId,
    pub links: Vec<LinkId>,
    /// Capacity reserved on every member link.
    pub reserved_capacity: f64,
}
