//! Test helpers for resilience simulation - provides small deterministic
//! network fixtures.
//!
//! Every fixture is built through the public [`NetworkState`] API, passes
//! [`NetworkState::check_validity`] with default options, and hands back the
//! identifiers tests need to refer to its elements.
//!
//! # Example
//!
//! ```rust
//! use resilience_test_helpers::fixtures;
//! use resilience_types::ValidityOptions;
//!
//! let fixture = fixtures::scenario_b(true);
//! assert!(fixture.state.check_validity(&ValidityOptions::default()).is_ok());
//! assert_eq!(fixture.state.num_routes(), 1);
//! ```

pub mod fixtures;

use resilience_types::{LinkId, NetworkState, NodeId, RouteId, SegmentId, SrgId};

/// A network state plus handles on its elements, in creation order.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub state: NetworkState,
    pub nodes: Vec<NodeId>,
    pub links: Vec<LinkId>,
    pub routes: Vec<RouteId>,
    pub segments: Vec<SegmentId>,
    pub srgs: Vec<SrgId>,
}

impl Fixture {
    fn new(state: NetworkState) -> Self {
        Self {
            nodes: state.nodes().map(|n| n.id).collect(),
            links: state.links().map(|l| l.id).collect(),
            routes: state.routes().map(|r| r.id).collect(),
            segments: state.segments().map(|s| s.id).collect(),
            srgs: state.srgs().map(|s| s.id).collect(),
            state,
        }
    }

    /// Node by name.
    ///
    /// # Panics
    ///
    /// Panics if no node has that name.
    pub fn node(&self, name: &str) -> NodeId {
        self.state
            .nodes()
            .find(|n| n.name == name)
            .map(|n| n.id)
            .unwrap_or_else(|| panic!("fixture has no node named {name:?}"))
    }

    /// The link from `origin` to `destination`, by node name.
    ///
    /// # Panics
    ///
    /// Panics if there is no such link.
    pub fn link(&self, origin: &str, destination: &str) -> LinkId {
        let (o, d) = (self.node(origin), self.node(destination));
        self.state
            .links()
            .find(|l| l.origin == o && l.destination == d)
            .map(|l| l.id)
            .unwrap_or_else(|| panic!("fixture has no link {origin} -> {destination}"))
    }

    /// The SRG containing exactly `link`, if the fixture created one.
    pub fn srg_of_link(&self, link: LinkId) -> Option<SrgId> {
        self.state
            .srgs()
            .find(|s| s.nodes.is_empty() && s.links.len() == 1 && s.links.contains(&link))
            .map(|s| s.id)
    }
}
