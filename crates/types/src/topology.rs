//! Physical topology elements: nodes, links and shared risk groups.

use crate::{LinkId, NodeId, SrgId};
use std::collections::{BTreeMap, BTreeSet};

/// A network node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// False while the node is failed.
    pub up: bool,
}

/// A unidirectional link between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub origin: NodeId,
    pub destination: NodeId,
    /// Capacity in traffic units.
    pub capacity: f64,
    pub length_km: f64,
    /// False while the link is failed.
    pub up: bool,
    /// Free-form attributes (e.g. number of wavelength slots).
    pub attributes: BTreeMap<String, String>,
}

impl Link {
    /// Parse an attribute as a number, if present and well formed.
    pub fn attribute_f64(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).and_then(|v| v.parse().ok())
    }

    /// Parse an attribute as an unsigned integer, if present and well formed.
    pub fn attribute_u32(&self, key: &str) -> Option<u32> {
        self.attributes.get(key).and_then(|v| v.parse().ok())
    }
}

/// A shared risk group: nodes and links that fail together.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedRiskGroup {
    pub id: SrgId,
    /// Mean time to fail, in simulated time units.
    pub mttf: f64,
    /// Mean time to repair, in simulated time units.
    pub mttr: f64,
    pub nodes: BTreeSet<NodeId>,
    pub links: BTreeSet<LinkId>,
}

impl SharedRiskGroup {
    /// Steady-state availability of the group, `mttf / (mttf + mttr)`.
    pub fn availability(&self) -> f64 {
        self.mttf / (self.mttf + self.mttr)
    }

    /// Whether the group contains no element.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// A set of nodes and links, used for failure down-sets and reparation up-sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementSet {
    pub nodes: BTreeSet<NodeId>,
    pub links: BTreeSet<LinkId>,
}

impl ElementSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_link(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    /// Add all elements of another set.
    pub fn extend(&mut self, other: &ElementSet) {
        self.nodes.extend(other.nodes.iter().copied());
        self.links.extend(other.links.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("wavelengths".to_string(), "40".to_string());
        attributes.insert("broken".to_string(), "forty".to_string());
        let link = Link {
            id: LinkId(0),
            origin: NodeId(0),
            destination: NodeId(1),
            capacity: 100.0,
            length_km: 80.0,
            up: true,
            attributes,
        };

        assert_eq!(link.attribute_u32("wavelengths"), Some(40));
        assert_eq!(link.attribute_f64("wavelengths"), Some(40.0));
        assert_eq!(link.attribute_u32("broken"), None);
        assert_eq!(link.attribute_u32("missing"), None);
    }

    #[test]
    fn test_srg_availability() {
        let srg = SharedRiskGroup {
            id: SrgId(0),
            mttf: 99.0,
            mttr: 1.0,
            nodes: BTreeSet::new(),
            links: [LinkId(1)].into_iter().collect(),
        };
        assert!((srg.availability() - 0.99).abs() < 1e-12);
        assert!(!srg.is_empty());
    }
}
