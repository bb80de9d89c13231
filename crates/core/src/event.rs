//! Timed events and the network event payload.

use resilience_types::{LinkId, NodeId, SrgId};
use std::collections::BTreeSet;
use std::fmt;

/// An event scheduled at a simulated time.
///
/// Among events at the same time, a higher `priority` is served first. The
/// event is immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent<P> {
    time: f64,
    priority: i32,
    payload: P,
}

impl<P> TimedEvent<P> {
    /// Create an event.
    pub fn new(time: f64, priority: i32, payload: P) -> Self {
        Self {
            time,
            priority,
            payload,
        }
    }

    /// Create an event with priority 0.
    pub fn at(time: f64, payload: P) -> Self {
        Self::new(time, 0, payload)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Elements named by a failure or reparation event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EventTargets {
    pub srgs: BTreeSet<SrgId>,
    pub nodes: BTreeSet<NodeId>,
    pub links: BTreeSet<LinkId>,
}

impl EventTargets {
    pub fn srg(srg: SrgId) -> Self {
        Self {
            srgs: [srg].into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn node(node: NodeId) -> Self {
        Self {
            nodes: [node].into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn link(link: LinkId) -> Self {
        Self {
            links: [link].into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.srgs.is_empty() && self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Payload of resilience simulation events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetworkEvent {
    /// The targets (and, through SRG membership, their co-members) go down.
    Failure(EventTargets),
    /// The targets come back up.
    Reparation(EventTargets),
}

impl NetworkEvent {
    pub fn srg_failure(srg: SrgId) -> Self {
        NetworkEvent::Failure(EventTargets::srg(srg))
    }

    pub fn srg_reparation(srg: SrgId) -> Self {
        NetworkEvent::Reparation(EventTargets::srg(srg))
    }

    pub fn link_failure(link: LinkId) -> Self {
        NetworkEvent::Failure(EventTargets::link(link))
    }

    pub fn link_reparation(link: LinkId) -> Self {
        NetworkEvent::Reparation(EventTargets::link(link))
    }

    pub fn node_failure(node: NodeId) -> Self {
        NetworkEvent::Failure(EventTargets::node(node))
    }

    pub fn node_reparation(node: NodeId) -> Self {
        NetworkEvent::Reparation(EventTargets::node(node))
    }

    pub fn targets(&self) -> &EventTargets {
        match self {
            NetworkEvent::Failure(targets) | NetworkEvent::Reparation(targets) => targets,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NetworkEvent::Failure(_))
    }

    /// Get a human-readable name for this event type.
    pub fn type_name(&self) -> &'static str {
        match self {
            NetworkEvent::Failure(_) => "Failure",
            NetworkEvent::Reparation(_) => "Reparation",
        }
    }
}

impl fmt::Display for NetworkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets = self.targets();
        write!(
            f,
            "{}(srgs={:?}, nodes={:?}, links={:?})",
            self.type_name(),
            targets.srgs.iter().map(|s| s.0).collect::<Vec<_>>(),
            targets.nodes.iter().map(|n| n.0).collect::<Vec<_>>(),
            targets.links.iter().map(|l| l.0).collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let failure = NetworkEvent::srg_failure(SrgId(2));
        assert!(failure.is_failure());
        assert!(failure.targets().srgs.contains(&SrgId(2)));
        assert_eq!(failure.to_string(), "Failure(srgs=[2], nodes=[], links=[])");

        let repair = NetworkEvent::link_reparation(LinkId(4));
        assert!(!repair.is_failure());
        assert_eq!(repair.type_name(), "Reparation");
        assert!(!repair.targets().is_empty());
    }

    #[test]
    fn test_timed_event_accessors() {
        let event = TimedEvent::new(1.5, -2, "payload");
        assert_eq!(event.time(), 1.5);
        assert_eq!(event.priority(), -2);
        assert_eq!(*event.payload(), "payload");
        assert_eq!(TimedEvent::at(3.0, ()).priority(), 0);
    }
}
