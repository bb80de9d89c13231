//! Network state types for resilience simulation.
//!
//! The network is an arena of dense arrays (nodes, links, demands, routes,
//! protection segments, SRGs). Elements refer to each other only through
//! integer identifiers, never through pointers.
//!
//! - [`NetworkState`]: the snapshot with copy / read-only-view semantics
//! - [`ProvisioningAction`]: the only way routes change during a run
//! - [`ValidityOptions`]: relaxations for [`NetworkState::check_validity`]

mod action;
mod error;
mod identifiers;
mod state;
mod topology;
mod traffic;

pub use action::ProvisioningAction;
pub use error::StateError;
pub use identifiers::{DemandId, LinkId, NodeId, RouteId, SegmentId, SrgId};
pub use state::{NetworkState, ValidityOptions};
pub use topology::{ElementSet, Link, Node, SharedRiskGroup};
pub use traffic::{link_path, Demand, PathElement, ProtectionSegment, Route};
