//! Error types for network state operations.

use crate::{DemandId, LinkId, NodeId, RouteId, SegmentId, SrgId};
use thiserror::Error;

/// Errors raised by [`NetworkState`](crate::NetworkState) queries, mutators and
/// validity checks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    /// A validity check failed. The message names the first offending element.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A mutator was invoked on a read-only view.
    #[error("network state is unmodifiable")]
    Unmodifiable,

    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown link {0}")]
    UnknownLink(LinkId),

    #[error("unknown demand {0}")]
    UnknownDemand(DemandId),

    #[error("unknown route {0}")]
    UnknownRoute(RouteId),

    #[error("unknown protection segment {0}")]
    UnknownSegment(SegmentId),

    #[error("unknown shared risk group {0}")]
    UnknownSrg(SrgId),

    /// Path elements are not contiguous or do not join the demand endpoints.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A numeric parameter is out of range (negative capacity, NaN traffic, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
