//! Provisioning actions: the only way route state changes during a run.

use crate::{DemandId, PathElement, RouteId};
use std::fmt;

/// A route mutation emitted by a recovery strategy and applied by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningAction {
    /// Create a new route for a demand. Its primary path is `path`.
    AddRoute {
        demand: DemandId,
        path: Vec<PathElement>,
        carried_traffic: f64,
        priority: i32,
    },

    /// Move an existing route onto a new path and/or volume.
    ModifyRoute {
        route: RouteId,
        path: Vec<PathElement>,
        carried_traffic: f64,
    },

    /// Drop every route.
    RemoveAllRoutes,
}

impl ProvisioningAction {
    /// Get a human-readable name for this action type.
    pub fn type_name(&self) -> &'static str {
        match self {
            ProvisioningAction::AddRoute { .. } => "AddRoute",
            ProvisioningAction::ModifyRoute { .. } => "ModifyRoute",
            ProvisioningAction::RemoveAllRoutes => "RemoveAllRoutes",
        }
    }
}

impl fmt::Display for ProvisioningAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningAction::AddRoute {
                demand,
                path,
                carried_traffic,
                ..
            } => write!(
                f,
                "AddRoute({demand}, {} hops, {carried_traffic})",
                path.len()
            ),
            ProvisioningAction::ModifyRoute {
                route,
                path,
                carried_traffic,
            } => write!(
                f,
                "ModifyRoute({route}, {} hops, {carried_traffic})",
                path.len()
            ),
            ProvisioningAction::RemoveAllRoutes => write!(f, "RemoveAllRoutes"),
        }
    }
}
