//! Per-route service status.

use crate::effect::is_demand_isolated;
use crate::paths::shortest_path;
use resilience_types::{NetworkState, RouteId, StateError};
use std::fmt;

/// Service status of a route, derived from the current network state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteStatus {
    /// Up on its primary path at its original volume.
    Provisioned,
    /// Up, but rerouted off its primary path or carrying less than its
    /// original volume. `partial` is set in the latter case.
    Degraded { partial: bool },
    /// Down, while a usable path between the demand endpoints exists.
    Interrupted,
    /// Down, with no usable path left between the demand endpoints.
    Unrecoverable,
}

impl RouteStatus {
    /// Classify one route. `precision` is the tolerance on traffic volumes.
    pub fn classify(
        state: &NetworkState,
        route: RouteId,
        precision: f64,
    ) -> Result<Self, StateError> {
        let entry = state.route(route)?;
        if state.is_path_usable(&entry.path) {
            let partial = entry.carried_traffic + precision < entry.primary_traffic;
            let full_volume = (entry.carried_traffic - entry.primary_traffic).abs() <= precision;
            if entry.path == entry.primary_path && full_volume {
                Ok(RouteStatus::Provisioned)
            } else {
                Ok(RouteStatus::Degraded { partial })
            }
        } else if is_demand_isolated(state, entry.demand)? {
            Ok(RouteStatus::Unrecoverable)
        } else {
            let demand = state.demand(entry.demand)?;
            match shortest_path(state, demand.ingress, demand.egress, |_| Some(1.0)) {
                Some(_) => Ok(RouteStatus::Interrupted),
                None => Ok(RouteStatus::Unrecoverable),
            }
        }
    }

    /// Classify every route, in route order.
    pub fn classify_all(state: &NetworkState, precision: f64) -> Result<Vec<Self>, StateError> {
        state
            .routes()
            .map(|r| RouteStatus::classify(state, r.id, precision))
            .collect()
    }

    pub fn is_up(self) -> bool {
        matches!(self, RouteStatus::Provisioned | RouteStatus::Degraded { .. })
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteStatus::Provisioned => "provisioned",
            RouteStatus::Degraded { partial: false } => "degraded",
            RouteStatus::Degraded { partial: true } => "degraded (partial)",
            RouteStatus::Interrupted => "interrupted",
            RouteStatus::Unrecoverable => "unrecoverable",
        })
    }
}

/// Number of routes in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub provisioned: usize,
    /// Degraded routes, partial ones included.
    pub degraded: usize,
    /// Degraded routes carrying less than their original volume.
    pub partial: usize,
    pub interrupted: usize,
    pub unrecoverable: usize,
}

impl StatusCounts {
    pub fn tally(statuses: &[RouteStatus]) -> Self {
        let mut counts = StatusCounts::default();
        for status in statuses {
            match status {
                RouteStatus::Provisioned => counts.provisioned += 1,
                RouteStatus::Degraded { partial } => {
                    counts.degraded += 1;
                    if *partial {
                        counts.partial += 1;
                    }
                }
                RouteStatus::Interrupted => counts.interrupted += 1,
                RouteStatus::Unrecoverable => counts.unrecoverable += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::link_path;

    #[test]
    fn test_classify() {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let c = state.add_node("c").unwrap();
        let ab = state.add_link(a, b, 10.0, 1.0).unwrap();
        let bc = state.add_link(b, c, 10.0, 1.0).unwrap();
        let ac = state.add_link(a, c, 10.0, 1.0).unwrap();
        let ab_demand = state.add_demand(a, b, 5.0).unwrap();
        let ac_demand = state.add_demand(a, c, 5.0).unwrap();
        state.add_route(ab_demand, link_path(&[ab]), 5.0, 0).unwrap();
        let direct = state.add_route(ac_demand, link_path(&[ac]), 5.0, 0).unwrap();

        assert_eq!(
            RouteStatus::classify(&state, direct, 1e-9).unwrap(),
            RouteStatus::Provisioned
        );

        // Rerouted at full volume.
        state.modify_route(direct, link_path(&[ab, bc]), 5.0).unwrap();
        assert_eq!(
            RouteStatus::classify(&state, direct, 1e-9).unwrap(),
            RouteStatus::Degraded { partial: false }
        );

        // Rerouted at reduced volume.
        state.modify_route(direct, link_path(&[ab, bc]), 2.0).unwrap();
        let status = RouteStatus::classify(&state, direct, 1e-9).unwrap();
        assert_eq!(status, RouteStatus::Degraded { partial: true });
        assert_eq!(status.to_string(), "degraded (partial)");
        assert_eq!(StatusCounts::tally(&[status]).partial, 1);

        // Back on the primary path at its original volume.
        state.modify_route(direct, link_path(&[ac]), 5.0).unwrap();
        assert_eq!(
            RouteStatus::classify(&state, direct, 1e-9).unwrap(),
            RouteStatus::Provisioned
        );
        state.modify_route(direct, link_path(&[ab, bc]), 2.0).unwrap();

        // b loses its only incoming link; a -> c still has the direct link.
        state.set_link_up(ab, false).unwrap();
        let statuses = RouteStatus::classify_all(&state, 1e-9).unwrap();
        assert_eq!(
            statuses,
            vec![RouteStatus::Unrecoverable, RouteStatus::Interrupted]
        );
        assert_eq!(statuses[0].to_string(), "unrecoverable");
        assert!(!statuses[1].is_up());

        let counts = StatusCounts::tally(&statuses);
        assert_eq!(counts.unrecoverable, 1);
        assert_eq!(counts.interrupted, 1);
        assert_eq!(counts.provisioned, 0);
    }
}
