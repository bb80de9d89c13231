//! Availability statistics.

use crate::status::StatusCounts;
use resilience_types::NetworkState;
use std::fmt::Write;

/// Time-weighted availability measured over the steady-state window.
///
/// The window starts at time zero, or at the end of the transitory period
/// when one is signalled, and extends to the last event observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AvailabilityStats {
    window_start: f64,
    last_time: f64,
    /// Per demand: integral of the served fraction over the window.
    served_time: Vec<f64>,
    /// Integral of served traffic over the window.
    served_volume: f64,
    /// Integral of offered traffic over the window.
    offered_volume: f64,
    pub failures: u64,
    pub reparations: u64,
    pub actions_applied: u64,
    pub routes_affected: u64,
    pub routes_unrecoverable: u64,
}

/// Share of a demand's offered traffic currently served, capped at one.
fn served_fraction(served: f64, offered: f64) -> f64 {
    if offered <= 0.0 {
        1.0
    } else {
        (served / offered).min(1.0)
    }
}

impl AvailabilityStats {
    pub fn new(num_demands: usize) -> Self {
        Self {
            served_time: vec![0.0; num_demands],
            ..Default::default()
        }
    }

    /// Restart the window at `time`, discarding everything accumulated.
    pub fn restart_at(&mut self, time: f64) {
        let num_demands = self.served_time.len();
        *self = Self::new(num_demands);
        self.window_start = time;
        self.last_time = time;
    }

    /// Integrate the state as it stood since the last call up to `time`.
    pub fn advance(&mut self, state: &NetworkState, time: f64) {
        let dt = time - self.last_time;
        if dt <= 0.0 {
            return;
        }
        if self.served_time.len() < state.num_demands() {
            self.served_time.resize(state.num_demands(), 0.0);
        }
        for demand in state.demands() {
            let served = state.demand_served_traffic(demand.id);
            let offered = demand.offered_traffic;
            self.served_time[demand.id.index()] += served_fraction(served, offered) * dt;
            self.served_volume += served.min(offered) * dt;
            self.offered_volume += offered * dt;
        }
        self.last_time = time;
    }

    /// Length of the observed window.
    pub fn observed_time(&self) -> f64 {
        self.last_time - self.window_start
    }

    /// Availability of each demand over the window; one when nothing was observed.
    pub fn demand_availability(&self) -> Vec<f64> {
        let window = self.observed_time();
        self.served_time
            .iter()
            .map(|&t| if window > 0.0 { t / window } else { 1.0 })
            .collect()
    }

    /// Mean of the per-demand availabilities.
    pub fn mean_availability(&self) -> f64 {
        let per_demand = self.demand_availability();
        if per_demand.is_empty() {
            return 1.0;
        }
        per_demand.iter().sum::<f64>() / per_demand.len() as f64
    }

    pub fn worst_availability(&self) -> f64 {
        self.demand_availability()
            .into_iter()
            .fold(1.0, f64::min)
    }

    /// Served over offered traffic, integrated over the window.
    pub fn traffic_availability(&self) -> f64 {
        if self.offered_volume > 0.0 {
            self.served_volume / self.offered_volume
        } else {
            1.0
        }
    }

    /// Render the engine section of the report.
    pub fn render(&self, rolled_back: u64, statuses: &StatusCounts) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "observed window:          [{}, {}]",
            self.window_start, self.last_time
        );
        let _ = writeln!(out, "failures:                 {}", self.failures);
        let _ = writeln!(out, "reparations:              {}", self.reparations);
        let _ = writeln!(out, "actions applied:          {}", self.actions_applied);
        let _ = writeln!(out, "rolled back attempts:     {rolled_back}");
        let _ = writeln!(out, "routes affected:          {}", self.routes_affected);
        let _ = writeln!(out, "routes unrecoverable:     {}", self.routes_unrecoverable);
        let _ = writeln!(
            out,
            "mean demand availability: {:.6}",
            self.mean_availability()
        );
        let _ = writeln!(
            out,
            "worst demand availability: {:.6}",
            self.worst_availability()
        );
        let _ = writeln!(
            out,
            "traffic availability:     {:.6}",
            self.traffic_availability()
        );
        let _ = writeln!(
            out,
            "final routes:             {} provisioned, {} degraded ({} partial), {} interrupted, {} unrecoverable",
            statuses.provisioned,
            statuses.degraded,
            statuses.partial,
            statuses.interrupted,
            statuses.unrecoverable
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::link_path;

    #[test]
    fn test_time_weighted_availability() {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let ab = state.add_link(a, b, 10.0, 1.0).unwrap();
        let up = state.add_demand(a, b, 4.0).unwrap();
        state.add_route(up, link_path(&[ab]), 4.0, 0).unwrap();
        // A demand with nothing offered is always available.
        let idle = state.add_demand(b, a, 0.0).unwrap();

        let mut stats = AvailabilityStats::new(state.num_demands());
        stats.advance(&state, 3.0);
        state.set_link_up(ab, false).unwrap();
        stats.advance(&state, 4.0);

        let per_demand = stats.demand_availability();
        assert!((per_demand[up.index()] - 0.75).abs() < 1e-12);
        assert_eq!(per_demand[idle.index()], 1.0);
        assert!((stats.traffic_availability() - 0.75).abs() < 1e-12);
        assert!((stats.worst_availability() - 0.75).abs() < 1e-12);
        assert_eq!(stats.observed_time(), 4.0);
    }

    #[test]
    fn test_restart_discards_transitory() {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let ab = state.add_link(a, b, 10.0, 1.0).unwrap();
        let demand = state.add_demand(a, b, 4.0).unwrap();
        state.add_route(demand, link_path(&[ab]), 4.0, 0).unwrap();

        let mut stats = AvailabilityStats::new(1);
        state.set_link_up(ab, false).unwrap();
        stats.advance(&state, 5.0);
        stats.failures = 3;
        stats.restart_at(5.0);
        state.set_link_up(ab, true).unwrap();
        stats.advance(&state, 7.0);

        assert_eq!(stats.failures, 0);
        assert_eq!(stats.demand_availability(), vec![1.0]);
        assert_eq!(stats.observed_time(), 2.0);
        assert!(stats
            .render(0, &StatusCounts::default())
            .contains("failures:                 0"));
    }
}
