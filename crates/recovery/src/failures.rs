//! SRG failure model: one alternating failure/reparation process per SRG.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use resilience_core::{NetworkEvent, TimedEvent};
use resilience_types::{NetworkState, SrgId};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SrgTiming {
    srg: SrgId,
    mttf: f64,
    mttr: f64,
}

/// Event priority of an SRG's failures and reparations.
///
/// Every SRG gets its own priority, so simultaneous events of different SRGs
/// never share a `(time, priority)` key. Lower SRG ids are served first. An
/// SRG never has more than one pending event.
pub fn srg_priority(srg: SrgId) -> i32 {
    i32::try_from(srg.index()).map_or(i32::MIN, |index| -index)
}

/// Generates SRG failures and reparations.
///
/// Each SRG fails for the first time after an exponential delay with mean
/// MTTF. A failure is followed by the SRG's reparation after an exponential
/// delay with mean MTTR, and a reparation by the next failure after one with
/// mean MTTF. Sequences are reproducible for a given seed.
#[derive(Debug, Clone)]
pub struct SrgFailureModel {
    seed: u64,
    rng: ChaCha8Rng,
    timings: Vec<SrgTiming>,
}

impl SrgFailureModel {
    /// Model the non-empty SRGs of `state`.
    pub fn new(state: &NetworkState, seed: u64) -> Self {
        let timings = state
            .srgs()
            .filter(|srg| !srg.is_empty())
            .map(|srg| SrgTiming {
                srg: srg.id,
                mttf: srg.mttf,
                mttr: srg.mttr,
            })
            .collect();
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            timings,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of SRGs the model drives.
    pub fn num_srgs(&self) -> usize {
        self.timings.len()
    }

    /// Restart the random sequence from the seed.
    pub fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
    }

    /// Exponential delay with the given mean.
    fn sample(&mut self, mean: f64) -> f64 {
        let u: f64 = self.rng.gen();
        -mean * (1.0 - u).ln()
    }

    /// First failure of every SRG, in SRG order.
    pub fn initial_events(&mut self) -> Vec<TimedEvent<NetworkEvent>> {
        let timings = self.timings.clone();
        timings
            .into_iter()
            .map(|t| {
                TimedEvent::new(
                    self.sample(t.mttf),
                    srg_priority(t.srg),
                    NetworkEvent::srg_failure(t.srg),
                )
            })
            .collect()
    }

    /// The event that follows `event` in its SRG's process.
    ///
    /// Returns `None` for events that do not name exactly one modelled SRG.
    pub fn follow_up(&mut self, event: &TimedEvent<NetworkEvent>) -> Option<TimedEvent<NetworkEvent>> {
        let targets = event.payload().targets();
        if targets.srgs.len() != 1 || !targets.nodes.is_empty() || !targets.links.is_empty() {
            return None;
        }
        let srg = *targets.srgs.iter().next()?;
        let timing = *self.timings.iter().find(|t| t.srg == srg)?;

        let (delay, payload) = if event.payload().is_failure() {
            (self.sample(timing.mttr), NetworkEvent::srg_reparation(srg))
        } else {
            (self.sample(timing.mttf), NetworkEvent::srg_failure(srg))
        };
        let next = TimedEvent::new(event.time() + delay, srg_priority(srg), payload);
        trace!(srg = %srg, time = next.time(), event = %next.payload(), "Scheduled follow-up");
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn state_with_srgs() -> NetworkState {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let ab = state.add_link(a, b, 10.0, 1.0).unwrap();
        state
            .add_srg(100.0, 2.0, BTreeSet::new(), [ab].into_iter().collect())
            .unwrap();
        state
            .add_srg(50.0, 1.0, [b].into_iter().collect(), BTreeSet::new())
            .unwrap();
        // Empty SRGs are not modelled.
        state
            .add_srg(10.0, 1.0, BTreeSet::new(), BTreeSet::new())
            .unwrap();
        state
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let state = state_with_srgs();
        let mut first = SrgFailureModel::new(&state, 7);
        let mut second = SrgFailureModel::new(&state, 7);
        let mut other = SrgFailureModel::new(&state, 8);

        let a = first.initial_events();
        assert_eq!(a, second.initial_events());
        assert_ne!(a, other.initial_events());
        assert_eq!(a.len(), 2);
        assert!(a.iter().all(|e| e.time() >= 0.0 && e.payload().is_failure()));

        first.reset();
        assert_eq!(first.initial_events(), a);
    }

    #[test]
    fn test_follow_up_alternates() {
        let state = state_with_srgs();
        let mut model = SrgFailureModel::new(&state, 1);
        let failure = TimedEvent::at(10.0, NetworkEvent::srg_failure(SrgId(0)));

        let repair = model.follow_up(&failure).unwrap();
        assert_eq!(*repair.payload(), NetworkEvent::srg_reparation(SrgId(0)));
        assert_eq!(repair.priority(), srg_priority(SrgId(0)));
        assert!(repair.time() >= 10.0);

        let next_failure = model.follow_up(&repair).unwrap();
        assert_eq!(*next_failure.payload(), NetworkEvent::srg_failure(SrgId(0)));
        assert!(next_failure.time() >= repair.time());

        assert!(model
            .follow_up(&TimedEvent::at(1.0, NetworkEvent::srg_failure(SrgId(2))))
            .is_none());
        assert!(model
            .follow_up(&TimedEvent::at(1.0, NetworkEvent::link_failure(resilience_types::LinkId(0))))
            .is_none());
    }

    #[test]
    fn test_simultaneous_srg_events_share_the_clock() {
        let state = state_with_srgs();
        let mut model = SrgFailureModel::new(&state, 3);
        let events = model.initial_events();
        assert_eq!(events[0].priority(), 0);
        assert_eq!(events[1].priority(), -1);

        // Two SRGs failing at the same instant are both accepted.
        let mut clock = resilience_simulation::EventClock::new();
        for srg in [SrgId(0), SrgId(1)] {
            clock
                .schedule(TimedEvent::new(
                    5.0,
                    srg_priority(srg),
                    NetworkEvent::srg_failure(srg),
                ))
                .unwrap();
        }
        assert_eq!(
            *clock.next().unwrap().payload(),
            NetworkEvent::srg_failure(SrgId(0))
        );
    }

    #[test]
    fn test_mean_delay_matches_mttf() {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        state
            .add_srg(20.0, 1.0, [a].into_iter().collect(), BTreeSet::new())
            .unwrap();
        let mut model = SrgFailureModel::new(&state, 42);

        let samples = 20_000;
        let total: f64 = (0..samples).map(|_| model.sample(20.0)).sum();
        let mean = total / samples as f64;
        assert!((mean - 20.0).abs() < 1.0, "mean delay {mean}");
    }
}
