//! Tentative-commit capacity accounting.
//!
//! Every strategy reroutes under the same discipline:
//!
//! ```text
//! checkpoint ─► credit current path ─► plan candidate ─► debit candidate
//!                                                          │
//!                          any touched entry negative? ────┤
//!                                  yes: rollback           │ no: commit
//! ```
//!
//! When one failure hits several routes, their reservations are released
//! together first ([`Reservation::Released`]) and each route is then placed
//! against everything they freed, without crediting it again.
//!
//! Writes are journaled with the value they replace, so a rollback restores
//! the exact previous values instead of applying an arithmetic inverse.

use resilience_types::{LinkId, NetworkState, PathElement, Route, SegmentId, StateError};

/// Entries more negative than this count as oversubscribed.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Link(usize),
    Segment(usize),
}

/// Journal position returned by [`CapacityLedger::checkpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Free capacity per link and per protection segment.
///
/// Link free capacity is its capacity minus the reservations of protection
/// segments over it minus the traffic of routes traversing it directly.
/// Segment free capacity is its reserved capacity minus the traffic of routes
/// using it. Up/down state plays no part.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityLedger {
    links: Vec<f64>,
    segments: Vec<f64>,
    journal: Vec<(Slot, f64)>,
    tolerance: f64,
}

impl CapacityLedger {
    /// Build the ledger of the routes committed in `state`.
    pub fn from_state(state: &NetworkState) -> Self {
        let links = state
            .links()
            .zip(state.link_occupancy())
            .map(|(link, occupied)| link.capacity - occupied)
            .collect();
        let segments = state
            .segments()
            .zip(state.segment_occupancy())
            .map(|(segment, occupied)| segment.reserved_capacity - occupied)
            .collect();
        Self {
            links,
            segments,
            journal: Vec::new(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Set the tolerance below zero accepted by feasibility checks.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn link_free(&self, link: LinkId) -> f64 {
        self.links.get(link.index()).copied().unwrap_or(0.0)
    }

    pub fn segment_free(&self, segment: SegmentId) -> f64 {
        self.segments.get(segment.index()).copied().unwrap_or(0.0)
    }

    pub fn link_free_capacity(&self) -> &[f64] {
        &self.links
    }

    pub fn segment_free_capacity(&self) -> &[f64] {
        &self.segments
    }

    /// Free capacity of one path element.
    pub fn element_free(&self, element: PathElement) -> f64 {
        match element {
            PathElement::Link(link) => self.link_free(link),
            PathElement::Segment(segment) => self.segment_free(segment),
        }
    }

    /// Whether every element of `path` can take `volume` more traffic, with
    /// repeated elements taking it once per traversal.
    pub fn can_carry(&self, path: &[PathElement], volume: f64) -> bool {
        let mut seen: Vec<(PathElement, usize)> = Vec::new();
        for element in path {
            match seen.iter_mut().find(|(e, _)| e == element) {
                Some((_, count)) => *count += 1,
                None => seen.push((*element, 1)),
            }
        }
        seen.into_iter()
            .all(|(element, count)| self.element_free(element) + self.tolerance >= volume * count as f64)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Journaled writes
    // ═══════════════════════════════════════════════════════════════════════

    fn slot(&mut self, element: PathElement) -> Result<(Slot, &mut f64), StateError> {
        match element {
            PathElement::Link(link) => {
                let index = link.index();
                self.links
                    .get_mut(index)
                    .map(|free| (Slot::Link(index), free))
                    .ok_or(StateError::UnknownLink(link))
            }
            PathElement::Segment(segment) => {
                let index = segment.index();
                self.segments
                    .get_mut(index)
                    .map(|free| (Slot::Segment(index), free))
                    .ok_or(StateError::UnknownSegment(segment))
            }
        }
    }

    fn adjust(&mut self, element: PathElement, delta: f64) -> Result<(), StateError> {
        let (slot, free) = self.slot(element)?;
        let previous = *free;
        *free = previous + delta;
        self.journal.push((slot, previous));
        Ok(())
    }

    /// Give `volume` back to every element of `path`.
    pub fn credit(&mut self, path: &[PathElement], volume: f64) -> Result<(), StateError> {
        for &element in path {
            self.adjust(element, volume)?;
        }
        Ok(())
    }

    /// Take `volume` from every element of `path`.
    pub fn debit(&mut self, path: &[PathElement], volume: f64) -> Result<(), StateError> {
        for &element in path {
            self.adjust(element, -volume)?;
        }
        Ok(())
    }

    /// Credit a route's current reservation.
    pub fn credit_route(&mut self, route: &Route) -> Result<(), StateError> {
        self.credit(&route.path, route.carried_traffic)
    }

    /// Debit a route's current reservation if it fits; otherwise leave the
    /// ledger as it was and return `false`.
    pub fn reserve_route(&mut self, route: &Route) -> Result<bool, StateError> {
        let checkpoint = self.checkpoint();
        self.debit(&route.path, route.carried_traffic)?;
        if self.has_negative_since(checkpoint) {
            self.rollback(checkpoint);
            return Ok(false);
        }
        self.commit(checkpoint);
        Ok(true)
    }

    /// First entry differing from the expected free capacities by more than
    /// `precision`, as a readable message.
    pub fn mismatch(&self, links: &[f64], segments: &[f64], precision: f64) -> Option<String> {
        if links.len() != self.links.len() || segments.len() != self.segments.len() {
            return Some(format!(
                "ledger covers {} links and {} segments, expected {} and {}",
                self.links.len(),
                self.segments.len(),
                links.len(),
                segments.len()
            ));
        }
        let differs = |a: f64, b: f64| (a - b).abs() > precision * a.abs().max(b.abs()).max(1.0);
        if let Some(i) = (0..links.len()).find(|&i| differs(self.links[i], links[i])) {
            return Some(format!(
                "Link({i}) has {} free in the ledger, expected {}",
                self.links[i], links[i]
            ));
        }
        (0..segments.len())
            .find(|&i| differs(self.segments[i], segments[i]))
            .map(|i| {
                format!(
                    "Segment({i}) has {} free in the ledger, expected {}",
                    self.segments[i], segments[i]
                )
            })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Transactions
    // ═══════════════════════════════════════════════════════════════════════

    /// Mark the current journal position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Whether an entry written since `checkpoint` is below `-tolerance`.
    pub fn has_negative_since(&self, checkpoint: Checkpoint) -> bool {
        self.journal
            .get(checkpoint.0..)
            .unwrap_or_default()
            .iter()
            .any(|(slot, _)| self.value(*slot) < -self.tolerance)
    }

    /// Undo every write since `checkpoint`, restoring the exact previous values.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        while self.journal.len() > checkpoint.0 {
            let Some((slot, previous)) = self.journal.pop() else {
                break;
            };
            match slot {
                Slot::Link(index) => self.links[index] = previous,
                Slot::Segment(index) => self.segments[index] = previous,
            }
        }
    }

    /// Keep every write since `checkpoint`.
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        if checkpoint.0 == 0 {
            self.journal.clear();
        }
    }

    fn value(&self, slot: Slot) -> f64 {
        match slot {
            Slot::Link(index) => self.links[index],
            Slot::Segment(index) => self.segments[index],
        }
    }

    /// Whether the ledger agrees with the routes committed in `state`.
    pub fn matches_state(&self, state: &NetworkState, precision: f64) -> bool {
        let expected = CapacityLedger::from_state(state);
        let close = |a: &[f64], b: &[f64]| {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= precision)
        };
        close(&self.links, &expected.links) && close(&self.segments, &expected.segments)
    }
}

/// Outcome of one tentative reroute.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt {
    /// The candidate fit; the ledger keeps its debit.
    Committed {
        path: Vec<PathElement>,
        carried_traffic: f64,
    },
    /// No candidate was found; the ledger is unchanged.
    NoCandidate,
    /// The candidate did not fit; the ledger is unchanged.
    RolledBack,
}

impl Attempt {
    pub fn is_committed(&self) -> bool {
        matches!(self, Attempt::Committed { .. })
    }
}

/// Where a route's reservation is when a reroute is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Still debited along the route's path; the attempt credits it first.
    Held,
    /// Already credited back with the other routes of the same failure.
    Released,
}

/// Run the credit / plan / debit / check cycle for one route.
///
/// `plan` sees the ledger with the route's reservation credited back and
/// returns the candidate path and volume.
pub fn attempt_reroute<F>(
    ledger: &mut CapacityLedger,
    route: &Route,
    plan: F,
) -> Result<Attempt, StateError>
where
    F: FnOnce(&CapacityLedger) -> Option<(Vec<PathElement>, f64)>,
{
    attempt_with(ledger, route, Reservation::Held, plan)
}

/// [`attempt_reroute`] for a route whose reservation is `reservation`.
///
/// A released route is not credited again, and a rejected attempt leaves it
/// released.
pub fn attempt_with<F>(
    ledger: &mut CapacityLedger,
    route: &Route,
    reservation: Reservation,
    plan: F,
) -> Result<Attempt, StateError>
where
    F: FnOnce(&CapacityLedger) -> Option<(Vec<PathElement>, f64)>,
{
    let checkpoint = ledger.checkpoint();
    if reservation == Reservation::Held {
        ledger.credit_route(route)?;
    }

    let Some((path, carried_traffic)) = plan(ledger) else {
        ledger.rollback(checkpoint);
        return Ok(Attempt::NoCandidate);
    };

    ledger.debit(&path, carried_traffic)?;
    if ledger.has_negative_since(checkpoint) {
        ledger.rollback(checkpoint);
        return Ok(Attempt::RolledBack);
    }
    ledger.commit(checkpoint);
    Ok(Attempt::Committed {
        path,
        carried_traffic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::{link_path, RouteId};

    /// a -> c (link 0), a -> b -> c (links 1, 2), one route of 6 on link 0.
    fn scenario() -> (NetworkState, RouteId) {
        let mut state = NetworkState::new();
        let a = state.add_node("a").unwrap();
        let b = state.add_node("b").unwrap();
        let c = state.add_node("c").unwrap();
        let ac = state.add_link(a, c, 10.0, 100.0).unwrap();
        state.add_link(a, b, 10.0, 80.0).unwrap();
        state.add_link(b, c, 10.0, 80.0).unwrap();
        let demand = state.add_demand(a, c, 6.0).unwrap();
        let route = state.add_route(demand, link_path(&[ac]), 6.0, 0).unwrap();
        (state, route)
    }

    fn bits(ledger: &CapacityLedger) -> Vec<u64> {
        ledger
            .link_free_capacity()
            .iter()
            .chain(ledger.segment_free_capacity())
            .map(|v| v.to_bits())
            .collect()
    }

    #[test]
    fn test_from_state_counts_segments_and_routes() {
        let (mut state, _) = scenario();
        state.add_segment(vec![LinkId(1), LinkId(2)], 3.0).unwrap();
        let ledger = CapacityLedger::from_state(&state);
        assert_eq!(ledger.link_free_capacity(), &[4.0, 7.0, 7.0]);
        assert_eq!(ledger.segment_free(SegmentId(0)), 3.0);
        assert!(ledger.matches_state(&state, 1e-9));
    }

    #[test]
    fn test_successful_attempt_moves_reservation() {
        let (state, route) = scenario();
        let mut ledger = CapacityLedger::from_state(&state);
        let route = state.route(route).unwrap();

        let detour = link_path(&[LinkId(1), LinkId(2)]);
        let attempt = attempt_reroute(&mut ledger, route, |l| {
            assert_eq!(l.link_free(LinkId(0)), 10.0);
            Some((detour.clone(), 6.0))
        })
        .unwrap();

        assert_eq!(
            attempt,
            Attempt::Committed {
                path: detour,
                carried_traffic: 6.0
            }
        );
        assert_eq!(ledger.link_free_capacity(), &[10.0, 4.0, 4.0]);
    }

    #[test]
    fn test_rejected_attempt_is_bit_identical_noop() {
        let (mut state, route) = scenario();
        // Awkward binary fractions make arithmetic inverses inexact.
        state
            .modify_route(route, link_path(&[LinkId(0)]), 0.1 + 0.2)
            .unwrap();
        let mut ledger = CapacityLedger::from_state(&state);
        ledger.debit(&link_path(&[LinkId(1)]), 9.7).unwrap();
        ledger.commit(Checkpoint(0));
        let before = bits(&ledger);

        let route = state.route(route).unwrap();
        let attempt = attempt_reroute(&mut ledger, route, |_| {
            Some((link_path(&[LinkId(1), LinkId(2)]), 0.7))
        })
        .unwrap();

        assert_eq!(attempt, Attempt::RolledBack);
        assert_eq!(bits(&ledger), before);

        let attempt = attempt_reroute(&mut ledger, route, |_| None).unwrap();
        assert_eq!(attempt, Attempt::NoCandidate);
        assert_eq!(bits(&ledger), before);
    }

    #[test]
    fn test_can_carry_counts_repeated_elements() {
        let (state, _) = scenario();
        let ledger = CapacityLedger::from_state(&state);
        let once = link_path(&[LinkId(1)]);
        let twice = link_path(&[LinkId(1), LinkId(1)]);
        assert!(ledger.can_carry(&once, 10.0));
        assert!(ledger.can_carry(&twice, 5.0));
        assert!(!ledger.can_carry(&twice, 5.5));
    }

    #[test]
    fn test_released_attempt_does_not_credit_twice() {
        let (state, route) = scenario();
        let mut ledger = CapacityLedger::from_state(&state);
        let route = state.route(route).unwrap();
        ledger.credit_route(route).unwrap();
        assert_eq!(ledger.link_free(LinkId(0)), 10.0);

        let attempt = attempt_with(&mut ledger, route, Reservation::Released, |l| {
            assert_eq!(l.link_free(LinkId(0)), 10.0);
            None
        })
        .unwrap();
        assert_eq!(attempt, Attempt::NoCandidate);
        assert_eq!(ledger.link_free(LinkId(0)), 10.0);

        let attempt = attempt_with(&mut ledger, route, Reservation::Released, |_| {
            Some((link_path(&[LinkId(1), LinkId(2)]), 6.0))
        })
        .unwrap();
        assert!(attempt.is_committed());
        assert_eq!(ledger.link_free_capacity(), &[10.0, 4.0, 4.0]);
    }

    #[test]
    fn test_reserve_route_only_when_it_fits() {
        let (state, route) = scenario();
        let mut ledger = CapacityLedger::from_state(&state);
        let route = state.route(route).unwrap();
        ledger.credit_route(route).unwrap();

        assert!(ledger.reserve_route(route).unwrap());
        assert_eq!(ledger.link_free(LinkId(0)), 4.0);

        ledger.credit_route(route).unwrap();
        ledger.debit(&link_path(&[LinkId(0)]), 5.0).unwrap();
        let before = bits(&ledger);
        assert!(!ledger.reserve_route(route).unwrap());
        assert_eq!(bits(&ledger), before);
    }

    #[test]
    fn test_mismatch_names_first_differing_entry() {
        let (state, _) = scenario();
        let ledger = CapacityLedger::from_state(&state);
        assert_eq!(ledger.mismatch(&[4.0, 10.0, 10.0], &[], 1e-9), None);
        assert_eq!(
            ledger.mismatch(&[4.0, 9.0, 10.0], &[], 1e-9).as_deref(),
            Some("Link(1) has 10 free in the ledger, expected 9")
        );
        assert!(ledger.mismatch(&[4.0, 10.0], &[], 1e-9).is_some());
    }

    #[test]
    fn test_nested_checkpoints() {
        let (state, _) = scenario();
        let mut ledger = CapacityLedger::from_state(&state);
        let outer = ledger.checkpoint();
        ledger.debit(&link_path(&[LinkId(1)]), 1.0).unwrap();
        let inner = ledger.checkpoint();
        ledger.debit(&link_path(&[LinkId(2)]), 1.0).unwrap();
        ledger.rollback(inner);
        assert_eq!(ledger.link_free_capacity(), &[4.0, 9.0, 10.0]);
        ledger.rollback(outer);
        assert_eq!(ledger.link_free_capacity(), &[4.0, 10.0, 10.0]);
    }
}
