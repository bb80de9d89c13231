//! Fixture builders.
//!
//! Link capacities, lengths and volumes are chosen so that each fixture has
//! exactly one interesting outcome for the recovery strategies.

use crate::Fixture;
use resilience_types::{link_path, NetworkState, NodeId};
use std::collections::BTreeSet;

fn nodes(state: &mut NetworkState, names: &[&str]) -> Vec<NodeId> {
    names
        .iter()
        .map(|name| state.add_node(*name).expect("fresh state accepts nodes"))
        .collect()
}

/// One SRG per link, containing only that link.
fn srg_per_link(state: &mut NetworkState, mttf: f64, mttr: f64) {
    let links: Vec<_> = state.links().map(|l| l.id).collect();
    for link in links {
        state
            .add_srg(mttf, mttr, BTreeSet::new(), [link].into_iter().collect())
            .expect("valid SRG");
    }
}

/// Link `e = a -> b` (capacity 10) carries route `R` (volume 6) alone.
///
/// With `alternate`, `a -> c -> b` (capacity 10 each) offers a detour;
/// without it, failing `e` isolates `a`.
///
/// ```text
///        e (10)
///   a ─────────▶ b
///    ╲         ▲
///     ╲ (10)  ╱ (10)      only with `alternate`
///      ▼     ╱
///        c
/// ```
pub fn scenario_b(alternate: bool) -> Fixture {
    let mut state = NetworkState::new();
    let n = nodes(&mut state, &["a", "b", "c"]);
    let e = state.add_link(n[0], n[1], 10.0, 100.0).expect("valid link");
    if alternate {
        state.add_link(n[0], n[2], 10.0, 80.0).expect("valid link");
        state.add_link(n[2], n[1], 10.0, 80.0).expect("valid link");
    }
    let demand = state.add_demand(n[0], n[1], 6.0).expect("valid demand");
    state
        .add_route(demand, link_path(&[e]), 6.0, 0)
        .expect("valid route");
    srg_per_link(&mut state, 1000.0, 10.0);
    Fixture::new(state)
}

/// Two routes share `a -> b` (capacity 10, 5 each); the detour
/// `a -> c -> b` has room for only one of them (capacity 6).
///
/// Route 0 has priority 1, route 1 priority 9.
pub fn priority_diamond() -> Fixture {
    let mut state = NetworkState::new();
    let n = nodes(&mut state, &["a", "b", "c"]);
    let ab = state.add_link(n[0], n[1], 10.0, 10.0).expect("valid link");
    state.add_link(n[0], n[2], 6.0, 10.0).expect("valid link");
    state.add_link(n[2], n[1], 6.0, 10.0).expect("valid link");
    let demand = state.add_demand(n[0], n[1], 10.0).expect("valid demand");
    state
        .add_route(demand, link_path(&[ab]), 5.0, 1)
        .expect("valid route");
    state
        .add_route(demand, link_path(&[ab]), 5.0, 9)
        .expect("valid route");
    srg_per_link(&mut state, 1000.0, 10.0);
    Fixture::new(state)
}

/// Two routes hit by one SRG compete for the capacity one of them frees.
///
/// Route 0 (priority 0) runs `a -> b -> c`, route 1 (priority 10) runs
/// `d -> c`, both at volume 6 over links of capacity 10. SRG 0 holds
/// `a -> b` and `d -> c`. The only detour for route 1 is `d -> b -> c`,
/// which fits only once route 0 gives up `b -> c`. With `low_alternate`,
/// route 0 can move to `a -> c`; without it, route 0 has no detour.
///
/// ```text
///   a ───▶ b ◀─── d
///    ╲     │     ╱
///     ╲    ▼    ╱
///      ──▶ c ◀──        a -> c only with `low_alternate`
/// ```
pub fn freed_capacity_contest(low_alternate: bool) -> Fixture {
    let mut state = NetworkState::new();
    let n = nodes(&mut state, &["a", "b", "c", "d"]);
    let ab = state.add_link(n[0], n[1], 10.0, 10.0).expect("valid link");
    let bc = state.add_link(n[1], n[2], 10.0, 10.0).expect("valid link");
    let dc = state.add_link(n[3], n[2], 10.0, 10.0).expect("valid link");
    state.add_link(n[3], n[1], 10.0, 10.0).expect("valid link");
    if low_alternate {
        state.add_link(n[0], n[2], 10.0, 30.0).expect("valid link");
    }
    state
        .add_srg(1000.0, 10.0, BTreeSet::new(), [ab, dc].into_iter().collect())
        .expect("valid SRG");

    let low = state.add_demand(n[0], n[2], 6.0).expect("valid demand");
    state
        .add_route(low, link_path(&[ab, bc]), 6.0, 0)
        .expect("valid route");
    let high = state.add_demand(n[3], n[2], 6.0).expect("valid demand");
    state
        .add_route(high, link_path(&[dc]), 6.0, 10)
        .expect("valid route");
    Fixture::new(state)
}

/// Route `a -> b -> c -> d` (volume 4) with a local detour `b -> x -> c`
/// around `b -> c` and a short end-to-end alternative `a -> y -> d`.
///
/// By hop count, end-to-end restoration picks `a -> y -> d` while local
/// repair keeps `a -> b` and `c -> d`.
pub fn local_repair_chain() -> Fixture {
    let mut state = NetworkState::new();
    let n = nodes(&mut state, &["a", "b", "c", "d", "x", "y"]);
    let ab = state.add_link(n[0], n[1], 10.0, 10.0).expect("valid link");
    let bc = state.add_link(n[1], n[2], 10.0, 10.0).expect("valid link");
    let cd = state.add_link(n[2], n[3], 10.0, 10.0).expect("valid link");
    state.add_link(n[1], n[4], 10.0, 10.0).expect("valid link");
    state.add_link(n[4], n[2], 10.0, 10.0).expect("valid link");
    state.add_link(n[0], n[5], 10.0, 50.0).expect("valid link");
    state.add_link(n[5], n[3], 10.0, 50.0).expect("valid link");
    let demand = state.add_demand(n[0], n[3], 4.0).expect("valid demand");
    state
        .add_route(demand, link_path(&[ab, bc, cd]), 4.0, 0)
        .expect("valid route");
    srg_per_link(&mut state, 1000.0, 10.0);
    Fixture::new(state)
}

/// Route `a -> b -> c` (volume 5) protected by segment `a -> d -> c`
/// (reserved 6).
///
/// Outside the reservation, `a -> d` and `d -> c` keep only 4 units free, so
/// the route fits around a failure of `a -> b` only on the segment.
pub fn protected_pair() -> Fixture {
    let mut state = NetworkState::new();
    let n = nodes(&mut state, &["a", "b", "c", "d"]);
    let ab = state.add_link(n[0], n[1], 10.0, 10.0).expect("valid link");
    let bc = state.add_link(n[1], n[2], 10.0, 10.0).expect("valid link");
    let ad = state.add_link(n[0], n[3], 10.0, 10.0).expect("valid link");
    let dc = state.add_link(n[3], n[2], 10.0, 10.0).expect("valid link");
    let segment = state.add_segment(vec![ad, dc], 6.0).expect("valid segment");
    let demand = state.add_demand(n[0], n[2], 5.0).expect("valid demand");
    let route = state
        .add_route(demand, link_path(&[ab, bc]), 5.0, 0)
        .expect("valid route");
    state
        .set_route_backup_segments(route, vec![segment])
        .expect("known segment");
    srg_per_link(&mut state, 1000.0, 10.0);
    Fixture::new(state)
}

/// Bidirectional ring `n0 .. n{size-1}` with one SRG per fiber (both
/// directions) and one per node. Node `i` sends `volume` to node
/// `i + size / 2` clockwise, for every `i < size / 2`.
pub fn ring(size: usize, capacity: f64, length_km: f64, volume: f64) -> Fixture {
    let mut state = NetworkState::new();
    let names: Vec<String> = (0..size).map(|i| format!("n{i}")).collect();
    let name_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let n = nodes(&mut state, &name_refs);

    let mut clockwise = Vec::with_capacity(size);
    for i in 0..size {
        let (forward, backward) = state
            .add_link_pair(n[i], n[(i + 1) % size], capacity, length_km)
            .expect("valid link pair");
        clockwise.push(forward);
        state
            .add_srg(
                2000.0,
                12.0,
                BTreeSet::new(),
                [forward, backward].into_iter().collect(),
            )
            .expect("valid SRG");
    }
    for &node in &n {
        state
            .add_srg(20000.0, 4.0, [node].into_iter().collect(), BTreeSet::new())
            .expect("valid SRG");
    }

    let half = size / 2;
    for i in 0..half {
        let demand = state
            .add_demand(n[i], n[i + half], volume)
            .expect("valid demand");
        let path: Vec<_> = (i..i + half).map(|k| clockwise[k % size]).collect();
        state
            .add_route(demand, link_path(&path), volume, 0)
            .expect("valid route");
    }
    Fixture::new(state)
}
