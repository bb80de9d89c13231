//! Path computation over the usable topology.

use crate::ledger::CapacityLedger;
use resilience_core::ConfigurationError;
use resilience_types::{Link, LinkId, NetworkState, NodeId};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Link weight used by shortest-path searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkCost {
    #[default]
    Hops,
    Km,
}

impl LinkCost {
    /// Parse the `cost` strategy parameter.
    pub fn parse(value: &str) -> Result<Self, ConfigurationError> {
        match value {
            "hops" => Ok(LinkCost::Hops),
            "km" => Ok(LinkCost::Km),
            other => Err(ConfigurationError::invalid(
                "cost",
                format!("expected \"hops\" or \"km\", got {other:?}"),
            )),
        }
    }

    pub fn weight(self, link: &Link) -> f64 {
        match self {
            LinkCost::Hops => 1.0,
            LinkCost::Km => link.length_km,
        }
    }
}

/// Frontier entry of the label-setting searches.
#[derive(Debug, Clone, Copy)]
struct Label {
    /// Cost to minimize, or bottleneck to maximize (stored negated).
    key: f64,
    hops: usize,
    node: NodeId,
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse everything so the smallest key,
        // then fewest hops, then lowest node index pops first.
        other
            .key
            .total_cmp(&self.key)
            .then_with(|| other.hops.cmp(&self.hops))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

fn walk_back(
    state: &NetworkState,
    predecessor: &[Option<LinkId>],
    from: NodeId,
    to: NodeId,
) -> Option<Vec<LinkId>> {
    let mut path = Vec::new();
    let mut at = to;
    while at != from {
        let link = predecessor.get(at.index()).copied().flatten()?;
        path.push(link);
        at = state.link(link).ok()?.origin;
        if path.len() > predecessor.len() {
            return None;
        }
    }
    path.reverse();
    Some(path)
}

/// Dijkstra over usable links.
///
/// `weight` returns `None` to exclude a link; unusable links are always
/// excluded (infinite cost). Ties are broken by hop count, then node index,
/// so results are deterministic. Returns `None` when `to` is unreachable or
/// `from == to`.
pub fn shortest_path<F>(
    state: &NetworkState,
    from: NodeId,
    to: NodeId,
    weight: F,
) -> Option<Vec<LinkId>>
where
    F: Fn(&Link) -> Option<f64>,
{
    if from == to {
        return None;
    }
    let n = state.num_nodes();
    let mut cost = vec![f64::INFINITY; n];
    let mut hops = vec![usize::MAX; n];
    let mut predecessor: Vec<Option<LinkId>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut frontier = BinaryHeap::new();

    *cost.get_mut(from.index())? = 0.0;
    hops[from.index()] = 0;
    frontier.push(Label {
        key: 0.0,
        hops: 0,
        node: from,
    });

    while let Some(Label { key, hops: h, node }) = frontier.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;
        if node == to {
            break;
        }
        for link_id in state.outgoing_links(node) {
            if !state.is_link_usable(link_id) {
                continue;
            }
            let Ok(link) = state.link(link_id) else {
                continue;
            };
            let Some(w) = weight(link) else {
                continue;
            };
            if !w.is_finite() || w < 0.0 {
                continue;
            }
            let next = link.destination.index();
            let candidate = key + w;
            let better = candidate < cost[next]
                || (candidate == cost[next] && h + 1 < hops[next]);
            if !settled[next] && better {
                cost[next] = candidate;
                hops[next] = h + 1;
                predecessor[next] = Some(link_id);
                frontier.push(Label {
                    key: candidate,
                    hops: h + 1,
                    node: link.destination,
                });
            }
        }
    }

    if !settled.get(to.index()).copied().unwrap_or(false) {
        return None;
    }
    walk_back(state, &predecessor, from, to)
}

/// Shortest usable path whose every link has at least `volume` free capacity.
pub fn constrained_shortest_path(
    state: &NetworkState,
    ledger: &CapacityLedger,
    from: NodeId,
    to: NodeId,
    volume: f64,
    cost: LinkCost,
) -> Option<Vec<LinkId>> {
    let tolerance = ledger.tolerance();
    shortest_path(state, from, to, |link| {
        (ledger.link_free(link.id) + tolerance >= volume).then(|| cost.weight(link))
    })
}

/// Usable path maximizing the smallest free capacity along it.
///
/// Returns the path and its bottleneck; `None` when unreachable or when the
/// best bottleneck is not positive.
pub fn widest_path(
    state: &NetworkState,
    ledger: &CapacityLedger,
    from: NodeId,
    to: NodeId,
) -> Option<(Vec<LinkId>, f64)> {
    if from == to {
        return None;
    }
    let n = state.num_nodes();
    let mut width = vec![f64::NEG_INFINITY; n];
    let mut hops = vec![usize::MAX; n];
    let mut predecessor: Vec<Option<LinkId>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut frontier = BinaryHeap::new();

    *width.get_mut(from.index())? = f64::INFINITY;
    hops[from.index()] = 0;
    frontier.push(Label {
        key: f64::NEG_INFINITY,
        hops: 0,
        node: from,
    });

    while let Some(Label { hops: h, node, .. }) = frontier.pop() {
        if settled[node.index()] {
            continue;
        }
        settled[node.index()] = true;
        if node == to {
            break;
        }
        let here = width[node.index()];
        for link_id in state.outgoing_links(node) {
            if !state.is_link_usable(link_id) {
                continue;
            }
            let Ok(link) = state.link(link_id) else {
                continue;
            };
            let next = link.destination.index();
            let candidate = here.min(ledger.link_free(link_id));
            let better = candidate > width[next]
                || (candidate == width[next] && h + 1 < hops[next]);
            if !settled[next] && better {
                width[next] = candidate;
                hops[next] = h + 1;
                predecessor[next] = Some(link_id);
                frontier.push(Label {
                    key: -candidate,
                    hops: h + 1,
                    node: link.destination,
                });
            }
        }
    }

    let bottleneck = *width.get(to.index())?;
    if !settled[to.index()] || bottleneck <= ledger.tolerance() {
        return None;
    }
    walk_back(state, &predecessor, from, to).map(|path| (path, bottleneck))
}

/// Replace `links[plr..=last]` by `detour`.
///
/// `plr` is the index of the first link leaving the point of local repair,
/// `last` the index of the last link before the merge point.
pub fn splice(links: &[LinkId], plr: usize, last: usize, detour: &[LinkId]) -> Vec<LinkId> {
    let mut merged = Vec::with_capacity(links.len() + detour.len());
    merged.extend_from_slice(&links[..plr.min(links.len())]);
    merged.extend_from_slice(detour);
    if last + 1 < links.len() {
        merged.extend_from_slice(&links[last + 1..]);
    }
    merged
}

/// Largest volume a path can carry when each link's free capacity is shared
/// fairly among the traversals of that link.
pub fn fair_share_bottleneck(ledger: &CapacityLedger, links: &[LinkId]) -> f64 {
    let mut counts: Vec<(LinkId, usize)> = Vec::new();
    for &link in links {
        match counts.iter_mut().find(|(l, _)| *l == link) {
            Some((_, count)) => *count += 1,
            None => counts.push((link, 1)),
        }
    }
    counts
        .into_iter()
        .map(|(link, count)| ledger.link_free(link) / count as f64)
        .fold(f64::INFINITY, f64::min)
}
