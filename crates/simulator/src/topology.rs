//! Topology and traffic generation.

use crate::config::{TopologyConfig, TopologyKind};
use crate::error::SimulatorError;
use resilience_recovery::{shortest_path, WAVELENGTHS_ATTRIBUTE};
use resilience_types::{link_path, NetworkState, NodeId};
use std::collections::BTreeSet;
use tracing::debug;

/// Build the network described by `config`.
///
/// Every link and every node gets its own SRG. Every ordered pair of nodes
/// gets a demand, carried in full by one route on the shortest path by
/// length.
pub fn generate(config: &TopologyConfig) -> Result<NetworkState, SimulatorError> {
    let mut state = NetworkState::new();
    match config.kind {
        TopologyKind::Ring => ring(&mut state, config)?,
        TopologyKind::Grid => grid(&mut state, config)?,
    }

    if let Some(wavelengths) = config.wavelengths {
        let links: Vec<_> = state.links().map(|l| l.id).collect();
        for link in links {
            state.set_link_attribute(link, WAVELENGTHS_ATTRIBUTE, wavelengths.to_string())?;
        }
    }

    add_srgs(&mut state, config)?;
    add_full_mesh(&mut state, config.volume)?;
    check_load(&state)?;

    debug!(
        kind = ?config.kind,
        nodes = state.num_nodes(),
        links = state.num_links(),
        demands = state.num_demands(),
        srgs = state.num_srgs(),
        "Topology generated"
    );
    Ok(state)
}

fn ring(state: &mut NetworkState, config: &TopologyConfig) -> Result<(), SimulatorError> {
    let size = config.nodes;
    if size < 2 {
        return Err(SimulatorError::Topology(format!(
            "a ring needs at least 2 nodes, got {size}"
        )));
    }
    let nodes = (0..size)
        .map(|i| state.add_node(format!("n{i}")))
        .collect::<Result<Vec<_>, _>>()?;
    // A ring of two is a single fiber.
    let fibers = if size == 2 { 1 } else { size };
    for i in 0..fibers {
        state.add_link_pair(
            nodes[i],
            nodes[(i + 1) % size],
            config.capacity,
            config.length_km,
        )?;
    }
    Ok(())
}

fn grid(state: &mut NetworkState, config: &TopologyConfig) -> Result<(), SimulatorError> {
    let (rows, cols) = (config.rows, config.cols);
    if rows == 0 || cols == 0 || rows * cols < 2 {
        return Err(SimulatorError::Topology(format!(
            "a grid needs at least 2 nodes, got {rows}x{cols}"
        )));
    }
    let mut nodes: Vec<NodeId> = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            nodes.push(state.add_node(format!("r{r}c{c}"))?);
        }
    }
    let at = |r: usize, c: usize| nodes[r * cols + c];
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                state.add_link_pair(at(r, c), at(r, c + 1), config.capacity, config.length_km)?;
            }
            if r + 1 < rows {
                state.add_link_pair(at(r, c), at(r + 1, c), config.capacity, config.length_km)?;
            }
        }
    }
    Ok(())
}

fn add_srgs(state: &mut NetworkState, config: &TopologyConfig) -> Result<(), SimulatorError> {
    let links: Vec<_> = state.links().map(|l| l.id).collect();
    for link in links {
        state.add_srg(
            config.link_mttf,
            config.link_mttr,
            BTreeSet::new(),
            [link].into_iter().collect(),
        )?;
    }
    let nodes: Vec<_> = state.nodes().map(|n| n.id).collect();
    for node in nodes {
        state.add_srg(
            config.node_mttf,
            config.node_mttr,
            [node].into_iter().collect(),
            BTreeSet::new(),
        )?;
    }
    Ok(())
}

fn add_full_mesh(state: &mut NetworkState, volume: f64) -> Result<(), SimulatorError> {
    let nodes: Vec<_> = state.nodes().map(|n| n.id).collect();
    for &ingress in &nodes {
        for &egress in &nodes {
            if ingress == egress {
                continue;
            }
            let path = shortest_path(state, ingress, egress, |link| Some(link.length_km))
                .ok_or_else(|| {
                    SimulatorError::Topology(format!("no path from {ingress} to {egress}"))
                })?;
            let demand = state.add_demand(ingress, egress, volume)?;
            state.add_route(demand, link_path(&path), volume, 0)?;
        }
    }
    Ok(())
}

/// The generated routes must fit the uniform link capacity.
fn check_load(state: &NetworkState) -> Result<(), SimulatorError> {
    for link in state.links() {
        let load = state.link_occupied_capacity(link.id);
        if load > link.capacity {
            return Err(SimulatorError::Topology(format!(
                "link {} carries {load} on its shortest paths, above its capacity {}",
                link.id, link.capacity
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_types::ValidityOptions;

    #[test]
    fn test_ring_shape() {
        let config = TopologyConfig {
            nodes: 5,
            ..Default::default()
        };
        let state = generate(&config).unwrap();
        assert_eq!(state.num_nodes(), 5);
        assert_eq!(state.num_links(), 10);
        assert_eq!(state.num_demands(), 20);
        assert_eq!(state.num_routes(), 20);
        assert_eq!(state.num_srgs(), 15);
        assert!(state.check_validity(&ValidityOptions::default()).is_ok());

        // Neighbours are one hop apart.
        let route = state.routes().next().unwrap();
        assert_eq!(route.path.len(), 1);
    }

    #[test]
    fn test_grid_shape() {
        let config = TopologyConfig {
            kind: TopologyKind::Grid,
            rows: 2,
            cols: 3,
            wavelengths: Some(8),
            ..Default::default()
        };
        let state = generate(&config).unwrap();
        assert_eq!(state.num_nodes(), 6);
        // 2 * 2 horizontal + 3 vertical fibers, both directions.
        assert_eq!(state.num_links(), 14);
        assert_eq!(state.num_demands(), 30);
        assert!(state
            .links()
            .all(|l| l.attribute_u32(WAVELENGTHS_ATTRIBUTE) == Some(8)));

        // Opposite corners are three hops apart.
        let far = state
            .routes()
            .map(|r| r.path.len())
            .max()
            .unwrap();
        assert_eq!(far, 3);
    }

    #[test]
    fn test_two_node_ring_has_one_fiber() {
        let config = TopologyConfig {
            nodes: 2,
            ..Default::default()
        };
        let state = generate(&config).unwrap();
        assert_eq!(state.num_links(), 2);
    }

    #[test]
    fn test_rejects_degenerate_or_overloaded() {
        let single = TopologyConfig {
            nodes: 1,
            ..Default::default()
        };
        assert!(matches!(
            generate(&single),
            Err(SimulatorError::Topology(_))
        ));

        let thin = TopologyConfig {
            capacity: 1.5,
            ..Default::default()
        };
        assert!(matches!(generate(&thin), Err(SimulatorError::Topology(_))));
    }
}
