//! Single-source shortest paths over the topology database (§4.4), grounded
//! on the daemon crate's simple min-scan SPF style rather than its
//! ECMP/incremental/LFA machinery (none of which this system needs: one
//! routing table, one source, recomputed from scratch on every topology
//! change).

use std::collections::{BTreeMap, BTreeSet};

use crate::model::neighbor::NeighborTable;
use crate::model::routing::RoutingTable;
use crate::model::topology::TopologyDb;

/// Computes `R` from `T` rooted at `local_port` (§4.4). Initial distances:
/// `R[d] = (N[d], d)` for every direct neighbor; every other port that
/// appears anywhere in `T` starts unreached. Ties during node selection are
/// broken by the lower port number, which falls out naturally here because
/// nodes are scanned in ascending order and the first minimum wins.
pub fn compute(topology: &TopologyDb, neighbors: &NeighborTable, local_port: u16) -> RoutingTable {
    let adjacency = topology.adjacency();

    let mut dist: BTreeMap<u16, u32> = BTreeMap::new();
    let mut first_hop: BTreeMap<u16, u16> = BTreeMap::new();

    for (n, cost) in neighbors.iter() {
        dist.insert(n, cost);
        first_hop.insert(n, n);
    }

    let mut unvisited: BTreeSet<u16> = adjacency
        .keys()
        .copied()
        .chain(neighbors.ports())
        .filter(|&p| p != local_port)
        .collect();

    while let Some(&min_node) = unvisited
        .iter()
        .filter(|p| dist.contains_key(p))
        .min_by_key(|p| dist[p])
    {
        unvisited.remove(&min_node);
        let min_cost = dist[&min_node];
        let hop = first_hop[&min_node];

        if let Some(edges) = adjacency.get(&min_node) {
            for &(neighbor, cost) in edges {
                if neighbor == local_port || !unvisited.contains(&neighbor) {
                    continue;
                }
                let alt = min_cost + cost;
                let better = dist.get(&neighbor).map_or(true, |&cur| alt < cur);
                if better {
                    dist.insert(neighbor, alt);
                    first_hop.insert(neighbor, hop);
                }
            }
        }
    }

    let mut routing = RoutingTable::default();
    for (&dest, &cost) in &dist {
        if dest == local_port {
            continue;
        }
        if let Some(&hop) = first_hop.get(&dest) {
            routing.set(dest, cost, hop);
        }
    }
    routing
}
