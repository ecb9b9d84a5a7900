//! Link-State engine (§4.4): LSA origination, controlled flooding with
//! duplicate suppression, topology assembly, and local Dijkstra.

use std::collections::BTreeMap;

use crate::engine::dijkstra;
use crate::model::neighbor::NeighborTable;
use crate::model::received::ReceivedLsaSet;
use crate::model::routing::RoutingTable;
use crate::model::topology::TopologyDb;

pub struct LsEngine {
    local_port: u16,
    neighbors: NeighborTable,
    topology: TopologyDb,
    received: ReceivedLsaSet,
    routing: RoutingTable,
    /// Every LSA this node itself has ever originated gets a fresh,
    /// strictly increasing sequence number.
    next_seq: f64,
    /// The `last` node seeds the flood; everyone else floods their own
    /// LSA exactly once, on first receipt of someone else's (§4.4).
    has_flooded_own: bool,
    /// Whether the first Dijkstra run (delayed one routing interval per
    /// §4.4) has happened yet; until then topology changes don't trigger
    /// a recompute.
    has_computed_routes: bool,
}

pub struct LsaOutcome {
    pub duplicate: bool,
    pub topology_changed: bool,
    /// True only when this call actually re-ran Dijkstra (topology changed
    /// AND a first computation had already happened), distinct from
    /// `topology_changed` so callers know whether a routing-table print is
    /// also due alongside the topology print.
    pub routes_recomputed: bool,
    /// True the first time this node has ever seen *any* LSA — the
    /// trigger for it to flood its own LSA for the first time.
    pub should_originate_first_lsa: bool,
}

impl LsEngine {
    pub fn new(local_port: u16, neighbors: NeighborTable) -> Self {
        Self {
            local_port,
            neighbors,
            topology: TopologyDb::default(),
            received: ReceivedLsaSet::default(),
            routing: RoutingTable::default(),
            next_seq: 0.0,
            has_flooded_own: false,
            has_computed_routes: false,
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn topology(&self) -> &TopologyDb {
        &self.topology
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    pub fn has_flooded_own(&self) -> bool {
        self.has_flooded_own
    }

    pub fn has_computed_routes(&self) -> bool {
        self.has_computed_routes
    }

    /// Builds this node's own LSA (neighbor-cost map + a fresh sequence
    /// number) and marks it as already seen, so a reflected copy of our own
    /// flood is dropped as a duplicate rather than reprocessed.
    pub fn originate_lsa(&mut self, now: f64) -> (u16, BTreeMap<u16, u32>, f64) {
        let seq = now.max(self.next_seq);
        self.next_seq = seq + f64::EPSILON.max(0.000_001);
        self.received.insert(self.local_port, seq);
        self.has_flooded_own = true;
        let neighbors = self.neighbors.iter().collect();
        (self.local_port, neighbors, seq)
    }

    /// §4.4 flooding and duplicate-suppression logic.
    pub fn receive_lsa(
        &mut self,
        origin: u16,
        neighbors: BTreeMap<u16, u32>,
        seq: f64,
    ) -> LsaOutcome {
        if self.received.contains(origin, seq) {
            return LsaOutcome {
                duplicate: true,
                topology_changed: false,
                routes_recomputed: false,
                should_originate_first_lsa: false,
            };
        }
        self.received.insert(origin, seq);

        let should_originate_first_lsa = !self.has_flooded_own;
        let topology_changed = self.topology.apply_lsa(origin, &neighbors);

        let routes_recomputed = topology_changed && self.has_computed_routes;
        if routes_recomputed {
            self.recompute();
        }

        LsaOutcome {
            duplicate: false,
            topology_changed,
            routes_recomputed,
            should_originate_first_lsa,
        }
    }

    pub fn recompute(&mut self) {
        self.routing = dijkstra::compute(&self.topology, &self.neighbors, self.local_port);
        self.has_computed_routes = true;
    }

    /// Cost change under LS (§4.4): update `N`, update the edge in `T`
    /// directly, and recompute. The caller is responsible for rebuilding
    /// and flooding a fresh LSA afterward.
    pub fn on_cost_change(&mut self, affected: u16, new_cost: u32) {
        self.neighbors.set(affected, new_cost);
        self.topology.set_edge(self.local_port, affected, new_cost);
        self.recompute();
    }
}
