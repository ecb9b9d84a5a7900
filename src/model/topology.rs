use std::collections::BTreeMap;

/// `T` (LS only): undirected weighted graph over every port observed in any
/// received LSA, keyed canonically with the smaller port first (§3).
#[derive(Debug, Default, Clone)]
pub struct TopologyDb {
    edges: BTreeMap<(u16, u16), u32>,
}

impl TopologyDb {
    fn canon(a: u16, b: u16) -> (u16, u16) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Applies every edge `(origin, n)` asserted by an LSA's neighbor map.
    /// Returns whether anything in `T` actually changed.
    pub fn apply_lsa(&mut self, origin: u16, neighbors: &BTreeMap<u16, u32>) -> bool {
        let mut changed = false;
        for (&n, &cost) in neighbors {
            if self.set_edge(origin, n, cost) {
                changed = true;
            }
        }
        changed
    }

    pub fn set_edge(&mut self, a: u16, b: u16, cost: u32) -> bool {
        let key = Self::canon(a, b);
        if self.edges.get(&key) == Some(&cost) {
            return false;
        }
        self.edges.insert(key, cost);
        true
    }

    /// Adjacency view for Dijkstra, built fresh from the edge set (small
    /// graphs, no incremental bookkeeping needed).
    pub fn adjacency(&self) -> BTreeMap<u16, Vec<(u16, u32)>> {
        let mut adj: BTreeMap<u16, Vec<(u16, u32)>> = BTreeMap::new();
        for (&(u, v), &cost) in &self.edges {
            adj.entry(u).or_default().push((v, cost));
            adj.entry(v).or_default().push((u, cost));
        }
        adj
    }

    /// `[<ts>] Node <self> Network Topology` body (§6.3), sorted by `(u, v)`.
    pub fn render(&self) -> Vec<String> {
        self.edges
            .iter()
            .map(|(&(u, v), &cost)| format!("- ({cost}) from Node {u} to Node {v}"))
            .collect()
    }
}
