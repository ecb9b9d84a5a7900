use std::collections::BTreeMap;

use crate::model::neighbor::NeighborTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub cost: u32,
    pub next_hop: u16,
}

/// `R`: mapping from destination port to `(cost, next-hop)` (§3), shared
/// structure between the DV and LS engines. Unreachable destinations are
/// never stored — §4.4 explicitly permits omitting them, which keeps one
/// representation usable by both engines (DV's `R` only ever holds
/// reachable destinations by construction).
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    entries: BTreeMap<u16, RouteEntry>,
}

impl RoutingTable {
    pub fn seeded_from_neighbors(neighbors: &NeighborTable) -> Self {
        let entries = neighbors
            .iter()
            .map(|(p, c)| (p, RouteEntry { cost: c, next_hop: p }))
            .collect();
        Self { entries }
    }

    pub fn get(&self, dest: u16) -> Option<RouteEntry> {
        self.entries.get(&dest).copied()
    }

    pub fn cost_to(&self, dest: u16) -> Option<u32> {
        self.entries.get(&dest).map(|e| e.cost)
    }

    pub fn set(&mut self, dest: u16, cost: u32, next_hop: u16) {
        self.entries.insert(dest, RouteEntry { cost, next_hop });
    }

    pub fn remove(&mut self, dest: u16) -> Option<RouteEntry> {
        self.entries.remove(&dest)
    }

    pub fn entries(&self) -> impl Iterator<Item = (u16, RouteEntry)> + '_ {
        self.entries.iter().map(|(&d, &e)| (d, e))
    }

    /// `[<ts>] Node <self> Routing Table` body (§6.3), one line per
    /// destination ascending by port.
    pub fn render(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(&dest, entry)| {
                if entry.next_hop == dest {
                    format!("- ({}) -> Node {}", entry.cost, dest)
                } else {
                    format!(
                        "- ({}) -> Node {}; Next hop -> Node {}",
                        entry.cost, dest, entry.next_hop
                    )
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_table_points_directly_at_each_neighbor() {
        let neighbors = NeighborTable::new([(2001, 1), (2002, 5)]);
        let table = RoutingTable::seeded_from_neighbors(&neighbors);
        assert_eq!(table.get(2001), Some(RouteEntry { cost: 1, next_hop: 2001 }));
        assert_eq!(table.get(2002), Some(RouteEntry { cost: 5, next_hop: 2002 }));
    }

    #[test]
    fn render_marks_indirect_routes_with_next_hop() {
        let mut table = RoutingTable::default();
        table.set(2001, 1, 2001);
        table.set(2002, 2, 2001);
        assert_eq!(
            table.render(),
            vec![
                "- (1) -> Node 2001".to_string(),
                "- (2) -> Node 2002; Next hop -> Node 2001".to_string(),
            ]
        );
    }
}
