use std::collections::BTreeMap;

/// `N`: mapping from neighbor port to current link cost (§3). Keys are
/// exactly the nodes reachable by a direct one-hop link, fixed at launch
/// and mutated only by cost-change events (neighbor discovery is a
/// Non-goal).
#[derive(Debug, Default, Clone)]
pub struct NeighborTable {
    costs: BTreeMap<u16, u32>,
}

impl NeighborTable {
    pub fn new(pairs: impl IntoIterator<Item = (u16, u32)>) -> Self {
        Self {
            costs: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, port: u16) -> Option<u32> {
        self.costs.get(&port).copied()
    }

    pub fn contains(&self, port: u16) -> bool {
        self.costs.contains_key(&port)
    }

    pub fn set(&mut self, port: u16, cost: u32) {
        self.costs.insert(port, cost);
    }

    pub fn ports(&self) -> impl Iterator<Item = u16> + '_ {
        self.costs.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.costs.iter().map(|(&p, &c)| (p, c))
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.costs.is_empty()
    }

    /// The node that, per §4.2/§6.1, raises the cost of its link to its
    /// numerically highest neighbor port when `last` triggers a scheduled
    /// cost change.
    pub fn highest_port(&self) -> Option<u16> {
        self.costs.keys().copied().max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_port_picks_the_numeric_max() {
        let n = NeighborTable::new([(2001, 1), (2003, 1), (2002, 1)]);
        assert_eq!(n.highest_port(), Some(2003));
    }

    #[test]
    fn empty_table_has_no_highest_port() {
        assert_eq!(NeighborTable::default().highest_port(), None);
    }
}
