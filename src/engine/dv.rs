//! Distance-Vector engine (§4.3): asynchronous Bellman-Ford relaxation on
//! incoming neighbor vectors, with optional split-horizon/poisoned-reverse
//! advertisement and a cost-change reaction driven by the "most recent
//! vectors" cache `M`.

use std::collections::BTreeMap;

use crate::codec::{AdvCost, DistanceVector};
use crate::model::neighbor::NeighborTable;
use crate::model::routing::RoutingTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Regular,
    Poisoned,
}

pub struct DvEngine {
    local_port: u16,
    mode: Mode,
    neighbors: NeighborTable,
    routing: RoutingTable,
    /// `M`: last vector received from each neighbor.
    most_recent: BTreeMap<u16, DistanceVector>,
    /// Whether any broadcast has ever been sent; the engine always
    /// broadcasts once even if the first relaxation changes nothing (§4.3).
    sent: bool,
}

impl DvEngine {
    pub fn new(local_port: u16, mode: Mode, neighbors: NeighborTable) -> Self {
        let routing = RoutingTable::seeded_from_neighbors(&neighbors);
        Self {
            local_port,
            mode,
            neighbors,
            routing,
            most_recent: BTreeMap::new(),
            sent: false,
        }
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// First-ever broadcast is always due once the engine starts (§4.2
    /// step 1 when `last` was supplied; otherwise the first received TAB
    /// still triggers it via [`Self::receive_tab`]'s `!self.sent` check).
    pub fn has_broadcast(&self) -> bool {
        self.sent
    }

    pub fn mark_broadcast(&mut self) {
        self.sent = true;
    }

    /// Applies the relaxation rule in §4.3 for every destination in `vector`.
    /// Returns whether `R` changed (and hence a rebroadcast + print are due).
    pub fn receive_tab(&mut self, sender: u16, vector: DistanceVector) -> bool {
        self.most_recent.insert(sender, vector.clone());

        let Some(c) = self.routing.cost_to(sender) else {
            // Sender isn't a known neighbor; §3 doesn't define this case,
            // there is nothing sound to relax against.
            return false;
        };

        let mut changed = false;
        for (&d, &(dest_cost, _next)) in vector.iter() {
            if d == self.local_port {
                continue;
            }
            let alt = dest_cost.as_finite().map(|v| c + v);
            changed |= self.relax(d, sender, alt);
        }

        if changed {
            self.sent = true;
        }
        changed
    }

    fn relax(&mut self, d: u16, sender: u16, alt: Option<u32>) -> bool {
        let direct = self.neighbors.get(d);

        match self.routing.get(d) {
            None => {
                if let Some(alt_v) = alt {
                    self.routing.set(d, alt_v, sender);
                    return true;
                }
                false
            }
            Some(current) => {
                let (dcost, dnext) = (current.cost, current.next_hop);

                if let Some(n_cost) = direct {
                    let n_beats_alt = match alt {
                        Some(v) => n_cost < v,
                        None => true,
                    };
                    if n_beats_alt && n_cost < dcost {
                        if (n_cost, d) != (dcost, dnext) {
                            self.routing.set(d, n_cost, d);
                            return true;
                        }
                        return false;
                    }
                }

                if let Some(alt_v) = alt {
                    if alt_v < dcost {
                        let via = self
                            .routing
                            .get(sender)
                            .map(|e| e.next_hop)
                            .unwrap_or(sender);
                        self.routing.set(d, alt_v, via);
                        return true;
                    }
                }

                if let Some(n_cost) = direct {
                    if dnext == sender {
                        let worsening = match alt {
                            Some(v) => v > dcost,
                            None => true,
                        };
                        if worsening {
                            match alt {
                                Some(v) if v < n_cost => {
                                    self.routing.set(d, v, sender);
                                    return true;
                                }
                                _ => {
                                    self.routing.set(d, n_cost, d);
                                    return true;
                                }
                            }
                        }
                    }
                }

                false
            }
        }
    }

    /// Builds the per-neighbor TAB frame, applying split-horizon with
    /// poisoned reverse when `mode == Poisoned` (§4.3).
    pub fn build_vector_for(&self, n: u16) -> DistanceVector {
        self.routing
            .entries()
            .map(|(d, entry)| {
                let wire_cost = if self.mode == Mode::Poisoned && entry.next_hop == n && d != n {
                    AdvCost::Infinite
                } else {
                    AdvCost::Finite(entry.cost)
                };
                (d, (wire_cost, entry.next_hop))
            })
            .collect()
    }

    /// Cost-change reaction (§4.3), shared by both the locally-originated
    /// event and a received COS. `originated_locally` is true only for the
    /// node raising its own highest-port link per §4.2/§6.1.
    pub fn on_cost_change(&mut self, affected: u16, new_cost: u32, originated_locally: bool) -> bool {
        self.neighbors.set(affected, new_cost);
        let mut changed = false;

        let direct_preferred = self
            .routing
            .get(affected)
            .map(|e| e.next_hop == affected)
            .unwrap_or(true);

        if direct_preferred {
            let best = self.best_alternative_via_others(affected, affected);
            let (cost, next_hop) = match best {
                Some((alt, via)) if alt < new_cost => (alt, via),
                _ => (new_cost, affected),
            };
            if self.routing.get(affected) != Some(crate::model::routing::RouteEntry {
                cost,
                next_hop,
            }) {
                self.routing.set(affected, cost, next_hop);
                changed = true;
            }
        }

        if originated_locally {
            let downstream: Vec<u16> = self
                .routing
                .entries()
                .filter(|&(d, e)| e.next_hop == affected && d != affected)
                .map(|(d, _)| d)
                .collect();

            for d in downstream {
                let Some(current) = self.routing.get(d) else {
                    continue;
                };
                if let Some((alt, via)) = self.best_alternative_via_others(affected, d) {
                    if alt < current.cost {
                        self.routing.set(d, alt, via);
                        changed = true;
                    }
                }
            }
        }

        if changed {
            self.sent = true;
        }
        changed
    }

    /// Scans `M` for any neighbor `p != exclude` whose last-advertised
    /// vector carries a finite cost to `destination`, combined with our own
    /// cost to `p`, picking the cheapest candidate.
    fn best_alternative_via_others(&self, exclude: u16, destination: u16) -> Option<(u32, u16)> {
        let mut best: Option<(u32, u16)> = None;
        for (&p, vector) in &self.most_recent {
            if p == exclude {
                continue;
            }
            let Some(&(cost_p_to_dest, _)) = vector.get(&destination) else {
                continue;
            };
            let Some(cost_p_to_dest) = cost_p_to_dest.as_finite() else {
                continue;
            };
            let Some(r_p_cost) = self.routing.cost_to(p) else {
                continue;
            };
            let alt = cost_p_to_dest + r_p_cost;
            if best.map_or(true, |(b, _)| alt < b) {
                best = Some((alt, p));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(local: u16, neighbors: impl IntoIterator<Item = (u16, u32)>) -> DvEngine {
        DvEngine::new(local, Mode::Regular, NeighborTable::new(neighbors))
    }

    #[test]
    fn seeds_routing_table_from_direct_neighbors() {
        let e = engine(2000, [(2001, 1), (2002, 1)]);
        assert_eq!(e.routing().cost_to(2001), Some(1));
        assert_eq!(e.routing().cost_to(2002), Some(1));
    }

    #[test]
    fn relaxes_through_a_cheaper_two_hop_path() {
        // 2000-2001 cost 1, 2001-2002 cost 1, no direct 2000-2002 link.
        let mut e = engine(2000, [(2001, 1)]);
        let mut v = DistanceVector::new();
        v.insert(2002, (AdvCost::Finite(1), 2002));
        let changed = e.receive_tab(2001, v);
        assert!(changed);
        let route = e.routing().get(2002).unwrap();
        assert_eq!(route.cost, 2);
        assert_eq!(route.next_hop, 2001);
    }

    #[test]
    fn direct_link_is_preferred_when_cheaper() {
        // 2000 has direct link to 2002 costing 1, but hears a worse path via 2001.
        let mut e = engine(2000, [(2001, 5), (2002, 1)]);
        let mut v = DistanceVector::new();
        v.insert(2002, (AdvCost::Finite(1), 2002));
        e.receive_tab(2001, v);
        let route = e.routing().get(2002).unwrap();
        assert_eq!(route, crate::model::routing::RouteEntry { cost: 1, next_hop: 2002 });
    }

    #[test]
    fn reprocessing_unchanged_vector_is_idempotent() {
        let mut e = engine(2000, [(2001, 1)]);
        let mut v = DistanceVector::new();
        v.insert(2002, (AdvCost::Finite(1), 2002));
        assert!(e.receive_tab(2001, v.clone()));
        assert!(!e.receive_tab(2001, v));
    }

    #[test]
    fn poisoned_reverse_advertises_infinity_for_routes_through_the_peer() {
        let mut e = engine(2001, [(2000, 1), (2002, 1)]);
        e.mode = Mode::Poisoned;
        // Learn a route to some destination 3000 via 2002.
        let mut v = DistanceVector::new();
        v.insert(3000, (AdvCost::Finite(1), 3000));
        e.receive_tab(2002, v);
        assert_eq!(e.routing().get(3000).unwrap().next_hop, 2002);

        let advert_to_2002 = e.build_vector_for(2002);
        assert_eq!(advert_to_2002.get(&3000).unwrap().0, AdvCost::Infinite);

        let advert_to_2000 = e.build_vector_for(2000);
        assert_eq!(advert_to_2000.get(&3000).unwrap().0, AdvCost::Finite(2));
    }

    #[test]
    fn cost_change_on_direct_link_falls_back_to_an_alternate_path() {
        // Triangle A=2000,B=2001,C=2002 with A-B=1, B-C=1, A-C=5.
        let mut a = engine(2000, [(2001, 1), (2002, 5)]);
        let mut v_from_c = DistanceVector::new();
        v_from_c.insert(2001, (AdvCost::Finite(1), 2001));
        a.receive_tab(2002, v_from_c);
        assert_eq!(a.routing().get(2001).unwrap().cost, 1);

        // A-B rises to 10; A should notice the via-C alternative (cost 1 + 5 = 6).
        let changed = a.on_cost_change(2001, 10, true);
        assert!(changed);
        let route = a.routing().get(2001).unwrap();
        assert_eq!(route.cost, 6);
        assert_eq!(route.next_hop, 2002);
    }
}
