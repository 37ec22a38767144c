//! Routing information base computation.
//!
//! For every known destination router the RIB keeps the two lowest-cost
//! next hops, ties broken by router name. Cost arithmetic saturates at
//! the configured infinity; a cost at or above infinity is unreachable
//! and never installed.

use crate::advert::{Advertisement, AdvertEntry};
use crate::neighbors::NeighborState;
use rust_ndn_common::name::Name;
use std::collections::HashMap;

/// The per-hop link cost added when learning a route from a neighbor.
const LINK_COST: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextHop {
    /// The neighbor router this route goes through.
    pub via: Name,
    pub cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RibEntry {
    pub destination: Name,
    pub lowest: NextHop,
    pub second: Option<NextHop>,
}

/// The computed routing view.
#[derive(Debug, Clone, Default)]
pub struct Rib {
    entries: HashMap<u64, RibEntry>,
}

impl Rib {
    /// Recomputes the RIB from every live neighbor's advertisement.
    pub fn compute<'a>(
        local: &Name,
        neighbors: impl Iterator<Item = &'a NeighborState>,
        infinity: u64,
    ) -> Rib {
        let mut rib = Rib::default();
        rib.offer(
            local.clone(),
            NextHop {
                via: local.clone(),
                cost: 0,
            },
        );
        for neighbor in neighbors {
            rib.offer(
                neighbor.name.clone(),
                NextHop {
                    via: neighbor.name.clone(),
                    cost: LINK_COST,
                },
            );
            let Some(advert) = &neighbor.latest_advert else {
                continue;
            };
            for entry in &advert.entries {
                // Split horizon: a route through us is no route.
                if entry.next_hop == *local || entry.destination == *local {
                    continue;
                }
                let cost = entry.cost.saturating_add(LINK_COST).min(infinity);
                if cost >= infinity {
                    continue;
                }
                rib.offer(
                    entry.destination.clone(),
                    NextHop {
                        via: neighbor.name.clone(),
                        cost,
                    },
                );
            }
        }
        rib
    }

    fn offer(&mut self, destination: Name, hop: NextHop) {
        let key = destination.hash_u64();
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(
                    key,
                    RibEntry {
                        destination,
                        lowest: hop,
                        second: None,
                    },
                );
            }
            Some(entry) => {
                // One slot per via-neighbor: keep the better offer.
                if entry.lowest.via == hop.via {
                    if hop.cost < entry.lowest.cost {
                        entry.lowest = hop;
                        entry.normalize();
                    }
                    return;
                }
                if let Some(second) = &entry.second {
                    if second.via == hop.via {
                        if hop.cost < second.cost {
                            entry.second = Some(hop);
                            entry.normalize();
                        }
                        return;
                    }
                }
                if Self::better(&hop, &entry.lowest) {
                    entry.second = Some(std::mem::replace(&mut entry.lowest, hop));
                } else if entry
                    .second
                    .as_ref()
                    .is_none_or(|second| Self::better(&hop, second))
                {
                    entry.second = Some(hop);
                }
            }
        }
    }

    // Lower cost wins; ties break toward the lesser router name.
    fn better(a: &NextHop, b: &NextHop) -> bool {
        a.cost < b.cost || (a.cost == b.cost && a.via < b.via)
    }

    pub fn get(&self, destination: &Name) -> Option<&RibEntry> {
        self.entries.get(&destination.hash_u64())
    }

    pub fn iter(&self) -> impl Iterator<Item = &RibEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The advertisement this router should publish: every reachable
    /// destination with its chosen next hop.
    pub fn to_advertisement(&self) -> Advertisement {
        let mut entries: Vec<AdvertEntry> = self
            .entries
            .values()
            .map(|e| AdvertEntry {
                destination: e.destination.clone(),
                next_hop: e.lowest.via.clone(),
                cost: e.lowest.cost,
            })
            .collect();
        entries.sort_by(|a, b| a.destination.canonical_cmp(&b.destination));
        Advertisement { entries }
    }
}

impl RibEntry {
    fn normalize(&mut self) {
        if let Some(second) = &self.second {
            if Rib::better(second, &self.lowest) {
                let second = self.second.take().expect("second checked above");
                self.second = Some(std::mem::replace(&mut self.lowest, second));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbors::NeighborTable;

    const INF: u64 = 16;

    fn n(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    fn neighbor_with_advert(
        table: &mut NeighborTable,
        name: &Name,
        entries: Vec<AdvertEntry>,
    ) {
        table.on_sync(name, 1, 1, Some(1), false);
        table.store_advert(name, 1, 1, Advertisement { entries });
    }

    fn entry(dest: &str, via: &str, cost: u64) -> AdvertEntry {
        AdvertEntry {
            destination: n(dest),
            next_hop: n(via),
            cost,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn chain_topology_costs() {
        // a - b - c, computed at b.
        let mut table = NeighborTable::new();
        neighbor_with_advert(
            &mut table,
            &n("/net/a"),
            vec![entry("/net/a", "/net/a", 0)],
        );
        neighbor_with_advert(
            &mut table,
            &n("/net/c"),
            vec![entry("/net/c", "/net/c", 0)],
        );
        let rib = Rib::compute(&n("/net/b"), table.iter(), INF);
        assert_eq!(rib.get(&n("/net/a")).unwrap().lowest.cost, 1);
        assert_eq!(rib.get(&n("/net/c")).unwrap().lowest.cost, 1);
        assert_eq!(rib.get(&n("/net/b")).unwrap().lowest.cost, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn two_lowest_next_hops_with_tie_break() {
        // d reachable through b (cost 2) and c (cost 2): tie broken by
        // router name, b first.
        let mut table = NeighborTable::new();
        neighbor_with_advert(
            &mut table,
            &n("/net/c"),
            vec![entry("/net/d", "/net/d", 1)],
        );
        neighbor_with_advert(
            &mut table,
            &n("/net/b"),
            vec![entry("/net/d", "/net/d", 1)],
        );
        let rib = Rib::compute(&n("/net/a"), table.iter(), INF);
        let d = rib.get(&n("/net/d")).unwrap();
        assert_eq!(d.lowest, NextHop { via: n("/net/b"), cost: 2 });
        assert_eq!(d.second, Some(NextHop { via: n("/net/c"), cost: 2 }));
    }

    #[tokio::test(start_paused = true)]
    async fn split_horizon_ignores_routes_through_self() {
        let mut table = NeighborTable::new();
        neighbor_with_advert(
            &mut table,
            &n("/net/b"),
            vec![entry("/net/d", "/net/a", 5)],
        );
        let rib = Rib::compute(&n("/net/a"), table.iter(), INF);
        assert!(rib.get(&n("/net/d")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn infinity_is_never_installed() {
        let mut table = NeighborTable::new();
        neighbor_with_advert(
            &mut table,
            &n("/net/b"),
            vec![
                entry("/net/far", "/net/x", INF - 1), // saturates to INF
                entry("/net/near", "/net/x", INF - 2),
            ],
        );
        let rib = Rib::compute(&n("/net/a"), table.iter(), INF);
        assert!(rib.get(&n("/net/far")).is_none());
        assert_eq!(rib.get(&n("/net/near")).unwrap().lowest.cost, INF - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn advertisement_reflects_rib() {
        let mut table = NeighborTable::new();
        neighbor_with_advert(
            &mut table,
            &n("/net/b"),
            vec![entry("/net/c", "/net/c", 1)],
        );
        let rib = Rib::compute(&n("/net/a"), table.iter(), INF);
        let advert = rib.to_advertisement();
        assert_eq!(advert.entries.len(), 3); // self, b, c
        let c = advert
            .entries
            .iter()
            .find(|e| e.destination == n("/net/c"))
            .unwrap();
        assert_eq!(c.next_hop, n("/net/b"));
        assert_eq!(c.cost, 2);
    }
}
