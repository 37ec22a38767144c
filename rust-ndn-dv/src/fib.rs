//! The derived forwarding table and its reconciliation with the
//! forwarder.
//!
//! After each RIB recomputation the new routes are merged in with
//! previous costs remembered; the diff becomes rib/register and
//! rib/unregister commands. A mark-and-sweep pass removes names that no
//! longer have any route.

use rust_ndn_common::name::Name;
use std::collections::HashMap;

/// A management command the forwarder must see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FibCmd {
    Register { name: Name, face_id: u64, cost: u64 },
    Unregister { name: Name, face_id: u64 },
}

#[derive(Debug, Clone)]
struct FibNextHop {
    face_id: u64,
    cost: u64,
    prev_cost: u64,
}

#[derive(Debug, Clone)]
struct FibEntry {
    name: Name,
    nexthops: Vec<FibNextHop>,
    marked: bool,
}

/// The forwarding view keyed by name hash.
#[derive(Debug, Default)]
pub struct Fib {
    entries: HashMap<u64, FibEntry>,
    infinity: u64,
}

impl Fib {
    pub fn new(infinity: u64) -> Self {
        Self {
            entries: HashMap::new(),
            infinity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a full set of routes `(name, face, cost)` and returns the
    /// commands that reconcile the forwarder.
    pub fn update(&mut self, routes: &[(Name, u64, u64)]) -> Vec<FibCmd> {
        self.unmark_all();
        for (name, face_id, cost) in routes {
            if *cost >= self.infinity {
                continue;
            }
            self.merge(name, *face_id, *cost);
        }
        let mut cmds = Vec::new();
        let infinity = self.infinity;
        for entry in self.entries.values_mut() {
            entry.nexthops.retain(|hop| {
                if hop.cost >= infinity {
                    if hop.prev_cost < infinity {
                        cmds.push(FibCmd::Unregister {
                            name: entry.name.clone(),
                            face_id: hop.face_id,
                        });
                    }
                    false
                } else {
                    if hop.cost != hop.prev_cost {
                        cmds.push(FibCmd::Register {
                            name: entry.name.clone(),
                            face_id: hop.face_id,
                            cost: hop.cost,
                        });
                    }
                    true
                }
            });
        }
        self.remove_unmarked();
        cmds
    }

    // Remember each hop's cost and reset it to infinity; the merge pass
    // restores whatever is still routed.
    fn unmark_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.marked = false;
            for hop in &mut entry.nexthops {
                hop.prev_cost = hop.cost;
                hop.cost = self.infinity;
            }
        }
    }

    fn merge(&mut self, name: &Name, face_id: u64, cost: u64) {
        let infinity = self.infinity;
        let entry = self
            .entries
            .entry(name.hash_u64())
            .or_insert_with(|| FibEntry {
                name: name.clone(),
                nexthops: Vec::new(),
                marked: false,
            });
        entry.marked = true;
        match entry.nexthops.iter_mut().find(|h| h.face_id == face_id) {
            Some(hop) => hop.cost = hop.cost.min(cost),
            None => entry.nexthops.push(FibNextHop {
                face_id,
                cost,
                prev_cost: infinity,
            }),
        }
    }

    fn remove_unmarked(&mut self) {
        self.entries
            .retain(|_, entry| entry.marked && !entry.nexthops.is_empty());
    }

    /// Commands that would tear down everything currently installed.
    pub fn teardown(&self) -> Vec<FibCmd> {
        let mut cmds = Vec::new();
        for entry in self.entries.values() {
            for hop in &entry.nexthops {
                cmds.push(FibCmd::Unregister {
                    name: entry.name.clone(),
                    face_id: hop.face_id,
                });
            }
        }
        cmds
    }
}
