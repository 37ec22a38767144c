//! Replicated application-prefix announcements.
//!
//! Each router owns a list of (prefix, cost) announcements. Changes are
//! expressed as an op list tagged with the exit router and replicated
//! through the prefix sync group; applying a remote list rewrites that
//! router's slice of the table and dirties the RIB.

use rust_ndn_common::codec::{
    read_tl, skip_unknown, tl_size, write_nat_field, TlvModel, TlvWriter,
};
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::tlv::Nat;
use rust_ndn_common::wire::WireView;
use rust_ndn_common::Result;
use std::collections::HashMap;

pub const TLV_PREFIX_OP_LIST: u64 = 0xE0;
pub const TLV_EXIT_ROUTER: u64 = 0xE2;
pub const TLV_OP_RESET: u64 = 0xE4;
pub const TLV_OP_ADD: u64 = 0xE6;
pub const TLV_OP_REMOVE: u64 = 0xE8;
pub const TLV_PREFIX_COST: u64 = 0xEA;

/// One change to a router's announcements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefixOp {
    /// Drop everything previously announced by the exit router.
    Reset,
    Add { name: Name, cost: u64 },
    Remove { name: Name },
}

/// A change log entry: ops tagged with the router they apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixOpList {
    pub exit_router: Name,
    pub ops: Vec<PrefixOp>,
}

impl PrefixOp {
    fn body_length(&self) -> usize {
        match self {
            PrefixOp::Reset => 0,
            PrefixOp::Add { name, cost } => {
                name.encoding_length() + tl_size(TLV_PREFIX_COST, Nat(*cost).size())
            }
            PrefixOp::Remove { name } => name.encoding_length(),
        }
    }
}

impl PrefixOpList {
    fn inner_length(&self) -> usize {
        tl_size(TLV_EXIT_ROUTER, self.exit_router.encoding_length())
            + self
                .ops
                .iter()
                .map(|op| {
                    let typ = match op {
                        PrefixOp::Reset => TLV_OP_RESET,
                        PrefixOp::Add { .. } => TLV_OP_ADD,
                        PrefixOp::Remove { .. } => TLV_OP_REMOVE,
                    };
                    tl_size(typ, op.body_length())
                })
                .sum::<usize>()
    }
}

impl TlvModel for PrefixOpList {
    fn encoding_length(&self) -> usize {
        tl_size(TLV_PREFIX_OP_LIST, self.inner_length())
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_PREFIX_OP_LIST, self.inner_length());
        w.put_tl(TLV_EXIT_ROUTER, self.exit_router.encoding_length());
        self.exit_router.write_to_writer(w);
        for op in &self.ops {
            match op {
                PrefixOp::Reset => w.put_tl(TLV_OP_RESET, 0),
                PrefixOp::Add { name, cost } => {
                    w.put_tl(TLV_OP_ADD, op.body_length());
                    name.write_to_writer(w);
                    write_nat_field(w, TLV_PREFIX_COST, *cost);
                }
                PrefixOp::Remove { name } => {
                    w.put_tl(TLV_OP_REMOVE, op.body_length());
                    name.write_to_writer(w);
                }
            }
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_PREFIX_OP_LIST {
            return Err(Error::format(format!(
                "expected PrefixOpList, got type {typ}"
            )));
        }
        let mut body = view.delegate(len)?;
        let mut exit_router = None;
        let mut ops = Vec::new();
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            match t {
                TLV_EXIT_ROUTER => {
                    let mut rb = body.delegate(l)?;
                    exit_router = Some(Name::decode_from(&mut rb)?);
                }
                TLV_OP_RESET => {
                    body.skip(l)?;
                    ops.push(PrefixOp::Reset);
                }
                TLV_OP_ADD => {
                    let mut ob = body.delegate(l)?;
                    let name = Name::decode_from(&mut ob)?;
                    let mut cost = 0;
                    while !ob.is_eof() {
                        let (ot, ol) = read_tl(&mut ob)?;
                        match ot {
                            TLV_PREFIX_COST => cost = Nat::read_from(&mut ob, ol)?.0,
                            other => skip_unknown(&mut ob, other, ol)?,
                        }
                    }
                    ops.push(PrefixOp::Add { name, cost });
                }
                TLV_OP_REMOVE => {
                    let mut ob = body.delegate(l)?;
                    let name = Name::decode_from(&mut ob)?;
                    ops.push(PrefixOp::Remove { name });
                }
                other => skip_unknown(&mut body, other, l)?,
            }
        }
        Ok(PrefixOpList {
            exit_router: exit_router.ok_or(Error::SkipRequired("ExitRouter"))?,
            ops,
        })
    }
}

/// A (prefix, cost) announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixEntry {
    pub name: Name,
    pub cost: u64,
}

/// Announcements of every router in the network, keyed by router name
/// hash.
#[derive(Debug, Default)]
pub struct PrefixTable {
    by_router: HashMap<u64, (Name, Vec<PrefixEntry>)>,
}

impl PrefixTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a change log entry; true if anything changed.
    pub fn apply(&mut self, list: &PrefixOpList) -> bool {
        let key = list.exit_router.hash_u64();
        let slot = self
            .by_router
            .entry(key)
            .or_insert_with(|| (list.exit_router.clone(), Vec::new()));
        let mut changed = false;
        for op in &list.ops {
            match op {
                PrefixOp::Reset => {
                    if !slot.1.is_empty() {
                        slot.1.clear();
                        changed = true;
                    }
                }
                PrefixOp::Add { name, cost } => {
                    match slot.1.iter_mut().find(|e| e.name == *name) {
                        Some(existing) if existing.cost == *cost => {}
                        Some(existing) => {
                            existing.cost = *cost;
                            changed = true;
                        }
                        None => {
                            slot.1.push(PrefixEntry {
                                name: name.clone(),
                                cost: *cost,
                            });
                            changed = true;
                        }
                    }
                }
                PrefixOp::Remove { name } => {
                    let before = slot.1.len();
                    slot.1.retain(|e| e.name != *name);
                    changed |= slot.1.len() != before;
                }
            }
        }
        changed
    }

    pub fn prefixes_of(&self, router: &Name) -> &[PrefixEntry] {
        self.by_router
            .get(&router.hash_u64())
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    pub fn routers(&self) -> impl Iterator<Item = &Name> {
        self.by_router.values().map(|(name, _)| name)
    }

    /// A full snapshot of one router's announcements as a change log
    /// entry: reset followed by adds.
    pub fn snapshot_of(&self, router: &Name) -> PrefixOpList {
        let mut ops = vec![PrefixOp::Reset];
        for entry in self.prefixes_of(router) {
            ops.push(PrefixOp::Add {
                name: entry.name.clone(),
                cost: entry.cost,
            });
        }
        PrefixOpList {
            exit_router: router.clone(),
            ops,
        }
    }

    pub fn remove_router(&mut self, router: &Name) -> bool {
        self.by_router.remove(&router.hash_u64()).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[test]
    fn op_list_round_trip() {
        let list = PrefixOpList {
            exit_router: n("/ndn/r1"),
            ops: vec![
                PrefixOp::Reset,
                PrefixOp::Add {
                    name: n("/apps/chat"),
                    cost: 0,
                },
                PrefixOp::Add {
                    name: n("/apps/files"),
                    cost: 2,
                },
                PrefixOp::Remove {
                    name: n("/apps/chat"),
                },
            ],
        };
        let bytes = list.encode_bytes();
        assert_eq!(bytes.len(), list.encoding_length());
        assert_eq!(PrefixOpList::decode(&bytes).unwrap(), list);
    }

    #[test]
    fn apply_updates_router_slice() {
        let mut table = PrefixTable::new();
        let changed = table.apply(&PrefixOpList {
            exit_router: n("/ndn/r1"),
            ops: vec![PrefixOp::Add {
                name: n("/apps/chat"),
                cost: 0,
            }],
        });
        assert!(changed);
        assert_eq!(table.prefixes_of(&n("/ndn/r1")).len(), 1);

        // Idempotent add.
        let changed = table.apply(&PrefixOpList {
            exit_router: n("/ndn/r1"),
            ops: vec![PrefixOp::Add {
                name: n("/apps/chat"),
                cost: 0,
            }],
        });
        assert!(!changed);

        // Snapshot replays to the same state.
        let snapshot = table.snapshot_of(&n("/ndn/r1"));
        let mut other = PrefixTable::new();
        other.apply(&snapshot);
        assert_eq!(
            other.prefixes_of(&n("/ndn/r1")),
            table.prefixes_of(&n("/ndn/r1"))
        );

        let changed = table.apply(&PrefixOpList {
            exit_router: n("/ndn/r1"),
            ops: vec![PrefixOp::Remove {
                name: n("/apps/chat"),
            }],
        });
        assert!(changed);
        assert!(table.prefixes_of(&n("/ndn/r1")).is_empty());
    }
}
