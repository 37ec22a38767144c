//! Packet storage contracts.
//!
//! A store maps names to packet wires. Producers put encoded Data under
//! full names; consumers read exact names or, with `prefix`, the newest
//! packet under a prefix. Writes can be grouped into an exclusive
//! transaction: `begin` blocks until the store is free, `commit` applies
//! every buffered write atomically, `rollback` leaves no trace.

mod mem;
mod sled_store;

pub use mem::MemStore;
pub use sled_store::SledStore;

use bytes::Bytes;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::Result;
use std::sync::{Condvar, Mutex};

/// The storage contract shared by the in-memory and persistent stores.
pub trait Store: Send + Sync {
    /// Reads the packet at `name`. With `prefix`, a name that has no
    /// packet of its own yields the newest packet stored below it.
    fn get(&self, name: &Name, prefix: bool) -> Result<Option<Bytes>>;

    fn put(&self, name: &Name, wire: &[u8]) -> Result<()>;

    fn remove(&self, name: &Name) -> Result<()>;

    /// Removes every packet at or below `name`.
    fn remove_prefix(&self, name: &Name) -> Result<()>;

    /// Removes packets whose name is `prefix` plus a single component in
    /// `[first, last]`, inclusive.
    fn remove_flat_range(&self, prefix: &Name, first: &Component, last: &Component)
        -> Result<()>;

    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

// One transaction at a time; begin blocks until the holder finishes.
#[derive(Debug, Default)]
pub(crate) struct TxGate {
    active: Mutex<bool>,
    freed: Condvar,
}

impl TxGate {
    pub fn acquire(&self) {
        let mut active = self.active.lock().unwrap();
        while *active {
            active = self.freed.wait(active).unwrap();
        }
        *active = true;
    }

    pub fn release(&self) {
        *self.active.lock().unwrap() = false;
        self.freed.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndn_common::name::Component;
    use std::sync::Arc;

    fn n(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    // The contract tests run against both implementations.
    fn contract(store: &dyn Store) {
        store.put(&n("/app/obj/v=1/seg=0"), b"s0").unwrap();
        store.put(&n("/app/obj/v=1/seg=1"), b"s1").unwrap();
        store.put(&n("/app/obj/v=2/seg=0"), b"new").unwrap();

        // Exact.
        assert_eq!(
            store.get(&n("/app/obj/v=1/seg=1"), false).unwrap().as_deref(),
            Some(&b"s1"[..])
        );
        assert_eq!(store.get(&n("/app/obj/v=3"), false).unwrap(), None);

        // Prefix: newest chain wins (v=2 over v=1).
        assert_eq!(
            store.get(&n("/app/obj"), true).unwrap().as_deref(),
            Some(&b"new"[..])
        );

        // Remove and prefix-remove.
        store.remove(&n("/app/obj/v=2/seg=0")).unwrap();
        assert_eq!(store.get(&n("/app/obj/v=2/seg=0"), false).unwrap(), None);
        store.remove_prefix(&n("/app/obj/v=1")).unwrap();
        assert_eq!(store.get(&n("/app/obj"), true).unwrap(), None);

        // Flat range delete.
        for i in 0..5u64 {
            store
                .put(
                    &n("/flat").clone().append(Component::segment(i)),
                    format!("seg{i}").as_bytes(),
                )
                .unwrap();
        }
        store
            .remove_flat_range(&n("/flat"), &Component::segment(1), &Component::segment(3))
            .unwrap();
        assert!(store
            .get(&n("/flat").clone().append(Component::segment(0)), false)
            .unwrap()
            .is_some());
        for i in 1..=3u64 {
            assert!(store
                .get(&n("/flat").clone().append(Component::segment(i)), false)
                .unwrap()
                .is_none());
        }
        assert!(store
            .get(&n("/flat").clone().append(Component::segment(4)), false)
            .unwrap()
            .is_some());

        // Transactions: rollback leaves no trace.
        store.begin().unwrap();
        store.put(&n("/tx/a"), b"a").unwrap();
        assert_eq!(
            store.get(&n("/tx/a"), false).unwrap().as_deref(),
            Some(&b"a"[..])
        );
        store.rollback().unwrap();
        assert_eq!(store.get(&n("/tx/a"), false).unwrap(), None);

        // Transactions: commit makes all writes observable.
        store.begin().unwrap();
        store.put(&n("/tx/a"), b"a").unwrap();
        store.put(&n("/tx/b"), b"b").unwrap();
        store.commit().unwrap();
        assert_eq!(
            store.get(&n("/tx/a"), false).unwrap().as_deref(),
            Some(&b"a"[..])
        );
        assert_eq!(
            store.get(&n("/tx/b"), false).unwrap().as_deref(),
            Some(&b"b"[..])
        );
    }

    #[test]
    fn mem_store_contract() {
        contract(&MemStore::new());
    }

    #[test]
    fn sled_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path().join("store")).unwrap();
        contract(&store);
    }

    #[test]
    fn tx_gate_serializes() {
        let gate = Arc::new(TxGate::default());
        gate.acquire();
        let g2 = gate.clone();
        let waiter = std::thread::spawn(move || {
            g2.acquire();
            g2.release();
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!waiter.is_finished());
        gate.release();
        waiter.join().unwrap();
    }
}
