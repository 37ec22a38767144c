//! The in-memory store: a [`NameTrie`] of packet wires.
//!
//! The same trie that backs the PIT and FIB holds the wires here; its
//! ordered children make a prefix read resolve to the newest (greatest)
//! descendant. A transaction works on a shadow copy of the trie that
//! replaces the live one on commit.

use super::{Store, TxGate};
use crate::trie::NameTrie;
use bytes::Bytes;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::Result;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct MemState {
    trie: NameTrie<Bytes>,
    shadow: Option<NameTrie<Bytes>>,
}

impl MemState {
    fn target(&mut self) -> &mut NameTrie<Bytes> {
        self.shadow.as_mut().unwrap_or(&mut self.trie)
    }

    fn reader(&self) -> &NameTrie<Bytes> {
        self.shadow.as_ref().unwrap_or(&self.trie)
    }
}

/// A trie-backed store holding packet wires in memory.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<MemState>,
    gate: TxGate,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, name: &Name, prefix: bool) -> Result<Option<Bytes>> {
        let state = self.state.lock().unwrap();
        let trie = state.reader();
        if prefix {
            Ok(trie.newest_at_or_below(name).cloned())
        } else {
            Ok(trie.exact(name).cloned())
        }
    }

    fn put(&self, name: &Name, wire: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.target().fill_path(name) = Some(Bytes::copy_from_slice(wire));
        Ok(())
    }

    fn remove(&self, name: &Name) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.target().remove(name);
        Ok(())
    }

    fn remove_prefix(&self, name: &Name) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.target().remove_subtree(name);
        Ok(())
    }

    fn remove_flat_range(
        &self,
        prefix: &Name,
        first: &Component,
        last: &Component,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.target().remove_child_range(prefix, first, last);
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.gate.acquire();
        let mut state = self.state.lock().unwrap();
        state.shadow = Some(state.trie.clone());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(shadow) = state.shadow.take() {
            state.trie = shadow;
        }
        drop(state);
        self.gate.release();
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.state.lock().unwrap().shadow = None;
        self.gate.release();
        Ok(())
    }
}
