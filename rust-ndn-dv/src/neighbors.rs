//! The neighbor table.

use crate::advert::Advertisement;
use rust_ndn_common::name::Name;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// What a received sync entry means for a neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncDecision {
    /// The neighbor's advertisement moved; fetch it.
    pub needs_fetch: bool,
    /// The neighbor now reaches us over a different face.
    pub face_changed: bool,
}

/// Liveness and advertisement state for one neighbor.
#[derive(Debug, Clone)]
pub struct NeighborState {
    pub name: Name,
    pub face_id: Option<u64>,
    /// Whether this neighbor is configured with an active face. Passive
    /// sync Interests refresh `last_seen` only when it is not: with an
    /// active face, liveness must come from active pings so that
    /// active-face teardown is detectable.
    pub is_face_active: bool,
    pub last_seen: Instant,
    pub advert_boot: u64,
    pub advert_seq: u64,
    pub latest_advert: Option<Advertisement>,
}

impl NeighborState {
    fn new(name: Name, is_face_active: bool) -> Self {
        Self {
            name,
            face_id: None,
            is_face_active,
            last_seen: Instant::now(),
            advert_boot: 0,
            advert_seq: 0,
            latest_advert: None,
        }
    }
}

/// Neighbors keyed by the hash of their router name.
#[derive(Debug, Default)]
pub struct NeighborTable {
    map: HashMap<u64, NeighborState>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &Name) -> Option<&NeighborState> {
        self.map.get(&name.hash_u64())
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut NeighborState> {
        self.map.get_mut(&name.hash_u64())
    }

    pub fn ensure(&mut self, name: &Name, is_face_active: bool) -> &mut NeighborState {
        self.map
            .entry(name.hash_u64())
            .or_insert_with(|| NeighborState::new(name.clone(), is_face_active))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborState> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Records a sync entry from `name`. `passive` marks entries that
    /// arrived on the passive (localhop) prefix.
    pub fn on_sync(
        &mut self,
        name: &Name,
        boot: u64,
        seq: u64,
        face_id: Option<u64>,
        passive: bool,
    ) -> SyncDecision {
        let state = self.ensure(name, false);
        if !passive || !state.is_face_active {
            state.last_seen = Instant::now();
        }
        let mut face_changed = false;
        if let Some(id) = face_id {
            if state.face_id != Some(id) {
                face_changed = state.face_id.is_some();
                state.face_id = Some(id);
            }
        }
        // Newer boot means a restart; never move backward within a boot.
        let needs_fetch = boot > state.advert_boot
            || (boot == state.advert_boot && seq > state.advert_seq);
        SyncDecision {
            needs_fetch,
            face_changed,
        }
    }

    /// Stores a fetched advertisement.
    pub fn store_advert(&mut self, name: &Name, boot: u64, seq: u64, advert: Advertisement) {
        let state = self.ensure(name, false);
        if boot > state.advert_boot || (boot == state.advert_boot && seq >= state.advert_seq) {
            state.advert_boot = boot;
            state.advert_seq = seq;
            state.latest_advert = Some(advert);
        }
    }

    /// Removes neighbors not seen within `dead_interval`; returns their
    /// names.
    pub fn prune_dead(&mut self, dead_interval: Duration) -> Vec<Name> {
        let now = Instant::now();
        let dead: Vec<u64> = self
            .map
            .iter()
            .filter(|(_, s)| now.duration_since(s.last_seen) > dead_interval)
            .map(|(k, _)| *k)
            .collect();
        dead.into_iter()
            .filter_map(|k| self.map.remove(&k).map(|s| s.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(uri: &str) -> Name {
        uri.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn sync_advances_sequence_monotonically() {
        let mut table = NeighborTable::new();
        let r2 = n("/ndn/r2");
        assert!(table.on_sync(&r2, 10, 1, Some(5), false).needs_fetch);
        table.store_advert(&r2, 10, 1, Advertisement::default());
        // Same sequence again: nothing to fetch.
        assert!(!table.on_sync(&r2, 10, 1, Some(5), false).needs_fetch);
        // Older sequence: observers never move backward.
        assert!(!table.on_sync(&r2, 10, 0, Some(5), false).needs_fetch);
        // Newer boot wins even with a lower sequence.
        assert!(table.on_sync(&r2, 11, 0, Some(5), false).needs_fetch);
    }

    #[tokio::test(start_paused = true)]
    async fn face_change_is_reported() {
        let mut table = NeighborTable::new();
        let r2 = n("/ndn/r2");
        let first = table.on_sync(&r2, 1, 1, Some(5), false);
        assert!(!first.face_changed);
        let second = table.on_sync(&r2, 1, 2, Some(9), false);
        assert!(second.face_changed);
    }

    #[tokio::test(start_paused = true)]
    async fn passive_pings_do_not_refresh_active_neighbors() {
        let mut table = NeighborTable::new();
        let r2 = n("/ndn/r2");
        table.ensure(&r2, true);
        let seen_at = table.get(&r2).unwrap().last_seen;

        tokio::time::advance(Duration::from_secs(30)).await;
        table.on_sync(&r2, 1, 1, Some(5), true);
        // Passive ping ignored for liveness: an active face teardown
        // must become visible.
        assert_eq!(table.get(&r2).unwrap().last_seen, seen_at);

        table.on_sync(&r2, 1, 2, Some(5), false);
        assert!(table.get(&r2).unwrap().last_seen > seen_at);
    }

    #[tokio::test(start_paused = true)]
    async fn dead_neighbors_are_pruned() {
        let mut table = NeighborTable::new();
        table.on_sync(&n("/ndn/r2"), 1, 1, None, false);
        tokio::time::advance(Duration::from_secs(61)).await;
        table.on_sync(&n("/ndn/r3"), 1, 1, None, false);
        let dead = table.prune_dead(Duration::from_secs(60));
        assert_eq!(dead, vec![n("/ndn/r2")]);
        assert_eq!(table.len(), 1);
    }
}
