//! The sled-backed persistent store.
//!
//! Keys are the name's inner TLV bytes. Prefix reads scan in reverse
//! from `key + 0xFF` so the greatest (newest) matching key comes first.
//! A transaction buffers writes in a batch with a read-your-writes
//! overlay and applies the batch atomically on commit.

use super::{Store, TxGate};
use bytes::Bytes;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::{Error, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
struct TxState {
    batch: sled::Batch,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

pub struct SledStore {
    db: sled::Db,
    tx: Mutex<Option<TxState>>,
    gate: TxGate,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(sled_err)?;
        Ok(Self {
            db,
            tx: Mutex::new(None),
            gate: TxGate::default(),
        })
    }

    fn key_of(name: &Name) -> Vec<u8> {
        name.bytes_inner().to_vec()
    }

    // Every key strictly below `prefix` sorts before `prefix + 0xFF`.
    fn upper_bound(mut key: Vec<u8>) -> Vec<u8> {
        key.push(0xFF);
        key
    }
}

impl Store for SledStore {
    fn get(&self, name: &Name, prefix: bool) -> Result<Option<Bytes>> {
        let key = Self::key_of(name);
        let tx = self.tx.lock().unwrap();

        if let Some(tx) = tx.as_ref() {
            if let Some(pending) = tx.overlay.get(&key) {
                return Ok(pending.as_ref().map(|v| Bytes::copy_from_slice(v)));
            }
        }
        if let Some(found) = self.db.get(&key).map_err(sled_err)? {
            return Ok(Some(Bytes::copy_from_slice(&found)));
        }
        if !prefix {
            return Ok(None);
        }

        // Newest key under the prefix, considering pending writes.
        let upper = Self::upper_bound(key.clone());
        let mut best: Option<(Vec<u8>, Vec<u8>)> = None;
        for item in self.db.range(key.clone()..upper.clone()).rev() {
            let (k, v) = item.map_err(sled_err)?;
            let k = k.to_vec();
            let deleted = tx
                .as_ref()
                .is_some_and(|tx| matches!(tx.overlay.get(&k), Some(None)));
            if !deleted {
                best = Some((k, v.to_vec()));
                break;
            }
        }
        if let Some(tx) = tx.as_ref() {
            for (k, v) in tx.overlay.range(key..upper).rev() {
                if let Some(v) = v {
                    if best.as_ref().is_none_or(|(bk, _)| k > bk) {
                        best = Some((k.clone(), v.clone()));
                    }
                    break;
                }
            }
        }
        Ok(best.map(|(_, v)| Bytes::from(v)))
    }

    fn put(&self, name: &Name, wire: &[u8]) -> Result<()> {
        let key = Self::key_of(name);
        let mut tx = self.tx.lock().unwrap();
        match tx.as_mut() {
            Some(tx) => {
                tx.batch.insert(key.clone(), wire.to_vec());
                tx.overlay.insert(key, Some(wire.to_vec()));
            }
            None => {
                self.db.insert(key, wire.to_vec()).map_err(sled_err)?;
            }
        }
        Ok(())
    }

    fn remove(&self, name: &Name) -> Result<()> {
        let key = Self::key_of(name);
        let mut tx = self.tx.lock().unwrap();
        match tx.as_mut() {
            Some(tx) => {
                tx.batch.remove(key.clone());
                tx.overlay.insert(key, None);
            }
            None => {
                self.db.remove(key).map_err(sled_err)?;
            }
        }
        Ok(())
    }

    fn remove_prefix(&self, name: &Name) -> Result<()> {
        let key = Self::key_of(name);
        let upper = Self::upper_bound(key.clone());
        let doomed: Vec<Vec<u8>> = self
            .db
            .range(key..upper)
            .keys()
            .map(|k| k.map(|k| k.to_vec()))
            .collect::<std::result::Result<_, _>>()
            .map_err(sled_err)?;
        let mut tx = self.tx.lock().unwrap();
        for key in doomed {
            match tx.as_mut() {
                Some(tx) => {
                    tx.batch.remove(key.clone());
                    tx.overlay.insert(key, None);
                }
                None => {
                    self.db.remove(key).map_err(sled_err)?;
                }
            }
        }
        Ok(())
    }

    fn remove_flat_range(
        &self,
        prefix: &Name,
        first: &Component,
        last: &Component,
    ) -> Result<()> {
        let base = Self::key_of(prefix);
        let mut lo = base.clone();
        lo.extend_from_slice(&first.bytes());
        let mut hi = base;
        hi.extend_from_slice(&last.bytes());
        let doomed: Vec<Vec<u8>> = self
            .db
            .range(lo..=hi)
            .keys()
            .map(|k| k.map(|k| k.to_vec()))
            .collect::<std::result::Result<_, _>>()
            .map_err(sled_err)?;
        let mut tx = self.tx.lock().unwrap();
        for key in doomed {
            match tx.as_mut() {
                Some(tx) => {
                    tx.batch.remove(key.clone());
                    tx.overlay.insert(key, None);
                }
                None => {
                    self.db.remove(key).map_err(sled_err)?;
                }
            }
        }
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        self.gate.acquire();
        *self.tx.lock().unwrap() = Some(TxState::default());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let taken = self.tx.lock().unwrap().take();
        let result = match taken {
            Some(tx) => self.db.apply_batch(tx.batch).map_err(sled_err),
            None => Err(Error::InvalidValue("no transaction in progress".into())),
        };
        self.gate.release();
        result
    }

    fn rollback(&self) -> Result<()> {
        let had_tx = self.tx.lock().unwrap().take().is_some();
        self.gate.release();
        if had_tx {
            Ok(())
        } else {
            Err(Error::InvalidValue("no transaction in progress".into()))
        }
    }
}

fn sled_err(e: sled::Error) -> Error {
    Error::Io(std::io::Error::other(e))
}
