//! The rust-ndn communication engine.
//!
//! A Face delivers TLV frames from a forwarder or peer; the Engine
//! demultiplexes them through a Pending Interest Table and a handler
//! FIB, both kept in name tries. On top of the engine sit the object
//! client (segmented and versioned object transfer) and the storage
//! contracts used by producers.

pub mod engine;
pub mod face;
pub mod object;
pub mod store;
pub mod trie;

pub use engine::{Engine, EngineConfig, ExpressCallback, ExpressOptions, ExpressResult};
pub use face::{DummyFace, Face, FaceEvent, StreamFace, StreamTarget, WsFace};
pub use trie::NameTrie;

pub use rust_ndn_common::{Error, Result};
