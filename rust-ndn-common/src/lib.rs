//! Common wire-format types for the rust-ndn stack.
//!
//! This crate provides the TLV codec, the segmented buffer cursor, the Name
//! algebra and the packet types (Interest, Data, link-layer packets and the
//! forwarder management protocol) shared by the engine and the routing
//! daemon.

pub mod codec;
pub mod error;
pub mod metrics;
pub mod mgmt;
pub mod name;
pub mod packet;
pub mod security;
pub mod tlv;
pub mod wire;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
