//! Segmented, versioned object transfer on top of the engine.

mod client;
mod rdr;
mod segmenter;

pub use client::ObjectClient;
pub use rdr::{make_metadata, metadata_name, parse_metadata};
pub use segmenter::{Segmenter, DEFAULT_SEGMENT_SIZE};

use rust_ndn_common::name::Component;

/// The RDR discovery keyword (`32=metadata`).
pub fn metadata_keyword() -> Component {
    Component::keyword("metadata")
}

/// The manifest keyword (`32=manifest`).
pub fn manifest_keyword() -> Component {
    Component::keyword("manifest")
}
