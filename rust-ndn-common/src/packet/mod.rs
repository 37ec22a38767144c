//! Packet types: Interest, Data and the link-layer packet.

mod data;
mod interest;
mod lp;
mod sig;

pub use data::{Data, EncodedData, MetaInfo};
pub use interest::{EncodedInterest, Interest};
pub use lp::{LpPacket, Nack, NACK_CONGESTION, NACK_DUPLICATE, NACK_NO_ROUTE};
pub use sig::{KeyLocator, SigType, SignatureInfo};

use crate::codec::TlvModel;
use crate::error::Error;
use crate::tlv::VarNum;
use crate::wire::WireView;
use crate::Result;

pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_LP_PACKET: u64 = 0x64;

// Interest fields.
pub const TLV_CAN_BE_PREFIX: u64 = 0x21;
pub const TLV_MUST_BE_FRESH: u64 = 0x12;
pub const TLV_FORWARDING_HINT: u64 = 0x1E;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0C;
pub const TLV_HOP_LIMIT: u64 = 0x22;
pub const TLV_APP_PARAM: u64 = 0x24;
pub const TLV_INTEREST_SIG_INFO: u64 = 0x2C;
pub const TLV_INTEREST_SIG_VALUE: u64 = 0x2E;

// Data fields.
pub const TLV_META_INFO: u64 = 0x14;
pub const TLV_CONTENT_TYPE: u64 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u64 = 0x19;
pub const TLV_FINAL_BLOCK_ID: u64 = 0x1A;
pub const TLV_CONTENT: u64 = 0x15;
pub const TLV_SIG_INFO: u64 = 0x16;
pub const TLV_SIG_VALUE: u64 = 0x17;

// SignatureInfo fields.
pub const TLV_SIG_TYPE: u64 = 0x1B;
pub const TLV_KEY_LOCATOR: u64 = 0x1C;
pub const TLV_KEY_DIGEST: u64 = 0x1D;
pub const TLV_SIG_NONCE: u64 = 0x26;
pub const TLV_SIG_TIME: u64 = 0x28;
pub const TLV_SIG_SEQ_NUM: u64 = 0x2A;

// Link-layer fields.
pub const TLV_LP_FRAGMENT: u64 = 0x50;
pub const TLV_LP_SEQUENCE: u64 = 0x51;
pub const TLV_LP_FRAG_INDEX: u64 = 0x52;
pub const TLV_LP_FRAG_COUNT: u64 = 0x53;
pub const TLV_LP_PIT_TOKEN: u64 = 0x62;
pub const TLV_LP_NACK: u64 = 0x0320;
pub const TLV_LP_NACK_REASON: u64 = 0x0321;
pub const TLV_LP_INCOMING_FACE_ID: u64 = 0x032C;
pub const TLV_LP_NEXT_HOP_FACE_ID: u64 = 0x0330;
pub const TLV_LP_CONGESTION_MARK: u64 = 0x0340;

// Data content types.
pub const CONTENT_TYPE_BLOB: u64 = 0;
pub const CONTENT_TYPE_LINK: u64 = 1;
pub const CONTENT_TYPE_KEY: u64 = 2;
pub const CONTENT_TYPE_NACK: u64 = 3;

/// Any packet that can appear on a face.
#[derive(Debug, Clone)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    Lp(LpPacket),
}

impl Packet {
    /// Dispatches on the outer TLV type. The cursor is branched by copy,
    /// so a failed peek consumes nothing.
    pub fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let mut peek = *view;
        let typ = VarNum::read_from(&mut peek)?.0;
        match typ {
            TLV_INTEREST => Interest::decode_from(view).map(Packet::Interest),
            TLV_DATA => Data::decode_from(view).map(Packet::Data),
            TLV_LP_PACKET => LpPacket::decode_from(view).map(Packet::Lp),
            other => Err(Error::format(format!("unknown packet type {other}"))),
        }
    }

    pub fn packet_type(&self) -> &'static str {
        match self {
            Packet::Interest(_) => "Interest",
            Packet::Data(_) => "Data",
            Packet::Lp(_) => "LpPacket",
        }
    }
}
