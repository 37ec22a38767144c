//! Link-layer packets.
//!
//! The fragment payload is carried as a borrowed wire: encoding splices
//! it into the output without copying, and decoding hands back slices of
//! the incoming buffer. Fragmented link packets (FragIndex/FragCount)
//! are parsed but rejected by the engine.

use crate::codec::{
    read_tl, skip_unknown, tl_size, write_bytes_field, write_nat_field, write_wire_field,
    TlvModel, TlvWriter,
};
use crate::error::Error;
use crate::packet::{
    TLV_LP_CONGESTION_MARK, TLV_LP_FRAGMENT, TLV_LP_FRAG_COUNT, TLV_LP_FRAG_INDEX,
    TLV_LP_INCOMING_FACE_ID, TLV_LP_NACK, TLV_LP_NACK_REASON, TLV_LP_NEXT_HOP_FACE_ID,
    TLV_LP_PACKET, TLV_LP_PIT_TOKEN, TLV_LP_SEQUENCE,
};
use crate::tlv::Nat;
use crate::wire::{wire_len, Wire, WireView};
use crate::Result;
use bytes::Bytes;

pub const NACK_CONGESTION: u64 = 50;
pub const NACK_DUPLICATE: u64 = 100;
pub const NACK_NO_ROUTE: u64 = 150;

/// A negative acknowledgment header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nack {
    pub reason: Option<u64>,
}

/// A link-layer packet wrapping an inner Interest or Data.
#[derive(Debug, Clone, Default)]
pub struct LpPacket {
    pub sequence: Option<u64>,
    pub frag_index: Option<u64>,
    pub frag_count: Option<u64>,
    pub pit_token: Option<Bytes>,
    pub nack: Option<Nack>,
    pub incoming_face_id: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub congestion_mark: Option<u64>,
    pub fragment: Option<Wire>,
}

impl LpPacket {
    /// Wraps an inner packet, carrying it by reference.
    pub fn wrap(fragment: Wire) -> Self {
        Self {
            fragment: Some(fragment),
            ..Default::default()
        }
    }

    pub fn with_pit_token(mut self, token: Bytes) -> Self {
        self.pit_token = Some(token);
        self
    }

    pub fn with_next_hop(mut self, face_id: u64) -> Self {
        self.next_hop_face_id = Some(face_id);
        self
    }

    /// True if this packet is a fragment of a larger one.
    pub fn is_fragmented(&self) -> bool {
        self.frag_index.is_some() || self.frag_count.is_some()
    }

    pub fn nack_reason(&self) -> Option<u64> {
        self.nack.as_ref().map(|n| n.reason.unwrap_or(0))
    }

    fn nack_body_length(nack: &Nack) -> usize {
        match nack.reason {
            Some(r) => tl_size(TLV_LP_NACK_REASON, Nat(r).size()),
            None => 0,
        }
    }

    fn inner_length(&self) -> usize {
        let mut inner = 0;
        if let Some(seq) = self.sequence {
            inner += tl_size(TLV_LP_SEQUENCE, Nat(seq).size());
        }
        if let Some(fi) = self.frag_index {
            inner += tl_size(TLV_LP_FRAG_INDEX, Nat(fi).size());
        }
        if let Some(fc) = self.frag_count {
            inner += tl_size(TLV_LP_FRAG_COUNT, Nat(fc).size());
        }
        if let Some(token) = &self.pit_token {
            inner += tl_size(TLV_LP_PIT_TOKEN, token.len());
        }
        if let Some(nack) = &self.nack {
            inner += tl_size(TLV_LP_NACK, Self::nack_body_length(nack));
        }
        if let Some(id) = self.incoming_face_id {
            inner += tl_size(TLV_LP_INCOMING_FACE_ID, Nat(id).size());
        }
        if let Some(id) = self.next_hop_face_id {
            inner += tl_size(TLV_LP_NEXT_HOP_FACE_ID, Nat(id).size());
        }
        if let Some(mark) = self.congestion_mark {
            inner += tl_size(TLV_LP_CONGESTION_MARK, Nat(mark).size());
        }
        if let Some(frag) = &self.fragment {
            inner += tl_size(TLV_LP_FRAGMENT, wire_len(frag));
        }
        inner
    }
}

impl TlvModel for LpPacket {
    fn encoding_length(&self) -> usize {
        tl_size(TLV_LP_PACKET, self.inner_length())
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_LP_PACKET, self.inner_length());
        if let Some(seq) = self.sequence {
            write_nat_field(w, TLV_LP_SEQUENCE, seq);
        }
        if let Some(fi) = self.frag_index {
            write_nat_field(w, TLV_LP_FRAG_INDEX, fi);
        }
        if let Some(fc) = self.frag_count {
            write_nat_field(w, TLV_LP_FRAG_COUNT, fc);
        }
        if let Some(token) = &self.pit_token {
            write_bytes_field(w, TLV_LP_PIT_TOKEN, token);
        }
        if let Some(nack) = &self.nack {
            w.put_tl(TLV_LP_NACK, Self::nack_body_length(nack));
            if let Some(r) = nack.reason {
                write_nat_field(w, TLV_LP_NACK_REASON, r);
            }
        }
        if let Some(id) = self.incoming_face_id {
            write_nat_field(w, TLV_LP_INCOMING_FACE_ID, id);
        }
        if let Some(id) = self.next_hop_face_id {
            write_nat_field(w, TLV_LP_NEXT_HOP_FACE_ID, id);
        }
        if let Some(mark) = self.congestion_mark {
            write_nat_field(w, TLV_LP_CONGESTION_MARK, mark);
        }
        if let Some(frag) = &self.fragment {
            write_wire_field(w, TLV_LP_FRAGMENT, frag);
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_LP_PACKET {
            return Err(Error::format(format!("expected LpPacket, got type {typ}")));
        }
        let mut body = view.delegate(len)?;
        let mut lp = LpPacket::default();
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            match t {
                TLV_LP_SEQUENCE => lp.sequence = Some(Nat::read_from(&mut body, l)?.0),
                TLV_LP_FRAG_INDEX => lp.frag_index = Some(Nat::read_from(&mut body, l)?.0),
                TLV_LP_FRAG_COUNT => lp.frag_count = Some(Nat::read_from(&mut body, l)?.0),
                TLV_LP_PIT_TOKEN => lp.pit_token = Some(body.read_buf(l)?),
                TLV_LP_NACK => {
                    let mut nb = body.delegate(l)?;
                    let mut nack = Nack::default();
                    while !nb.is_eof() {
                        let (nt, nl) = read_tl(&mut nb)?;
                        match nt {
                            TLV_LP_NACK_REASON => {
                                nack.reason = Some(Nat::read_from(&mut nb, nl)?.0)
                            }
                            other => skip_unknown(&mut nb, other, nl)?,
                        }
                    }
                    lp.nack = Some(nack);
                }
                TLV_LP_INCOMING_FACE_ID => {
                    lp.incoming_face_id = Some(Nat::read_from(&mut body, l)?.0)
                }
                TLV_LP_NEXT_HOP_FACE_ID => {
                    lp.next_hop_face_id = Some(Nat::read_from(&mut body, l)?.0)
                }
                TLV_LP_CONGESTION_MARK => {
                    lp.congestion_mark = Some(Nat::read_from(&mut body, l)?.0)
                }
                TLV_LP_FRAGMENT => lp.fragment = Some(body.read_wire(l)?),
                other => skip_unknown(&mut body, other, l)?,
            }
        }
        Ok(lp)
    }
}
