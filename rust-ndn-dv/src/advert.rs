//! Advertisement and state-vector encodings.
//!
//! An advertisement is the router's current view: one record per known
//! destination with the chosen next hop and cost. A state vector names
//! every router's advertisement boot time and sequence; sync Interests
//! carry it so peers can tell who is outdated.

use rust_ndn_common::codec::{
    read_tl, skip_unknown, tl_size, write_nat_field, TlvModel, TlvWriter,
};
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::tlv::Nat;
use rust_ndn_common::wire::WireView;
use rust_ndn_common::Result;

pub const TLV_ADVERTISEMENT: u64 = 0xC8;
pub const TLV_ADVERT_ENTRY: u64 = 0xCA;
pub const TLV_NEXT_HOP: u64 = 0xCC;
pub const TLV_COST: u64 = 0xCE;
pub const TLV_STATE_VECTOR: u64 = 0xD0;
pub const TLV_SV_ENTRY: u64 = 0xD2;
pub const TLV_SV_BOOT: u64 = 0xD4;
pub const TLV_SV_SEQ: u64 = 0xD6;

/// One destination record of an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertEntry {
    pub destination: Name,
    pub next_hop: Name,
    pub cost: u64,
}

impl AdvertEntry {
    fn body_length(&self) -> usize {
        self.destination.encoding_length()
            + tl_size(TLV_NEXT_HOP, self.next_hop.encoding_length())
            + tl_size(TLV_COST, Nat(self.cost).size())
    }
}

/// A router's advertised routing view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub entries: Vec<AdvertEntry>,
}

impl TlvModel for Advertisement {
    fn encoding_length(&self) -> usize {
        let inner: usize = self
            .entries
            .iter()
            .map(|e| tl_size(TLV_ADVERT_ENTRY, e.body_length()))
            .sum();
        tl_size(TLV_ADVERTISEMENT, inner)
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        let inner: usize = self
            .entries
            .iter()
            .map(|e| tl_size(TLV_ADVERT_ENTRY, e.body_length()))
            .sum();
        w.put_tl(TLV_ADVERTISEMENT, inner);
        for entry in &self.entries {
            w.put_tl(TLV_ADVERT_ENTRY, entry.body_length());
            entry.destination.write_to_writer(w);
            w.put_tl(TLV_NEXT_HOP, entry.next_hop.encoding_length());
            entry.next_hop.write_to_writer(w);
            write_nat_field(w, TLV_COST, entry.cost);
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_ADVERTISEMENT {
            return Err(Error::format(format!(
                "expected Advertisement, got type {typ}"
            )));
        }
        let mut body = view.delegate(len)?;
        let mut advert = Advertisement::default();
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            if t != TLV_ADVERT_ENTRY {
                skip_unknown(&mut body, t, l)?;
                continue;
            }
            let mut eb = body.delegate(l)?;
            let mut destination = None;
            let mut next_hop = None;
            let mut cost = None;
            while !eb.is_eof() {
                let (et, el) = read_tl(&mut eb)?;
                match et {
                    t if t == rust_ndn_common::name::TLV_NAME => {
                        let mut nb = eb.delegate(el)?;
                        destination = Some(Name::decode_inner(&mut nb)?);
                    }
                    TLV_NEXT_HOP => {
                        let mut nb = eb.delegate(el)?;
                        next_hop = Some(Name::decode_from(&mut nb)?);
                    }
                    TLV_COST => cost = Some(Nat::read_from(&mut eb, el)?.0),
                    other => skip_unknown(&mut eb, other, el)?,
                }
            }
            advert.entries.push(AdvertEntry {
                destination: destination.ok_or(Error::SkipRequired("Destination"))?,
                next_hop: next_hop.ok_or(Error::SkipRequired("NextHop"))?,
                cost: cost.ok_or(Error::SkipRequired("Cost"))?,
            });
        }
        Ok(advert)
    }
}

/// One router's position in a sync group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVectorEntry {
    pub router: Name,
    pub boot: u64,
    pub seq: u64,
}

impl StateVectorEntry {
    fn body_length(&self) -> usize {
        self.router.encoding_length()
            + tl_size(TLV_SV_BOOT, Nat(self.boot).size())
            + tl_size(TLV_SV_SEQ, Nat(self.seq).size())
    }
}

/// The vector carried by sync Interests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateVector {
    pub entries: Vec<StateVectorEntry>,
}

impl StateVector {
    pub fn single(router: Name, boot: u64, seq: u64) -> Self {
        Self {
            entries: vec![StateVectorEntry { router, boot, seq }],
        }
    }
}

impl TlvModel for StateVector {
    fn encoding_length(&self) -> usize {
        let inner: usize = self
            .entries
            .iter()
            .map(|e| tl_size(TLV_SV_ENTRY, e.body_length()))
            .sum();
        tl_size(TLV_STATE_VECTOR, inner)
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        let inner: usize = self
            .entries
            .iter()
            .map(|e| tl_size(TLV_SV_ENTRY, e.body_length()))
            .sum();
        w.put_tl(TLV_STATE_VECTOR, inner);
        for entry in &self.entries {
            w.put_tl(TLV_SV_ENTRY, entry.body_length());
            entry.router.write_to_writer(w);
            write_nat_field(w, TLV_SV_BOOT, entry.boot);
            write_nat_field(w, TLV_SV_SEQ, entry.seq);
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_STATE_VECTOR {
            return Err(Error::format(format!(
                "expected StateVector, got type {typ}"
            )));
        }
        let mut body = view.delegate(len)?;
        let mut vector = StateVector::default();
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            if t != TLV_SV_ENTRY {
                skip_unknown(&mut body, t, l)?;
                continue;
            }
            let mut eb = body.delegate(l)?;
            let mut router = None;
            let mut boot = 0;
            let mut seq = 0;
            while !eb.is_eof() {
                let (et, el) = read_tl(&mut eb)?;
                match et {
                    t if t == rust_ndn_common::name::TLV_NAME => {
                        let mut nb = eb.delegate(el)?;
                        router = Some(Name::decode_inner(&mut nb)?);
                    }
                    TLV_SV_BOOT => boot = Nat::read_from(&mut eb, el)?.0,
                    TLV_SV_SEQ => seq = Nat::read_from(&mut eb, el)?.0,
                    other => skip_unknown(&mut eb, other, el)?,
                }
            }
            vector.entries.push(StateVectorEntry {
                router: router.ok_or(Error::SkipRequired("Router"))?,
                boot,
                seq,
            });
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertisement_round_trip() {
        let advert = Advertisement {
            entries: vec![
                AdvertEntry {
                    destination: "/ndn/r2".parse().unwrap(),
                    next_hop: "/ndn/r2".parse().unwrap(),
                    cost: 1,
                },
                AdvertEntry {
                    destination: "/ndn/r3".parse().unwrap(),
                    next_hop: "/ndn/r2".parse().unwrap(),
                    cost: 2,
                },
            ],
        };
        let bytes = advert.encode_bytes();
        assert_eq!(bytes.len(), advert.encoding_length());
        assert_eq!(Advertisement::decode(&bytes).unwrap(), advert);
    }

    #[test]
    fn empty_advertisement_round_trip() {
        let advert = Advertisement::default();
        assert_eq!(
            Advertisement::decode(&advert.encode_bytes()).unwrap(),
            advert
        );
    }

    #[test]
    fn state_vector_round_trip() {
        let vector = StateVector {
            entries: vec![
                StateVectorEntry {
                    router: "/ndn/r1".parse().unwrap(),
                    boot: 1_700_000_000,
                    seq: 42,
                },
                StateVectorEntry {
                    router: "/ndn/r2".parse().unwrap(),
                    boot: 1_700_000_123,
                    seq: 7,
                },
            ],
        };
        let bytes = vector.encode_bytes();
        assert_eq!(StateVector::decode(&bytes).unwrap(), vector);
    }
}
