//! Field-level TLV encoding and parsing.
//!
//! Packet models implement [`TlvModel`]: a length pass, an encode pass
//! and a parse pass, built from the field helpers below. The writer
//! carries a wire plan: [`TlvWriter::append_wire`] splices payload
//! segments into the output by reference, so a model that holds a large
//! payload as a `Wire` never copies it.

use crate::error::Error;
use crate::tlv::{Nat, VarNum};
use crate::wire::{wire_join, wire_len, Wire, WireView};
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};

/// Encoded size of a TLV element with the given type and payload length.
pub const fn tl_size(typ: u64, payload: usize) -> usize {
    VarNum(typ).size() + VarNum(payload as u64).size() + payload
}

/// A type is critical iff it is at most 31 or odd. Unknown critical
/// fields are parse errors; unknown non-critical fields are skipped.
pub const fn is_critical(typ: u64) -> bool {
    typ <= 31 || typ & 1 == 1
}

/// An output sink assembling a segmented wire.
#[derive(Debug, Default)]
pub struct TlvWriter {
    done: Wire,
    cur: BytesMut,
    len: usize,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            done: Wire::new(),
            cur: BytesMut::with_capacity(n),
            len: 0,
        }
    }

    /// Total bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn put_u8(&mut self, b: u8) {
        self.cur.put_u8(b);
        self.len += 1;
    }

    pub fn put_slice(&mut self, bytes: &[u8]) {
        self.cur.extend_from_slice(bytes);
        self.len += bytes.len();
    }

    pub fn put_var(&mut self, v: u64) {
        let n = VarNum(v);
        n.write_to(&mut self.cur);
        self.len += n.size();
    }

    pub fn put_nat(&mut self, v: u64) {
        let n = Nat(v);
        n.write_to(&mut self.cur);
        self.len += n.size();
    }

    /// Writes a type and length header.
    pub fn put_tl(&mut self, typ: u64, payload: usize) {
        self.put_var(typ);
        self.put_var(payload as u64);
    }

    /// Splices a payload into the output by reference. The current
    /// contiguous run is sealed and the payload's segments become part
    /// of the output wire without copying.
    pub fn append_wire(&mut self, wire: &[Bytes]) {
        if !self.cur.is_empty() {
            self.done.push(self.cur.split().freeze());
        }
        for seg in wire {
            if !seg.is_empty() {
                self.len += seg.len();
                self.done.push(seg.clone());
            }
        }
    }

    /// Finishes the plan and returns the assembled wire.
    pub fn finish(mut self) -> Wire {
        if !self.cur.is_empty() {
            self.done.push(self.cur.split().freeze());
        }
        self.done
    }

    /// Finishes and joins into one contiguous buffer.
    pub fn finish_bytes(self) -> Bytes {
        wire_join(&self.finish())
    }
}

/* ---------------------------------------------------------------- *
 * Field helpers (encode side)
 * ---------------------------------------------------------------- */

/// natural: a Nat payload.
pub fn write_nat_field(w: &mut TlvWriter, typ: u64, v: u64) {
    w.put_tl(typ, Nat(v).size());
    w.put_nat(v);
}

pub const fn len_nat_field(typ: u64, v: u64) -> usize {
    tl_size(typ, Nat(v).size())
}

/// bool: presence with a zero-length payload.
pub fn write_bool_field(w: &mut TlvWriter, typ: u64) {
    w.put_tl(typ, 0);
}

/// binary / string: raw bytes payload.
pub fn write_bytes_field(w: &mut TlvWriter, typ: u64, bytes: &[u8]) {
    w.put_tl(typ, bytes.len());
    w.put_slice(bytes);
}

pub const fn len_bytes_field(typ: u64, len: usize) -> usize {
    tl_size(typ, len)
}

/// fixed-uint: a payload of exactly `width` big-endian bytes.
pub fn write_fixed_field(w: &mut TlvWriter, typ: u64, v: u64, width: usize) {
    w.put_tl(typ, width);
    match width {
        1 => w.put_u8(v as u8),
        2 => w.put_slice(&(v as u16).to_be_bytes()),
        4 => w.put_slice(&(v as u32).to_be_bytes()),
        _ => w.put_slice(&v.to_be_bytes()),
    }
}

/// wire: a borrowed payload spliced in by reference.
pub fn write_wire_field(w: &mut TlvWriter, typ: u64, payload: &[Bytes]) {
    w.put_tl(typ, wire_len(payload));
    w.append_wire(payload);
}

/* ---------------------------------------------------------------- *
 * Field helpers (parse side)
 * ---------------------------------------------------------------- */

/// Reads the type and length of the next element.
pub fn read_tl(view: &mut WireView<'_>) -> Result<(u64, usize)> {
    let typ = VarNum::read_from(view)?.0;
    let len = VarNum::read_from(view)?.0 as usize;
    if len > view.remaining() {
        return Err(Error::BufferOverflow {
            needed: len,
            available: view.remaining(),
        });
    }
    Ok((typ, len))
}

/// Handles a type the model does not know: error if critical, skip
/// otherwise.
pub fn skip_unknown(view: &mut WireView<'_>, typ: u64, len: usize) -> Result<()> {
    if is_critical(typ) {
        return Err(Error::UnrecognizedCriticalField(typ));
    }
    view.skip(len)
}

/// Reads a Nat payload of `len` bytes.
pub fn read_nat(view: &mut WireView<'_>, len: usize) -> Result<u64> {
    Ok(Nat::read_from(view, len)?.0)
}

/* ---------------------------------------------------------------- *
 * Model trait
 * ---------------------------------------------------------------- */

/// A TLV-encodable packet model.
pub trait TlvModel: Sized {
    /// Bytes required by `encode_into`, including the outer header.
    fn encoding_length(&self) -> usize;

    /// Writes the full element, outer header included.
    fn encode_into(&self, w: &mut TlvWriter);

    /// Parses the full element, consuming its outer header.
    fn decode_from(view: &mut WireView<'_>) -> Result<Self>;

    /// Encodes into a (possibly segmented) wire.
    fn encode_wire(&self) -> Wire {
        let mut w = TlvWriter::with_capacity(self.encoding_length());
        self.encode_into(&mut w);
        w.finish()
    }

    /// Encodes into one contiguous buffer.
    fn encode_bytes(&self) -> Bytes {
        wire_join(&self.encode_wire())
    }

    /// Parses from one contiguous buffer.
    fn decode(bytes: &Bytes) -> Result<Self> {
        let segs = std::slice::from_ref(bytes);
        let mut view = WireView::new(segs);
        let value = Self::decode_from(&mut view)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn criticality_rule() {
        assert!(is_critical(0x07));
        assert!(is_critical(31));
        assert!(is_critical(0x21)); // odd
        assert!(!is_critical(0x20));
        assert!(!is_critical(800));
        assert!(is_critical(801));
    }

    #[test]
    fn writer_plan_keeps_payload_segments() {
        let payload = vec![Bytes::from_static(&[0xAA; 100])];
        let mut w = TlvWriter::new();
        w.put_tl(0x15, 100);
        w.append_wire(&payload);
        w.put_u8(0xBB);
        let wire = w.finish();
        // Header, spliced payload, trailer: three segments, middle one shared.
        assert_eq!(wire.len(), 3);
        assert_eq!(wire[1].as_ptr(), payload[0].as_ptr());
        assert_eq!(wire_len(&wire), 2 + 100 + 1);
    }

    #[test]
    fn read_tl_rejects_overshooting_length() {
        let segs = [Bytes::from_static(&[0x07, 0x10, 0x00])];
        let mut view = WireView::new(&segs);
        assert!(matches!(
            read_tl(&mut view),
            Err(Error::BufferOverflow { .. })
        ));
    }
}
