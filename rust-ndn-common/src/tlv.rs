//! Variable-length TLV numbers and big-endian payload integers.
//!
//! `VarNum` is the number format used for TLV Type and Length fields:
//! 1, 3, 5 or 9 bytes selected by the smallest range that contains the
//! value. `Nat` is the payload integer format: big-endian in 1, 2, 4 or
//! 8 bytes. Non-minimal encodings are accepted on decode for both.

use crate::error::Error;
use crate::wire::WireView;
use crate::Result;
use bytes::{BufMut, BytesMut};

/// A TLV Type or Length number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VarNum(pub u64);

impl VarNum {
    /// Number of bytes this value occupies on the wire.
    pub const fn size(self) -> usize {
        match self.0 {
            0..=0xFC => 1,
            0xFD..=0xFFFF => 3,
            0x1_0000..=0xFFFF_FFFF => 5,
            _ => 9,
        }
    }

    /// Appends the encoded number to `buf`.
    pub fn write_to(self, buf: &mut BytesMut) {
        match self.0 {
            0..=0xFC => buf.put_u8(self.0 as u8),
            0xFD..=0xFFFF => {
                buf.put_u8(0xFD);
                buf.put_u16(self.0 as u16);
            }
            0x1_0000..=0xFFFF_FFFF => {
                buf.put_u8(0xFE);
                buf.put_u32(self.0 as u32);
            }
            _ => {
                buf.put_u8(0xFF);
                buf.put_u64(self.0);
            }
        }
    }

    /// Reads a number from the view, accepting non-minimal encodings.
    pub fn read_from(view: &mut WireView<'_>) -> Result<Self> {
        let first = view.read_byte()?;
        let v = match first {
            0..=0xFC => first as u64,
            0xFD => {
                let mut b = [0u8; 2];
                view.read_full(&mut b)?;
                u16::from_be_bytes(b) as u64
            }
            0xFE => {
                let mut b = [0u8; 4];
                view.read_full(&mut b)?;
                u32::from_be_bytes(b) as u64
            }
            0xFF => {
                let mut b = [0u8; 8];
                view.read_full(&mut b)?;
                u64::from_be_bytes(b)
            }
        };
        Ok(VarNum(v))
    }
}

impl From<u64> for VarNum {
    fn from(v: u64) -> Self {
        VarNum(v)
    }
}

impl From<usize> for VarNum {
    fn from(v: usize) -> Self {
        VarNum(v as u64)
    }
}

/// A big-endian payload integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Nat(pub u64);

impl Nat {
    /// Number of bytes this value occupies as a TLV payload.
    pub const fn size(self) -> usize {
        match self.0 {
            0..=0xFF => 1,
            0x100..=0xFFFF => 2,
            0x1_0000..=0xFFFF_FFFF => 4,
            _ => 8,
        }
    }

    /// Appends the big-endian bytes to `buf`.
    pub fn write_to(self, buf: &mut BytesMut) {
        match self.size() {
            1 => buf.put_u8(self.0 as u8),
            2 => buf.put_u16(self.0 as u16),
            4 => buf.put_u32(self.0 as u32),
            _ => buf.put_u64(self.0),
        }
    }

    /// Reads `len` big-endian bytes from the view. Any length from one to
    /// eight bytes is accepted.
    pub fn read_from(view: &mut WireView<'_>, len: usize) -> Result<Self> {
        if len == 0 || len > 8 {
            return Err(Error::format(format!("invalid integer length {len}")));
        }
        let mut v = 0u64;
        for _ in 0..len {
            v = (v << 8) | view.read_byte()? as u64;
        }
        Ok(Nat(v))
    }
}

impl From<u64> for Nat {
    fn from(v: u64) -> Self {
        Nat(v)
    }
}
