//! Segmented packet buffers and the parsing cursor.
//!
//! A `Wire` is an ordered sequence of byte buffers whose logical
//! concatenation forms one packet. Keeping packets segmented lets
//! encoders retain large payloads by reference instead of copying them
//! into a contiguous allocation.
//!
//! `WireView` is a value-typed cursor over a `Wire`. It is `Copy`:
//! branching a parse is done by copying the cursor, not by allocating.

use crate::error::Error;
use crate::Result;
use bytes::{Bytes, BytesMut};

/// An ordered sequence of buffers forming one logical packet.
pub type Wire = Vec<Bytes>;

/// Total byte length of a wire.
pub fn wire_len(wire: &[Bytes]) -> usize {
    wire.iter().map(|s| s.len()).sum()
}

/// Joins a wire into one contiguous buffer. A single-segment wire is
/// returned without copying.
pub fn wire_join(wire: &[Bytes]) -> Bytes {
    match wire.len() {
        0 => Bytes::new(),
        1 => wire[0].clone(),
        _ => {
            let mut buf = BytesMut::with_capacity(wire_len(wire));
            for seg in wire {
                buf.extend_from_slice(seg);
            }
            buf.freeze()
        }
    }
}

/// A bounds-checked cursor over a segmented wire.
///
/// The cursor tracks an absolute position, the current segment and the
/// offset within it, and an `end` bound. A cursor produced by
/// [`WireView::delegate`] shares the underlying segments with its parent
/// but cannot read past its own bound.
#[derive(Debug, Clone, Copy)]
pub struct WireView<'a> {
    segs: &'a [Bytes],
    seg: usize,
    off: usize,
    pos: usize,
    end: usize,
}

impl<'a> WireView<'a> {
    /// A cursor over the whole wire.
    pub fn new(segs: &'a [Bytes]) -> Self {
        let end = wire_len(segs);
        let mut view = Self {
            segs,
            seg: 0,
            off: 0,
            pos: 0,
            end,
        };
        view.normalize();
        view
    }

    /// Absolute position from the start of the wire.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left before the cursor's bound.
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// True once every byte within the bound has been consumed.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.end
    }

    fn normalize(&mut self) {
        while self.seg < self.segs.len() && self.off == self.segs[self.seg].len() {
            self.seg += 1;
            self.off = 0;
        }
    }

    fn overflow(&self, needed: usize) -> Error {
        Error::BufferOverflow {
            needed,
            available: self.remaining(),
        }
    }

    // Advance by `n` bytes. The caller has already checked `remaining`.
    fn advance(&mut self, mut n: usize) {
        self.pos += n;
        while n > 0 {
            let avail = self.segs[self.seg].len() - self.off;
            if n < avail {
                self.off += n;
                n = 0;
            } else {
                n -= avail;
                self.seg += 1;
                self.off = 0;
            }
        }
        self.normalize();
    }

    /// Reads one byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(self.overflow(1));
        }
        let b = self.segs[self.seg][self.off];
        self.advance(1);
        Ok(b)
    }

    /// Fills `out` completely, crossing segment boundaries as needed.
    pub fn read_full(&mut self, out: &mut [u8]) -> Result<()> {
        if self.remaining() < out.len() {
            return Err(self.overflow(out.len()));
        }
        let mut copied = 0;
        while copied < out.len() {
            let seg = &self.segs[self.seg];
            let n = (seg.len() - self.off).min(out.len() - copied);
            out[copied..copied + n].copy_from_slice(&seg[self.off..self.off + n]);
            copied += n;
            self.advance(n);
        }
        Ok(())
    }

    /// Advances past `n` bytes without reading them.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        if self.remaining() < n {
            return Err(self.overflow(n));
        }
        self.advance(n);
        Ok(())
    }

    /// Reads `n` bytes as one buffer. When the request fits inside the
    /// current segment the result shares its storage; otherwise the bytes
    /// are copied into a fresh buffer.
    pub fn read_buf(&mut self, n: usize) -> Result<Bytes> {
        if self.remaining() < n {
            return Err(self.overflow(n));
        }
        if n == 0 {
            return Ok(Bytes::new());
        }
        let seg = &self.segs[self.seg];
        if seg.len() - self.off >= n {
            let out = seg.slice(self.off..self.off + n);
            self.advance(n);
            return Ok(out);
        }
        let mut out = vec![0u8; n];
        self.read_full(&mut out)?;
        Ok(Bytes::from(out))
    }

    /// Reads `n` bytes as a wire of borrowed segment slices. No bytes are
    /// copied regardless of how the request crosses segments.
    pub fn read_wire(&mut self, n: usize) -> Result<Wire> {
        if self.remaining() < n {
            return Err(self.overflow(n));
        }
        let mut out = Wire::new();
        let mut left = n;
        while left > 0 {
            let seg = &self.segs[self.seg];
            let take = (seg.len() - self.off).min(left);
            out.push(seg.slice(self.off..self.off + take));
            self.advance(take);
            left -= take;
        }
        Ok(out)
    }

    /// Produces a sub-cursor restricted to the next `n` bytes and advances
    /// this cursor past them. The child shares the underlying wire; its
    /// bound enforces containment.
    pub fn delegate(&mut self, n: usize) -> Result<WireView<'a>> {
        if self.remaining() < n {
            return Err(self.overflow(n));
        }
        let mut child = *self;
        child.end = self.pos + n;
        self.advance(n);
        Ok(child)
    }

    /// A non-consuming slice of the wire between two absolute positions,
    /// as borrowed segment slices. Used to capture signature-covered byte
    /// ranges.
    pub fn range(&self, start: usize, end: usize) -> Wire {
        let mut out = Wire::new();
        let mut base = 0;
        for seg in self.segs {
            let s0 = base;
            let s1 = base + seg.len();
            base = s1;
            if s1 <= start {
                continue;
            }
            if s0 >= end {
                break;
            }
            let a = start.max(s0) - s0;
            let b = end.min(s1) - s0;
            if a < b {
                out.push(seg.slice(a..b));
            }
        }
        out
    }
}
