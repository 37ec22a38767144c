//! Faces: bidirectional byte-framed channels to a forwarder or peer.
//!
//! A face frames packets for the engine: stream transports carry a TLV
//! stream (parse a type-length header, read that many bytes, deliver the
//! frame), message transports deliver one frame per message. Received
//! frames and state changes flow to the engine through a bounded event
//! channel; a full channel blocks the receive loop, which is the
//! backpressure path.

mod dummy;
mod stream;
mod ws;

pub use dummy::DummyFace;
pub use stream::{StreamFace, StreamTarget};
pub use ws::WsFace;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use rust_ndn_common::wire::Wire;
use rust_ndn_common::{Error, Result};
use tokio::sync::mpsc;

/// Largest frame a face will accept before declaring the stream corrupt.
pub const MAX_FRAME_SIZE: usize = 1 << 20;

/// Events a face delivers to its engine.
#[derive(Debug, Clone)]
pub enum FaceEvent {
    /// One complete TLV frame.
    Frame(Bytes),
    /// The transport came (back) up.
    Up,
    /// The transport went down, with the cause if known.
    Down(Option<String>),
    /// The face was closed locally.
    Closed,
}

/// A face. `open` dials the transport and starts the receive loop;
/// `send` is safe to call from any task.
#[async_trait]
pub trait Face: Send + Sync {
    fn is_running(&self) -> bool;
    fn is_local(&self) -> bool;
    async fn open(&self, events: mpsc::Sender<FaceEvent>) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn send(&self, frame: Wire) -> Result<()>;
}

// Peeks a TLV number at `off`; returns (value, encoded size).
fn peek_varnum(buf: &[u8], off: usize) -> Option<(u64, usize)> {
    let first = *buf.get(off)?;
    match first {
        0..=0xFC => Some((first as u64, 1)),
        0xFD => {
            let b: [u8; 2] = buf.get(off + 1..off + 3)?.try_into().ok()?;
            Some((u16::from_be_bytes(b) as u64, 3))
        }
        0xFE => {
            let b: [u8; 4] = buf.get(off + 1..off + 5)?.try_into().ok()?;
            Some((u32::from_be_bytes(b) as u64, 5))
        }
        0xFF => {
            let b: [u8; 8] = buf.get(off + 1..off + 9)?.try_into().ok()?;
            Some((u64::from_be_bytes(b), 9))
        }
    }
}

/// Extracts the next complete frame from a TLV stream buffer, if one has
/// fully arrived.
pub(crate) fn extract_frame(buf: &mut BytesMut) -> Result<Option<Bytes>> {
    let Some((_typ, tn)) = peek_varnum(buf, 0) else {
        return Ok(None);
    };
    let Some((len, ln)) = peek_varnum(buf, tn) else {
        return Ok(None);
    };
    let total = tn + ln + len as usize;
    if total > MAX_FRAME_SIZE {
        return Err(Error::format(format!("frame of {total} bytes exceeds limit")));
    }
    if buf.len() < total {
        return Ok(None);
    }
    Ok(Some(buf.split_to(total).freeze()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_reassemble_across_arbitrary_chunking() {
        let frame_a = [0x05, 0x02, 0xAA, 0xBB];
        let frame_b = [0x06, 0x01, 0xCC];
        let stream: Vec<u8> = frame_a.iter().chain(frame_b.iter()).copied().collect();

        for split in 0..=stream.len() {
            let mut buf = BytesMut::new();
            let mut frames = Vec::new();
            buf.extend_from_slice(&stream[..split]);
            while let Some(f) = extract_frame(&mut buf).unwrap() {
                frames.push(f);
            }
            buf.extend_from_slice(&stream[split..]);
            while let Some(f) = extract_frame(&mut buf).unwrap() {
                frames.push(f);
            }
            assert_eq!(frames.len(), 2);
            assert_eq!(&frames[0][..], &frame_a[..]);
            assert_eq!(&frames[1][..], &frame_b[..]);
        }
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x05, 0xFE, 0x7F, 0xFF, 0xFF, 0xFF]);
        assert!(extract_frame(&mut buf).is_err());
    }

    #[test]
    fn incomplete_header_waits() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x05, 0xFD]);
        assert!(extract_frame(&mut buf).unwrap().is_none());
    }
}
