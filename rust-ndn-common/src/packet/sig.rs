//! Signature metadata shared by Interest and Data.

use crate::error::Error;
use crate::name::Name;
use crate::packet::{
    TLV_KEY_DIGEST, TLV_KEY_LOCATOR, TLV_SIG_NONCE, TLV_SIG_SEQ_NUM, TLV_SIG_TIME, TLV_SIG_TYPE,
};
use crate::tlv::{Nat, VarNum};
use crate::wire::WireView;
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

/// Recognized signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
    HmacWithSha256,
    Ed25519,
    /// Used by tests only; carries no cryptographic meaning.
    EmptyTest,
    Unknown(u64),
}

impl SigType {
    pub fn to_num(self) -> u64 {
        match self {
            SigType::DigestSha256 => 0,
            SigType::Sha256WithRsa => 1,
            SigType::Sha256WithEcdsa => 3,
            SigType::HmacWithSha256 => 4,
            SigType::Ed25519 => 5,
            SigType::EmptyTest => 200,
            SigType::Unknown(v) => v,
        }
    }

    pub fn from_num(v: u64) -> Self {
        match v {
            0 => SigType::DigestSha256,
            1 => SigType::Sha256WithRsa,
            3 => SigType::Sha256WithEcdsa,
            4 => SigType::HmacWithSha256,
            5 => SigType::Ed25519,
            200 => SigType::EmptyTest,
            other => SigType::Unknown(other),
        }
    }
}

/// Identifies the key needed to validate a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Bytes),
}

/// Signature metadata. The same structure serves Data (type 0x16) and
/// signed Interests (type 0x2C); the outer type is supplied by the
/// packet model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub sig_type: SigType,
    pub key_locator: Option<KeyLocator>,
    pub nonce: Option<Bytes>,
    pub time: Option<Duration>,
    pub seq_num: Option<u64>,
}

impl SignatureInfo {
    pub fn new(sig_type: SigType) -> Self {
        Self {
            sig_type,
            key_locator: None,
            nonce: None,
            time: None,
            seq_num: None,
        }
    }

    pub fn with_key_locator(mut self, kl: KeyLocator) -> Self {
        self.key_locator = Some(kl);
        self
    }

    fn body_length(&self) -> usize {
        let mut len = tl_nat(TLV_SIG_TYPE, self.sig_type.to_num());
        if let Some(kl) = &self.key_locator {
            let inner = match kl {
                KeyLocator::Name(name) => name.encoding_length(),
                KeyLocator::KeyDigest(d) => tl_bytes(TLV_KEY_DIGEST, d.len()),
            };
            len += tl_bytes(TLV_KEY_LOCATOR, inner);
        }
        if let Some(nonce) = &self.nonce {
            len += tl_bytes(TLV_SIG_NONCE, nonce.len());
        }
        if let Some(time) = &self.time {
            len += tl_nat(TLV_SIG_TIME, time.as_millis() as u64);
        }
        if let Some(seq) = self.seq_num {
            len += tl_nat(TLV_SIG_SEQ_NUM, seq);
        }
        len
    }

    /// Size of the full element under the given outer type.
    pub fn encoding_length(&self, outer: u64) -> usize {
        let body = self.body_length();
        VarNum(outer).size() + VarNum(body as u64).size() + body
    }

    pub fn write_to(&self, buf: &mut BytesMut, outer: u64) {
        VarNum(outer).write_to(buf);
        VarNum(self.body_length() as u64).write_to(buf);
        write_nat(buf, TLV_SIG_TYPE, self.sig_type.to_num());
        if let Some(kl) = &self.key_locator {
            match kl {
                KeyLocator::Name(name) => {
                    VarNum(TLV_KEY_LOCATOR).write_to(buf);
                    VarNum(name.encoding_length() as u64).write_to(buf);
                    buf.put_slice(&name.bytes());
                }
                KeyLocator::KeyDigest(d) => {
                    VarNum(TLV_KEY_LOCATOR).write_to(buf);
                    VarNum(tl_bytes(TLV_KEY_DIGEST, d.len()) as u64).write_to(buf);
                    VarNum(TLV_KEY_DIGEST).write_to(buf);
                    VarNum(d.len() as u64).write_to(buf);
                    buf.put_slice(d);
                }
            }
        }
        if let Some(nonce) = &self.nonce {
            VarNum(TLV_SIG_NONCE).write_to(buf);
            VarNum(nonce.len() as u64).write_to(buf);
            buf.put_slice(nonce);
        }
        if let Some(time) = &self.time {
            write_nat(buf, TLV_SIG_TIME, time.as_millis() as u64);
        }
        if let Some(seq) = self.seq_num {
            write_nat(buf, TLV_SIG_SEQ_NUM, seq);
        }
    }

    /// Parses the element body (the outer header is already consumed).
    pub fn decode_body(view: &mut WireView<'_>) -> Result<Self> {
        let mut info = SignatureInfo::new(SigType::Unknown(u64::MAX));
        let mut seen_type = false;
        while !view.is_eof() {
            let typ = VarNum::read_from(view)?.0;
            let len = VarNum::read_from(view)?.0 as usize;
            match typ {
                TLV_SIG_TYPE => {
                    info.sig_type = SigType::from_num(Nat::read_from(view, len)?.0);
                    seen_type = true;
                }
                TLV_KEY_LOCATOR => {
                    let mut body = view.delegate(len)?;
                    let mut peek = body;
                    let inner = VarNum::read_from(&mut peek)?.0;
                    info.key_locator = Some(if inner == TLV_KEY_DIGEST {
                        VarNum::read_from(&mut body)?;
                        let dlen = VarNum::read_from(&mut body)?.0 as usize;
                        KeyLocator::KeyDigest(body.read_buf(dlen)?)
                    } else {
                        KeyLocator::Name(Name::decode_from(&mut body)?)
                    });
                }
                TLV_SIG_NONCE => info.nonce = Some(view.read_buf(len)?),
                TLV_SIG_TIME => {
                    info.time = Some(Duration::from_millis(Nat::read_from(view, len)?.0))
                }
                TLV_SIG_SEQ_NUM => info.seq_num = Some(Nat::read_from(view, len)?.0),
                other => crate::codec::skip_unknown(view, other, len)?,
            }
        }
        if !seen_type {
            return Err(Error::SkipRequired("SignatureType"));
        }
        Ok(info)
    }
}

fn tl_nat(typ: u64, v: u64) -> usize {
    let n = Nat(v).size();
    VarNum(typ).size() + VarNum(n as u64).size() + n
}

fn tl_bytes(typ: u64, len: usize) -> usize {
    VarNum(typ).size() + VarNum(len as u64).size() + len
}

fn write_nat(buf: &mut BytesMut, typ: u64, v: u64) {
    VarNum(typ).write_to(buf);
    VarNum(Nat(v).size() as u64).write_to(buf);
    Nat(v).write_to(buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_key_name() {
        let info = SignatureInfo::new(SigType::Ed25519)
            .with_key_locator(KeyLocator::Name("/keys/alice/KEY/1".parse().unwrap()));
        let mut buf = BytesMut::new();
        info.write_to(&mut buf, crate::packet::TLV_SIG_INFO);
        assert_eq!(buf.len(), info.encoding_length(crate::packet::TLV_SIG_INFO));

        let segs = [buf.freeze()];
        let mut view = WireView::new(&segs);
        let typ = VarNum::read_from(&mut view).unwrap().0;
        assert_eq!(typ, crate::packet::TLV_SIG_INFO);
        let len = VarNum::read_from(&mut view).unwrap().0 as usize;
        let mut body = view.delegate(len).unwrap();
        let parsed = SignatureInfo::decode_body(&mut body).unwrap();
        assert_eq!(parsed, info);
    }

    #[test]
    fn round_trip_with_key_digest() {
        let info = SignatureInfo::new(SigType::HmacWithSha256)
            .with_key_locator(KeyLocator::KeyDigest(Bytes::from_static(&[7u8; 32])));
        let mut buf = BytesMut::new();
        info.write_to(&mut buf, crate::packet::TLV_INTEREST_SIG_INFO);
        let segs = [buf.freeze()];
        let mut view = WireView::new(&segs);
        VarNum::read_from(&mut view).unwrap();
        let len = VarNum::read_from(&mut view).unwrap().0 as usize;
        let mut body = view.delegate(len).unwrap();
        assert_eq!(SignatureInfo::decode_body(&mut body).unwrap(), info);
    }

    #[test]
    fn sig_type_numbers() {
        assert_eq!(SigType::DigestSha256.to_num(), 0);
        assert_eq!(SigType::Sha256WithRsa.to_num(), 1);
        assert_eq!(SigType::Sha256WithEcdsa.to_num(), 3);
        assert_eq!(SigType::HmacWithSha256.to_num(), 4);
        assert_eq!(SigType::Ed25519.to_num(), 5);
        assert_eq!(SigType::from_num(7), SigType::Unknown(7));
    }
}
