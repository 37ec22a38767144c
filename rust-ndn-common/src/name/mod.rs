//! Names: ordered sequences of typed components.
//!
//! Names carry canonical comparison, 64-bit hashing of the inner TLV
//! encoding (per-prefix hashes for trie lookups), URI parsing and the
//! implicit-digest and version helpers used throughout the stack.

mod component;

pub use component::{
    alt_uri_enabled, Component, NamePattern, Pattern, PatternItem, TYPE_BYTE_OFFSET, TYPE_GENERIC,
    TYPE_IMPLICIT_SHA256_DIGEST, TYPE_KEYWORD, TYPE_PARAMETERS_SHA256_DIGEST, TYPE_SEGMENT,
    TYPE_SEQUENCE_NUM, TYPE_TIMESTAMP, TYPE_VERSION,
};

use crate::codec::TlvWriter;
use crate::error::Error;
use crate::tlv::VarNum;
use crate::wire::WireView;
use crate::Result;
use bytes::{Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};
use xxhash_rust::xxh3::Xxh3;

/// TLV type of a Name element.
pub const TLV_NAME: u64 = 0x07;

/// Sentinel for [`Name::with_version`]: use the current unix-microsecond
/// reading.
pub const VERSION_UNIX_MICRO: u64 = u64::MAX;
/// Sentinel for [`Name::with_version`]: version zero, an immutable object.
pub const VERSION_IMMUTABLE: u64 = 0;

/// An ordered sequence of typed components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    comps: Vec<Component>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(comps: Vec<Component>) -> Self {
        Self { comps }
    }

    pub fn len(&self) -> usize {
        self.comps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.comps.iter()
    }

    pub fn as_slice(&self) -> &[Component] {
        &self.comps
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.comps.get(index)
    }

    /// Component at `i`; negative indices count from the end. Out of
    /// range yields the zero component.
    pub fn at(&self, i: isize) -> Component {
        let idx = if i < 0 {
            self.comps.len() as isize + i
        } else {
            i
        };
        if idx < 0 || idx as usize >= self.comps.len() {
            return Component::zero();
        }
        self.comps[idx as usize].clone()
    }

    pub fn push(&mut self, comp: Component) -> &mut Self {
        self.comps.push(comp);
        self
    }

    /// Builder-style append.
    pub fn append(mut self, comp: Component) -> Self {
        self.comps.push(comp);
        self
    }

    /// Builder-style concatenation of another name.
    pub fn append_name(mut self, other: &Name) -> Self {
        self.comps.extend(other.comps.iter().cloned());
        self
    }

    pub fn prefix(&self, len: usize) -> Self {
        Self {
            comps: self.comps.iter().take(len).cloned().collect(),
        }
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.comps.len() <= other.comps.len()
            && self.comps.iter().zip(other.comps.iter()).all(|(a, b)| a == b)
    }

    /// Canonical order: component-wise; a proper prefix sorts first.
    pub fn canonical_cmp(&self, other: &Name) -> Ordering {
        for (a, b) in self.comps.iter().zip(other.comps.iter()) {
            match a.canonical_cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.comps.len().cmp(&other.comps.len())
    }

    /* ------------------------------------------------------------ *
     * Encoding
     * ------------------------------------------------------------ */

    /// Length of the inner component sequence.
    pub fn inner_length(&self) -> usize {
        self.comps.iter().map(|c| c.encoding_length()).sum()
    }

    /// Length of the full Name TLV.
    pub fn encoding_length(&self) -> usize {
        let inner = self.inner_length();
        VarNum(TLV_NAME).size() + VarNum(inner as u64).size() + inner
    }

    pub fn write_inner_to(&self, buf: &mut BytesMut) {
        for c in &self.comps {
            c.write_to(buf);
        }
    }

    /// Just the component sequence, used wherever a name is a TLV
    /// payload.
    pub fn bytes_inner(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.inner_length());
        self.write_inner_to(&mut buf);
        buf.freeze()
    }

    /// The full Name TLV.
    pub fn bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoding_length());
        VarNum(TLV_NAME).write_to(&mut buf);
        VarNum(self.inner_length() as u64).write_to(&mut buf);
        self.write_inner_to(&mut buf);
        buf.freeze()
    }

    pub fn write_to_writer(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_NAME, self.inner_length());
        for c in &self.comps {
            c.write_to_writer(w);
        }
    }

    /// Parses a full Name TLV.
    pub fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let typ = VarNum::read_from(view)?.0;
        if typ != TLV_NAME {
            return Err(Error::format(format!("expected name, got type {typ}")));
        }
        let len = VarNum::read_from(view)?.0 as usize;
        let mut body = view.delegate(len)?;
        Self::decode_inner(&mut body)
    }

    /// Parses a bare component sequence until the view is exhausted.
    pub fn decode_inner(view: &mut WireView<'_>) -> Result<Self> {
        let mut comps = Vec::new();
        while !view.is_eof() {
            comps.push(Component::decode_from(view)?);
        }
        Ok(Self { comps })
    }

    /* ------------------------------------------------------------ *
     * Hashing
     * ------------------------------------------------------------ */

    /// 64-bit hash of the inner TLV encoding.
    pub fn hash_u64(&self) -> u64 {
        let mut h = Xxh3::new();
        let mut buf = BytesMut::new();
        for c in &self.comps {
            buf.clear();
            c.write_to(&mut buf);
            h.update(&buf);
        }
        h.digest()
    }

    /// Running hashes of every prefix: `r[k]` is the hash of the first
    /// `k` components. The result has `len() + 1` entries.
    pub fn prefix_hash(&self) -> Vec<u64> {
        let mut h = Xxh3::new();
        let mut out = Vec::with_capacity(self.comps.len() + 1);
        out.push(h.digest());
        let mut buf = BytesMut::new();
        for c in &self.comps {
            buf.clear();
            c.write_to(&mut buf);
            h.update(&buf);
            out.push(h.digest());
        }
        out
    }

    /* ------------------------------------------------------------ *
     * Derived names
     * ------------------------------------------------------------ */

    /// Appends an implicit-digest component holding the SHA-256 of the
    /// raw Data packet, unless the name already ends in one.
    pub fn to_full_name(&self, raw_data: &[u8]) -> Name {
        if self.at(-1).typ == TYPE_IMPLICIT_SHA256_DIGEST {
            return self.clone();
        }
        let digest = Sha256::digest(raw_data);
        self.clone()
            .append(Component::implicit_digest(digest.to_vec()))
    }

    /// Replaces or appends a trailing version component.
    /// [`VERSION_UNIX_MICRO`] selects a monotonic unix-microsecond
    /// reading; [`VERSION_IMMUTABLE`] selects version zero.
    pub fn with_version(&self, v: u64) -> Name {
        let v = match v {
            VERSION_UNIX_MICRO => unix_micro_monotonic(),
            other => other,
        };
        let mut out = self.clone();
        if out.at(-1).typ == TYPE_VERSION {
            out.comps.pop();
        }
        out.append(Component::version(v))
    }
}

// Unix microseconds, guaranteed to move strictly forward across calls.
fn unix_micro_monotonic() -> u64 {
    static LAST: AtomicU64 = AtomicU64::new(0);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0);
    LAST.fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |last| {
        Some(now.max(last + 1))
    })
    .map(|last| now.max(last + 1))
    .unwrap_or(now)
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.comps.is_empty() {
            return write!(f, "/");
        }
        for c in &self.comps {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut comps = Vec::new();
        for part in text.trim_matches('/').split('/') {
            if part.is_empty() {
                continue;
            }
            comps.push(part.parse()?);
        }
        Ok(Self { comps })
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> IntoIterator for &'a Name {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.comps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xxhash_rust::xxh3::xxh3_64;

    #[test]
    fn uri_round_trip() {
        for text in [
            "/example/testApp/randomData/t=1570430517101",
            "/ndn/router1/DV/v=42/seg=0",
            "/a/b%20c/...",
            "/",
        ] {
            let name: Name = text.parse().unwrap();
            assert_eq!(name.to_string(), text);
        }
    }

    #[test]
    fn encode_parse_round_trip() {
        let name: Name = "/example/testApp/randomData/t=1570430517101"
            .parse()
            .unwrap();
        let bytes = name.bytes();
        let segs = [bytes];
        let mut view = WireView::new(&segs);
        let parsed = Name::decode_from(&mut view).unwrap();
        assert_eq!(parsed, name);
        assert!(view.is_eof());
    }

    #[test]
    fn hash_depends_only_on_inner_bytes() {
        let a: Name = "/a/b/c".parse().unwrap();
        let b: Name = "/a/b/c".parse().unwrap();
        assert_eq!(a.hash_u64(), b.hash_u64());
        assert_eq!(a.hash_u64(), xxh3_64(&a.bytes_inner()));
    }

    #[test]
    fn prefix_hash_matches_prefix_hashes() {
        let name: Name = "/a/b/c/d".parse().unwrap();
        let hashes = name.prefix_hash();
        assert_eq!(hashes.len(), 5);
        for k in 0..=name.len() {
            assert_eq!(hashes[k], name.prefix(k).hash_u64());
        }
    }

    #[test]
    fn prefix_hash_detects_prefixes() {
        let a: Name = "/a/b".parse().unwrap();
        let b: Name = "/a/b/c".parse().unwrap();
        let c: Name = "/a/x/c".parse().unwrap();
        assert!(a.is_prefix_of(&b));
        assert_eq!(b.prefix_hash()[a.len()], a.hash_u64());
        assert!(!a.is_prefix_of(&c));
        assert_ne!(c.prefix_hash()[a.len()], a.hash_u64());
    }

    #[test]
    fn negative_indexing() {
        let name: Name = "/a/b/c".parse().unwrap();
        assert_eq!(name.at(-1), Component::generic("c"));
        assert_eq!(name.at(0), Component::generic("a"));
        assert_eq!(name.at(5), Component::zero());
        assert_eq!(name.at(-5), Component::zero());
    }

    #[test]
    fn full_name_appends_digest_once() {
        let name: Name = "/test".parse().unwrap();
        let raw = b"raw data packet bytes";
        let full = name.to_full_name(raw);
        assert_eq!(full.len(), 2);
        assert_eq!(full.at(-1).typ, TYPE_IMPLICIT_SHA256_DIGEST);
        assert_eq!(full.at(-1).value.len(), 32);
        // Already full: unchanged.
        assert_eq!(full.to_full_name(raw), full);
    }

    #[test]
    fn with_version_replaces_trailing_version() {
        let name: Name = "/obj".parse().unwrap();
        let v1 = name.with_version(7);
        assert_eq!(v1.at(-1).to_num(), Some(7));
        let v2 = v1.with_version(9);
        assert_eq!(v2.len(), 2);
        assert_eq!(v2.at(-1).to_num(), Some(9));
        let immutable = name.with_version(VERSION_IMMUTABLE);
        assert_eq!(immutable.at(-1).to_num(), Some(0));
        let now = name.with_version(VERSION_UNIX_MICRO);
        assert!(now.at(-1).to_num().unwrap() > 1_500_000_000_000_000);
    }

    #[test]
    fn canonical_name_order() {
        let a: Name = "/a".parse().unwrap();
        let ab: Name = "/a/b".parse().unwrap();
        let b: Name = "/b".parse().unwrap();
        assert!(a < ab);
        assert!(ab < b);
    }
}
