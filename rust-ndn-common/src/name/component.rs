//! Typed name components, URI conventions and patterns.

use crate::codec::TlvWriter;
use crate::error::Error;
use crate::tlv::{Nat, VarNum};
use crate::wire::WireView;
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const TYPE_IMPLICIT_SHA256_DIGEST: u64 = 0x01;
pub const TYPE_PARAMETERS_SHA256_DIGEST: u64 = 0x02;
pub const TYPE_GENERIC: u64 = 0x08;
pub const TYPE_KEYWORD: u64 = 0x20;
pub const TYPE_SEGMENT: u64 = 0x32;
pub const TYPE_BYTE_OFFSET: u64 = 0x34;
pub const TYPE_VERSION: u64 = 0x36;
pub const TYPE_TIMESTAMP: u64 = 0x38;
pub const TYPE_SEQUENCE_NUM: u64 = 0x3A;

// Registered naming conventions: URI shorthand <-> component type.
const CONVENTIONS: &[(&str, u64)] = &[
    ("seg", TYPE_SEGMENT),
    ("off", TYPE_BYTE_OFFSET),
    ("v", TYPE_VERSION),
    ("t", TYPE_TIMESTAMP),
    ("seq", TYPE_SEQUENCE_NUM),
    ("sha256digest", TYPE_IMPLICIT_SHA256_DIGEST),
    ("params-sha256", TYPE_PARAMETERS_SHA256_DIGEST),
];

fn convention_name(typ: u64) -> Option<&'static str> {
    CONVENTIONS.iter().find(|(_, t)| *t == typ).map(|(n, _)| *n)
}

fn convention_type(name: &str) -> Option<u64> {
    CONVENTIONS.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
}

/// Whether convention shorthand is rendered in URIs. Disabled with
/// `NDN_NAME_ALT_URI=0` in the environment.
pub fn alt_uri_enabled() -> bool {
    static ENABLED: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var("NDN_NAME_ALT_URI").map_or(true, |v| v != "0"))
}

/// One typed component of a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Component {
    pub typ: u64,
    pub value: Bytes,
}

impl Component {
    pub fn new(typ: u64, value: impl Into<Bytes>) -> Self {
        Self {
            typ,
            value: value.into(),
        }
    }

    /// The zero component, returned by out-of-range indexing.
    pub fn zero() -> Self {
        Self {
            typ: 0,
            value: Bytes::new(),
        }
    }

    pub fn generic(text: &str) -> Self {
        Self::new(TYPE_GENERIC, text.as_bytes().to_vec())
    }

    pub fn keyword(text: &str) -> Self {
        Self::new(TYPE_KEYWORD, text.as_bytes().to_vec())
    }

    pub fn segment(n: u64) -> Self {
        Self::number(TYPE_SEGMENT, n)
    }

    pub fn byte_offset(n: u64) -> Self {
        Self::number(TYPE_BYTE_OFFSET, n)
    }

    pub fn version(n: u64) -> Self {
        Self::number(TYPE_VERSION, n)
    }

    pub fn timestamp(n: u64) -> Self {
        Self::number(TYPE_TIMESTAMP, n)
    }

    pub fn sequence_num(n: u64) -> Self {
        Self::number(TYPE_SEQUENCE_NUM, n)
    }

    pub fn implicit_digest(digest: impl Into<Bytes>) -> Self {
        Self::new(TYPE_IMPLICIT_SHA256_DIGEST, digest)
    }

    pub fn params_digest(digest: impl Into<Bytes>) -> Self {
        Self::new(TYPE_PARAMETERS_SHA256_DIGEST, digest)
    }

    /// A component carrying a big-endian number payload.
    pub fn number(typ: u64, n: u64) -> Self {
        let mut buf = BytesMut::with_capacity(8);
        Nat(n).write_to(&mut buf);
        Self::new(typ, buf.freeze())
    }

    /// Decodes the value as a big-endian number, if it is one.
    pub fn to_num(&self) -> Option<u64> {
        if self.value.is_empty() || self.value.len() > 8 {
            return None;
        }
        let mut v = 0u64;
        for &b in self.value.iter() {
            v = (v << 8) | b as u64;
        }
        Some(v)
    }

    pub fn encoding_length(&self) -> usize {
        VarNum(self.typ).size() + VarNum(self.value.len() as u64).size() + self.value.len()
    }

    pub fn write_to(&self, buf: &mut BytesMut) {
        VarNum(self.typ).write_to(buf);
        VarNum(self.value.len() as u64).write_to(buf);
        buf.put_slice(&self.value);
    }

    pub fn write_to_writer(&self, w: &mut TlvWriter) {
        w.put_tl(self.typ, self.value.len());
        w.put_slice(&self.value);
    }

    /// The component's full TLV encoding.
    pub fn bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoding_length());
        self.write_to(&mut buf);
        buf.freeze()
    }

    pub fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let typ = VarNum::read_from(view)?.0;
        let len = VarNum::read_from(view)?.0 as usize;
        let value = view.read_buf(len)?;
        if typ == 0 {
            return Err(Error::format("component type must be nonzero"));
        }
        Ok(Self { typ, value })
    }

    /// Canonical order: by type, then by value length, then
    /// lexicographically on value bytes.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then(self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }

    fn write_uri(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if alt_uri_enabled() {
            if let Some(conv) = convention_name(self.typ) {
                return match self.typ {
                    TYPE_IMPLICIT_SHA256_DIGEST | TYPE_PARAMETERS_SHA256_DIGEST => {
                        write!(f, "{}={}", conv, hex::encode(&self.value))
                    }
                    _ => match self.to_num() {
                        Some(n) => write!(f, "{conv}={n}"),
                        None => write!(f, "{}={}", self.typ, escape(&self.value)),
                    },
                };
            }
        }
        match self.typ {
            TYPE_GENERIC => write!(f, "{}", escape(&self.value)),
            _ => write!(f, "{}={}", self.typ, escape(&self.value)),
        }
    }
}

impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical_cmp(other)
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_uri(f)
    }
}

impl FromStr for Component {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        if text.is_empty() {
            return Err(Error::format("empty name component"));
        }
        let (typ, body) = match text.split_once('=') {
            Some((pre, rest)) => {
                if let Ok(n) = pre.parse::<u64>() {
                    (n, rest)
                } else if let Some(t) = convention_type(pre) {
                    (t, rest)
                } else {
                    // Not a recognized prefix: the whole text is generic.
                    (TYPE_GENERIC, text)
                }
            }
            None => (TYPE_GENERIC, text),
        };
        let value: Bytes = match typ {
            TYPE_IMPLICIT_SHA256_DIGEST | TYPE_PARAMETERS_SHA256_DIGEST
                if body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()) =>
            {
                hex::decode(body)
                    .map_err(|e| Error::format(format!("bad digest component: {e}")))?
                    .into()
            }
            TYPE_SEGMENT | TYPE_BYTE_OFFSET | TYPE_VERSION | TYPE_TIMESTAMP
            | TYPE_SEQUENCE_NUM
                if body.bytes().all(|b| b.is_ascii_digit()) && !body.is_empty() =>
            {
                let n: u64 = body
                    .parse()
                    .map_err(|e| Error::format(format!("bad number component: {e}")))?;
                let mut buf = BytesMut::with_capacity(8);
                Nat(n).write_to(&mut buf);
                buf.freeze()
            }
            _ => unescape(body)?,
        };
        if typ == 0 {
            return Err(Error::format("component type must be nonzero"));
        }
        Ok(Self { typ, value })
    }
}

/* ---------------------------------------------------------------- *
 * URI percent-encoding
 * ---------------------------------------------------------------- */

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-')
}

fn escape(value: &[u8]) -> String {
    // A value of zero or more periods gains three extra periods.
    if value.iter().all(|&b| b == b'.') {
        let mut s = String::from("...");
        s.push_str(std::str::from_utf8(value).unwrap_or(""));
        return s;
    }
    let mut out = String::with_capacity(value.len());
    for &b in value {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push_str(&format!("{b:02X}"));
        }
    }
    out
}

fn unescape(text: &str) -> Result<Bytes> {
    let raw = text.as_bytes();
    if raw.iter().all(|&b| b == b'.') {
        if raw.len() < 3 {
            return Err(Error::format(format!("invalid component \"{text}\"")));
        }
        return Ok(Bytes::copy_from_slice(&raw[3..]));
    }
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if i + 3 > raw.len() {
                return Err(Error::format("truncated percent escape"));
            }
            let hi = (raw[i + 1] as char)
                .to_digit(16)
                .ok_or_else(|| Error::format("bad percent escape"))?;
            let lo = (raw[i + 2] as char)
                .to_digit(16)
                .ok_or_else(|| Error::format("bad percent escape"))?;
            out.push((hi * 16 + lo) as u8);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(out.into())
}

/* ---------------------------------------------------------------- *
 * Patterns
 * ---------------------------------------------------------------- */

/// A placeholder component: matches any component of its type and binds
/// it to a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub typ: u64,
    pub tag: String,
}

/// One element of a name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternItem {
    Component(Component),
    Pattern(Pattern),
}

impl PatternItem {
    /// Canonical order; a concrete component sorts before any pattern.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PatternItem::Component(a), PatternItem::Component(b)) => a.canonical_cmp(b),
            (PatternItem::Component(_), PatternItem::Pattern(_)) => Ordering::Less,
            (PatternItem::Pattern(_), PatternItem::Component(_)) => Ordering::Greater,
            (PatternItem::Pattern(a), PatternItem::Pattern(b)) => {
                a.typ.cmp(&b.typ).then_with(|| a.tag.cmp(&b.tag))
            }
        }
    }
}

/// A name pattern: a sequence of concrete components and placeholders.
/// Placeholders are written `<type=tag>` in URI form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamePattern(pub Vec<PatternItem>);

impl NamePattern {
    /// Matches `name` component-wise and returns tag bindings, or `None`
    /// if the pattern does not match.
    pub fn bind(&self, name: &super::Name) -> Option<Vec<(String, Component)>> {
        if name.len() != self.0.len() {
            return None;
        }
        let mut bound = Vec::new();
        for (item, comp) in self.0.iter().zip(name.iter()) {
            match item {
                PatternItem::Component(c) => {
                    if c != comp {
                        return None;
                    }
                }
                PatternItem::Pattern(p) => {
                    if p.typ != comp.typ {
                        return None;
                    }
                    bound.push((p.tag.clone(), comp.clone()));
                }
            }
        }
        Some(bound)
    }

    pub fn matches(&self, name: &super::Name) -> bool {
        self.bind(name).is_some()
    }
}

impl FromStr for NamePattern {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let mut items = Vec::new();
        for part in text.trim_matches('/').split('/') {
            if part.is_empty() {
                continue;
            }
            if let Some(inner) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                let (typ_text, tag) = inner
                    .split_once('=')
                    .ok_or_else(|| Error::format(format!("bad pattern \"{part}\"")))?;
                let typ = typ_text
                    .parse::<u64>()
                    .ok()
                    .or_else(|| convention_type(typ_text))
                    .ok_or_else(|| Error::format(format!("bad pattern type \"{typ_text}\"")))?;
                items.push(PatternItem::Pattern(Pattern {
                    typ,
                    tag: tag.to_string(),
                }));
            } else {
                items.push(PatternItem::Component(part.parse()?));
            }
        }
        Ok(NamePattern(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_conventions_round_trip() {
        for (text, typ, num) in [
            ("seg=13", TYPE_SEGMENT, 13u64),
            ("off=9000", TYPE_BYTE_OFFSET, 9000),
            ("v=1756", TYPE_VERSION, 1756),
            ("t=1570430517101", TYPE_TIMESTAMP, 1570430517101),
            ("seq=3", TYPE_SEQUENCE_NUM, 3),
        ] {
            let c: Component = text.parse().unwrap();
            assert_eq!(c.typ, typ);
            assert_eq!(c.to_num(), Some(num));
            assert_eq!(c.to_string(), text);
        }
    }

    #[test]
    fn digest_components_use_hex() {
        let hexstr = "a".repeat(64);
        let c: Component = format!("sha256digest={hexstr}").parse().unwrap();
        assert_eq!(c.typ, TYPE_IMPLICIT_SHA256_DIGEST);
        assert_eq!(c.value.len(), 32);
        assert_eq!(c.to_string(), format!("sha256digest={hexstr}"));
    }

    #[test]
    fn generic_percent_escaping() {
        let c: Component = "hello%20world".parse().unwrap();
        assert_eq!(&c.value[..], b"hello world");
        assert_eq!(c.to_string(), "hello%20world");

        let c: Component = "a.b_c~d-e".parse().unwrap();
        assert_eq!(c.to_string(), "a.b_c~d-e");
    }

    #[test]
    fn period_components() {
        let c: Component = "...".parse().unwrap();
        assert!(c.value.is_empty());
        assert_eq!(c.to_string(), "...");

        let c: Component = "....".parse().unwrap();
        assert_eq!(&c.value[..], b".");
        assert_eq!(c.to_string(), "....");
    }

    #[test]
    fn explicit_type_prefix() {
        let c: Component = "42=abc".parse().unwrap();
        assert_eq!(c.typ, 42);
        assert_eq!(&c.value[..], b"abc");
        assert_eq!(c.to_string(), "42=abc");
    }

    #[test]
    fn canonical_order() {
        let a = Component::generic("a");
        let b = Component::generic("b");
        let aa = Component::generic("aa");
        let v = Component::version(1);
        assert!(a < b);
        assert!(b < aa); // shorter sorts first
        assert!(a < v); // lower type sorts first
    }

    #[test]
    fn pattern_binds_tags() {
        let pat: NamePattern = "/ndn/<8=node>/DV/<v=ver>".parse().unwrap();
        let name: super::super::Name = "/ndn/router1/DV/v=7".parse().unwrap();
        let bound = pat.bind(&name).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].0, "node");
        assert_eq!(bound[1].1.to_num(), Some(7));
        let other: super::super::Name = "/ndn/router1/DV/seg=7".parse().unwrap();
        assert!(!pat.matches(&other));
    }

    #[test]
    fn component_before_pattern_in_canonical_order() {
        let c = PatternItem::Component(Component::generic("zzz"));
        let p = PatternItem::Pattern(Pattern {
            typ: TYPE_GENERIC,
            tag: "a".into(),
        });
        assert_eq!(c.canonical_cmp(&p), Ordering::Less);
    }
}
