//! Interest packets and the signed-interest envelope.
//!
//! When ApplicationParameters are present the name gains a trailing
//! ParametersSha256Digest component covering the parameters and every
//! later element; encoding writes a placeholder and patches the digest
//! (and the signature, when signing) in the same buffer.

use crate::codec::{read_tl, skip_unknown, tl_size};
use crate::error::Error;
use crate::name::{Component, Name, TYPE_PARAMETERS_SHA256_DIGEST};
use crate::packet::sig::SignatureInfo;
use crate::packet::{
    TLV_APP_PARAM, TLV_CAN_BE_PREFIX, TLV_FORWARDING_HINT, TLV_HOP_LIMIT, TLV_INTEREST,
    TLV_INTEREST_LIFETIME, TLV_INTEREST_SIG_INFO, TLV_INTEREST_SIG_VALUE, TLV_MUST_BE_FRESH,
    TLV_NONCE,
};
use crate::security::Signer;
use crate::tlv::{Nat, VarNum};
use crate::wire::{Wire, WireView};
use crate::Result;
use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Default Interest lifetime.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(4);

/// An encoded Interest, its final name (with any parameters digest
/// filled in) and the signed-byte ranges.
#[derive(Debug, Clone)]
pub struct EncodedInterest {
    pub wire: Bytes,
    pub final_name: Name,
    pub sig_covered: Wire,
}

/// An Interest packet.
#[derive(Debug, Clone, Default)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub forwarding_hint: Vec<Name>,
    pub nonce: Option<u32>,
    pub lifetime: Option<Duration>,
    pub hop_limit: Option<u8>,
    pub app_param: Option<Bytes>,
    pub sig_info: Option<SignatureInfo>,
    pub sig_value: Option<Bytes>,
    /// The signed-byte ranges, populated by parsing.
    pub sig_covered: Wire,
}

impl PartialEq for Interest {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.can_be_prefix == other.can_be_prefix
            && self.must_be_fresh == other.must_be_fresh
            && self.forwarding_hint == other.forwarding_hint
            && self.nonce == other.nonce
            && self.lifetime == other.lifetime
            && self.hop_limit == other.hop_limit
            && self.app_param == other.app_param
            && self.sig_info == other.sig_info
            && self.sig_value == other.sig_value
    }
}

impl Interest {
    /// A fresh Interest with a random nonce and the default lifetime.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            nonce: Some(rand::random()),
            lifetime: Some(DEFAULT_LIFETIME),
            ..Default::default()
        }
    }

    pub fn with_can_be_prefix(mut self, v: bool) -> Self {
        self.can_be_prefix = v;
        self
    }

    pub fn with_must_be_fresh(mut self, v: bool) -> Self {
        self.must_be_fresh = v;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_hop_limit(mut self, limit: u8) -> Self {
        self.hop_limit = Some(limit);
        self
    }

    pub fn with_app_param(mut self, param: impl Into<Bytes>) -> Self {
        self.app_param = Some(param.into());
        self
    }

    pub fn lifetime_or_default(&self) -> Duration {
        self.lifetime.unwrap_or(DEFAULT_LIFETIME)
    }

    /// Encodes without signing. A parameters digest is still produced
    /// when ApplicationParameters are present.
    pub fn encode(&self) -> Result<EncodedInterest> {
        self.encode_inner(None)
    }

    /// Encodes as a signed Interest.
    pub fn sign_encode(&self, signer: &dyn Signer) -> Result<EncodedInterest> {
        self.encode_inner(Some(signer))
    }

    fn encode_inner(&self, signer: Option<&dyn Signer>) -> Result<EncodedInterest> {
        if self.name.is_empty() {
            return Err(Error::InvalidValue("interest name is empty".into()));
        }

        // A signed interest always carries parameters, possibly empty.
        let app_param = match (&self.app_param, signer.is_some()) {
            (Some(p), _) => Some(p.clone()),
            (None, true) => Some(Bytes::new()),
            (None, false) => None,
        };

        // Insert or strip the trailing parameters digest to match.
        let mut comps: Vec<Component> = self.name.iter().cloned().collect();
        let had_digest = comps
            .last()
            .is_some_and(|c| c.typ == TYPE_PARAMETERS_SHA256_DIGEST);
        if app_param.is_some() {
            let placeholder = Component::params_digest(vec![0u8; 32]);
            if had_digest {
                *comps.last_mut().expect("nonempty") = placeholder;
            } else {
                comps.push(placeholder);
            }
        } else if had_digest {
            comps.pop();
        }
        let name = Name::from_components(comps);

        let (sig_info, sig_len) = match signer {
            Some(s) => (Some(crate::security::sig_info_for(s)), s.estimate_size()),
            None => (
                self.sig_info.clone(),
                self.sig_value.as_ref().map_or(0, |v| v.len()),
            ),
        };

        let hint_inner: usize = self.forwarding_hint.iter().map(|n| n.encoding_length()).sum();
        let mut inner = name.encoding_length();
        if self.can_be_prefix {
            inner += tl_size(TLV_CAN_BE_PREFIX, 0);
        }
        if self.must_be_fresh {
            inner += tl_size(TLV_MUST_BE_FRESH, 0);
        }
        if !self.forwarding_hint.is_empty() {
            inner += tl_size(TLV_FORWARDING_HINT, hint_inner);
        }
        if self.nonce.is_some() {
            inner += tl_size(TLV_NONCE, 4);
        }
        if let Some(lt) = self.lifetime {
            inner += tl_size(TLV_INTEREST_LIFETIME, Nat(lt.as_millis() as u64).size());
        }
        if self.hop_limit.is_some() {
            inner += tl_size(TLV_HOP_LIMIT, 1);
        }
        if let Some(p) = &app_param {
            inner += tl_size(TLV_APP_PARAM, p.len());
        }
        if let Some(si) = &sig_info {
            inner += si.encoding_length(TLV_INTEREST_SIG_INFO);
            inner += tl_size(TLV_INTEREST_SIG_VALUE, sig_len);
        }

        let mut buf = BytesMut::with_capacity(tl_size(TLV_INTEREST, inner));
        VarNum(TLV_INTEREST).write_to(&mut buf);
        VarNum(inner as u64).write_to(&mut buf);

        // Name, recording the component region and the digest slot.
        VarNum(crate::name::TLV_NAME).write_to(&mut buf);
        VarNum(name.inner_length() as u64).write_to(&mut buf);
        let comps_start = buf.len();
        let mut digest_value_off = None;
        let mut covered_name_end = comps_start;
        for c in name.iter() {
            if c.typ == TYPE_PARAMETERS_SHA256_DIGEST {
                covered_name_end = buf.len();
                digest_value_off = Some(
                    buf.len()
                        + VarNum(c.typ).size()
                        + VarNum(c.value.len() as u64).size(),
                );
            }
            c.write_to(&mut buf);
            if c.typ != TYPE_PARAMETERS_SHA256_DIGEST {
                covered_name_end = buf.len();
            }
        }
        if digest_value_off.is_none() {
            covered_name_end = buf.len();
        }

        if self.can_be_prefix {
            VarNum(TLV_CAN_BE_PREFIX).write_to(&mut buf);
            VarNum(0).write_to(&mut buf);
        }
        if self.must_be_fresh {
            VarNum(TLV_MUST_BE_FRESH).write_to(&mut buf);
            VarNum(0).write_to(&mut buf);
        }
        if !self.forwarding_hint.is_empty() {
            VarNum(TLV_FORWARDING_HINT).write_to(&mut buf);
            VarNum(hint_inner as u64).write_to(&mut buf);
            for hint in &self.forwarding_hint {
                buf.put_slice(&hint.bytes());
            }
        }
        if let Some(nonce) = self.nonce {
            VarNum(TLV_NONCE).write_to(&mut buf);
            VarNum(4).write_to(&mut buf);
            buf.put_u32(nonce);
        }
        if let Some(lt) = self.lifetime {
            let ms = Nat(lt.as_millis() as u64);
            VarNum(TLV_INTEREST_LIFETIME).write_to(&mut buf);
            VarNum(ms.size() as u64).write_to(&mut buf);
            ms.write_to(&mut buf);
        }
        if let Some(limit) = self.hop_limit {
            VarNum(TLV_HOP_LIMIT).write_to(&mut buf);
            VarNum(1).write_to(&mut buf);
            buf.put_u8(limit);
        }

        let mut app_param_start = None;
        if let Some(p) = &app_param {
            app_param_start = Some(buf.len());
            VarNum(TLV_APP_PARAM).write_to(&mut buf);
            VarNum(p.len() as u64).write_to(&mut buf);
            buf.put_slice(p);
        }

        let mut sig_info_start = None;
        let mut sig_info_end = None;
        let mut sig_value_off = None;
        if let Some(si) = &sig_info {
            sig_info_start = Some(buf.len());
            si.write_to(&mut buf, TLV_INTEREST_SIG_INFO);
            sig_info_end = Some(buf.len());
            VarNum(TLV_INTEREST_SIG_VALUE).write_to(&mut buf);
            VarNum(sig_len as u64).write_to(&mut buf);
            sig_value_off = Some(buf.len());
            match (signer, &self.sig_value) {
                (Some(_), _) => buf.put_bytes(0, sig_len),
                (None, Some(v)) => buf.put_slice(v),
                (None, None) => {}
            }
        }

        // Signature first: its value sits inside the digest coverage.
        if let Some(s) = signer {
            let params_start = app_param_start.expect("signing implies parameters");
            let info_end = sig_info_end.expect("signing implies signature info");
            let covered: [&[u8]; 2] = [
                &buf[comps_start..covered_name_end],
                &buf[params_start..info_end],
            ];
            let sig = s.sign(&covered)?;
            if sig.len() != sig_len {
                return Err(Error::Security(format!(
                    "signer produced {} bytes, estimated {}",
                    sig.len(),
                    sig_len
                )));
            }
            let off = sig_value_off.expect("signature field present when signing");
            buf[off..off + sig_len].copy_from_slice(&sig);
        }

        // Parameters digest: ApplicationParameters through the end.
        let mut final_name = name;
        if let (Some(params_start), Some(value_off)) = (app_param_start, digest_value_off) {
            let digest: [u8; 32] = Sha256::digest(&buf[params_start..]).into();
            buf[value_off..value_off + 32].copy_from_slice(&digest);
            let mut comps: Vec<Component> = final_name.iter().cloned().collect();
            *comps.last_mut().expect("digest component present") =
                Component::params_digest(digest.to_vec());
            final_name = Name::from_components(comps);
        }

        let wire = buf.freeze();
        let sig_covered = if sig_info.is_some() {
            let mut covered = vec![wire.slice(comps_start..covered_name_end)];
            let start = app_param_start.or(sig_info_start).unwrap();
            covered.push(wire.slice(start..sig_info_end.unwrap()));
            covered
        } else {
            Wire::new()
        };
        Ok(EncodedInterest {
            wire,
            final_name,
            sig_covered,
        })
    }

    /// Parses an Interest element, capturing the signed-byte ranges in
    /// `sig_covered`.
    pub fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_INTEREST {
            return Err(Error::format(format!("expected Interest, got type {typ}")));
        }
        let mut body = view.delegate(len)?;
        Self::decode_body(&mut body)
    }

    fn decode_body(body: &mut WireView<'_>) -> Result<Self> {
        const ORDER: &[u64] = &[
            crate::name::TLV_NAME,
            TLV_CAN_BE_PREFIX,
            TLV_MUST_BE_FRESH,
            TLV_FORWARDING_HINT,
            TLV_NONCE,
            TLV_INTEREST_LIFETIME,
            TLV_HOP_LIMIT,
            TLV_APP_PARAM,
            TLV_INTEREST_SIG_INFO,
            TLV_INTEREST_SIG_VALUE,
        ];
        let mut order_idx = 0usize;
        let mut interest = Interest::default();
        let mut seen_name = false;
        let mut name_comps_range = (0usize, 0usize);
        let mut app_param_start = None;
        let mut sig_info_start = 0usize;
        let mut sig_info_end = None;

        while !body.is_eof() {
            let field_start = body.pos();
            let (t, l) = read_tl(body)?;
            if let Some(p) = ORDER.iter().position(|&o| o == t) {
                if p < order_idx {
                    return Err(Error::format(format!("field type {t} out of order")));
                }
                order_idx = p + 1;
            }
            match t {
                t if t == crate::name::TLV_NAME => {
                    let comps_start = body.pos();
                    let mut nb = body.delegate(l)?;
                    interest.name = Name::decode_inner(&mut nb)?;
                    seen_name = true;
                    let mut end = comps_start + interest.name.inner_length();
                    let last = interest.name.at(-1);
                    if last.typ == TYPE_PARAMETERS_SHA256_DIGEST {
                        end -= last.encoding_length();
                    }
                    name_comps_range = (comps_start, end);
                }
                TLV_CAN_BE_PREFIX => {
                    body.skip(l)?;
                    interest.can_be_prefix = true;
                }
                TLV_MUST_BE_FRESH => {
                    body.skip(l)?;
                    interest.must_be_fresh = true;
                }
                TLV_FORWARDING_HINT => {
                    let mut hb = body.delegate(l)?;
                    while !hb.is_eof() {
                        interest.forwarding_hint.push(Name::decode_from(&mut hb)?);
                    }
                }
                TLV_NONCE => interest.nonce = Some(Nat::read_from(body, l)?.0 as u32),
                TLV_INTEREST_LIFETIME => {
                    interest.lifetime = Some(Duration::from_millis(Nat::read_from(body, l)?.0))
                }
                TLV_HOP_LIMIT => interest.hop_limit = Some(Nat::read_from(body, l)?.0 as u8),
                TLV_APP_PARAM => {
                    app_param_start = Some(field_start);
                    interest.app_param = Some(body.read_buf(l)?);
                }
                TLV_INTEREST_SIG_INFO => {
                    if !seen_name {
                        return Err(Error::SkipRequired("Name"));
                    }
                    sig_info_start = field_start;
                    let mut sb = body.delegate(l)?;
                    interest.sig_info = Some(SignatureInfo::decode_body(&mut sb)?);
                    sig_info_end = Some(body.pos());
                }
                TLV_INTEREST_SIG_VALUE => interest.sig_value = Some(body.read_buf(l)?),
                other => skip_unknown(body, other, l)?,
            }
        }
        if !seen_name {
            return Err(Error::SkipRequired("Name"));
        }
        if let (Some(_), Some(end)) = (&interest.sig_info, sig_info_end) {
            if interest.sig_value.is_none() {
                return Err(Error::SkipRequired("SignatureValue"));
            }
            let mut covered = body.range(name_comps_range.0, name_comps_range.1);
            let start = app_param_start.unwrap_or(sig_info_start);
            covered.extend(body.range(start, end));
            interest.sig_covered = covered;
        }
        Ok(interest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::{covered_slices, HmacChecker, HmacSigner, SigChecker};
    use crate::wire::wire_join;

    fn parse(bytes: &Bytes) -> Interest {
        let segs = std::slice::from_ref(bytes);
        let mut view = WireView::new(segs);
        Interest::decode_from(&mut view).unwrap()
    }

    #[test]
    fn known_wire_vector() {
        // /example/testApp/randomData/t=1570430517101, MustBeFresh,
        // lifetime 6 s, no nonce.
        let interest = Interest {
            name: "/example/testApp/randomData/t=1570430517101"
                .parse()
                .unwrap(),
            must_be_fresh: true,
            lifetime: Some(Duration::from_millis(6000)),
            ..Default::default()
        };
        let enc = interest.encode().unwrap();
        let expected = hex::decode(
            "0530072808076578616d706c65080774657374417070080a72616e646f6d44\
             61746138080000016da4f3ff6d12000c021770",
        )
        .unwrap();
        assert_eq!(&enc.wire[..], &expected[..]);

        let parsed = parse(&enc.wire);
        assert_eq!(parsed, interest);
    }

    #[test]
    fn round_trip_all_fields() {
        let interest = Interest::new("/a/b/c".parse().unwrap())
            .with_can_be_prefix(true)
            .with_must_be_fresh(true)
            .with_hop_limit(16)
            .with_nonce(0xDEADBEEF)
            .with_lifetime(Duration::from_millis(1234));
        let mut interest = interest;
        interest.forwarding_hint = vec!["/hint/1".parse().unwrap(), "/hint/2".parse().unwrap()];
        let enc = interest.encode().unwrap();
        let parsed = parse(&enc.wire);
        assert_eq!(parsed, interest);
    }

    #[test]
    fn app_param_forces_trailing_digest() {
        let interest = Interest::new("/app/cmd".parse().unwrap()).with_app_param(&b"args"[..]);
        let enc = interest.encode().unwrap();
        assert_eq!(enc.final_name.len(), 3);
        assert_eq!(enc.final_name.at(-1).typ, TYPE_PARAMETERS_SHA256_DIGEST);

        let parsed = parse(&enc.wire);
        assert_eq!(parsed.name, enc.final_name);
        assert_eq!(parsed.app_param.as_deref(), Some(&b"args"[..]));

        // The digest is correct: recompute over AppParam..end.
        let wire = enc.wire.clone();
        let digest_comp = enc.final_name.at(-1);
        let param_off = wire
            .windows(2)
            .rposition(|w| w == [0x24, 0x04])
            .unwrap();
        let digest: [u8; 32] = Sha256::digest(&wire[param_off..]).into();
        assert_eq!(&digest_comp.value[..], &digest[..]);
    }

    #[test]
    fn signed_interest_verifies() {
        let signer = HmacSigner::new("/keys/hmac".parse().unwrap(), b"key".to_vec());
        let interest = Interest::new("/localhost/nfd/rib/register".parse().unwrap())
            .with_app_param(&b"params"[..])
            .with_must_be_fresh(true);
        let enc = interest.sign_encode(&signer).unwrap();

        let parsed = parse(&enc.wire);
        assert_eq!(
            parsed.sig_info.as_ref().unwrap().sig_type,
            crate::packet::SigType::HmacWithSha256
        );
        // Encoder- and parser-captured coverage agree byte for byte.
        assert_eq!(wire_join(&parsed.sig_covered), wire_join(&enc.sig_covered));
        HmacChecker::new(b"key".to_vec())
            .check(
                parsed.sig_info.as_ref(),
                &covered_slices(&parsed.sig_covered),
                parsed.sig_value.as_deref(),
            )
            .unwrap();
    }

    #[test]
    fn stripping_stale_digest_without_params() {
        let name: Name = "/a/b".parse().unwrap();
        let with_digest = name.clone().append(Component::params_digest(vec![1u8; 32]));
        let interest = Interest {
            name: with_digest,
            ..Default::default()
        };
        let enc = interest.encode().unwrap();
        assert_eq!(enc.final_name, name);
    }

    #[test]
    fn empty_name_is_invalid() {
        let interest = Interest::default();
        assert!(matches!(
            interest.encode(),
            Err(Error::InvalidValue(_))
        ));
    }
}
