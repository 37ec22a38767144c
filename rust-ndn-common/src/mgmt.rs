//! Forwarder management protocol types (NFD-compatible).
//!
//! Commands are signed Interests addressed to
//! `/localhost/nfd/<module>/<verb>` whose ApplicationParameters carry a
//! ControlParameters block. The response Data content is a
//! ControlResponse.

use crate::codec::{read_tl, skip_unknown, tl_size, TlvModel, TlvWriter};
use crate::error::Error;
use crate::name::Name;
use crate::tlv::Nat;
use crate::wire::WireView;
use crate::Result;

pub const TLV_CONTROL_PARAMETERS: u64 = 0x68;
pub const TLV_FACE_ID: u64 = 0x69;
pub const TLV_URI: u64 = 0x72;
pub const TLV_LOCAL_URI: u64 = 0x81;
pub const TLV_ORIGIN: u64 = 0x6F;
pub const TLV_COST: u64 = 0x6A;
pub const TLV_CAPACITY: u64 = 0x83;
pub const TLV_COUNT: u64 = 0x84;
pub const TLV_FLAGS: u64 = 0x6C;
pub const TLV_MASK: u64 = 0x70;
pub const TLV_STRATEGY: u64 = 0x6B;
pub const TLV_EXPIRATION_PERIOD: u64 = 0x6D;
pub const TLV_CONTROL_RESPONSE: u64 = 0x65;
pub const TLV_STATUS_CODE: u64 = 0x66;
pub const TLV_STATUS_TEXT: u64 = 0x67;
pub const TLV_FACE_STATUS: u64 = 0x80;
pub const TLV_FACE_SCOPE: u64 = 0x84;
pub const TLV_FACE_PERSISTENCY: u64 = 0x85;
pub const TLV_LINK_TYPE: u64 = 0x86;
pub const TLV_FACE_QUERY_FILTER: u64 = 0x96;

/// Route origins.
pub const ORIGIN_APP: u64 = 0;
pub const ORIGIN_CLIENT: u64 = 65;
pub const ORIGIN_NLSR: u64 = 128;
pub const ORIGIN_STATIC: u64 = 255;

/// Route flags.
pub const ROUTE_FLAG_CHILD_INHERIT: u64 = 1;
pub const ROUTE_FLAG_CAPTURE: u64 = 2;

/// Arguments of a management command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub uri: Option<String>,
    pub local_uri: Option<String>,
    pub origin: Option<u64>,
    pub cost: Option<u64>,
    pub capacity: Option<u64>,
    pub count: Option<u64>,
    pub flags: Option<u64>,
    pub mask: Option<u64>,
    pub strategy: Option<Name>,
    pub expiration_ms: Option<u64>,
}

impl ControlParameters {
    /// Arguments for a `rib/register` or `rib/unregister` command.
    pub fn route(name: Name, face_id: Option<u64>, origin: u64, cost: Option<u64>) -> Self {
        Self {
            name: Some(name),
            face_id,
            origin: Some(origin),
            cost,
            ..Default::default()
        }
    }

    fn body_length(&self) -> usize {
        let mut len = 0;
        if let Some(name) = &self.name {
            len += name.encoding_length();
        }
        if let Some(v) = self.face_id {
            len += tl_size(TLV_FACE_ID, Nat(v).size());
        }
        if let Some(uri) = &self.uri {
            len += tl_size(TLV_URI, uri.len());
        }
        if let Some(uri) = &self.local_uri {
            len += tl_size(TLV_LOCAL_URI, uri.len());
        }
        if let Some(v) = self.origin {
            len += tl_size(TLV_ORIGIN, Nat(v).size());
        }
        if let Some(v) = self.cost {
            len += tl_size(TLV_COST, Nat(v).size());
        }
        if let Some(v) = self.capacity {
            len += tl_size(TLV_CAPACITY, Nat(v).size());
        }
        if let Some(v) = self.count {
            len += tl_size(TLV_COUNT, Nat(v).size());
        }
        if let Some(v) = self.flags {
            len += tl_size(TLV_FLAGS, Nat(v).size());
        }
        if let Some(v) = self.mask {
            len += tl_size(TLV_MASK, Nat(v).size());
        }
        if let Some(name) = &self.strategy {
            len += tl_size(TLV_STRATEGY, name.encoding_length());
        }
        if let Some(v) = self.expiration_ms {
            len += tl_size(TLV_EXPIRATION_PERIOD, Nat(v).size());
        }
        len
    }

    fn write_body(&self, w: &mut TlvWriter) {
        if let Some(name) = &self.name {
            name.write_to_writer(w);
        }
        if let Some(v) = self.face_id {
            crate::codec::write_nat_field(w, TLV_FACE_ID, v);
        }
        if let Some(uri) = &self.uri {
            crate::codec::write_bytes_field(w, TLV_URI, uri.as_bytes());
        }
        if let Some(uri) = &self.local_uri {
            crate::codec::write_bytes_field(w, TLV_LOCAL_URI, uri.as_bytes());
        }
        if let Some(v) = self.origin {
            crate::codec::write_nat_field(w, TLV_ORIGIN, v);
        }
        if let Some(v) = self.cost {
            crate::codec::write_nat_field(w, TLV_COST, v);
        }
        if let Some(v) = self.capacity {
            crate::codec::write_nat_field(w, TLV_CAPACITY, v);
        }
        if let Some(v) = self.count {
            crate::codec::write_nat_field(w, TLV_COUNT, v);
        }
        if let Some(v) = self.flags {
            crate::codec::write_nat_field(w, TLV_FLAGS, v);
        }
        if let Some(v) = self.mask {
            crate::codec::write_nat_field(w, TLV_MASK, v);
        }
        if let Some(name) = &self.strategy {
            w.put_tl(TLV_STRATEGY, name.encoding_length());
            w.put_slice(&name.bytes());
        }
        if let Some(v) = self.expiration_ms {
            crate::codec::write_nat_field(w, TLV_EXPIRATION_PERIOD, v);
        }
    }

    fn decode_body(view: &mut WireView<'_>) -> Result<Self> {
        let mut params = ControlParameters::default();
        while !view.is_eof() {
            let (t, l) = read_tl(view)?;
            match t {
                t if t == crate::name::TLV_NAME => {
                    let mut nb = view.delegate(l)?;
                    params.name = Some(Name::decode_inner(&mut nb)?);
                }
                TLV_FACE_ID => params.face_id = Some(Nat::read_from(view, l)?.0),
                TLV_URI => params.uri = Some(read_string(view, l)?),
                TLV_LOCAL_URI => params.local_uri = Some(read_string(view, l)?),
                TLV_ORIGIN => params.origin = Some(Nat::read_from(view, l)?.0),
                TLV_COST => params.cost = Some(Nat::read_from(view, l)?.0),
                TLV_CAPACITY => params.capacity = Some(Nat::read_from(view, l)?.0),
                TLV_COUNT => params.count = Some(Nat::read_from(view, l)?.0),
                TLV_FLAGS => params.flags = Some(Nat::read_from(view, l)?.0),
                TLV_MASK => params.mask = Some(Nat::read_from(view, l)?.0),
                TLV_STRATEGY => {
                    let mut sb = view.delegate(l)?;
                    params.strategy = Some(Name::decode_from(&mut sb)?);
                }
                TLV_EXPIRATION_PERIOD => params.expiration_ms = Some(Nat::read_from(view, l)?.0),
                other => skip_unknown(view, other, l)?,
            }
        }
        Ok(params)
    }
}

impl TlvModel for ControlParameters {
    fn encoding_length(&self) -> usize {
        tl_size(TLV_CONTROL_PARAMETERS, self.body_length())
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_CONTROL_PARAMETERS, self.body_length());
        self.write_body(w);
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_CONTROL_PARAMETERS {
            return Err(Error::format(format!(
                "expected ControlParameters, got type {typ}"
            )));
        }
        let mut body = view.delegate(len)?;
        Self::decode_body(&mut body)
    }
}

/// Outcome of a management command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlResponse {
    pub status_code: u64,
    pub status_text: String,
    pub params: Option<ControlParameters>,
}

impl ControlResponse {
    pub fn ok(params: ControlParameters) -> Self {
        Self {
            status_code: 200,
            status_text: "OK".into(),
            params: Some(params),
        }
    }

    pub fn error(status_code: u64, status_text: impl Into<String>) -> Self {
        Self {
            status_code,
            status_text: status_text.into(),
            params: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == 200
    }

    fn body_length(&self) -> usize {
        let mut len = tl_size(TLV_STATUS_CODE, Nat(self.status_code).size())
            + tl_size(TLV_STATUS_TEXT, self.status_text.len());
        if let Some(params) = &self.params {
            len += params.encoding_length();
        }
        len
    }
}

impl TlvModel for ControlResponse {
    fn encoding_length(&self) -> usize {
        tl_size(TLV_CONTROL_RESPONSE, self.body_length())
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_CONTROL_RESPONSE, self.body_length());
        crate::codec::write_nat_field(w, TLV_STATUS_CODE, self.status_code);
        crate::codec::write_bytes_field(w, TLV_STATUS_TEXT, self.status_text.as_bytes());
        if let Some(params) = &self.params {
            params.encode_into(w);
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_CONTROL_RESPONSE {
            return Err(Error::format(format!(
                "expected ControlResponse, got type {typ}"
            )));
        }
        let mut body = view.delegate(len)?;
        let mut response = ControlResponse::default();
        let mut seen_code = false;
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            match t {
                TLV_STATUS_CODE => {
                    response.status_code = Nat::read_from(&mut body, l)?.0;
                    seen_code = true;
                }
                TLV_STATUS_TEXT => response.status_text = read_string(&mut body, l)?,
                TLV_CONTROL_PARAMETERS => {
                    let mut pb = body.delegate(l)?;
                    response.params = Some(ControlParameters::decode_body(&mut pb)?);
                }
                other => skip_unknown(&mut body, other, l)?,
            }
        }
        if !seen_code {
            return Err(Error::SkipRequired("StatusCode"));
        }
        Ok(response)
    }
}

/// One entry of the `faces/list` and `faces/query` datasets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceStatus {
    pub face_id: u64,
    pub uri: String,
    pub local_uri: String,
    pub scope: Option<u64>,
    pub persistency: Option<u64>,
    pub link_type: Option<u64>,
    pub flags: Option<u64>,
}

impl FaceStatus {
    fn body_length(&self) -> usize {
        let mut len = tl_size(TLV_FACE_ID, Nat(self.face_id).size())
            + tl_size(TLV_URI, self.uri.len())
            + tl_size(TLV_LOCAL_URI, self.local_uri.len());
        if let Some(v) = self.scope {
            len += tl_size(TLV_FACE_SCOPE, Nat(v).size());
        }
        if let Some(v) = self.persistency {
            len += tl_size(TLV_FACE_PERSISTENCY, Nat(v).size());
        }
        if let Some(v) = self.link_type {
            len += tl_size(TLV_LINK_TYPE, Nat(v).size());
        }
        if let Some(v) = self.flags {
            len += tl_size(TLV_FLAGS, Nat(v).size());
        }
        len
    }
}

impl TlvModel for FaceStatus {
    fn encoding_length(&self) -> usize {
        tl_size(TLV_FACE_STATUS, self.body_length())
    }

    fn encode_into(&self, w: &mut TlvWriter) {
        w.put_tl(TLV_FACE_STATUS, self.body_length());
        crate::codec::write_nat_field(w, TLV_FACE_ID, self.face_id);
        crate::codec::write_bytes_field(w, TLV_URI, self.uri.as_bytes());
        crate::codec::write_bytes_field(w, TLV_LOCAL_URI, self.local_uri.as_bytes());
        if let Some(v) = self.scope {
            crate::codec::write_nat_field(w, TLV_FACE_SCOPE, v);
        }
        if let Some(v) = self.persistency {
            crate::codec::write_nat_field(w, TLV_FACE_PERSISTENCY, v);
        }
        if let Some(v) = self.link_type {
            crate::codec::write_nat_field(w, TLV_LINK_TYPE, v);
        }
        if let Some(v) = self.flags {
            crate::codec::write_nat_field(w, TLV_FLAGS, v);
        }
    }

    fn decode_from(view: &mut WireView<'_>) -> Result<Self> {
        let (typ, len) = read_tl(view)?;
        if typ != TLV_FACE_STATUS {
            return Err(Error::format(format!("expected FaceStatus, got type {typ}")));
        }
        let mut body = view.delegate(len)?;
        let mut status = FaceStatus::default();
        while !body.is_eof() {
            let (t, l) = read_tl(&mut body)?;
            match t {
                TLV_FACE_ID => status.face_id = Nat::read_from(&mut body, l)?.0,
                TLV_URI => status.uri = read_string(&mut body, l)?,
                TLV_LOCAL_URI => status.local_uri = read_string(&mut body, l)?,
                TLV_FACE_SCOPE => status.scope = Some(Nat::read_from(&mut body, l)?.0),
                TLV_FACE_PERSISTENCY => {
                    status.persistency = Some(Nat::read_from(&mut body, l)?.0)
                }
                TLV_LINK_TYPE => status.link_type = Some(Nat::read_from(&mut body, l)?.0),
                TLV_FLAGS => status.flags = Some(Nat::read_from(&mut body, l)?.0),
                other => skip_unknown(&mut body, other, l)?,
            }
        }
        Ok(status)
    }
}

/// Parses the concatenated FaceStatus entries of a dataset payload.
pub fn decode_face_dataset(view: &mut WireView<'_>) -> Result<Vec<FaceStatus>> {
    let mut out = Vec::new();
    while !view.is_eof() {
        out.push(FaceStatus::decode_from(view)?);
    }
    Ok(out)
}

fn read_string(view: &mut WireView<'_>, len: usize) -> Result<String> {
    let raw = view.read_buf(len)?;
    String::from_utf8(raw.to_vec()).map_err(|e| Error::format(format!("invalid utf-8: {e}")))
}
