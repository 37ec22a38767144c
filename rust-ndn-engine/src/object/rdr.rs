//! Realtime Data Retrieval metadata packets.
//!
//! The producer keeps a fresh metadata packet at
//! `<prefix>/32=metadata/v=<now>/seg=0` whose content is the current
//! versioned name; consumers discover the latest version with a
//! MustBeFresh Interest and then fetch segments.

use super::metadata_keyword;
use rust_ndn_common::name::{Component, Name, VERSION_UNIX_MICRO};
use rust_ndn_common::packet::{Data, EncodedData};
use rust_ndn_common::security::Signer;
use rust_ndn_common::wire::WireView;
use rust_ndn_common::{Error, Result};
use std::time::Duration;

const METADATA_FRESHNESS: Duration = Duration::from_millis(10);

/// The discovery name consumers express toward.
pub fn metadata_name(prefix: &Name) -> Name {
    prefix.clone().append(metadata_keyword())
}

/// Builds the metadata packet announcing `versioned` as the current
/// version of the object at `prefix`.
pub fn make_metadata(
    prefix: &Name,
    versioned: &Name,
    signer: &dyn Signer,
) -> Result<(Name, EncodedData)> {
    let name = metadata_name(prefix)
        .with_version(VERSION_UNIX_MICRO)
        .append(Component::segment(0));
    let data = Data::new(name.clone())
        .with_content(versioned.bytes())
        .with_freshness(METADATA_FRESHNESS);
    Ok((name, data.sign_encode(signer)?))
}

/// Extracts the versioned object name from a metadata packet.
pub fn parse_metadata(data: &Data) -> Result<Name> {
    let content = data
        .content
        .as_ref()
        .ok_or_else(|| Error::Protocol("metadata packet has no content".into()))?;
    let segs = std::slice::from_ref(content);
    let mut view = WireView::new(segs);
    Name::decode_from(&mut view)
}

/// True if `data` looks like a metadata packet under `prefix`.
pub fn is_metadata(prefix: &Name, data: &Data) -> bool {
    metadata_name(prefix).is_prefix_of(&data.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndn_common::name::{TYPE_KEYWORD, TYPE_SEGMENT, TYPE_VERSION};
    use rust_ndn_common::security::Sha256Signer;

    #[test]
    fn metadata_round_trip() {
        let prefix: Name = "/app/file".parse().unwrap();
        let versioned: Name = "/app/file/v=99".parse().unwrap();
        let (name, enc) = make_metadata(&prefix, &versioned, &Sha256Signer).unwrap();

        assert_eq!(name.at(2).typ, TYPE_KEYWORD);
        assert_eq!(name.at(3).typ, TYPE_VERSION);
        assert_eq!(name.at(4).typ, TYPE_SEGMENT);

        let segs = std::slice::from_ref(&enc.wire);
        let mut view = WireView::new(segs);
        let data = Data::decode_from(&mut view).unwrap();
        assert!(is_metadata(&prefix, &data));
        assert_eq!(parse_metadata(&data).unwrap(), versioned);
        assert_eq!(data.meta.freshness, Some(METADATA_FRESHNESS));
    }

    #[test]
    fn bytes_without_content_are_rejected() {
        let data = Data::new("/x/32=metadata/v=1/seg=0".parse().unwrap());
        assert!(parse_metadata(&data).is_err());
    }
}
