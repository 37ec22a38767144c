//! Splits payloads into signed segment packets.

use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::{Data, EncodedData};
use rust_ndn_common::security::Signer;
use rust_ndn_common::Result;
use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Default segment payload size in bytes.
pub const DEFAULT_SEGMENT_SIZE: usize = 8000;

/// Produces the segment packets of one object version.
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    pub segment_size: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segment_size(size: usize) -> Self {
        Self { segment_size: size }
    }

    /// Splits `content` into signed segments under the versioned name.
    /// Every segment carries the FinalBlockID of the last one.
    pub fn segment(
        &self,
        versioned: &Name,
        content: &Bytes,
        signer: &dyn Signer,
    ) -> Result<Vec<(Name, EncodedData)>> {
        let count = content.len().div_ceil(self.segment_size).max(1);
        let final_block = Component::segment(count as u64 - 1);
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let lo = i * self.segment_size;
            let hi = ((i + 1) * self.segment_size).min(content.len());
            let name = versioned.clone().append(Component::segment(i as u64));
            let data = Data::new(name.clone())
                .with_content(content.slice(lo..hi))
                .with_final_block_id(final_block.clone());
            out.push((name, data.sign_encode(signer)?));
        }
        Ok(out)
    }

    /// Builds the manifest packet: the concatenated SHA-256 digests of
    /// every segment wire, in order.
    pub fn manifest(
        &self,
        versioned: &Name,
        segments: &[(Name, EncodedData)],
        signer: &dyn Signer,
    ) -> Result<(Name, EncodedData)> {
        let mut digests = Vec::with_capacity(segments.len() * 32);
        for (_, seg) in segments {
            let digest: [u8; 32] = Sha256::digest(&seg.wire).into();
            digests.extend_from_slice(&digest);
        }
        let name = versioned.clone().append(super::manifest_keyword());
        let data = Data::new(name.clone()).with_content(digests);
        Ok((name, data.sign_encode(signer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_ndn_common::name::TYPE_SEGMENT;
    use rust_ndn_common::security::Sha256Signer;
    use rust_ndn_common::wire::WireView;

    fn parse(bytes: &Bytes) -> Data {
        let segs = std::slice::from_ref(bytes);
        let mut view = WireView::new(segs);
        Data::decode_from(&mut view).unwrap()
    }

    #[test]
    fn segments_cover_content_and_carry_final_block() {
        let versioned: Name = "/obj/v=1".parse().unwrap();
        let content = Bytes::from(vec![0x5A; 20_000]);
        let segs = Segmenter::new()
            .segment(&versioned, &content, &Sha256Signer)
            .unwrap();
        assert_eq!(segs.len(), 3);

        let mut reassembled = Vec::new();
        for (i, (name, enc)) in segs.iter().enumerate() {
            assert_eq!(name.at(-1).typ, TYPE_SEGMENT);
            assert_eq!(name.at(-1).to_num(), Some(i as u64));
            let data = parse(&enc.wire);
            assert_eq!(data.meta.final_block_id, Some(Component::segment(2)));
            reassembled.extend_from_slice(&data.content.unwrap());
        }
        assert_eq!(reassembled.len(), content.len());
    }

    #[test]
    fn empty_content_yields_one_segment() {
        let versioned: Name = "/obj/v=1".parse().unwrap();
        let segs = Segmenter::new()
            .segment(&versioned, &Bytes::new(), &Sha256Signer)
            .unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(
            parse(&segs[0].1.wire).meta.final_block_id,
            Some(Component::segment(0))
        );
    }

    #[test]
    fn manifest_lists_segment_digests() {
        let versioned: Name = "/obj/v=2".parse().unwrap();
        let content = Bytes::from(vec![1u8; 100]);
        let segmenter = Segmenter::with_segment_size(40);
        let segs = segmenter
            .segment(&versioned, &content, &Sha256Signer)
            .unwrap();
        let (name, manifest) = segmenter
            .manifest(&versioned, &segs, &Sha256Signer)
            .unwrap();
        assert_eq!(name.at(-1), super::super::manifest_keyword());
        let data = parse(&manifest.wire);
        assert_eq!(data.content.unwrap().len(), segs.len() * 32);
    }
}
