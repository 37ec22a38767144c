//! Randomized Data packet round trips.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::{Data, KeyLocator, SigType, SignatureInfo};
use rust_ndn_common::wire::WireView;
use std::time::Duration;

fn random_name(rng: &mut StdRng) -> Name {
    let len = rng.gen_range(5..=20);
    let mut name = Name::new();
    for i in 0..len {
        match rng.gen_range(0..4) {
            0 => name.push(Component::segment(rng.gen_range(0..1000))),
            1 => name.push(Component::version(rng.gen())),
            2 => {
                let size = rng.gen_range(1..=16);
                let bytes: Vec<u8> = (0..size).map(|_| rng.gen()).collect();
                name.push(Component::new(rust_ndn_common::name::TYPE_GENERIC, bytes))
            }
            _ => name.push(Component::generic(&format!("part{i}"))),
        };
    }
    name
}

#[test]
fn random_data_packets_survive_encode_parse() {
    let mut rng = StdRng::seed_from_u64(0x5EED_CAFE);
    for _ in 0..200 {
        let content_len = rng.gen_range(100..=8000);
        let content: Vec<u8> = (0..content_len).map(|_| rng.gen()).collect();
        let sig: Vec<u8> = (0..64).map(|_| rng.gen()).collect();

        let mut data = Data::new(random_name(&mut rng))
            .with_content(content)
            .with_freshness(Duration::from_secs(4));
        if rng.gen_bool(0.5) {
            data = data.with_final_block_id(Component::segment(rng.gen_range(0..100)));
        }
        data.sig_info = Some(
            SignatureInfo::new(SigType::Ed25519)
                .with_key_locator(KeyLocator::Name("/keys/test/KEY/1".parse().unwrap())),
        );
        data.sig_value = Some(Bytes::from(sig));

        let encoded = data.encode();
        let segs = std::slice::from_ref(&encoded.wire);
        let mut view = WireView::new(segs);
        let parsed = Data::decode_from(&mut view).unwrap();

        assert_eq!(parsed.name, data.name);
        assert_eq!(parsed.meta, data.meta);
        assert_eq!(parsed.content, data.content);
        assert_eq!(parsed.sig_info, data.sig_info);
        assert_eq!(parsed.sig_value, data.sig_value);
        assert!(view.is_eof());
    }
}
