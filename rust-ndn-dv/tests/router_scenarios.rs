//! Router behavior over a dummy face: advertisement publication,
//! neighbor learning and FIB registration toward the forwarder.

use bytes::Bytes;
use rust_ndn_common::codec::TlvModel;
use rust_ndn_common::mgmt::{ControlParameters, ControlResponse};
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::{Data, Interest, LpPacket, Packet};
use rust_ndn_common::security::Sha256Signer;
use rust_ndn_common::wire::WireView;
use rust_ndn_dv::advert::{Advertisement, AdvertEntry, StateVector};
use rust_ndn_dv::{DvConfig, DvRouter};
use rust_ndn_engine::engine::{Engine, EngineConfig};
use rust_ndn_engine::face::DummyFace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn parse_frame(frame: &Bytes) -> Packet {
    let segs = std::slice::from_ref(frame);
    let mut view = WireView::new(segs);
    Packet::decode_from(&mut view).expect("well-formed frame")
}

// Unwraps an optional link-layer envelope down to the inner packet.
fn inner_packet(frame: &Bytes) -> Packet {
    match parse_frame(frame) {
        Packet::Lp(lp) => {
            let raw = rust_ndn_common::wire::wire_join(lp.fragment.as_ref().unwrap());
            let segs = std::slice::from_ref(&raw);
            let mut view = WireView::new(segs);
            Packet::decode_from(&mut view).unwrap()
        }
        other => other,
    }
}

async fn next_interest_with_prefix(
    sent: &mut mpsc::UnboundedReceiver<Bytes>,
    prefix: &Name,
) -> Interest {
    loop {
        let frame = sent.recv().await.expect("router keeps talking");
        if let Packet::Interest(interest) = inner_packet(&frame) {
            if prefix.is_prefix_of(&interest.name) {
                return interest;
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn startup_publishes_and_beacons() {
    let (_face, mut sent, _engine, dv) = start_router().await;

    // The initial recompute publishes advert seq 1 and beacons it.
    let sync_prefix: Name = "/ndn/32=DV/32=ADS".parse().unwrap();
    let beacon = next_interest_with_prefix(&mut sent, &sync_prefix).await;
    let param = beacon.app_param.expect("beacon carries a state vector");
    let segs = std::slice::from_ref(&param);
    let mut view = WireView::new(segs);
    let vector = StateVector::decode_from(&mut view).unwrap();
    assert_eq!(vector.entries.len(), 1);
    assert_eq!(vector.entries[0].router, "/ndn/a".parse::<Name>().unwrap());
    assert_eq!(vector.entries[0].seq, 1);
    assert_eq!(dv.status().advert_seq, 1);
}

#[tokio::test(start_paused = true)]
async fn neighbor_advert_drives_fib_registration() {
    let (face, mut sent, _engine, dv) = start_router().await;

    // A sync beacon from /ndn/b arrives on face 7 announcing seq 1.
    let vector = StateVector::single("/ndn/b".parse().unwrap(), 10, 1);
    let sync = Interest::new("/ndn/32=DV/32=ADS".parse().unwrap())
        .with_app_param(vector.encode_bytes())
        .with_lifetime(Duration::from_secs(1));
    let lp = LpPacket {
        incoming_face_id: Some(7),
        fragment: Some(vec![sync.encode().unwrap().wire]),
        ..Default::default()
    };
    face.feed(lp.encode_bytes()).await.unwrap();

    // The router fetches b's advertisement...
    let advert_prefix: Name = "/ndn/b/32=DV/32=ADV".parse().unwrap();
    let fetch = next_interest_with_prefix(&mut sent, &advert_prefix).await;
    assert_eq!(fetch.name.at(-2), Component::timestamp(10));
    assert_eq!(fetch.name.at(-1), Component::version(1));

    // ...which says b also reaches /ndn/c at cost 1.
    let advert = Advertisement {
        entries: vec![
            AdvertEntry {
                destination: "/ndn/b".parse().unwrap(),
                next_hop: "/ndn/b".parse().unwrap(),
                cost: 0,
            },
            AdvertEntry {
                destination: "/ndn/c".parse().unwrap(),
                next_hop: "/ndn/c".parse().unwrap(),
                cost: 1,
            },
        ],
    };
    let data = Data::new(fetch.name.clone())
        .with_content(advert.encode_bytes())
        .with_freshness(Duration::from_secs(10));
    face.feed(data.sign_encode(&Sha256Signer).unwrap().wire)
        .await
        .unwrap();

    // The recomputed routes reach the forwarder as rib/register
    // commands for /ndn/b (cost 1) and /ndn/c (cost 2), via face 7.
    let register_prefix: Name = "/localhost/nfd/rib/register".parse().unwrap();
    let mut seen = Vec::new();
    for _ in 0..2 {
        let command = next_interest_with_prefix(&mut sent, &register_prefix).await;
        let param = command.app_param.clone().expect("control parameters");
        let params = ControlParameters::decode(&param).unwrap();
        assert_eq!(params.face_id, Some(7));
        seen.push((params.name.clone().unwrap(), params.cost.unwrap()));

        // Answer 200 so the command task moves on.
        let response = ControlResponse::ok(params);
        let data = Data::new(command.name.clone())
            .with_content(response.encode_bytes())
            .with_freshness(Duration::from_secs(1));
        face.feed(data.sign_encode(&Sha256Signer).unwrap().wire)
            .await
            .unwrap();
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("/ndn/b".parse().unwrap(), 1),
            ("/ndn/c".parse().unwrap(), 2),
        ]
    );
    assert_eq!(dv.status().neighbor_count, 1);
    assert_eq!(dv.status().rib_size, 3);
}

#[tokio::test(start_paused = true)]
async fn advert_requests_are_served_from_the_object_directory() {
    let (face, mut sent, _engine, _dv) = start_router().await;

    // Drain the startup beacons, then ask for the published advert.
    let sync_prefix: Name = "/ndn/32=DV/32=ADS".parse().unwrap();
    next_interest_with_prefix(&mut sent, &sync_prefix).await;

    let request = Interest::new("/ndn/a/32=DV/32=ADV".parse().unwrap())
        .with_can_be_prefix(true)
        .with_lifetime(Duration::from_secs(1));
    face.feed(request.encode().unwrap().wire).await.unwrap();

    loop {
        let frame = sent.recv().await.unwrap();
        if let Packet::Data(data) = inner_packet(&frame) {
            let content = data.content.expect("advert content");
            let segs = std::slice::from_ref(&content);
            let mut view = WireView::new(segs);
            let advert = Advertisement::decode_from(&mut view).unwrap();
            // Only this router so far.
            assert_eq!(advert.entries.len(), 1);
            assert_eq!(
                advert.entries[0].destination,
                "/ndn/a".parse::<Name>().unwrap()
            );
            break;
        }
    }
}

async fn start_router() -> (
    Arc<DummyFace>,
    mpsc::UnboundedReceiver<Bytes>,
    Arc<Engine>,
    Arc<DvRouter>,
) {
    let (face, sent) = DummyFace::new();
    let engine = Engine::start(face.clone(), EngineConfig::default())
        .await
        .unwrap();
    let config = DvConfig::new("/ndn", "/ndn/a");
    let dv = DvRouter::start(engine.clone(), config).await.unwrap();
    (face, sent, engine, dv)
}
