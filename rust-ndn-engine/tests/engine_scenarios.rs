//! End-to-end engine scenarios over the dummy face.

use bytes::Bytes;
use rust_ndn_common::codec::TlvModel;
use rust_ndn_common::mgmt::{ControlParameters, ControlResponse, ORIGIN_NLSR};
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::{Data, Interest, LpPacket, Nack, Packet, NACK_NO_ROUTE};
use rust_ndn_common::security::Sha256Signer;
use rust_ndn_common::wire::WireView;
use rust_ndn_engine::engine::{Engine, EngineConfig, ExpressOptions, ExpressResult};
use rust_ndn_engine::face::DummyFace;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

async fn start_engine() -> (
    Arc<DummyFace>,
    mpsc::UnboundedReceiver<Bytes>,
    Arc<Engine>,
) {
    let (face, sent) = DummyFace::new();
    let engine = Engine::start(face.clone(), EngineConfig::default())
        .await
        .expect("engine starts");
    (face, sent, engine)
}

fn express(
    engine: &Arc<Engine>,
    interest: Interest,
) -> JoinHandle<ExpressResult> {
    let engine = engine.clone();
    tokio::spawn(async move {
        engine
            .express_async(&interest, ExpressOptions::default())
            .await
    })
}

fn parse_frame(frame: &Bytes) -> Packet {
    let segs = std::slice::from_ref(frame);
    let mut view = WireView::new(segs);
    Packet::decode_from(&mut view).expect("well-formed frame")
}

// S1: the Interest leaves the engine with a known byte-exact encoding,
// and the matching Data satisfies it exactly once.
#[tokio::test(start_paused = true)]
async fn express_and_satisfy() {
    let (face, mut sent, engine) = start_engine().await;
    let name: Name = "/example/testApp/randomData/t=1570430517101"
        .parse()
        .unwrap();
    let interest = Interest {
        name: name.clone(),
        must_be_fresh: true,
        lifetime: Some(Duration::from_secs(6)),
        ..Default::default()
    };
    let pending = express(&engine, interest);

    let frame = sent.recv().await.expect("one outgoing frame");
    let expected = hex::decode(
        "0530072808076578616d706c65080774657374417070080a72616e646f6d44\
         61746138080000016da4f3ff6d12000c021770",
    )
    .unwrap();
    assert_eq!(&frame[..], &expected[..]);

    let data = Data::new(name)
        .with_content(&b"Hello, world!"[..])
        .with_freshness(Duration::from_secs(1));
    let encoded = data.sign_encode(&Sha256Signer).unwrap();
    face.feed(encoded.wire).await.unwrap();

    match pending.await.unwrap() {
        ExpressResult::Data { data, .. } => {
            assert_eq!(data.content.as_deref(), Some(&b"Hello, world!"[..]));
            assert_eq!(data.meta.freshness, Some(Duration::from_secs(1)));
        }
        other => panic!("expected data, got {other:?}"),
    }
    assert_eq!(engine.pending_interest_count(), 0);
}

// S2: a link-layer Nack terminates the Interest and prunes the PIT.
#[tokio::test(start_paused = true)]
async fn nack_terminates_and_prunes() {
    let (face, mut sent, engine) = start_engine().await;
    let interest = Interest::new("/localhost/nfd/faces/events".parse().unwrap())
        .with_can_be_prefix(true)
        .with_must_be_fresh(true)
        .with_lifetime(Duration::from_secs(1));
    let pending = express(&engine, interest);

    let frame = sent.recv().await.unwrap();
    let lp = LpPacket {
        nack: Some(Nack {
            reason: Some(NACK_NO_ROUTE),
        }),
        fragment: Some(vec![frame]),
        ..Default::default()
    };
    face.feed(lp.encode_bytes()).await.unwrap();

    match pending.await.unwrap() {
        ExpressResult::Nack { reason } => assert_eq!(reason, NACK_NO_ROUTE),
        other => panic!("expected nack, got {other:?}"),
    }
    assert_eq!(engine.pending_interest_count(), 0);
}

// S3: prefix matching and timeouts under virtual time. The
// CanBePrefix=false Interest for /not times out; the CanBePrefix=true
// one and the exact-name one are both satisfied by /not/important.
#[tokio::test(start_paused = true)]
async fn can_be_prefix_and_timeout() {
    let (face, mut sent, engine) = start_engine().await;
    let lifetime = Duration::from_millis(5);

    let exact_only = express(
        &engine,
        Interest::new("/not".parse().unwrap()).with_lifetime(lifetime),
    );
    let prefix_ok = express(
        &engine,
        Interest::new("/not".parse().unwrap())
            .with_can_be_prefix(true)
            .with_lifetime(lifetime),
    );
    let exact_deep = express(
        &engine,
        Interest::new("/not/important".parse().unwrap()).with_lifetime(lifetime),
    );
    for _ in 0..3 {
        sent.recv().await.unwrap();
    }

    tokio::time::advance(Duration::from_millis(4)).await;
    let data = Data::new("/not/important".parse().unwrap()).with_content(&b"x"[..]);
    face.feed(data.sign_encode(&Sha256Signer).unwrap().wire)
        .await
        .unwrap();

    assert!(matches!(
        prefix_ok.await.unwrap(),
        ExpressResult::Data { .. }
    ));
    assert!(matches!(
        exact_deep.await.unwrap(),
        ExpressResult::Data { .. }
    ));
    // Let the 5 ms lifetime (plus margin) elapse.
    tokio::time::advance(Duration::from_millis(30)).await;
    assert!(matches!(exact_only.await.unwrap(), ExpressResult::Timeout));
    assert_eq!(engine.pending_interest_count(), 0);
}

// S4: implicit digests. The right digest is satisfied; a wrong digest
// for the same Data times out.
#[tokio::test(start_paused = true)]
async fn implicit_digest_matching() {
    let (face, mut sent, engine) = start_engine().await;
    let data = Data::new("/test".parse().unwrap()).with_content(&b"payload"[..]);
    let encoded = data.sign_encode(&Sha256Signer).unwrap();
    let full_name = "/test".parse::<Name>().unwrap().to_full_name(&encoded.wire);

    let good = express(
        &engine,
        Interest::new(full_name.clone()).with_lifetime(Duration::from_millis(100)),
    );
    sent.recv().await.unwrap();
    face.feed(encoded.wire.clone()).await.unwrap();
    assert!(matches!(good.await.unwrap(), ExpressResult::Data { .. }));

    // Wrong digest: same key name, different digest bytes.
    let mut wrong = full_name.prefix(full_name.len() - 1);
    wrong = wrong.append(rust_ndn_common::name::Component::implicit_digest(
        vec![0xAB; 32],
    ));
    let bad = express(
        &engine,
        Interest::new(wrong).with_lifetime(Duration::from_millis(100)),
    );
    sent.recv().await.unwrap();
    face.feed(encoded.wire.clone()).await.unwrap();
    tokio::time::advance(Duration::from_millis(200)).await;
    assert!(matches!(bad.await.unwrap(), ExpressResult::Timeout));
}

// A handler attached in the FIB answers an incoming Interest, echoing
// the PIT token on the way back.
#[tokio::test(start_paused = true)]
async fn handler_reply_carries_pit_token() {
    let (face, mut sent, engine) = start_engine().await;
    engine
        .attach_handler(
            &"/svc".parse().unwrap(),
            Arc::new(|args| {
                let data = Data::new(args.interest.name.clone()).with_content(&b"pong"[..]);
                let encoded = data.sign_encode(&Sha256Signer).unwrap();
                (args.reply)(encoded.wire).unwrap();
            }),
        )
        .unwrap();

    let interest = Interest::new("/svc/ping/1".parse().unwrap());
    let lp = LpPacket {
        pit_token: Some(Bytes::from_static(&[9, 9, 9, 9])),
        fragment: Some(vec![interest.encode().unwrap().wire]),
        ..Default::default()
    };
    face.feed(lp.encode_bytes()).await.unwrap();

    let frame = sent.recv().await.unwrap();
    match parse_frame(&frame) {
        Packet::Lp(lp) => {
            assert_eq!(lp.pit_token.as_deref(), Some(&[9u8, 9, 9, 9][..]));
            let raw = rust_ndn_common::wire::wire_join(lp.fragment.as_ref().unwrap());
            let segs = std::slice::from_ref(&raw);
            let mut view = WireView::new(segs);
            let data = Data::decode_from(&mut view).unwrap();
            assert_eq!(data.content.as_deref(), Some(&b"pong"[..]));
        }
        other => panic!("expected lp-wrapped data, got {}", other.packet_type()),
    }
}

// Double handler attachment is refused.
#[tokio::test(start_paused = true)]
async fn multiple_handlers_are_rejected() {
    let (_face, _sent, engine) = start_engine().await;
    let prefix: Name = "/svc".parse().unwrap();
    engine
        .attach_handler(&prefix, Arc::new(|_| {}))
        .unwrap();
    assert!(matches!(
        engine.attach_handler(&prefix, Arc::new(|_| {})),
        Err(rust_ndn_common::Error::MultipleHandlers)
    ));
    engine.detach_handler(&prefix);
    engine
        .attach_handler(&prefix, Arc::new(|_| {}))
        .unwrap();
}

// A management round trip: signed command out, ControlResponse back.
#[tokio::test(start_paused = true)]
async fn mgmt_command_round_trip() {
    let (face, mut sent, engine) = start_engine().await;
    let engine2 = engine.clone();
    let pending = tokio::spawn(async move {
        engine2
            .exec_mgmt_cmd(
                "rib",
                "register",
                ControlParameters::route(
                    "/apps/chat".parse().unwrap(),
                    Some(3),
                    ORIGIN_NLSR,
                    Some(1),
                ),
            )
            .await
    });

    let frame = sent.recv().await.unwrap();
    let command = match parse_frame(&frame) {
        Packet::Interest(interest) => interest,
        other => panic!("expected interest, got {}", other.packet_type()),
    };
    assert!(command.name.to_string().starts_with("/localhost/nfd/rib/register"));
    assert!(command.sig_info.is_some());
    assert!(command.app_param.is_some());

    let response = ControlResponse::ok(ControlParameters {
        name: Some("/apps/chat".parse().unwrap()),
        face_id: Some(3),
        ..Default::default()
    });
    let data = Data::new(command.name.clone())
        .with_content(response.encode_bytes())
        .with_freshness(Duration::from_secs(1));
    face.feed(data.sign_encode(&Sha256Signer).unwrap().wire)
        .await
        .unwrap();

    let response = pending.await.unwrap().expect("command succeeds");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.params.as_ref().unwrap().face_id, Some(3));
}

// Stopping the engine cancels pending Interests.
#[tokio::test(start_paused = true)]
async fn stop_cancels_pending() {
    let (_face, mut sent, engine) = start_engine().await;
    let pending = express(
        &engine,
        Interest::new("/never".parse().unwrap()).with_lifetime(Duration::from_secs(60)),
    );
    sent.recv().await.unwrap();
    engine.stop().await;
    assert!(matches!(
        pending.await.unwrap(),
        ExpressResult::Cancelled
    ));
}
