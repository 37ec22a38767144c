//! The `status` command: query and print the forwarder's face table.

use crate::utils;
use anyhow::{anyhow, Result};
use rust_ndn_common::mgmt::decode_face_dataset;
use rust_ndn_common::packet::Interest;
use rust_ndn_common::wire::WireView;
use rust_ndn_engine::engine::{ExpressOptions, ExpressResult};
use std::time::Duration;

pub async fn run(transport: &str) -> Result<()> {
    let engine = utils::connect(transport).await?;
    let interest = Interest::new("/localhost/nfd/faces/list".parse().map_err(anyhow::Error::from)?)
        .with_can_be_prefix(true)
        .with_must_be_fresh(true)
        .with_lifetime(Duration::from_secs(1));
    let result = engine
        .express_async(&interest, ExpressOptions::default())
        .await;
    let data = match result {
        ExpressResult::Data { data, .. } => data,
        ExpressResult::Nack { reason } => {
            return Err(anyhow!("faces/list nacked, reason {reason}"))
        }
        ExpressResult::Timeout => return Err(anyhow!("faces/list timed out")),
        other => return Err(anyhow!("faces/list failed: {other:?}")),
    };
    let content = data
        .content
        .ok_or_else(|| anyhow!("empty faces dataset"))?;
    let segs = std::slice::from_ref(&content);
    let mut view = WireView::new(segs);
    let faces = decode_face_dataset(&mut view).map_err(anyhow::Error::from)?;

    let entries: Vec<serde_json::Value> = faces
        .iter()
        .map(|f| {
            serde_json::json!({
                "faceId": f.face_id,
                "uri": f.uri,
                "localUri": f.local_uri,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    engine.stop().await;
    Ok(())
}
