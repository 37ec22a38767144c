//! The `ping` command.

use crate::utils;
use anyhow::Result;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::Interest;
use rust_ndn_common::Error;
use rust_ndn_engine::engine::{ExpressOptions, ExpressResult};
use std::time::{Duration, Instant};

pub async fn run(
    transport: &str,
    name: &str,
    count: usize,
    interval_ms: u64,
    lifetime_ms: u64,
) -> Result<()> {
    let prefix: Name = name.parse().map_err(anyhow::Error::from)?;
    let prefix = prefix.append(Component::generic("ping"));
    let engine = utils::connect(transport).await?;

    let mut received = 0usize;
    for i in 0..count {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        let seq: u64 = rand::random();
        let target = prefix.clone().append(Component::sequence_num(seq));
        let interest = Interest::new(target.clone())
            .with_must_be_fresh(true)
            .with_lifetime(Duration::from_millis(lifetime_ms));
        let start = Instant::now();
        match engine
            .express_async(&interest, ExpressOptions::default())
            .await
        {
            ExpressResult::Data { .. } => {
                received += 1;
                println!(
                    "content from {target}: time={:.3} ms",
                    start.elapsed().as_secs_f64() * 1e3
                );
            }
            ExpressResult::Nack { reason } => {
                println!("nack from {target}: reason={reason}");
            }
            ExpressResult::Timeout => {
                println!("timeout for {target}");
            }
            ExpressResult::Cancelled => {
                return Err(anyhow::Error::from(Error::Cancelled));
            }
            ExpressResult::Error(e) => return Err(anyhow::Error::from(e)),
        }
    }
    engine.stop().await;
    println!("{received}/{count} packets received");
    if received == 0 {
        return Err(anyhow::Error::from(Error::DeadlineExceeded));
    }
    Ok(())
}
