//! The `dv` command: run the distance-vector routing daemon.

use crate::utils;
use anyhow::Result;
use log::info;
use rust_ndn_common::name::Name;
use rust_ndn_dv::{DvConfig, DvRouter};

pub async fn run(
    transport: &str,
    network: String,
    router: String,
    neighbors: Vec<String>,
    announcements: Vec<String>,
) -> Result<()> {
    let mut config = DvConfig::new(network, router);
    for neighbor in neighbors {
        config = config.with_neighbor(neighbor, false);
    }
    config.validate().map_err(anyhow::Error::from)?;

    let engine = utils::connect(transport).await?;
    let dv = DvRouter::start(engine.clone(), config)
        .await
        .map_err(anyhow::Error::from)?;
    for announcement in announcements {
        let name: Name = announcement.parse().map_err(anyhow::Error::from)?;
        dv.announce_prefix(name, 0).map_err(anyhow::Error::from)?;
    }

    info!("dv daemon running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    let status = dv.status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    engine.stop().await;
    Ok(())
}
