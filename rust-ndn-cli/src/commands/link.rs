//! The `link` command: create and destroy forwarder faces.

use crate::utils;
use anyhow::{anyhow, Result};
use clap::Subcommand;
use rust_ndn_common::mgmt::ControlParameters;

#[derive(Subcommand)]
pub enum LinkCommands {
    /// Create a face toward a remote forwarder
    Create {
        /// Remote URI, e.g. tcp://192.0.2.1:6363
        uri: String,
    },

    /// Destroy a face by id
    Destroy {
        /// Face id to destroy
        face_id: u64,
    },
}

pub async fn run(transport: &str, cmd: LinkCommands) -> Result<()> {
    let engine = utils::connect(transport).await?;
    match cmd {
        LinkCommands::Create { uri } => {
            let params = ControlParameters {
                uri: Some(uri.clone()),
                ..Default::default()
            };
            let response = engine
                .exec_mgmt_cmd_status("faces", "create", params)
                .await
                .map_err(anyhow::Error::from)?;
            // 409 means the face already exists, which is success here.
            match response.status_code {
                200 | 409 => {
                    let face_id = response
                        .params
                        .as_ref()
                        .and_then(|p| p.face_id)
                        .unwrap_or(0);
                    println!("face {face_id} -> {uri}");
                }
                code => {
                    return Err(anyhow!(
                        "faces/create failed: status {code} {}",
                        response.status_text
                    ))
                }
            }
        }
        LinkCommands::Destroy { face_id } => {
            let params = ControlParameters {
                face_id: Some(face_id),
                ..Default::default()
            };
            engine
                .exec_mgmt_cmd("faces", "destroy", params)
                .await
                .map_err(anyhow::Error::from)?;
            println!("face {face_id} destroyed");
        }
    }
    engine.stop().await;
    Ok(())
}
