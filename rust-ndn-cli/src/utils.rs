//! Transport parsing, engine bring-up and exit codes.

use anyhow::{anyhow, Context, Result};
use rust_ndn_common::Error;
use rust_ndn_engine::engine::{Engine, EngineConfig};
use rust_ndn_engine::face::{Face, StreamFace, WsFace};
use std::sync::Arc;

/// Exit code conventions: 0 ok, 1 runtime error, 2 usage error,
/// 9 invalid argument, 106 face down.
pub const EXIT_RUNTIME: i32 = 1;
pub const EXIT_INVALID_ARG: i32 = 9;
pub const EXIT_FACE_DOWN: i32 = 106;

pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(Error::FaceDown) | Some(Error::Network(_)) => EXIT_FACE_DOWN,
        Some(Error::InvalidValue(_)) | Some(Error::Format(_)) => EXIT_INVALID_ARG,
        _ => EXIT_RUNTIME,
    }
}

/// Builds a face from a transport URI.
pub fn parse_transport(uri: &str) -> Result<Arc<dyn Face>> {
    if let Some(path) = uri.strip_prefix("unix://") {
        return Ok(Arc::new(StreamFace::unix(path)));
    }
    if let Some(addr) = uri.strip_prefix("tcp://") {
        return Ok(Arc::new(StreamFace::tcp(addr)));
    }
    if uri.starts_with("ws://") || uri.starts_with("wss://") {
        return Ok(Arc::new(WsFace::new(uri)));
    }
    Err(anyhow!(Error::InvalidValue(format!(
        "unsupported transport \"{uri}\""
    ))))
}

/// Connects to the forwarder and starts an engine on the face.
pub async fn connect(uri: &str) -> Result<Arc<Engine>> {
    let face = parse_transport(uri)?;
    Engine::start(face, EngineConfig::default())
        .await
        .with_context(|| format!("connecting to {uri}"))
}
