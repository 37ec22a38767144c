//! Unix and TCP stream faces.

use super::{extract_frame, Face, FaceEvent};
use async_trait::async_trait;
use bytes::BytesMut;
use log::{debug, warn};
use rust_ndn_common::wire::Wire;
use rust_ndn_common::{Error, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::{mpsc, Mutex};

trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> AsyncStream for T {}

/// Where a stream face connects.
#[derive(Debug, Clone)]
pub enum StreamTarget {
    /// A Unix socket path, e.g. `/run/nfd/nfd.sock`.
    Unix(PathBuf),
    /// A TCP host:port.
    Tcp(String),
}

/// A face over a byte-stream transport, TLV-stream framed.
pub struct StreamFace {
    target: StreamTarget,
    running: Arc<AtomicBool>,
    writer: Mutex<Option<WriteHalf<Box<dyn AsyncStream>>>>,
    events: Mutex<Option<mpsc::Sender<FaceEvent>>>,
}

impl StreamFace {
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::new(StreamTarget::Unix(path.into()))
    }

    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(StreamTarget::Tcp(addr.into()))
    }

    pub fn new(target: StreamTarget) -> Self {
        Self {
            target,
            running: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(None),
            events: Mutex::new(None),
        }
    }

    fn describe(&self) -> String {
        match &self.target {
            StreamTarget::Unix(path) => format!("unix://{}", path.display()),
            StreamTarget::Tcp(addr) => format!("tcp://{addr}"),
        }
    }
}

#[async_trait]
impl Face for StreamFace {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_local(&self) -> bool {
        matches!(self.target, StreamTarget::Unix(_))
    }

    async fn open(&self, events: mpsc::Sender<FaceEvent>) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidValue("face is already open".into()));
        }
        let stream: Box<dyn AsyncStream> = match &self.target {
            StreamTarget::Unix(path) => Box::new(
                UnixStream::connect(path)
                    .await
                    .map_err(|e| Error::Network(format!("connect {}: {e}", self.describe())))?,
            ),
            StreamTarget::Tcp(addr) => Box::new(
                TcpStream::connect(addr)
                    .await
                    .map_err(|e| Error::Network(format!("connect {}: {e}", self.describe())))?,
            ),
        };
        let (mut reader, writer) = tokio::io::split(stream);
        *self.writer.lock().await = Some(writer);
        *self.events.lock().await = Some(events.clone());
        self.running.store(true, Ordering::SeqCst);
        debug!("[Face {}] open", self.describe());

        let running = Arc::clone(&self.running);
        let label = self.describe();
        tokio::spawn(async move {
            let _ = events.send(FaceEvent::Up).await;
            let mut buf = BytesMut::with_capacity(8800);
            let cause = 'recv: loop {
                match reader.read_buf(&mut buf).await {
                    Ok(0) => break None,
                    Ok(_) => loop {
                        match extract_frame(&mut buf) {
                            Ok(Some(frame)) => {
                                if events.send(FaceEvent::Frame(frame)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                warn!("[Face {label}] broken TLV stream: {e}");
                                break 'recv Some(e.to_string());
                            }
                        }
                    },
                    Err(e) => break Some(e.to_string()),
                }
            };
            running.store(false, Ordering::SeqCst);
            debug!("[Face {label}] down");
            let _ = events.send(FaceEvent::Down(cause)).await;
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        if let Some(events) = self.events.lock().await.take() {
            let _ = events.send(FaceEvent::Closed).await;
        }
        Ok(())
    }

    async fn send(&self, frame: Wire) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::FaceDown)?;
        if !self.is_running() {
            return Err(Error::FaceDown);
        }
        for seg in &frame {
            writer
                .write_all(seg)
                .await
                .map_err(|e| Error::Network(format!("send: {e}")))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| Error::Network(format!("flush: {e}")))?;
        Ok(())
    }
}
