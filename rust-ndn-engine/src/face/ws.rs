//! WebSocket face: one binary message per packet.

use super::{Face, FaceEvent};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use log::{debug, warn};
use rust_ndn_common::wire::{wire_join, Wire};
use rust_ndn_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// A face over a WebSocket connection.
pub struct WsFace {
    url: String,
    running: Arc<AtomicBool>,
    writer: Mutex<Option<WsSink>>,
    events: Mutex<Option<mpsc::Sender<FaceEvent>>>,
}

impl WsFace {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            running: Arc::new(AtomicBool::new(false)),
            writer: Mutex::new(None),
            events: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Face for WsFace {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn open(&self, events: mpsc::Sender<FaceEvent>) -> Result<()> {
        if self.is_running() {
            return Err(Error::InvalidValue("face is already open".into()));
        }
        let (socket, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| Error::Network(format!("connect {}: {e}", self.url)))?;
        let (sink, mut stream) = socket.split();
        *self.writer.lock().await = Some(sink);
        *self.events.lock().await = Some(events.clone());
        self.running.store(true, Ordering::SeqCst);
        debug!("[Face {}] open", self.url);

        let running = Arc::clone(&self.running);
        let url = self.url.clone();
        tokio::spawn(async move {
            let _ = events.send(FaceEvent::Up).await;
            let cause = loop {
                match stream.next().await {
                    Some(Ok(Message::Binary(payload))) => {
                        if events
                            .send(FaceEvent::Frame(Bytes::from(payload)))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break None,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("[Face {url}] receive error: {e}");
                        break Some(e.to_string());
                    }
                }
            };
            running.store(false, Ordering::SeqCst);
            debug!("[Face {url}] down");
            let _ = events.send(FaceEvent::Down(cause)).await;
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut sink) = self.writer.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
        if let Some(events) = self.events.lock().await.take() {
            let _ = events.send(FaceEvent::Closed).await;
        }
        Ok(())
    }

    async fn send(&self, frame: Wire) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let sink = guard.as_mut().ok_or(Error::FaceDown)?;
        if !self.is_running() {
            return Err(Error::FaceDown);
        }
        let payload = wire_join(&frame).to_vec();
        sink.send(Message::Binary(payload))
            .await
            .map_err(|e| Error::Network(format!("send: {e}")))
    }
}
