//! An in-process face for tests.
//!
//! Frames sent through the face are captured on an unbounded channel;
//! tests feed frames in and drive up/down transitions explicitly.

use super::{Face, FaceEvent};
use async_trait::async_trait;
use bytes::Bytes;
use rust_ndn_common::wire::{wire_join, Wire};
use rust_ndn_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub struct DummyFace {
    running: AtomicBool,
    events: Mutex<Option<mpsc::Sender<FaceEvent>>>,
    sent_tx: mpsc::UnboundedSender<Bytes>,
}

impl DummyFace {
    /// Returns the face and the stream of frames it has "sent".
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Bytes>) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                running: AtomicBool::new(false),
                events: Mutex::new(None),
                sent_tx,
            }),
            sent_rx,
        )
    }

    /// Delivers a frame to the engine, as if it arrived on the wire.
    pub async fn feed(&self, frame: Bytes) -> Result<()> {
        let guard = self.events.lock().await;
        let events = guard.as_ref().ok_or(Error::FaceDown)?;
        events
            .send(FaceEvent::Frame(frame))
            .await
            .map_err(|_| Error::FaceDown)
    }

    pub async fn go_down(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(events) = self.events.lock().await.as_ref() {
            let _ = events.send(FaceEvent::Down(None)).await;
        }
    }

    pub async fn go_up(&self) {
        self.running.store(true, Ordering::SeqCst);
        if let Some(events) = self.events.lock().await.as_ref() {
            let _ = events.send(FaceEvent::Up).await;
        }
    }
}

#[async_trait]
impl Face for DummyFace {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn open(&self, events: mpsc::Sender<FaceEvent>) -> Result<()> {
        *self.events.lock().await = Some(events);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(events) = self.events.lock().await.take() {
            let _ = events.send(FaceEvent::Closed).await;
        }
        Ok(())
    }

    async fn send(&self, frame: Wire) -> Result<()> {
        if !self.is_running() {
            return Err(Error::FaceDown);
        }
        self.sent_tx
            .send(wire_join(&frame))
            .map_err(|_| Error::FaceDown)
    }
}
