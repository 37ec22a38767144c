//! The forwarding engine.
//!
//! A single consumer task selects over incoming face events, posted
//! tasks and the close signal. Structural PIT/FIB mutation happens
//! under their mutexes, taken either inside the loop or by out-of-loop
//! callers (application tasks calling `express`, timer expirations).
//! Every expressed Interest receives exactly one terminal callback:
//! Data, Nack, Timeout, Cancelled or Error.

use crate::face::{Face, FaceEvent};
use crate::trie::NameTrie;
use bytes::Bytes;
use log::{debug, warn};
use rust_ndn_common::codec::TlvModel;
use rust_ndn_common::metrics::Counter;
use rust_ndn_common::mgmt::{ControlParameters, ControlResponse};
use rust_ndn_common::name::{Component, Name, TYPE_IMPLICIT_SHA256_DIGEST};
use rust_ndn_common::packet::{Data, EncodedInterest, Interest, LpPacket, Packet};
use rust_ndn_common::security::{
    covered_slices, AcceptAllChecker, Sha256Signer, SigChecker, Signer,
};
use rust_ndn_common::wire::{wire_join, Wire, WireView};
use rust_ndn_common::{Error, Result};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex, Notify};
use tokio::time::Instant;

/// Capacity of the incoming frame channel. A full channel blocks the
/// face receive loop, applying backpressure to the network.
pub const INCOMING_QUEUE_CAPACITY: usize = 256;
/// Capacity of the posted-task queue.
pub const TASK_QUEUE_CAPACITY: usize = 512;
/// Margin added to the Interest lifetime before the timeout timer fires.
const TIMEOUT_MARGIN: Duration = Duration::from_millis(10);

/// Terminal result of an expressed Interest.
pub enum ExpressResult {
    Data {
        data: Data,
        raw: Bytes,
        sig_covered: Wire,
    },
    Nack {
        reason: u64,
    },
    Timeout,
    Cancelled,
    Error(Error),
}

impl std::fmt::Debug for ExpressResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressResult::Data { data, .. } => write!(f, "Data({})", data.name),
            ExpressResult::Nack { reason } => write!(f, "Nack({reason})"),
            ExpressResult::Timeout => write!(f, "Timeout"),
            ExpressResult::Cancelled => write!(f, "Cancelled"),
            ExpressResult::Error(e) => write!(f, "Error({e})"),
        }
    }
}

pub type ExpressCallback = Box<dyn FnOnce(ExpressResult) + Send>;

/// Per-express options.
#[derive(Default, Clone)]
pub struct ExpressOptions {
    /// Wrap the Interest in a link packet directed at this face id.
    pub next_hop_face_id: Option<u64>,
    /// Sign the Interest before sending.
    pub signer: Option<Arc<dyn Signer>>,
}

/// Arguments handed to an attached Interest handler.
pub struct InterestArgs {
    pub interest: Interest,
    pub raw: Bytes,
    pub sig_covered: Wire,
    pub pit_token: Option<Bytes>,
    pub incoming_face_id: Option<u64>,
    pub deadline: Instant,
    /// Sends a Data packet back the way the Interest came, preserving
    /// the PIT token.
    pub reply: ReplyFn,
}

pub type ReplyFn = Arc<dyn Fn(Bytes) -> Result<()> + Send + Sync>;
pub type InterestHandler = Arc<dyn Fn(InterestArgs) + Send + Sync>;
type Task = Box<dyn FnOnce() + Send>;

/// An idempotent cancellation handle for a PIT entry's timeout.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the handle was already cancelled.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct PitEntry {
    callback: ExpressCallback,
    deadline: Instant,
    can_be_prefix: bool,
    #[allow(dead_code)]
    must_be_fresh: bool,
    implicit_digest: Option<[u8; 32]>,
    cancel: CancelHandle,
}

/// Engine-wide counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub interests_expressed: Counter,
    pub interests_dispatched: Counter,
    pub data_received: Counter,
    pub nacks_received: Counter,
    pub timeouts: Counter,
    pub packets_dropped: Counter,
}

/// Engine configuration: the management prefix and credentials.
#[derive(Clone)]
pub struct EngineConfig {
    pub mgmt_prefix: Name,
    pub cmd_timeout: Duration,
    pub signer: Arc<dyn Signer>,
    pub checker: Arc<dyn SigChecker>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mgmt_prefix: "/localhost/nfd".parse().expect("static name"),
            cmd_timeout: Duration::from_secs(1),
            signer: Arc::new(Sha256Signer),
            checker: Arc::new(AcceptAllChecker),
        }
    }
}

pub struct Engine {
    face: Arc<dyn Face>,
    config: EngineConfig,
    fib: Mutex<NameTrie<InterestHandler>>,
    pit: Mutex<NameTrie<Vec<PitEntry>>>,
    task_tx: mpsc::Sender<Task>,
    receivers: AsyncMutex<Option<(mpsc::Receiver<FaceEvent>, mpsc::Receiver<Task>)>>,
    close: Notify,
    running: AtomicBool,
    on_up_hooks: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    pub metrics: EngineMetrics,
}

impl Engine {
    /// Opens the face and starts the consumer loop.
    pub async fn start(face: Arc<dyn Face>, config: EngineConfig) -> Result<Arc<Engine>> {
        let (event_tx, event_rx) = mpsc::channel(INCOMING_QUEUE_CAPACITY);
        let (task_tx, task_rx) = mpsc::channel(TASK_QUEUE_CAPACITY);
        let engine = Arc::new(Engine {
            face: face.clone(),
            config,
            fib: Mutex::new(NameTrie::new()),
            pit: Mutex::new(NameTrie::new()),
            task_tx,
            receivers: AsyncMutex::new(Some((event_rx, task_rx))),
            close: Notify::new(),
            running: AtomicBool::new(false),
            on_up_hooks: Mutex::new(Vec::new()),
            metrics: EngineMetrics::default(),
        });
        face.open(event_tx).await?;
        engine.running.store(true, Ordering::SeqCst);
        let consumer = engine.clone();
        tokio::spawn(async move { consumer.run_loop().await });
        Ok(engine)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn face(&self) -> &Arc<dyn Face> {
        &self.face
    }

    /// The signer used for management commands.
    pub fn signer(&self) -> Arc<dyn Signer> {
        self.config.signer.clone()
    }

    /// Number of Interests currently pending in the PIT.
    pub fn pending_interest_count(&self) -> usize {
        let pit = self.pit.lock().unwrap();
        let mut count = 0;
        pit.for_each_value(|entries| count += entries.len());
        count
    }

    /// Signals the consumer loop to stop and closes the face. Pending
    /// Interests receive a Cancelled result.
    pub async fn stop(&self) {
        self.close.notify_one();
        let _ = self.face.close().await;
    }

    /// Posts a task onto the consumer loop.
    pub fn post(&self, task: Task) -> Result<()> {
        self.task_tx
            .try_send(task)
            .map_err(|_| Error::InvalidValue("engine task queue is full".into()))
    }

    /// Runs `hook` every time the face transitions up.
    pub fn on_face_up(&self, hook: Arc<dyn Fn() + Send + Sync>) {
        self.on_up_hooks.lock().unwrap().push(hook);
    }

    /* ------------------------------------------------------------ *
     * FIB
     * ------------------------------------------------------------ */

    /// Attaches an Interest handler at a prefix. At most one handler
    /// per prefix.
    pub fn attach_handler(&self, prefix: &Name, handler: InterestHandler) -> Result<()> {
        let mut fib = self.fib.lock().unwrap();
        let slot = fib.fill_path(prefix);
        if slot.is_some() {
            return Err(Error::MultipleHandlers);
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn detach_handler(&self, prefix: &Name) {
        self.fib.lock().unwrap().remove(prefix);
    }

    /* ------------------------------------------------------------ *
     * Express
     * ------------------------------------------------------------ */

    /// Sends an Interest; `callback` fires exactly once with the
    /// terminal result. Send failures are logged, not unrolled: the
    /// timeout still fires.
    pub fn express(
        self: &Arc<Self>,
        interest: &Interest,
        opts: ExpressOptions,
        callback: ExpressCallback,
    ) -> Result<()> {
        let encoded = match &opts.signer {
            Some(signer) => interest.sign_encode(signer.as_ref())?,
            None => interest.encode()?,
        };
        self.express_encoded(interest, encoded, opts.next_hop_face_id, callback)
    }

    /// Express-and-await built on a one-shot channel.
    pub async fn express_async(
        self: &Arc<Self>,
        interest: &Interest,
        opts: ExpressOptions,
    ) -> ExpressResult {
        let (tx, rx) = oneshot::channel();
        let callback: ExpressCallback = Box::new(move |result| {
            let _ = tx.send(result);
        });
        if let Err(e) = self.express(interest, opts, callback) {
            return ExpressResult::Error(e);
        }
        rx.await.unwrap_or(ExpressResult::Cancelled)
    }

    fn express_encoded(
        self: &Arc<Self>,
        interest: &Interest,
        encoded: EncodedInterest,
        next_hop: Option<u64>,
        callback: ExpressCallback,
    ) -> Result<()> {
        let (key, implicit_digest) = strip_implicit_digest(&encoded.final_name)?;
        if key.is_empty() {
            return Err(Error::InvalidValue("interest name is empty".into()));
        }

        let lifetime = interest.lifetime_or_default();
        let deadline = Instant::now() + lifetime;
        let cancel = CancelHandle::new();
        {
            let mut pit = self.pit.lock().unwrap();
            pit.fill_path(&key)
                .get_or_insert_with(Vec::new)
                .push(PitEntry {
                    callback,
                    deadline,
                    can_be_prefix: interest.can_be_prefix,
                    must_be_fresh: interest.must_be_fresh,
                    implicit_digest,
                    cancel: cancel.clone(),
                });
        }

        let weak: Weak<Engine> = Arc::downgrade(self);
        let timeout_key = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline + TIMEOUT_MARGIN).await;
            if cancel.is_cancelled() {
                return;
            }
            if let Some(engine) = weak.upgrade() {
                engine.on_timeout(&timeout_key);
            }
        });

        let frame: Wire = match next_hop {
            Some(face_id) => LpPacket::wrap(vec![encoded.wire])
                .with_next_hop(face_id)
                .encode_wire(),
            None => vec![encoded.wire],
        };
        let face = self.face.clone();
        tokio::spawn(async move {
            if let Err(e) = face.send(frame).await {
                warn!("[Engine] interest send failed: {e}");
            }
        });
        self.metrics.interests_expressed.increment();
        Ok(())
    }

    /* ------------------------------------------------------------ *
     * Consumer loop and dispatch
     * ------------------------------------------------------------ */

    async fn run_loop(self: Arc<Self>) {
        let Some((mut events, mut tasks)) = self.receivers.lock().await.take() else {
            return;
        };
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(FaceEvent::Frame(frame)) => self.handle_frame(frame),
                    Some(FaceEvent::Up) => self.handle_face_up(),
                    Some(FaceEvent::Down(cause)) => {
                        warn!("[Engine] face down: {}", cause.as_deref().unwrap_or("closed by peer"));
                    }
                    Some(FaceEvent::Closed) | None => break,
                },
                Some(task) = tasks.recv() => task(),
                _ = self.close.notified() => break,
            }
        }
        self.running.store(false, Ordering::SeqCst);
        let mut cancelled = Vec::new();
        {
            let mut pit = self.pit.lock().unwrap();
            pit.drain_values(|entries| {
                for entry in entries {
                    entry.cancel.cancel();
                    cancelled.push(entry.callback);
                }
            });
        }
        for callback in cancelled {
            callback(ExpressResult::Cancelled);
        }
        debug!("[Engine] consumer loop stopped");
    }

    fn handle_face_up(&self) {
        let hooks = self.on_up_hooks.lock().unwrap().clone();
        for hook in hooks {
            hook();
        }
    }

    fn handle_frame(self: &Arc<Self>, frame: Bytes) {
        if let Err(e) = self.dispatch_frame(frame) {
            self.metrics.packets_dropped.increment();
            debug!("[Engine] dropping packet: {e}");
        }
    }

    fn dispatch_frame(self: &Arc<Self>, frame: Bytes) -> Result<()> {
        let segs = std::slice::from_ref(&frame);
        let mut view = WireView::new(segs);
        match Packet::decode_from(&mut view)? {
            Packet::Lp(lp) => {
                if lp.is_fragmented() {
                    return Err(Error::Unsupported("fragmented link packets"));
                }
                let fragment = lp
                    .fragment
                    .as_ref()
                    .ok_or_else(|| Error::format("link packet without fragment"))?;
                let raw = wire_join(fragment);
                let segs = std::slice::from_ref(&raw);
                let mut inner = WireView::new(segs);
                match Packet::decode_from(&mut inner)? {
                    Packet::Interest(interest) => {
                        if let Some(reason) = lp.nack_reason() {
                            self.handle_nack(&interest, reason)
                        } else {
                            self.handle_interest(interest, raw, lp.pit_token, lp.incoming_face_id)
                        }
                    }
                    Packet::Data(data) => self.handle_data(data, raw),
                    Packet::Lp(_) => Err(Error::Unsupported("nested link packets")),
                }
            }
            Packet::Interest(interest) => self.handle_interest(interest, frame, None, None),
            Packet::Data(data) => self.handle_data(data, frame),
        }
    }

    fn handle_interest(
        self: &Arc<Self>,
        interest: Interest,
        raw: Bytes,
        pit_token: Option<Bytes>,
        incoming_face_id: Option<u64>,
    ) -> Result<()> {
        let handler = {
            let fib = self.fib.lock().unwrap();
            fib.longest_match(&interest.name).map(|(_, h)| h.clone())
        };
        let Some(handler) = handler else {
            debug!("[Engine] no handler for {}", interest.name);
            return Ok(());
        };
        self.metrics.interests_dispatched.increment();
        let deadline = Instant::now() + interest.lifetime_or_default();
        let reply = make_reply(self.face.clone(), pit_token.clone());
        handler(InterestArgs {
            sig_covered: interest.sig_covered.clone(),
            interest,
            raw,
            pit_token,
            incoming_face_id,
            deadline,
            reply,
        });
        Ok(())
    }

    fn handle_data(&self, data: Data, raw: Bytes) -> Result<()> {
        self.metrics.data_received.increment();
        let digest: [u8; 32] = Sha256::digest(&raw).into();
        let name_len = data.name.len();
        let mut satisfied: Vec<ExpressCallback> = Vec::new();
        {
            let mut pit = self.pit.lock().unwrap();
            pit.visit_path_mut(&data.name, |depth, entries| {
                let mut i = 0;
                while i < entries.len() {
                    let entry = &entries[i];
                    let exact = depth == name_len;
                    if !exact && !entry.can_be_prefix {
                        i += 1;
                        continue;
                    }
                    if let Some(expected) = &entry.implicit_digest {
                        if !exact || expected != &digest {
                            i += 1;
                            continue;
                        }
                    }
                    let entry = entries.remove(i);
                    entry.cancel.cancel();
                    satisfied.push(entry.callback);
                }
            });
            pit.prune_path(&data.name, |entries| !entries.is_empty());
        }
        if satisfied.is_empty() {
            debug!("[Engine] unsolicited data {}", data.name);
        }
        for callback in satisfied {
            callback(ExpressResult::Data {
                data: data.clone(),
                raw: raw.clone(),
                sig_covered: data.sig_covered.clone(),
            });
        }
        Ok(())
    }

    fn handle_nack(&self, interest: &Interest, reason: u64) -> Result<()> {
        self.metrics.nacks_received.increment();
        let (key, _) = strip_implicit_digest(&interest.name)?;
        let mut nacked: Vec<ExpressCallback> = Vec::new();
        {
            let mut pit = self.pit.lock().unwrap();
            if let Some(entries) = pit.exact_mut(&key) {
                for entry in entries.drain(..) {
                    entry.cancel.cancel();
                    nacked.push(entry.callback);
                }
            }
            pit.prune_path(&key, |entries| !entries.is_empty());
        }
        debug!("[Engine] nack {} reason {reason}", interest.name);
        for callback in nacked {
            callback(ExpressResult::Nack { reason });
        }
        Ok(())
    }

    /// Timer expiration for a PIT node: every entry past its deadline
    /// times out.
    fn on_timeout(&self, key: &Name) {
        let now = Instant::now();
        let mut expired: Vec<ExpressCallback> = Vec::new();
        {
            let mut pit = self.pit.lock().unwrap();
            if let Some(entries) = pit.exact_mut(key) {
                let mut i = 0;
                while i < entries.len() {
                    if entries[i].deadline <= now {
                        let entry = entries.remove(i);
                        entry.cancel.cancel();
                        expired.push(entry.callback);
                    } else {
                        i += 1;
                    }
                }
            }
            pit.prune_path(key, |entries| !entries.is_empty());
        }
        for callback in expired {
            self.metrics.timeouts.increment();
            callback(ExpressResult::Timeout);
        }
    }

    /* ------------------------------------------------------------ *
     * Management commands
     * ------------------------------------------------------------ */

    /// Executes a management command and returns the response whatever
    /// its status code.
    pub async fn exec_mgmt_cmd_status(
        self: &Arc<Self>,
        module: &str,
        verb: &str,
        params: ControlParameters,
    ) -> Result<ControlResponse> {
        let name = self
            .config
            .mgmt_prefix
            .clone()
            .append(Component::generic(module))
            .append(Component::generic(verb));
        let interest = Interest::new(name)
            .with_must_be_fresh(true)
            .with_lifetime(self.config.cmd_timeout)
            .with_app_param(params.encode_bytes());
        let opts = ExpressOptions {
            signer: Some(self.config.signer.clone()),
            next_hop_face_id: None,
        };
        match self.express_async(&interest, opts).await {
            ExpressResult::Data {
                data, sig_covered, ..
            } => {
                self.config.checker.check(
                    data.sig_info.as_ref(),
                    &covered_slices(&sig_covered),
                    data.sig_value.as_deref(),
                )?;
                let content = data
                    .content
                    .ok_or_else(|| Error::Protocol("empty management response".into()))?;
                ControlResponse::decode(&content)
            }
            ExpressResult::Nack { reason } => Err(Error::Protocol(format!(
                "management command nacked, reason {reason}"
            ))),
            ExpressResult::Timeout => Err(Error::DeadlineExceeded),
            ExpressResult::Cancelled => Err(Error::Cancelled),
            ExpressResult::Error(e) => Err(e),
        }
    }

    /// Executes a management command, requiring status 200.
    pub async fn exec_mgmt_cmd(
        self: &Arc<Self>,
        module: &str,
        verb: &str,
        params: ControlParameters,
    ) -> Result<ControlResponse> {
        let response = self.exec_mgmt_cmd_status(module, verb, params).await?;
        if !response.is_ok() {
            return Err(Error::Protocol(format!(
                "{module}/{verb} failed: status {} {}",
                response.status_code, response.status_text
            )));
        }
        Ok(response)
    }
}

/// Splits a trailing implicit-digest component off a name. The remainder
/// is the PIT key.
fn strip_implicit_digest(name: &Name) -> Result<(Name, Option<[u8; 32]>)> {
    let last = name.at(-1);
    if last.typ != TYPE_IMPLICIT_SHA256_DIGEST {
        return Ok((name.clone(), None));
    }
    let digest: [u8; 32] = last.value[..]
        .try_into()
        .map_err(|_| Error::InvalidValue("implicit digest must be 32 bytes".into()))?;
    Ok((name.prefix(name.len() - 1), Some(digest)))
}

fn make_reply(face: Arc<dyn Face>, pit_token: Option<Bytes>) -> ReplyFn {
    Arc::new(move |data_wire: Bytes| {
        let frame: Wire = match &pit_token {
            Some(token) => LpPacket::wrap(vec![data_wire])
                .with_pit_token(token.clone())
                .encode_wire(),
            None => vec![data_wire],
        };
        let face = face.clone();
        tokio::spawn(async move {
            if let Err(e) = face.send(frame).await {
                warn!("[Engine] reply send failed: {e}");
            }
        });
        Ok(())
    })
}
