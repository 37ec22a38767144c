//! The distance-vector router.
//!
//! One mutex guards all router state. Cooperating tasks around it:
//! handlers attached to the engine (sync Interests, advert and prefix
//! snapshot serving), a periodic tick (sync beacons, dead-neighbor
//! pruning), spawned advertisement fetches, and a dedicated task that
//! serializes management commands toward the forwarder.

use crate::advert::{Advertisement, StateVector};
use crate::config::DvConfig;
use crate::fib::{Fib, FibCmd};
use crate::neighbors::NeighborTable;
use crate::prefix_table::{PrefixOp, PrefixOpList, PrefixTable};
use crate::rib::Rib;
use log::{debug, info, warn};
use rust_ndn_common::codec::TlvModel;
use rust_ndn_common::mgmt::{ControlParameters, ORIGIN_NLSR};
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::{Data, Interest};
use rust_ndn_common::wire::WireView;
use rust_ndn_common::{Error, Result};
use rust_ndn_engine::engine::{Engine, ExpressOptions, ExpressResult, InterestArgs};
use rust_ndn_engine::store::{MemStore, Store};
use serde::Serialize;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

/// Freshness of published advertisement packets.
const ADVERT_FRESHNESS: Duration = Duration::from_secs(10);
/// Lifetime of sync beacon Interests.
const SYNC_LIFETIME: Duration = Duration::from_secs(1);
/// Advert fetch retry schedule.
const FETCH_ATTEMPTS: usize = 3;
const FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Management command retry schedule.
const CMD_ATTEMPTS: usize = 3;
const CMD_RETRY_DELAY: Duration = Duration::from_millis(100);

/// A point-in-time summary for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct DvStatus {
    pub router: String,
    pub network: String,
    pub boot_time: u64,
    pub advert_seq: u64,
    pub neighbor_count: usize,
    pub rib_size: usize,
    pub fib_size: usize,
}

struct DvState {
    neighbors: NeighborTable,
    rib: Rib,
    fib: Fib,
    prefix_table: PrefixTable,
    advert_seq: u64,
    prefix_seq: u64,
    last_advert: Option<Advertisement>,
    // Last (boot, seq) prefix snapshot applied per remote router.
    prefix_seen: std::collections::HashMap<u64, (u64, u64)>,
}

pub struct DvRouter {
    engine: Arc<Engine>,
    config: DvConfig,
    network: Name,
    router: Name,
    boot_time: u64,
    store: Arc<MemStore>,
    state: Mutex<DvState>,
    cmd_tx: mpsc::UnboundedSender<FibCmd>,
}

impl DvRouter {
    /// Attaches the routing handlers and starts the router's tasks.
    pub async fn start(engine: Arc<Engine>, config: DvConfig) -> Result<Arc<DvRouter>> {
        config.validate()?;
        let network = config.network_name()?;
        let router = config.router_name()?;
        let boot_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let mut neighbors = NeighborTable::new();
        for n in &config.neighbors {
            let name: Name = n.name.parse()?;
            neighbors.ensure(&name, !n.passive);
        }

        let dv = Arc::new(DvRouter {
            engine: engine.clone(),
            network: network.clone(),
            router: router.clone(),
            boot_time,
            store: Arc::new(MemStore::new()),
            state: Mutex::new(DvState {
                neighbors,
                rib: Rib::default(),
                fib: Fib::new(config.cost_infinity),
                prefix_table: PrefixTable::new(),
                advert_seq: 0,
                prefix_seq: 0,
                last_advert: None,
                prefix_seen: std::collections::HashMap::new(),
            }),
            cmd_tx,
            config,
        });

        dv.attach_handlers()?;
        tokio::spawn(run_cmd_task(engine, cmd_rx));
        let tick: Weak<DvRouter> = Arc::downgrade(&dv);
        let interval = dv.config.advertise_interval();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let Some(dv) = tick.upgrade() else { return };
                dv.on_tick().await;
            }
        });

        dv.recompute();
        info!("[DV {}] started (boot {})", dv.router, dv.boot_time);
        Ok(dv)
    }

    pub fn status(&self) -> DvStatus {
        let state = self.state.lock().unwrap();
        DvStatus {
            router: self.router.to_string(),
            network: self.network.to_string(),
            boot_time: self.boot_time,
            advert_seq: state.advert_seq,
            neighbor_count: state.neighbors.len(),
            rib_size: state.rib.len(),
            fib_size: state.fib.len(),
        }
    }

    /* ------------------------------------------------------------ *
     * Local prefix announcements
     * ------------------------------------------------------------ */

    /// Announces a local application prefix into the network.
    pub fn announce_prefix(&self, name: Name, cost: u64) -> Result<()> {
        self.apply_local_op(PrefixOp::Add { name, cost })
    }

    /// Withdraws a previously announced prefix.
    pub fn withdraw_prefix(&self, name: Name) -> Result<()> {
        self.apply_local_op(PrefixOp::Remove { name })
    }

    fn apply_local_op(&self, op: PrefixOp) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock().unwrap();
            let list = PrefixOpList {
                exit_router: self.router.clone(),
                ops: vec![op],
            };
            if !state.prefix_table.apply(&list) {
                return Ok(());
            }
            state.prefix_seq += 1;
            let snapshot = state.prefix_table.snapshot_of(&self.router);
            (snapshot, state.prefix_seq)
        };
        self.publish_prefix_snapshot(&snapshot.0, snapshot.1)?;
        self.send_sync();
        self.recompute();
        Ok(())
    }

    fn publish_prefix_snapshot(&self, snapshot: &PrefixOpList, seq: u64) -> Result<()> {
        let name = self
            .config
            .prefix_data_prefix(&self.router)
            .append(Component::timestamp(self.boot_time))
            .append(Component::version(seq));
        let data = Data::new(name.clone())
            .with_content(snapshot.encode_bytes())
            .with_freshness(ADVERT_FRESHNESS);
        let encoded = data.sign_encode(self.engine.signer().as_ref())?;
        self.store.put(&name, &encoded.wire)
    }

    /* ------------------------------------------------------------ *
     * Handlers
     * ------------------------------------------------------------ */

    fn attach_handlers(self: &Arc<Self>) -> Result<()> {
        // Serve advert and prefix snapshots from the object directory.
        for prefix in [
            self.config.advert_data_prefix(&self.router),
            self.config.prefix_data_prefix(&self.router),
        ] {
            let store = self.store.clone();
            self.engine.attach_handler(
                &prefix,
                Arc::new(move |args: InterestArgs| {
                    match store.get(&args.interest.name, args.interest.can_be_prefix) {
                        Ok(Some(wire)) => {
                            let _ = (args.reply)(wire);
                        }
                        Ok(None) => {}
                        Err(e) => warn!("[DV] object directory error: {e}"),
                    }
                }),
            )?;
        }

        // Sync beacons: network-scoped (active) and localhop (passive).
        for (prefix, passive) in [
            (self.config.advert_sync_prefix(&self.network), false),
            (self.config.passive_sync_prefix(&self.network), true),
        ] {
            let weak = Arc::downgrade(self);
            self.engine.attach_handler(
                &prefix,
                Arc::new(move |args: InterestArgs| {
                    if let Some(dv) = weak.upgrade() {
                        dv.handle_advert_sync(&args, passive);
                    }
                }),
            )?;
        }

        // Prefix-table sync group.
        let weak = Arc::downgrade(self);
        self.engine.attach_handler(
            &self.config.prefix_sync_prefix(&self.network),
            Arc::new(move |args: InterestArgs| {
                if let Some(dv) = weak.upgrade() {
                    dv.handle_prefix_sync(&args);
                }
            }),
        )?;
        Ok(())
    }

    fn parse_sync_vector(args: &InterestArgs) -> Option<StateVector> {
        let param = args.interest.app_param.as_ref()?;
        let segs = std::slice::from_ref(param);
        let mut view = WireView::new(segs);
        StateVector::decode_from(&mut view).ok()
    }

    fn handle_advert_sync(self: &Arc<Self>, args: &InterestArgs, passive: bool) {
        let Some(vector) = Self::parse_sync_vector(args) else {
            debug!("[DV {}] malformed sync interest", self.router);
            return;
        };
        for entry in &vector.entries {
            if entry.router == self.router {
                continue;
            }
            let decision = {
                let mut state = self.state.lock().unwrap();
                state.neighbors.on_sync(
                    &entry.router,
                    entry.boot,
                    entry.seq,
                    args.incoming_face_id,
                    passive,
                )
            };
            if decision.face_changed {
                debug!(
                    "[DV {}] neighbor {} moved to face {:?}",
                    self.router, entry.router, args.incoming_face_id
                );
                self.recompute();
            }
            if decision.needs_fetch {
                let dv = self.clone();
                let router = entry.router.clone();
                let (boot, seq) = (entry.boot, entry.seq);
                tokio::spawn(async move { dv.fetch_advert(router, boot, seq).await });
            }
        }
    }

    fn handle_prefix_sync(self: &Arc<Self>, args: &InterestArgs) {
        let Some(vector) = Self::parse_sync_vector(args) else {
            return;
        };
        for entry in &vector.entries {
            if entry.router == self.router {
                continue;
            }
            let outdated = {
                let state = self.state.lock().unwrap();
                let seen = state
                    .prefix_seen
                    .get(&entry.router.hash_u64())
                    .copied()
                    .unwrap_or((0, 0));
                (entry.boot, entry.seq) > seen
            };
            if !outdated {
                continue;
            }
            let dv = self.clone();
            let router = entry.router.clone();
            let (boot, seq) = (entry.boot, entry.seq);
            tokio::spawn(async move { dv.fetch_prefix_snapshot(router, boot, seq).await });
        }
    }

    /* ------------------------------------------------------------ *
     * Fetch paths
     * ------------------------------------------------------------ */

    async fn fetch_versioned(&self, name: Name) -> Result<Data> {
        let mut last_err = Error::DeadlineExceeded;
        for attempt in 0..FETCH_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(FETCH_RETRY_DELAY).await;
            }
            let interest = Interest::new(name.clone()).with_lifetime(SYNC_LIFETIME);
            match self
                .engine
                .express_async(&interest, ExpressOptions::default())
                .await
            {
                ExpressResult::Data { data, .. } => return Ok(data),
                ExpressResult::Nack { reason } => {
                    last_err = Error::Protocol(format!("fetch nacked, reason {reason}"));
                }
                ExpressResult::Timeout => last_err = Error::DeadlineExceeded,
                ExpressResult::Cancelled => return Err(Error::Cancelled),
                ExpressResult::Error(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    async fn fetch_advert(self: Arc<Self>, router: Name, boot: u64, seq: u64) {
        let name = self
            .config
            .advert_data_prefix(&router)
            .append(Component::timestamp(boot))
            .append(Component::version(seq));
        match self.fetch_versioned(name).await {
            Ok(data) => {
                let Some(content) = data.content else {
                    warn!("[DV {}] empty advert from {router}", self.router);
                    return;
                };
                let segs = std::slice::from_ref(&content);
                let mut view = WireView::new(segs);
                match Advertisement::decode_from(&mut view) {
                    Ok(advert) => {
                        {
                            let mut state = self.state.lock().unwrap();
                            state.neighbors.store_advert(&router, boot, seq, advert);
                        }
                        debug!("[DV {}] advert {seq} from {router}", self.router);
                        self.recompute();
                    }
                    Err(e) => warn!("[DV {}] bad advert from {router}: {e}", self.router),
                }
            }
            Err(e) => warn!("[DV {}] advert fetch from {router} failed: {e}", self.router),
        }
    }

    async fn fetch_prefix_snapshot(self: Arc<Self>, router: Name, boot: u64, seq: u64) {
        let name = self
            .config
            .prefix_data_prefix(&router)
            .append(Component::timestamp(boot))
            .append(Component::version(seq));
        match self.fetch_versioned(name).await {
            Ok(data) => {
                let Some(content) = data.content else { return };
                let segs = std::slice::from_ref(&content);
                let mut view = WireView::new(segs);
                match PrefixOpList::decode_from(&mut view) {
                    Ok(list) => {
                        let changed = {
                            let mut state = self.state.lock().unwrap();
                            state.prefix_seen.insert(router.hash_u64(), (boot, seq));
                            state.prefix_table.apply(&list)
                        };
                        if changed {
                            self.recompute();
                        }
                    }
                    Err(e) => warn!("[DV {}] bad prefix snapshot: {e}", self.router),
                }
            }
            Err(e) => warn!(
                "[DV {}] prefix snapshot fetch from {router} failed: {e}",
                self.router
            ),
        }
    }

    /* ------------------------------------------------------------ *
     * Periodic work
     * ------------------------------------------------------------ */

    async fn on_tick(self: &Arc<Self>) {
        let removed = {
            let mut state = self.state.lock().unwrap();
            state
                .neighbors
                .prune_dead(self.config.router_dead_interval())
        };
        for name in &removed {
            info!("[DV {}] neighbor {name} is dead", self.router);
        }
        if !removed.is_empty() {
            self.recompute();
        }
        self.send_sync();
    }

    /// Beacons this router's current sequences into both sync groups.
    fn send_sync(&self) {
        let (advert_seq, prefix_seq) = {
            let state = self.state.lock().unwrap();
            (state.advert_seq, state.prefix_seq)
        };
        let beacons = [
            (
                self.config.advert_sync_prefix(&self.network),
                StateVector::single(self.router.clone(), self.boot_time, advert_seq),
            ),
            (
                self.config.prefix_sync_prefix(&self.network),
                StateVector::single(self.router.clone(), self.boot_time, prefix_seq),
            ),
        ];
        for (prefix, vector) in beacons {
            let interest = Interest::new(prefix)
                .with_app_param(vector.encode_bytes())
                .with_lifetime(SYNC_LIFETIME);
            let engine = self.engine.clone();
            tokio::spawn(async move {
                // Sync beacons expect no reply; the timeout is the
                // normal end of life.
                let _ = engine.express_async(&interest, ExpressOptions::default()).await;
            });
        }
    }

    /* ------------------------------------------------------------ *
     * RIB and FIB
     * ------------------------------------------------------------ */

    /// Recomputes the RIB, republishes the advertisement if it changed,
    /// and queues the FIB diff toward the forwarder.
    fn recompute(&self) {
        let mut publish: Option<(Advertisement, u64)> = None;
        let cmds = {
            let mut state = self.state.lock().unwrap();
            let rib = Rib::compute(
                &self.router,
                state.neighbors.iter(),
                self.config.cost_infinity,
            );
            state.rib = rib;
            let advert = state.rib.to_advertisement();

            let mut routes: Vec<(Name, u64, u64)> = Vec::new();
            for entry in state.rib.iter() {
                if entry.destination == self.router {
                    continue;
                }
                for hop in [Some(&entry.lowest), entry.second.as_ref()]
                    .into_iter()
                    .flatten()
                {
                    let Some(face_id) =
                        state.neighbors.get(&hop.via).and_then(|n| n.face_id)
                    else {
                        continue;
                    };
                    routes.push((entry.destination.clone(), face_id, hop.cost));
                    for prefix in state.prefix_table.prefixes_of(&entry.destination) {
                        let cost = hop
                            .cost
                            .saturating_add(prefix.cost)
                            .min(self.config.cost_infinity);
                        routes.push((prefix.name.clone(), face_id, cost));
                    }
                }
            }
            let cmds = state.fib.update(&routes);
            if state.last_advert.as_ref() != Some(&advert) {
                state.advert_seq += 1;
                state.last_advert = Some(advert.clone());
                publish = Some((advert, state.advert_seq));
            }
            cmds
        };
        if let Some((advert, seq)) = publish {
            if let Err(e) = self.publish_advert(&advert, seq) {
                warn!("[DV {}] advert publish failed: {e}", self.router);
            }
            self.send_sync();
        }
        for cmd in cmds {
            if self.cmd_tx.send(cmd).is_err() {
                warn!("[DV {}] command task is gone", self.router);
                break;
            }
        }
    }

    fn publish_advert(&self, advert: &Advertisement, seq: u64) -> Result<()> {
        let name = self
            .config
            .advert_data_prefix(&self.router)
            .append(Component::timestamp(self.boot_time))
            .append(Component::version(seq));
        let data = Data::new(name.clone())
            .with_content(advert.encode_bytes())
            .with_freshness(ADVERT_FRESHNESS);
        let encoded = data.sign_encode(self.engine.signer().as_ref())?;
        self.store.put(&name, &encoded.wire)
    }
}

// Serializes rib/register and rib/unregister commands toward the
// forwarder, with a small retry bound per command.
async fn run_cmd_task(engine: Arc<Engine>, mut rx: mpsc::UnboundedReceiver<FibCmd>) {
    while let Some(cmd) = rx.recv().await {
        let (verb, params) = match &cmd {
            FibCmd::Register {
                name,
                face_id,
                cost,
            } => (
                "register",
                ControlParameters::route(name.clone(), Some(*face_id), ORIGIN_NLSR, Some(*cost)),
            ),
            FibCmd::Unregister { name, face_id } => (
                "unregister",
                ControlParameters::route(name.clone(), Some(*face_id), ORIGIN_NLSR, None),
            ),
        };
        let mut done = false;
        for attempt in 0..CMD_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(CMD_RETRY_DELAY).await;
            }
            match engine.exec_mgmt_cmd("rib", verb, params.clone()).await {
                Ok(_) => {
                    done = true;
                    break;
                }
                Err(e) => debug!("[DV] rib/{verb} attempt {attempt} failed: {e}"),
            }
        }
        if !done {
            warn!("[DV] rib/{verb} gave up after {CMD_ATTEMPTS} attempts");
        }
    }
}
