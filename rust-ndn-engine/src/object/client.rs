//! The object client: produce, serve, consume and announce.

use super::rdr::{make_metadata, metadata_name, parse_metadata};
use super::segmenter::Segmenter;
use crate::engine::{Engine, ExpressOptions, ExpressResult, InterestArgs};
use crate::store::Store;
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use rust_ndn_common::mgmt::{ControlParameters, ORIGIN_CLIENT};
use rust_ndn_common::name::{
    Component, Name, TYPE_IMPLICIT_SHA256_DIGEST, TYPE_VERSION, VERSION_UNIX_MICRO,
};
use rust_ndn_common::packet::Interest;
use rust_ndn_common::security::Signer;
use rust_ndn_common::{Error, Result};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Per-segment retry bound for the serial fetch pipeline.
const SEGMENT_RETRIES: usize = 15;
/// Lifetime of metadata discovery Interests.
const DISCOVERY_LIFETIME: Duration = Duration::from_secs(1);

/// Produces and consumes segmented versioned objects, and keeps the
/// client's prefix registrations alive across face restarts.
pub struct ObjectClient {
    engine: Arc<Engine>,
    store: Arc<dyn Store>,
    signer: Arc<dyn Signer>,
    segmenter: Segmenter,
    announcements: Mutex<Vec<Name>>,
}

impl ObjectClient {
    pub fn new(engine: Arc<Engine>, store: Arc<dyn Store>, signer: Arc<dyn Signer>) -> Arc<Self> {
        let client = Arc::new(Self {
            engine: engine.clone(),
            store,
            signer,
            segmenter: Segmenter::new(),
            announcements: Mutex::new(Vec::new()),
        });
        let weak: Weak<ObjectClient> = Arc::downgrade(&client);
        engine.on_face_up(Arc::new(move || {
            if let Some(client) = weak.upgrade() {
                client.reannounce();
            }
        }));
        client
    }

    /* ------------------------------------------------------------ *
     * Producer side
     * ------------------------------------------------------------ */

    /// Publishes `content` as a new version under `prefix`: segments, a
    /// manifest and a fresh metadata packet, all placed in the store.
    /// Returns the versioned name.
    pub fn produce(&self, prefix: &Name, content: Bytes) -> Result<Name> {
        let versioned = prefix.with_version(VERSION_UNIX_MICRO);
        let segments = self
            .segmenter
            .segment(&versioned, &content, self.signer.as_ref())?;
        let manifest = self
            .segmenter
            .manifest(&versioned, &segments, self.signer.as_ref())?;
        let metadata = make_metadata(prefix, &versioned, self.signer.as_ref())?;

        self.store.begin()?;
        let result = (|| {
            for (name, enc) in &segments {
                self.store.put(name, &enc.wire)?;
            }
            self.store.put(&manifest.0, &manifest.1.wire)?;
            self.store.put(&metadata.0, &metadata.1.wire)?;
            Ok(())
        })();
        match result {
            Ok(()) => self.store.commit()?,
            Err(e) => {
                self.store.rollback()?;
                return Err(e);
            }
        }
        debug!("[Object] produced {} ({} segments)", versioned, segments.len());
        Ok(versioned)
    }

    /// Attaches a handler answering Interests under `prefix` from the
    /// store. A trailing implicit-digest component names the packet by
    /// content; the store is keyed without it.
    pub fn serve(&self, prefix: &Name) -> Result<()> {
        let store = self.store.clone();
        self.engine.attach_handler(
            prefix,
            Arc::new(move |args: InterestArgs| {
                let mut name = args.interest.name.clone();
                if name.at(-1).typ == TYPE_IMPLICIT_SHA256_DIGEST {
                    name = name.prefix(name.len() - 1);
                }
                match store.get(&name, args.interest.can_be_prefix) {
                    Ok(Some(wire)) => {
                        if let Err(e) = (args.reply)(wire) {
                            warn!("[Object] reply failed: {e}");
                        }
                    }
                    Ok(None) => debug!("[Object] no packet for {name}"),
                    Err(e) => warn!("[Object] store error for {name}: {e}"),
                }
            }),
        )
    }

    /* ------------------------------------------------------------ *
     * Consumer side
     * ------------------------------------------------------------ */

    /// Fetches an object. An unversioned name goes through metadata
    /// discovery first.
    pub async fn consume(&self, name: &Name) -> Result<Bytes> {
        let versioned = if name.at(-1).typ == TYPE_VERSION {
            name.clone()
        } else {
            self.discover_version(name).await?
        };
        self.fetch_segments(&versioned).await
    }

    async fn discover_version(&self, prefix: &Name) -> Result<Name> {
        let interest = Interest::new(metadata_name(prefix))
            .with_can_be_prefix(true)
            .with_must_be_fresh(true)
            .with_lifetime(DISCOVERY_LIFETIME);
        match self
            .engine
            .express_async(&interest, ExpressOptions::default())
            .await
        {
            ExpressResult::Data { data, .. } => parse_metadata(&data),
            ExpressResult::Nack { reason } => Err(Error::Protocol(format!(
                "metadata discovery nacked, reason {reason}"
            ))),
            ExpressResult::Timeout => Err(Error::DeadlineExceeded),
            ExpressResult::Cancelled => Err(Error::Cancelled),
            ExpressResult::Error(e) => Err(e),
        }
    }

    /// Serial segment fetch with bounded retry. The manifest is fetched
    /// first; when present, its digests name each segment and bound the
    /// pipeline. A plain segmented object without a manifest falls back
    /// to FinalBlockID termination.
    async fn fetch_segments(&self, versioned: &Name) -> Result<Bytes> {
        match self.fetch_manifest(versioned).await {
            Some(digests) => self.fetch_by_manifest(versioned, &digests).await,
            None => self.fetch_by_final_block(versioned).await,
        }
    }

    // One-shot manifest lookup; absence selects the fallback path.
    async fn fetch_manifest(&self, versioned: &Name) -> Option<Vec<[u8; 32]>> {
        let name = versioned.clone().append(super::manifest_keyword());
        let interest = Interest::new(name).with_lifetime(DISCOVERY_LIFETIME);
        match self
            .engine
            .express_async(&interest, ExpressOptions::default())
            .await
        {
            ExpressResult::Data { data, .. } => {
                let content = data.content?;
                if content.is_empty() || content.len() % 32 != 0 {
                    debug!("[Object] malformed manifest for {versioned}");
                    return None;
                }
                Some(
                    content
                        .chunks(32)
                        .map(|c| <[u8; 32]>::try_from(c).expect("32-byte chunks"))
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// Manifest-driven retrieval: each segment Interest carries the
    /// recorded digest as a trailing implicit-digest component, so only
    /// the packet with exactly that content can satisfy it. The
    /// pipeline ends when the manifest is exhausted.
    async fn fetch_by_manifest(&self, versioned: &Name, digests: &[[u8; 32]]) -> Result<Bytes> {
        let mut content = BytesMut::new();
        for (segment, digest) in digests.iter().enumerate() {
            let name = versioned
                .clone()
                .append(Component::segment(segment as u64))
                .append(Component::implicit_digest(digest.to_vec()));
            let data = self.fetch_one(&name).await?;
            if let Some(chunk) = &data.content {
                content.extend_from_slice(chunk);
            }
        }
        Ok(content.freeze())
    }

    // FinalBlockID-terminated retrieval for plain segmented objects.
    async fn fetch_by_final_block(&self, versioned: &Name) -> Result<Bytes> {
        let mut content = BytesMut::new();
        let mut segment = 0u64;
        loop {
            let name = versioned.clone().append(Component::segment(segment));
            let data = self.fetch_one(&name).await?;
            if let Some(chunk) = &data.content {
                content.extend_from_slice(chunk);
            }
            let here = name.at(-1);
            match &data.meta.final_block_id {
                Some(final_block) if *final_block == here => break,
                None => break,
                _ => segment += 1,
            }
        }
        Ok(content.freeze())
    }

    async fn fetch_one(&self, name: &Name) -> Result<rust_ndn_common::packet::Data> {
        let mut last_err = Error::DeadlineExceeded;
        for attempt in 0..SEGMENT_RETRIES {
            let interest = Interest::new(name.clone());
            match self
                .engine
                .express_async(&interest, ExpressOptions::default())
                .await
            {
                ExpressResult::Data { data, .. } => return Ok(data),
                ExpressResult::Timeout => {
                    debug!("[Object] segment {name} timed out (attempt {attempt})");
                    last_err = Error::DeadlineExceeded;
                }
                ExpressResult::Nack { reason } => {
                    last_err = Error::Protocol(format!("segment nacked, reason {reason}"));
                }
                ExpressResult::Cancelled => return Err(Error::Cancelled),
                ExpressResult::Error(e) => return Err(e),
            }
        }
        Err(last_err)
    }

    /* ------------------------------------------------------------ *
     * Announcements
     * ------------------------------------------------------------ */

    /// Registers `name` with the forwarder (origin Client) and remembers
    /// it so it survives face restarts.
    pub async fn announce_prefix(&self, name: &Name) -> Result<()> {
        {
            let mut announcements = self.announcements.lock().unwrap();
            if !announcements.contains(name) {
                announcements.push(name.clone());
            }
        }
        if self.engine.face().is_running() {
            self.register(name).await?;
        }
        Ok(())
    }

    /// Withdraws a previously announced prefix.
    pub async fn withdraw_prefix(&self, name: &Name) -> Result<()> {
        self.announcements.lock().unwrap().retain(|n| n != name);
        self.engine
            .exec_mgmt_cmd(
                "rib",
                "unregister",
                ControlParameters::route(name.clone(), None, ORIGIN_CLIENT, None),
            )
            .await?;
        Ok(())
    }

    async fn register(&self, name: &Name) -> Result<()> {
        self.engine
            .exec_mgmt_cmd(
                "rib",
                "register",
                ControlParameters::route(name.clone(), None, ORIGIN_CLIENT, Some(0)),
            )
            .await?;
        Ok(())
    }

    // Face came back up: re-issue every stored announcement.
    fn reannounce(self: Arc<Self>) {
        let names = self.announcements.lock().unwrap().clone();
        for name in names {
            let client = self.clone();
            tokio::spawn(async move {
                if let Err(e) = client.register(&name).await {
                    warn!("[Object] re-announce of {name} failed: {e}");
                }
            });
        }
    }
}
