//! Tombstone manager with periodic, back-pressured garbage collection.
//!
//! # Cleanup round
//!
//! Every round walks a snapshot of the store and decides per tombstone,
//! with ownership looked up fresh each time:
//!
//! ```text
//! not a write owner   -> drop locally, no RPC
//! key still in flight -> keep, look again next round
//! backup owner        -> batch a primary check to the segment's primary
//! primary owner       -> ask every online async backup site;
//!                        nobody needs it -> cleanup on all write owners
//! ```
//!
//! A failed remote call always keeps the tombstone.
//!
//! At most one primary-check request is outstanding per primary: every
//! flush takes that primary's lane first.

use super::scheduler::CleanupScheduler;
use super::store::TombstoneStore;
use super::{IracTombstoneInfo, IracTombstoneManager};
use crate::command::IracCommand;
use crate::config::IracConfig;
use crate::error::{IracError, IracResult, TopologyError};
use crate::telemetry::spans;
use crate::topology::{ClusterView, NodeAddress, SegmentDistribution};
use crate::transport::{self, IracTransport};
use crate::xsite::{UpdateTracker, XSiteView};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, join_all};
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use irac_clock::SiteName;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, trace, warn};

/// Scheduling state, guarded by one mutex so a finishing round cannot
/// reschedule itself after `stop`.
struct SchedulerControl {
    scheduler: CleanupScheduler,
    enabled: bool,
    stopped: bool,
    pending: Option<JoinHandle<()>>,
}

/// Clears the single-flight flag when a round ends, however it ends.
struct RoundGuard<'a>(&'a AtomicBool);

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    cache_name: String,
    store: TombstoneStore,
    cluster: Arc<dyn ClusterView>,
    sites: Arc<dyn XSiteView>,
    tracker: Arc<dyn UpdateTracker>,
    transport: Arc<dyn IracTransport>,
    batch_size: usize,
    control: Mutex<SchedulerControl>,
    round_in_progress: AtomicBool,
    rounds: AtomicU64,
    /// Per-primary lanes serializing primary-check flushes.
    lanes: DashMap<NodeAddress, Arc<tokio::sync::Mutex<()>>>,
}

/// The tombstone manager used by caches with async backup sites.
#[derive(Clone)]
pub struct DefaultIracTombstoneManager {
    inner: Arc<Inner>,
}

impl DefaultIracTombstoneManager {
    pub fn new(
        config: &IracConfig,
        cluster: Arc<dyn ClusterView>,
        sites: Arc<dyn XSiteView>,
        tracker: Arc<dyn UpdateTracker>,
        transport: Arc<dyn IracTransport>,
    ) -> Self {
        let scheduler = CleanupScheduler::new(
            config.tombstones.target_size,
            config.tombstones.max_cleanup_delay_ms,
        );
        Self {
            inner: Arc::new(Inner {
                cache_name: config.site.cache.clone(),
                store: TombstoneStore::new(),
                cluster,
                sites,
                tracker,
                transport,
                batch_size: config.batch_size(),
                control: Mutex::new(SchedulerControl {
                    scheduler,
                    enabled: false,
                    stopped: false,
                    pending: None,
                }),
                round_in_progress: AtomicBool::new(false),
                rounds: AtomicU64::new(0),
                lanes: DashMap::new(),
            }),
        }
    }

    /// Requests per state-transfer or primary-check batch.
    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }
}

impl Inner {
    /// Arm the timer for the next round. Caller holds the control lock.
    fn schedule_locked(self: &Arc<Self>, control: &mut SchedulerControl, delay: Duration) {
        if !control.enabled {
            return;
        }
        let inner = Arc::clone(self);
        control.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Cancelling the timer must never abort a round in flight.
            tokio::spawn(inner.scheduled_round());
        }));
    }

    fn schedule_next(self: &Arc<Self>, delay: Duration) {
        let mut control = self.control.lock();
        self.schedule_locked(&mut control, delay);
    }

    async fn scheduled_round(self: Arc<Self>) {
        match self.cleanup_round().await {
            Ok(Some(delay)) => self.schedule_next(delay),
            Ok(None) => {
                let delay = self.control.lock().scheduler.current_delay();
                self.schedule_next(delay);
            }
            Err(IracError::Stopped) => {}
            Err(e) => {
                let delay = self.control.lock().scheduler.current_delay();
                warn!(
                    cache = %self.cache_name,
                    error = %e,
                    code = e.error_code(),
                    delay_ms = delay.as_millis() as u64,
                    "Tombstone cleanup round failed to start"
                );
                self.schedule_next(delay);
            }
        }
    }

    /// Run one round. `Ok(None)` when another round was already running.
    async fn cleanup_round(self: &Arc<Self>) -> IracResult<Option<Duration>> {
        if self
            .round_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(cache = %self.cache_name, "Cleanup round already running");
            return Ok(None);
        }
        let _guard = RoundGuard(&self.round_in_progress);

        {
            let mut control = self.control.lock();
            if control.stopped {
                return Err(IracError::Stopped);
            }
            control.scheduler.on_task_started(self.store.len());
        }

        let round = self.rounds.fetch_add(1, Ordering::Relaxed) + 1;
        let span = spans::cleanup_round(&self.cache_name, round);
        self.execute_round().instrument(span).await.map(Some)
    }

    async fn execute_round(self: &Arc<Self>) -> IracResult<Duration> {
        let stages = self.prepare_round()?;
        let stage_count = stages.len();
        join_all(stages).await;

        let remaining = self.store.len();
        let delay = self.control.lock().scheduler.on_task_completed(remaining);
        debug!(
            stages = stage_count,
            remaining,
            delay_ms = delay.as_millis() as u64,
            "Cleanup round finished"
        );
        Ok(delay)
    }

    /// Ownership of the tombstone's segment.
    ///
    /// A missing topology fails the whole round. Any other lookup failure
    /// only concerns this tombstone: it is kept and `None` is returned.
    fn distribution_of(
        &self,
        tombstone: &IracTombstoneInfo,
    ) -> Result<Option<SegmentDistribution>, TopologyError> {
        match self.cluster.segment_distribution(tombstone.segment) {
            Ok(distribution) => Ok(Some(distribution)),
            Err(TopologyError::NotInstalled) => Err(TopologyError::NotInstalled),
            Err(e) => {
                warn!(
                    cache = %self.cache_name,
                    segment = tombstone.segment,
                    error = %e,
                    "Cannot resolve tombstone owners, keeping it"
                );
                Ok(None)
            }
        }
    }

    /// Decide what to do with every tombstone and build the round's stages.
    ///
    /// Fails only when no topology is installed; nothing remote has been
    /// sent at that point.
    fn prepare_round(self: &Arc<Self>) -> IracResult<Vec<BoxFuture<'static, ()>>> {
        let mut stages: Vec<BoxFuture<'static, ()>> = Vec::new();
        let mut batches: HashMap<NodeAddress, Vec<IracTombstoneInfo>> = HashMap::new();
        let mut dropped = 0usize;
        let mut in_flight = 0usize;
        let mut unresolved = 0usize;

        for tombstone in self.store.snapshot() {
            let Some(distribution) = self.distribution_of(&tombstone)? else {
                unresolved += 1;
                continue;
            };

            if !distribution.is_write_owner() {
                if self.store.remove_if_matches(&tombstone) {
                    dropped += 1;
                }
                continue;
            }

            if self.tracker.contains_key(&tombstone.key) {
                in_flight += 1;
                continue;
            }

            if distribution.is_primary() {
                stages.push(
                    Arc::clone(self)
                        .check_remote_sites(tombstone, distribution)
                        .boxed(),
                );
                continue;
            }

            let batch = batches.entry(distribution.primary.clone()).or_default();
            batch.push(tombstone);
            if batch.len() >= self.batch_size {
                let full = std::mem::take(batch);
                stages.push(
                    Arc::clone(self)
                        .flush_primary_check(distribution.primary, full)
                        .boxed(),
                );
            }
        }

        // Partial batches go out without holding up the round.
        for (primary, batch) in batches {
            if !batch.is_empty() {
                tokio::spawn(Arc::clone(self).flush_primary_check(primary, batch));
            }
        }

        debug!(dropped, in_flight, unresolved, "Cleanup round prepared");
        Ok(stages)
    }

    async fn check_remote_sites(
        self: Arc<Self>,
        tombstone: IracTombstoneInfo,
        distribution: SegmentDistribution,
    ) {
        let sites = self.sites.online_async_backups();
        if self.needed_by_any_site(&sites, &tombstone.key).await {
            return;
        }

        let owners = distribution.remote_write_owners();
        let command = IracCommand::TombstoneCleanup(tombstone.clone());
        match transport::send_to_many(self.transport.as_ref(), &owners, &command).await {
            Ok(()) => {
                if self.store.remove_if_matches(&tombstone) {
                    trace!(segment = tombstone.segment, "Tombstone collected");
                }
            }
            Err(e) => {
                debug!(
                    segment = tombstone.segment,
                    error = %e,
                    "Tombstone cleanup failed, keeping it for the next round"
                );
            }
        }
    }

    /// Whether any site still needs the key's tombstone. Failures count as yes.
    async fn needed_by_any_site(&self, sites: &[SiteName], key: &Bytes) -> bool {
        let mut checks: FuturesUnordered<_> = sites
            .iter()
            .map(|site| async move {
                let command = IracCommand::TombstoneRemoteSiteCheck { key: key.clone() };
                let result =
                    transport::remote_site_check(self.transport.as_ref(), site, command).await;
                (site, result)
            })
            .collect();

        while let Some((site, result)) = checks.next().await {
            match result {
                Ok(false) => {}
                Ok(true) => {
                    trace!(site = %site, "Tombstone still needed by site");
                    return true;
                }
                Err(e) => {
                    debug!(site = %site, error = %e, "Remote site check failed, keeping tombstone");
                    return true;
                }
            }
        }
        false
    }

    async fn flush_primary_check(
        self: Arc<Self>,
        primary: NodeAddress,
        batch: Vec<IracTombstoneInfo>,
    ) {
        let lane = Arc::clone(&self.lanes.entry(primary.clone()).or_default());
        let _lane = lane.lock().await;

        let count = batch.len();
        let command = IracCommand::TombstonePrimaryCheck(batch);
        match self.transport.send_to_node(&primary, command).await {
            Ok(_) => trace!(primary = %primary, count, "Primary check sent"),
            Err(e) => debug!(primary = %primary, count, error = %e, "Primary check failed"),
        }
    }
}

#[async_trait]
impl IracTombstoneManager for DefaultIracTombstoneManager {
    fn store_tombstone(&self, tombstone: IracTombstoneInfo) {
        self.inner.store.insert(tombstone);
    }

    fn store_tombstone_if_absent(&self, tombstone: IracTombstoneInfo) -> bool {
        self.inner.store.insert_if_absent(tombstone)
    }

    fn get_tombstone(&self, key: &[u8]) -> Option<IracTombstoneInfo> {
        self.inner.store.get(key)
    }

    fn contains(&self, key: &[u8]) -> bool {
        self.inner.store.contains(key)
    }

    fn remove_tombstone(&self, key: &[u8]) -> Option<IracTombstoneInfo> {
        self.inner.store.remove(key)
    }

    fn remove_tombstone_if_matches(&self, tombstone: &IracTombstoneInfo) -> bool {
        self.inner.store.remove_if_matches(tombstone)
    }

    fn size(&self) -> usize {
        self.inner.store.len()
    }

    async fn send_state_to(
        &self,
        requestor: &NodeAddress,
        segments: &HashSet<u32>,
    ) -> IracResult<()> {
        let tombstones = self.inner.store.in_segments(segments);
        if tombstones.is_empty() {
            return Ok(());
        }

        let span = spans::state_transfer(&self.inner.cache_name, requestor.as_str());
        let total_tombstones = tombstones.len();
        let batches: Vec<Vec<IracTombstoneInfo>> = tombstones
            .chunks(self.inner.batch_size)
            .map(<[IracTombstoneInfo]>::to_vec)
            .collect();
        let total = batches.len();

        let rpc = self.inner.transport.as_ref();
        let results = join_all(batches.into_iter().map(|batch| {
            rpc.send_to_node(requestor, IracCommand::TombstoneStateResponse(batch))
        }))
        .instrument(span)
        .await;

        let mut failed = 0usize;
        for error in results.into_iter().filter_map(Result::err) {
            failed += 1;
            warn!(requestor = %requestor, error = %error, "Tombstone state batch failed");
        }
        if failed > 0 {
            return Err(IracError::StateTransfer { failed, total });
        }
        debug!(
            requestor = %requestor,
            tombstones = total_tombstones,
            batches = total,
            "Tombstone state sent"
        );
        Ok(())
    }

    async fn check_stale_tombstone(&self, tombstones: &[IracTombstoneInfo]) -> IracResult<()> {
        let mut stale = Vec::new();
        for tombstone in tombstones {
            let Some(distribution) = self.inner.distribution_of(tombstone)? else {
                continue;
            };
            if !distribution.is_primary() {
                continue;
            }
            if self.inner.store.get(&tombstone.key).as_ref() == Some(tombstone) {
                continue;
            }
            stale.push((tombstone.clone(), distribution.remote_write_owners()));
        }

        if stale.is_empty() {
            return Ok(());
        }
        debug!(stale = stale.len(), "Cleaning stale tombstones");

        let rpc = self.inner.transport.as_ref();
        let results = join_all(stale.into_iter().map(|(tombstone, owners)| async move {
            let command = IracCommand::TombstoneCleanup(tombstone);
            transport::send_to_many(rpc, &owners, &command).await
        }))
        .await;

        match results.into_iter().find_map(Result::err) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn run_cleanup_round(&self) -> IracResult<bool> {
        self.inner.cleanup_round().await.map(|delay| delay.is_some())
    }

    fn start(&self) {
        let mut control = self.inner.control.lock();
        if control.stopped {
            warn!(cache = %self.inner.cache_name, "Tombstone manager already stopped, not starting");
            return;
        }
        if control.enabled {
            return;
        }
        control.enabled = true;
        let delay = control.scheduler.current_delay();
        self.inner.schedule_locked(&mut control, delay);
        info!(
            cache = %self.inner.cache_name,
            delay_ms = delay.as_millis() as u64,
            batch_size = self.inner.batch_size,
            "Tombstone cleanup started"
        );
    }

    fn stop(&self) {
        {
            let mut control = self.inner.control.lock();
            control.enabled = false;
            control.stopped = true;
            if let Some(pending) = control.pending.take() {
                pending.abort();
            }
        }
        let dropped = self.inner.store.len();
        self.inner.store.clear();
        info!(cache = %self.inner.cache_name, dropped, "Tombstone manager stopped");
    }

    fn is_task_running(&self) -> bool {
        self.inner.control.lock().enabled
    }

    fn current_delay(&self) -> Duration {
        self.inner.control.lock().scheduler.current_delay()
    }
}
