//! Integration test common infrastructure.
//!
//! In-process fakes for every collaborator the IRAC core talks to: a
//! scripted cluster view and a transport that records what was sent and
//! answers as told.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use irac::command::{CommandResponse, IracCommand};
use irac::config::IracConfig;
use irac::error::{RpcError, TopologyError};
use irac::tombstone::IracTombstoneInfo;
use irac::topology::{ClusterView, NodeAddress, SegmentDistribution};
use irac::transport::IracTransport;
use irac_clock::{IracMetadata, SiteName, SiteVersion, VersionVector};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub fn node(name: &str) -> NodeAddress {
    NodeAddress::new(name)
}

pub fn site(name: &str) -> SiteName {
    SiteName::new(name)
}

/// Config for cache "users" on site NYC with async backups LON and SFO.
pub fn config(chunk_size: usize) -> IracConfig {
    toml::from_str(&format!(
        r#"
        [site]
        name = "NYC"
        cache = "users"

        [tombstones]
        target_size = 100
        max_cleanup_delay_ms = 1000

        [[backups]]
        site = "LON"
        state_transfer_chunk_size = {chunk_size}

        [[backups]]
        site = "SFO"
        state_transfer_chunk_size = {chunk_size}
        "#
    ))
    .expect("test config parses")
}

/// A tombstone for `key` whose metadata was written by NYC at `counter`.
pub fn tombstone(key: &str, segment: u32, counter: u64) -> IracTombstoneInfo {
    let version = VersionVector::single(site("NYC"), SiteVersion::new(1, counter));
    IracTombstoneInfo::new(
        Bytes::copy_from_slice(key.as_bytes()),
        segment,
        IracMetadata::new(site("NYC"), version),
    )
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Cluster view with explicitly assigned segment owners.
pub struct FakeCluster {
    local: NodeAddress,
    members: Vec<NodeAddress>,
    owners: Mutex<HashMap<u32, (NodeAddress, Vec<NodeAddress>)>>,
    keys: Mutex<HashMap<Vec<u8>, u32>>,
    installed: AtomicBool,
    lookups: AtomicUsize,
}

impl FakeCluster {
    pub fn new(local: &str, members: &[&str]) -> Self {
        Self {
            local: node(local),
            members: members.iter().map(|m| node(m)).collect(),
            owners: Mutex::new(HashMap::new()),
            keys: Mutex::new(HashMap::new()),
            installed: AtomicBool::new(true),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Drop or restore the whole topology.
    pub fn set_installed(&self, installed: bool) {
        self.installed.store(installed, Ordering::SeqCst);
    }

    /// Segment ownership lookups answered so far, failed ones included.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Make `primary` the primary of `segment`, replicated on `owners`.
    pub fn own(&self, segment: u32, primary: &str, owners: &[&str]) {
        self.owners.lock().insert(
            segment,
            (node(primary), owners.iter().map(|o| node(o)).collect()),
        );
    }

    pub fn assign_key(&self, key: &str, segment: u32) {
        self.keys.lock().insert(key.as_bytes().to_vec(), segment);
    }
}

impl ClusterView for FakeCluster {
    fn local_address(&self) -> NodeAddress {
        self.local.clone()
    }

    fn segment_distribution(&self, segment: u32) -> Result<SegmentDistribution, TopologyError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.installed.load(Ordering::SeqCst) {
            return Err(TopologyError::NotInstalled);
        }
        let owners = self.owners.lock();
        let (primary, write_owners) = owners
            .get(&segment)
            .ok_or(TopologyError::UnknownSegment(segment))?;
        Ok(SegmentDistribution {
            segment,
            primary: primary.clone(),
            write_owners: write_owners.clone(),
            local: self.local.clone(),
        })
    }

    fn key_segment(&self, key: &[u8]) -> u32 {
        self.keys.lock().get(key).copied().unwrap_or(0)
    }

    fn members(&self) -> Vec<NodeAddress> {
        self.members.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Node(NodeAddress, IracCommand),
    Site(SiteName, IracCommand),
}

impl Sent {
    pub fn command(&self) -> &IracCommand {
        match self {
            Self::Node(_, command) | Self::Site(_, command) => command,
        }
    }
}

/// Records every command and answers from a script.
///
/// Sites answer "not needed" unless told otherwise. Every call is recorded
/// before it fails, so attempts can be counted.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    site_answers: Mutex<HashMap<SiteName, bool>>,
    unreachable_sites: Mutex<HashSet<SiteName>>,
    unreachable_nodes: Mutex<HashSet<NodeAddress>>,
    poisoned_keys: Mutex<HashSet<Bytes>>,
    node_delay: Mutex<Option<Duration>>,
    outstanding: Mutex<HashMap<NodeAddress, usize>>,
    peak: Mutex<HashMap<NodeAddress, usize>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, site_name: &str, still_needed: bool) {
        self.site_answers.lock().insert(site(site_name), still_needed);
    }

    pub fn fail_site(&self, site_name: &str) {
        self.unreachable_sites.lock().insert(site(site_name));
    }

    pub fn fail_node(&self, name: &str) {
        self.unreachable_nodes.lock().insert(node(name));
    }

    /// Fail every node call whose command carries `key`.
    pub fn poison(&self, key: &str) {
        self.poisoned_keys
            .lock()
            .insert(Bytes::copy_from_slice(key.as_bytes()));
    }

    pub fn delay_nodes(&self, delay: Duration) {
        *self.node_delay.lock() = Some(delay);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Sent) -> bool) -> usize {
        self.sent.lock().iter().filter(|s| predicate(s)).count()
    }

    pub fn to_node(&self, name: &str) -> Vec<IracCommand> {
        let target = node(name);
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Node(to, command) if *to == target => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    /// Most calls ever outstanding at once towards `name`.
    pub fn peak_outstanding(&self, name: &str) -> usize {
        self.peak.lock().get(&node(name)).copied().unwrap_or(0)
    }

    fn carries_poisoned_key(&self, command: &IracCommand) -> bool {
        let poisoned = self.poisoned_keys.lock();
        if poisoned.is_empty() {
            return false;
        }
        match command {
            IracCommand::TombstoneCleanup(t) => poisoned.contains(&t.key),
            IracCommand::TombstonePrimaryCheck(batch)
            | IracCommand::TombstoneStateResponse(batch) => {
                batch.iter().any(|t| poisoned.contains(&t.key))
            }
            IracCommand::TombstoneRemoteSiteCheck { key } => poisoned.contains(key),
            IracCommand::UpdateVersion(_) => false,
        }
    }
}

#[async_trait]
impl IracTransport for RecordingTransport {
    async fn send_to_node(
        &self,
        target: &NodeAddress,
        command: IracCommand,
    ) -> Result<CommandResponse, RpcError> {
        self.sent.lock().push(Sent::Node(target.clone(), command.clone()));
        if self.unreachable_nodes.lock().contains(target) {
            return Err(RpcError::NodeUnreachable(target.clone()));
        }
        if self.carries_poisoned_key(&command) {
            return Err(RpcError::Remote(format!("{} rejected", command.name())));
        }

        {
            let mut outstanding = self.outstanding.lock();
            let now = outstanding.entry(target.clone()).or_default();
            *now += 1;
            let mut peak = self.peak.lock();
            let max = peak.entry(target.clone()).or_default();
            *max = (*max).max(*now);
        }
        let delay = *self.node_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(now) = self.outstanding.lock().get_mut(target) {
            *now -= 1;
        }
        Ok(CommandResponse::Ack)
    }

    async fn send_to_site(
        &self,
        target: &SiteName,
        command: IracCommand,
    ) -> Result<CommandResponse, RpcError> {
        self.sent.lock().push(Sent::Site(target.clone(), command));
        if self.unreachable_sites.lock().contains(target) {
            return Err(RpcError::SiteUnreachable(target.clone()));
        }
        let needed = self.site_answers.lock().get(target).copied().unwrap_or(false);
        Ok(CommandResponse::StillNeeded(needed))
    }
}
