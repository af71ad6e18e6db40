//! Version generator backed by a concurrent per-segment map.
//!
//! # Persisted format
//!
//! ```text
//! @version   -> software version that wrote the scope
//! {seg}_{site} -> {topology_id}:{counter}
//! ```
//!
//! Loading merges each component into whatever is already in memory.

use super::IracVersionGenerator;
use crate::command::IracCommand;
use crate::config::IracConfig;
use crate::error::IracResult;
use crate::persistence::{PersistentState, ScopedStateStore};
use crate::telemetry::spans;
use crate::topology::{ClusterView, TopologyUpdate};
use crate::transport::IracTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::join_all;
use irac_clock::{IracMetadata, SiteName, SiteVersion, VersionVector};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{Instrument, debug, info, trace, warn};

pub struct DefaultIracVersionGenerator {
    cache_name: String,
    local_site: SiteName,
    segments: DashMap<u32, VersionVector>,
    /// Highest topology id observed. Only ever moves forward.
    topology_id: AtomicU32,
    cluster: Arc<dyn ClusterView>,
    transport: Arc<dyn IracTransport>,
    state_store: Arc<dyn ScopedStateStore>,
}

impl DefaultIracVersionGenerator {
    pub fn new(
        config: &IracConfig,
        cluster: Arc<dyn ClusterView>,
        transport: Arc<dyn IracTransport>,
        state_store: Arc<dyn ScopedStateStore>,
    ) -> Self {
        Self {
            cache_name: config.site.cache.clone(),
            local_site: config.local_site(),
            segments: DashMap::new(),
            topology_id: AtomicU32::new(0),
            cluster,
            transport,
            state_store,
        }
    }

    /// Name of the persisted scope for `cache_name`.
    pub fn scope_name(cache_name: &str) -> String {
        format!("irac-version-{cache_name}")
    }

    pub fn local_site(&self) -> &SiteName {
        &self.local_site
    }

    pub fn current_topology(&self) -> u32 {
        self.topology_id.load(Ordering::Acquire)
    }

    /// Every segment's vector, ordered by segment.
    pub fn snapshot(&self) -> Vec<(u32, VersionVector)> {
        let mut snapshot: Vec<(u32, VersionVector)> = self
            .segments
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        snapshot.sort_by_key(|(segment, _)| *segment);
        snapshot
    }

    /// Raise the topology watermark to `candidate` unless it is already higher.
    fn update_topology(&self, candidate: u32) {
        let mut current = self.topology_id.load(Ordering::Acquire);
        while candidate > current {
            match self.topology_id.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    trace!(cache = %self.cache_name, topology = candidate, "Topology watermark advanced");
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Atomically replace the segment's vector with `f(current)`.
    fn compute<F>(&self, segment: u32, f: F) -> VersionVector
    where
        F: FnOnce(Option<&VersionVector>) -> VersionVector,
    {
        match self.segments.entry(segment) {
            Entry::Occupied(mut entry) => {
                let next = f(Some(entry.get()));
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                let next = f(None);
                entry.insert(next.clone());
                next
            }
        }
    }

    fn metadata(&self, version: VersionVector) -> IracMetadata {
        IracMetadata::new(self.local_site.clone(), version)
    }

    async fn load_versions(&self) -> IracResult<()> {
        let scope = Self::scope_name(&self.cache_name);
        let Some(state) = self.state_store.read_scope(&scope).await? else {
            debug!(scope = %scope, "No persisted versions");
            return Ok(());
        };

        let running = env!("CARGO_PKG_VERSION");
        match state.version() {
            Some(written) if written != running => {
                info!(written, running, "Persisted versions come from a different release");
            }
            None => debug!("Persisted versions carry no release tag"),
            _ => {}
        }

        let (decoded, skipped) = decode_versions(&state);
        let mut loaded = 0usize;
        let mut local_topology = 0u32;
        for (segment, persisted) in decoded {
            loaded += persisted.len();
            local_topology = local_topology.max(persisted.topology(&self.local_site));
            self.compute(segment, |current| match current {
                Some(current) => current.merge(&persisted),
                None => persisted.clone(),
            });
        }
        self.update_topology(local_topology);

        info!(
            loaded,
            skipped,
            segments = self.segments.len(),
            topology = self.current_topology(),
            "Restored persisted versions"
        );
        Ok(())
    }

    async fn persist_versions(&self) -> IracResult<()> {
        let mut state = PersistentState::tagged();
        for (segment, vector) in self.snapshot() {
            for (site, version) in vector.iter() {
                state.set_property(format!("{segment}_{site}"), version.to_string());
            }
        }

        let scope = Self::scope_name(&self.cache_name);
        self.state_store.write_scope(&scope, &state).await?;
        info!(properties = state.len(), "Persisted versions");
        Ok(())
    }
}

/// Rebuild per-segment vectors from a persisted scope.
///
/// Returns the vectors and the number of malformed properties skipped.
/// Properties starting with `@` are metadata and are ignored.
pub fn decode_versions(state: &PersistentState) -> (BTreeMap<u32, VersionVector>, usize) {
    let mut segments: BTreeMap<u32, VersionVector> = BTreeMap::new();
    let mut skipped = 0usize;
    for (property, value) in state.iter() {
        if property.starts_with('@') {
            continue;
        }
        let Some((segment, site, version)) = parse_entry(property, value) else {
            warn!(property, value, "Skipping malformed persisted version");
            skipped += 1;
            continue;
        };
        let component = VersionVector::single(site, version);
        let merged = match segments.get(&segment) {
            Some(current) => current.merge(&component),
            None => component,
        };
        segments.insert(segment, merged);
    }
    (segments, skipped)
}

/// Parse one `"{segment}_{site}" -> "{topology}:{counter}"` property.
///
/// The segment is numeric, so the first `_` separates it from the site name,
/// which may itself contain underscores.
fn parse_entry(property: &str, value: &str) -> Option<(u32, SiteName, SiteVersion)> {
    let (segment, site) = property.split_once('_')?;
    if site.is_empty() {
        return None;
    }
    let segment = segment.parse::<u32>().ok()?;
    let (topology, counter) = value.split_once(':')?;
    let version = SiteVersion::new(topology.parse().ok()?, counter.parse().ok()?);
    Some((segment, SiteName::new(site), version))
}

#[async_trait]
impl IracVersionGenerator for DefaultIracVersionGenerator {
    async fn start(&self) -> IracResult<()> {
        let span = spans::version_state(&self.cache_name, self.local_site.as_str());
        self.load_versions().instrument(span).await
    }

    async fn stop(&self) -> IracResult<()> {
        let span = spans::version_state(&self.cache_name, self.local_site.as_str());
        self.persist_versions().instrument(span).await
    }

    fn generate_new_metadata(&self, segment: u32) -> IracMetadata {
        let version = self.compute(segment, |current| {
            current
                .cloned()
                .unwrap_or_default()
                .increment(&self.local_site, self.current_topology())
        });
        self.metadata(version)
    }

    fn generate_metadata_with_current_version(&self, segment: u32) -> IracMetadata {
        let version = match self.segments.entry(segment) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let initial = VersionVector::single(
                    self.local_site.clone(),
                    SiteVersion::new_version(self.current_topology()),
                );
                entry.insert(initial).value().clone()
            }
        };
        self.metadata(version)
    }

    fn generate_new_metadata_with_seen(
        &self,
        segment: u32,
        version_seen: Option<&VersionVector>,
    ) -> IracMetadata {
        let Some(seen) = version_seen else {
            return self.generate_new_metadata(segment);
        };
        self.update_topology(seen.topology(&self.local_site));
        let version = self.compute(segment, |current| {
            let merged = match current {
                Some(current) => current.merge(seen),
                None => seen.clone(),
            };
            merged.increment(&self.local_site, self.current_topology())
        });
        self.metadata(version)
    }

    fn update_version(&self, segment: u32, remote_version: &VersionVector) {
        self.update_topology(remote_version.topology(&self.local_site));
        self.compute(segment, |current| match current {
            Some(current) => current.merge(remote_version),
            None => remote_version.clone(),
        });
    }

    async fn on_topology_change(&self, update: &TopologyUpdate) {
        self.update_topology(update.topology_id);
        if !update.phase.is_rebalance() {
            return;
        }

        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return;
        }
        let segments = snapshot.len();
        let local = self.cluster.local_address();
        let targets: Vec<_> = update
            .members
            .iter()
            .filter(|member| **member != local)
            .cloned()
            .collect();

        let command = IracCommand::UpdateVersion(snapshot);
        let rpc = self.transport.as_ref();
        let results = join_all(
            targets
                .iter()
                .map(|target| rpc.send_to_node(target, command.clone())),
        )
        .await;

        for (target, result) in targets.iter().zip(results) {
            if let Err(e) = result {
                warn!(member = %target, error = %e, "Version broadcast failed");
            }
        }
        debug!(
            cache = %self.cache_name,
            topology = update.topology_id,
            members = targets.len(),
            segments,
            "Broadcast segment versions after rebalance"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_valid_entry() {
        assert_eq!(
            parse_entry("3_NYC", "2:7"),
            Some((3, SiteName::new("NYC"), SiteVersion::new(2, 7)))
        );
    }

    #[test]
    fn test_site_names_may_contain_underscores() {
        assert_eq!(
            parse_entry("12_us_east_1", "1:4"),
            Some((12, SiteName::new("us_east_1"), SiteVersion::new(1, 4)))
        );
    }

    #[test]
    fn test_decodes_scope_skipping_tags_and_garbage() {
        let mut state = PersistentState::tagged();
        state.set_property("3_NYC", "2:7");
        state.set_property("3_LON", "1:9");
        state.set_property("4_NYC", "2:1");
        state.set_property("bogus", "1:1");

        let (segments, skipped) = decode_versions(&state);
        assert_eq!(skipped, 1);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[&3].get(&SiteName::new("NYC")), SiteVersion::new(2, 7));
        assert_eq!(segments[&3].get(&SiteName::new("LON")), SiteVersion::new(1, 9));
        assert_eq!(segments[&4].len(), 1);
    }

    #[test]
    fn test_rejects_malformed_entries() {
        assert_eq!(parse_entry("NYC", "2:7"), None);
        assert_eq!(parse_entry("x_NYC", "2:7"), None);
        assert_eq!(parse_entry("3_", "2:7"), None);
        assert_eq!(parse_entry("3_NYC", "27"), None);
        assert_eq!(parse_entry("3_NYC", "a:7"), None);
        assert_eq!(parse_entry("3_NYC", "2:-1"), None);
        assert_eq!(parse_entry("-3_NYC", "2:7"), None);
    }
}
