//! Cross-site collaborators: backup sites and in-flight updates.

use crate::config::{BackupStrategy, IracConfig};
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use irac_clock::SiteName;
use tracing::info;

/// Backup sites as seen by the local site.
pub trait XSiteView: Send + Sync {
    /// Every async backup site, online or not.
    fn async_backups(&self) -> Vec<SiteName>;

    /// Whether `site` has been taken offline.
    fn is_offline(&self, site: &SiteName) -> bool;

    /// Async backups that are currently online.
    fn online_async_backups(&self) -> Vec<SiteName> {
        self.async_backups()
            .into_iter()
            .filter(|site| !self.is_offline(site))
            .collect()
    }
}

/// Backup sites taken from configuration, with runtime offline state.
pub struct ConfiguredBackups {
    async_sites: Vec<SiteName>,
    offline: DashMap<SiteName, ()>,
}

impl ConfiguredBackups {
    pub fn from_config(config: &IracConfig) -> Self {
        let async_sites = config
            .backups
            .iter()
            .filter(|backup| backup.strategy == BackupStrategy::Async)
            .map(|backup| SiteName::new(backup.site.clone()))
            .collect();
        Self::new(async_sites)
    }

    pub fn new(async_sites: Vec<SiteName>) -> Self {
        Self {
            async_sites,
            offline: DashMap::new(),
        }
    }

    pub fn take_offline(&self, site: &SiteName) {
        if self.offline.insert(site.clone(), ()).is_none() {
            info!(site = %site, "Backup site taken offline");
        }
    }

    pub fn bring_online(&self, site: &SiteName) {
        if self.offline.remove(site).is_some() {
            info!(site = %site, "Backup site back online");
        }
    }
}

impl XSiteView for ConfiguredBackups {
    fn async_backups(&self) -> Vec<SiteName> {
        self.async_sites.clone()
    }

    fn is_offline(&self, site: &SiteName) -> bool {
        self.offline.contains_key(site)
    }
}

/// Keys whose latest update has not been confirmed by every backup site.
///
/// Implemented by the cross-site update dispatcher. A tombstone must not be
/// collected while its key is still pending here.
pub trait UpdateTracker: Send + Sync {
    fn contains_key(&self, key: &[u8]) -> bool;
}

/// A plain set of pending keys.
#[derive(Default)]
pub struct PendingKeys {
    keys: DashSet<Bytes>,
}

impl PendingKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, key: Bytes) {
        self.keys.insert(key);
    }

    /// Mark `key` as confirmed by every backup.
    pub fn confirm(&self, key: &[u8]) {
        self.keys.remove(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl UpdateTracker for PendingKeys {
    fn contains_key(&self, key: &[u8]) -> bool {
        self.keys.contains(key)
    }
}
