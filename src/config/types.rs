//! Core configuration types and loading.

use irac_clock::SiteName;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// IRAC configuration for one cache on one site.
#[derive(Debug, Clone, Deserialize)]
pub struct IracConfig {
    /// Local site identity.
    pub site: SiteConfig,
    /// Tombstone garbage-collection tuning.
    #[serde(default)]
    pub tombstones: TombstoneConfig,
    /// Backup sites this cache replicates to.
    #[serde(default)]
    pub backups: Vec<BackupConfig>,
    /// Where version state is persisted between restarts.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl IracConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: IracConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// The local site name.
    pub fn local_site(&self) -> SiteName {
        SiteName::new(self.site.name.clone())
    }

    /// Batch size for state transfer and primary-check requests.
    ///
    /// The largest state-transfer chunk size across backups, at least 1.
    pub fn batch_size(&self) -> usize {
        self.backups
            .iter()
            .map(|backup| backup.state_transfer_chunk_size)
            .max()
            .unwrap_or(1)
            .max(1)
    }
}

/// Local site identity.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site name (e.g., "NYC"). Must match the name other sites use for us.
    pub name: String,
    /// Name of the replicated cache.
    pub cache: String,
}

/// Tombstone cleanup tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct TombstoneConfig {
    /// Tombstone count the cleanup scheduler tries to stay under (default: 32000).
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    /// Longest delay between two cleanup rounds in milliseconds (default: 30000).
    #[serde(default = "default_max_cleanup_delay_ms")]
    pub max_cleanup_delay_ms: u64,
}

impl Default for TombstoneConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            max_cleanup_delay_ms: default_max_cleanup_delay_ms(),
        }
    }
}

/// Replication strategy towards a backup site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupStrategy {
    #[default]
    Async,
    Sync,
}

/// A backup site.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Remote site name.
    pub site: String,
    /// Only async backups take part in tombstone checks.
    #[serde(default)]
    pub strategy: BackupStrategy,
    /// Entries per state-transfer chunk (default: 512).
    #[serde(default = "default_chunk_size")]
    pub state_transfer_chunk_size: usize,
}

/// Version state persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    Redb,
}

/// Version state persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Backend type: "memory" or "redb".
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// Path to the redb file.
    #[serde(default = "default_state_path")]
    pub path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Memory,
            path: default_state_path(),
        }
    }
}

fn default_target_size() -> usize {
    32_000
}

fn default_max_cleanup_delay_ms() -> u64 {
    30_000
}

fn default_chunk_size() -> usize {
    512
}

fn default_state_path() -> String {
    "irac-state.redb".to_string()
}
