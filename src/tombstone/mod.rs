//! Tombstones for deleted keys and their garbage collection.
//!
//! A tombstone keeps the last [`IracMetadata`] of a deleted key so that a
//! concurrent write arriving later from another site can still be detected
//! as a conflict. It is kept until no backup site needs it anymore.

use crate::error::IracResult;
use crate::topology::NodeAddress;
use async_trait::async_trait;
use bytes::Bytes;
use irac_clock::IracMetadata;
use std::collections::HashSet;
use std::time::Duration;

pub mod manager;
pub mod noop;
pub mod scheduler;
pub mod store;

pub use manager::DefaultIracTombstoneManager;
pub use noop::NoOpIracTombstoneManager;
pub use scheduler::CleanupScheduler;
pub use store::TombstoneStore;

/// Version marker for a deleted key.
///
/// Identified by `key`; two tombstones for the same key with different
/// segment or metadata are different tombstones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IracTombstoneInfo {
    pub key: Bytes,
    pub segment: u32,
    pub metadata: IracMetadata,
}

impl IracTombstoneInfo {
    pub fn new(key: Bytes, segment: u32, metadata: IracMetadata) -> Self {
        Self {
            key,
            segment,
            metadata,
        }
    }
}

/// Tombstone storage plus the cleanup protocol.
#[async_trait]
pub trait IracTombstoneManager: Send + Sync {
    /// Insert or replace the key's tombstone.
    fn store_tombstone(&self, tombstone: IracTombstoneInfo);

    /// Insert only if the key has no tombstone yet. Returns whether it was stored.
    fn store_tombstone_if_absent(&self, tombstone: IracTombstoneInfo) -> bool;

    fn get_tombstone(&self, key: &[u8]) -> Option<IracTombstoneInfo>;

    fn contains(&self, key: &[u8]) -> bool;

    fn remove_tombstone(&self, key: &[u8]) -> Option<IracTombstoneInfo>;

    /// Remove the key's tombstone only if it equals `tombstone`.
    fn remove_tombstone_if_matches(&self, tombstone: &IracTombstoneInfo) -> bool;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Push every tombstone in `segments` to `requestor`, in batches.
    async fn send_state_to(
        &self,
        requestor: &NodeAddress,
        segments: &HashSet<u32>,
    ) -> IracResult<()>;

    /// Correct owners holding a different copy of a tombstone this node is
    /// primary for.
    async fn check_stale_tombstone(&self, tombstones: &[IracTombstoneInfo]) -> IracResult<()>;

    /// Run one cleanup round now and wait for it.
    ///
    /// Returns `false` without doing anything when another round is already
    /// running.
    async fn run_cleanup_round(&self) -> IracResult<bool>;

    /// Start periodic cleanup.
    fn start(&self);

    /// Stop periodic cleanup and drop every tombstone. Terminal.
    fn stop(&self);

    /// Whether periodic cleanup is scheduled.
    fn is_task_running(&self) -> bool;

    fn current_delay(&self) -> Duration;
}
