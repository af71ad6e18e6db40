//! Tombstone manager for caches without async backups.
//!
//! Stores nothing and succeeds at everything.

use super::{IracTombstoneInfo, IracTombstoneManager};
use crate::error::IracResult;
use crate::topology::NodeAddress;
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

pub struct NoOpIracTombstoneManager;

#[async_trait]
impl IracTombstoneManager for NoOpIracTombstoneManager {
    fn store_tombstone(&self, _tombstone: IracTombstoneInfo) {}

    fn store_tombstone_if_absent(&self, _tombstone: IracTombstoneInfo) -> bool {
        false
    }

    fn get_tombstone(&self, _key: &[u8]) -> Option<IracTombstoneInfo> {
        None
    }

    fn contains(&self, _key: &[u8]) -> bool {
        false
    }

    fn remove_tombstone(&self, _key: &[u8]) -> Option<IracTombstoneInfo> {
        None
    }

    fn remove_tombstone_if_matches(&self, _tombstone: &IracTombstoneInfo) -> bool {
        false
    }

    fn size(&self) -> usize {
        0
    }

    async fn send_state_to(
        &self,
        _requestor: &NodeAddress,
        _segments: &HashSet<u32>,
    ) -> IracResult<()> {
        Ok(())
    }

    async fn check_stale_tombstone(&self, _tombstones: &[IracTombstoneInfo]) -> IracResult<()> {
        Ok(())
    }

    async fn run_cleanup_round(&self) -> IracResult<bool> {
        Ok(false)
    }

    fn start(&self) {}

    fn stop(&self) {}

    fn is_task_running(&self) -> bool {
        false
    }

    fn current_delay(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use irac_clock::IracMetadata;

    #[tokio::test]
    async fn test_noop_stores_nothing() {
        let manager = NoOpIracTombstoneManager;
        let tombstone =
            IracTombstoneInfo::new(Bytes::from_static(b"k1"), 2, IracMetadata::default());

        manager.store_tombstone(tombstone.clone());
        assert!(!manager.store_tombstone_if_absent(tombstone.clone()));
        assert!(manager.get_tombstone(b"k1").is_none());
        assert!(manager.is_empty());
        assert!(!manager.run_cleanup_round().await.unwrap());
        assert!(manager.check_stale_tombstone(&[tombstone]).await.is_ok());
        assert!(!manager.is_task_running());
    }
}
