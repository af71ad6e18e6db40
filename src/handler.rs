//! Inbound command dispatch.
//!
//! The transport decodes a command and hands it to [`IracCommandHandler::handle`];
//! the response goes back to the sender unchanged.

use crate::command::{CommandResponse, IracCommand};
use crate::error::IracResult;
use crate::tombstone::IracTombstoneManager;
use crate::topology::ClusterView;
use crate::version::IracVersionGenerator;
use crate::xsite::UpdateTracker;
use std::sync::Arc;
use tracing::{debug, trace};

pub struct IracCommandHandler {
    generator: Arc<dyn IracVersionGenerator>,
    tombstones: Arc<dyn IracTombstoneManager>,
    cluster: Arc<dyn ClusterView>,
    tracker: Arc<dyn UpdateTracker>,
}

impl IracCommandHandler {
    pub fn new(
        generator: Arc<dyn IracVersionGenerator>,
        tombstones: Arc<dyn IracTombstoneManager>,
        cluster: Arc<dyn ClusterView>,
        tracker: Arc<dyn UpdateTracker>,
    ) -> Self {
        Self {
            generator,
            tombstones,
            cluster,
            tracker,
        }
    }

    pub async fn handle(&self, command: IracCommand) -> IracResult<CommandResponse> {
        trace!(command = command.name(), "Handling IRAC command");
        match command {
            IracCommand::TombstoneCleanup(tombstone) => {
                if self.tombstones.remove_tombstone_if_matches(&tombstone) {
                    trace!(segment = tombstone.segment, "Tombstone removed on request");
                }
                Ok(CommandResponse::Ack)
            }
            IracCommand::TombstonePrimaryCheck(batch) => {
                self.tombstones.check_stale_tombstone(&batch).await?;
                Ok(CommandResponse::Ack)
            }
            IracCommand::TombstoneRemoteSiteCheck { key } => {
                Ok(CommandResponse::StillNeeded(self.still_needed(&key)?))
            }
            IracCommand::TombstoneStateResponse(batch) => {
                let received = batch.len();
                let mut stored = 0usize;
                for tombstone in batch {
                    if self.tombstones.store_tombstone_if_absent(tombstone) {
                        stored += 1;
                    }
                }
                debug!(received, stored, "Tombstone state applied");
                Ok(CommandResponse::Ack)
            }
            IracCommand::UpdateVersion(snapshot) => {
                for (segment, version) in &snapshot {
                    self.generator.update_version(*segment, version);
                }
                debug!(segments = snapshot.len(), "Segment versions merged");
                Ok(CommandResponse::Ack)
            }
        }
    }

    /// A site keeps the tombstone unless it is the key's primary and has
    /// nothing in flight for it.
    fn still_needed(&self, key: &[u8]) -> IracResult<bool> {
        let segment = self.cluster.key_segment(key);
        let distribution = self.cluster.segment_distribution(segment)?;
        Ok(!distribution.is_primary() || self.tracker.contains_key(key))
    }
}
