//! Commands exchanged between nodes and sites.
//!
//! Only the shape of each command is defined here. Encoding and delivery
//! belong to the [`IracTransport`](crate::transport::IracTransport).

use crate::tombstone::IracTombstoneInfo;
use bytes::Bytes;
use irac_clock::VersionVector;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum IracCommand {
    /// Delete the tombstone on every write owner, if the metadata still matches.
    TombstoneCleanup(IracTombstoneInfo),

    /// Ask the primary owner to re-check a batch of tombstones.
    TombstonePrimaryCheck(Vec<IracTombstoneInfo>),

    /// Ask a remote site whether it still needs the tombstone for `key`.
    TombstoneRemoteSiteCheck { key: Bytes },

    /// Tombstones pushed to a node during state transfer.
    TombstoneStateResponse(Vec<IracTombstoneInfo>),

    /// Per-segment version vectors broadcast after a rebalance.
    UpdateVersion(Vec<(u32, VersionVector)>),
}

impl IracCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::TombstoneCleanup(_) => "TOMBSTONE_CLEANUP",
            Self::TombstonePrimaryCheck(_) => "TOMBSTONE_PRIMARY_CHECK",
            Self::TombstoneRemoteSiteCheck { .. } => "TOMBSTONE_REMOTE_SITE_CHECK",
            Self::TombstoneStateResponse(_) => "TOMBSTONE_STATE_RESPONSE",
            Self::UpdateVersion(_) => "UPDATE_VERSION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CommandResponse {
    Ack,
    /// Answer to [`IracCommand::TombstoneRemoteSiteCheck`].
    StillNeeded(bool),
}
