//! Per-segment version generation for cross-site writes.
//!
//! Every local write asks the generator for fresh [`IracMetadata`]; every
//! update received from another site is merged back in, so the next local
//! version dominates everything this node has seen for the segment.
//!
//! Two variants exist, picked when the cache is built:
//! - [`DefaultIracVersionGenerator`] for caches with async backup sites.
//! - [`NoOpIracVersionGenerator`] for caches without. It hands out neutral
//!   metadata; the write path must not ask it for versions.

use crate::error::IracResult;
use crate::topology::TopologyUpdate;
use async_trait::async_trait;
use irac_clock::{IracMetadata, VersionVector};

pub mod default;
pub mod noop;

pub use default::{DefaultIracVersionGenerator, decode_versions};
pub use noop::NoOpIracVersionGenerator;

#[async_trait]
pub trait IracVersionGenerator: Send + Sync {
    /// Restore persisted versions.
    async fn start(&self) -> IracResult<()>;

    /// Persist every version.
    async fn stop(&self) -> IracResult<()>;

    /// Metadata for a local write: the local site's component is advanced.
    fn generate_new_metadata(&self, segment: u32) -> IracMetadata;

    /// The segment's current metadata, created if absent but never advanced.
    fn generate_metadata_with_current_version(&self, segment: u32) -> IracMetadata;

    /// Metadata for a local write that must follow `version_seen`.
    ///
    /// The result compares after both the segment's previous version and
    /// `version_seen`.
    fn generate_new_metadata_with_seen(
        &self,
        segment: u32,
        version_seen: Option<&VersionVector>,
    ) -> IracMetadata;

    /// Merge a version received from another site.
    fn update_version(&self, segment: u32, remote_version: &VersionVector);

    /// React to a newly installed topology.
    async fn on_topology_change(&self, update: &TopologyUpdate);
}
