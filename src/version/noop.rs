//! Version generator for caches without async backups.
//!
//! Returns neutral metadata and never fails. Not meant to be asked for
//! versions: a cache that needs them must be built with the default
//! generator.

use super::IracVersionGenerator;
use crate::error::IracResult;
use crate::topology::TopologyUpdate;
use async_trait::async_trait;
use irac_clock::{IracMetadata, VersionVector};

pub struct NoOpIracVersionGenerator;

#[async_trait]
impl IracVersionGenerator for NoOpIracVersionGenerator {
    async fn start(&self) -> IracResult<()> {
        Ok(())
    }

    async fn stop(&self) -> IracResult<()> {
        Ok(())
    }

    fn generate_new_metadata(&self, _segment: u32) -> IracMetadata {
        IracMetadata::default()
    }

    fn generate_metadata_with_current_version(&self, _segment: u32) -> IracMetadata {
        IracMetadata::default()
    }

    fn generate_new_metadata_with_seen(
        &self,
        _segment: u32,
        _version_seen: Option<&VersionVector>,
    ) -> IracMetadata {
        IracMetadata::default()
    }

    fn update_version(&self, _segment: u32, _remote_version: &VersionVector) {}

    async fn on_topology_change(&self, _update: &TopologyUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use irac_clock::{SiteName, SiteVersion};

    #[tokio::test]
    async fn test_noop_returns_neutral_metadata() {
        let generator = NoOpIracVersionGenerator;
        assert!(generator.start().await.is_ok());
        assert_eq!(generator.generate_new_metadata(1), IracMetadata::default());

        let seen = VersionVector::single(SiteName::new("B"), SiteVersion::new(1, 4));
        generator.update_version(1, &seen);
        assert_eq!(
            generator.generate_new_metadata_with_seen(1, Some(&seen)),
            IracMetadata::default()
        );
        assert_eq!(
            generator.generate_metadata_with_current_version(1),
            IracMetadata::default()
        );
        assert!(generator.stop().await.is_ok());
    }
}
