//! Replication metadata attached to every write and tombstone.

use crate::site::SiteName;
use crate::vector::VersionVector;
use std::fmt;

/// The site that produced a write together with the write's version vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IracMetadata {
    pub site: SiteName,
    pub version: VersionVector,
}

impl IracMetadata {
    #[must_use]
    pub fn new(site: SiteName, version: VersionVector) -> Self {
        Self { site, version }
    }
}

impl fmt::Display for IracMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.site, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::SiteVersion;

    #[test]
    fn test_metadata_display() {
        let site = SiteName::new("A");
        let version = VersionVector::single(site.clone(), SiteVersion::new(1, 2));
        let metadata = IracMetadata::new(site, version);
        assert_eq!(metadata.to_string(), "A@(A=1:2)");
    }

    #[test]
    fn test_default_is_neutral() {
        let metadata = IracMetadata::default();
        assert!(metadata.site.is_empty());
        assert!(metadata.version.is_empty());
    }
}
