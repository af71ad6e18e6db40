//! Site identifiers.

use std::cmp::Ordering;
use std::fmt;

/// The name of an independently operated site (datacenter or cluster).
///
/// Site names are the keys of a [`VersionVector`](crate::VersionVector), so
/// they must be stable across restarts and identical on every site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SiteName(String);

impl SiteName {
    /// Create a new site name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialOrd for SiteName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SiteName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SiteName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SiteName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_name_creation() {
        let site = SiteName::new("NYC");
        assert_eq!(site.as_str(), "NYC");
        assert_eq!(site.to_string(), "NYC");
        assert!(!site.is_empty());
        assert!(SiteName::default().is_empty());
    }

    #[test]
    fn test_site_name_ordering() {
        let lon = SiteName::new("LON");
        let nyc = SiteName::new("NYC");

        assert!(lon < nyc);
        assert_eq!(lon, SiteName::from("LON"));
    }
}
