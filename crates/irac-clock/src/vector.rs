//! Version vectors: one [`SiteVersion`] per site, partially ordered.
//!
//! A [`VersionVector`] is immutable. Every operation that "changes" it
//! returns a new vector, so a vector handed out as part of metadata can be
//! shared freely while the generator keeps advancing its own copy.

use crate::site::SiteName;
use crate::version::{NO_VERSION, SiteVersion};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Result of comparing two version vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionCompare {
    /// Every component is lower or equal, at least one is lower.
    Before,
    /// Every component is higher or equal, at least one is higher.
    After,
    /// All components are equal.
    Equal,
    /// Some components are higher and some lower: concurrent writes.
    Conflicting,
}

impl VersionCompare {
    /// Fold one per-site delta into the running result.
    ///
    /// The transition table is commutative, so the outcome does not depend
    /// on the order sites are visited in.
    fn step(self, delta: Ordering) -> Self {
        match (self, delta) {
            (Self::Conflicting, _) => Self::Conflicting,
            (state, Ordering::Equal) => state,
            (Self::Equal | Self::Before, Ordering::Less) => Self::Before,
            (Self::Equal | Self::After, Ordering::Greater) => Self::After,
            (Self::Before, Ordering::Greater) | (Self::After, Ordering::Less) => Self::Conflicting,
        }
    }
}

/// An immutable mapping from site to that site's latest known version.
///
/// Sites absent from the map compare as [`NO_VERSION`], the oldest possible
/// version, so "never seen this site" cannot manufacture a conflict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct VersionVector {
    entries: BTreeMap<SiteName, SiteVersion>,
}

impl VersionVector {
    /// Create a new empty vector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A vector with a single component.
    #[must_use]
    pub fn single(site: SiteName, version: SiteVersion) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(site, version);
        Self { entries }
    }

    /// The component for `site`, or [`NO_VERSION`] when absent.
    #[must_use]
    pub fn get(&self, site: &SiteName) -> SiteVersion {
        self.entries.get(site).copied().unwrap_or(NO_VERSION)
    }

    /// Whether `site` has a component in this vector.
    #[must_use]
    pub fn contains(&self, site: &SiteName) -> bool {
        self.entries.contains_key(site)
    }

    /// Topology id of `site`'s component (0 when absent).
    #[must_use]
    pub fn topology(&self, site: &SiteName) -> u32 {
        self.get(site).topology_id
    }

    /// Counter of `site`'s component (0 when absent).
    #[must_use]
    pub fn counter(&self, site: &SiteName) -> u64 {
        self.get(site).counter
    }

    pub fn sites(&self) -> impl Iterator<Item = &SiteName> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SiteName, &SiteVersion)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Join of two vectors: the per-site maximum over the union of sites.
    ///
    /// Commutative, associative and idempotent. The result never compares
    /// [`VersionCompare::Before`] either operand.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut entries = self.entries.clone();
        for (site, version) in &other.entries {
            entries
                .entry(site.clone())
                .and_modify(|current| *current = (*current).max(*version))
                .or_insert(*version);
        }
        Self { entries }
    }

    /// A copy of this vector with `site`'s component advanced for a write
    /// under `topology_id`.
    ///
    /// An absent component starts at `(topology_id, 1)`.
    #[must_use]
    pub fn increment(&self, site: &SiteName, topology_id: u32) -> Self {
        let next = match self.entries.get(site) {
            Some(current) => current.increment(topology_id),
            None => SiteVersion::new_version(topology_id),
        };
        let mut entries = self.entries.clone();
        entries.insert(site.clone(), next);
        Self { entries }
    }

    /// Partial-order comparison of `self` against `other`.
    ///
    /// `After` means `self` dominates `other`.
    #[must_use]
    pub fn compare(&self, other: &Self) -> VersionCompare {
        let mut result = VersionCompare::Equal;
        for site in self.entries.keys().chain(other.entries.keys()) {
            result = result.step(self.get(site).cmp(&other.get(site)));
            if result == VersionCompare::Conflicting {
                break;
            }
        }
        result
    }
}

impl FromIterator<(SiteName, SiteVersion)> for VersionVector {
    /// Duplicate sites are merged, keeping the higher version.
    fn from_iter<I: IntoIterator<Item = (SiteName, SiteVersion)>>(iter: I) -> Self {
        let mut entries: BTreeMap<SiteName, SiteVersion> = BTreeMap::new();
        for (site, version) in iter {
            entries
                .entry(site)
                .and_modify(|current| *current = (*current).max(version))
                .or_insert(version);
        }
        Self { entries }
    }
}

impl fmt::Display for VersionVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, (site, version)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{site}={version}")?;
        }
        f.write_str(")")
    }
}
