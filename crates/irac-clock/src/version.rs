//! A single site's component of a version vector.

use std::fmt;

/// A `(topology_id, counter)` pair, totally ordered lexicographically.
///
/// The topology id is the id of the owning site's cluster topology when the
/// counter sequence started. A topology change restarts the counter at 1
/// under the new id, which still orders after everything from older
/// topologies.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct SiteVersion {
    /// Topology id the counter belongs to. Compared first.
    pub topology_id: u32,
    /// Monotonic counter within the topology.
    pub counter: u64,
}

/// The version of a site that was never observed.
pub const NO_VERSION: SiteVersion = SiteVersion {
    topology_id: 0,
    counter: 0,
};

impl SiteVersion {
    #[must_use]
    pub const fn new(topology_id: u32, counter: u64) -> Self {
        Self {
            topology_id,
            counter,
        }
    }

    /// The first version produced under `topology_id`.
    #[must_use]
    pub const fn new_version(topology_id: u32) -> Self {
        Self::new(topology_id, 1)
    }

    /// The next version for a write happening under `topology_id`.
    ///
    /// A newer topology resets the counter to 1. The same or an older
    /// topology bumps the counter. An exhausted counter rolls over into the
    /// next topology id, so the result is strictly after `self` unless both
    /// the topology id and the counter are already at their maximum.
    #[must_use]
    pub fn increment(&self, topology_id: u32) -> Self {
        if topology_id > self.topology_id {
            return Self::new_version(topology_id);
        }
        match self.counter.checked_add(1) {
            Some(counter) => Self::new(self.topology_id, counter),
            None => match self.topology_id.checked_add(1) {
                Some(next_topology) => Self::new_version(next_topology),
                None => *self,
            },
        }
    }

    #[must_use]
    pub fn max(self, other: Self) -> Self {
        std::cmp::max(self, other)
    }
}

impl fmt::Display for SiteVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.topology_id, self.counter)
    }
}
