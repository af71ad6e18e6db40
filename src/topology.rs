//! Cluster topology as seen by the IRAC core.
//!
//! Segment ownership and key hashing belong to the cache's distribution
//! layer. The core only consumes them through [`ClusterView`], and always
//! asks again at decision time instead of caching an answer, so a topology
//! race corrects itself on the next cleanup round.

use crate::error::TopologyError;
use std::fmt;

/// Address of a node in the local cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ownership of one segment, from the local node's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDistribution {
    /// The segment this describes.
    pub segment: u32,
    /// The node making ordering decisions for the segment.
    pub primary: NodeAddress,
    /// Every node replicating the segment's writes, primary included.
    pub write_owners: Vec<NodeAddress>,
    /// The local node.
    pub local: NodeAddress,
}

impl SegmentDistribution {
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.primary == self.local
    }

    #[must_use]
    pub fn is_write_owner(&self) -> bool {
        self.write_owners.contains(&self.local)
    }

    /// Write owners other than the local node.
    pub fn remote_write_owners(&self) -> Vec<NodeAddress> {
        self.write_owners
            .iter()
            .filter(|owner| **owner != self.local)
            .cloned()
            .collect()
    }
}

/// Read access to the live cluster topology.
pub trait ClusterView: Send + Sync {
    /// The local node.
    fn local_address(&self) -> NodeAddress;

    /// Current ownership of `segment`.
    fn segment_distribution(&self, segment: u32) -> Result<SegmentDistribution, TopologyError>;

    /// Segment a key hashes to.
    fn key_segment(&self, key: &[u8]) -> u32;

    /// Every member of the current topology, local node included.
    fn members(&self) -> Vec<NodeAddress>;
}

/// Phase of a topology installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyPhase {
    /// Stable topology, no data moving.
    NoRebalance,
    ReadOldWriteAll,
    ReadAllWriteAll,
    ReadNewWriteAll,
}

impl TopologyPhase {
    /// Whether data is moving between nodes in this phase.
    #[must_use]
    pub fn is_rebalance(self) -> bool {
        !matches!(self, Self::NoRebalance)
    }
}

/// A newly installed topology.
#[derive(Debug, Clone)]
pub struct TopologyUpdate {
    pub topology_id: u32,
    pub phase: TopologyPhase,
    pub members: Vec<NodeAddress>,
}
