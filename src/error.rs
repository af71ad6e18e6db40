//! Unified error handling for the IRAC core.
//!
//! This module provides the error hierarchy shared by the version generator,
//! the tombstone manager and the collaborator seams, with automatic
//! conversions and metric-style labels for logging.

use crate::topology::NodeAddress;
use irac_clock::SiteName;
use thiserror::Error;

// ============================================================================
// Transport Errors (remote calls)
// ============================================================================

/// Errors returned by an [`IracTransport`](crate::transport::IracTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("node {0} is unreachable")]
    NodeUnreachable(NodeAddress),

    #[error("site {0} is unreachable")]
    SiteUnreachable(SiteName),

    #[error("remote call timed out")]
    Timeout,

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("remote failure: {0}")]
    Remote(String),
}

// ============================================================================
// Topology Errors (collaborator lookups)
// ============================================================================

/// Errors from the cluster topology collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("no topology installed yet")]
    NotInstalled,

    #[error("segment {0} is outside the topology")]
    UnknownSegment(u32),
}

// ============================================================================
// Persistence Errors (scoped state)
// ============================================================================

/// Errors from a [`ScopedStateStore`](crate::persistence::ScopedStateStore).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),
}

// ============================================================================
// IRAC Errors (crate level)
// ============================================================================

/// Errors surfaced by the version generator and the tombstone manager.
#[derive(Debug, Error)]
pub enum IracError {
    #[error("rpc failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("topology unavailable: {0}")]
    Topology(#[from] TopologyError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("state transfer failed for {failed} of {total} batches")]
    StateTransfer { failed: usize, total: usize },

    #[error("tombstone manager is stopped")]
    Stopped,
}

impl IracError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rpc(_) => "rpc",
            Self::Topology(_) => "topology",
            Self::Persistence(_) => "persistence",
            Self::StateTransfer { .. } => "state_transfer",
            Self::Stopped => "stopped",
        }
    }
}

/// Result type for IRAC operations.
pub type IracResult<T> = Result<T, IracError>;
