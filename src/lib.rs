//! irac - cross-site conflict detection and tombstone garbage collection
//! for active-active replicated caches.
//!
//! Every write gets a per-segment [`VersionVector`](irac_clock::VersionVector)
//! from an [`IracVersionGenerator`]; every delete leaves a tombstone in an
//! [`IracTombstoneManager`] until no backup site needs it anymore.
//!
//! The cluster, the backup sites and the wire are reached through the
//! collaborator traits in [`topology`], [`xsite`], [`transport`] and
//! [`persistence`].

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod persistence;
pub mod telemetry;
pub mod tombstone;
pub mod topology;
pub mod transport;
pub mod version;
pub mod xsite;

pub use command::{CommandResponse, IracCommand};
pub use config::IracConfig;
pub use error::{IracError, IracResult};
pub use handler::IracCommandHandler;
pub use tombstone::{
    DefaultIracTombstoneManager, IracTombstoneInfo, IracTombstoneManager,
    NoOpIracTombstoneManager,
};
pub use version::{DefaultIracVersionGenerator, IracVersionGenerator, NoOpIracVersionGenerator};
