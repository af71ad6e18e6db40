//! Version vectors for asynchronous cross-site replication (IRAC).
//!
//! Each site in an active-active deployment stamps its writes with a
//! [`VersionVector`]: one [`SiteVersion`] per site that ever wrote to the
//! segment. Comparing two vectors tells whether one write causally follows
//! the other or whether they are concurrent and must be resolved as a
//! conflict.
//!
//! ```text
//!   site A write        site B write
//!   {A=1:1}             {B=1:4}
//!        \                 /
//!         \   (merge)     /
//!          {A=1:2, B=1:4}   <- compares After both inputs
//! ```
//!
//! # Types
//!
//! - [`SiteName`]: identifier of a site.
//! - [`SiteVersion`]: `(topology_id, counter)`, totally ordered.
//! - [`VersionVector`]: immutable site -> version map with `merge` (join)
//!   and `compare` (partial order).
//! - [`IracMetadata`]: the producing site plus the vector.

pub mod metadata;
pub mod site;
pub mod vector;
pub mod version;

pub use metadata::IracMetadata;
pub use site::SiteName;
pub use vector::{VersionCompare, VersionVector};
pub use version::{NO_VERSION, SiteVersion};
