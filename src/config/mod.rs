//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (IracConfig, SiteConfig, TombstoneConfig,
//!   BackupConfig, PersistenceConfig) and TOML loading
//! - [`validation`]: Startup validation collecting every problem found

mod types;
pub mod validation;

pub use types::{
    BackupConfig, BackupStrategy, ConfigError, IracConfig, PersistenceBackend, PersistenceConfig,
    SiteConfig, TombstoneConfig,
};
pub use validation::{ValidationError, validate};
