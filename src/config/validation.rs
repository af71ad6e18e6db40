//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{IracConfig, PersistenceBackend};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("site.name is required")]
    MissingSiteName,
    #[error("site.cache is required")]
    MissingCacheName,
    #[error("tombstones.target_size must be greater than 0")]
    ZeroTargetSize,
    #[error("tombstones.max_cleanup_delay_ms must be greater than 0")]
    ZeroCleanupDelay,
    #[error("backup '{0}' has state_transfer_chunk_size 0")]
    ZeroChunkSize(String),
    #[error("backup '{0}' names the local site")]
    BackupIsLocalSite(String),
    #[error("backup '{0}' is listed more than once")]
    DuplicateBackup(String),
    #[error("persistence.path parent directory does not exist: {0}")]
    StatePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &IracConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // Required fields
    if config.site.name.is_empty() {
        errors.push(ValidationError::MissingSiteName);
    }
    if config.site.cache.is_empty() {
        errors.push(ValidationError::MissingCacheName);
    }

    // Scheduler tuning
    if config.tombstones.target_size == 0 {
        errors.push(ValidationError::ZeroTargetSize);
    }
    if config.tombstones.max_cleanup_delay_ms == 0 {
        errors.push(ValidationError::ZeroCleanupDelay);
    }

    // Backups
    let mut seen = HashSet::new();
    for backup in &config.backups {
        if backup.state_transfer_chunk_size == 0 {
            errors.push(ValidationError::ZeroChunkSize(backup.site.clone()));
        }
        if backup.site == config.site.name {
            errors.push(ValidationError::BackupIsLocalSite(backup.site.clone()));
        }
        if !seen.insert(backup.site.as_str()) {
            errors.push(ValidationError::DuplicateBackup(backup.site.clone()));
        }
    }

    // State path validation
    if config.persistence.backend == PersistenceBackend::Redb {
        let state_path = Path::new(&config.persistence.path);
        if let Some(parent) = state_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            errors.push(ValidationError::StatePathInvalid(
                config.persistence.path.clone(),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
