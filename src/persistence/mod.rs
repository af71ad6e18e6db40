//! Scoped persistent state abstraction.
//!
//! A scope is a flat, named list of string properties that survives
//! restarts. The version generator keeps one scope per cache.

use crate::error::PersistenceError;
use async_trait::async_trait;
use std::collections::BTreeMap;

pub mod memory;
pub mod redb;

pub use memory::MemoryStateStore;
pub use self::redb::RedbStateStore;

/// Property key holding the software version that wrote the scope.
pub const VERSION_KEY: &str = "@version";

/// A flat property list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentState {
    properties: BTreeMap<String, String>,
}

impl PersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A state tagged with the running software version.
    pub fn tagged() -> Self {
        let mut state = Self::new();
        state.set_property(VERSION_KEY, env!("CARGO_PKG_VERSION"));
        state
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// The software version tag, if present.
    pub fn version(&self) -> Option<&str> {
        self.property(VERSION_KEY)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl FromIterator<(String, String)> for PersistentState {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            properties: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
pub trait ScopedStateStore: Send + Sync {
    /// Read a scope. `None` when it was never written.
    async fn read_scope(&self, scope: &str) -> Result<Option<PersistentState>, PersistenceError>;

    /// Replace a scope with `state`.
    async fn write_scope(&self, scope: &str, state: &PersistentState)
    -> Result<(), PersistenceError>;
}
