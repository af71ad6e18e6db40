//! In-memory scoped state.
//!
//! Survives a generator stop/start within one process, nothing more. Used
//! when persistence is configured as "memory" and in tests.

use super::{PersistentState, ScopedStateStore};
use crate::error::PersistenceError;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryStateStore {
    scopes: DashMap<String, PersistentState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScopedStateStore for MemoryStateStore {
    async fn read_scope(&self, scope: &str) -> Result<Option<PersistentState>, PersistenceError> {
        Ok(self.scopes.get(scope).map(|state| state.clone()))
    }

    async fn write_scope(
        &self,
        scope: &str,
        state: &PersistentState,
    ) -> Result<(), PersistenceError> {
        self.scopes.insert(scope.to_string(), state.clone());
        Ok(())
    }
}
