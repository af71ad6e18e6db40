//! Redb-backed scoped state.
//!
//! # Schema
//!
//! ```text
//! SCOPED_STATE: "scope\0property" -> value
//! ```
//!
//! A scope with no properties reads back as `None`.

use super::{PersistentState, ScopedStateStore};
use crate::error::PersistenceError;
use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const SCOPED_STATE: TableDefinition<&str, &str> = TableDefinition::new("scoped_state");

pub struct RedbStateStore {
    db: Arc<Database>,
}

impl RedbStateStore {
    /// Open (or create) the state file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        let db = Database::create(path.as_ref())?;
        let store = Self::new(Arc::new(db))?;
        info!(path = %path.as_ref().display(), "Scoped state store opened");
        Ok(store)
    }

    /// Use an existing database, creating the table if needed.
    pub fn new(db: Arc<Database>) -> Result<Self, PersistenceError> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SCOPED_STATE)?;
        }
        write_txn.commit()?;
        Ok(Self { db })
    }

    fn scope_start(scope: &str) -> String {
        format!("{scope}\0")
    }

    fn scope_end(scope: &str) -> String {
        format!("{scope}\u{1}")
    }
}

#[async_trait]
impl ScopedStateStore for RedbStateStore {
    async fn read_scope(&self, scope: &str) -> Result<Option<PersistentState>, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SCOPED_STATE)?;

        let start = Self::scope_start(scope);
        let end = Self::scope_end(scope);
        let mut properties = Vec::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (k, v) = item?;
            if let Some(property) = k.value().strip_prefix(start.as_str()) {
                properties.push((property.to_string(), v.value().to_string()));
            }
        }

        if properties.is_empty() {
            return Ok(None);
        }
        debug!(scope = %scope, properties = properties.len(), "Read scoped state");
        Ok(Some(properties.into_iter().collect()))
    }

    async fn write_scope(
        &self,
        scope: &str,
        state: &PersistentState,
    ) -> Result<(), PersistenceError> {
        let start = Self::scope_start(scope);
        let end = Self::scope_end(scope);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SCOPED_STATE)?;

            let mut stale = Vec::new();
            for item in table.range(start.as_str()..end.as_str())? {
                let (k, _v) = item?;
                stale.push(k.value().to_string());
            }
            for k in stale {
                table.remove(k.as_str())?;
            }

            for (property, value) in state.iter() {
                let key = format!("{start}{property}");
                table.insert(key.as_str(), value)?;
            }
        }
        write_txn.commit()?;

        debug!(scope = %scope, properties = state.len(), "Wrote scoped state");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_store() -> (RedbStateStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RedbStateStore::open(dir.path().join("state.redb")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_read_missing_scope() {
        let (store, _dir) = create_test_store();
        assert!(store.read_scope("irac-version-users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_and_read_scope() {
        let (store, _dir) = create_test_store();

        let mut state = PersistentState::tagged();
        state.set_property("3_NYC", "2:7");
        state.set_property("3_LON", "1:1");
        store.write_scope("irac-version-users", &state).await.unwrap();

        let read = store.read_scope("irac-version-users").await.unwrap().unwrap();
        assert_eq!(read, state);
    }

    #[tokio::test]
    async fn test_write_replaces_previous_properties() {
        let (store, _dir) = create_test_store();

        let mut first = PersistentState::new();
        first.set_property("1_A", "1:1");
        first.set_property("2_A", "1:1");
        store.write_scope("s", &first).await.unwrap();

        let mut second = PersistentState::new();
        second.set_property("1_A", "1:9");
        store.write_scope("s", &second).await.unwrap();

        let read = store.read_scope("s").await.unwrap().unwrap();
        assert_eq!(read, second);
    }

    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let (store, _dir) = create_test_store();

        let mut users = PersistentState::new();
        users.set_property("1_A", "1:1");
        store.write_scope("users", &users).await.unwrap();

        let mut sessions = PersistentState::new();
        sessions.set_property("1_A", "4:4");
        store.write_scope("users-sessions", &sessions).await.unwrap();

        assert_eq!(store.read_scope("users").await.unwrap().unwrap(), users);
        assert_eq!(
            store.read_scope("users-sessions").await.unwrap().unwrap(),
            sessions
        );
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.redb");

        let mut state = PersistentState::tagged();
        state.set_property("0_NYC", "5:2");
        {
            let store = RedbStateStore::open(&path).unwrap();
            store.write_scope("users", &state).await.unwrap();
        }

        let store = RedbStateStore::open(&path).unwrap();
        assert_eq!(store.read_scope("users").await.unwrap().unwrap(), state);
    }
}
