pub mod comments;
pub mod communities;
pub mod error;
pub mod migrations;
pub mod models;
pub mod permissions;
pub mod posts;
pub mod reconcile;
pub mod users;
pub mod votes;

pub use error::{StoreError, StoreResult};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// SQLite-backed store. Every counter-bearing mutation goes through
/// [`Database::transaction`], so the counter and its dependent row commit
/// or roll back together.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers from other processes
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let db = Self::init(conn)?;
        info!("Database opened at {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&conn)
    }

    /// Runs `f` inside a `BEGIN IMMEDIATE` transaction. Commits when `f`
    /// returns `Ok`, rolls back otherwise.
    pub fn transaction<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Database;
    use crate::models::{CommunityRow, PostRow, UserRow};
    use agora_types::models::PrivacyType;

    pub fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    pub fn user(db: &Database, name: &str) -> UserRow {
        db.create_user(name, &format!("{name}@example.com"), "hash")
            .unwrap()
    }

    pub fn community(db: &Database, id: &str, creator: &UserRow) -> CommunityRow {
        db.create_community(id, creator.id, PrivacyType::Public, None)
            .unwrap()
    }

    pub fn post(db: &Database, community: &CommunityRow, creator: &UserRow) -> PostRow {
        db.create_post(creator.id, &community.id, "A title", "body", None)
            .unwrap()
    }
}
