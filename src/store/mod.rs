// Store adapter - every read and write against the relational store goes through here
mod content;

pub use content::SortOrder;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::User;
use crate::state::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Point lookups the identity cache needs on a miss.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    async fn user_by_account_name(&self, name: &str) -> Result<Option<User>, StoreError>;

    /// Resolve an unexpired session token to its user id
    async fn user_id_for_session(&self, token: &str) -> Result<Option<i64>, StoreError>;
}

/// Directed friendship edges.
#[async_trait]
pub trait FriendshipStore: Send + Sync {
    /// Does the directed row `one -> another` exist?
    async fn relation_exists(&self, one: i64, another: i64) -> Result<bool, StoreError>;

    /// Insert `a -> b` and `b -> a` in one transaction. Returns rows inserted.
    async fn insert_relation_pair(&self, a: i64, b: i64) -> Result<usize, StoreError>;
}

pub type DynIdentityStore = Arc<dyn IdentityStore>;
pub type DynFriendshipStore = Arc<dyn FriendshipStore>;

/// Ids above which rows are discarded by an administrative reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermarks {
    pub relations: i64,
    pub footprints: i64,
    pub entries: i64,
    pub comments: i64,
}

/// SQLite implementation. Queries run on the blocking pool so request
/// workers never stall on the database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    pub async fn insert_user(
        &self,
        account_name: &str,
        nick_name: &str,
        email: &str,
        passhash: &str,
    ) -> Result<User, StoreError> {
        let (account_name, nick_name, email, passhash) = (
            account_name.to_string(),
            nick_name.to_string(),
            email.to_string(),
            passhash.to_string(),
        );
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO users (account_name, nick_name, email, passhash) VALUES (?1, ?2, ?3, ?4)",
                params![account_name, nick_name, email, passhash],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute("INSERT INTO profiles (user_id) VALUES (?1)", params![id])?;
            tx.commit()?;
            Ok(User {
                id,
                account_name,
                nick_name,
                email,
            })
        })
        .await
    }

    /// The user registered under `email` and their password hash.
    pub async fn credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, StoreError> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, account_name, nick_name, email, passhash FROM users WHERE email = ?1",
                    params![email],
                    |row| Ok((user_from_row(row)?, row.get(4)?)),
                )
                .optional()?)
        })
        .await
    }

    pub async fn insert_session(
        &self,
        id: &str,
        user_id: i64,
        token: &str,
        hours: u64,
    ) -> Result<(), StoreError> {
        let (id, token) = (id.to_string(), token.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
                params![id, user_id, token, format!("+{} hours", hours)],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
        .await
    }

    /// Drop every row created after the given watermarks.
    pub async fn reset_to_watermarks(&self, marks: Watermarks) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM relations WHERE id > ?1", params![marks.relations])?;
            tx.execute("DELETE FROM footprints WHERE id > ?1", params![marks.footprints])?;
            tx.execute("DELETE FROM comments WHERE id > ?1", params![marks.comments])?;
            tx.execute("DELETE FROM entries WHERE id > ?1", params![marks.entries])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        account_name: row.get(1)?,
        nick_name: row.get(2)?,
        email: row.get(3)?,
    })
}

#[async_trait]
impl IdentityStore for SqliteStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, account_name, nick_name, email FROM users WHERE id = ?1",
                    params![id],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn user_by_account_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT id, account_name, nick_name, email FROM users WHERE account_name = ?1",
                    params![name],
                    user_from_row,
                )
                .optional()?)
        })
        .await
    }

    async fn user_id_for_session(&self, token: &str) -> Result<Option<i64>, StoreError> {
        let token = token.to_string();
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
                    params![token],
                    |row| row.get(0),
                )
                .optional()?)
        })
        .await
    }
}

#[async_trait]
impl FriendshipStore for SqliteStore {
    async fn relation_exists(&self, one: i64, another: i64) -> Result<bool, StoreError> {
        self.with_conn(move |conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(1) > 0 FROM relations WHERE one = ?1 AND another = ?2",
                params![one, another],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
        .await
    }

    async fn insert_relation_pair(&self, a: i64, b: i64) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let now = crate::db::format_timestamp(chrono::Utc::now());
            // Both directions or neither
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO relations (one, another, created_at) VALUES (?1, ?2, ?3), (?2, ?1, ?3)",
                params![a, b, now],
            )?;
            tx.commit()?;
            Ok(inserted)
        })
        .await
    }
}
