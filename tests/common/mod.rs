#![allow(dead_code)]

use ashiato::auth::credentials::hash_password;
use ashiato::config::Config;
use ashiato::db::{self, models::User};
use ashiato::state::AppState;
use rusqlite::params;
use tempfile::TempDir;

pub const PASSWORD: &str = "password";

/// A fresh database plus fully wired state, rooted in a temp dir.
pub fn test_state() -> (AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = Some(temp_dir.path().join("test.db"));
    config.cache.snapshot_path = Some(temp_dir.path().join("identity-cache.json"));
    config.cache.warm_user_count = 5;

    let pool = db::create_pool(&config.db_path(), 4).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (AppState::new(pool, config), temp_dir)
}

/// A second state over the same database, with empty caches.
pub fn restarted(state: &AppState) -> AppState {
    AppState::new(state.store.pool().clone(), state.config.clone())
}

pub async fn seed_user(state: &AppState, name: &str) -> User {
    let hash = hash_password(PASSWORD, 4).await.unwrap();
    state
        .store
        .insert_user(name, name, &format!("{name}@example.com"), &hash)
        .await
        .unwrap()
}

/// Insert an entry with a fixed creation time.
pub fn insert_entry_at(state: &AppState, user_id: i64, private: bool, body: &str, at: &str) -> i64 {
    let conn = state.store.pool().get().unwrap();
    conn.execute(
        "INSERT INTO entries (user_id, private, body, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, private, body, at],
    )
    .unwrap();
    conn.last_insert_rowid()
}

/// Insert one directed relation row with a fixed creation time.
pub fn insert_edge_at(state: &AppState, one: i64, another: i64, at: &str) {
    let conn = state.store.pool().get().unwrap();
    conn.execute(
        "INSERT INTO relations (one, another, created_at) VALUES (?1, ?2, ?3)",
        params![one, another, at],
    )
    .unwrap();
}

pub fn count_rows(state: &AppState, table: &str) -> i64 {
    let conn = state.store.pool().get().unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
        .unwrap()
}

/// Insert a comment with a fixed creation time.
pub fn insert_comment_at(state: &AppState, entry_id: i64, user_id: i64, text: &str, at: &str) -> i64 {
    let conn = state.store.pool().get().unwrap();
    conn.execute(
        "INSERT INTO comments (entry_id, user_id, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![entry_id, user_id, text, at],
    )
    .unwrap();
    conn.last_insert_rowid()
}

/// `2024-01-01 00:MM:00.000` for minute `n`; later minutes sort later.
pub fn minute(n: u32) -> String {
    format!("2024-01-01 {:02}:{:02}:00.000", n / 60, n % 60)
}
