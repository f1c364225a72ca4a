use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::cache::identity::IdentityCache;
use crate::db::models::User;
use crate::error::{AppError, AppResult};

const SNAPSHOT_VERSION: u32 = 1;
const KEY_PREFIX: &str = "user-";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    items: BTreeMap<String, SnapshotItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotItem {
    user: User,
    expires_at: DateTime<Utc>,
}

fn cache_key(id: i64) -> String {
    format!("{KEY_PREFIX}{id}")
}

fn parse_key(key: &str) -> Option<i64> {
    key.strip_prefix(KEY_PREFIX)?.parse().ok()
}

/// Warm restart and persistence for the identity cache.
#[derive(Clone)]
pub struct SnapshotService {
    cache: IdentityCache,
    warm_user_count: i64,
    concurrency: usize,
    // Snapshot operations never overlap
    lock: Arc<Mutex<()>>,
}

impl SnapshotService {
    pub fn new(cache: IdentityCache, warm_user_count: i64, concurrency: usize) -> Self {
        Self {
            cache,
            warm_user_count,
            concurrency: concurrency.max(1),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Replace the active cache with the contents of the snapshot at `path`.
    /// Returns the number of entries loaded.
    pub async fn warm(&self, path: &Path) -> AppResult<usize> {
        let _guard = self.lock.lock().await;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::SnapshotUnavailable(format!("{}: {}", path.display(), e)))?;
        let file: SnapshotFile = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::SnapshotUnavailable(format!("{}: {}", path.display(), e)))?;
        if file.version != SNAPSHOT_VERSION {
            return Err(AppError::SnapshotUnavailable(format!(
                "unsupported snapshot version {}",
                file.version
            )));
        }

        let now = Utc::now();
        let mut entries = Vec::with_capacity(file.items.len());
        for (key, item) in file.items {
            if parse_key(&key) != Some(item.user.id) {
                return Err(AppError::SnapshotUnavailable(format!(
                    "key {key} does not match its user"
                )));
            }
            // Already expired entries are skipped
            if let Some(remaining) = remaining_ttl(item.expires_at, now) {
                entries.push((item.user, remaining));
            }
        }

        let count = entries.len();
        self.cache.replace_with(entries);
        tracing::info!("Loaded Cache: {} entries from {}", count, path.display());
        Ok(count)
    }

    /// Load the hot set of users through the cache, then persist every
    /// resident entry to `path`. Returns the number of entries written.
    pub async fn snapshot(&self, path: &Path) -> AppResult<usize> {
        let _guard = self.lock.lock().await;

        let cache = &self.cache;
        let loaded = futures::stream::iter(1..=self.warm_user_count)
            .map(|id| async move {
                match cache.get(id).await {
                    Ok(_) => Ok(1usize),
                    Err(AppError::ContentNotFound) => Ok(0),
                    Err(e) => Err(e),
                }
            })
            .buffer_unordered(self.concurrency)
            .try_fold(0usize, |total, hit| async move { Ok(total + hit) })
            .await?;
        tracing::debug!("Warmed {} users before snapshot", loaded);

        self.write(path).await
    }

    /// Persist the current cache contents without loading anything.
    pub async fn save(&self, path: &Path) -> AppResult<usize> {
        let _guard = self.lock.lock().await;
        self.write(path).await
    }

    async fn write(&self, path: &Path) -> AppResult<usize> {
        let expires_base = Utc::now();
        let items: BTreeMap<String, SnapshotItem> = self
            .cache
            .entries()
            .into_iter()
            .map(|(user, remaining)| {
                let remaining = chrono::Duration::from_std(remaining)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                (
                    cache_key(user.id),
                    SnapshotItem {
                        user,
                        expires_at: expires_base + remaining,
                    },
                )
            })
            .collect();
        let count = items.len();
        let json = serde_json::to_vec(&SnapshotFile {
            version: SNAPSHOT_VERSION,
            items,
        })?;

        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || write_atomically(&path, &json))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
            .map_err(|e| AppError::Internal(format!("writing snapshot: {e}")))?;

        tracing::info!("Saved Cache: {}", count);
        Ok(count)
    }
}

/// Write via a sibling temp file and rename, so readers see old or new, never half.
fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// How long a snapshot entry would live if loaded now; `None` once expired.
pub fn remaining_ttl(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (expires_at - now).to_std().ok().filter(|d| !d.is_zero())
}
