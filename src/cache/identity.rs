use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::auth::context::RequestContext;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::store::DynIdentityStore;

#[derive(Debug, Clone)]
struct CachedUser {
    user: User,
    expires_at: Instant,
}

struct Inner {
    store: DynIdentityStore,
    ttl: Duration,
    // Swapped wholesale on warm restart; individual reads and writes go to the sharded map.
    entries: RwLock<Arc<DashMap<i64, CachedUser>>>,
}

/// Process-wide cache of `User` rows keyed by id.
///
/// Entries expire a fixed `ttl` after they were stored, regardless of how
/// often they are read. Callers always receive owned copies.
#[derive(Clone)]
pub struct IdentityCache {
    inner: Arc<Inner>,
}

impl IdentityCache {
    pub fn new(store: DynIdentityStore, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                ttl,
                entries: RwLock::new(Arc::new(DashMap::new())),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    fn map(&self) -> Arc<DashMap<i64, CachedUser>> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lookup(&self, id: i64) -> Option<User> {
        let map = self.map();
        let cached = map.get(&id)?;
        if cached.expires_at > Instant::now() {
            Some(cached.user.clone())
        } else {
            None
        }
    }

    /// Fetch a user, loading and caching it on a miss.
    ///
    /// Two concurrent misses for the same id may both reach the store; the
    /// later write wins, which is harmless because both carry the same row.
    pub async fn get(&self, id: i64) -> AppResult<User> {
        if let Some(user) = self.lookup(id) {
            return Ok(user);
        }

        tracing::debug!(user_id = id, "identity cache miss");
        let user = self
            .inner
            .store
            .user_by_id(id)
            .await?
            .ok_or(AppError::ContentNotFound)?;
        self.insert(user.clone());
        Ok(user)
    }

    /// Resolve the user behind the request's session.
    pub async fn get_by_session(&self, ctx: &RequestContext) -> AppResult<User> {
        let token = ctx.token().ok_or(AppError::AuthenticationFailed)?;
        ctx.user
            .get_or_try_init(|| async {
                let user_id = self
                    .inner
                    .store
                    .user_id_for_session(token)
                    .await?
                    .ok_or(AppError::AuthenticationFailed)?;
                match self.get(user_id).await {
                    // The session outlived its user
                    Err(AppError::ContentNotFound) => Err(AppError::AuthenticationFailed),
                    other => other,
                }
            })
            .await
            .cloned()
    }

    pub fn insert(&self, user: User) {
        self.insert_with_ttl(user, self.inner.ttl);
    }

    fn insert_with_ttl(&self, user: User, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.map().insert(user.id, CachedUser { user, expires_at });
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unexpired entries with the time each has left to live.
    pub fn entries(&self) -> Vec<(User, Duration)> {
        let now = Instant::now();
        self.map()
            .iter()
            .filter_map(|entry| {
                let remaining = entry.expires_at.checked_duration_since(now)?;
                (!remaining.is_zero()).then(|| (entry.user.clone(), remaining))
            })
            .collect()
    }

    /// Atomically replace the whole cache with `entries`.
    pub fn replace_with(&self, entries: Vec<(User, Duration)>) {
        let now = Instant::now();
        let fresh = DashMap::with_capacity(entries.len());
        for (user, remaining) in entries {
            fresh.insert(
                user.id,
                CachedUser {
                    user,
                    expires_at: now + remaining,
                },
            );
        }
        *self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(fresh);
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let map = self.map();
        let before = map.len();
        map.retain(|_, cached| cached.expires_at > now);
        before.saturating_sub(map.len())
    }

    /// Periodically purge expired entries until the returned handle is aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            // The first tick fires immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let purged = cache.purge_expired();
                if purged > 0 {
                    tracing::debug!("Purged {} expired identity cache entries", purged);
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::{IdentityStore, StoreError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory identity store that counts round trips.
    #[derive(Default)]
    pub(crate) struct CountingStore {
        pub users: HashMap<i64, User>,
        pub sessions: HashMap<String, i64>,
        pub user_lookups: AtomicUsize,
        pub session_lookups: AtomicUsize,
    }

    impl CountingStore {
        pub fn with_users(ids: impl IntoIterator<Item = i64>) -> Self {
            let users = ids
                .into_iter()
                .map(|id| {
                    (
                        id,
                        User {
                            id,
                            account_name: format!("user{id}"),
                            nick_name: format!("User {id}"),
                            email: format!("user{id}@example.com"),
                        },
                    )
                })
                .collect();
            Self {
                users,
                ..Default::default()
            }
        }

        pub fn user_lookups(&self) -> usize {
            self.user_lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityStore for CountingStore {
        async fn user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
            self.user_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.users.get(&id).cloned())
        }

        async fn user_by_account_name(&self, name: &str) -> Result<Option<User>, StoreError> {
            Ok(self
                .users
                .values()
                .find(|u| u.account_name == name)
                .cloned())
        }

        async fn user_id_for_session(&self, token: &str) -> Result<Option<i64>, StoreError> {
            self.session_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.sessions.get(token).copied())
        }
    }

    fn cache_over(store: &Arc<CountingStore>, ttl: Duration) -> IdentityCache {
        IdentityCache::new(store.clone(), ttl)
    }

    #[tokio::test]
    async fn test_hit_skips_store() {
        let store = Arc::new(CountingStore::with_users([1, 2]));
        let cache = cache_over(&store, Duration::from_secs(60));

        let first = cache.get(1).await.unwrap();
        let second = cache.get(1).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.user_lookups(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let store = Arc::new(CountingStore::with_users([1]));
        let cache = cache_over(&store, Duration::ZERO);

        cache.get(1).await.unwrap();
        cache.get(1).await.unwrap();
        assert_eq!(store.user_lookups(), 2);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let store = Arc::new(CountingStore::with_users([1]));
        let cache = cache_over(&store, Duration::from_secs(60));

        assert!(matches!(cache.get(7).await, Err(AppError::ContentNotFound)));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_returned_copy_does_not_alias_cache() {
        let store = Arc::new(CountingStore::with_users([1]));
        let cache = cache_over(&store, Duration::from_secs(60));

        let mut user = cache.get(1).await.unwrap();
        user.nick_name = "mutated".into();
        assert_eq!(cache.get(1).await.unwrap().nick_name, "User 1");
    }

    #[tokio::test]
    async fn test_session_resolved_once_per_request() {
        let mut store = CountingStore::with_users([1]);
        store.sessions.insert("tok".into(), 1);
        let store = Arc::new(store);
        let cache = cache_over(&store, Duration::from_secs(60));

        let ctx = RequestContext::new(Some("tok".into()));
        assert_eq!(cache.get_by_session(&ctx).await.unwrap().id, 1);
        assert_eq!(cache.get_by_session(&ctx).await.unwrap().id, 1);
        assert_eq!(store.session_lookups.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.resolved_user().map(|u| u.id), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_session_fails_authentication() {
        let mut store = CountingStore::with_users([1]);
        store.sessions.insert("orphan".into(), 99);
        let store = Arc::new(store);
        let cache = cache_over(&store, Duration::from_secs(60));

        let ctx = RequestContext::new(Some("nope".into()));
        assert!(matches!(
            cache.get_by_session(&ctx).await,
            Err(AppError::AuthenticationFailed)
        ));
        let ctx = RequestContext::new(Some("orphan".into()));
        assert!(matches!(
            cache.get_by_session(&ctx).await,
            Err(AppError::AuthenticationFailed)
        ));
        let ctx = RequestContext::new(None);
        assert!(matches!(
            cache.get_by_session(&ctx).await,
            Err(AppError::AuthenticationFailed)
        ));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = Arc::new(CountingStore::with_users([1, 2]));
        let cache = cache_over(&store, Duration::from_secs(60));

        cache.get(1).await.unwrap();
        cache.insert_with_ttl(store.users[&2].clone(), Duration::ZERO);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_replace_with_swaps_contents() {
        let store = Arc::new(CountingStore::with_users([1, 2]));
        let cache = cache_over(&store, Duration::from_secs(60));
        cache.get(1).await.unwrap();

        let replacement = vec![(store.users[&2].clone(), Duration::from_secs(30))];
        cache.replace_with(replacement);

        assert_eq!(cache.len(), 1);
        cache.get(2).await.unwrap();
        assert_eq!(store.user_lookups(), 1, "user 2 came from the replacement");
    }

    #[tokio::test]
    async fn test_concurrent_gets_agree() {
        let store = Arc::new(CountingStore::with_users(1..=20));
        let cache = cache_over(&store, Duration::from_secs(60));

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(i % 20 + 1).await })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let user = handle.await.unwrap().unwrap();
            assert_eq!(user.id, (i as i64) % 20 + 1);
        }
        assert_eq!(cache.len(), 20);
    }
}
