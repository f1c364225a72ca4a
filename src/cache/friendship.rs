use dashmap::DashSet;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::store::{DynFriendshipStore, DynIdentityStore};

/// Order a pair so both directions of a friendship share one key.
pub fn canonical_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

struct Inner {
    relations: DynFriendshipStore,
    identities: DynIdentityStore,
    // Only positive answers are remembered; friendships are never revoked.
    known: DashSet<(i64, i64)>,
}

/// Answers "are these two users friends?" with a positive-only cache.
#[derive(Clone)]
pub struct FriendshipOracle {
    inner: Arc<Inner>,
}

impl FriendshipOracle {
    pub fn new(relations: DynFriendshipStore, identities: DynIdentityStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                relations,
                identities,
                known: DashSet::new(),
            }),
        }
    }

    pub async fn is_friend(&self, user_id: i64, other_id: i64) -> AppResult<bool> {
        let key = canonical_pair(user_id, other_id);
        if self.inner.known.contains(&key) {
            return Ok(true);
        }

        let (one, another) = key;
        let exists = self.inner.relations.relation_exists(one, another).await?;
        if exists {
            self.inner.known.insert(key);
        }
        Ok(exists)
    }

    pub async fn is_friend_by_account_name(
        &self,
        user_id: i64,
        account_name: &str,
    ) -> AppResult<bool> {
        let other = self
            .inner
            .identities
            .user_by_account_name(account_name)
            .await?
            .ok_or(AppError::ContentNotFound)?;
        self.is_friend(user_id, other.id).await
    }

    /// Befriend `a` and `b`. Returns `false` when they already were friends.
    pub async fn create_friendship(&self, a: i64, b: i64) -> AppResult<bool> {
        if a == b {
            return Err(AppError::BadRequest("cannot befriend yourself".into()));
        }
        if self.is_friend(a, b).await? {
            return Ok(false);
        }

        self.inner.relations.insert_relation_pair(a, b).await?;
        self.inner.known.insert(canonical_pair(a, b));
        tracing::info!("Friendship created between {} and {}", a, b);
        Ok(true)
    }

    /// Forget every cached answer, e.g. after relations were truncated.
    pub fn clear(&self) {
        self.inner.known.clear();
    }

    pub fn cached_pairs(&self) -> usize {
        self.inner.known.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::identity::tests::CountingStore;
    use crate::store::{FriendshipStore, StoreError};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryRelations {
        rows: Mutex<HashSet<(i64, i64)>>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl FriendshipStore for MemoryRelations {
        async fn relation_exists(&self, one: i64, another: i64) -> Result<bool, StoreError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.lock().unwrap().contains(&(one, another)))
        }

        async fn insert_relation_pair(&self, a: i64, b: i64) -> Result<usize, StoreError> {
            let mut rows = self.rows.lock().unwrap();
            Ok(usize::from(rows.insert((a, b))) + usize::from(rows.insert((b, a))))
        }
    }

    fn oracle() -> (FriendshipOracle, Arc<MemoryRelations>) {
        let relations = Arc::new(MemoryRelations::default());
        let identities = Arc::new(CountingStore::with_users([1, 2, 3]));
        (FriendshipOracle::new(relations.clone(), identities), relations)
    }

    #[test]
    fn canonical_pair_orders_ids() {
        assert_eq!(canonical_pair(5, 2), (2, 5));
        assert_eq!(canonical_pair(2, 5), (2, 5));
        assert_eq!(canonical_pair(3, 3), (3, 3));
    }

    #[tokio::test]
    async fn test_negative_answers_are_not_cached() {
        let (oracle, relations) = oracle();

        assert!(!oracle.is_friend(1, 2).await.unwrap());
        assert!(!oracle.is_friend(1, 2).await.unwrap());
        assert_eq!(relations.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(oracle.cached_pairs(), 0);
    }

    #[tokio::test]
    async fn test_positive_answers_are_cached_for_both_directions() {
        let (oracle, relations) = oracle();
        relations.insert_relation_pair(2, 1).await.unwrap();

        assert!(oracle.is_friend(2, 1).await.unwrap());
        assert!(oracle.is_friend(1, 2).await.unwrap());
        assert_eq!(relations.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_friendship_is_visible_immediately() {
        let (oracle, relations) = oracle();

        assert!(!oracle.is_friend(1, 2).await.unwrap());
        assert!(oracle.create_friendship(1, 2).await.unwrap());
        assert!(oracle.is_friend(1, 2).await.unwrap());
        assert!(oracle.is_friend(2, 1).await.unwrap());

        // Second call is a no-op
        assert!(!oracle.create_friendship(2, 1).await.unwrap());
        assert_eq!(relations.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_self_friendship_rejected() {
        let (oracle, _) = oracle();
        assert!(matches!(
            oracle.create_friendship(1, 1).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_by_account_name() {
        let (oracle, _) = oracle();
        oracle.create_friendship(1, 3).await.unwrap();

        assert!(oracle.is_friend_by_account_name(1, "user3").await.unwrap());
        assert!(!oracle.is_friend_by_account_name(1, "user2").await.unwrap());
        assert!(matches!(
            oracle.is_friend_by_account_name(1, "ghost").await,
            Err(AppError::ContentNotFound)
        ));
    }

    #[tokio::test]
    async fn test_clear_forgets_cached_pairs() {
        let (oracle, relations) = oracle();
        oracle.create_friendship(1, 2).await.unwrap();
        relations.rows.lock().unwrap().clear();

        assert!(oracle.is_friend(1, 2).await.unwrap(), "still cached");
        oracle.clear();
        assert!(!oracle.is_friend(1, 2).await.unwrap());
    }
}
