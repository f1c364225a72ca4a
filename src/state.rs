use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::access::PermissionGuard;
use crate::cache::{FriendshipOracle, IdentityCache, SnapshotService};
use crate::config::Config;
use crate::diary::Diary;
use crate::footprint::FootprintTracker;
use crate::store::SqliteStore;
use crate::timeline::FeedAggregator;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Everything a request handler can reach. The caches live here, built once
/// at startup, instead of as globals.
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub config: Config,
    pub identities: IdentityCache,
    pub friends: FriendshipOracle,
    pub guard: PermissionGuard,
    pub footprints: FootprintTracker,
    pub diary: Diary,
    pub timeline: FeedAggregator,
    pub snapshots: SnapshotService,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config) -> Self {
        let store = SqliteStore::new(pool);
        let shared = Arc::new(store.clone());

        let identities = IdentityCache::new(shared.clone(), config.cache.ttl());
        let friends = FriendshipOracle::new(shared.clone(), shared);
        let guard = PermissionGuard::new(friends.clone());
        let footprints = FootprintTracker::new(store.clone());
        let diary = Diary::new(store.clone(), guard.clone());
        let timeline = FeedAggregator::new(store.clone(), identities.clone(), footprints.clone());
        let snapshots = SnapshotService::new(
            identities.clone(),
            config.cache.warm_user_count,
            config.cache.warm_concurrency,
        );

        Self {
            store,
            config,
            identities,
            friends,
            guard,
            footprints,
            diary,
            timeline,
            snapshots,
        }
    }

    /// Load the identity cache from the configured snapshot, keeping an
    /// empty cache when the snapshot cannot be used.
    pub async fn warm_or_empty(&self) -> usize {
        let path = self.config.snapshot_path();
        match self.snapshots.warm(&path).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!("Starting with an empty identity cache: {}", e);
                self.identities.replace_with(Vec::new());
                0
            }
        }
    }
}
