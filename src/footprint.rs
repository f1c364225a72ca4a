use chrono::{DateTime, Utc};

use crate::db::models::Footprint;
use crate::error::AppResult;
use crate::store::SqliteStore;

/// Last-seen record of who visited whose pages.
#[derive(Clone)]
pub struct FootprintTracker {
    store: SqliteStore,
}

impl FootprintTracker {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub async fn record_visit(&self, viewer_id: i64, owner_id: i64) -> AppResult<()> {
        self.record_visit_at(viewer_id, owner_id, Utc::now()).await
    }

    /// Self-visits are not tracked.
    pub async fn record_visit_at(
        &self,
        viewer_id: i64,
        owner_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if viewer_id == owner_id {
            return Ok(());
        }
        self.store.upsert_footprint(viewer_id, owner_id, at).await?;
        Ok(())
    }

    /// Most recent visitors of `owner_id`, newest first, one row per visitor.
    pub async fn recent_for(&self, owner_id: i64, limit: u32) -> AppResult<Vec<Footprint>> {
        Ok(self.store.footprints_for_owner(owner_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::format_timestamp;
    use crate::store::tests::{create_test_store, seed_user};
    use chrono::Duration;

    #[tokio::test]
    async fn test_self_visit_is_ignored() {
        let (store, _temp) = create_test_store();
        let alice = seed_user(&store, "alice").await;
        let tracker = FootprintTracker::new(store);

        tracker.record_visit(alice.id, alice.id).await.unwrap();
        assert!(tracker.recent_for(alice.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeat_visits_collapse_to_latest() {
        let (store, _temp) = create_test_store();
        let owner = seed_user(&store, "owner").await;
        let x = seed_user(&store, "xavier").await;
        let tracker = FootprintTracker::new(store);
        let first = Utc::now() - Duration::minutes(10);
        let second = first + Duration::minutes(5);

        tracker.record_visit_at(x.id, owner.id, first).await.unwrap();
        tracker.record_visit_at(x.id, owner.id, second).await.unwrap();

        let prints = tracker.recent_for(owner.id, 10).await.unwrap();
        assert_eq!(prints.len(), 1);
        assert_eq!(prints[0].viewer_id, x.id);
        assert_eq!(prints[0].owner_id, owner.id);
        assert_eq!(prints[0].created_at, format_timestamp(second));
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_limited() {
        let (store, _temp) = create_test_store();
        let owner = seed_user(&store, "owner").await;
        let mut visitors = Vec::new();
        for name in ["a", "b", "c"] {
            visitors.push(seed_user(&store, name).await);
        }
        let tracker = FootprintTracker::new(store);
        let base = Utc::now() - Duration::hours(1);
        for (i, visitor) in visitors.iter().enumerate() {
            tracker
                .record_visit_at(visitor.id, owner.id, base + Duration::minutes(i as i64))
                .await
                .unwrap();
        }
        // "a" comes back last
        tracker
            .record_visit_at(visitors[0].id, owner.id, base + Duration::minutes(30))
            .await
            .unwrap();

        let prints = tracker.recent_for(owner.id, 2).await.unwrap();
        let viewers: Vec<i64> = prints.iter().map(|p| p.viewer_id).collect();
        assert_eq!(viewers, vec![visitors[0].id, visitors[2].id]);
    }
}
