//! # The home timeline
//!
//! A user's home page bundles six independent views: their own latest
//! entries, comments left on them, what friends wrote, what friends said,
//! the friend list and recent visitors. Each view is one ordered store query;
//! the queries run concurrently and each observes the store at its own point
//! in time, so the bundle as a whole is only eventually consistent.

use serde::Serialize;
use std::collections::HashSet;

use crate::cache::IdentityCache;
use crate::db::models::{Comment, Entry, Footprint, Friend, Profile, User};
use crate::diary::entries_from_rows;
use crate::error::AppResult;
use crate::footprint::FootprintTracker;
use crate::store::SqliteStore;

pub const OWN_ENTRIES_LIMIT: u32 = 5;
pub const COMMENTS_FOR_ME_LIMIT: u32 = 10;
pub const FRIENDS_ENTRIES_LIMIT: u32 = 10;
pub const FRIENDS_COMMENTS_LIMIT: u32 = 10;
pub const FOOTPRINTS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct TimelineView {
    pub user: User,
    pub profile: Option<Profile>,
    /// Newest five, oldest first.
    pub entries: Vec<Entry>,
    pub comments_for_me: Vec<Comment>,
    pub entries_of_friends: Vec<Entry>,
    pub comments_of_friends: Vec<Comment>,
    pub friends: Vec<Friend>,
    pub footprints: Vec<Footprint>,
}

/// Keep each friend once with the first edge seen, then order newest first
/// (ties by id). `edges` must arrive oldest first, so the kept edge is the
/// earliest one.
pub fn dedup_friends(edges: Vec<Friend>) -> Vec<Friend> {
    let mut seen = HashSet::with_capacity(edges.len());
    let mut friends: Vec<Friend> = edges.into_iter().filter(|f| seen.insert(f.id)).collect();
    friends.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
    friends
}

#[derive(Clone)]
pub struct FeedAggregator {
    store: SqliteStore,
    identities: IdentityCache,
    footprints: FootprintTracker,
}

impl FeedAggregator {
    pub fn new(
        store: SqliteStore,
        identities: IdentityCache,
        footprints: FootprintTracker,
    ) -> Self {
        Self {
            store,
            identities,
            footprints,
        }
    }

    pub async fn build_home_timeline(&self, user_id: i64) -> AppResult<TimelineView> {
        let user = self.identities.get(user_id).await?;

        let (
            profile,
            entries,
            comments_for_me,
            entries_of_friends,
            comments_of_friends,
            friends,
            footprints,
        ) = tokio::try_join!(
            self.profile(user_id),
            self.own_entries(user_id),
            self.comments_for_me(user_id),
            self.entries_of_friends(user_id),
            self.comments_of_friends(user_id),
            self.friends(user_id),
            self.footprints.recent_for(user_id, FOOTPRINTS_LIMIT),
        )?;

        Ok(TimelineView {
            user,
            profile,
            entries,
            comments_for_me,
            entries_of_friends,
            comments_of_friends,
            friends,
            footprints,
        })
    }

    async fn profile(&self, user_id: i64) -> AppResult<Option<Profile>> {
        Ok(self.store.profile(user_id).await?)
    }

    async fn own_entries(&self, user_id: i64) -> AppResult<Vec<Entry>> {
        let rows = self
            .store
            .recent_entries_oldest_first(user_id, OWN_ENTRIES_LIMIT)
            .await?;
        entries_from_rows(rows)
    }

    async fn comments_for_me(&self, user_id: i64) -> AppResult<Vec<Comment>> {
        Ok(self
            .store
            .comments_received(user_id, COMMENTS_FOR_ME_LIMIT)
            .await?)
    }

    async fn entries_of_friends(&self, user_id: i64) -> AppResult<Vec<Entry>> {
        let rows = self
            .store
            .friends_entries(user_id, FRIENDS_ENTRIES_LIMIT)
            .await?;
        entries_from_rows(rows)
    }

    /// Newest comments by friends, leaving out those on private entries
    /// the viewer may not read. The rule is applied inside the query.
    async fn comments_of_friends(&self, user_id: i64) -> AppResult<Vec<Comment>> {
        Ok(self
            .store
            .friends_comments_visible(user_id, FRIENDS_COMMENTS_LIMIT)
            .await?)
    }

    pub async fn friends(&self, user_id: i64) -> AppResult<Vec<Friend>> {
        let edges = self.store.friend_edges(user_id).await?;
        Ok(dedup_friends(edges))
    }
}
