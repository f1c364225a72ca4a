use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{SqliteStore, StoreError};
use crate::db::format_timestamp;
use crate::db::models::{
    Comment, EntryRow, Footprint, Friend, Profile, ProfileUpdate,
};

/// Ordering of an entry listing by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}

const ENTRY_COLUMNS: &str = "id, user_id, private, body, created_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        private: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        user_id: row.get(2)?,
        comment: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl SqliteStore {
    // -- Profiles --

    pub async fn profile(&self, user_id: i64) -> Result<Option<Profile>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT user_id, first_name, last_name, sex, birthday, pref, updated_at
                     FROM profiles WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(Profile {
                            user_id: row.get(0)?,
                            first_name: row.get(1)?,
                            last_name: row.get(2)?,
                            sex: row.get(3)?,
                            birthday: row.get(4)?,
                            pref: row.get(5)?,
                            updated_at: row.get(6)?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let birthday = update.birthday.filter(|b| !b.is_empty());
            conn.execute(
                "INSERT INTO profiles (user_id, first_name, last_name, sex, birthday, pref, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, strftime('%Y-%m-%d %H:%M:%f', 'now'))
                 ON CONFLICT(user_id) DO UPDATE SET
                   first_name = excluded.first_name,
                   last_name = excluded.last_name,
                   sex = excluded.sex,
                   birthday = excluded.birthday,
                   pref = excluded.pref,
                   updated_at = excluded.updated_at",
                params![
                    user_id,
                    update.first_name,
                    update.last_name,
                    update.sex,
                    birthday,
                    update.pref
                ],
            )?;
            Ok(())
        })
        .await
    }

    // -- Entries --

    pub async fn entry_by_id(&self, id: i64) -> Result<Option<EntryRow>, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                    params![id],
                    entry_from_row,
                )
                .optional()?)
        })
        .await
    }

    /// Entries of `owner`, optionally hiding private ones.
    pub async fn entries_for_owner(
        &self,
        owner: i64,
        include_private: bool,
        order: SortOrder,
        limit: u32,
    ) -> Result<Vec<EntryRow>, StoreError> {
        self.with_conn(move |conn| {
            let direction = match order {
                SortOrder::OldestFirst => "ASC",
                SortOrder::NewestFirst => "DESC",
            };
            let visibility = if include_private { "" } else { "AND private = 0" };
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE user_id = ?1 {visibility}
                 ORDER BY created_at {direction}, id {direction}
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![owner, limit], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// The newest `limit` entries of `owner`, emitted oldest-first.
    pub async fn recent_entries_oldest_first(
        &self,
        owner: i64,
        limit: u32,
    ) -> Result<Vec<EntryRow>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM (
                     SELECT {ENTRY_COLUMNS} FROM entries
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2
                 ) ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map(params![owner, limit], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Newest entries written by anyone `user` is related to as `one`.
    pub async fn friends_entries(
        &self,
        user: i64,
        limit: u32,
    ) -> Result<Vec<EntryRow>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.user_id, e.private, e.body, e.created_at
                 FROM entries e
                 JOIN relations r ON e.user_id = r.another
                 WHERE r.one = ?1
                 ORDER BY e.created_at DESC, e.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user, limit], entry_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn insert_entry(
        &self,
        user_id: i64,
        private: bool,
        body: &str,
    ) -> Result<i64, StoreError> {
        let body = body.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO entries (user_id, private, body) VALUES (?1, ?2, ?3)",
                params![user_id, private, body],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    // -- Comments --

    pub async fn comments_for_entry(&self, entry_id: i64) -> Result<Vec<Comment>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entry_id, user_id, comment, created_at FROM comments
                 WHERE entry_id = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![entry_id], comment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn count_comments(&self, entry_id: i64) -> Result<i64, StoreError> {
        self.with_conn(move |conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE entry_id = ?1",
                params![entry_id],
                |row| row.get(0),
            )?)
        })
        .await
    }

    /// Newest comments left on any of `owner`'s entries.
    pub async fn comments_received(
        &self,
        owner: i64,
        limit: u32,
    ) -> Result<Vec<Comment>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.entry_id, c.user_id, c.comment, c.created_at
                 FROM comments c
                 JOIN entries e ON c.entry_id = e.id
                 WHERE e.user_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![owner, limit], comment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    /// Newest comments written by `user`'s friends that `user` may read.
    /// A comment on a private entry counts only when the entry is the
    /// user's own or its owner is the user's friend.
    pub async fn friends_comments_visible(
        &self,
        user: i64,
        limit: u32,
    ) -> Result<Vec<Comment>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.entry_id, c.user_id, c.comment, c.created_at
                 FROM comments c
                 JOIN relations r ON c.user_id = r.another
                 JOIN entries e ON c.entry_id = e.id
                 WHERE r.one = ?1
                   AND (e.private = 0
                        OR e.user_id = ?1
                        OR EXISTS (SELECT 1 FROM relations v
                                   WHERE v.one = ?1 AND v.another = e.user_id))
                 ORDER BY c.created_at DESC, c.id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![user, limit], comment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    pub async fn insert_comment(
        &self,
        entry_id: i64,
        user_id: i64,
        comment: &str,
    ) -> Result<i64, StoreError> {
        let comment = comment.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO comments (entry_id, user_id, comment) VALUES (?1, ?2, ?3)",
                params![entry_id, user_id, comment],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    // -- Relations --

    /// Every outgoing edge of `user`, oldest first.
    pub async fn friend_edges(&self, user: i64) -> Result<Vec<Friend>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT another, created_at FROM relations
                 WHERE one = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![user], |row| {
                    Ok(Friend {
                        id: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    // -- Footprints --

    /// Record `viewer` visiting `owner` at `at`, replacing any earlier visit.
    pub async fn upsert_footprint(
        &self,
        viewer: i64,
        owner: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at = format_timestamp(at);
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO footprints (viewer_id, owner_id, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(viewer_id, owner_id) DO UPDATE SET
                   created_at = MAX(footprints.created_at, excluded.created_at)",
                params![viewer, owner, at],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn footprints_for_owner(
        &self,
        owner: i64,
        limit: u32,
    ) -> Result<Vec<Footprint>, StoreError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT viewer_id, owner_id, created_at FROM footprints
                 WHERE owner_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )?;
            let rows = stmt
                .query_map(params![owner, limit], |row| {
                    Ok(Footprint {
                        viewer_id: row.get(0)?,
                        owner_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}
