//! Diary entries and their comments.
//!
//! Entries are stored with title and content in a single body column,
//! separated by the first newline. Reading one back splits it again; a body
//! without a separator means the row is corrupt.

use serde::Serialize;

use crate::access::{PermissionGuard, Visibility};
use crate::db::models::{Comment, Entry, EntryRow};
use crate::error::{AppError, AppResult};
use crate::store::{SortOrder, SqliteStore};

pub const UNTITLED: &str = "(untitled)";

/// Split a stored body into `(title, content)` at the first newline.
pub fn split_body(body: &str) -> AppResult<(String, String)> {
    body.split_once('\n')
        .map(|(title, content)| (title.to_string(), content.to_string()))
        .ok_or_else(|| AppError::MalformedData("entry body has no title separator".into()))
}

/// Join a title and content into the stored body form.
pub fn join_body(title: &str, content: &str) -> String {
    format!("{title}\n{content}")
}

impl TryFrom<EntryRow> for Entry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> AppResult<Self> {
        let (title, content) = split_body(&row.body)
            .map_err(|_| AppError::MalformedData(format!("entry {} has no title line", row.id)))?;
        Ok(Entry {
            id: row.id,
            user_id: row.user_id,
            private: row.private,
            title,
            content,
            created_at: row.created_at,
        })
    }
}

pub fn entries_from_rows(rows: Vec<EntryRow>) -> AppResult<Vec<Entry>> {
    rows.into_iter().map(Entry::try_from).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryWithComments {
    pub entry: Entry,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    #[serde(flatten)]
    pub entry: Entry,
    pub comment_count: i64,
}

/// Entry operations with visibility enforced.
#[derive(Clone)]
pub struct Diary {
    store: SqliteStore,
    guard: PermissionGuard,
}

impl Diary {
    pub fn new(store: SqliteStore, guard: PermissionGuard) -> Self {
        Self { store, guard }
    }

    async fn load_entry(&self, entry_id: i64) -> AppResult<Entry> {
        self.store
            .entry_by_id(entry_id)
            .await?
            .ok_or(AppError::ContentNotFound)?
            .try_into()
    }

    /// An entry and its comments; private entries need the guard's approval.
    pub async fn entry(&self, viewer_id: i64, entry_id: i64) -> AppResult<EntryWithComments> {
        let entry = self.load_entry(entry_id).await?;
        self.guard
            .ensure_entry_visible(viewer_id, entry.user_id, entry.private)
            .await?;
        let comments = self.store.comments_for_entry(entry.id).await?;
        Ok(EntryWithComments { entry, comments })
    }

    /// The owner's entries as `viewer_id` is allowed to see them.
    pub async fn entries_of(
        &self,
        viewer_id: i64,
        owner_id: i64,
        order: SortOrder,
        limit: u32,
    ) -> AppResult<Vec<Entry>> {
        let visibility = self.guard.visibility(viewer_id, owner_id).await?;
        self.entries_with(owner_id, visibility, order, limit).await
    }

    /// The owner's entries under an already decided visibility.
    pub async fn entries_with(
        &self,
        owner_id: i64,
        visibility: Visibility,
        order: SortOrder,
        limit: u32,
    ) -> AppResult<Vec<Entry>> {
        let rows = self
            .store
            .entries_for_owner(owner_id, visibility.includes_private(), order, limit)
            .await?;
        entries_from_rows(rows)
    }

    /// Like [`Diary::entries_of`], with each entry's comment count.
    pub async fn summaries_of(
        &self,
        viewer_id: i64,
        owner_id: i64,
        limit: u32,
    ) -> AppResult<Vec<EntrySummary>> {
        let entries = self
            .entries_of(viewer_id, owner_id, SortOrder::NewestFirst, limit)
            .await?;
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            let comment_count = self.store.count_comments(entry.id).await?;
            summaries.push(EntrySummary {
                entry,
                comment_count,
            });
        }
        Ok(summaries)
    }

    pub async fn post_entry(
        &self,
        author_id: i64,
        title: &str,
        content: &str,
        private: bool,
    ) -> AppResult<i64> {
        let title = if title.is_empty() { UNTITLED } else { title };
        // The title line must not contain the separator itself
        let title = title.replace(['\r', '\n'], " ");
        Ok(self
            .store
            .insert_entry(author_id, private, &join_body(&title, content))
            .await?)
    }

    /// Comment on an entry the author is allowed to see.
    pub async fn post_comment(&self, author_id: i64, entry_id: i64, text: &str) -> AppResult<i64> {
        let entry = self.load_entry(entry_id).await?;
        self.guard
            .ensure_entry_visible(author_id, entry.user_id, entry.private)
            .await?;
        Ok(self.store.insert_comment(entry.id, author_id, text).await?)
    }
}
