use crate::cache::FriendshipOracle;
use crate::error::{AppError, AppResult};

/// Which of an owner's entries a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    PublicOnly,
}

impl Visibility {
    pub fn includes_private(self) -> bool {
        self == Visibility::All
    }
}

/// Decides whether a viewer may see an owner's private content: only the
/// owner and confirmed friends may.
#[derive(Clone)]
pub struct PermissionGuard {
    friends: FriendshipOracle,
}

impl PermissionGuard {
    pub fn new(friends: FriendshipOracle) -> Self {
        Self { friends }
    }

    pub async fn can_view(&self, viewer_id: i64, owner_id: i64) -> AppResult<bool> {
        if viewer_id == owner_id {
            return Ok(true);
        }
        self.friends.is_friend(viewer_id, owner_id).await
    }

    pub async fn visibility(&self, viewer_id: i64, owner_id: i64) -> AppResult<Visibility> {
        Ok(if self.can_view(viewer_id, owner_id).await? {
            Visibility::All
        } else {
            Visibility::PublicOnly
        })
    }

    /// Fail with `PermissionDenied` when the viewer may not see an entry.
    pub async fn ensure_entry_visible(
        &self,
        viewer_id: i64,
        owner_id: i64,
        private: bool,
    ) -> AppResult<()> {
        if private && !self.can_view(viewer_id, owner_id).await? {
            return Err(AppError::PermissionDenied);
        }
        Ok(())
    }
}
