use tokio::sync::OnceCell;

use crate::db::models::User;

/// Per-request state threaded through handlers.
///
/// Holds the session token presented by the client and, once resolved, the
/// user it belongs to, so that resolving the current user twice within one
/// request costs a single lookup.
#[derive(Debug)]
pub struct RequestContext {
    token: Option<String>,
    pub(crate) user: OnceCell<User>,
}

impl RequestContext {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            user: OnceCell::new(),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The user already resolved for this request, if any.
    pub fn resolved_user(&self) -> Option<&User> {
        self.user.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_has_no_user() {
        let ctx = RequestContext::new(Some("abc".into()));
        assert_eq!(ctx.token(), Some("abc"));
        assert!(ctx.resolved_user().is_none());
    }

    #[test]
    fn anonymous_context_has_no_token() {
        let ctx = RequestContext::new(None);
        assert!(ctx.token().is_none());
    }
}
