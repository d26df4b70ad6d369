//! Caller identity supplied by the authentication layer.

use serde::{Deserialize, Serialize};

/// Identity, scope and permissions of the caller of a feed operation.
///
/// Built by the authentication layer in front of the feed; the core trusts
/// these values and never re-validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: String,
    pub user_name: String,
    /// Name of the tenant scope (the concrete backing store) to read from.
    pub scope: String,
    pub permissions: Vec<String>,
    pub session_id: Option<String>,
}

impl CallerContext {
    pub fn new(user_id: impl Into<String>, scope: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            user_name: user_id.clone(),
            user_id,
            scope: scope.into(),
            permissions: Vec::new(),
            session_id: None,
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
