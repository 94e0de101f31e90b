//! Authentication context and access policy hooks
//!
//! Concrete authentication providers live outside this crate; the registry
//! only needs the current user id and whether the session is still valid.

use std::fmt;

/// Authentication context consumed by the registry.
///
/// Token refresh happens out of band; the registry assumes the context stays
/// valid for the duration of an operation.
pub trait AuthProvider: Send + Sync {
    /// Authenticated user id.
    fn user_id(&self) -> Option<String>;

    /// Authenticated user email.
    fn user_email(&self) -> Option<String>;

    /// True if the session has expired.
    fn expired(&self) -> bool;
}

/// Per key + user capability check.
pub trait AccessPolicy: Send + Sync {
    /// May `user` write the experiment stored under `key`?
    fn can_write(&self, key: &str, user: &str) -> bool;

    /// May `user` read `path`?
    fn can_read(&self, path: &str, user: &str) -> bool;
}

/// Permissive policy: every user may read and write everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn can_write(&self, _key: &str, _user: &str) -> bool {
        true
    }

    fn can_read(&self, _path: &str, _user: &str) -> bool {
        true
    }
}

/// Fixed identity, for hosts that authenticate before opening the registry.
#[derive(Clone)]
pub struct StaticAuth {
    user_id: String,
    email: Option<String>,
}

impl StaticAuth {
    /// Create a context for `user_id`.
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }

    /// Set the user email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl fmt::Debug for StaticAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticAuth")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl AuthProvider for StaticAuth {
    fn user_id(&self) -> Option<String> {
        Some(self.user_id.clone())
    }

    fn user_email(&self) -> Option<String> {
        self.email.clone()
    }

    fn expired(&self) -> bool {
        false
    }
}
