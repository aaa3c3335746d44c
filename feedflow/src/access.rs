//! Capability checks.
//!
//! Authorization decisions take an explicit [`Actor`] and resolve it against
//! an owned resource into an [`Access`] set, instead of special-casing a
//! privileged username.

use serde::{Deserialize, Serialize};

/// The user on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The username, or `None` for an anonymous caller.
    pub username: Option<String>,
    /// Whether the user may act on every resource.
    #[serde(default)]
    pub is_superuser: bool,
    /// Resources (e.g. folder paths) the user was granted write permission on.
    #[serde(default)]
    pub write_grants: Vec<String>,
}

impl Actor {
    /// Creates an authenticated, unprivileged actor.
    #[must_use]
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            is_superuser: false,
            write_grants: Vec::new(),
        }
    }

    /// Creates a superuser actor.
    #[must_use]
    pub fn superuser(username: impl Into<String>) -> Self {
        Self {
            is_superuser: true,
            ..Self::user(username)
        }
    }

    /// Creates an anonymous actor.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            username: None,
            is_superuser: false,
            write_grants: Vec::new(),
        }
    }

    /// Adds a write grant.
    #[must_use]
    pub fn with_write_grant(mut self, resource: impl Into<String>) -> Self {
        self.write_grants.push(resource.into());
        self
    }

    /// Returns true if the actor is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    /// Returns true if the actor is the named user.
    #[must_use]
    pub fn is(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }

    /// Resolves the actor's capabilities on a resource.
    #[must_use]
    pub fn access_to(&self, owner: Option<&str>, resource: &str) -> Access {
        Access {
            is_owner: owner.is_some_and(|o| self.is(o)),
            is_superuser: self.is_superuser,
            has_write_permission: self.write_grants.iter().any(|g| g == resource),
        }
    }
}

/// An actor's capabilities on one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// The actor owns the resource.
    pub is_owner: bool,
    /// The actor is a superuser.
    pub is_superuser: bool,
    /// The actor was granted write permission on the resource.
    pub has_write_permission: bool,
}

impl Access {
    /// Owner or superuser.
    #[must_use]
    pub fn can_administer(&self) -> bool {
        self.is_owner || self.is_superuser
    }

    /// Owner, superuser, or explicit write grant.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.can_administer() || self.has_write_permission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_access() {
        let access = Actor::user("foo").access_to(Some("foo"), "home/foo");
        assert!(access.is_owner);
        assert!(access.can_administer());
        assert!(access.can_write());
    }

    #[test]
    fn test_write_grant_does_not_administer() {
        let actor = Actor::user("bar").with_write_grant("home/foo");
        let access = actor.access_to(Some("foo"), "home/foo");

        assert!(!access.can_administer());
        assert!(access.can_write());
    }

    #[test]
    fn test_superuser_is_not_a_username() {
        let access = Actor::user("chris").access_to(Some("foo"), "home/foo");
        assert!(!access.can_write());

        let access = Actor::superuser("admin").access_to(Some("foo"), "home/foo");
        assert!(access.can_administer());
    }

    #[test]
    fn test_anonymous_owns_nothing() {
        let actor = Actor::anonymous();
        assert!(!actor.is_authenticated());
        assert!(!actor.access_to(None, "x").is_owner);
    }
}
