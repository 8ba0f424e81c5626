//! Credentials and authenticated identity values.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::types::{ROLE_USER, Role, Secret, ShortName, UserId};

/// Username/password pair presented by a caller.
///
/// Created per authentication request and dropped right after; the password
/// is wiped from memory on drop and redacted from `Debug`.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: String,
    password: Secret,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }
}

/// Profile of an authenticated user as read from the identity source.
///
/// Immutable once created. Equality and hashing use `user_id` only, and the
/// session token never appears in `Debug` or `Display` output.
#[derive(Clone)]
pub struct UserProfile {
    user_id: UserId,
    short_name: ShortName,
    full_name: String,
    session_token: Secret,
}

impl UserProfile {
    /// Create a new user profile.
    pub fn new(
        user_id: UserId,
        short_name: ShortName,
        full_name: impl Into<String>,
        session_token: Secret,
    ) -> Self {
        Self {
            user_id,
            short_name,
            full_name: full_name.into(),
            session_token,
        }
    }

    /// Return a copy of this profile carrying a different session token.
    pub fn with_session_token(mut self, session_token: Secret) -> Self {
        self.session_token = session_token;
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn short_name(&self) -> &ShortName {
        &self.short_name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Token that lets a downstream service act in this user's context.
    pub fn session_token(&self) -> &Secret {
        &self.session_token
    }
}

impl PartialEq for UserProfile {
    fn eq(&self, other: &Self) -> bool {
        self.user_id == other.user_id
    }
}

impl Eq for UserProfile {}

impl Hash for UserProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.user_id.hash(state);
    }
}

impl fmt::Debug for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserProfile")
            .field("user_id", &self.user_id)
            .field("short_name", &self.short_name)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for UserProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, id {})", self.full_name, self.short_name, self.user_id)
    }
}

/// Outcome of one successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    profile: UserProfile,
    granted_roles: BTreeSet<Role>,
}

impl AuthResult {
    pub fn new(profile: UserProfile, granted_roles: BTreeSet<Role>) -> Self {
        Self {
            profile,
            granted_roles,
        }
    }

    /// Result granting the standard `ROLE_USER` role.
    pub fn user(profile: UserProfile) -> Self {
        Self::new(profile, BTreeSet::from([Role::new(ROLE_USER)]))
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn granted_roles(&self) -> &BTreeSet<Role> {
        &self.granted_roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.granted_roles.contains(role)
    }

    /// Name of the authenticated principal (the short name).
    pub fn name(&self) -> &str {
        self.profile.short_name.as_str()
    }
}
