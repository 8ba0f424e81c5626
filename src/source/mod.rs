//! Identity source boundary.
//!
//! An identity source is the authoritative store that validates credentials
//! and supplies profile data. The authentication core only needs two things
//! from it:
//!
//! - **open a session**, either as the user being authenticated (the session
//!   itself is the proof) or as a configured technical account,
//! - **read the profile** bound to a session, optionally after switching the
//!   session to an external user identified by a password digest.
//!
//! Failures are split into [`SourceError::Rejected`] and
//! [`SourceError::Unavailable`] so providers can log them differently.

mod memory;
mod surreal;

pub use memory::{InMemorySource, MemoryAccount};
pub use surreal::{AccountCreate, AccountRecord, SurrealSource};

use crate::BoxFuture;
use crate::error::SourceError;
use crate::profile::{Credentials, UserProfile};
use crate::types::UserId;

/// Identity used to open a session.
#[derive(Debug, Clone, Copy)]
pub enum Login<'a> {
    /// The caller's own credentials; success authenticates the caller.
    User(&'a Credentials),
    /// A privileged technical account allowed to impersonate external users.
    Technical(&'a Credentials),
}

impl<'a> Login<'a> {
    pub fn credentials(&self) -> &'a Credentials {
        match self {
            Self::User(creds) | Self::Technical(creds) => creds,
        }
    }

    pub fn is_technical(&self) -> bool {
        matches!(self, Self::Technical(_))
    }
}

/// An open session against the identity source.
pub trait Session: Send {
    /// Read the profile of the identity the session currently acts as.
    fn current_profile(&mut self) -> BoxFuture<'_, Result<UserProfile, SourceError>>;

    /// Switch the session to an external user.
    ///
    /// `short_name` must already be normalized and `password_digest` is the
    /// one-way digest the source compares against its own record. Only
    /// sessions opened with [`Login::Technical`] may do this.
    fn impersonate_ext_user<'a>(
        &'a mut self,
        short_name: &'a str,
        password_digest: &'a str,
    ) -> BoxFuture<'a, Result<(), SourceError>>;

    /// Switch the session to the active account `user_id` and read its
    /// profile. Only sessions opened with [`Login::Technical`] may do this.
    fn profile_by_id<'a>(
        &'a mut self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<UserProfile, SourceError>>;
}

/// A backing store able to open sessions.
pub trait IdentitySource: Send + Sync {
    /// Human readable description for log lines (never contains secrets).
    fn describe(&self) -> String;

    /// Open a session with the given identity.
    fn open_session<'a>(
        &'a self,
        login: Login<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, SourceError>>;
}

/// Key under which sources store accounts: trimmed and upper-cased, the way
/// a relational store treats unquoted user names.
pub(crate) fn account_key(username: &str) -> String {
    username.trim().to_uppercase()
}

/// Read the profile of a known user through the technical account.
pub async fn fetch_profile(
    source: &dyn IdentitySource,
    technical: &Credentials,
    user_id: &UserId,
) -> Result<UserProfile, SourceError> {
    let mut session = source.open_session(Login::Technical(technical)).await?;
    session.profile_by_id(user_id).await
}
