//! Authentication strategies.
//!
//! Every strategy is exposed to callers as an [`AuthenticationProvider`].
//! Strategies that validate a username/password pair against an identity
//! source implement [`PasswordAuthenticator`] instead and are wrapped in a
//! [`CredentialCache`](crate::cache::CredentialCache), which supplies the
//! provider side.

mod direct;
mod extuser;
mod mock;
mod passthrough;

pub use direct::DirectLogin;
pub use extuser::{ExtUserLogin, ext_user_digest, normalize_username};
pub use mock::MockProvider;
pub use passthrough::{GENERIC_SESSION_TOKEN, Passthrough};

use crate::BoxFuture;
use crate::error::AuthError;
use crate::profile::{AuthResult, Credentials};

/// Shape of an incoming authentication request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Request carrying a username and password.
    UsernamePassword,
    /// Request carrying nothing at all.
    Anonymous,
}

/// A named unit of logic turning credentials into an authenticated identity.
pub trait AuthenticationProvider: Send + Sync {
    /// Short name used in log lines (e.g. "extuser").
    fn name(&self) -> &str;

    /// Whether this provider can handle requests of the given shape.
    fn supports(&self, kind: RequestKind) -> bool {
        kind == RequestKind::UsernamePassword
    }

    /// Authenticate the given credentials.
    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>>;
}

/// The uncached validation step of a username/password strategy.
pub trait PasswordAuthenticator: Send + Sync {
    fn name(&self) -> &str;

    /// Validate `credentials` against the identity source, without caching.
    fn do_authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>>;
}
