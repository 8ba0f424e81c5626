//! External-user login.
//!
//! The identity source keeps, for each external user, a digest of the
//! password rather than a database login. We connect as a technical account
//! and ask the source to switch the session to the external user, handing
//! over the same digest the source computed when the password was set. The
//! source compares digests on its side, so the transform must match exactly:
//!
//! ```text
//! name   = trim(username).to_uppercase()
//! digest = base64(sha512(trim(password) ++ name))
//! ```

use std::sync::Arc;

use base64::Engine;
use sha2::{Digest, Sha512};
use tracing::debug;

use super::PasswordAuthenticator;
use super::direct::login_failed;
use crate::BoxFuture;
use crate::error::{AuthError, SourceError};
use crate::profile::{AuthResult, Credentials, UserProfile};
use crate::source::{IdentitySource, Login};

/// Normalize a username the way the identity source stores external users.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_uppercase()
}

/// Compute the external-user password digest for `username` and `password`.
pub fn ext_user_digest(username: &str, password: &str) -> String {
    let mut hasher = Sha512::new();
    hasher.update(password.trim().as_bytes());
    hasher.update(normalize_username(username).as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Authenticates external users through a technical-account session.
pub struct ExtUserLogin {
    source: Arc<dyn IdentitySource>,
    technical: Credentials,
}

impl ExtUserLogin {
    pub fn new(source: Arc<dyn IdentitySource>, technical: Credentials) -> Self {
        Self { source, technical }
    }
}

impl PasswordAuthenticator for ExtUserLogin {
    fn name(&self) -> &str {
        "extuser"
    }

    fn do_authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>> {
        Box::pin(async move {
            let username = credentials.username();
            let short_name = normalize_username(username);
            let digest = ext_user_digest(username, credentials.password().expose());

            let profile: Result<UserProfile, SourceError> = async {
                let mut session = self
                    .source
                    .open_session(Login::Technical(&self.technical))
                    .await?;
                session.impersonate_ext_user(&short_name, &digest).await?;
                session.current_profile().await
            }
            .await;
            let profile = profile.map_err(|e| login_failed(username, &self.source.describe(), e))?;

            debug!(
                "Verified user login via extuser (user {}, db {}, dbUser {})",
                username,
                self.source.describe(),
                self.technical.username()
            );
            Ok(AuthResult::user(profile))
        })
    }
}
