//! Direct login: the caller's credentials are the connection credentials.

use std::sync::Arc;

use tracing::{debug, warn};

use super::PasswordAuthenticator;
use crate::BoxFuture;
use crate::error::{AuthError, SourceError};
use crate::profile::{AuthResult, Credentials, UserProfile};
use crate::source::{IdentitySource, Login};

/// Authenticates by opening an identity-source session as the user.
///
/// A successful session open is the proof; the profile is then read from
/// that same session.
pub struct DirectLogin {
    source: Arc<dyn IdentitySource>,
}

impl DirectLogin {
    pub fn new(source: Arc<dyn IdentitySource>) -> Self {
        Self { source }
    }
}

impl PasswordAuthenticator for DirectLogin {
    fn name(&self) -> &str {
        "oracle"
    }

    fn do_authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>> {
        Box::pin(async move {
            let username = credentials.username();
            let profile: Result<UserProfile, SourceError> = async {
                let mut session = self.source.open_session(Login::User(credentials)).await?;
                session.current_profile().await
            }
            .await;
            let profile = profile.map_err(|e| login_failed(username, &self.source.describe(), e))?;

            debug!(
                "Verified user login via database (user {}, db {})",
                username,
                self.source.describe()
            );
            Ok(AuthResult::user(profile))
        })
    }
}

/// Log the cause of a failed login and collapse it into the generic error.
pub(super) fn login_failed(username: &str, source: &str, err: SourceError) -> AuthError {
    match &err {
        SourceError::Rejected(_) => {
            debug!("User login failed (user {}, db {}): {}", username, source, err)
        }
        SourceError::Unavailable(_) => {
            warn!("User login failed (user {}, db {}): {}", username, source, err)
        }
    }
    AuthError::InvalidCredentials
}
