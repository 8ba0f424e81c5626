//! Passthrough ("none") authentication.
//!
//! Ignores whatever the caller supplies and grants the identity of the
//! environment's technical user. The identity is read from the identity
//! source once per provider instance and reused afterwards.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::{AuthenticationProvider, RequestKind};
use crate::BoxFuture;
use crate::error::{AuthError, SourceError};
use crate::profile::{AuthResult, Credentials, UserProfile};
use crate::source::{IdentitySource, Login};
use crate::types::Secret;

/// Session token handed out by the passthrough provider; downstream services
/// treat it as "use the generic connection".
pub const GENERIC_SESSION_TOKEN: &str = "GENERIC";

/// Provider granting a fixed, environment-defined identity.
pub struct Passthrough {
    source: Arc<dyn IdentitySource>,
    technical: Credentials,
    result: OnceCell<AuthResult>,
}

impl Passthrough {
    pub fn new(source: Arc<dyn IdentitySource>, technical: Credentials) -> Self {
        Self {
            source,
            technical,
            result: OnceCell::new(),
        }
    }

    /// Whether the identity has been resolved already.
    pub fn is_initialized(&self) -> bool {
        self.result.initialized()
    }

    async fn resolve(&self) -> Result<AuthResult, AuthError> {
        let profile: Result<UserProfile, SourceError> = async {
            let mut session = self
                .source
                .open_session(Login::Technical(&self.technical))
                .await?;
            session.current_profile().await
        }
        .await;

        match profile {
            Ok(profile) => {
                debug!(
                    "Initialized authentication result of none auth provider using db {}, user {}",
                    self.source.describe(),
                    self.technical.username()
                );
                let profile = profile.with_session_token(Secret::new(GENERIC_SESSION_TOKEN));
                Ok(AuthResult::user(profile))
            }
            Err(e) => {
                warn!(
                    "Property retrieval from database failed (user {}, db {}): {}",
                    self.technical.username(),
                    self.source.describe(),
                    e
                );
                Err(AuthError::IdentitySourceUnavailable(e.to_string()))
            }
        }
    }
}

impl AuthenticationProvider for Passthrough {
    fn name(&self) -> &str {
        "none"
    }

    fn supports(&self, _kind: RequestKind) -> bool {
        true
    }

    fn authenticate<'a>(
        &'a self,
        _credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>> {
        Box::pin(async move {
            // Concurrent first callers wait on the same initialization; a
            // failed attempt leaves the cell empty for the next caller.
            let result = self.result.get_or_try_init(|| self.resolve()).await?;
            Ok(result.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InMemorySource, MemoryAccount};
    use std::time::Duration;

    fn source() -> Arc<InMemorySource> {
        Arc::new(
            InMemorySource::new("none")
                .with_account(
                    MemoryAccount::new("99", "provys", "Generic User", "techpwd").technical(),
                )
                .with_latency(Duration::from_millis(50)),
        )
    }

    #[tokio::test]
    async fn test_same_identity_for_any_credentials() {
        let source = source();
        let provider = Passthrough::new(source.clone(), Credentials::new("provys", "techpwd"));
        assert!(!provider.is_initialized());

        let first = provider
            .authenticate(&Credentials::new("alice", "secret"))
            .await
            .unwrap();
        let second = provider
            .authenticate(&Credentials::new("", ""))
            .await
            .unwrap();

        assert!(provider.is_initialized());
        assert_eq!(first, second);
        assert_eq!(first.profile().user_id().as_str(), "99");
        assert_eq!(second.profile().user_id().as_str(), "99");
        assert_eq!(first.profile().session_token().expose(), GENERIC_SESSION_TOKEN);
        assert!(first.has_role(crate::types::ROLE_USER));
        assert_eq!(source.sessions_opened(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_callers_resolve_once() {
        let source = source();
        let provider = Arc::new(Passthrough::new(
            source.clone(),
            Credentials::new("provys", "techpwd"),
        ));

        let mut handles = Vec::new();
        for i in 0..16 {
            let provider = provider.clone();
            handles.push(tokio::spawn(async move {
                let creds = Credentials::new(format!("user{}", i), "whatever");
                provider.authenticate(&creds).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            let result = handle.await.unwrap().unwrap();
            ids.push(result.profile().user_id().clone());
        }

        assert!(ids.iter().all(|id| id.as_str() == "99"));
        assert_eq!(source.sessions_opened(), 1);
        assert_eq!(source.profile_reads(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let source = source();
        source.set_available(false);
        let provider = Passthrough::new(source.clone(), Credentials::new("provys", "techpwd"));

        let result = provider.authenticate(&Credentials::new("a", "b")).await;
        assert!(matches!(
            result,
            Err(AuthError::IdentitySourceUnavailable(_))
        ));
        assert!(!provider.is_initialized());

        source.set_available(true);
        let result = provider.authenticate(&Credentials::new("a", "b")).await;
        assert!(result.is_ok());
        assert_eq!(source.sessions_opened(), 2);
    }

    #[test]
    fn test_supports_everything() {
        let provider = Passthrough::new(source(), Credentials::new("provys", "techpwd"));
        assert!(provider.supports(RequestKind::UsernamePassword));
        assert!(provider.supports(RequestKind::Anonymous));
    }
}
