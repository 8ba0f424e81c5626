// Core modules
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod profile;
pub mod registry;
pub mod source;
pub mod strategy;
pub mod types;

// Re-export key types and functions
pub use cache::{CredentialCache, DEFAULT_CACHE_TIMEOUT_SECONDS};
pub use config::{AuthSettings, MockSet, TechnicalAccount};
pub use db::{DatabaseConfig, create_connection, ensure_schema};
pub use error::{AuthError, RegistryError, SourceError};
pub use profile::{AuthResult, Credentials, UserProfile};
pub use registry::{ProviderKind, ProviderName, ProviderRegistry};
pub use source::{
    IdentitySource, InMemorySource, Login, MemoryAccount, Session, SurrealSource, fetch_profile,
};
pub use strategy::{
    AuthenticationProvider, DirectLogin, ExtUserLogin, MockProvider, PasswordAuthenticator,
    Passthrough, RequestKind,
};
pub use types::{ROLE_USER, Role, Secret, ShortName, UserId};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::info;

/// Boxed future used by the object-safe async traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Build every provider described by `settings` on top of `source`.
///
/// `oracle` is always registered. `extuser` and `none` need a technical
/// account and are left out without one, so resolving them reports
/// [`RegistryError::ProviderUnavailable`]. Each mock set is registered as
/// `MOCK` or `MOCK$<index>`.
pub fn build_registry(settings: &AuthSettings, source: Arc<dyn IdentitySource>) -> ProviderRegistry {
    let ttl = settings.cache_timeout_secs;
    let mut builder = ProviderRegistry::builder().register(
        ProviderKind::Oracle,
        Arc::new(CredentialCache::new(DirectLogin::new(source.clone()), ttl)),
    );

    if let Some(technical) = &settings.technical {
        builder = builder
            .register(
                ProviderKind::ExtUser,
                Arc::new(CredentialCache::new(
                    ExtUserLogin::new(source.clone(), technical.credentials()),
                    ttl,
                )),
            )
            .register(
                ProviderKind::None,
                Arc::new(Passthrough::new(source.clone(), technical.credentials())),
            );
    } else {
        info!("No technical account configured; extuser and none providers disabled");
    }

    for set in &settings.mock {
        let provider = Arc::new(MockProvider::new(set.pairs()));
        builder = match set.index {
            Some(index) => builder.register_mock(index, provider),
            None => builder.register(ProviderKind::Mock(None), provider),
        };
    }

    let registry = builder.build();
    info!(
        "Authentication providers ready on {}: {:?}",
        source.describe(),
        registry.names()
    );
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MockUser;
    use crate::source::{InMemorySource, MemoryAccount};

    fn source() -> Arc<InMemorySource> {
        Arc::new(
            InMemorySource::new("wiring")
                .with_account(MemoryAccount::new("1", "user", "Plain User", "pwd"))
                .with_account(MemoryAccount::new("2", "provys", "Technical", "techpwd").technical())
                .with_account(
                    MemoryAccount::new("3", "stehlik", "Jan Stehlik", "dbpwd")
                        .with_ext_password("atlanta"),
                ),
        )
    }

    fn settings(technical: bool) -> AuthSettings {
        AuthSettings {
            database: DatabaseConfig::default(),
            technical: technical.then(|| TechnicalAccount {
                user: "provys".to_string(),
                password: "techpwd".to_string(),
            }),
            cache_timeout_secs: 60,
            mock: vec![MockSet {
                index: Some(2),
                users: vec![MockUser {
                    username: "mock".to_string(),
                    password: "mockpwd".to_string(),
                    user_id: "42".to_string(),
                    short_name: None,
                    full_name: None,
                    token: Some("TOKEN".to_string()),
                }],
            }],
        }
    }

    #[tokio::test]
    async fn test_build_registry_with_technical_account() {
        let source = source();
        let registry = build_registry(&settings(true), source.clone());
        assert_eq!(registry.names(), vec!["oracle", "extuser", "none", "mock-2"]);

        let oracle = registry.resolve("ORACLE").unwrap();
        let result = oracle.authenticate(&Credentials::new("user", "pwd")).await.unwrap();
        assert_eq!(result.profile().user_id().as_str(), "1");
        oracle.authenticate(&Credentials::new("user", "pwd")).await.unwrap();
        assert_eq!(source.sessions_opened(), 1);

        let extuser = registry.resolve("extuser").unwrap();
        let result = extuser
            .authenticate(&Credentials::new("stehlik", "atlanta"))
            .await
            .unwrap();
        assert_eq!(result.profile().user_id().as_str(), "3");

        let none = registry.resolve("None").unwrap();
        let result = none.authenticate(&Credentials::new("", "")).await.unwrap();
        assert_eq!(result.profile().user_id().as_str(), "2");
        assert_eq!(result.profile().session_token().expose(), "GENERIC");

        let mock = registry.resolve("MOCK$2").unwrap();
        let result = mock
            .authenticate(&Credentials::new("mock", "mockpwd"))
            .await
            .unwrap();
        assert_eq!(result.profile().user_id().as_str(), "42");
    }

    #[test]
    fn test_build_registry_without_technical_account() {
        let registry = build_registry(&settings(false), source());

        assert!(registry.resolve("oracle").is_ok());
        assert_eq!(
            registry.resolve("extuser").err(),
            Some(RegistryError::ProviderUnavailable("extuser".to_string()))
        );
        assert_eq!(
            registry.resolve("none").err(),
            Some(RegistryError::ProviderUnavailable("none".to_string()))
        );
        assert_eq!(
            registry.resolve("MOCK").err(),
            Some(RegistryError::ProviderUnavailable("mock".to_string()))
        );
        assert_eq!(
            registry.resolve("LDAP").err(),
            Some(RegistryError::UnknownProvider("LDAP".to_string()))
        );
    }
}
