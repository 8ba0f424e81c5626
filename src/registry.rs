//! Name-based lookup of authentication providers.
//!
//! Callers select a provider by a symbolic, case-insensitive name:
//! `ORACLE`, `EXTUSER`, `NONE`, `MOCK` or `MOCK$<i>` for a numbered mock
//! set. The set of kinds is closed; which of them are actually available
//! depends on what the application registered at startup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RegistryError;
use crate::strategy::AuthenticationProvider;

const MOCK_INDEX_PREFIX: &str = "MOCK$";

/// Provider kinds known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    /// Direct login against the identity source.
    Oracle,
    /// External users verified through a technical account.
    ExtUser,
    /// Passthrough, no verification.
    None,
    /// Static test double, optionally one of several numbered sets.
    Mock(Option<u32>),
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::ExtUser => "extuser",
            Self::None => "none",
            Self::Mock(_) => "mock",
        }
    }

    /// Key under which the provider is registered (`mock-<i>` for numbered
    /// mock sets, [`as_str`](Self::as_str) otherwise).
    pub fn registration_key(&self) -> String {
        match self {
            Self::Mock(Some(index)) => format!("mock-{}", index),
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.registration_key())
    }
}

/// A parsed provider name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderName(ProviderKind);

impl ProviderName {
    pub fn parse(name: &str) -> Result<Self, RegistryError> {
        let upper = name.to_ascii_uppercase();
        let kind = if let Some(index) = upper.strip_prefix(MOCK_INDEX_PREFIX) {
            // Only plain digits; u32 parsing would accept a leading '+'.
            // Leading zeros are dropped, so MOCK$01 and MOCK$1 are one set.
            if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RegistryError::UnknownProvider(name.to_string()));
            }
            let index = index
                .parse::<u32>()
                .map_err(|_| RegistryError::UnknownProvider(name.to_string()))?;
            ProviderKind::Mock(Some(index))
        } else {
            match upper.as_str() {
                "ORACLE" => ProviderKind::Oracle,
                "EXTUSER" => ProviderKind::ExtUser,
                "NONE" => ProviderKind::None,
                "MOCK" => ProviderKind::Mock(None),
                _ => return Err(RegistryError::UnknownProvider(name.to_string())),
            }
        };
        Ok(Self(kind))
    }

    pub fn kind(&self) -> ProviderKind {
        self.0
    }
}

impl FromStr for ProviderName {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Immutable map from provider kind to provider instance.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn AuthenticationProvider>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// Resolve a provider by its symbolic name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn AuthenticationProvider>, RegistryError> {
        let kind = ProviderName::parse(name)?.kind();
        match self.providers.get(&kind) {
            Some(provider) => {
                debug!("Resolved provider {} as {}", name, kind);
                Ok(provider.clone())
            }
            None => Err(RegistryError::ProviderUnavailable(kind.registration_key())),
        }
    }

    pub fn contains(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registration keys, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut kinds: Vec<_> = self.providers.keys().copied().collect();
        kinds.sort();
        kinds.iter().map(ProviderKind::registration_key).collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<ProviderKind, Arc<dyn AuthenticationProvider>>,
}

impl ProviderRegistryBuilder {
    /// Register `provider` under `kind`, replacing any earlier registration.
    pub fn register(mut self, kind: ProviderKind, provider: Arc<dyn AuthenticationProvider>) -> Self {
        info!("Registering authentication provider {} ({})", kind, provider.name());
        self.providers.insert(kind, provider);
        self
    }

    /// Register a numbered mock set.
    pub fn register_mock(self, index: u32, provider: Arc<dyn AuthenticationProvider>) -> Self {
        self.register(ProviderKind::Mock(Some(index)), provider)
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::profile::{Credentials, UserProfile};
    use crate::strategy::MockProvider;
    use crate::types::{Secret, ShortName, UserId};

    fn mock(user_id: &str) -> Arc<dyn AuthenticationProvider> {
        Arc::new(MockProvider::new([(
            Credentials::new("user", "pwd"),
            UserProfile::new(
                UserId::new(user_id),
                ShortName::new("USER"),
                "User",
                Secret::new("TOKEN"),
            ),
        )]))
    }

    fn registry() -> ProviderRegistry {
        ProviderRegistry::builder()
            .register(ProviderKind::Mock(None), mock("plain"))
            .register_mock(0, mock("zero"))
            .register_mock(1, mock("one"))
            .build()
    }

    #[test]
    fn test_parse_names() {
        let cases = [
            ("oracle", ProviderKind::Oracle),
            ("ORACLE", ProviderKind::Oracle),
            ("ExtUser", ProviderKind::ExtUser),
            ("none", ProviderKind::None),
            ("MOCK", ProviderKind::Mock(None)),
            ("mock$0", ProviderKind::Mock(Some(0))),
            ("MOCK$12", ProviderKind::Mock(Some(12))),
        ];
        for (name, kind) in cases {
            assert_eq!(ProviderName::parse(name).unwrap().kind(), kind, "{}", name);
        }
    }

    #[test]
    fn test_parse_unknown_names() {
        for name in ["UNKNOWN", "MOCK$x", "MOCK$-1", "MOCK$", "MOCK$+1", "ORACLEX", "", "MOCK1"] {
            assert_eq!(
                ProviderName::parse(name),
                Err(RegistryError::UnknownProvider(name.to_string())),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_from_str() {
        let name: ProviderName = "extuser".parse().unwrap();
        assert_eq!(name.kind(), ProviderKind::ExtUser);
        assert!("ldap".parse::<ProviderName>().is_err());
    }

    #[test]
    fn test_mock_index_is_numeric() {
        // Leading zeros name the same set
        for name in ["MOCK$01", "MOCK$001", "MOCK$1"] {
            assert_eq!(ProviderName::parse(name).unwrap().kind(), ProviderKind::Mock(Some(1)));
        }
        assert_eq!(
            ProviderName::parse("MOCK$4294967295").unwrap().kind(),
            ProviderKind::Mock(Some(u32::MAX))
        );
        assert_eq!(
            ProviderName::parse("MOCK$4294967296"),
            Err(RegistryError::UnknownProvider("MOCK$4294967296".to_string()))
        );

        let registry = registry();
        let one = registry.resolve("MOCK$1").unwrap();
        assert!(Arc::ptr_eq(&one, &registry.resolve("MOCK$01").unwrap()));
    }

    #[test]
    fn test_registration_keys() {
        assert_eq!(ProviderKind::Oracle.registration_key(), "oracle");
        assert_eq!(ProviderKind::Mock(None).registration_key(), "mock");
        assert_eq!(ProviderKind::Mock(Some(3)).registration_key(), "mock-3");
        assert_eq!(ProviderKind::Mock(Some(3)).as_str(), "mock");
    }

    #[tokio::test]
    async fn test_numbered_mocks_are_distinct() {
        let registry = registry();

        let zero = registry.resolve("MOCK$0").unwrap();
        let one = registry.resolve("MOCK$1").unwrap();
        assert!(!Arc::ptr_eq(&zero, &one));
        assert!(Arc::ptr_eq(&zero, &registry.resolve("mock$0").unwrap()));

        let creds = Credentials::new("user", "pwd");
        let result = zero.authenticate(&creds).await.unwrap();
        assert_eq!(result.profile().user_id().as_str(), "zero");
        let result = one.authenticate(&creds).await.unwrap();
        assert_eq!(result.profile().user_id().as_str(), "one");

        let plain = registry.resolve("MOCK").unwrap();
        let result = plain.authenticate(&creds).await.unwrap();
        assert_eq!(result.profile().user_id().as_str(), "plain");
    }

    #[test]
    fn test_resolve_errors() {
        let registry = registry();

        assert_eq!(
            registry.resolve("UNKNOWN").err(),
            Some(RegistryError::UnknownProvider("UNKNOWN".to_string()))
        );
        assert_eq!(
            registry.resolve("oracle").err(),
            Some(RegistryError::ProviderUnavailable("oracle".to_string()))
        );
        assert_eq!(
            registry.resolve("MOCK$7").err(),
            Some(RegistryError::ProviderUnavailable("mock-7".to_string()))
        );
    }

    #[tokio::test]
    async fn test_resolved_provider_failure() {
        let provider = registry().resolve("MOCK$1").unwrap();
        let result = provider.authenticate(&Credentials::new("user", "bad")).await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[test]
    fn test_names_and_len() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        assert!(!registry.is_empty());
        assert!(registry.contains(ProviderKind::Mock(Some(1))));
        assert!(!registry.contains(ProviderKind::Oracle));
        assert_eq!(registry.names(), vec!["mock", "mock-0", "mock-1"]);
        assert!(ProviderRegistry::default().is_empty());
    }
}
