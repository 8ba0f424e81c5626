//! Error types for authentication, identity-source access and provider lookup.

use std::fmt;

/// Authentication errors visible to callers of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username/password pair rejected.
    ///
    /// Login-style providers also report an unreachable identity source this
    /// way, so a caller cannot probe source availability. Never carries the
    /// submitted password.
    InvalidCredentials,
    /// The identity source could not be reached or misbehaved.
    IdentitySourceUnavailable(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "Invalid username or password"),
            Self::IdentitySourceUnavailable(msg) => {
                write!(f, "Identity source unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Errors reported by an identity source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source refused the supplied identity or password.
    Rejected(String),
    /// Connectivity or protocol failure distinct from a rejection.
    Unavailable(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "Rejected by identity source: {}", msg),
            Self::Unavailable(msg) => write!(f, "Identity source unavailable: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<surrealdb::Error> for SourceError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Provider lookup errors. These are wiring mistakes, not user errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is neither a known provider nor a valid `MOCK$<i>` name.
    UnknownProvider(String),
    /// The name is valid but nothing was registered for it.
    ProviderUnavailable(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProvider(name) => {
                write!(f, "Invalid authentication provider name {}", name)
            }
            Self::ProviderUnavailable(key) => {
                write!(f, "No authentication provider registered under {}", key)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid username or password"
        );
        assert_eq!(
            AuthError::IdentitySourceUnavailable("timeout".to_string()).to_string(),
            "Identity source unavailable: timeout"
        );
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::Rejected("ORA-01017".to_string());
        assert_eq!(err.to_string(), "Rejected by identity source: ORA-01017");
    }

    #[test]
    fn test_registry_error_display() {
        assert_eq!(
            RegistryError::UnknownProvider("UNKNOWN".to_string()).to_string(),
            "Invalid authentication provider name UNKNOWN"
        );
        assert_eq!(
            RegistryError::ProviderUnavailable("mock-3".to_string()).to_string(),
            "No authentication provider registered under mock-3"
        );
    }
}
