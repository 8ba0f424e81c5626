//! Static test double.
//!
//! Answers from a fixed table of exact (username, password) pairs. Meant for
//! tests and local setups; it is deterministic, so it is never cached.

use std::collections::HashMap;
use std::fmt;

use super::AuthenticationProvider;
use crate::BoxFuture;
use crate::error::AuthError;
use crate::profile::{AuthResult, Credentials, UserProfile};

pub struct MockProvider {
    authentications: HashMap<(String, String), AuthResult>,
}

impl MockProvider {
    /// Create a provider that accepts exactly the given pairs.
    pub fn new<I>(users: I) -> Self
    where
        I: IntoIterator<Item = (Credentials, UserProfile)>,
    {
        let authentications = users
            .into_iter()
            .map(|(creds, profile)| {
                let key = (
                    creds.username().to_string(),
                    creds.password().expose().to_string(),
                );
                (key, AuthResult::user(profile))
            })
            .collect();
        Self { authentications }
    }

    pub fn len(&self) -> usize {
        self.authentications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authentications.is_empty()
    }
}

impl AuthenticationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>> {
        Box::pin(async move {
            let key = (
                credentials.username().to_string(),
                credentials.password().expose().to_string(),
            );
            self.authentications
                .get(&key)
                .cloned()
                .ok_or(AuthError::InvalidCredentials)
        })
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let users: Vec<&str> = self.authentications.keys().map(|(u, _)| u.as_str()).collect();
        f.debug_struct("MockProvider").field("users", &users).finish()
    }
}
