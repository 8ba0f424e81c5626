//! Credential caching for username/password providers.
//!
//! Wraps a [`PasswordAuthenticator`] and remembers each successful
//! authentication per username for a fixed time window. A cached result is
//! reused only while it is fresh AND the caller presents the same password
//! that produced it. A different password always goes back to the identity
//! source (the user may have changed it there), and the entry is left alone
//! so it keeps serving callers that still use the original password.
//!
//! Failures are never cached, so repeated bad attempts always reach the
//! identity source.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::BoxFuture;
use crate::error::AuthError;
use crate::profile::{AuthResult, Credentials};
use crate::strategy::{AuthenticationProvider, PasswordAuthenticator, RequestKind};
use crate::types::Secret;

/// Default cache TTL in seconds (15 minutes).
pub const DEFAULT_CACHE_TIMEOUT_SECONDS: i64 = 900;

// Keeps `Instant + ttl` from overflowing (about 100 years).
const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Cached authentication with metadata.
#[derive(Clone)]
struct CacheEntry {
    valid_until: Instant,
    password: Secret,
    result: AuthResult,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.valid_until
    }

    fn password_matches(&self, password: &Secret) -> bool {
        self.password == *password
    }
}

/// Outcome of a cache lookup.
enum Lookup {
    Hit(AuthResult),
    Miss,
    Expired,
    PasswordMismatch,
}

/// Time-bounded memoization layer around a username/password strategy.
pub struct CredentialCache<A> {
    inner: A,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl<A: PasswordAuthenticator> CredentialCache<A> {
    /// Wrap `inner` with a cache holding successes for `ttl_seconds`.
    ///
    /// Zero or negative values are accepted and disable reuse: every entry
    /// is already expired when looked up.
    pub fn new(inner: A, ttl_seconds: i64) -> Self {
        let secs = u64::try_from(ttl_seconds).unwrap_or(0).min(MAX_TTL_SECONDS);
        let ttl = Duration::from_secs(secs);
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Wrap `inner` with the default TTL.
    pub fn with_default_ttl(inner: A) -> Self {
        Self::new(inner, DEFAULT_CACHE_TIMEOUT_SECONDS)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Authenticate, reusing a cached success when allowed.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<AuthResult, AuthError> {
        let username = credentials.username();

        match self.lookup(username, credentials.password()).await {
            Lookup::Hit(result) => {
                debug!("Credential cache hit for user {}", username);
                return Ok(result);
            }
            Lookup::Miss => {}
            Lookup::Expired => debug!("Credential cache entry expired for user {}", username),
            Lookup::PasswordMismatch => {
                debug!("Password differs from cached one for user {}, revalidating", username)
            }
        }

        // The lock is not held here; concurrent writers for the same user
        // race and the last one to store wins.
        let result = self.inner.do_authenticate(credentials).await?;
        self.store(username, credentials.password(), &result).await;
        Ok(result)
    }

    async fn lookup(&self, username: &str, password: &Secret) -> Lookup {
        let now = Instant::now();
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(username) {
                None => return Lookup::Miss,
                Some(entry) if !entry.is_valid(now) => entry.valid_until,
                Some(entry) if !entry.password_matches(password) => {
                    return Lookup::PasswordMismatch;
                }
                Some(entry) => return Lookup::Hit(entry.result.clone()),
            }
        };

        // Another caller may have stored a fresh entry between the two locks
        let mut entries = self.entries.write().await;
        if entries
            .get(username)
            .is_some_and(|entry| entry.valid_until == expired)
        {
            entries.remove(username);
        }
        Lookup::Expired
    }

    async fn store(&self, username: &str, password: &Secret, result: &AuthResult) {
        let entry = CacheEntry {
            valid_until: Instant::now() + self.ttl,
            password: password.clone(),
            result: result.clone(),
        };
        self.entries.write().await.insert(username.to_string(), entry);
        debug!("Cached authentication for user {} ({:?})", username, self.ttl);
    }

    /// Number of entries, including expired ones not yet looked up.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a (possibly expired) entry exists for `username`.
    pub async fn contains(&self, username: &str) -> bool {
        self.entries.read().await.contains_key(username)
    }

    /// Drop the entry for `username`, if any.
    pub async fn invalidate(&self, username: &str) {
        self.entries.write().await.remove(username);
    }

    /// Drop all entries.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl<A: PasswordAuthenticator> AuthenticationProvider for CredentialCache<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn supports(&self, kind: RequestKind) -> bool {
        kind == RequestKind::UsernamePassword
    }

    fn authenticate<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, Result<AuthResult, AuthError>> {
        Box::pin(CredentialCache::authenticate(self, credentials))
    }
}

impl<A: PasswordAuthenticator> fmt::Debug for CredentialCache<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Entries (and their passwords) are intentionally left out
        f.debug_struct("CredentialCache")
            .field("provider", &self.inner.name())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
