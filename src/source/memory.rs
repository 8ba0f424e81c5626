//! In-process identity source.
//!
//! Holds a fixed set of accounts and mimics a database login: wrong
//! passwords are rejected, technical accounts may impersonate external users,
//! and the whole source can be switched to "unreachable". Counters make the
//! number of round trips observable, which is what tests of the caching and
//! memoizing providers need.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use super::{IdentitySource, Login, Session, account_key};
use crate::BoxFuture;
use crate::error::SourceError;
use crate::profile::UserProfile;
use crate::strategy::ext_user_digest;
use crate::types::{Secret, ShortName, UserId};

/// Account stored in an [`InMemorySource`].
#[derive(Debug, Clone)]
pub struct MemoryAccount {
    user_id: UserId,
    short_name: ShortName,
    full_name: String,
    password: Secret,
    ext_password_digest: Option<Secret>,
    technical: bool,
    active: bool,
}

impl MemoryAccount {
    /// Create an active, non-technical account. The short name is stored
    /// upper-cased.
    pub fn new(
        user_id: impl Into<UserId>,
        short_name: &str,
        full_name: impl Into<String>,
        password: impl Into<Secret>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            short_name: ShortName::new(account_key(short_name)),
            full_name: full_name.into(),
            password: password.into(),
            ext_password_digest: None,
            technical: false,
            active: true,
        }
    }

    /// Mark the account as a technical account allowed to impersonate.
    pub fn technical(mut self) -> Self {
        self.technical = true;
        self
    }

    /// Set the external-user password (stored as its digest only).
    pub fn with_ext_password(mut self, password: &str) -> Self {
        let digest = ext_user_digest(self.short_name.as_str(), password);
        self.ext_password_digest = Some(Secret::new(digest));
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    fn profile(&self) -> UserProfile {
        UserProfile::new(
            self.user_id.clone(),
            self.short_name.clone(),
            self.full_name.clone(),
            Secret::new(Uuid::new_v4().to_string()),
        )
    }
}

/// Identity source backed by a fixed in-memory account table.
pub struct InMemorySource {
    name: String,
    accounts: Arc<HashMap<String, MemoryAccount>>,
    latency: Option<Duration>,
    available: AtomicBool,
    sessions_opened: AtomicUsize,
    profile_reads: Arc<AtomicUsize>,
}

impl InMemorySource {
    /// Create an empty source with the given display name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accounts: Arc::new(HashMap::new()),
            latency: None,
            available: AtomicBool::new(true),
            sessions_opened: AtomicUsize::new(0),
            profile_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add an account (builder pattern).
    pub fn with_account(mut self, account: MemoryAccount) -> Self {
        Arc::make_mut(&mut self.accounts).insert(account.short_name.to_string(), account);
        self
    }

    /// Delay every session open by `latency`, simulating a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Toggle simulated reachability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of session-open attempts so far, successful or not.
    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    /// Number of profile reads so far.
    pub fn profile_reads(&self) -> usize {
        self.profile_reads.load(Ordering::SeqCst)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

impl IdentitySource for InMemorySource {
    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }

    fn open_session<'a>(
        &'a self,
        login: Login<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, SourceError>> {
        Box::pin(async move {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.sessions_opened.fetch_add(1, Ordering::SeqCst);

            if !self.available.load(Ordering::SeqCst) {
                return Err(SourceError::Unavailable(format!(
                    "{} is not reachable",
                    self.describe()
                )));
            }

            let creds = login.credentials();
            let account = self
                .accounts
                .get(&account_key(creds.username()))
                .filter(|a| a.active && a.password == *creds.password())
                .ok_or_else(|| {
                    SourceError::Rejected("invalid username/password; logon denied".to_string())
                })?;

            if login.is_technical() && !account.technical {
                return Err(SourceError::Rejected(format!(
                    "{} is not a technical account",
                    account.short_name
                )));
            }

            debug!("Opened memory session for {}", account.short_name);

            let session = MemorySession {
                accounts: Arc::clone(&self.accounts),
                current: account.clone(),
                privileged: login.is_technical(),
                profile_reads: Arc::clone(&self.profile_reads),
            };
            Ok(Box::new(session) as Box<dyn Session>)
        })
    }
}

struct MemorySession {
    accounts: Arc<HashMap<String, MemoryAccount>>,
    current: MemoryAccount,
    privileged: bool,
    profile_reads: Arc<AtomicUsize>,
}

impl Session for MemorySession {
    fn current_profile(&mut self) -> BoxFuture<'_, Result<UserProfile, SourceError>> {
        Box::pin(async move {
            self.profile_reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.current.profile())
        })
    }

    fn impersonate_ext_user<'a>(
        &'a mut self,
        short_name: &'a str,
        password_digest: &'a str,
    ) -> BoxFuture<'a, Result<(), SourceError>> {
        Box::pin(async move {
            if !self.privileged {
                return Err(SourceError::Rejected(
                    "insufficient privileges to set external user".to_string(),
                ));
            }

            let account = self
                .accounts
                .get(&account_key(short_name))
                .filter(|a| a.active)
                .filter(|a| {
                    a.ext_password_digest
                        .as_ref()
                        .is_some_and(|d| d.expose() == password_digest)
                })
                .ok_or_else(|| {
                    SourceError::Rejected(format!("external user {} not verified", short_name))
                })?;

            self.current = account.clone();
            Ok(())
        })
    }

    fn profile_by_id<'a>(
        &'a mut self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<UserProfile, SourceError>> {
        Box::pin(async move {
            if !self.privileged {
                return Err(SourceError::Rejected(
                    "insufficient privileges to impersonate user".to_string(),
                ));
            }

            let account = self
                .accounts
                .values()
                .find(|a| a.active && a.user_id == *user_id)
                .ok_or_else(|| SourceError::Rejected(format!("user {} not found", user_id)))?;

            self.current = account.clone();
            self.profile_reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.current.profile())
        })
    }
}
