//! SurrealDB-backed identity source.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use surrealdb::RecordId;
use tracing::debug;
use uuid::Uuid;

use super::{IdentitySource, Login, Session, account_key};
use crate::BoxFuture;
use crate::db::{DatabaseConfig, Db, create_connection, ensure_schema};
use crate::error::SourceError;
use crate::profile::UserProfile;
use crate::strategy::ext_user_digest;
use crate::types::{Secret, ShortName, UserId};

/// Persisted account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Database identifier, doubles as the user id
    pub id: RecordId,
    /// Upper-cased short name (natural key)
    pub short_name: String,
    pub full_name: String,
    /// SHA-256 hex of the login password
    pub password_hash: String,
    /// External-user password digest, if the account may log in that way
    pub ext_password: Option<String>,
    pub is_technical: bool,
    pub is_active: bool,
}

impl AccountRecord {
    fn profile(&self) -> UserProfile {
        UserProfile::new(
            UserId::new(self.id.to_string()),
            ShortName::new(self.short_name.clone()),
            self.full_name.clone(),
            Secret::new(Uuid::new_v4().to_string()),
        )
    }
}

/// Payload for creating a new account.
#[derive(Debug, Clone)]
pub struct AccountCreate {
    pub short_name: String,
    pub full_name: String,
    pub password: Secret,
    pub ext_password: Option<Secret>,
    pub is_technical: bool,
}

/// Hash a login password for storage and comparison (raw passwords are
/// never stored).
fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Identity source reading accounts from SurrealDB.
pub struct SurrealSource {
    db: Db,
    location: String,
}

impl SurrealSource {
    /// Wrap an existing connection.
    pub fn new(db: Db, location: impl Into<String>) -> Self {
        Self {
            db,
            location: location.into(),
        }
    }

    /// Connect using `config` and make sure the schema exists.
    pub async fn connect(config: DatabaseConfig) -> Result<Self> {
        let location = config.describe();
        let db = create_connection(config).await?;
        ensure_schema(&db).await?;
        Ok(Self::new(db, location))
    }

    /// Create a new account.
    pub async fn create_account(&self, create: &AccountCreate) -> Result<AccountRecord> {
        let short_name = account_key(&create.short_name);
        let ext_password = create
            .ext_password
            .as_ref()
            .map(|p| ext_user_digest(&short_name, p.expose()));

        let query = r#"
            CREATE account CONTENT {
                short_name: $short_name,
                full_name: $full_name,
                password_hash: $password_hash,
                ext_password: $ext_password,
                is_technical: $is_technical,
                is_active: true
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("short_name", short_name))
            .bind(("full_name", create.full_name.clone()))
            .bind(("password_hash", hash_password(create.password.expose())))
            .bind(("ext_password", ext_password))
            .bind(("is_technical", create.is_technical))
            .await?;

        let accounts: Vec<AccountRecord> = res.take(0)?;
        accounts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Failed to create account"))
    }

    /// Get an account by short name (case-insensitive).
    pub async fn find_account(&self, short_name: &str) -> Result<Option<AccountRecord>, SourceError> {
        let short_name = account_key(short_name);

        let query = "SELECT * FROM account WHERE short_name = $short_name LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("short_name", short_name))
            .await?;

        let accounts: Vec<AccountRecord> = res.take(0)?;
        Ok(accounts.into_iter().next())
    }

    /// Deactivate an account; further logins are rejected.
    pub async fn deactivate_account(&self, short_name: &str) -> Result<()> {
        let query = r#"
            UPDATE account SET
                is_active = false
            WHERE short_name = $short_name
        "#;

        self.db
            .query(query)
            .bind(("short_name", account_key(short_name)))
            .await?;

        Ok(())
    }
}

impl IdentitySource for SurrealSource {
    fn describe(&self) -> String {
        format!("surrealdb:{}", self.location)
    }

    fn open_session<'a>(
        &'a self,
        login: Login<'a>,
    ) -> BoxFuture<'a, Result<Box<dyn Session>, SourceError>> {
        Box::pin(async move {
            let creds = login.credentials();
            let account = self
                .find_account(creds.username())
                .await?
                .filter(|a| a.is_active && a.password_hash == hash_password(creds.password().expose()))
                .ok_or_else(|| {
                    SourceError::Rejected("invalid username/password; logon denied".to_string())
                })?;

            if login.is_technical() && !account.is_technical {
                return Err(SourceError::Rejected(format!(
                    "{} is not a technical account",
                    account.short_name
                )));
            }

            debug!("Opened database session for {} on {}", account.short_name, self.location);

            let session = SurrealSession {
                db: self.db.clone(),
                current: account,
                privileged: login.is_technical(),
            };
            Ok(Box::new(session) as Box<dyn Session>)
        })
    }
}

struct SurrealSession {
    db: Db,
    current: AccountRecord,
    privileged: bool,
}

impl Session for SurrealSession {
    fn current_profile(&mut self) -> BoxFuture<'_, Result<UserProfile, SourceError>> {
        Box::pin(async move {
            // Re-read so a deactivation between login and profile read is seen
            let mut res = self
                .db
                .query("SELECT * FROM account WHERE id = $id LIMIT 1")
                .bind(("id", self.current.id.clone()))
                .await?;

            let accounts: Vec<AccountRecord> = res.take(0)?;
            let account = accounts
                .into_iter()
                .next()
                .filter(|a| a.is_active)
                .ok_or_else(|| SourceError::Rejected("account no longer active".to_string()))?;

            Ok(account.profile())
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

            let query = r#"
                SELECT * FROM account
                WHERE short_name = $short_name
                  AND ext_password = $ext_password
                  AND is_active = true
                LIMIT 1
            "#;

            let mut res = self
                .db
                .query(query)
                .bind(("short_name", account_key(short_name)))
                .bind(("ext_password", password_digest.to_string()))
                .await?;

            let accounts: Vec<AccountRecord> = res.take(0)?;
            self.current = accounts.into_iter().next().ok_or_else(|| {
                SourceError::Rejected(format!("external user {} not verified", short_name))
            })?;

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

            // User ids are rendered record ids ("account:<key>", key possibly escaped)
            let key = user_id
                .as_str()
                .strip_prefix("account:")
                .map(|key| key.trim_start_matches('⟨').trim_end_matches('⟩'))
                .ok_or_else(|| SourceError::Rejected(format!("user {} not found", user_id)))?;

            let query = r#"
                SELECT * FROM account
                WHERE id = type::thing('account', $key)
                  AND is_active = true
                LIMIT 1
            "#;

            let mut res = self
                .db
                .query(query)
                .bind(("key", key.to_string()))
                .await?;

            let accounts: Vec<AccountRecord> = res.take(0)?;
            self.current = accounts
                .into_iter()
                .next()
                .ok_or_else(|| SourceError::Rejected(format!("user {} not found", user_id)))?;

            Ok(self.current.profile())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Credentials;
    use crate::source::fetch_profile;

    async fn setup_test_source() -> SurrealSource {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let source = SurrealSource::connect(config).await.unwrap();

        source
            .create_account(&AccountCreate {
                short_name: "user".to_string(),
                full_name: "Regular User".to_string(),
                password: Secret::new("pwd"),
                ext_password: None,
                is_technical: false,
            })
            .await
            .unwrap();
        source
            .create_account(&AccountCreate {
                short_name: "tech".to_string(),
                full_name: "Technical".to_string(),
                password: Secret::new("techpwd"),
                ext_password: None,
                is_technical: true,
            })
            .await
            .unwrap();
        source
            .create_account(&AccountCreate {
                short_name: "stehlik".to_string(),
                full_name: "Jan Stehlik".to_string(),
                password: Secret::new("dbpwd"),
                ext_password: Some(Secret::new("atlanta")),
                is_technical: false,
            })
            .await
            .unwrap();

        source
    }

    #[test]
    fn test_hash_password() {
        let hash1 = hash_password("secret123");
        let hash2 = hash_password("secret123");
        let hash3 = hash_password("different");

        assert!(hash1.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
    }

    #[tokio::test]
    async fn test_create_account_stores_hashes_only() {
        let source = setup_test_source().await;

        let account = source.find_account("Stehlik").await.unwrap().unwrap();
        assert_eq!(account.short_name, "STEHLIK");
        assert_ne!(account.password_hash, "dbpwd");
        assert_eq!(
            account.ext_password.as_deref(),
            Some(ext_user_digest("STEHLIK", "atlanta").as_str())
        );
        assert!(account.is_active);
    }

    #[tokio::test]
    async fn test_user_login() {
        let source = setup_test_source().await;
        let creds = Credentials::new("user", "pwd");

        let mut session = source.open_session(Login::User(&creds)).await.unwrap();
        let profile = session.current_profile().await.unwrap();

        assert_eq!(profile.short_name().as_str(), "USER");
        assert!(profile.user_id().as_str().starts_with("account:"));
    }

    #[tokio::test]
    async fn test_user_login_wrong_password() {
        let source = setup_test_source().await;
        let creds = Credentials::new("user", "wrong");

        let result = source.open_session(Login::User(&creds)).await;
        assert!(matches!(result, Err(SourceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_ext_user_impersonation() {
        let source = setup_test_source().await;
        let tech = Credentials::new("tech", "techpwd");

        let mut session = source.open_session(Login::Technical(&tech)).await.unwrap();
        let digest = ext_user_digest("STEHLIK", "atlanta");
        session.impersonate_ext_user("STEHLIK", &digest).await.unwrap();

        let profile = session.current_profile().await.unwrap();
        assert_eq!(profile.full_name(), "Jan Stehlik");
    }

    #[tokio::test]
    async fn test_deactivated_account_rejected() {
        let source = setup_test_source().await;
        source.deactivate_account("user").await.unwrap();

        let creds = Credentials::new("user", "pwd");
        let result = source.open_session(Login::User(&creds)).await;
        assert!(matches!(result, Err(SourceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_profile_by_id() {
        let source = setup_test_source().await;
        let account = source.find_account("stehlik").await.unwrap().unwrap();
        let user_id = UserId::new(account.id.to_string());
        let tech = Credentials::new("tech", "techpwd");

        let profile = fetch_profile(&source, &tech, &user_id).await.unwrap();
        assert_eq!(profile.user_id(), &user_id);
        assert_eq!(profile.short_name().as_str(), "STEHLIK");
        assert_eq!(profile.full_name(), "Jan Stehlik");
    }

    #[tokio::test]
    async fn test_profile_by_id_inactive_or_unknown() {
        let source = setup_test_source().await;
        let account = source.find_account("user").await.unwrap().unwrap();
        source.deactivate_account("user").await.unwrap();
        let tech = Credentials::new("tech", "techpwd");

        let ids = [
            UserId::new(account.id.to_string()),
            UserId::new("account:missing"),
            UserId::new("42"),
        ];
        for id in &ids {
            let result = fetch_profile(&source, &tech, id).await;
            assert!(matches!(result, Err(SourceError::Rejected(_))), "{}", id);
        }
    }

    #[tokio::test]
    async fn test_profile_by_id_needs_privileged_session() {
        let source = setup_test_source().await;
        let account = source.find_account("stehlik").await.unwrap().unwrap();
        let creds = Credentials::new("user", "pwd");
        let mut session = source.open_session(Login::User(&creds)).await.unwrap();

        let result = session
            .profile_by_id(&UserId::new(account.id.to_string()))
            .await;
        assert!(matches!(result, Err(SourceError::Rejected(_))));
    }
}
