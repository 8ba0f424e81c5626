use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{env, fmt};
use surrealdb::Surreal;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;

pub type Db = Surreal<Any>;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("PASSGATE_DB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("PASSGATE_DB_NAMESPACE").unwrap_or_else(|_| "passgate".to_string()),
            database: env::var("PASSGATE_DB_DATABASE").unwrap_or_else(|_| "identity".to_string()),
            username: env::var("PASSGATE_DB_USERNAME").ok(),
            password: env::var("PASSGATE_DB_PASSWORD").ok(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl DatabaseConfig {
    /// Location string for log lines; never includes credentials.
    pub fn describe(&self) -> String {
        format!("{}/{}/{}", self.url, self.namespace, self.database)
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = vec![
        // Accounts known to the identity source
        "DEFINE TABLE IF NOT EXISTS account SCHEMAFULL;
         DEFINE FIELD IF NOT EXISTS short_name ON TABLE account TYPE string;
         DEFINE FIELD IF NOT EXISTS full_name ON TABLE account TYPE string;
         DEFINE FIELD IF NOT EXISTS password_hash ON TABLE account TYPE string;
         DEFINE FIELD IF NOT EXISTS ext_password ON TABLE account TYPE option<string>;
         DEFINE FIELD IF NOT EXISTS is_technical ON TABLE account TYPE bool DEFAULT false;
         DEFINE FIELD IF NOT EXISTS is_active ON TABLE account TYPE bool DEFAULT true;
         DEFINE FIELD IF NOT EXISTS created_at ON TABLE account VALUE time::now();",
        "DEFINE INDEX IF NOT EXISTS account_short_name ON TABLE account COLUMNS short_name UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?;
    }

    Ok(())
}
