use serde::Deserialize;
use serde_json::Value;
use std::{env, fmt, fs, path::Path, path::PathBuf};
use tracing::{debug, info};

use crate::cache::DEFAULT_CACHE_TIMEOUT_SECONDS;
use crate::db::DatabaseConfig;
use crate::profile::{Credentials, UserProfile};
use crate::strategy::normalize_username;
use crate::types::{Secret, ShortName, UserId};

/// Settings for the authentication providers and their identity source.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Technical account used by the external-user and passthrough providers.
    /// Both stay unregistered without one.
    #[serde(default = "TechnicalAccount::from_env")]
    pub technical: Option<TechnicalAccount>,
    #[serde(default = "default_cache_timeout", rename = "cacheTimeout")]
    pub cache_timeout_secs: i64,
    #[serde(default)]
    pub mock: Vec<MockSet>,
}

fn default_cache_timeout() -> i64 {
    DEFAULT_CACHE_TIMEOUT_SECONDS
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            technical: TechnicalAccount::from_env(),
            cache_timeout_secs: DEFAULT_CACHE_TIMEOUT_SECONDS,
            mock: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct TechnicalAccount {
    pub user: String,
    pub password: String,
}

impl TechnicalAccount {
    /// Read `PASSGATE_TECH_USER` / `PASSGATE_TECH_PASSWORD`; both must be set.
    pub fn from_env() -> Option<Self> {
        let user = env::var("PASSGATE_TECH_USER").ok()?;
        let password = env::var("PASSGATE_TECH_PASSWORD").ok()?;
        Some(Self { user, password })
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.user.as_str(), self.password.as_str())
    }
}

impl fmt::Debug for TechnicalAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TechnicalAccount")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// One set of canned answers for a mock provider. Without an index it is
/// served as `MOCK`, with one as `MOCK$<index>`.
#[derive(Debug, Clone, Deserialize)]
pub struct MockSet {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub users: Vec<MockUser>,
}

impl MockSet {
    pub fn pairs(&self) -> impl Iterator<Item = (Credentials, UserProfile)> + '_ {
        self.users.iter().map(MockUser::to_pair)
    }
}

#[derive(Clone, Deserialize)]
pub struct MockUser {
    pub username: String,
    pub password: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(default, rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(default, rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl MockUser {
    fn to_pair(&self) -> (Credentials, UserProfile) {
        let short_name = self
            .short_name
            .clone()
            .unwrap_or_else(|| normalize_username(&self.username));
        let full_name = self.full_name.clone().unwrap_or_else(|| short_name.clone());
        let token = self
            .token
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let profile = UserProfile::new(
            UserId::new(self.user_id.as_str()),
            ShortName::new(short_name),
            full_name,
            Secret::new(token),
        );
        (
            Credentials::new(self.username.as_str(), self.password.as_str()),
            profile,
        )
    }
}

impl fmt::Debug for MockUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockUser")
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

pub fn resolve_settings_path() -> anyhow::Result<PathBuf> {
    if let Ok(p) = env::var("PASSGATE_CONFIG") {
        return Ok(PathBuf::from(p));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("passgate").join("auth.json");
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    let candidate = PathBuf::from("auth.json");
    if candidate.exists() {
        return Ok(candidate);
    }

    Err(anyhow::anyhow!(
        "Could not find auth.json (set PASSGATE_CONFIG or create ./auth.json)"
    ))
}

/// Expand `${NAME}` references using `lookup`. Unknown names are kept as is.
fn expand_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            if let Some(val) = lookup(&name) {
                out.push_str(&val);
            } else {
                out.push_str("${");
                out.push_str(&name);
                out.push('}');
            }
        } else {
            out.push(ch);
        }
    }

    out
}

fn expand_value(value: &mut Value, lookup: &impl Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => *s = expand_vars(s, lookup),
        Value::Array(items) => items.iter_mut().for_each(|v| expand_value(v, lookup)),
        Value::Object(map) => map.values_mut().for_each(|v| expand_value(v, lookup)),
        _ => {}
    }
}

fn parse_settings(raw: &str, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<AuthSettings> {
    let mut value: Value = serde_json::from_str(raw)?;
    expand_value(&mut value, lookup);
    Ok(serde_json::from_value(value)?)
}

impl AuthSettings {
    /// Load settings from an explicit file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let settings = parse_settings(&raw, &|name| env::var(name).ok())?;
        info!("Loaded authentication settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from the resolved location, falling back to defaults
    /// taken from the environment when no file exists.
    pub fn load() -> anyhow::Result<Self> {
        match resolve_settings_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                debug!("{}; using environment defaults", e);
                Ok(Self::default())
            }
        }
    }
}
