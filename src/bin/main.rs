use anyhow::Result;
use clap::{Parser, Subcommand};
use passgate::source::AccountCreate;
use passgate::{AuthSettings, Credentials, ProviderName, Secret, SurrealSource, build_registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passgate")]
#[command(about = "Credential authentication with provider dispatch")]
struct Cli {
    /// Settings file (defaults to PASSGATE_CONFIG, then XDG, then ./auth.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the identity database url from the settings
    #[arg(long, global = true, env = "PASSGATE_DB_URL")]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the identity database schema
    Init,
    /// Create an account in the identity database
    AddAccount {
        short_name: String,
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long, env = "PASSGATE_ACCOUNT_PASSWORD", hide_env_values = true)]
        password: String,
        /// Password for external-user login (stored as a digest)
        #[arg(long, env = "PASSGATE_ACCOUNT_EXT_PASSWORD", hide_env_values = true)]
        ext_password: Option<String>,
        /// Allow the account to impersonate external users
        #[arg(long, default_value_t = false)]
        technical: bool,
    },
    /// Check which provider a name resolves to
    Resolve { provider: String },
    /// Authenticate a user through a provider
    Authenticate {
        provider: String,
        username: String,
        #[arg(long, env = "PASSGATE_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

fn load_settings(cli: &Cli) -> Result<AuthSettings> {
    let mut settings = match &cli.config {
        Some(path) => AuthSettings::load_from(path)?,
        None => AuthSettings::load()?,
    };
    if let Some(url) = &cli.db_url {
        settings.database.url = url.clone();
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("passgate=info".parse()?)
                .add_directive("surrealdb=warn".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Init => {
            info!("Initializing identity database {}", settings.database.describe());
            SurrealSource::connect(settings.database.clone()).await?;
            info!("Identity database initialized");
        }
        Commands::AddAccount {
            short_name,
            full_name,
            password,
            ext_password,
            technical,
        } => {
            let source = SurrealSource::connect(settings.database.clone()).await?;
            let record = source
                .create_account(&AccountCreate {
                    full_name: full_name.unwrap_or_else(|| short_name.clone()),
                    short_name,
                    password: Secret::new(password),
                    ext_password: ext_password.map(Secret::new),
                    is_technical: technical,
                })
                .await?;
            info!("Created account {} ({})", record.short_name, record.id);
        }
        Commands::Resolve { provider } => {
            let name = ProviderName::parse(&provider)?;
            let source = SurrealSource::connect(settings.database.clone()).await?;
            let registry = build_registry(&settings, Arc::new(source));
            let resolved = registry.resolve(&provider)?;
            info!(
                "{} resolves to {} (registered as {})",
                provider,
                resolved.name(),
                name.kind().registration_key()
            );
        }
        Commands::Authenticate {
            provider,
            username,
            password,
        } => {
            let source = SurrealSource::connect(settings.database.clone()).await?;
            let registry = build_registry(&settings, Arc::new(source));
            let resolved = registry.resolve(&provider)?;

            match resolved.authenticate(&Credentials::new(username, password)).await {
                Ok(result) => {
                    let roles: Vec<&str> =
                        result.granted_roles().iter().map(|r| r.as_str()).collect();
                    info!("Authenticated as {} with roles {:?}", result.profile(), roles);
                }
                Err(e) => {
                    warn!("Authentication via {} failed: {}", provider, e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
