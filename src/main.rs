use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tokio::sync::RwLock;
use tracing_subscriber::{fmt, EnvFilter};

use typegate::migrate;
use typegate::policy::web;
use typegate::settings::Settings;
use typegate::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(
    name = "typegate",
    version,
    about = "Access-control gatekeeper for the TypeTalk document store"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the policy evaluation server
    Serve,
    /// Copy existing users' email addresses into the emails lookup collection
    MigrateEmails {
        /// JSON export of identity-provider users
        #[arg(long)]
        users_file: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::MigrateEmails { users_file } => run_migration(&settings, &users_file),
    }
}

async fn serve(settings: Settings) -> Result<()> {
    let store = load_store(&settings)?;
    let store = Arc::new(RwLock::new(store));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.into_diagnostic()?;
    tracing::info!(%addr, "typegate listening");
    axum::serve(listener, web::router(store)).await.into_diagnostic()?;
    Ok(())
}

fn run_migration(settings: &Settings, users_file: &str) -> Result<()> {
    let mut store = load_store(settings)?;
    let export = migrate::load_auth_export(users_file)?;
    let summary = migrate::migrate_emails(&mut store, &export.users);
    store.save(&settings.store.data_path)?;
    tracing::info!(
        added = summary.added,
        skipped = summary.skipped,
        path = %settings.store.data_path.display(),
        "Migration state saved"
    );
    Ok(())
}

fn load_store(settings: &Settings) -> Result<MemoryStore> {
    let path = &settings.store.data_path;
    if path.exists() {
        let store = MemoryStore::load(path)?;
        tracing::info!(
            documents = store.document_count(),
            path = %path.display(),
            "Loaded document store"
        );
        Ok(store)
    } else {
        tracing::info!(path = %path.display(), "No store file found, starting empty");
        Ok(MemoryStore::new())
    }
}
