use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use community_events::app::{EventCatalog, EventQuery, TimeFilter};
use community_events::config::{Config, StoreBackend};
use community_events::logging;
use community_events::observability;
use community_events::server::{self, AppState};
use community_events::storage::{EventStore, InMemoryStore, SqliteStore, StoreError};

#[derive(Parser)]
#[command(name = "community_events")]
#[command(about = "Community events backend: catalog, galleries and registrations")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on, overriding the configured bind address
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Create the events and registrations tables
    Migrate,
    /// Import raw event documents from a JSON file
    Seed {
        /// File holding a JSON array of event documents
        file: PathBuf,
    },
    /// Print canonical events as JSON
    Events {
        #[arg(long, value_enum, default_value = "all")]
        when: When,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum When {
    All,
    Upcoming,
    Past,
}

impl From<When> for TimeFilter {
    fn from(when: When) -> Self {
        match when {
            When::All => TimeFilter::All,
            When::Upcoming => TimeFilter::Upcoming,
            When::Past => TimeFilter::Past,
        }
    }
}

async fn create_store(config: &Config) -> Result<Arc<dyn EventStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Sqlite => {
            info!(path = %config.store.sqlite_path, "Opening SQLite store");
            let store = SqliteStore::open(&config.store.sqlite_path)
                .with_context(|| format!("opening {}", config.store.sqlite_path))?;
            Ok(Arc::new(store))
        }
        StoreBackend::Libsql => {
            #[cfg(feature = "db")]
            {
                info!("Connecting to libSQL store...");
                let store = community_events::storage::LibsqlStore::from_env().await?;
                info!("libSQL store ready");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "db"))]
            {
                anyhow::bail!("libsql backend not enabled. Rebuild with --features db");
            }
        }
    }
}

/// Accepts either a bare array or `{ "events": [...] }`
fn read_seed_file(path: &PathBuf) -> Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    match value {
        serde_json::Value::Array(documents) => Ok(documents),
        serde_json::Value::Object(mut map) => match map.remove("events") {
            Some(serde_json::Value::Array(documents)) => Ok(documents),
            _ => anyhow::bail!("seed file must hold an array of events"),
        },
        _ => anyhow::bail!("seed file must hold an array of events"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;
    let _log_guard = logging::init_logging(&config.logging);

    match cli.command {
        Commands::Serve { port } => {
            if let Err(e) = observability::metrics::init() {
                warn!("Failed to initialize metrics: {}", e);
            }

            let mut addr: SocketAddr = config
                .server
                .bind_addr
                .parse()
                .with_context(|| format!("invalid bind address '{}'", config.server.bind_addr))?;
            if let Some(port) = port {
                addr.set_port(port);
            }

            let store = create_store(&config).await?;
            let router = server::create_router(AppState::new(store, &config));

            println!("Server endpoints:");
            println!("   Events:  http://{}/api/events", addr);
            println!("   Admin:   http://{}/admin/events", addr);
            println!("   Metrics: http://{}/metrics", addr);
            server::serve(router, addr).await?;
        }
        Commands::Migrate => {
            // Opening a SQL store applies the schema
            create_store(&config).await?;
            println!("Migrations applied");
        }
        Commands::Seed { file } => {
            let documents = read_seed_file(&file)?;
            let store = create_store(&config).await?;

            let (mut imported, mut skipped) = (0usize, 0usize);
            for document in documents {
                match store.create_event(document).await {
                    Ok(_) => imported += 1,
                    Err(StoreError::UniqueViolation(detail)) => {
                        warn!(detail = %detail, "Event already present, skipping");
                        skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            info!(imported, skipped, "Seed finished");
            println!("Imported {} events ({} already present)", imported, skipped);
        }
        Commands::Events { when } => {
            let store = create_store(&config).await?;
            let catalog = EventCatalog::from_config(store, &config);
            let events = catalog
                .list_events(&EventQuery {
                    when: when.into(),
                    ..Default::default()
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }

    Ok(())
}
