//! modelkit HTTP server
//!
//! Serves lens listings and bulk operations for every model described in a
//! registry file.
//!
//! Usage:
//!   modelkit-server --models models.json --db shop.db --port 8080
//!
//! Without `--db` records live in memory and are lost on exit.

use std::{path::PathBuf, sync::Arc};
use anyhow::{Context, Result};
use clap::Parser;
use modelkit_blobstore::FsBlobStore;
use modelkit_model::ModelRegistry;
use modelkit_server::{build_router, AppState};
use modelkit_store::{MemoryStore, SqliteStore, Store};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modelkit-server")]
#[command(about = "HTTP API for modelkit models")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// SQLite database path (in-memory store when omitted)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Model registry JSON file
    #[arg(short, long, default_value = "models.json")]
    models: PathBuf,

    /// Root directory for import/export files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let models = ModelRegistry::from_path(&args.models)
        .with_context(|| format!("Failed to load models from {:?}", args.models))?;

    let store: Arc<dyn Store> = match &args.db {
        Some(path) => {
            info!("Opening SQLite store at {:?}", path);
            Arc::new(SqliteStore::open(path).context("Failed to open database")?)
        }
        None => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };
    for model in models.models() {
        store
            .register(model.schema().clone())
            .with_context(|| format!("Failed to register model {}", model.name()))?;
        info!("Registered model {}", model.name());
    }

    let blobs = FsBlobStore::open(&args.data_dir).context("Failed to open data directory")?;
    let state = Arc::new(AppState::new(store, models, Arc::new(blobs)));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", args.port))
        .await
        .context("Failed to bind HTTP port")?;
    info!("Listening on port {}", args.port);
    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}
