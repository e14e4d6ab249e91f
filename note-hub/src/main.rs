use anyhow::Result;
use axum::{routing::get, serve, Router};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use note_hub::api;
use note_hub_core::auth::{Hs256Verifier, NullVerifier, TokenVerifier};
use note_hub_core::events::EventBus;
use note_hub_core::storage::FolderStore;

#[derive(Parser)]
#[command(name = "note-hub")]
#[command(about = "Personal organization backend: per-user folder trees over a document store")]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Directory where folder documents are persisted
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// HS256 secret for bearer-token auth; when unset only the X-User-Id
    /// header path authenticates
    #[arg(long)]
    jwt_secret: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let store = FolderStore::new(&cli.data_dir)?;
    tracing::info!(dir = %store.data_dir().display(), "folder store ready");
    let store = Arc::new(RwLock::new(store));

    let events = EventBus::new();
    let verifier: Arc<dyn TokenVerifier> = match cli.jwt_secret {
        Some(secret) => Arc::new(Hs256Verifier::new(secret)),
        None => Arc::new(NullVerifier),
    };

    let app = Router::new()
        .merge(api::router(store, events, verifier))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&cli.addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
