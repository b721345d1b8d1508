//! emotune-server: music catalog service with selfie-based mood detection

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use emotune_common::api::TokenKeys;
use emotune_common::config::{ConfigOverrides, TomlConfig};
use emotune_common::db;
use emotune_server::emotion::{EmotionClassifier, OnnxEmotionClassifier};
use emotune_server::storage::{CloudinaryStorage, DisabledStorage, MediaStorage};
use emotune_server::{build_router, cors_layer, AppState};
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for emotune-server
#[derive(Parser, Debug)]
#[command(name = "emotune-server")]
#[command(about = "Music catalog service with selfie-based mood detection")]
#[command(version)]
struct Args {
    /// Config file (default: ~/.config/emotune/config.toml, then /etc/emotune/config.toml)
    #[arg(short, long, env = "EMOTUNE_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to listen on
    #[arg(long, env = "EMOTUNE_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "EMOTUNE_PORT")]
    port: Option<u16>,

    /// SQLite catalog database
    #[arg(short, long, env = "EMOTUNE_DATABASE")]
    database: Option<PathBuf>,

    /// ONNX emotion model
    #[arg(short, long, env = "EMOTUNE_MODEL_PATH")]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Loaded before tracing starts, so the source is logged below
    let (mut config, config_source) = TomlConfig::load_with_source(args.config.as_deref())?;
    config.apply_env();
    config.apply_overrides(ConfigOverrides {
        host: args.host,
        port: args.port,
        database_path: args.database,
        model_path: args.model,
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    info!(
        "Starting emotune-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_source {
        Some(path) => info!("Config file: {}", path.display()),
        None => warn!("No config file found, using compiled defaults"),
    }

    config.validate()?;

    info!("Database path: {}", config.database_path.display());
    let pool = db::init_database(&config.database_path)
        .await
        .context("Failed to open catalog database")?;

    info!("Model path: {}", config.classifier.model_path.display());
    let classifier: Arc<dyn EmotionClassifier> = Arc::new(
        OnnxEmotionClassifier::load(&config.classifier)
            .context("Failed to load emotion classifier")?,
    );

    let storage: Arc<dyn MediaStorage> = match CloudinaryStorage::from_config(&config.storage) {
        Some(storage) => {
            info!("Media storage: {:?}", storage);
            Arc::new(storage)
        }
        None => {
            warn!("Media storage credentials not configured; uploads and deletes will fail");
            Arc::new(DisabledStorage)
        }
    };

    let token_ttl = config
        .auth
        .token_ttl()
        .context("Token lifetime out of range")?;
    let tokens = TokenKeys::new(&config.auth.jwt_secret, token_ttl)?;

    let state = AppState::new(pool, tokens, classifier, storage, config.auth.password_cost);
    let app = build_router(state).layer(cors_layer(&config.cors.allowed_origins)?);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("emotune-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
