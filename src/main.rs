use std::sync::Arc;

use tracing::{error, info, warn};

use filevault::auth::{InMemorySessionStore, SessionManager, SessionStore};
use filevault::config::SessionBackend;
use filevault::file::{BlobStore, FileService, LocalBlobStore};
use filevault::queue::{JobQueue, QueueRunner};
use filevault::thumbnail::{requeue_missing, ThumbnailJob, ThumbnailWorker};
use filevault::web::{AppState, WebServer};
use filevault::{Config, Database, Result, VaultError};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = filevault::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        filevault::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;
    info!("filevault starting");

    let db = Database::open(&config.database.path).await?;
    let sessions = SessionManager::from_config(open_session_store(&config).await?, &config.session);
    info!("Session backend: {}", sessions.backend_name());

    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        &config.storage.root,
        config.storage.io_timeout(),
    )?);

    let (thumbnails, receiver) = JobQueue::<ThumbnailJob>::channel();
    let runner = QueueRunner::new(
        thumbnails.clone(),
        receiver,
        ThumbnailWorker::new(db.clone(), blobs.clone()),
    )
    .with_config(&config.queue)
    .spawn();

    match requeue_missing(&db, blobs.as_ref(), &thumbnails).await {
        Ok(0) => {}
        Ok(n) => info!("Queued {} images with missing thumbnails", n),
        Err(e) => warn!("Thumbnail reconciliation failed: {}", e),
    }

    let files = FileService::new(db.clone(), blobs, thumbnails);
    let state = AppState::new(db.clone(), sessions, files);
    let server = WebServer::new(&config.server, &config.storage, state)?;

    server.run(shutdown_signal()).await?;

    runner.abort();
    db.close().await;
    info!("filevault stopped");
    Ok(())
}

async fn open_session_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    match config.session.backend {
        SessionBackend::Memory => {
            let store = Arc::new(InMemorySessionStore::new());
            store.spawn_sweeper(config.session.sweep_interval());
            Ok(store)
        }
        #[cfg(feature = "redis")]
        SessionBackend::Redis => {
            let store = filevault::auth::RedisSessionStore::connect(&config.session.redis_url)
                .await
                .map_err(|e| VaultError::Session(e.to_string()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        SessionBackend::Redis => Err(VaultError::Config(
            "session backend \"redis\" requires the redis feature".to_string(),
        )),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
