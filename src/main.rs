// watchscrape service binary.
//
// Wires configuration, the shared store, the browser-driven scrape
// engine, the job processor, and the HTTP API together, then serves
// until SIGINT/SIGTERM with a bounded grace window for in-flight jobs.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use watchscrape::browser::{BrowserDriver, DriverConfig, cleanup_stale_profiles};
use watchscrape::config::ServiceConfig;
use watchscrape::engine::{EngineConfig, ScrapeEngine};
use watchscrape::http::{self, AppState};
use watchscrape::jobs::{JobQueue, Processor, ProcessorConfig, QueueConfig};
use watchscrape::metadata::{KindOverrides, MetadataClient, TmdbClient};
use watchscrape::session::SessionStore;
use watchscrape::store::{MetadataCache, Store, WatchlistCache};
use watchscrape::utils::constants::FLIGHT_MARKER_TTL_SECS;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env().context("configuration error")?;
    info!(port = config.port, "starting watchscrape");

    if let Err(e) = cleanup_stale_profiles() {
        warn!("stale profile cleanup failed: {e}");
    }

    let store = Store::connect(&config.redis_url)
        .await
        .context("key-value store connection failed")?;

    let sessions = Arc::new(
        SessionStore::new(&config.session_dir).context("session store initialization failed")?,
    );
    let driver = Arc::new(BrowserDriver::new(
        DriverConfig {
            headless: config.headless,
        },
        sessions,
    ));

    let tmdb = TmdbClient::new(config.metadata_api_key.clone(), config.metadata_rate_rps);
    let metadata_cache = MetadataCache::new(store.clone(), config.metadata_ttl);
    let overrides = KindOverrides::load(config.kind_overrides_path.as_deref());
    let metadata = Arc::new(MetadataClient::new(tmdb, metadata_cache, overrides));

    let cache = WatchlistCache::new(store.clone(), config.cache_ttl);

    let engine = Arc::new(ScrapeEngine::new(
        Arc::clone(&driver),
        metadata,
        cache.clone(),
        EngineConfig {
            max_concurrent_scrapes: config.max_concurrent_scrapes,
            ..EngineConfig::default()
        },
    ));

    let queue = Arc::new(JobQueue::new(
        store.clone(),
        QueueConfig {
            job_ttl: config.job_ttl,
            flight_marker_ttl: std::time::Duration::from_secs(FLIGHT_MARKER_TTL_SECS),
            max_pending: config.queue_max_pending,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let processor = Processor::new(
        Arc::clone(&queue),
        Arc::clone(&engine),
        cache.clone(),
        ProcessorConfig {
            max_attempts: config.max_job_attempts,
            retry_backoff_base: config.retry_backoff_base,
            retry_backoff_max: config.retry_backoff_max,
            job_deadline: config.job_deadline,
            stuck_job_timeout: config.stuck_job_timeout,
        },
    );
    let processor_future: std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> =
        Box::pin(run_processor(processor, shutdown_rx));
    let processor_handle = tokio::spawn(processor_future);

    let state = AppState {
        queue,
        cache,
        store,
        worker_secret: Arc::new(config.worker_secret.clone()),
        sync_wait: config.sync_wait,
        started_at: Instant::now(),
    };
    let app = http::router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop dequeueing, give in-flight jobs a bounded grace window, then
    // force the browser down. Jobs left in `processing` are picked up by
    // stuck-job recovery on the next instance.
    info!("shutting down, grace {}s", config.shutdown_grace.as_secs());
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(config.shutdown_grace, processor_handle)
        .await
        .is_err()
    {
        warn!("processor did not stop within grace window");
    }
    driver.shutdown().await;

    info!("shutdown complete");
    Ok(())
}

async fn run_processor(processor: Processor, shutdown: watch::Receiver<bool>) {
    processor.run(shutdown).await;
}

fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(&level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => warn!("failed to install SIGTERM handler: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
