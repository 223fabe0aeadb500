use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jobmatch::backend::{ActiveResumeSource, BackendClient, HttpJobActions};
use jobmatch::board::JobBoard;
use jobmatch::cache::{MatchCache, SystemClock};
use jobmatch::config::Config;
use jobmatch::matching::{AiMatchStrategy, FallbackResolver, StandardMatchStrategy};
use jobmatch::routes::build_router;
use jobmatch::state::AppState;
use jobmatch::store::{MemoryStore, PersistedStore, RedisStore};

const REDIS_KEY_PREFIX: &str = "jobmatch:";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobmatch v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    // Every backend call shares one HTTP client and session token
    let backend = BackendClient::new(
        &config.jobs_api_url,
        config.jobs_api_token.clone(),
        config.http_timeout(),
    );
    info!("Jobs API client initialized ({})", config.jobs_api_url);

    let cache = MatchCache::new(
        store,
        Arc::new(ActiveResumeSource::new(backend.clone())),
        Arc::new(SystemClock),
        config.cache_policy(),
    );
    let resolver = FallbackResolver::new(
        cache,
        Arc::new(AiMatchStrategy::new(backend.clone())),
        Arc::new(StandardMatchStrategy::new(backend.clone())),
    );
    let board = Arc::new(JobBoard::new(
        resolver,
        Arc::new(HttpJobActions::new(backend)),
    ));

    let state = AppState {
        board,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Redis when `REDIS_URL` is set, otherwise a process-local store.
async fn build_store(config: &Config) -> Result<Arc<dyn PersistedStore>> {
    match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
            let store = RedisStore::connect(&client, REDIS_KEY_PREFIX)
                .await
                .context("Could not connect to Redis")?;
            Ok(Arc::new(store))
        }
        None => {
            info!("REDIS_URL not set, match cache is in-memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
