//! feed-curator binary entrypoint.
//! Loads config, seeds sources, wires the store, ingestor, analyzer and
//! ranker into the Axum router, and serves until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::cors::CorsLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feed_curator::analyze::ContentAnalyzer;
use feed_curator::api::{self, AppState};
use feed_curator::config::AppConfig;
use feed_curator::ingest::fetcher::HttpFetcher;
use feed_curator::ingest::import::{import_sources, load_opml_file};
use feed_curator::ingest::Ingestor;
use feed_curator::metrics::Metrics;
use feed_curator::recommend::Recommender;
use feed_curator::store::{MemoryStore, Store};

const ENV_LOG_FORMAT: &str = "CURATOR_LOG_FORMAT";

/// Compact logs by default, JSON lines when CURATOR_LOG_FORMAT=json.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("feed_curator=info,warn"));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn seed_sources(cfg: &AppConfig, store: &dyn Store) -> Result<()> {
    let mut feeds = cfg.feeds.sources.clone();
    if let Some(path) = cfg.feeds.opml_path.as_deref() {
        let from_opml = load_opml_file(path)?;
        tracing::info!(target: "ingest", path = %path.display(), feeds = from_opml.len(), "opml loaded");
        feeds.extend(from_opml);
    }
    if feeds.is_empty() {
        return Ok(());
    }
    let summary = import_sources(store, &feeds)
        .await
        .context("registering configured sources")?;
    tracing::info!(
        target: "ingest",
        created = summary.created,
        existing = summary.existing,
        "sources seeded"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load()?;
    let metrics = Metrics::init()?;

    let memory = Arc::new(
        MemoryStore::open(cfg.store.snapshot_path.clone()).context("opening store")?,
    );
    let store: Arc<dyn Store> = memory.clone();
    seed_sources(&cfg, store.as_ref()).await?;

    let analyzer = ContentAnalyzer::from_config(&cfg.analyzer)?;
    let fetcher = HttpFetcher::new(cfg.fetch_timeout(), &cfg.fetch.user_agent)
        .context("building http client")?;
    let ingestor = Ingestor::new(store.clone(), Arc::new(fetcher), cfg.ingest_settings());
    let recommender = Recommender::with_settings(
        store.clone(),
        cfg.recommend.horizon_days,
        cfg.recommend.default_limit,
    );

    let state = AppState {
        store,
        ingestor: ingestor.clone(),
        analyzer: Arc::new(analyzer),
        recommender: Arc::new(recommender),
    };

    let mut app = api::router(state).merge(metrics.router());
    if cfg.server.cors {
        app = app.layer(CorsLayer::very_permissive());
    }

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(target: "api", bind = %cfg.server.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    ingestor.shutdown().await;
    memory.save().context("saving snapshot")?;
    tracing::info!(target: "api", "stopped");
    Ok(())
}
