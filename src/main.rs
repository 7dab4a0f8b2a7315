use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use giftwise::config::AppConfig;
use giftwise::llm::create_provider;
use giftwise::pipeline::RecommendationPipeline;
use giftwise::retail::create_retailers;
use giftwise::scrape::{ApifyScraper, Scraper};
use giftwise::server::{AppState, api_routes};
use giftwise::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Stderr always; a daily-rolling file as well when a log dir is set.
    let (file_layer, _log_guard) = match &config.server.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "giftwise.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    eprintln!("🎁 giftwise v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   API: http://{}", config.server.bind);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.server.db_path)
            .await
            .with_context(|| {
                format!("Failed to open database at {}", config.server.db_path.display())
            })?,
    );
    eprintln!("   Database: {}", config.server.db_path.display());

    // ── Vendors ──────────────────────────────────────────────────────────
    let llm = create_provider(&config.llm).context("Failed to create LLM provider")?;

    let scraper: Option<Arc<dyn Scraper>> = ApifyScraper::from_config(&config.apify)
        .map(|s| Arc::new(s) as Arc<dyn Scraper>);
    eprintln!(
        "   Scraping: {}",
        if scraper.is_some() { "enabled" } else { "disabled (no APIFY_TOKEN)" }
    );

    let retailers = create_retailers(&config.retailers);
    if retailers.is_empty() {
        tracing::warn!("No affiliate retailers configured; every session will fail at search");
    }
    eprintln!("   Retailers: {}", retailers.len());

    // ── Pipeline + HTTP ──────────────────────────────────────────────────
    let pipeline = Arc::new(RecommendationPipeline::new(
        Arc::clone(&db),
        scraper.clone(),
        llm,
        retailers,
        config.search.clone(),
        config.apify.cache_window,
    ));

    let app = api_routes(AppState {
        db,
        scraper,
        pipeline,
        cache_window: config.apify.cache_window,
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "HTTP server started");
    axum::serve(listener, app).await.context("HTTP server error")?;

    Ok(())
}
