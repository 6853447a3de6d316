use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use chartmind::config::Settings;
use chartmind::{FeedbackLedger, NewsClient, SignalEngine, VisionClient};

/// Application state shared across handlers
pub struct AppState {
    pub engine: SignalEngine,
    pub vision: Arc<VisionClient>,
    pub news: Option<Arc<NewsClient>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let settings = Settings::load()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(settings.tracing_level())
        .init();

    info!("Starting ChartMind signal service...");

    let vision = Arc::new(VisionClient::new(&settings.vision_url)?);
    info!("✓ Vision sidecar at {}", settings.vision_url);

    let news = match settings.news_token.as_deref() {
        Some(token) => {
            let client = Arc::new(NewsClient::new(&settings.news_url, Some(token))?);
            info!("✓ News feed configured");
            Some(client)
        }
        None => {
            warn!("⚠ No news token set, news impact counts as 0");
            None
        }
    };

    let ledger = Arc::new(FeedbackLedger::open(&settings.ledger_path).await?);
    info!("✓ Feedback ledger loaded");

    let mut engine = SignalEngine::new(
        settings.engine_config(),
        vision.clone(),
        vision.clone(),
        ledger,
    );
    if let Some(news) = news.as_ref() {
        engine = engine.with_news(news.clone());
    }

    if settings.replay_ledger {
        let replayed = engine.replay_ledger().await;
        info!("✓ Learning state rebuilt from {} outcomes", replayed);
    }

    let state = Arc::new(AppState {
        engine,
        vision,
        news,
    });

    // Build router
    let app = Router::new()
        .route("/analyze", post(handlers::analyze))
        .route("/feedback", post(handlers::feedback))
        .route("/accuracy", get(handlers::accuracy))
        .route("/stats", get(handlers::stats))
        .route("/news", get(handlers::news))
        .route("/health", get(handlers::health_check))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes()))
        .layer(CorsLayer::new().allow_origin(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    info!("🚀 ChartMind listening on port {}", settings.port);

    axum::serve(listener, app).await?;

    Ok(())
}

mod handlers;
