use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::AppState;
use chartmind::{
    AccuracyFilter, AnalysisResponse, AnalyzeRequest, EngineError, EngineSnapshot,
    FeedbackSummary, Headline, Market, NewsFeed, SourceHealth,
};

type ApiError = (StatusCode, String);

fn error_response(err: EngineError) -> ApiError {
    let status = match err {
        EngineError::Image(_) => StatusCode::BAD_REQUEST,
        EngineError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::Source(_) => StatusCode::BAD_GATEWAY,
    };
    warn!("Request failed ({}): {}", status, err);
    (status, err.to_string())
}

/// "auto" or empty lets the classifier pick; other unknown labels fall back to binary
fn parse_market_field(label: &str) -> Option<Market> {
    let label = label.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("auto") {
        return None;
    }
    Some(Market::parse(label).unwrap_or_default())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .ok_or_else(|| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("timestamp must be epoch seconds, got '{}'", value),
            )
        })
}

/// POST /analyze - multipart upload: chart, market?, timestamp?
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let mut request = AnalyzeRequest::default();
    let mut has_chart = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chart" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                request.image = bytes.to_vec();
                has_chart = true;
            }
            "market" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                request.market = parse_market_field(&text);
            }
            "timestamp" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                request.timestamp = Some(parse_timestamp(&text)?);
            }
            _ => {}
        }
    }

    if !has_chart {
        return Err((StatusCode::BAD_REQUEST, "No image uploaded".to_string()));
    }

    info!(
        "Analyze request: {} bytes, market {:?}",
        request.image.len(),
        request.market
    );

    state
        .engine
        .analyze(request)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Debug, serde::Deserialize)]
pub struct FeedbackRequest {
    pub signal_id: String,
    pub market: String,
    pub pair: String,
    pub result: String,
}

/// POST /feedback - report a win/loss for a signal
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedbackRequest>,
) -> Result<Json<FeedbackSummary>, ApiError> {
    state
        .engine
        .submit_feedback(&req.signal_id, &req.market, &req.pair, &req.result)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /accuracy?signal_id=&market=&pair=
pub async fn accuracy(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<AccuracyFilter>,
) -> Json<AccuracyResponse> {
    Json(AccuracyResponse {
        accuracy: state.engine.accuracy(&filter).await,
    })
}

/// GET /stats - win rate per market|pair
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats_by_market_pair: state.engine.stats().await,
    })
}

/// GET /news - scored headlines, empty when the feed is down or not configured
pub async fn news(State(state): State<Arc<AppState>>) -> Json<Vec<Headline>> {
    let Some(client) = state.news.as_ref() else {
        return Json(Vec::new());
    };
    Json(client.headlines().await.unwrap_or_default())
}

/// GET /health - client health plus engine state
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mut sources = vec![state.vision.health()];
    if let Some(news) = state.news.as_ref() {
        sources.push(news.health());
    }

    let all_healthy = sources.iter().all(|h| h.is_healthy);

    Json(HealthResponse {
        status: if all_healthy { "healthy".to_string() } else { "degraded".to_string() },
        sources,
        engine: state.engine.snapshot().await,
    })
}

// Response types
#[derive(Debug, serde::Serialize)]
pub struct AccuracyResponse {
    pub accuracy: f64,
}

#[derive(Debug, serde::Serialize)]
pub struct StatsResponse {
    pub stats_by_market_pair: BTreeMap<String, f64>,
}

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub sources: Vec<SourceHealth>,
    pub engine: EngineSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_field() {
        assert_eq!(parse_market_field("auto"), None);
        assert_eq!(parse_market_field(""), None);
        assert_eq!(parse_market_field("forex_gold"), Some(Market::ForexGold));
        assert_eq!(parse_market_field("stocks"), Some(Market::Binary));
    }

    #[test]
    fn test_timestamp_field() {
        let ts = parse_timestamp("1714564800").unwrap();
        assert_eq!(ts.timestamp(), 1_714_564_800);
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (EngineError::Image("x".into()), StatusCode::BAD_REQUEST),
            (EngineError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (EngineError::Persistence("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (EngineError::Source("x".into()), StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(error_response(err).0, status);
        }
    }
}
