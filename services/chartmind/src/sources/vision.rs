//! Vision/OCR sidecar client
//!
//! The sidecar owns the pixel work (edge detection, candle contours, OCR).
//! This client ships raw image bytes to it and maps the answers into
//! engine types.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use super::{HealthTracker, REQUEST_TIMEOUT_SECS};
use crate::context::find_pair;
use crate::types::{EngineError, PairDetector, SourceHealth, VisionProvider, VisionReport};

pub const UNKNOWN_PAIR: &str = "unknown";

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
}

pub struct VisionClient {
    client: Client,
    features_url: Url,
    ocr_url: Url,
    health: HealthTracker,
}

impl VisionClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("Invalid vision URL: {}", base_url))?;
        // keep any path prefix when joining endpoints
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            features_url: base.join("features")?,
            ocr_url: base.join("ocr")?,
            health: HealthTracker::new(),
        })
    }

    pub fn health(&self) -> SourceHealth {
        self.health.snapshot("vision")
    }

    async fn post_image(&self, url: &Url, image: &[u8]) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
    }

    async fn fetch_report(&self, image: &[u8]) -> crate::types::Result<VisionReport> {
        let response = self
            .post_image(&self.features_url, image)
            .await
            .map_err(|e| EngineError::Source(format!("vision request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // the sidecar answers 4xx when it cannot decode the upload
            return Err(match status {
                StatusCode::BAD_REQUEST
                | StatusCode::UNSUPPORTED_MEDIA_TYPE
                | StatusCode::UNPROCESSABLE_ENTITY => EngineError::Image(text),
                _ => EngineError::Source(format!("vision error: {} - {}", status, text)),
            });
        }

        response
            .json::<VisionReport>()
            .await
            .map_err(|e| EngineError::Source(format!("invalid vision response: {}", e)))
    }

    async fn fetch_text(&self, image: &[u8]) -> Result<String> {
        let response = self
            .post_image(&self.ocr_url, image)
            .await
            .context("Failed to send OCR request")?
            .error_for_status()
            .context("OCR request rejected")?;
        let ocr: OcrResponse = response.json().await.context("Failed to parse OCR response")?;
        Ok(ocr.text)
    }
}

#[async_trait::async_trait]
impl VisionProvider for VisionClient {
    async fn extract(&self, image: &[u8]) -> crate::types::Result<VisionReport> {
        if image.is_empty() {
            return Err(EngineError::Image("empty upload".to_string()));
        }

        let start = Instant::now();
        match self.fetch_report(image).await {
            Ok(report) => {
                self.health.record_success(start.elapsed().as_millis() as u64);
                debug!(
                    "Vision data: {}x{} {:?}",
                    report.width, report.height, report.features
                );
                Ok(report)
            }
            Err(EngineError::Image(reason)) => {
                // the sidecar itself is fine
                self.health.record_success(start.elapsed().as_millis() as u64);
                Err(EngineError::Image(reason))
            }
            Err(e) => {
                self.health.record_failure(&e.to_string());
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "vision"
    }
}

#[async_trait::async_trait]
impl PairDetector for VisionClient {
    async fn detect_pair(&self, image: &[u8]) -> String {
        match self.fetch_text(image).await {
            Ok(text) => match find_pair(&text) {
                Some(pair) => {
                    debug!("Pair detected via OCR: {}", pair);
                    pair.to_string()
                }
                None => {
                    debug!("Pair OCR found no known pair");
                    UNKNOWN_PAIR.to_string()
                }
            },
            Err(e) => {
                warn!("Pair OCR failed: {:#}", e);
                UNKNOWN_PAIR.to_string()
            }
        }
    }
}
