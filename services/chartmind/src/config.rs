//! Service settings: defaults overlaid by CHARTMIND_* environment variables

use anyhow::{Context, Result};
use ::config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;

use crate::engine::EngineConfig;
use crate::sources::news::DEFAULT_NEWS_URL;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub port: u16,
    pub ledger_path: String,
    pub vision_url: String,
    pub news_url: String,
    /// Finnhub API token; news is skipped without one
    #[serde(default)]
    pub news_token: Option<String>,
    pub base_confidence: u8,
    pub probability_enabled: bool,
    /// Rebuild learning state from the ledger at start-up
    pub replay_ledger: bool,
    pub log_level: String,
    pub max_upload_mb: usize,
}

impl Settings {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let settings = Config::builder()
            .set_default("port", 5000_i64)?
            .set_default("ledger_path", "data/feedback.jsonl")?
            .set_default("vision_url", "http://localhost:8500")?
            .set_default("news_url", DEFAULT_NEWS_URL)?
            .set_default("base_confidence", 66_i64)?
            .set_default("probability_enabled", false)?
            .set_default("replay_ledger", false)?
            .set_default("log_level", "info")?
            .set_default("max_upload_mb", 5_i64)?
            .add_source(
                Environment::with_prefix("CHARTMIND")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()
            .context("Failed to read settings")?;

        settings
            .try_deserialize()
            .context("Invalid CHARTMIND_* settings")
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            base_confidence: self.base_confidence,
            probability_enabled: self.probability_enabled,
            ..EngineConfig::default()
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::build(Some(HashMap::new())).unwrap();
        assert_eq!(settings.port, 5000);
        assert_eq!(settings.ledger_path, "data/feedback.jsonl");
        assert_eq!(settings.base_confidence, 66);
        assert!(settings.news_token.is_none());
        assert!(!settings.probability_enabled);
        assert_eq!(settings.max_upload_bytes(), 5 * 1024 * 1024);
        assert_eq!(settings.tracing_level(), tracing::Level::INFO);

        let engine = settings.engine_config();
        assert_eq!(engine.latency_limit_secs, 120);
        assert_eq!(engine.min_width, 300);
    }

    #[test]
    fn test_environment_overrides() {
        let vars = HashMap::from([
            ("CHARTMIND_PORT".to_string(), "8088".to_string()),
            ("CHARTMIND_BASE_CONFIDENCE".to_string(), "72".to_string()),
            ("CHARTMIND_PROBABILITY_ENABLED".to_string(), "true".to_string()),
            ("CHARTMIND_NEWS_TOKEN".to_string(), "abc".to_string()),
            ("CHARTMIND_LOG_LEVEL".to_string(), "debug".to_string()),
        ]);
        let settings = Settings::build(Some(vars)).unwrap();
        assert_eq!(settings.port, 8088);
        assert_eq!(settings.news_token.as_deref(), Some("abc"));
        assert_eq!(settings.tracing_level(), tracing::Level::DEBUG);

        let engine = settings.engine_config();
        assert_eq!(engine.base_confidence, 72);
        assert!(engine.probability_enabled);
    }
}
