use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trend read off the chart by the vision stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendBias {
    #[serde(alias = "bullish_bias")]
    Bullish,
    #[serde(alias = "bearish_bias")]
    Bearish,
    #[serde(alias = "range_bias")]
    Range,
    Unknown,
}

/// Candle-region direction hint from the vision stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionHint {
    Bullish,
    Bearish,
}

/// Categorical momentum strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumTier {
    Weak,
    Medium,
    Strong,
}

impl MomentumTier {
    /// Tier from the bottom/top region intensity delta
    pub fn from_strength(strength: f64) -> Self {
        if strength > 25.0 {
            MomentumTier::Strong
        } else if strength > 15.0 {
            MomentumTier::Medium
        } else {
            MomentumTier::Weak
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MomentumTier::Weak => "WEAK",
            MomentumTier::Medium => "MEDIUM",
            MomentumTier::Strong => "STRONG",
        }
    }
}

impl fmt::Display for MomentumTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-image scalar features produced by the vision stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionFeatures {
    pub clarity_ok: bool,
    #[serde(alias = "candles_detected")]
    pub candle_count: usize,
    pub avg_candle_size: f64,
    pub trend_bias: TrendBias,
    pub direction_hint: DirectionHint,
    pub momentum_strength: f64,
}

impl VisionFeatures {
    pub fn momentum_tier(&self) -> MomentumTier {
        MomentumTier::from_strength(self.momentum_strength)
    }
}

/// Vision sidecar output: image dimensions plus features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionReport {
    pub width: u32,
    pub height: u32,
    pub features: VisionFeatures,
}

/// Market family, selects the signal rule set
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Crypto,
    Forex,
    ForexGold,
    #[default]
    Binary,
}

impl Market {
    pub const ALL: [Market; 4] = [Market::Crypto, Market::Forex, Market::ForexGold, Market::Binary];

    /// Parse a market label. Returns None for unknown labels and for "auto".
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "crypto" => Some(Market::Crypto),
            "forex" => Some(Market::Forex),
            "forex_gold" | "gold" => Some(Market::ForexGold),
            "binary" => Some(Market::Binary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Crypto => "crypto",
            Market::Forex => "forex",
            Market::ForexGold => "forex_gold",
            Market::Binary => "binary",
        }
    }

    /// Human-readable label used in signal reasons
    pub fn label(&self) -> &'static str {
        match self {
            Market::Crypto => "Crypto",
            Market::Forex => "Forex",
            Market::ForexGold => "Forex Gold",
            Market::Binary => "Binary",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading session by UTC hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Asia,
    London,
    NewYork,
    Overlap,
}

/// Categorical context for one analysis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    pub pair: String,
    pub market: Market,
    pub session: Session,
}

/// Reported trade outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    /// Parse a user-supplied result ("win" / "loss", any case)
    pub fn parse(result: &str) -> Result<Self> {
        match result.trim().to_lowercase().as_str() {
            "win" => Ok(Outcome::Win),
            "loss" => Ok(Outcome::Loss),
            other => Err(EngineError::Validation(format!(
                "result must be 'win' or 'loss', got '{}'",
                other
            ))),
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Win)
    }
}

/// Scored news headline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub headline: String,
    pub source: String,
    pub datetime: i64,
    pub impact_score: i32,
}

/// External source health/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub source: String,
    pub is_healthy: bool,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
}

/// Error types for the signal engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid image: {0}")]
    Image(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Ledger write failed: {0}")]
    Persistence(String),

    #[error("Source unavailable: {0}")]
    Source(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Turns chart screenshots into vision features
#[async_trait::async_trait]
pub trait VisionProvider: Send + Sync {
    /// Extract dimensions and features. Fails with `EngineError::Image`
    /// on unreadable input.
    async fn extract(&self, image: &[u8]) -> Result<VisionReport>;

    /// Source name
    fn name(&self) -> &str;
}

/// Reads the traded pair off a chart screenshot
#[async_trait::async_trait]
pub trait PairDetector: Send + Sync {
    /// Detected pair, or "unknown". Never fails.
    async fn detect_pair(&self, image: &[u8]) -> String;
}

/// Market news headlines with impact scores
#[async_trait::async_trait]
pub trait NewsFeed: Send + Sync {
    async fn headlines(&self) -> Result<Vec<Headline>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_momentum_tier_thresholds() {
        assert_eq!(MomentumTier::from_strength(30.0), MomentumTier::Strong);
        assert_eq!(MomentumTier::from_strength(25.0), MomentumTier::Medium);
        assert_eq!(MomentumTier::from_strength(15.5), MomentumTier::Medium);
        assert_eq!(MomentumTier::from_strength(15.0), MomentumTier::Weak);
        assert_eq!(MomentumTier::from_strength(0.0), MomentumTier::Weak);
    }

    #[test]
    fn test_outcome_parse() {
        assert_eq!(Outcome::parse("win").unwrap(), Outcome::Win);
        assert_eq!(Outcome::parse("LOSS").unwrap(), Outcome::Loss);
        assert!(matches!(
            Outcome::parse("draw"),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_market_parse() {
        assert_eq!(Market::parse("forex_gold"), Some(Market::ForexGold));
        assert_eq!(Market::parse(" Binary "), Some(Market::Binary));
        assert_eq!(Market::parse("auto"), None);
        assert_eq!(Market::default(), Market::Binary);
    }

    #[test]
    fn test_vision_features_accept_sidecar_labels() {
        let json = r#"{
            "clarity_ok": true,
            "candles_detected": 12,
            "avg_candle_size": 18.5,
            "trend_bias": "bullish_bias",
            "direction_hint": "bearish",
            "momentum_strength": 27.0
        }"#;
        let features: VisionFeatures = serde_json::from_str(json).unwrap();
        assert_eq!(features.candle_count, 12);
        assert_eq!(features.trend_bias, TrendBias::Bullish);
        assert_eq!(features.momentum_tier(), MomentumTier::Strong);
    }
}
