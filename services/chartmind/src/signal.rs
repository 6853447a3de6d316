//! Trade proposals - output of the market rule sets

use serde::{Deserialize, Serialize};

use crate::types::{DirectionHint, Market, MomentumTier, TrendBias, VisionFeatures};

/// Adjusted confidence below this never trades
pub const MIN_CONFIDENCE: u8 = 60;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Binary up
    Call,
    /// Binary down
    Put,
    Buy,
    Sell,
}

impl Direction {
    pub fn is_bullish(&self) -> bool {
        matches!(self, Direction::Call | Direction::Buy)
    }
}

/// Directional trade proposal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalProposal {
    pub tradable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_or_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_reward: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SignalProposal {
    pub fn no_trade(reason: &str, confidence: u8) -> Self {
        Self {
            tradable: false,
            direction: None,
            expiry_or_style: None,
            risk_reward: None,
            confidence: Some(confidence),
            reason: Some(reason.to_string()),
        }
    }

    fn trade(direction: Direction, expiry_or_style: &str, confidence: u8, reason: String) -> Self {
        Self {
            tradable: true,
            direction: Some(direction),
            expiry_or_style: Some(expiry_or_style.to_string()),
            risk_reward: None,
            confidence: Some(confidence),
            reason: Some(reason),
        }
    }

    fn with_risk_reward(mut self, risk_reward: &str) -> Self {
        self.risk_reward = Some(risk_reward.to_string());
        self
    }
}

/// Turn features + context into a trade proposal using the market's rule set
pub fn synthesize(features: &VisionFeatures, market: Market, confidence: u8) -> SignalProposal {
    let tier = features.momentum_tier();
    match market {
        Market::Binary => binary_signal(features.trend_bias, tier, confidence),
        Market::Forex | Market::ForexGold | Market::Crypto => {
            forex_style_signal(market, features.direction_hint, tier, confidence)
        }
    }
}

fn binary_signal(trend: TrendBias, tier: MomentumTier, confidence: u8) -> SignalProposal {
    if confidence < MIN_CONFIDENCE {
        return SignalProposal::no_trade("Low confidence", confidence);
    }
    if tier == MomentumTier::Weak {
        return SignalProposal::no_trade("Weak momentum", confidence);
    }

    let direction = if trend == TrendBias::Bullish {
        Direction::Call
    } else {
        Direction::Put
    };
    let expiry = if tier == MomentumTier::Strong {
        "2–3 candles"
    } else {
        "1–2 candles"
    };

    SignalProposal::trade(
        direction,
        expiry,
        confidence,
        format!("{} momentum {}", Market::Binary.label(), tier),
    )
}

fn forex_style_signal(
    market: Market,
    hint: DirectionHint,
    tier: MomentumTier,
    confidence: u8,
) -> SignalProposal {
    if confidence < MIN_CONFIDENCE {
        return SignalProposal::no_trade("Low confidence", confidence);
    }

    let direction = match hint {
        DirectionHint::Bullish => Direction::Buy,
        DirectionHint::Bearish => Direction::Sell,
    };
    let (style, risk_reward) = if tier == MomentumTier::Strong {
        ("SCALPING/INTRADAY", "1:1.5–1:2")
    } else {
        ("INTRADAY/SWING", "1:2–1:3")
    };

    SignalProposal::trade(
        direction,
        style,
        confidence,
        format!("{} momentum {}", market.label(), tier),
    )
    .with_risk_reward(risk_reward)
}
