//! Technical read of the candle heights: levels, momentum, volatility, bias

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{round2, synthetic_heights};
use crate::types::VisionFeatures;

/// Minimum sample size for momentum and volatility
const MIN_SAMPLES: usize = 10;
/// Candles averaged at each end for momentum
const MOMENTUM_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Low,
    Medium,
    High,
}

/// Round-number attraction, grows with candle size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundNumberForce {
    Weak,
    Medium,
    Strong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalFeatures {
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub momentum: f64,
    pub volatility: Volatility,
    pub round_number_force: RoundNumberForce,
    pub bias_score: i32,
}

/// Run the technical analyzer on vision output
pub fn analyze(features: &VisionFeatures) -> TechnicalFeatures {
    let heights = synthetic_heights(features.candle_count, features.avg_candle_size);
    let tech = analyze_heights(&heights, features.avg_candle_size);
    debug!("Technical analysis: {:?}", tech);
    tech
}

pub fn analyze_heights(heights: &[f64], avg_candle_size: f64) -> TechnicalFeatures {
    let (support, resistance) = support_resistance(heights);
    let momentum = momentum_score(heights);
    let volatility = volatility_level(heights);
    let round_number_force = round_number_force(avg_candle_size);

    let mut bias_score = if momentum > 0.0 { 1 } else { -1 };
    if volatility == Volatility::Medium {
        bias_score += 1;
    }
    if round_number_force == RoundNumberForce::Strong {
        bias_score += 1;
    }

    TechnicalFeatures {
        support,
        resistance,
        momentum,
        volatility,
        round_number_force,
        bias_score,
    }
}

/// 25th / 75th percentile of the heights
pub fn support_resistance(heights: &[f64]) -> (Option<f64>, Option<f64>) {
    if heights.is_empty() {
        return (None, None);
    }
    let mut sorted = heights.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    (
        Some(round2(percentile(&sorted, 25.0))),
        Some(round2(percentile(&sorted, 75.0))),
    )
}

/// Linear-interpolated percentile over a sorted, non-empty slice
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Mean of the first five heights minus mean of the last five
pub fn momentum_score(heights: &[f64]) -> f64 {
    if heights.len() < MIN_SAMPLES {
        return 0.0;
    }
    let recent = mean(&heights[..MOMENTUM_WINDOW]);
    let past = mean(&heights[heights.len() - MOMENTUM_WINDOW..]);
    round2(recent - past)
}

pub fn volatility_level(heights: &[f64]) -> Volatility {
    if heights.len() < MIN_SAMPLES {
        return Volatility::Low;
    }
    let avg = mean(heights);
    let variance = heights.iter().map(|h| (h - avg).powi(2)).sum::<f64>() / heights.len() as f64;
    let std = variance.sqrt();

    if std < 10.0 {
        Volatility::Low
    } else if std < 25.0 {
        Volatility::Medium
    } else {
        Volatility::High
    }
}

pub fn round_number_force(avg_candle_size: f64) -> RoundNumberForce {
    if avg_candle_size > 40.0 {
        RoundNumberForce::Strong
    } else if avg_candle_size > 20.0 {
        RoundNumberForce::Medium
    } else {
        RoundNumberForce::Weak
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirectionHint, TrendBias};

    fn vision(count: usize, avg: f64) -> VisionFeatures {
        VisionFeatures {
            clarity_ok: true,
            candle_count: count,
            avg_candle_size: avg,
            trend_bias: TrendBias::Unknown,
            direction_hint: DirectionHint::Bullish,
            momentum_strength: 0.0,
        }
    }

    #[test]
    fn test_no_candles_has_no_levels() {
        let tech = analyze(&vision(0, 0.0));
        assert_eq!(tech.support, None);
        assert_eq!(tech.resistance, None);
        assert_eq!(tech.momentum, 0.0);
        assert_eq!(tech.volatility, Volatility::Low);
        assert_eq!(tech.round_number_force, RoundNumberForce::Weak);
        assert_eq!(tech.bias_score, -1);
    }

    #[test]
    fn test_constant_series_collapses() {
        let tech = analyze(&vision(30, 45.0));
        assert_eq!(tech.support, Some(45.0));
        assert_eq!(tech.resistance, Some(45.0));
        assert_eq!(tech.momentum, 0.0);
        assert_eq!(tech.volatility, Volatility::Low);
        assert_eq!(tech.round_number_force, RoundNumberForce::Strong);
        // -1 for flat momentum, +1 for strong round-number force
        assert_eq!(tech.bias_score, 0);
    }

    #[test]
    fn test_percentiles_interpolate() {
        let (support, resistance) = support_resistance(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(support, Some(20.0));
        assert_eq!(resistance, Some(40.0));

        let (support, resistance) = support_resistance(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(support, Some(1.75));
        assert_eq!(resistance, Some(3.25));
    }

    #[test]
    fn test_momentum_needs_ten_samples() {
        let falling: Vec<f64> = (0..9).map(|i| 100.0 - i as f64 * 10.0).collect();
        assert_eq!(momentum_score(&falling), 0.0);

        // first five average 80, last five average 30
        let falling: Vec<f64> = (0..10).map(|i| 100.0 - i as f64 * 10.0).collect();
        assert_eq!(momentum_score(&falling), 50.0);
    }

    #[test]
    fn test_volatility_bands() {
        let medium: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.0 } else { 30.0 }).collect();
        assert_eq!(volatility_level(&medium), Volatility::Medium);

        let high: Vec<f64> = (0..10).map(|i| if i % 2 == 0 { 0.0 } else { 60.0 }).collect();
        assert_eq!(volatility_level(&high), Volatility::High);

        assert_eq!(volatility_level(&[0.0, 100.0, 0.0]), Volatility::Low);
    }

    #[test]
    fn test_bias_score_maxes_at_three() {
        // momentum > 0, medium volatility, strong round-number force
        let heights: Vec<f64> = vec![90.0, 90.0, 90.0, 90.0, 90.0, 50.0, 50.0, 50.0, 50.0, 50.0];
        let tech = analyze_heights(&heights, 70.0);
        assert_eq!(tech.momentum, 40.0);
        assert_eq!(tech.volatility, Volatility::Medium);
        assert_eq!(tech.bias_score, 3);
    }

    #[test]
    fn test_round_number_force_bands() {
        assert_eq!(round_number_force(40.0), RoundNumberForce::Medium);
        assert_eq!(round_number_force(40.1), RoundNumberForce::Strong);
        assert_eq!(round_number_force(20.0), RoundNumberForce::Weak);
        assert_eq!(round_number_force(20.5), RoundNumberForce::Medium);
    }
}
