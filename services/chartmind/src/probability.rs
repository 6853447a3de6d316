//! Optional probability score for an admitted signal

use rand::Rng;

use crate::analysis::StructureFeatures;
use crate::ledger::FeedbackEntry;
use crate::signal::Direction;
use crate::types::{Headline, TrendBias};

const BASE_SCORE: i32 = 50;
/// Max boost from a perfect market/pair history
const HISTORY_WEIGHT: f64 = 20.0;
/// Headlines counted toward news impact
const NEWS_WINDOW: usize = 5;
const TREND_ALIGNED: i32 = 10;
const TREND_MISALIGNED: i32 = -5;
const PER_CONFIRMATION: i32 = 5;
const JITTER: i32 = 2;

/// Keyword impact of a news headline
pub fn impact_score(headline: &str) -> i32 {
    let headline = headline.to_lowercase();
    let mut score = 0;
    if headline.contains("interest rate") || headline.contains("fed") {
        score += 5;
    }
    if headline.contains("inflation") {
        score += 4;
    }
    if headline.contains("crash") || headline.contains("plunge") {
        score += 5;
    }
    if headline.contains("bullish") {
        score += 3;
    }
    if headline.contains("bearish") {
        score -= 3;
    }
    score
}

/// Everything the scorer looks at
pub struct ProbabilityInputs<'a> {
    pub history: &'a [FeedbackEntry],
    pub headlines: &'a [Headline],
    pub trend: TrendBias,
    pub direction: Direction,
    pub structure: &'a StructureFeatures,
}

/// 0..=100 probability blending history, news, trend and structure
pub fn compute_probability<R: Rng + ?Sized>(inputs: &ProbabilityInputs<'_>, rng: &mut R) -> u8 {
    let mut score = BASE_SCORE;

    if !inputs.history.is_empty() {
        let wins = inputs.history.iter().filter(|e| e.result.is_win()).count();
        score += (wins as f64 / inputs.history.len() as f64 * HISTORY_WEIGHT) as i32;
    }

    score += inputs
        .headlines
        .iter()
        .take(NEWS_WINDOW)
        .map(|h| h.impact_score)
        .sum::<i32>();

    let aligned = match inputs.trend {
        TrendBias::Bullish => inputs.direction.is_bullish(),
        TrendBias::Bearish => !inputs.direction.is_bullish(),
        TrendBias::Range | TrendBias::Unknown => false,
    };
    score += if aligned { TREND_ALIGNED } else { TREND_MISALIGNED };

    score += inputs.structure.confirmations() as i32 * PER_CONFIRMATION;
    score += rng.gen_range(-JITTER..=JITTER);

    score.clamp(0, 100) as u8
}
