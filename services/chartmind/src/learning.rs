//! Self-learning confidence bias from reported outcomes

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::{Market, Outcome};

/// Bias is kept within +/- this value
pub const BIAS_LIMIT: f64 = 5.0;
pub const WIN_DELTA: f64 = 1.0;
pub const LOSS_DELTA: f64 = -1.5;
/// Outcomes remembered across all markets
pub const RECENT_CAPACITY: usize = 20;
/// Per-market outcomes used for the performance adjustment
pub const PERFORMANCE_WINDOW: usize = 5;
pub const MIN_ADJUSTED: f64 = 50.0;
pub const MAX_ADJUSTED: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentResult {
    pub market: Market,
    pub result: Outcome,
}

/// Per-market bias and the recent outcome window
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningState {
    pub bias_by_market: HashMap<Market, f64>,
    pub recent_results: VecDeque<RecentResult>,
}

impl LearningState {
    pub fn bias(&self, market: Market) -> f64 {
        self.bias_by_market.get(&market).copied().unwrap_or(0.0)
    }

    /// Win rate over the market's last `window` outcomes, if that many exist
    pub fn recent_win_rate(&self, market: Market, window: usize) -> Option<f64> {
        let results: Vec<&RecentResult> = self
            .recent_results
            .iter()
            .rev()
            .filter(|r| r.market == market)
            .take(window)
            .collect();

        if results.len() < window || window == 0 {
            return None;
        }
        let wins = results.iter().filter(|r| r.result.is_win()).count();
        Some(wins as f64 / window as f64)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LearningEngine;

impl LearningEngine {
    pub fn new() -> Self {
        Self
    }

    /// Base confidence corrected by market bias and recent performance,
    /// clamped to 50..=85 and truncated
    pub fn adjust_confidence(&self, state: &LearningState, market: Market, base: u8) -> u8 {
        let perf_adj = state
            .recent_win_rate(market, PERFORMANCE_WINDOW)
            .map(|rate| (rate - 0.5) * 10.0)
            .unwrap_or(0.0);

        let adjusted = f64::from(base) + state.bias(market) + perf_adj;
        adjusted.clamp(MIN_ADJUSTED, MAX_ADJUSTED).trunc() as u8
    }

    /// Move the market bias and push the outcome into the recent window
    pub fn record(&self, state: &mut LearningState, market: Market, result: Outcome) {
        let delta = if result.is_win() { WIN_DELTA } else { LOSS_DELTA };
        let bias = state.bias_by_market.entry(market).or_insert(0.0);
        *bias = (*bias + delta).clamp(-BIAS_LIMIT, BIAS_LIMIT);

        state.recent_results.push_back(RecentResult { market, result });
        while state.recent_results.len() > RECENT_CAPACITY {
            state.recent_results.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_state_passes_base_through() {
        let engine = LearningEngine::new();
        let state = LearningState::default();
        assert_eq!(engine.adjust_confidence(&state, Market::Forex, 66), 66);
    }

    #[test]
    fn test_adjusted_confidence_is_clamped() {
        let engine = LearningEngine::new();
        let state = LearningState::default();
        for base in [0u8, 10, 49, 50, 60, 85, 86, 100, 255] {
            let adjusted = engine.adjust_confidence(&state, Market::Binary, base);
            assert!((50..=85).contains(&adjusted), "base {} -> {}", base, adjusted);
        }

        let mut losing = LearningState::default();
        for _ in 0..10 {
            engine.record(&mut losing, Market::Binary, Outcome::Loss);
        }
        assert_eq!(engine.adjust_confidence(&losing, Market::Binary, 40), 50);

        let mut winning = LearningState::default();
        for _ in 0..10 {
            engine.record(&mut winning, Market::Binary, Outcome::Win);
        }
        assert_eq!(engine.adjust_confidence(&winning, Market::Binary, 84), 85);
    }

    #[test]
    fn test_bias_stays_in_range() {
        let engine = LearningEngine::new();
        let mut state = LearningState::default();
        let pattern = [Outcome::Loss, Outcome::Loss, Outcome::Win, Outcome::Loss];
        for i in 0..40 {
            engine.record(&mut state, Market::Crypto, pattern[i % pattern.len()]);
            let bias = state.bias(Market::Crypto);
            assert!((-BIAS_LIMIT..=BIAS_LIMIT).contains(&bias));
        }
        assert_eq!(state.bias(Market::Crypto), -BIAS_LIMIT);

        for _ in 0..12 {
            engine.record(&mut state, Market::Crypto, Outcome::Win);
        }
        assert_eq!(state.bias(Market::Crypto), BIAS_LIMIT);
    }

    #[test]
    fn test_recent_window_is_fifo() {
        let engine = LearningEngine::new();
        let mut state = LearningState::default();
        // 5 forex results followed by 20 binary results
        for _ in 0..5 {
            engine.record(&mut state, Market::Forex, Outcome::Win);
        }
        for _ in 0..20 {
            engine.record(&mut state, Market::Binary, Outcome::Loss);
        }
        assert_eq!(state.recent_results.len(), RECENT_CAPACITY);
        assert!(state.recent_results.iter().all(|r| r.market == Market::Binary));
    }

    #[test]
    fn test_performance_adjustment_needs_five_results() {
        let engine = LearningEngine::new();
        let mut state = LearningState::default();
        for _ in 0..4 {
            engine.record(&mut state, Market::Forex, Outcome::Win);
        }
        assert_eq!(state.recent_win_rate(Market::Forex, PERFORMANCE_WINDOW), None);
        // bias +4, no performance adjustment yet
        assert_eq!(engine.adjust_confidence(&state, Market::Forex, 60), 64);

        engine.record(&mut state, Market::Forex, Outcome::Win);
        assert_eq!(state.recent_win_rate(Market::Forex, PERFORMANCE_WINDOW), Some(1.0));
        // bias +5, perf +5
        assert_eq!(engine.adjust_confidence(&state, Market::Forex, 60), 70);
        // other markets are untouched
        assert_eq!(engine.adjust_confidence(&state, Market::Crypto, 60), 60);
    }

    #[test]
    fn test_mixed_window_truncates() {
        let engine = LearningEngine::new();
        let mut state = LearningState::default();
        // W L L W L: bias 1 - 1.5 - 1.5 + 1 - 1.5 = -2.5, rate 0.4 -> perf -1
        for result in [Outcome::Win, Outcome::Loss, Outcome::Loss, Outcome::Win, Outcome::Loss] {
            engine.record(&mut state, Market::Binary, result);
        }
        assert_eq!(state.bias(Market::Binary), -2.5);
        // 70 - 2.5 - 1 = 66.5 -> 66
        assert_eq!(engine.adjust_confidence(&state, Market::Binary, 70), 66);
    }
}
