//! Smart-money structure: BOS / CHoCH, fair value gaps, order blocks
//!
//! Descriptive only. Nothing here vetoes or promotes a signal.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::synthetic_heights;
use crate::types::VisionFeatures;

/// Height delta that counts as a gap between adjacent candles
const FVG_THRESHOLD: f64 = 10.0;
/// The structure read needs at least three candles
const MIN_CANDLES: usize = 3;

/// Break of structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bos {
    Bullish,
    Bearish,
}

/// Change of character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choch {
    Upward,
    Downward,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    #[serde(rename = "type")]
    pub kind: ObKind,
    pub level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureFeatures {
    pub bos: Option<Bos>,
    pub choch: Option<Choch>,
    pub fvg: Vec<FairValueGap>,
    pub order_blocks: Vec<OrderBlock>,
}

impl StructureFeatures {
    /// Number of structure confirmations present (0..=4)
    pub fn confirmations(&self) -> u32 {
        [
            self.bos.is_some(),
            self.choch.is_some(),
            !self.fvg.is_empty(),
            !self.order_blocks.is_empty(),
        ]
        .iter()
        .filter(|present| **present)
        .count() as u32
    }
}

/// Run the structure analyzer on vision output, padding to three candles
pub fn analyze(features: &VisionFeatures) -> StructureFeatures {
    let count = features.candle_count.max(MIN_CANDLES);
    let heights = synthetic_heights(count, features.avg_candle_size);
    let smc = analyze_heights(&heights);
    debug!("SMC analysis: {:?}", smc);
    smc
}

pub fn analyze_heights(heights: &[f64]) -> StructureFeatures {
    let (bos, choch) = detect_structure(heights);
    StructureFeatures {
        bos,
        choch,
        fvg: detect_fvg(heights),
        order_blocks: detect_order_blocks(heights),
    }
}

/// BOS from the last three heights; CHoCH only alongside a BOS
pub fn detect_structure(heights: &[f64]) -> (Option<Bos>, Option<Choch>) {
    if heights.len() < MIN_CANDLES {
        return (None, None);
    }
    let n = heights.len();
    let (prev2, prev, last) = (heights[n - 3], heights[n - 2], heights[n - 1]);

    let bos = if last > prev && prev > prev2 {
        Some(Bos::Bullish)
    } else if last < prev && prev < prev2 {
        Some(Bos::Bearish)
    } else {
        None
    };

    // a bullish BOS already implies prev > prev2, so CHoCH never fires here
    let choch = match bos {
        Some(Bos::Bullish) if prev < prev2 => Some(Choch::Upward),
        Some(Bos::Bearish) if prev > prev2 => Some(Choch::Downward),
        _ => None,
    };

    (bos, choch)
}

pub fn detect_fvg(heights: &[f64]) -> Vec<FairValueGap> {
    heights
        .windows(2)
        .filter(|w| (w[1] - w[0]).abs() > FVG_THRESHOLD)
        .map(|w| FairValueGap { from: w[0], to: w[1] })
        .collect()
}

/// Middle candle of each triple that turns the move
pub fn detect_order_blocks(heights: &[f64]) -> Vec<OrderBlock> {
    heights
        .windows(3)
        .filter_map(|w| {
            let (before, mid, after) = (w[0], w[1], w[2]);
            if after > mid && mid < before {
                Some(OrderBlock { kind: ObKind::Bullish, level: mid })
            } else if after < mid && mid > before {
                Some(OrderBlock { kind: ObKind::Bearish, level: mid })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DirectionHint, TrendBias};

    #[test]
    fn test_pads_to_three_candles() {
        let features = VisionFeatures {
            clarity_ok: true,
            candle_count: 0,
            avg_candle_size: 12.0,
            trend_bias: TrendBias::Unknown,
            direction_hint: DirectionHint::Bearish,
            momentum_strength: 0.0,
        };
        let smc = analyze(&features);
        assert_eq!(smc.bos, None);
        assert_eq!(smc.choch, None);
        assert!(smc.fvg.is_empty());
        assert!(smc.order_blocks.is_empty());
        assert_eq!(smc.confirmations(), 0);
    }

    #[test]
    fn test_bos_direction() {
        assert_eq!(detect_structure(&[1.0, 2.0, 3.0]).0, Some(Bos::Bullish));
        assert_eq!(detect_structure(&[9.0, 3.0, 2.0, 1.0]).0, Some(Bos::Bearish));
        assert_eq!(detect_structure(&[1.0, 3.0, 2.0]).0, None);
        assert_eq!(detect_structure(&[1.0, 2.0]), (None, None));
    }

    #[test]
    fn test_choch_never_fires_with_bos() {
        assert_eq!(detect_structure(&[1.0, 2.0, 3.0]).1, None);
        assert_eq!(detect_structure(&[3.0, 2.0, 1.0]).1, None);
    }

    #[test]
    fn test_fvg_threshold() {
        let gaps = detect_fvg(&[10.0, 20.0, 31.0, 15.0]);
        assert_eq!(
            gaps,
            vec![
                FairValueGap { from: 20.0, to: 31.0 },
                FairValueGap { from: 31.0, to: 15.0 },
            ]
        );
    }

    #[test]
    fn test_order_blocks() {
        let blocks = detect_order_blocks(&[30.0, 10.0, 25.0, 40.0, 20.0]);
        assert_eq!(
            blocks,
            vec![
                OrderBlock { kind: ObKind::Bullish, level: 10.0 },
                OrderBlock { kind: ObKind::Bearish, level: 40.0 },
            ]
        );

        let smc = analyze_heights(&[30.0, 10.0, 25.0, 40.0, 20.0]);
        assert_eq!(smc.bos, None);
        // gaps and order blocks present
        assert_eq!(smc.confirmations(), 2);
    }
}
