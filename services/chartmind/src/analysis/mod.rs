//! Chart analyzers over the synthetic candle series
//!
//! The vision stage reports only a candle count and an average candle size,
//! so both analyzers work on `count` copies of the average height. On that
//! constant series momentum and spread collapse to zero and no structure is
//! found; this is the expected output until per-candle heights are available.
//!
//! The series is capped at `MAX_CANDLES`; a screenshot never shows more, and
//! the count comes straight from the sidecar.

pub mod smc;
pub mod technical;

pub use smc::{Bos, Choch, FairValueGap, ObKind, OrderBlock, StructureFeatures};
pub use technical::{RoundNumberForce, TechnicalFeatures, Volatility};

/// Upper bound on the synthetic series length
pub const MAX_CANDLES: usize = 2_000;

/// Candle heights: `count` copies of `avg_size`, at most `MAX_CANDLES`
pub fn synthetic_heights(count: usize, avg_size: f64) -> Vec<f64> {
    vec![avg_size; count.min(MAX_CANDLES)]
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
