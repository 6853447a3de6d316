//! Context classifiers: market family and trading session

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use crate::types::{Market, Session, VisionFeatures};

/// Pairs the OCR stage recognises on a chart
pub static KNOWN_PAIRS: phf::Set<&'static str> = phf::phf_set! {
    "XAUUSD",
    "EURUSD",
    "GBPUSD",
    "USDJPY",
    "GBPJPY",
    "AUDUSD",
    "USDCAD",
    "BTCUSDT",
    "ETHUSDT",
};

/// Pairs whose market is fixed regardless of quote currency
static PAIR_MARKETS: phf::Map<&'static str, Market> = phf::phf_map! {
    "BTCUSDT" => Market::Crypto,
    "ETHUSDT" => Market::Crypto,
    "XAUUSD" => Market::ForexGold,
};

/// Candles smaller than this mark the chart as a binary-options chart
const BINARY_CANDLE_SIZE: f64 = 15.0;

/// Find the first known pair in OCR text
pub fn find_pair(text: &str) -> Option<&'static str> {
    let upper = text.to_uppercase();
    KNOWN_PAIRS
        .iter()
        .filter_map(|pair| upper.find(pair).map(|pos| (pos, *pair)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, pair)| pair)
}

pub struct MarketClassifier;

impl MarketClassifier {
    /// Decide market family from pair + vision hints
    pub fn classify(pair: &str, features: &VisionFeatures) -> Market {
        let pair = pair.to_uppercase();

        let mut market = if let Some(market) = PAIR_MARKETS.get(pair.as_str()) {
            *market
        } else if pair.ends_with("USD") || pair.ends_with("JPY") {
            Market::Forex
        } else {
            Market::Binary
        };

        // vision override
        if features.avg_candle_size < BINARY_CANDLE_SIZE {
            market = Market::Binary;
        }

        debug!("Market detected: {} (pair {})", market, pair);
        market
    }
}

pub struct SessionClassifier;

impl SessionClassifier {
    pub fn classify(now: DateTime<Utc>) -> Session {
        match now.hour() {
            0..=6 => Session::Asia,
            7..=12 => Session::London,
            13..=19 => Session::NewYork,
            _ => Session::Overlap,
        }
    }
}
