//! ChartMind - chart screenshot to gated, self-adjusting trade signal
//!
//! The vision sidecar turns a screenshot into scalar features. From there the
//! pipeline classifies context, runs technical and structure analysis,
//! adjusts confidence from past outcomes, synthesises a market-specific
//! proposal and gates it through the risk guard. Reported outcomes flow back
//! through the feedback ledger into the learning and risk state.

pub mod analysis;
pub mod config;
pub mod context;
pub mod engine;
pub mod learning;
pub mod ledger;
pub mod probability;
pub mod risk;
pub mod signal;
pub mod sources;
pub mod types;

pub use engine::{
    AnalysisResponse, AnalysisStatus, AnalyzeRequest, EngineConfig, EngineSnapshot, EngineState,
    FeedbackSummary, SignalEngine,
};
pub use ledger::{AccuracyFilter, FeedbackEntry, FeedbackLedger};
pub use sources::news::NewsClient;
pub use sources::vision::VisionClient;
pub use types::*;
