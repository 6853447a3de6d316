//! Signal engine - owns the shared risk/learning state and runs the pipeline
//!
//! Vision, OCR and news calls are awaited before the state lock is taken.
//! Every guard check plus admission, and every feedback update, happens in
//! one critical section over `EngineState`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{self, StructureFeatures, TechnicalFeatures};
use crate::context::{MarketClassifier, SessionClassifier};
use crate::learning::{LearningEngine, LearningState};
use crate::ledger::{AccuracyFilter, FeedbackEntry, FeedbackLedger};
use crate::probability::{compute_probability, ProbabilityInputs};
use crate::risk::{RiskDecision, RiskGuard, RiskLimits, RiskReport, RiskState};
use crate::signal::{self, SignalProposal};
use crate::types::{
    Context, EngineError, Headline, Market, NewsFeed, PairDetector, Result, VisionFeatures,
    VisionProvider,
};

pub const REASON_UNCLEAR: &str = "Low contrast / unclear chart";
pub const REASON_TOO_SMALL: &str = "Chart too small / unclear";
pub const REASON_LATE: &str = "Late screenshot detected";

/// Engine knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Confidence fed to the learning adjustment
    pub base_confidence: u8,
    /// Screenshots older than this are answered with a warning
    pub latency_limit_secs: i64,
    pub min_width: u32,
    pub min_height: u32,
    pub probability_enabled: bool,
    pub risk: RiskLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_confidence: 66,
            latency_limit_secs: 120,
            min_width: 300,
            min_height: 200,
            probability_enabled: false,
            risk: RiskLimits::default(),
        }
    }
}

/// Process-wide mutable state, guarded as one unit
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineState {
    pub risk: RiskState,
    pub learning: LearningState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Ok,
    Blocked,
    Warning,
    NoTrade,
}

/// One analysis request
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    pub image: Vec<u8>,
    /// None (or "auto" upstream) lets the classifier decide
    pub market: Option<Market>,
    /// Capture time of the screenshot; defaults to now
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResponse {
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical: Option<TechnicalFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smc: Option<StructureFeatures>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalProposal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<u8>,
}

impl AnalysisResponse {
    fn early(status: AnalysisStatus, reason: &str) -> Self {
        Self {
            status,
            reason: Some(reason.to_string()),
            delay_sec: None,
            signal_id: None,
            context: None,
            vision: None,
            technical: None,
            smc: None,
            signal: None,
            risk: None,
            probability: None,
        }
    }
}

/// Answer to a feedback submission
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackSummary {
    pub accuracy: f64,
    pub market_pair_accuracy: f64,
    pub stats_by_market_pair: BTreeMap<String, f64>,
}

/// Read-only view for health checks
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub state: EngineState,
    pub ledger_entries: usize,
}

pub struct SignalEngine {
    config: EngineConfig,
    vision: Arc<dyn VisionProvider>,
    pairs: Arc<dyn PairDetector>,
    news: Option<Arc<dyn NewsFeed>>,
    ledger: Arc<FeedbackLedger>,
    guard: RiskGuard,
    learning: LearningEngine,
    state: Mutex<EngineState>,
}

impl SignalEngine {
    pub fn new(
        config: EngineConfig,
        vision: Arc<dyn VisionProvider>,
        pairs: Arc<dyn PairDetector>,
        ledger: Arc<FeedbackLedger>,
    ) -> Self {
        Self {
            guard: RiskGuard::new(config.risk),
            config,
            vision,
            pairs,
            news: None,
            ledger,
            learning: LearningEngine::new(),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Attach a news feed for the probability score
    pub fn with_news(mut self, news: Arc<dyn NewsFeed>) -> Self {
        self.news = Some(news);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &FeedbackLedger {
        &self.ledger
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResponse> {
        self.analyze_at(request, Utc::now()).await
    }

    /// Run the full pipeline as of `now`
    pub async fn analyze_at(
        &self,
        request: AnalyzeRequest,
        now: DateTime<Utc>,
    ) -> Result<AnalysisResponse> {
        let report = self.vision.extract(&request.image).await?;

        if report.width < self.config.min_width || report.height < self.config.min_height {
            info!(status = "blocked", "{}x{}: {}", report.width, report.height, REASON_TOO_SMALL);
            return Ok(AnalysisResponse::early(AnalysisStatus::Blocked, REASON_TOO_SMALL));
        }

        let features = report.features;
        if !features.clarity_ok {
            info!(status = "blocked", "{}", REASON_UNCLEAR);
            return Ok(AnalysisResponse::early(AnalysisStatus::Blocked, REASON_UNCLEAR));
        }

        let delay = (now - request.timestamp.unwrap_or(now)).num_seconds();
        if delay > self.config.latency_limit_secs {
            info!(status = "warning", delay_sec = delay, "{}", REASON_LATE);
            let mut response = AnalysisResponse::early(AnalysisStatus::Warning, REASON_LATE);
            response.delay_sec = Some(delay);
            return Ok(response);
        }

        let (pair, headlines) =
            futures::join!(self.pairs.detect_pair(&request.image), self.fetch_headlines());

        let market = request
            .market
            .unwrap_or_else(|| MarketClassifier::classify(&pair, &features));
        let context = Context {
            pair,
            market,
            session: SessionClassifier::classify(now),
        };

        let technical = analysis::technical::analyze(&features);
        let smc = analysis::smc::analyze(&features);
        debug!("Technical: {:?} SMC: {:?}", technical, smc);

        // guard check and admission must not interleave with other requests
        let (proposal, decision, risk) = {
            let mut state = self.state.lock().await;
            let confidence = self.learning.adjust_confidence(
                &state.learning,
                market,
                self.config.base_confidence,
            );
            let proposal = signal::synthesize(&features, market, confidence);

            if proposal.tradable {
                let tier = features.momentum_tier();
                let advice = self.guard.martingale_advice(&state.risk, confidence, tier);
                let decision = self.guard.check(&state.risk, confidence, tier, now);
                if decision == RiskDecision::Admit {
                    state.risk.record_admission(now);
                }
                let risk = self.guard.report(&state.risk, decision, advice);
                (proposal, Some(decision), Some(risk))
            } else {
                (proposal, None, None)
            }
        };

        let reason = match decision {
            None => proposal.reason.clone(),
            Some(RiskDecision::Reject(rejection)) => Some(rejection.reason().to_string()),
            Some(RiskDecision::Admit) => None,
        };

        let mut response = AnalysisResponse {
            status: AnalysisStatus::NoTrade,
            reason,
            delay_sec: None,
            signal_id: None,
            context: Some(context),
            vision: Some(features),
            technical: Some(technical),
            smc: Some(smc),
            signal: Some(proposal),
            risk,
            probability: None,
        };

        if decision != Some(RiskDecision::Admit) {
            info!(
                market = %market,
                status = "no_trade",
                reason = response.reason.as_deref().unwrap_or_default(),
                "Signal rejected"
            );
            return Ok(response);
        }

        response.status = AnalysisStatus::Ok;
        response.signal_id = Some(Uuid::new_v4().to_string());

        if self.config.probability_enabled {
            response.probability = Some(self.probability(&response, &headlines).await);
        }

        info!(
            market = %market,
            status = "ok",
            signal_id = response.signal_id.as_deref().unwrap_or_default(),
            "Signal admitted"
        );
        Ok(response)
    }

    async fn fetch_headlines(&self) -> Vec<Headline> {
        if !self.config.probability_enabled {
            return Vec::new();
        }
        let Some(news) = self.news.as_ref() else {
            return Vec::new();
        };
        match news.headlines().await {
            Ok(headlines) => headlines,
            Err(e) => {
                warn!("News unavailable, impact counts as 0: {}", e);
                Vec::new()
            }
        }
    }

    async fn probability(&self, response: &AnalysisResponse, headlines: &[Headline]) -> u8 {
        let (Some(context), Some(vision), Some(smc), Some(direction)) = (
            response.context.as_ref(),
            response.vision.as_ref(),
            response.smc.as_ref(),
            response.signal.as_ref().and_then(|s| s.direction),
        ) else {
            return 0;
        };

        let history = self.ledger.history(context.market, &context.pair).await;
        let inputs = ProbabilityInputs {
            history: &history,
            headlines,
            trend: vision.trend_bias,
            direction,
            structure: smc,
        };
        compute_probability(&inputs, &mut rand::thread_rng())
    }

    pub async fn submit_feedback(
        &self,
        signal_id: &str,
        market: &str,
        pair: &str,
        result: &str,
    ) -> Result<FeedbackSummary> {
        self.submit_feedback_at(signal_id, market, pair, result, Utc::now())
            .await
    }

    /// Record an outcome: ledger first, then learning and risk state
    pub async fn submit_feedback_at(
        &self,
        signal_id: &str,
        market: &str,
        pair: &str,
        result: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedbackSummary> {
        let market = Market::parse(market)
            .ok_or_else(|| EngineError::Validation(format!("unknown market '{}'", market)))?;
        let entry = FeedbackEntry::new(signal_id, market, pair, result, now)?;
        let outcome = entry.result;

        {
            let mut state = self.state.lock().await;
            // a failed write leaves the state untouched so a retry applies both
            self.ledger.append(entry).await?;
            self.learning.record(&mut state.learning, market, outcome);
            state.risk.record_outcome(outcome, now, self.guard.limits());

            info!(
                market = %market,
                pair,
                result = ?outcome,
                consecutive_losses = state.risk.consecutive_losses,
                bias = state.learning.bias(market),
                "Feedback recorded"
            );
        }

        Ok(FeedbackSummary {
            accuracy: self.ledger.accuracy(&AccuracyFilter::default()).await,
            market_pair_accuracy: self
                .ledger
                .accuracy(&AccuracyFilter::market_pair(market, pair))
                .await,
            stats_by_market_pair: self.ledger.stats_by_market_pair().await,
        })
    }

    pub async fn accuracy(&self, filter: &AccuracyFilter) -> f64 {
        self.ledger.accuracy(filter).await
    }

    pub async fn stats(&self) -> BTreeMap<String, f64> {
        self.ledger.stats_by_market_pair().await
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock().await.clone();
        EngineSnapshot {
            state,
            ledger_entries: self.ledger.len().await,
        }
    }

    /// Rebuild learning state from the ledger. Risk state is left alone.
    pub async fn replay_ledger(&self) -> usize {
        let entries = self.ledger.entries().await;
        let mut state = self.state.lock().await;
        state.learning = LearningState::default();
        for entry in &entries {
            self.learning
                .record(&mut state.learning, entry.market, entry.result);
        }
        info!("Replayed {} ledger entries into learning state", entries.len());
        entries.len()
    }
}
