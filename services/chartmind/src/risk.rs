//! Risk guard - admission filter over trade proposals

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{MomentumTier, Outcome};

/// Numeric limits applied by the guard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Cooldown length after a loss streak
    pub cooldown_secs: i64,
    /// Loss streak that starts a cooldown
    pub cooldown_losses: u32,
    /// Admitted trades allowed per process lifetime
    pub max_trades: u32,
    /// Minimum spacing between admitted trades
    pub min_spacing_secs: i64,
    /// Loss streak that raises the quality bar
    pub caution_losses: u32,
    /// Confidence required while the quality bar is raised
    pub caution_min_confidence: u8,
    pub martingale_min_confidence: u8,
    pub martingale_cap: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            cooldown_secs: 600,
            cooldown_losses: 3,
            max_trades: 15,
            min_spacing_secs: 30,
            caution_losses: 2,
            caution_min_confidence: 68,
            martingale_min_confidence: 70,
            martingale_cap: 1.5,
        }
    }
}

/// Loss streak, pacing and cooldown bookkeeping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskState {
    pub consecutive_losses: u32,
    pub trades_taken: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_trade_time: Option<DateTime<Utc>>,
}

impl RiskState {
    /// Book an admitted trade
    pub fn record_admission(&mut self, now: DateTime<Utc>) {
        self.trades_taken += 1;
        self.last_trade_time = Some(now);
    }

    /// Update the loss streak from a reported outcome
    pub fn record_outcome(&mut self, outcome: Outcome, now: DateTime<Utc>, limits: &RiskLimits) {
        match outcome {
            Outcome::Win => self.consecutive_losses = 0,
            Outcome::Loss => {
                self.consecutive_losses += 1;
                if self.consecutive_losses >= limits.cooldown_losses {
                    let until = now + Duration::seconds(limits.cooldown_secs);
                    // never pull an active cooldown earlier
                    self.cooldown_until = Some(match self.cooldown_until {
                        Some(existing) if existing > until => existing,
                        _ => until,
                    });
                }
            }
        }
    }
}

/// Why the guard refused a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRejection {
    Cooldown,
    Overtrade,
    TooSoon,
    QualityAfterLosses,
}

impl RiskRejection {
    pub fn reason(&self) -> &'static str {
        match self {
            RiskRejection::Cooldown => "Cooldown active after losses",
            RiskRejection::Overtrade => "Overtrade limit reached",
            RiskRejection::TooSoon => "Wait before next trade",
            RiskRejection::QualityAfterLosses => "Quality insufficient after losses",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    Admit,
    Reject(RiskRejection),
}

/// Recovery-stake advisory. Informational; never changes accounting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MartingaleAdvice {
    Optional { cap: f64 },
    Blocked,
}

impl fmt::Display for MartingaleAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MartingaleAdvice::Optional { cap } => write!(f, "OPTIONAL, cap ×{}", cap),
            MartingaleAdvice::Blocked => f.write_str("BLOCKED"),
        }
    }
}

/// Risk section of an analysis response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub admitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub martingale: String,
    pub consecutive_losses: u32,
    pub trades_taken: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct RiskGuard {
    limits: RiskLimits,
}

impl RiskGuard {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Gate a proposal. Rules are checked in order; the first match wins.
    pub fn check(
        &self,
        state: &RiskState,
        confidence: u8,
        tier: MomentumTier,
        now: DateTime<Utc>,
    ) -> RiskDecision {
        if let Some(until) = state.cooldown_until {
            if now < until {
                return RiskDecision::Reject(RiskRejection::Cooldown);
            }
        }

        if state.trades_taken >= self.limits.max_trades {
            return RiskDecision::Reject(RiskRejection::Overtrade);
        }

        if let Some(last) = state.last_trade_time {
            if now - last < Duration::seconds(self.limits.min_spacing_secs) {
                return RiskDecision::Reject(RiskRejection::TooSoon);
            }
        }

        if state.consecutive_losses >= self.limits.caution_losses
            && (confidence < self.limits.caution_min_confidence || tier != MomentumTier::Strong)
        {
            return RiskDecision::Reject(RiskRejection::QualityAfterLosses);
        }

        RiskDecision::Admit
    }

    pub fn martingale_advice(
        &self,
        state: &RiskState,
        confidence: u8,
        tier: MomentumTier,
    ) -> MartingaleAdvice {
        if state.consecutive_losses == 1
            && confidence >= self.limits.martingale_min_confidence
            && tier == MomentumTier::Strong
        {
            MartingaleAdvice::Optional {
                cap: self.limits.martingale_cap,
            }
        } else {
            MartingaleAdvice::Blocked
        }
    }

    /// Build the response section for a decision already taken
    pub fn report(
        &self,
        state: &RiskState,
        decision: RiskDecision,
        advice: MartingaleAdvice,
    ) -> RiskReport {
        let (admitted, reason) = match decision {
            RiskDecision::Admit => (true, None),
            RiskDecision::Reject(rejection) => (false, Some(rejection.reason().to_string())),
        };
        RiskReport {
            admitted,
            reason,
            martingale: advice.to_string(),
            consecutive_losses: state.consecutive_losses,
            trades_taken: state.trades_taken,
            cooldown_until: state.cooldown_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_state_admits() {
        let guard = RiskGuard::default();
        let state = RiskState::default();
        assert_eq!(guard.check(&state, 50, MomentumTier::Weak, t0()), RiskDecision::Admit);
    }

    #[test]
    fn test_cooldown_window() {
        let guard = RiskGuard::default();
        let limits = *guard.limits();
        let mut state = RiskState::default();
        for _ in 0..3 {
            state.record_outcome(Outcome::Loss, t0(), &limits);
        }
        let until = t0() + Duration::seconds(600);
        assert_eq!(state.cooldown_until, Some(until));

        let just_before = until - Duration::seconds(1);
        assert_eq!(
            guard.check(&state, 85, MomentumTier::Strong, just_before),
            RiskDecision::Reject(RiskRejection::Cooldown)
        );
        // loss streak still >= 2, so a strong, confident proposal is needed
        assert_eq!(guard.check(&state, 85, MomentumTier::Strong, until), RiskDecision::Admit);
        assert_eq!(
            guard.check(&state, 67, MomentumTier::Strong, until),
            RiskDecision::Reject(RiskRejection::QualityAfterLosses)
        );
    }

    #[test]
    fn test_fourth_loss_never_shortens_cooldown() {
        let limits = RiskLimits::default();
        let mut state = RiskState::default();
        for _ in 0..3 {
            state.record_outcome(Outcome::Loss, t0(), &limits);
        }
        let first = state.cooldown_until.unwrap();

        // a late report with an earlier clock keeps the existing window
        state.record_outcome(Outcome::Loss, t0() - Duration::seconds(60), &limits);
        assert_eq!(state.cooldown_until, Some(first));

        state.record_outcome(Outcome::Loss, t0() + Duration::seconds(100), &limits);
        assert_eq!(state.cooldown_until, Some(t0() + Duration::seconds(700)));
        assert_eq!(state.consecutive_losses, 5);
    }

    #[test]
    fn test_win_resets_streak() {
        let limits = RiskLimits::default();
        let mut state = RiskState::default();
        state.record_outcome(Outcome::Loss, t0(), &limits);
        state.record_outcome(Outcome::Loss, t0(), &limits);
        state.record_outcome(Outcome::Win, t0(), &limits);
        assert_eq!(state.consecutive_losses, 0);
        assert_eq!(state.cooldown_until, None);
    }

    #[test]
    fn test_overtrade_cap() {
        let guard = RiskGuard::default();
        let mut state = RiskState::default();
        let mut now = t0();
        for _ in 0..15 {
            assert_eq!(guard.check(&state, 70, MomentumTier::Strong, now), RiskDecision::Admit);
            state.record_admission(now);
            now = now + Duration::seconds(60);
        }
        assert_eq!(state.trades_taken, 15);
        assert_eq!(
            guard.check(&state, 70, MomentumTier::Strong, now),
            RiskDecision::Reject(RiskRejection::Overtrade)
        );
    }

    #[test]
    fn test_trade_spacing() {
        let guard = RiskGuard::default();
        let mut state = RiskState::default();
        state.record_admission(t0());

        assert_eq!(
            guard.check(&state, 70, MomentumTier::Strong, t0() + Duration::seconds(29)),
            RiskDecision::Reject(RiskRejection::TooSoon)
        );
        assert_eq!(
            guard.check(&state, 70, MomentumTier::Strong, t0() + Duration::seconds(30)),
            RiskDecision::Admit
        );
    }

    #[test]
    fn test_quality_bar_after_two_losses() {
        let guard = RiskGuard::default();
        let limits = *guard.limits();
        let mut state = RiskState::default();
        state.record_outcome(Outcome::Loss, t0(), &limits);
        state.record_outcome(Outcome::Loss, t0(), &limits);

        assert_eq!(
            guard.check(&state, 80, MomentumTier::Medium, t0()),
            RiskDecision::Reject(RiskRejection::QualityAfterLosses)
        );
        assert_eq!(guard.check(&state, 68, MomentumTier::Strong, t0()), RiskDecision::Admit);
    }

    #[test]
    fn test_martingale_advice() {
        let guard = RiskGuard::default();
        let limits = *guard.limits();
        let mut state = RiskState::default();
        assert_eq!(
            guard.martingale_advice(&state, 80, MomentumTier::Strong),
            MartingaleAdvice::Blocked
        );

        state.record_outcome(Outcome::Loss, t0(), &limits);
        let advice = guard.martingale_advice(&state, 70, MomentumTier::Strong);
        assert_eq!(advice, MartingaleAdvice::Optional { cap: 1.5 });
        assert_eq!(advice.to_string(), "OPTIONAL, cap ×1.5");
        assert_eq!(
            guard.martingale_advice(&state, 69, MomentumTier::Strong),
            MartingaleAdvice::Blocked
        );
        assert_eq!(
            guard.martingale_advice(&state, 80, MomentumTier::Medium).to_string(),
            "BLOCKED"
        );
    }
}
