//! Opportunity scorer, decides whether proactively suggesting a practice
//! is appropriate this turn.
//!
//! Three hard gates run in order, each short-circuiting to a blocked
//! result; only then is the composite score computed.

use chrono::{Duration, Utc};

use crate::types::{ContextState, OpportunityResult, SuggestionOutcome, SuggestionRecord};

// Tunable constants. The linear weights are hand-tuned with no documented
// derivation; keep them named, do not re-derive.
pub const MIN_MESSAGES_BETWEEN_SUGGESTS: u32 = 3;
pub const MAX_CONSECUTIVE_DECLINES: u32 = 2;
pub const COOLDOWN_HOURS_AFTER_DECLINES: i64 = 24;
pub const OPPORTUNITY_THRESHOLD: f64 = 0.60;
pub const W_SIGNAL: f64 = 0.45;
pub const W_READINESS: f64 = 0.30;
pub const W_CONFIDENCE: f64 = 0.25;

pub struct OpportunityScorer;

impl OpportunityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the opportunity to proactively suggest a practice.
    ///
    /// `recent_suggestions` is ordered chronologically, oldest first;
    /// consecutive declines are counted backward from the most recent
    /// entry, stopping at the first non-decline.
    pub fn score(
        &self,
        context: &ContextState,
        recent_suggestions: &[SuggestionRecord],
        messages_since_last_suggest: u32,
    ) -> OpportunityResult {
        if context.risk_level.is_elevated() {
            return blocked(&["risk_level_too_high"], None);
        }

        if messages_since_last_suggest < MIN_MESSAGES_BETWEEN_SUGGESTS {
            return blocked(&["too_few_messages"], None);
        }

        let consecutive_declines = recent_suggestions
            .iter()
            .rev()
            .take_while(|s| s.outcome == SuggestionOutcome::Declined)
            .count() as u32;

        if consecutive_declines >= MAX_CONSECUTIVE_DECLINES {
            let cooldown_until = Utc::now() + Duration::hours(COOLDOWN_HOURS_AFTER_DECLINES);
            return blocked(&["consecutive_declines_cooldown"], Some(cooldown_until));
        }

        let signal_strength = context.emotional_state.max_signal();
        let readiness = context.readiness_for_practice;
        let confidence = context.confidence;

        let raw = W_SIGNAL * signal_strength + W_READINESS * readiness + W_CONFIDENCE * confidence;
        let score = raw.clamp(0.0, 1.0);

        let mut reason_codes = Vec::new();
        if signal_strength > 0.6 {
            reason_codes.push("elevated_emotional_signals".to_string());
        }
        if readiness > 0.5 {
            reason_codes.push("user_appears_ready".to_string());
        }

        OpportunityResult {
            opportunity_score: score,
            allow_proactive_suggest: score >= OPPORTUNITY_THRESHOLD,
            reason_codes,
            cooldown_until: None,
        }
    }
}

impl Default for OpportunityScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn blocked(
    reason_codes: &[&str],
    cooldown_until: Option<chrono::DateTime<Utc>>,
) -> OpportunityResult {
    OpportunityResult {
        opportunity_score: 0.0,
        allow_proactive_suggest: false,
        reason_codes: reason_codes.iter().map(|s| s.to_string()).collect(),
        cooldown_until,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionalState, RiskLevel};

    fn context(anxiety: f64, rumination: f64, readiness: f64, confidence: f64) -> ContextState {
        ContextState {
            risk_level: RiskLevel::Low,
            emotional_state: EmotionalState {
                anxiety,
                rumination,
                ..Default::default()
            },
            readiness_for_practice: readiness,
            coaching_hypotheses: Vec::new(),
            confidence,
            candidate_constraints: Vec::new(),
        }
    }

    fn suggestion(outcome: SuggestionOutcome) -> SuggestionRecord {
        SuggestionRecord {
            id: "s".to_string(),
            practice_id: "A2".to_string(),
            outcome,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn favorable_inputs_produce_documented_score() {
        // anxiety=0.8, rumination=0.6, readiness=0.6, confidence=0.7:
        // 0.45*0.8 + 0.30*0.6 + 0.25*0.7 = 0.715
        let scorer = OpportunityScorer::new();
        let result = scorer.score(&context(0.8, 0.6, 0.6, 0.7), &[], 5);

        assert!((result.opportunity_score - 0.715).abs() < 1e-9);
        assert!(result.allow_proactive_suggest);
        assert!(result
            .reason_codes
            .contains(&"elevated_emotional_signals".to_string()));
        assert!(result.reason_codes.contains(&"user_appears_ready".to_string()));
        assert!(result.cooldown_until.is_none());
    }

    #[test]
    fn elevated_risk_blocks_immediately() {
        let scorer = OpportunityScorer::new();
        for risk in [RiskLevel::High, RiskLevel::Crisis] {
            let mut ctx = context(0.9, 0.9, 0.9, 0.9);
            ctx.risk_level = risk;
            let result = scorer.score(&ctx, &[], 10);
            assert_eq!(result.opportunity_score, 0.0);
            assert!(!result.allow_proactive_suggest);
            assert_eq!(result.reason_codes, vec!["risk_level_too_high"]);
        }
    }

    #[test]
    fn too_few_messages_blocks() {
        let scorer = OpportunityScorer::new();
        let result = scorer.score(&context(0.9, 0.9, 0.9, 0.9), &[], 2);
        assert!(!result.allow_proactive_suggest);
        assert_eq!(result.reason_codes, vec!["too_few_messages"]);
    }

    #[test]
    fn two_trailing_declines_trigger_cooldown() {
        let scorer = OpportunityScorer::new();
        let history = vec![
            suggestion(SuggestionOutcome::Accepted),
            suggestion(SuggestionOutcome::Declined),
            suggestion(SuggestionOutcome::Declined),
        ];
        let result = scorer.score(&context(0.8, 0.6, 0.6, 0.7), &history, 5);

        assert_eq!(result.opportunity_score, 0.0);
        assert!(!result.allow_proactive_suggest);
        assert_eq!(result.reason_codes, vec!["consecutive_declines_cooldown"]);
        let cooldown = result.cooldown_until.expect("cooldown should be set");
        assert!(cooldown > Utc::now());
        assert!(cooldown <= Utc::now() + Duration::hours(COOLDOWN_HOURS_AFTER_DECLINES));
    }

    #[test]
    fn decline_streak_is_broken_by_a_non_decline() {
        let scorer = OpportunityScorer::new();
        // Most recent outcome is accepted, so the two older declines do
        // not count.
        let history = vec![
            suggestion(SuggestionOutcome::Declined),
            suggestion(SuggestionOutcome::Declined),
            suggestion(SuggestionOutcome::Accepted),
        ];
        let result = scorer.score(&context(0.8, 0.6, 0.6, 0.7), &history, 5);
        assert!(result.allow_proactive_suggest);
    }

    #[test]
    fn weak_signals_score_below_threshold() {
        let scorer = OpportunityScorer::new();
        // 0.45*0.2 + 0.30*0.3 + 0.25*0.4 = 0.28
        let result = scorer.score(&context(0.2, 0.1, 0.3, 0.4), &[], 5);
        assert!((result.opportunity_score - 0.28).abs() < 1e-9);
        assert!(!result.allow_proactive_suggest);
        assert!(result.reason_codes.is_empty());
    }

    #[test]
    fn pending_outcome_does_not_count_as_decline() {
        let scorer = OpportunityScorer::new();
        let history = vec![
            suggestion(SuggestionOutcome::Declined),
            suggestion(SuggestionOutcome::Pending),
        ];
        let result = scorer.score(&context(0.8, 0.6, 0.6, 0.7), &history, 5);
        assert!(result.allow_proactive_suggest);
    }
}
