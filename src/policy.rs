//! Coach policy engine, the final decision for a turn.
//!
//! Rules are evaluated top-to-bottom in strict priority order; the first
//! match wins. At elevated risk the engine still offers the best available
//! practice, the user is always helped, never parked on listen-only when
//! help exists.

use crate::types::{
    CoachDecision, CoachingAction, ContextState, OpportunityResult, PracticeCandidateRanked,
};

// Tunable thresholds, kept as named constants.
pub const SUGGEST_SCORE_THRESHOLD: f64 = 0.58;
pub const EXPLORE_CONFIDENCE_THRESHOLD: f64 = 0.5;
const NO_SIGNAL_THRESHOLD: f64 = 0.15;
const EXPLORE_SIGNAL_THRESHOLD: f64 = 0.4;
const GUIDE_SIGNAL_THRESHOLD: f64 = 0.3;

pub struct CoachPolicyEngine;

impl CoachPolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Pick the coaching action for this turn.
    pub fn decide(
        &self,
        context: &ContextState,
        opportunity: &OpportunityResult,
        ranked: &[PracticeCandidateRanked],
    ) -> CoachDecision {
        let max_signal = context.emotional_state.max_signal();

        // Rule 1: elevated risk. Offer the strongest practice if one is
        // ranked; explore otherwise.
        if context.risk_level.is_elevated() {
            if let Some(top) = ranked.first() {
                return suggest(&top.practice_id);
            }
            return decision(CoachingAction::Explore, "warm_curious");
        }

        // Rule 2: nothing to work with, answer directly.
        if max_signal < NO_SIGNAL_THRESHOLD && ranked.is_empty() {
            return decision(CoachingAction::Answer, "direct_helpful");
        }

        // Rule 3: low confidence in the analysis, keep exploring.
        if context.confidence < EXPLORE_CONFIDENCE_THRESHOLD {
            return decision(CoachingAction::Explore, "warm_curious");
        }

        // Rule 4: proactive suggestion not allowed this turn.
        if !opportunity.allow_proactive_suggest {
            if max_signal > EXPLORE_SIGNAL_THRESHOLD {
                return decision(CoachingAction::Explore, "warm_curious");
            }
            return decision(CoachingAction::Listen, "warm_supportive");
        }

        // Rule 5: strong practice match.
        if let Some(top) = ranked.first() {
            if top.final_score >= SUGGEST_SCORE_THRESHOLD {
                return suggest(&top.practice_id);
            }
        }

        // Rule 6: signals present but no strong match.
        if max_signal > GUIDE_SIGNAL_THRESHOLD {
            return decision(CoachingAction::Guide, "warm_curious");
        }

        // Rule 7: default.
        decision(CoachingAction::Listen, "warm_supportive")
    }
}

impl Default for CoachPolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn decision(action: CoachingAction, style: &'static str) -> CoachDecision {
    CoachDecision {
        action,
        selected_practice_id: None,
        style,
        must_ask_consent: false,
    }
}

fn suggest(practice_id: &str) -> CoachDecision {
    CoachDecision {
        action: CoachingAction::Suggest,
        selected_practice_id: Some(practice_id.to_string()),
        style: "warm_directive",
        must_ask_consent: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionalState, RiskLevel};

    fn context(risk: RiskLevel, max_signal: f64, confidence: f64) -> ContextState {
        ContextState {
            risk_level: risk,
            emotional_state: EmotionalState {
                anxiety: max_signal,
                ..Default::default()
            },
            readiness_for_practice: 0.6,
            coaching_hypotheses: Vec::new(),
            confidence,
            candidate_constraints: Vec::new(),
        }
    }

    fn allowed() -> OpportunityResult {
        OpportunityResult {
            opportunity_score: 0.7,
            allow_proactive_suggest: true,
            reason_codes: Vec::new(),
            cooldown_until: None,
        }
    }

    fn blocked() -> OpportunityResult {
        OpportunityResult {
            opportunity_score: 0.0,
            allow_proactive_suggest: false,
            reason_codes: vec!["too_few_messages".to_string()],
            cooldown_until: None,
        }
    }

    fn candidate(id: &str, score: f64) -> PracticeCandidateRanked {
        PracticeCandidateRanked {
            practice_id: id.to_string(),
            final_score: score,
            confidence: 0.8,
            reason_codes: Vec::new(),
            blocked_by: None,
            alternative_ids: None,
        }
    }

    #[test]
    fn crisis_with_ranked_practice_suggests_it() {
        let engine = CoachPolicyEngine::new();
        let ranked = vec![candidate("A2", 0.9)];
        let decision = engine.decide(&context(RiskLevel::Crisis, 0.9, 0.9), &blocked(), &ranked);

        assert_eq!(decision.action, CoachingAction::Suggest);
        assert_eq!(decision.selected_practice_id.as_deref(), Some("A2"));
        assert!(decision.must_ask_consent);
    }

    #[test]
    fn elevated_risk_without_practices_explores() {
        let engine = CoachPolicyEngine::new();
        let decision = engine.decide(&context(RiskLevel::High, 0.9, 0.9), &blocked(), &[]);
        assert_eq!(decision.action, CoachingAction::Explore);
        assert!(!decision.must_ask_consent);
    }

    #[test]
    fn no_signal_and_no_practices_answers() {
        let engine = CoachPolicyEngine::new();
        let decision = engine.decide(&context(RiskLevel::Low, 0.1, 0.9), &allowed(), &[]);
        assert_eq!(decision.action, CoachingAction::Answer);
        assert_eq!(decision.style, "direct_helpful");
    }

    #[test]
    fn low_confidence_explores() {
        let engine = CoachPolicyEngine::new();
        let ranked = vec![candidate("A2", 0.9)];
        let decision = engine.decide(&context(RiskLevel::Low, 0.5, 0.3), &allowed(), &ranked);
        assert_eq!(decision.action, CoachingAction::Explore);
    }

    #[test]
    fn blocked_opportunity_with_strong_signal_explores() {
        let engine = CoachPolicyEngine::new();
        let decision = engine.decide(&context(RiskLevel::Low, 0.5, 0.9), &blocked(), &[]);
        assert_eq!(decision.action, CoachingAction::Explore);
    }

    #[test]
    fn blocked_opportunity_with_weak_signal_listens() {
        let engine = CoachPolicyEngine::new();
        let decision = engine.decide(&context(RiskLevel::Low, 0.2, 0.9), &blocked(), &[]);
        assert_eq!(decision.action, CoachingAction::Listen);
        assert_eq!(decision.style, "warm_supportive");
    }

    #[test]
    fn strong_top_candidate_suggests_with_consent() {
        let engine = CoachPolicyEngine::new();
        let ranked = vec![candidate("M2", 0.65), candidate("A2", 0.6)];
        let decision = engine.decide(&context(RiskLevel::Low, 0.5, 0.9), &allowed(), &ranked);

        assert_eq!(decision.action, CoachingAction::Suggest);
        assert_eq!(decision.selected_practice_id.as_deref(), Some("M2"));
        assert!(decision.must_ask_consent);
        assert_eq!(decision.style, "warm_directive");
    }

    #[test]
    fn weak_top_candidate_with_signal_guides() {
        let engine = CoachPolicyEngine::new();
        let ranked = vec![candidate("M2", 0.4)];
        let decision = engine.decide(&context(RiskLevel::Low, 0.5, 0.9), &allowed(), &ranked);
        assert_eq!(decision.action, CoachingAction::Guide);
    }

    #[test]
    fn quiet_turn_defaults_to_listen() {
        let engine = CoachPolicyEngine::new();
        let ranked = vec![candidate("M2", 0.4)];
        let decision = engine.decide(&context(RiskLevel::Low, 0.2, 0.9), &allowed(), &ranked);
        assert_eq!(decision.action, CoachingAction::Listen);
    }

    #[test]
    fn consent_flag_set_only_on_suggest() {
        let engine = CoachPolicyEngine::new();
        let cases = [
            (context(RiskLevel::Low, 0.1, 0.9), allowed(), vec![]),
            (context(RiskLevel::Low, 0.5, 0.3), allowed(), vec![]),
            (context(RiskLevel::Low, 0.5, 0.9), blocked(), vec![]),
            (context(RiskLevel::Low, 0.5, 0.9), allowed(), vec![candidate("M2", 0.4)]),
        ];
        for (ctx, opp, ranked) in cases {
            let decision = engine.decide(&ctx, &opp, &ranked);
            assert_eq!(
                decision.must_ask_consent,
                decision.action == CoachingAction::Suggest
            );
        }
    }
}
