//! Deterministic catalog-driven practice selection.
//!
//! No practice is ever hard-blocked by distress or caution level; only the
//! time budget and readiness stage gate eligibility. Distress contributes
//! soft guidance through the stabilization boost.

use std::collections::HashMap;
use std::sync::Arc;

use crate::catalog::{
    first_line_for, second_line_for, PracticeCatalog, PracticeCatalogEntry, PracticeCategory,
    STABILIZATION, UNIVERSAL,
};
use crate::types::{ContextState, PracticeCandidateRanked, PracticeUsage, Readiness};

// Scoring weights. Hand-tuned, kept as named constants; do not re-derive.
pub const W_CYCLE_MATCH: f64 = 0.4;
pub const W_EFFECTIVENESS: f64 = 0.3;
pub const W_REPETITION_PENALTY: f64 = 0.2;
pub const W_NOVELTY: f64 = 0.1;

/// Added to stabilization practices when distress is at or above the
/// threshold.
pub const STABILIZATION_BOOST: f64 = 0.3;
pub const STABILIZATION_DISTRESS_THRESHOLD: u8 = 8;

/// Subtracted in the ranking variant when the user declined this
/// practice the last time it was offered.
pub const DECLINE_PENALTY: f64 = 0.12;

/// Effectiveness assumed for practices with no usage history (0-10 scale).
const DEFAULT_AVG_EFFECTIVENESS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PracticeCandidate {
    pub practice_id: String,
    pub score: f64,
    pub priority_rank: u32,
}

#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub primary: PracticeCandidate,
    pub backup: Option<PracticeCandidate>,
}

pub struct RuleEngine {
    catalog: Arc<PracticeCatalog>,
}

impl RuleEngine {
    pub fn new(catalog: Arc<PracticeCatalog>) -> Self {
        Self { catalog }
    }

    /// Filter by time budget and readiness stage only. At
    /// precontemplation, only universal or micro practices pass.
    pub fn eligible(&self, time_budget: u32, readiness: Readiness) -> Vec<&PracticeCatalogEntry> {
        self.catalog
            .entries()
            .iter()
            .filter(|p| p.duration_min <= time_budget)
            .filter(|p| p.min_readiness <= readiness)
            .filter(|p| {
                readiness != Readiness::Precontemplation
                    || UNIVERSAL.contains(p.id.as_str())
                    || p.category == PracticeCategory::Micro
            })
            .collect()
    }

    fn score_entry(
        &self,
        entry: &PracticeCatalogEntry,
        cycle: &str,
        distress: u8,
        usage: Option<&PracticeUsage>,
    ) -> f64 {
        let id = entry.id.as_str();

        let cycle_match = if first_line_for(cycle).contains(&id) {
            1.0
        } else if second_line_for(cycle).contains(&id) {
            0.5
        } else if entry.cycles.is_empty() || UNIVERSAL.contains(id) {
            0.3
        } else {
            0.0
        };

        let times_used = usage.map(|u| u.times_used_7d).unwrap_or(0);
        let avg_effectiveness = usage
            .map(|u| u.avg_effectiveness)
            .unwrap_or(DEFAULT_AVG_EFFECTIVENESS);

        let effectiveness = avg_effectiveness / 10.0;
        let repetition = match times_used {
            0 => 0.0,
            1 | 2 => 0.5,
            _ => 1.0,
        };
        let novelty = match times_used {
            0 => 1.0,
            1 | 2 => 0.5,
            _ => 0.0,
        };

        let mut raw = W_CYCLE_MATCH * cycle_match + W_EFFECTIVENESS * effectiveness
            - W_REPETITION_PENALTY * repetition
            + W_NOVELTY * novelty;

        if distress >= STABILIZATION_DISTRESS_THRESHOLD && STABILIZATION.contains(id) {
            raw += STABILIZATION_BOOST;
        }

        raw.clamp(0.0, 1.0)
    }

    /// Full selection pipeline: eligibility, scoring, sort by score
    /// descending with ascending priority rank as tie-break. Returns the
    /// fallback practice when nothing is eligible.
    pub fn select(
        &self,
        distress: u8,
        cycle: &str,
        time_budget: u32,
        readiness: Readiness,
        usage_history: &HashMap<String, PracticeUsage>,
    ) -> SelectionResult {
        let mut scored: Vec<PracticeCandidate> = self
            .eligible(time_budget, readiness)
            .into_iter()
            .map(|entry| PracticeCandidate {
                score: self.score_entry(entry, cycle, distress, usage_history.get(&entry.id)),
                practice_id: entry.id.clone(),
                priority_rank: entry.priority_rank,
            })
            .collect();

        sort_candidates(&mut scored);

        let mut iter = scored.into_iter();
        match iter.next() {
            Some(primary) => SelectionResult {
                primary,
                backup: iter.next(),
            },
            None => SelectionResult {
                primary: PracticeCandidate {
                    practice_id: PracticeCatalog::FALLBACK_PRACTICE_ID.to_string(),
                    score: 0.1,
                    priority_rank: 1,
                },
                backup: None,
            },
        }
    }

    /// Richer ranking for the policy engine: contraindication hard-filter,
    /// top-k candidates with reason codes.
    pub fn rank(
        &self,
        context: &ContextState,
        usage_history: &HashMap<String, PracticeUsage>,
        time_budget: u32,
        top_k: usize,
    ) -> Vec<PracticeCandidateRanked> {
        let dominant = context.emotional_state.dominant();
        let distress = (context.emotional_state.max_signal() * 10.0).round() as u8;
        let readiness = Readiness::from_score(context.readiness_for_practice);

        let mut ranked: Vec<(PracticeCandidateRanked, u32)> = self
            .eligible(time_budget, readiness)
            .into_iter()
            .filter(|entry| {
                !entry
                    .contraindications
                    .iter()
                    .any(|tag| context.candidate_constraints.contains(tag))
            })
            .map(|entry| {
                let usage = usage_history.get(&entry.id);
                let cycle_match = if first_line_for(dominant).contains(&entry.id.as_str()) {
                    1.0
                } else if second_line_for(dominant).contains(&entry.id.as_str()) {
                    0.5
                } else {
                    0.0
                };
                let effectiveness = usage
                    .map(|u| u.avg_effectiveness)
                    .unwrap_or(DEFAULT_AVG_EFFECTIVENESS)
                    / 10.0;
                let mut score = self.score_entry(entry, dominant, distress, usage);
                if usage.map(|u| u.last_declined).unwrap_or(false) {
                    score = (score - DECLINE_PENALTY).max(0.0);
                }

                let mut reason_codes = Vec::new();
                if cycle_match > 0.5 {
                    reason_codes.push(format!("matches_{dominant}"));
                }
                if effectiveness > 0.6 {
                    reason_codes.push("worked_before".to_string());
                }
                if entry.duration_min <= 5 {
                    reason_codes.push("short_duration".to_string());
                }

                (
                    PracticeCandidateRanked {
                        practice_id: entry.id.clone(),
                        final_score: round6(score),
                        confidence: context.confidence,
                        reason_codes,
                        blocked_by: None,
                        alternative_ids: None,
                    },
                    entry.priority_rank,
                )
            })
            .collect();

        ranked.sort_by(|(a, rank_a), (b, rank_b)| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(rank_a.cmp(rank_b))
        });

        ranked
            .into_iter()
            .take(top_k)
            .map(|(candidate, _)| candidate)
            .collect()
    }
}

fn sort_candidates(candidates: &mut [PracticeCandidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.priority_rank.cmp(&b.priority_rank))
    });
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EmotionalState, RiskLevel};

    fn engine() -> RuleEngine {
        RuleEngine::new(Arc::new(PracticeCatalog::builtin()))
    }

    fn no_history() -> HashMap<String, PracticeUsage> {
        HashMap::new()
    }

    #[test]
    fn precontemplation_only_passes_universal_and_micro() {
        let engine = engine();
        let eligible = engine.eligible(30, Readiness::Precontemplation);
        assert!(!eligible.is_empty());
        for entry in eligible {
            assert!(
                UNIVERSAL.contains(entry.id.as_str())
                    || entry.category == PracticeCategory::Micro,
                "{} should not be eligible at precontemplation",
                entry.id
            );
        }
    }

    #[test]
    fn time_budget_gates_long_practices() {
        let engine = engine();
        let eligible = engine.eligible(5, Readiness::Maintenance);
        assert!(eligible.iter().all(|e| e.duration_min <= 5));
        // A1 needs 10 minutes and must be gone.
        assert!(!eligible.iter().any(|e| e.id == "A1"));
    }

    #[test]
    fn readiness_ordering_gates_entries() {
        let engine = engine();
        let contemplation = engine.eligible(60, Readiness::Contemplation);
        assert!(!contemplation.iter().any(|e| e.id == "A1")); // action-gated
        assert!(!contemplation.iter().any(|e| e.id == "R1")); // maintenance-gated
        assert!(contemplation.iter().any(|e| e.id == "A2"));

        let maintenance = engine.eligible(60, Readiness::Maintenance);
        assert!(maintenance.iter().any(|e| e.id == "R1"));
    }

    #[test]
    fn first_line_practice_wins_for_its_cycle() {
        let engine = engine();
        let result = engine.select(5, "rumination", 30, Readiness::Action, &no_history());
        // First-line rumination entries are A2/A3/M2; all score equally
        // with no history, so the lowest priority rank (M2 at rank 10)
        // wins the tie-break.
        assert_eq!(result.primary.practice_id, "M2");
        assert!(result.backup.is_some());
    }

    #[test]
    fn tie_break_is_ascending_priority_rank() {
        let engine = engine();
        let result = engine.select(0, "worry", 30, Readiness::Action, &no_history());
        // A2 (rank 15), A3 (rank 16), C2 (rank 31) are first-line for
        // worry and tie on score; A2 must come first.
        assert_eq!(result.primary.practice_id, "A2");
        assert_eq!(result.backup.unwrap().practice_id, "A3");
    }

    #[test]
    fn stabilization_boost_applies_at_high_distress() {
        let engine = engine();
        let calm = engine.select(3, "avoidance", 30, Readiness::Action, &no_history());
        let distressed = engine.select(9, "avoidance", 30, Readiness::Action, &no_history());
        // At distress 9 the stabilization set (A2/A3/U*) outranks the
        // avoidance first-line entries.
        assert!(STABILIZATION.contains(distressed.primary.practice_id.as_str()));
        assert!(!STABILIZATION.contains(calm.primary.practice_id.as_str()));
    }

    #[test]
    fn repetition_penalty_and_novelty_shift_scores() {
        let engine = engine();
        let mut history = HashMap::new();
        history.insert(
            "M2".to_string(),
            PracticeUsage {
                times_used_7d: 4,
                avg_effectiveness: 5.0,
                last_declined: false,
            },
        );
        let result = engine.select(0, "rumination", 30, Readiness::Action, &history);
        // M2 is penalized for overuse; the other first-line entries with
        // full novelty outrank it.
        assert_ne!(result.primary.practice_id, "M2");
    }

    #[test]
    fn nothing_eligible_returns_fallback() {
        let engine = engine();
        // Zero-minute budget excludes every entry.
        let result = engine.select(5, "worry", 0, Readiness::Action, &no_history());
        assert_eq!(
            result.primary.practice_id,
            PracticeCatalog::FALLBACK_PRACTICE_ID
        );
        assert!(result.backup.is_none());
        assert!((result.primary.score - 0.1).abs() < 1e-9);
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let engine = engine();
        let mut history = HashMap::new();
        history.insert(
            "A2".to_string(),
            PracticeUsage {
                times_used_7d: 0,
                avg_effectiveness: 10.0,
                last_declined: false,
            },
        );
        // cycle_match 1.0 + effectiveness 1.0 + novelty 1.0 + boost would
        // exceed 1.0 without the clamp.
        let result = engine.select(9, "rumination", 30, Readiness::Action, &history);
        assert!(result.primary.score <= 1.0);
    }

    fn ranking_context(constraints: Vec<String>) -> ContextState {
        ContextState {
            risk_level: RiskLevel::Low,
            emotional_state: EmotionalState {
                rumination: 0.7,
                ..Default::default()
            },
            readiness_for_practice: 0.6,
            coaching_hypotheses: Vec::new(),
            confidence: 0.8,
            candidate_constraints: constraints,
        }
    }

    #[test]
    fn rank_returns_top_k_with_reason_codes() {
        let engine = engine();
        let ranked = engine.rank(&ranking_context(Vec::new()), &no_history(), 30, 3);
        assert_eq!(ranked.len(), 3);
        assert!(ranked[0].final_score >= ranked[1].final_score);
        assert_eq!(ranked[0].confidence, 0.8);

        let top = &ranked[0];
        assert!(top.reason_codes.contains(&"matches_rumination".to_string()));
        assert!(top.reason_codes.contains(&"short_duration".to_string()));
    }

    #[test]
    fn rank_filters_contraindicated_entries() {
        let mut entries: Vec<PracticeCatalogEntry> =
            PracticeCatalog::builtin().entries().to_vec();
        for entry in entries.iter_mut() {
            if entry.id == "M2" {
                entry.contraindications = vec!["no_writing".to_string()];
            }
        }
        let engine = RuleEngine::new(Arc::new(PracticeCatalog::new(entries)));

        let ranked = engine.rank(
            &ranking_context(vec!["no_writing".to_string()]),
            &no_history(),
            30,
            10,
        );
        assert!(!ranked.iter().any(|c| c.practice_id == "M2"));

        let unconstrained = engine.rank(&ranking_context(Vec::new()), &no_history(), 30, 10);
        assert!(unconstrained.iter().any(|c| c.practice_id == "M2"));
    }

    #[test]
    fn rank_scores_are_rounded_to_six_decimals() {
        let engine = engine();
        let mut history = HashMap::new();
        history.insert(
            "A2".to_string(),
            PracticeUsage {
                times_used_7d: 1,
                avg_effectiveness: 3.333333333,
                last_declined: false,
            },
        );
        let ranked = engine.rank(&ranking_context(Vec::new()), &history, 30, 10);
        for candidate in ranked {
            let scaled = candidate.final_score * 1_000_000.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn last_declined_practice_is_ranked_down() {
        let engine = engine();
        let mut history = HashMap::new();
        history.insert(
            "M2".to_string(),
            PracticeUsage {
                times_used_7d: 0,
                avg_effectiveness: 5.0,
                last_declined: true,
            },
        );

        let ranked = engine.rank(&ranking_context(Vec::new()), &history, 30, 10);
        let m2 = ranked.iter().find(|c| c.practice_id == "M2").unwrap();
        let a2 = ranked.iter().find(|c| c.practice_id == "A2").unwrap();
        // Same base score, but M2 carries the decline penalty.
        assert!((a2.final_score - m2.final_score - DECLINE_PENALTY).abs() < 1e-6);
        assert!(ranked[0].practice_id != "M2");
    }

    #[test]
    fn worked_before_reason_requires_strong_history() {
        let engine = engine();
        let mut history = HashMap::new();
        history.insert(
            "M2".to_string(),
            PracticeUsage {
                times_used_7d: 1,
                avg_effectiveness: 8.0,
                last_declined: false,
            },
        );
        let ranked = engine.rank(&ranking_context(Vec::new()), &history, 30, 10);
        let m2 = ranked.iter().find(|c| c.practice_id == "M2").unwrap();
        assert!(m2.reason_codes.contains(&"worked_before".to_string()));
    }
}
