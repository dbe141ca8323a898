//! Per-turn orchestration of the coaching engine.
//!
//! One `process` call per inbound message: safety gate, language,
//! classification, context inference, opportunity scoring, practice
//! ranking, policy decision, contract-bound generation, output backstop,
//! suggestion tracking, FSM transition, audit log. The reply is always a
//! coherent non-empty string in the detected language.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{info, warn};

use crate::catalog::PracticeCatalog;
use crate::config::AppConfig;
use crate::context::ContextBuilder;
use crate::generation::{crisis_response, state_fallback, CircuitBreaker, GenerationAdapter};
use crate::language::LanguageResolver;
use crate::opportunity::OpportunityScorer;
use crate::patterns::HUMOR_MARKERS;
use crate::policy::CoachPolicyEngine;
use crate::safety::{
    CheckAction, GateRisk, OutputSafetyCheck, SafetyClassifier, SafetyGate, SafetyLevel,
};
use crate::selector::RuleEngine;
use crate::session::{SessionState, SessionStore};
use crate::traits::ModelProvider;
use crate::types::{
    ChatMessage, CoachDecision, CoachingAction, ContextState, ConversationState, DialogueState,
    GenerationContract, RiskLevel, SuggestionOutcome, UiMode,
};

pub struct CoachingPipeline {
    max_dialogue_window: usize,
    max_chars_per_message: usize,
    ranked_top_k: usize,
    default_time_budget_min: u32,
    safety_gate: SafetyGate,
    language_resolver: LanguageResolver,
    classifier: SafetyClassifier,
    context_builder: ContextBuilder,
    opportunity_scorer: OpportunityScorer,
    rule_engine: RuleEngine,
    policy: CoachPolicyEngine,
    output_check: OutputSafetyCheck,
    adapter: GenerationAdapter,
    catalog: Arc<PracticeCatalog>,
    store: Arc<dyn SessionStore>,
}

impl CoachingPipeline {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        config: &AppConfig,
        catalog: Arc<PracticeCatalog>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(&config.breaker)));
        let models = &config.provider.models;

        Self {
            max_dialogue_window: config.coaching.max_dialogue_window,
            max_chars_per_message: config.coaching.max_chars_per_message,
            ranked_top_k: config.coaching.ranked_top_k,
            default_time_budget_min: config.coaching.default_time_budget_min,
            safety_gate: SafetyGate::new(),
            language_resolver: LanguageResolver::new(),
            classifier: SafetyClassifier::new(Some(provider.clone()), models.classifier.clone()),
            context_builder: ContextBuilder::new(provider.clone(), models.classifier.clone()),
            opportunity_scorer: OpportunityScorer::new(),
            rule_engine: RuleEngine::new(catalog.clone()),
            policy: CoachPolicyEngine::new(),
            output_check: OutputSafetyCheck::new(),
            adapter: GenerationAdapter::new(
                provider,
                models.response.clone(),
                config.coaching.max_repeat_count,
                breaker,
            ),
            catalog,
            store,
        }
    }

    /// Process one inbound message and return the exact outbound text.
    pub async fn process(&self, user_id: &str, text: &str) -> String {
        let started = Instant::now();
        let mut session = self.store.load(user_id).await;

        // Step 1: deterministic crisis pre-check, before any backend call.
        let gate = self.safety_gate.check(text);
        if gate.risk_level == GateRisk::Crisis {
            session.fsm.enter_crisis();
            let language = self.language_resolver.resolve(user_id, text);
            info!(
                user = user_id,
                step = "safety_gate",
                risk = gate.risk_level.as_str(),
                action = ?gate.safety_action,
                signals = ?gate.signals,
                "audit"
            );
            self.store.save(user_id, session).await;
            return crisis_response(&language);
        }

        // Step 2: language resolution.
        let language = self.language_resolver.resolve(user_id, text);

        // Step 3: non-blocking severity classification over the prior window.
        let verdict = self.classifier.classify(text, &session.dialogue, &language).await;

        // Step 4: dialogue window.
        session.push_message(ChatMessage::user(text), self.max_dialogue_window);

        // Step 5: context inference (first suspension point).
        let mut context = self
            .context_builder
            .build(text, &session.dialogue, &[], &[], None, &language)
            .await;
        fold_verdict_into_risk(&mut context, verdict.level);
        if gate.risk_level == GateRisk::High && !context.risk_level.is_elevated() {
            context.risk_level = RiskLevel::High;
        }

        // Step 6: opportunity scoring.
        let opportunity = self.opportunity_scorer.score(
            &context,
            &session.suggestion_history,
            session.messages_since_suggest,
        );

        // Step 7: practice ranking. Elevated risk still ranks, the policy
        // offers the strongest practice rather than going silent.
        let ranked = if opportunity.allow_proactive_suggest || context.risk_level.is_elevated() {
            self.rule_engine.rank(
                &context,
                &std::collections::HashMap::new(),
                self.default_time_budget_min,
                self.ranked_top_k,
            )
        } else {
            Vec::new()
        };

        // Step 8: policy decision.
        let decision = self.policy.decide(&context, &opportunity, &ranked);

        // Step 9: contract-bound generation (second suspension point).
        let dialogue_state = self.dialogue_state_for(&decision, &session, context.risk_level);
        let contract = self.build_contract(&decision, &context, &session, dialogue_state, &language);
        let user_tone_playful = {
            let lower = text.to_lowercase();
            HUMOR_MARKERS.iter().any(|m| lower.contains(m))
        };
        let mut reply = self
            .adapter
            .generate(&contract, context.risk_level, user_tone_playful)
            .await;

        // Step 10: independent output backstop.
        let check = self.output_check.validate(&reply);
        if check.action == CheckAction::Rewrite {
            warn!(
                user = user_id,
                step = "output_safety",
                reason = ?check.reason,
                "audit"
            );
            reply = state_fallback(dialogue_state, &language);
        }

        // Classifier annotations only ever add text to the reply.
        if let Some(resources) = &verdict.crisis_resources {
            reply = format!("{reply}\n\n{resources}");
        } else if let Some(suggestion) = &verdict.specialist_suggestion {
            reply = format!("{reply}\n\n{suggestion}");
        }

        // Step 11: suggestion tracking.
        if decision.action == CoachingAction::Suggest {
            if let Some(practice_id) = &decision.selected_practice_id {
                session.record_suggestion(practice_id);
            }
        } else {
            session.messages_since_suggest += 1;
        }

        // Step 12: FSM transition.
        if !session.fsm.transition(decision.action) {
            warn!(
                user = user_id,
                action = decision.action.as_str(),
                state = session.fsm.conversation_state().as_str(),
                "decision rejected by conversation fsm"
            );
        }

        // Step 13: audit log.
        info!(
            user = user_id,
            decision = decision.action.as_str(),
            practice = decision.selected_practice_id.as_deref().unwrap_or("-"),
            opportunity = opportunity.opportunity_score,
            risk = context.risk_level.as_str(),
            safety = verdict.level.as_str(),
            safety_source = verdict.source,
            safety_protocol = verdict.protocol_id.as_deref().unwrap_or("-"),
            safety_confidence = verdict.confidence,
            language = %language,
            latency_ms = started.elapsed().as_millis() as u64,
            fsm_state = session.fsm.conversation_state().as_str(),
            "audit"
        );

        // Step 14: remember the reply and persist the session.
        session.push_message(ChatMessage::assistant(reply.clone()), self.max_dialogue_window);
        self.store.save(user_id, session).await;

        reply
    }

    /// User accepted the offered practice.
    pub async fn accept_practice(&self, user_id: &str) -> bool {
        self.resolve_offer(user_id, SuggestionOutcome::Accepted).await
    }

    /// User declined the offered practice.
    pub async fn decline_practice(&self, user_id: &str) -> bool {
        self.resolve_offer(user_id, SuggestionOutcome::Declined).await
    }

    async fn resolve_offer(&self, user_id: &str, outcome: SuggestionOutcome) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = match outcome {
            SuggestionOutcome::Accepted => session.fsm.accept_practice(),
            SuggestionOutcome::Declined => session.fsm.decline_practice(),
            SuggestionOutcome::Pending => false,
        };
        if applied {
            session.resolve_last_suggestion(outcome);
            self.store.save(user_id, session).await;
        }
        applied
    }

    /// Advance the inner practice step. Legal only while a practice is
    /// active; invalid input is rejected without mutation.
    pub async fn advance_practice_step(&self, user_id: &str, next_step: &str) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = session.fsm.advance_practice_step(next_step);
        if applied {
            self.store.save(user_id, session).await;
        }
        applied
    }

    pub async fn pause_practice(&self, user_id: &str) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = session.fsm.pause_practice();
        if applied {
            self.store.save(user_id, session).await;
        }
        applied
    }

    pub async fn resume_practice(&self, user_id: &str) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = session.fsm.resume_practice();
        if applied {
            self.store.save(user_id, session).await;
        }
        applied
    }

    /// Finish the active practice and move to follow-up.
    pub async fn complete_practice(&self, user_id: &str) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = session.fsm.complete_practice();
        if applied {
            self.store.save(user_id, session).await;
        }
        applied
    }

    /// Leave crisis mode once the user is stabilized.
    pub async fn stabilize_from_crisis(&self, user_id: &str) -> bool {
        let mut session = self.store.load(user_id).await;
        let applied = session.fsm.stabilize_from_crisis();
        if applied {
            self.store.save(user_id, session).await;
        }
        applied
    }

    fn dialogue_state_for(
        &self,
        decision: &CoachDecision,
        session: &SessionState,
        risk: RiskLevel,
    ) -> DialogueState {
        if risk.is_elevated() {
            return DialogueState::SafetyCheck;
        }
        match session.fsm.conversation_state() {
            ConversationState::PracticeActive | ConversationState::PracticePaused => {
                DialogueState::Practice
            }
            ConversationState::FollowUp => DialogueState::Reflection,
            _ => match decision.action {
                CoachingAction::Suggest => DialogueState::ModuleSelect,
                _ => DialogueState::Formulation,
            },
        }
    }

    fn build_contract(
        &self,
        decision: &CoachDecision,
        context: &ContextState,
        session: &SessionState,
        dialogue_state: DialogueState,
        language: &str,
    ) -> GenerationContract {
        let generation_task = match decision.action {
            CoachingAction::Listen => "You are an empathetic listener. Reflect the user's \
                feelings, validate their experience, and show you are present. Do NOT suggest \
                exercises or practices."
                .to_string(),
            CoachingAction::Explore => "You are a curious coach. Ask one open question to \
                understand the user's situation better. Be warm and non-judgmental."
                .to_string(),
            CoachingAction::Suggest => {
                let practice = decision
                    .selected_practice_id
                    .as_deref()
                    .and_then(|id| self.catalog.get(id))
                    .map(|entry| format!("{} ({})", entry.title, entry.id))
                    .unwrap_or_else(|| "a short practice".to_string());
                format!(
                    "You are a proactive coach. Gently suggest the practice {practice} as \
                     something that might help right now. Ask for consent before starting. \
                     Be warm and non-pressuring."
                )
            }
            CoachingAction::Guide => "You are a gentle coach. Acknowledge the user's feelings \
                and offer light psychoeducation or reframing. Do NOT push specific exercises yet."
                .to_string(),
            CoachingAction::Answer => "You are a helpful assistant. Answer the user's question \
                directly and concisely."
                .to_string(),
        };

        GenerationContract {
            dialogue_state,
            generation_task,
            instruction: format!(
                "Respond in {language}. Keep the reply to 1-3 sentences with one clear step. \
                 Style: {}. You are a wellness support coach, not a therapist.",
                decision.style
            ),
            persona_summary: "Warm, human wellness coach".to_string(),
            user_summary: context.coaching_hypotheses.join("; "),
            recent_messages: session.dialogue.clone(),
            max_chars_per_message: self.max_chars_per_message,
            language: language.to_string(),
            must_include: Vec::new(),
            must_not: Vec::new(),
            ui_mode: if decision.must_ask_consent {
                UiMode::Buttons
            } else {
                UiMode::Text
            },
            user_response_to: None,
        }
    }
}

/// Escalate the context risk from the classifier verdict; never lower it.
fn fold_verdict_into_risk(context: &mut ContextState, level: SafetyLevel) {
    match level {
        SafetyLevel::Red => {
            if !context.risk_level.is_elevated() {
                context.risk_level = RiskLevel::High;
            }
        }
        SafetyLevel::Yellow => {
            if context.risk_level == RiskLevel::Low {
                context.risk_level = RiskLevel::Medium;
            }
        }
        SafetyLevel::Green => {}
    }
}
