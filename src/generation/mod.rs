//! Contract-bound generation with validation, correction retries, a
//! circuit breaker, and static fallbacks.
//!
//! The adapter never surfaces an error: every path ends in either a
//! validated reply or a dialogue-state fallback string.

mod breaker;
mod fallback;
mod validator;

pub use breaker::{BreakerState, CircuitBreaker};
pub use fallback::{crisis_response, generic_fallback, state_fallback};
pub use validator::{validate_style, CheckOutcome, ResponseValidator, StyleValidationInput};

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::providers::ProviderError;
use crate::traits::ModelProvider;
use crate::types::{GenerationContract, RiskLevel, UiMode};

/// Fixed voice/style layer prepended to every generation system prompt.
const STYLE_SYSTEM_PROMPT: &str = r#"[VOICE + STYLE LAYER]

You are a warm, human wellness coach (CBT/MCT-oriented), not a clinical authority.
Your tone is natural, direct, and supportive. You speak like a real person, not a manual.

Core behavior each turn:
1) Acknowledge emotion/context briefly.
2) Give one clear, practical next step.
3) End with one interactive question or prompt.

Default response shape:
- 1-3 short sentences
- max 1 question
- plain language, no jargon unless the user asks
- actionable, concrete

Humor policy:
- Light micro-humor is allowed only when risk is low and the user's tone is receptive.
- Forbidden in caution/crisis contexts, shame, grief, trauma, self-harm.

Never do:
- Diagnose mental disorders.
- Give medication instructions.
- Claim to replace therapy.
- Provide self-harm instructions.
- Minimize risk signals.

Safety override:
- If safety policy requires escalation, follow the safety protocol exactly.
- In a crisis: no playful tone, no style experimentation.
- Safety instructions override all style rules."#;

pub struct GenerationAdapter {
    provider: Arc<dyn ModelProvider>,
    model: String,
    max_repeat_count: usize,
    validator: ResponseValidator,
    breaker: Arc<Mutex<CircuitBreaker>>,
}

impl GenerationAdapter {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        model: impl Into<String>,
        max_repeat_count: usize,
        breaker: Arc<Mutex<CircuitBreaker>>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_repeat_count: max_repeat_count.max(1),
            validator: ResponseValidator::new(),
            breaker,
        }
    }

    /// Generate a reply bound by `contract`. Returns validated backend
    /// text verbatim, or a static fallback. Never errors.
    pub async fn generate(
        &self,
        contract: &GenerationContract,
        risk_level: RiskLevel,
        user_tone_playful: bool,
    ) -> String {
        if !self.lock_breaker().allow_request() {
            info!(
                state = contract.dialogue_state.as_str(),
                "circuit breaker open, returning state fallback"
            );
            return self.fallback_for(contract);
        }

        let system = self.build_system_prompt(contract);
        let mut messages = self.build_messages(contract);

        for attempt in 1..=self.max_repeat_count {
            let raw = match self.provider.chat(&messages, &system, &self.model).await {
                Ok(response) => response.content,
                Err(e) => {
                    warn!(error = %e, attempt, "generation call failed");
                    self.lock_breaker().record_failure();
                    // Config-class failures (bad key, bad model) will not
                    // heal on retry; go straight to the fallback.
                    let retryable = e
                        .downcast_ref::<ProviderError>()
                        .map(ProviderError::is_retryable)
                        .unwrap_or(true);
                    if !retryable {
                        break;
                    }
                    continue;
                }
            };

            let mut results = self.validator.validate(&raw, contract);
            results.extend(validate_style(&StyleValidationInput {
                text: &raw,
                risk_level,
                user_tone_playful,
                long_form_requested: contract.max_chars_per_message > 500,
            }));

            let failures: Vec<&CheckOutcome> = results.iter().filter(|r| !r.passed()).collect();

            if failures.iter().any(|r| r.is_critical()) {
                let codes: Vec<&str> = failures
                    .iter()
                    .filter(|r| r.is_critical())
                    .map(|r| r.code())
                    .collect();
                warn!(?codes, attempt, "critical validation failure, no retry");
                self.lock_breaker().record_failure();
                return self.fallback_for(contract);
            }

            if failures.is_empty() {
                self.lock_breaker().record_success();
                return raw;
            }

            if attempt < self.max_repeat_count {
                let codes: Vec<&str> = failures.iter().map(|r| r.code()).collect();
                info!(?codes, attempt, "retryable validation failures, asking for correction");
                messages = self.build_correction_messages(contract, &raw, &failures);
                continue;
            }

            warn!(attempt, "generation retries exhausted");
            self.lock_breaker().record_failure();
        }

        self.fallback_for(contract)
    }

    fn lock_breaker(&self) -> std::sync::MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().expect("circuit breaker lock poisoned")
    }

    fn fallback_for(&self, contract: &GenerationContract) -> String {
        state_fallback(contract.dialogue_state, &contract.language)
    }

    fn build_system_prompt(&self, contract: &GenerationContract) -> String {
        let mut parts = vec![STYLE_SYSTEM_PROMPT.to_string()];
        if !contract.persona_summary.is_empty() {
            parts.push(format!("\n[PERSONA]\n{}", contract.persona_summary));
        }
        if !contract.instruction.is_empty() {
            parts.push(format!("\n[INSTRUCTION]\n{}", contract.instruction));
        }
        parts.push(format!("\n[GENERATION TASK]\n{}", contract.generation_task));
        parts.push(format!(
            "\n[CONSTRAINTS]\nmax_chars: {}",
            contract.max_chars_per_message
        ));
        if !contract.must_include.is_empty() {
            parts.push(format!("must_include phrases: {:?}", contract.must_include));
        }
        if !contract.must_not.is_empty() {
            parts.push(format!("must_not contain: {:?}", contract.must_not));
        }
        if contract.ui_mode != UiMode::Text {
            // The transport renders controls for this mode; the reply
            // should not spell the options out in prose.
            parts.push(format!("ui_mode: {}", contract.ui_mode.as_str()));
        }
        parts.push(format!("language: {}", contract.language));
        parts.join("\n")
    }

    fn build_messages(&self, contract: &GenerationContract) -> Vec<Value> {
        let mut messages: Vec<Value> = contract
            .recent_messages
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.content }))
            .collect();
        if !contract.user_summary.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": format!("[User context: {}]", contract.user_summary),
            }));
        }
        if let Some(reply_to) = &contract.user_response_to {
            messages.push(json!({ "role": "user", "content": reply_to }));
        }
        if messages.is_empty() {
            messages.push(json!({ "role": "user", "content": contract.generation_task }));
        }
        messages
    }

    /// History for a correction retry: the failed reply plus a summary of
    /// the violated checks, asking for a regeneration.
    fn build_correction_messages(
        &self,
        contract: &GenerationContract,
        raw: &str,
        failures: &[&CheckOutcome],
    ) -> Vec<Value> {
        let issues = failures
            .iter()
            .map(|r| format!("- {}: {}", r.code(), r.reason().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("\n");
        let correction = format!(
            "Your previous response had these issues:\n{issues}\n\n\
             Please regenerate, fixing the issues above. \
             Keep within {} chars, language={}.",
            contract.max_chars_per_message, contract.language
        );

        let mut messages = self.build_messages(contract);
        messages.push(json!({ "role": "assistant", "content": raw }));
        messages.push(json!({ "role": "user", "content": correction }));
        messages
    }
}
