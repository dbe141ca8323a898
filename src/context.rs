//! Model-backed extraction of the per-turn conversation context.
//!
//! Asks the classifier-tier model for a strict-JSON description of the
//! user's emotional state, risk level, and readiness. Every failure mode
//! degrades to a safe neutral context, this stage never errors and never
//! blocks the turn.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::traits::ModelProvider;
use crate::types::{ChatMessage, ContextState, EmotionalState, RiskLevel};

const SYSTEM_PROMPT: &str = r#"You are an expert clinical context analyzer for a CBT/MCT wellness coaching bot.

Your task: analyze the user's current emotional and psychological context based on
their latest message, recent dialogue history, mood trends, and practice history.

Return ONLY valid JSON with this exact schema (no extra text, no markdown fences):
{
  "risk_level": "low|medium|high|crisis",
  "emotional_state": {
    "anxiety": 0.0-1.0,
    "rumination": 0.0-1.0,
    "avoidance": 0.0-1.0,
    "perfectionism": 0.0-1.0,
    "self_criticism": 0.0-1.0,
    "symptom_fixation": 0.0-1.0
  },
  "readiness_for_practice": 0.0-1.0,
  "coaching_hypotheses": ["string"],
  "confidence": 0.0-1.0,
  "candidate_constraints": ["string"]
}

Guidelines:
- risk_level: "low" = no concern, "medium" = mild distress, "high" = significant distress, "crisis" = immediate safety concern
- emotional_state: rate each maintaining cycle dimension from 0.0 (absent) to 1.0 (dominant)
- readiness_for_practice: 0.0 = not ready at all, 1.0 = fully ready and willing
- coaching_hypotheses: brief clinical hypotheses about what maintains the user's current state
- confidence: your confidence in this analysis (0.0-1.0)
- candidate_constraints: any constraints on practice selection (e.g. "no_breathing" if user resists breathing exercises)

Be conservative with risk levels. When uncertain, lean toward lower confidence rather than lower risk.
"#;

/// Confidence reported when the backend call itself fails.
const CALL_FAILURE_CONFIDENCE: f64 = 0.2;
/// Confidence reported when the call succeeds but the body does not parse.
const PARSE_FAILURE_CONFIDENCE: f64 = 0.3;

pub struct ContextBuilder {
    provider: Arc<dyn ModelProvider>,
    model: String,
}

impl ContextBuilder {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Infer the context for this turn. Never errors; any failure returns
    /// a safe neutral context.
    pub async fn build(
        &self,
        user_message: &str,
        dialogue_window: &[ChatMessage],
        mood_history: &[Value],
        practice_history: &[Value],
        user_profile: Option<&Value>,
        language: &str,
    ) -> ContextState {
        let prompt = self.build_user_prompt(
            user_message,
            dialogue_window,
            mood_history,
            practice_history,
            user_profile,
            language,
        );
        let messages = vec![json!({ "role": "user", "content": prompt })];

        let response = match self.provider.chat(&messages, SYSTEM_PROMPT, &self.model).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "context analysis call failed, using safe defaults");
                return ContextState::safe_default(CALL_FAILURE_CONFIDENCE);
            }
        };

        self.parse_response(&response.content)
    }

    fn build_user_prompt(
        &self,
        user_message: &str,
        dialogue_window: &[ChatMessage],
        mood_history: &[Value],
        practice_history: &[Value],
        user_profile: Option<&Value>,
        language: &str,
    ) -> String {
        let mut parts = vec![format!("[Language: {language}]")];

        if let Some(profile) = user_profile {
            parts.push(format!("[User profile]\n{profile}"));
        }
        if !mood_history.is_empty() {
            parts.push(format!(
                "[Mood history]\n{}",
                Value::from(mood_history.to_vec())
            ));
        }
        if !practice_history.is_empty() {
            parts.push(format!(
                "[Practice history]\n{}",
                Value::from(practice_history.to_vec())
            ));
        }
        if !dialogue_window.is_empty() {
            let formatted = dialogue_window
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("[Recent dialogue]\n{formatted}"));
        }

        parts.push(format!("[Current message]\n{user_message}"));
        parts.join("\n\n")
    }

    /// Parse the model's JSON into a ContextState. Missing keys are
    /// default-filled, extra keys ignored, magnitudes clamped to [0,1];
    /// an unparseable body yields safe defaults.
    fn parse_response(&self, text: &str) -> ContextState {
        let cleaned = strip_code_fences(text);

        let data: Value = match serde_json::from_str(cleaned) {
            Ok(v) => v,
            Err(_) => {
                warn!("context analysis body did not parse, using safe defaults");
                return ContextState::safe_default(PARSE_FAILURE_CONFIDENCE);
            }
        };

        let emotional_state: EmotionalState = data
            .get("emotional_state")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let string_list = |key: &str| -> Vec<String> {
            data.get(key)
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        ContextState {
            risk_level: data
                .get("risk_level")
                .and_then(Value::as_str)
                .map(RiskLevel::parse_lenient)
                .unwrap_or(RiskLevel::Low),
            emotional_state: emotional_state.clamped(),
            readiness_for_practice: data
                .get("readiness_for_practice")
                .and_then(Value::as_f64)
                .unwrap_or(0.5)
                .clamp(0.0, 1.0),
            coaching_hypotheses: string_list("coaching_hypotheses"),
            confidence: data
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.5)
                .clamp(0.0, 1.0),
            candidate_constraints: string_list("candidate_constraints"),
        }
    }
}

/// Strip a leading/trailing markdown fence (with optional language tag).
fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if cleaned.starts_with("```") {
        cleaned = match cleaned.find('\n') {
            Some(idx) => &cleaned[idx + 1..],
            None => "",
        };
    }
    if let Some(stripped) = cleaned.strip_suffix("```") {
        cleaned = stripped;
    }
    cleaned.trim()
}
