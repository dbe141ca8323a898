//! Two-layer safety classifier: hard rules, then an optional model call.
//!
//! Non-blocking by design, the verdict carries no block flag at all. The
//! agent always helps; Red only attaches crisis resources, Yellow only
//! attaches a specialist suggestion. Any model or parse failure degrades to
//! Green (fail open).

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::patterns::{ClassifierPattern, RED_PATTERNS, YELLOW_PATTERNS};
use crate::traits::ModelProvider;
use crate::types::ChatMessage;

/// Soft severity levels. Green = help freely; Yellow = suggest a specialist
/// alongside help; Red = attach crisis resources and stay available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyLevel {
    Green,
    Yellow,
    Red,
}

impl SafetyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyLevel::Green => "green",
            SafetyLevel::Yellow => "yellow",
            SafetyLevel::Red => "red",
        }
    }
}

/// Classification outcome. Informational only, it annotates the reply and
/// can escalate the turn's risk, but never prevents help.
#[derive(Debug, Clone)]
pub struct SafetyVerdict {
    pub level: SafetyLevel,
    pub protocol_id: Option<String>,
    pub signals: Vec<String>,
    pub confidence: f64,
    pub crisis_resources: Option<String>,
    pub specialist_suggestion: Option<String>,
    /// Which layer produced the verdict: "rules", "model", or "heuristic".
    pub source: &'static str,
}

impl SafetyVerdict {
    fn green(signal: &str, source: &'static str) -> Self {
        Self {
            level: SafetyLevel::Green,
            protocol_id: None,
            signals: vec![signal.to_string()],
            confidence: 0.0,
            crisis_resources: None,
            specialist_suggestion: None,
            source,
        }
    }
}

fn crisis_resources(language: &str) -> String {
    match language {
        "ru" => "Телефон доверия: 8-800-2000-122 (бесплатно, круглосуточно). \
                 Ты не одна/один. Я здесь."
            .to_string(),
        _ => "Crisis line: 988 (Suicide & Crisis Lifeline, US) or text HOME to 741741. \
              You're not alone. I'm here."
            .to_string(),
    }
}

fn specialist_suggestion(language: &str) -> String {
    match language {
        "ru" => "Кстати, с этим также могут помочь специалисты — \
                 хочешь, подскажу как найти?"
            .to_string(),
        _ => "By the way, a specialist could also help with this — \
              want me to suggest how to find one?"
            .to_string(),
    }
}

const LAYER2_SYSTEM: &str = "You are a safety classifier for a wellness coaching bot. \
Classify the user's message into safety levels. \
Respond ONLY with JSON: {\"safety_level\":\"green|yellow|red\",\
\"protocol\":null or \"S1\"|\"S2\"|\"S3\"|\"S4\"|\"S5\"|\"S6\"|\"S7\",\
\"signals\":[\"list\"],\"confidence\":0.0-1.0}";

/// Confidence below which a RED verdict is still escalated rather than
/// discounted. Safety beats precision.
const RED_CONFIDENCE_FLOOR: f64 = 0.7;

pub struct SafetyClassifier {
    provider: Option<Arc<dyn ModelProvider>>,
    model: String,
}

impl SafetyClassifier {
    pub fn new(provider: Option<Arc<dyn ModelProvider>>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Layer 1: instant pattern matching. Returns None when no registry
    /// entry fires.
    pub fn check_hard_rules(&self, text: &str, language: &str) -> Option<SafetyVerdict> {
        if let Some(hit) = first_match(&RED_PATTERNS, text) {
            return Some(SafetyVerdict {
                level: SafetyLevel::Red,
                protocol_id: Some(hit.protocol_id.to_string()),
                signals: vec![hit.signal.to_string()],
                confidence: 1.0,
                crisis_resources: Some(crisis_resources(language)),
                specialist_suggestion: None,
                source: "rules",
            });
        }

        if let Some(hit) = first_match(&YELLOW_PATTERNS, text) {
            return Some(SafetyVerdict {
                level: SafetyLevel::Yellow,
                protocol_id: Some(hit.protocol_id.to_string()),
                signals: vec![hit.signal.to_string()],
                confidence: 1.0,
                crisis_resources: None,
                specialist_suggestion: Some(specialist_suggestion(language)),
                source: "rules",
            });
        }

        None
    }

    /// Full two-layer classification. Layer 1 short-circuits Layer 2; the
    /// model is consulted only when the rules stay silent and a provider is
    /// configured.
    pub async fn classify(
        &self,
        text: &str,
        context: &[ChatMessage],
        language: &str,
    ) -> SafetyVerdict {
        if let Some(verdict) = self.check_hard_rules(text, language) {
            return verdict;
        }

        match &self.provider {
            Some(provider) => self.classify_with_model(provider, text, context, language).await,
            None => SafetyVerdict::green("no_llm_classifier", "heuristic"),
        }
    }

    async fn classify_with_model(
        &self,
        provider: &Arc<dyn ModelProvider>,
        text: &str,
        context: &[ChatMessage],
        language: &str,
    ) -> SafetyVerdict {
        let tail_start = context.len().saturating_sub(3);
        let context_str = context[tail_start..]
            .iter()
            .map(|m| {
                let content: String = m.content.chars().take(100).collect();
                format!("{}: {}", m.role, content)
            })
            .collect::<Vec<_>>()
            .join(" | ");

        let prompt = format!("User message: \"{text}\"\nRecent context: \"{context_str}\"");
        let messages = vec![json!({ "role": "user", "content": prompt })];

        let response = match provider.chat(&messages, LAYER2_SYSTEM, &self.model).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "safety classifier model call failed, degrading to green");
                return SafetyVerdict::green("llm_error", "heuristic");
            }
        };

        match self.parse_model_verdict(&response.content, language) {
            Some(verdict) => verdict,
            None => {
                warn!("safety classifier returned unparseable body, degrading to green");
                SafetyVerdict::green("llm_error", "heuristic")
            }
        }
    }

    /// Tolerant parse: missing keys are default-filled, extra keys ignored,
    /// garbage rejects the whole body (the caller degrades to green).
    fn parse_model_verdict(&self, body: &str, language: &str) -> Option<SafetyVerdict> {
        let data: Value = serde_json::from_str(body.trim()).ok()?;

        let level_str = data
            .get("safety_level")
            .and_then(Value::as_str)
            .unwrap_or("green")
            .to_ascii_lowercase();
        let confidence = data
            .get("confidence")
            .and_then(Value::as_f64)
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);
        let mut signals: Vec<String> = data
            .get("signals")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let protocol_id = data
            .get("protocol")
            .and_then(Value::as_str)
            .map(str::to_string);

        let level = match level_str.as_str() {
            "red" => {
                // Asymmetric rule: a hesitant RED still escalates.
                if confidence < RED_CONFIDENCE_FLOOR {
                    signals.push("low_confidence_crisis".to_string());
                }
                SafetyLevel::Red
            }
            "yellow" => SafetyLevel::Yellow,
            _ => SafetyLevel::Green,
        };

        Some(SafetyVerdict {
            crisis_resources: (level == SafetyLevel::Red).then(|| crisis_resources(language)),
            specialist_suggestion: (level == SafetyLevel::Yellow)
                .then(|| specialist_suggestion(language)),
            level,
            protocol_id,
            signals,
            confidence,
            source: "model",
        })
    }
}

fn first_match<'a>(registry: &'a [ClassifierPattern], text: &str) -> Option<&'a ClassifierPattern> {
    registry.iter().find(|p| p.regex.is_match(text))
}
