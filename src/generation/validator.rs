//! Contract and style validation of generated replies.
//!
//! Each check yields a tagged outcome: `Pass`, `Retryable` (worth one
//! correction retry), or `Critical` (straight to fallback, no retry). The
//! adapter loop matches on the variant, so the critical/retryable split is
//! encoded in the type rather than a side table.

use crate::patterns::{
    ACTION_MARKERS, BANNED_SAFETY_MARKERS, CTA_MARKERS, DIAGNOSIS_PATTERNS, EMPATHY_MARKERS,
    HARMFUL_LEXICON_PATTERNS, HUMOR_MARKERS, MEDICATION_PATTERNS, SARCASM_MARKERS,
};
use crate::types::{GenerationContract, RiskLevel};

#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Pass {
        code: &'static str,
    },
    Retryable {
        code: &'static str,
        reason: String,
    },
    Critical {
        code: &'static str,
        reason: String,
    },
}

impl CheckOutcome {
    pub fn code(&self) -> &'static str {
        match self {
            CheckOutcome::Pass { code }
            | CheckOutcome::Retryable { code, .. }
            | CheckOutcome::Critical { code, .. } => code,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, CheckOutcome::Pass { .. })
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, CheckOutcome::Critical { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            CheckOutcome::Pass { .. } => None,
            CheckOutcome::Retryable { reason, .. } | CheckOutcome::Critical { reason, .. } => {
                Some(reason)
            }
        }
    }
}

fn pass(code: &'static str) -> CheckOutcome {
    CheckOutcome::Pass { code }
}

fn retryable(code: &'static str, reason: impl Into<String>) -> CheckOutcome {
    CheckOutcome::Retryable {
        code,
        reason: reason.into(),
    }
}

fn critical(code: &'static str, reason: impl Into<String>) -> CheckOutcome {
    CheckOutcome::Critical {
        code,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Contract validation
// ---------------------------------------------------------------------------

pub struct ResponseValidator;

impl ResponseValidator {
    pub fn new() -> Self {
        Self
    }

    /// Run the nine contract checks against a candidate reply.
    pub fn validate(&self, text: &str, contract: &GenerationContract) -> Vec<CheckOutcome> {
        vec![
            self.check_length(text, contract),
            self.check_must_include(text, contract),
            self.check_must_not(text, contract),
            self.check_no_diagnosis(text),
            self.check_no_medication(text),
            self.check_language_match(text, contract),
            self.check_state_alignment(text, contract),
            self.check_actionability(text),
            self.check_safety_lexicon(text),
        ]
    }

    fn check_length(&self, text: &str, contract: &GenerationContract) -> CheckOutcome {
        let len = text.chars().count();
        if len <= contract.max_chars_per_message {
            pass("length")
        } else {
            retryable(
                "length",
                format!("len={len}, max={}", contract.max_chars_per_message),
            )
        }
    }

    fn check_must_include(&self, text: &str, contract: &GenerationContract) -> CheckOutcome {
        let lower = text.to_lowercase();
        let missing: Vec<&str> = contract
            .must_include
            .iter()
            .filter(|p| !lower.contains(&p.to_lowercase()))
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            pass("must_include")
        } else {
            retryable("must_include", format!("missing: {missing:?}"))
        }
    }

    fn check_must_not(&self, text: &str, contract: &GenerationContract) -> CheckOutcome {
        let lower = text.to_lowercase();
        let found: Vec<&str> = contract
            .must_not
            .iter()
            .filter(|p| lower.contains(&p.to_lowercase()))
            .map(String::as_str)
            .collect();
        if found.is_empty() {
            pass("must_not")
        } else {
            retryable("must_not", format!("found: {found:?}"))
        }
    }

    fn check_no_diagnosis(&self, text: &str) -> CheckOutcome {
        for pattern in DIAGNOSIS_PATTERNS.iter() {
            if let Some(m) = pattern.find(text) {
                return critical("no_diagnosis", format!("diagnostic language: {}", m.as_str()));
            }
        }
        pass("no_diagnosis")
    }

    fn check_no_medication(&self, text: &str) -> CheckOutcome {
        for pattern in MEDICATION_PATTERNS.iter() {
            if let Some(m) = pattern.find(text) {
                return critical("no_medication", format!("medication language: {}", m.as_str()));
            }
        }
        pass("no_medication")
    }

    /// Script-ratio heuristic: a ru/en reply must be at least 30% written
    /// in the expected script. Other languages pass.
    fn check_language_match(&self, text: &str, contract: &GenerationContract) -> CheckOutcome {
        let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
        if letters.is_empty() {
            return pass("language_match");
        }

        let ratio = match contract.language.as_str() {
            "ru" => {
                let cyrillic = letters
                    .iter()
                    .filter(|c| ('\u{0400}'..='\u{04FF}').contains(*c))
                    .count();
                cyrillic as f64 / letters.len() as f64
            }
            "en" => {
                let latin = letters.iter().filter(|c| c.is_ascii_alphabetic()).count();
                latin as f64 / letters.len() as f64
            }
            _ => return pass("language_match"),
        };

        if ratio >= 0.3 {
            pass("language_match")
        } else {
            retryable(
                "language_match",
                format!("script ratio {ratio:.2} < 0.3 for {}", contract.language),
            )
        }
    }

    fn check_state_alignment(&self, text: &str, contract: &GenerationContract) -> CheckOutcome {
        if text.trim().is_empty() {
            return retryable("state_alignment", "empty response");
        }
        if contract.dialogue_state.is_escalation() {
            let lower = text.to_lowercase();
            if HUMOR_MARKERS.iter().any(|m| lower.contains(m)) {
                return critical("state_alignment", "humor in safety/escalation state");
            }
        }
        pass("state_alignment")
    }

    fn check_actionability(&self, text: &str) -> CheckOutcome {
        let lower = text.to_lowercase();
        let has_action = ACTION_MARKERS
            .iter()
            .chain(CTA_MARKERS.iter())
            .any(|m| lower.contains(m));
        if has_action {
            pass("actionability")
        } else {
            retryable("actionability", "no actionable element found")
        }
    }

    fn check_safety_lexicon(&self, text: &str) -> CheckOutcome {
        for pattern in HARMFUL_LEXICON_PATTERNS.iter() {
            if let Some(m) = pattern.find(text) {
                return critical("safety_lexicon", format!("harmful content: {}", m.as_str()));
            }
        }
        pass("safety_lexicon")
    }
}

impl Default for ResponseValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Style validation
// ---------------------------------------------------------------------------

pub struct StyleValidationInput<'a> {
    pub text: &'a str,
    pub risk_level: RiskLevel,
    pub user_tone_playful: bool,
    pub long_form_requested: bool,
}

const MAX_SENTENCES: usize = 3;
const MAX_QUESTIONS: usize = 1;
const MAX_CHARS_SHORT: usize = 500;
const MAX_CHARS_LONG: usize = 1400;

/// Run the nine voice/style checks against a candidate reply.
pub fn validate_style(input: &StyleValidationInput<'_>) -> Vec<CheckOutcome> {
    let text = input.text;
    let lower = text.trim().to_lowercase();
    let mut results = Vec::with_capacity(9);

    // 1) Length by form.
    let max_chars = if input.long_form_requested {
        MAX_CHARS_LONG
    } else {
        MAX_CHARS_SHORT
    };
    let len = text.chars().count();
    results.push(if len <= max_chars {
        pass("style_length")
    } else {
        retryable("style_length", format!("len={len}, max={max_chars}"))
    });

    // 2) Sentence cap.
    let sentence_count = text.chars().filter(|c| matches!(c, '.' | '!' | '?')).count();
    results.push(if sentence_count <= MAX_SENTENCES {
        pass("sentence_limit")
    } else {
        retryable("sentence_limit", format!("{sentence_count} sentence marks"))
    });

    // 3) Question cap.
    let question_count = text.chars().filter(|c| *c == '?').count();
    results.push(if question_count <= MAX_QUESTIONS {
        pass("question_limit")
    } else {
        retryable("question_limit", format!("{question_count} questions"))
    });

    // 4) Empathy marker present.
    let has_empathy = EMPATHY_MARKERS.iter().any(|m| lower.contains(m));
    results.push(if has_empathy {
        pass("empathy_present")
    } else {
        retryable("empathy_present", "no empathy marker")
    });

    // 5) Clear call to action present.
    let has_cta = CTA_MARKERS.iter().any(|m| lower.contains(m));
    results.push(if has_cta {
        pass("cta_present")
    } else {
        retryable("cta_present", "no call to action")
    });

    // 6) Banned content.
    let banned_hit = BANNED_SAFETY_MARKERS.iter().find(|b| lower.contains(**b));
    results.push(match banned_hit {
        None => pass("no_banned_content"),
        Some(hit) => critical("no_banned_content", format!("banned phrase: {hit}")),
    });

    // 7) Sarcasm gating: allowed only at low risk with a receptive user.
    let has_sarcasm = SARCASM_MARKERS.iter().any(|m| lower.contains(m));
    let sarcasm_allowed = input.risk_level == RiskLevel::Low && input.user_tone_playful;
    results.push(if !has_sarcasm || sarcasm_allowed {
        pass("sarcasm_gate")
    } else {
        retryable("sarcasm_gate", "sarcasm without a receptive context")
    });

    // 8) No playful tone at elevated risk.
    results.push(if input.risk_level.is_elevated() && has_sarcasm {
        critical("no_playful_high_risk", "playful tone at elevated risk")
    } else {
        pass("no_playful_high_risk")
    });

    // 9) One clear step: 1-2 action markers.
    let action_count = ACTION_MARKERS.iter().filter(|m| lower.contains(**m)).count();
    results.push(if (1..=2).contains(&action_count) {
        pass("actionable_one_step")
    } else {
        retryable(
            "actionable_one_step",
            format!("{action_count} action markers, want 1-2"),
        )
    });

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, DialogueState, UiMode};

    fn contract(language: &str, state: DialogueState) -> GenerationContract {
        GenerationContract {
            dialogue_state: state,
            generation_task: "reply supportively".to_string(),
            instruction: String::new(),
            persona_summary: String::new(),
            user_summary: String::new(),
            recent_messages: vec![ChatMessage::user("hi")],
            max_chars_per_message: 500,
            language: language.to_string(),
            must_include: Vec::new(),
            must_not: Vec::new(),
            ui_mode: UiMode::Text,
            user_response_to: None,
        }
    }

    fn failures(results: &[CheckOutcome]) -> Vec<&'static str> {
        results
            .iter()
            .filter(|r| !r.passed())
            .map(|r| r.code())
            .collect()
    }

    #[test]
    fn clean_reply_passes_all_contract_checks() {
        let validator = ResponseValidator::new();
        let results = validator.validate(
            "I hear you, that sounds hard. Try one small step today?",
            &contract("en", DialogueState::Formulation),
        );
        assert!(failures(&results).is_empty());
    }

    #[test]
    fn overlong_reply_fails_length_retryably() {
        let validator = ResponseValidator::new();
        let long = "word ".repeat(200);
        let results = validator.validate(&long, &contract("en", DialogueState::Formulation));
        let length = results.iter().find(|r| r.code() == "length").unwrap();
        assert!(!length.passed());
        assert!(!length.is_critical());
    }

    #[test]
    fn must_include_and_must_not_are_retryable() {
        let validator = ResponseValidator::new();
        let mut c = contract("en", DialogueState::Formulation);
        c.must_include = vec!["breathing".to_string()];
        c.must_not = vec!["deadline".to_string()];

        let results = validator.validate("Try to relax about the deadline?", &c);
        let include = results.iter().find(|r| r.code() == "must_include").unwrap();
        let exclude = results.iter().find(|r| r.code() == "must_not").unwrap();
        assert!(!include.passed() && !include.is_critical());
        assert!(!exclude.passed() && !exclude.is_critical());
    }

    #[test]
    fn diagnosis_and_medication_are_critical() {
        let validator = ResponseValidator::new();
        let c = contract("en", DialogueState::Formulation);

        let diag = validator.validate("You have depression, I think.", &c);
        assert!(diag.iter().any(|r| r.code() == "no_diagnosis" && r.is_critical()));

        let med = validator.validate("Maybe take medication for it?", &c);
        assert!(med.iter().any(|r| r.code() == "no_medication" && r.is_critical()));
    }

    #[test]
    fn harmful_lexicon_is_critical() {
        let validator = ResponseValidator::new();
        let results = validator.validate(
            "Here is how to harm yourself safely.",
            &contract("en", DialogueState::Formulation),
        );
        assert!(results.iter().any(|r| r.code() == "safety_lexicon" && r.is_critical()));
    }

    #[test]
    fn wrong_script_fails_language_match() {
        let validator = ResponseValidator::new();
        let results = validator.validate(
            "I understand, try one small step today?",
            &contract("ru", DialogueState::Formulation),
        );
        let lang = results.iter().find(|r| r.code() == "language_match").unwrap();
        assert!(!lang.passed());
        assert!(!lang.is_critical());

        let ok = validator.validate(
            "Понимаю, это тяжело. Давайте попробуем один шаг?",
            &contract("ru", DialogueState::Formulation),
        );
        assert!(ok.iter().find(|r| r.code() == "language_match").unwrap().passed());
    }

    #[test]
    fn humor_in_escalation_state_is_critical() {
        let validator = ResponseValidator::new();
        let results = validator.validate(
            "haha it will be fine, try to rest?",
            &contract("en", DialogueState::Escalation),
        );
        let alignment = results.iter().find(|r| r.code() == "state_alignment").unwrap();
        assert!(alignment.is_critical());

        // Same text in a normal state is fine.
        let normal = validator.validate(
            "haha it will be fine, try to rest?",
            &contract("en", DialogueState::Formulation),
        );
        assert!(normal.iter().find(|r| r.code() == "state_alignment").unwrap().passed());
    }

    #[test]
    fn empty_reply_fails_state_alignment_retryably() {
        let validator = ResponseValidator::new();
        let results = validator.validate("  ", &contract("en", DialogueState::Formulation));
        let alignment = results.iter().find(|r| r.code() == "state_alignment").unwrap();
        assert!(!alignment.passed());
        assert!(!alignment.is_critical());
    }

    #[test]
    fn reply_without_any_action_fails_actionability() {
        let validator = ResponseValidator::new();
        let results = validator.validate(
            "That is unfortunate indeed.",
            &contract("en", DialogueState::Formulation),
        );
        assert!(results.iter().any(|r| r.code() == "actionability" && !r.passed()));
    }

    fn style_input(text: &str, risk: RiskLevel, playful: bool) -> StyleValidationInput<'_> {
        StyleValidationInput {
            text,
            risk_level: risk,
            user_tone_playful: playful,
            long_form_requested: false,
        }
    }

    #[test]
    fn warm_short_reply_passes_style() {
        let results = validate_style(&style_input(
            "I hear you, that sounds hard. Try one small step today?",
            RiskLevel::Low,
            false,
        ));
        assert!(failures(&results).is_empty());
    }

    #[test]
    fn sentence_and_question_caps_fail_retryably() {
        let results = validate_style(&style_input(
            "One. Two. Three. Four. Do you? Will you?",
            RiskLevel::Low,
            false,
        ));
        assert!(results.iter().any(|r| r.code() == "sentence_limit" && !r.passed()));
        let questions = results.iter().find(|r| r.code() == "question_limit").unwrap();
        assert!(!questions.passed() && !questions.is_critical());
    }

    #[test]
    fn banned_content_is_critical_in_style_layer() {
        let results = validate_style(&style_input(
            "у вас депрессия, это точно",
            RiskLevel::Low,
            false,
        ));
        assert!(results.iter().any(|r| r.code() == "no_banned_content" && r.is_critical()));
    }

    #[test]
    fn sarcasm_gated_by_risk_and_tone() {
        // Playful user at low risk: allowed.
        let ok = validate_style(&style_input(
            "I hear you. Brilliant plan, truly. Try it today?",
            RiskLevel::Low,
            true,
        ));
        assert!(ok.iter().find(|r| r.code() == "sarcasm_gate").unwrap().passed());

        // Same text without a playful tone: retryable.
        let gated = validate_style(&style_input(
            "I hear you. Brilliant plan, truly. Try it today?",
            RiskLevel::Low,
            false,
        ));
        let gate = gated.iter().find(|r| r.code() == "sarcasm_gate").unwrap();
        assert!(!gate.passed() && !gate.is_critical());
    }

    #[test]
    fn playful_tone_at_elevated_risk_is_critical() {
        let results = validate_style(&style_input(
            "I hear you. Brilliant plan, truly. Try it today?",
            RiskLevel::Crisis,
            true,
        ));
        assert!(results
            .iter()
            .any(|r| r.code() == "no_playful_high_risk" && r.is_critical()));
    }

    #[test]
    fn long_form_flag_raises_the_length_cap() {
        let text = format!("I hear you. {} Try one step today?", "word ".repeat(150));
        let short = validate_style(&style_input(&text, RiskLevel::Low, false));
        assert!(short.iter().any(|r| r.code() == "style_length" && !r.passed()));

        let long = validate_style(&StyleValidationInput {
            text: &text,
            risk_level: RiskLevel::Low,
            user_tone_playful: false,
            long_form_requested: true,
        });
        assert!(long.iter().find(|r| r.code() == "style_length").unwrap().passed());
    }

    #[test]
    fn too_many_action_markers_fail_one_step_check() {
        let results = validate_style(&style_input(
            "I hear you. Try this, rate it, choose one, tell me after?",
            RiskLevel::Low,
            false,
        ));
        assert!(results
            .iter()
            .any(|r| r.code() == "actionable_one_step" && !r.passed()));
    }
}
