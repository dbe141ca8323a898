//! Deterministic post-generation output backstop.
//!
//! Runs after the generation adapter has already validated the reply, an
//! independent second scan for diagnosis, medication, and pressure language
//! that a coach must never produce. Pure pattern matching, first match wins.

use crate::patterns::OUTPUT_SAFETY_PATTERNS;

/// What to do with the scanned reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckAction {
    Pass,
    Rewrite,
}

#[derive(Debug, Clone)]
pub struct SafetyCheckResult {
    pub approved: bool,
    pub reason: Option<&'static str>,
    pub action: CheckAction,
}

impl SafetyCheckResult {
    fn approved() -> Self {
        Self {
            approved: true,
            reason: None,
            action: CheckAction::Pass,
        }
    }
}

pub struct OutputSafetyCheck;

impl OutputSafetyCheck {
    pub fn new() -> Self {
        Self
    }

    /// Scan generated text. Empty text is always approved.
    pub fn validate(&self, text: &str) -> SafetyCheckResult {
        if text.trim().is_empty() {
            return SafetyCheckResult::approved();
        }

        for pattern in OUTPUT_SAFETY_PATTERNS.iter() {
            if pattern.regex.is_match(text) {
                return SafetyCheckResult {
                    approved: false,
                    reason: Some(pattern.reason),
                    action: CheckAction::Rewrite,
                };
            }
        }

        SafetyCheckResult::approved()
    }
}

impl Default for OutputSafetyCheck {
    fn default() -> Self {
        Self::new()
    }
}
