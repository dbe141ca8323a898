//! Deterministic multilingual crisis pre-check.
//!
//! Runs before any backend call as step 1 of the pipeline. Pure pattern
//! matching against the compiled gate registry, no network, no model.
//! The gate never suppresses a reply; a crisis hit only redirects the turn
//! to the crisis-resource response.

use crate::patterns::{GateSeverity, GATE_PATTERNS};

/// Risk vocabulary of the gate. Coarser than the context builder's
/// `RiskLevel` on purpose: the gate only distinguishes what its lexicons
/// can actually support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRisk {
    Safe,
    High,
    Crisis,
}

impl GateRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            GateRisk::Safe => "safe",
            GateRisk::High => "high",
            GateRisk::Crisis => "crisis",
        }
    }
}

/// Recommended handling for the matched severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyAction {
    Pass,
    FlagReview,
    CrisisProtocol,
}

#[derive(Debug, Clone)]
pub struct SafetyGateResult {
    pub risk_level: GateRisk,
    pub safety_action: SafetyAction,
    pub signals: Vec<&'static str>,
}

impl SafetyGateResult {
    fn safe() -> Self {
        Self {
            risk_level: GateRisk::Safe,
            safety_action: SafetyAction::Pass,
            signals: Vec::new(),
        }
    }
}

/// Deterministic crisis detector over the compiled gate registry.
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Scan text for crisis signals. Any crisis match wins over high,
    /// which wins over safe. Blank text is safe.
    pub fn check(&self, text: &str) -> SafetyGateResult {
        if text.trim().is_empty() {
            return SafetyGateResult::safe();
        }

        let mut signals = Vec::new();
        let mut worst: Option<GateSeverity> = None;

        for pattern in GATE_PATTERNS.iter() {
            if pattern.regex.is_match(text) {
                signals.push(pattern.signal);
                worst = Some(match worst {
                    Some(prev) => prev.max(pattern.severity),
                    None => pattern.severity,
                });
            }
        }

        match worst {
            Some(GateSeverity::Crisis) => SafetyGateResult {
                risk_level: GateRisk::Crisis,
                safety_action: SafetyAction::CrisisProtocol,
                signals,
            },
            Some(GateSeverity::High) => SafetyGateResult {
                risk_level: GateRisk::High,
                safety_action: SafetyAction::FlagReview,
                signals,
            },
            None => SafetyGateResult::safe(),
        }
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}
