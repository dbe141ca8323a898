//! Core data model for the coaching engine.
//!
//! Everything here is plain data: per-turn analysis results, the coach
//! decision vocabulary, the two FSM state alphabets, and the generation
//! contract handed to the adapter. Mutation logic lives in the owning
//! modules (`fsm`, `session`, `generation`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level attached to a turn by the safety layers and context builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
    Crisis,
}

impl RiskLevel {
    /// High and crisis gate off proactive suggestions and playful tone.
    pub fn is_elevated(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Crisis)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Crisis => "crisis",
        }
    }

    /// Lenient parse for loosely-typed backend responses. Unknown → Low.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            "crisis" => RiskLevel::Crisis,
            _ => RiskLevel::Low,
        }
    }
}

/// Six bounded maintaining-cycle magnitudes, produced fresh each turn.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EmotionalState {
    #[serde(default)]
    pub anxiety: f64,
    #[serde(default)]
    pub rumination: f64,
    #[serde(default)]
    pub avoidance: f64,
    #[serde(default)]
    pub perfectionism: f64,
    #[serde(default)]
    pub self_criticism: f64,
    #[serde(default)]
    pub symptom_fixation: f64,
}

impl EmotionalState {
    /// Field names in declared order, ties in `dominant` resolve to the
    /// earliest entry.
    pub const FIELDS: [&'static str; 6] = [
        "anxiety",
        "rumination",
        "avoidance",
        "perfectionism",
        "self_criticism",
        "symptom_fixation",
    ];

    fn values(&self) -> [f64; 6] {
        [
            self.anxiety,
            self.rumination,
            self.avoidance,
            self.perfectionism,
            self.self_criticism,
            self.symptom_fixation,
        ]
    }

    /// Name of the strongest maintaining cycle. All-zero states report the
    /// first field.
    pub fn dominant(&self) -> &'static str {
        let values = self.values();
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v > values[best] {
                best = i;
            }
        }
        Self::FIELDS[best]
    }

    /// Strongest single magnitude across all six cycles.
    pub fn max_signal(&self) -> f64 {
        self.values().iter().cloned().fold(0.0, f64::max)
    }

    /// Copy with every field clamped to [0,1]. Applied to anything parsed
    /// from a backend response.
    pub fn clamped(&self) -> Self {
        let c = |v: f64| v.clamp(0.0, 1.0);
        Self {
            anxiety: c(self.anxiety),
            rumination: c(self.rumination),
            avoidance: c(self.avoidance),
            perfectionism: c(self.perfectionism),
            self_criticism: c(self.self_criticism),
            symptom_fixation: c(self.symptom_fixation),
        }
    }
}

/// Per-turn conversation context inferred by the context builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextState {
    pub risk_level: RiskLevel,
    pub emotional_state: EmotionalState,
    pub readiness_for_practice: f64,
    pub coaching_hypotheses: Vec<String>,
    pub confidence: f64,
    pub candidate_constraints: Vec<String>,
}

impl ContextState {
    /// Neutral context used whenever inference fails. The caller picks the
    /// confidence so call failures (0.2) and parse failures (0.3) stay
    /// distinguishable in logs.
    pub fn safe_default(confidence: f64) -> Self {
        Self {
            risk_level: RiskLevel::Low,
            emotional_state: EmotionalState::default(),
            readiness_for_practice: 0.5,
            coaching_hypotheses: Vec::new(),
            confidence,
            candidate_constraints: Vec::new(),
        }
    }
}

/// Outcome of the opportunity scorer for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityResult {
    pub opportunity_score: f64,
    pub allow_proactive_suggest: bool,
    pub reason_codes: Vec<String>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Outcome recorded against a past practice suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionOutcome {
    Pending,
    Accepted,
    Declined,
}

/// One past suggestion in a session's history, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRecord {
    pub id: String,
    pub practice_id: String,
    pub outcome: SuggestionOutcome,
    pub created_at: DateTime<Utc>,
}

/// Per-practice usage history supplied by the persistence collaborator.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PracticeUsage {
    pub times_used_7d: u32,
    /// Self-reported effectiveness on a 0-10 scale.
    pub avg_effectiveness: f64,
    pub last_declined: bool,
}

/// A practice candidate after ranking, ordered by `final_score` descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PracticeCandidateRanked {
    pub practice_id: String,
    /// Rounded to 6 decimals so equal inputs rank identically across runs.
    pub final_score: f64,
    pub confidence: f64,
    pub reason_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_ids: Option<Vec<String>>,
}

/// The five coaching actions the policy engine can pick for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoachingAction {
    Listen,
    Explore,
    Suggest,
    Guide,
    Answer,
}

impl CoachingAction {
    pub fn as_str(self) -> &'static str {
        match self {
            CoachingAction::Listen => "LISTEN",
            CoachingAction::Explore => "EXPLORE",
            CoachingAction::Suggest => "SUGGEST",
            CoachingAction::Guide => "GUIDE",
            CoachingAction::Answer => "ANSWER",
        }
    }
}

/// Final per-turn decision handed to the generation adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct CoachDecision {
    pub action: CoachingAction,
    pub selected_practice_id: Option<String>,
    /// Style tag consumed by the generation adapter's prompt assembly.
    pub style: &'static str,
    /// True iff `action` is Suggest, a suggestion always asks consent.
    pub must_ask_consent: bool,
}

/// High-level coaching phase, the outer FSM layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationState {
    FreeChat,
    Explore,
    PracticeOffered,
    PracticeActive,
    PracticePaused,
    FollowUp,
    Crisis,
}

impl ConversationState {
    pub const ALL: [ConversationState; 7] = [
        ConversationState::FreeChat,
        ConversationState::Explore,
        ConversationState::PracticeOffered,
        ConversationState::PracticeActive,
        ConversationState::PracticePaused,
        ConversationState::FollowUp,
        ConversationState::Crisis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::FreeChat => "FREE_CHAT",
            ConversationState::Explore => "EXPLORE",
            ConversationState::PracticeOffered => "PRACTICE_OFFERED",
            ConversationState::PracticeActive => "PRACTICE_ACTIVE",
            ConversationState::PracticePaused => "PRACTICE_PAUSED",
            ConversationState::FollowUp => "FOLLOW_UP",
            ConversationState::Crisis => "CRISIS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Inner practice step, defined only while a practice is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PracticeState {
    Consent,
    Baseline,
    Step,
    Checkpoint,
    Adapt,
    WrapUp,
    FollowUp,
}

impl PracticeState {
    pub const ALL: [PracticeState; 7] = [
        PracticeState::Consent,
        PracticeState::Baseline,
        PracticeState::Step,
        PracticeState::Checkpoint,
        PracticeState::Adapt,
        PracticeState::WrapUp,
        PracticeState::FollowUp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PracticeState::Consent => "CONSENT",
            PracticeState::Baseline => "BASELINE",
            PracticeState::Step => "STEP",
            PracticeState::Checkpoint => "CHECKPOINT",
            PracticeState::Adapt => "ADAPT",
            PracticeState::WrapUp => "WRAP_UP",
            PracticeState::FollowUp => "FOLLOW_UP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

/// Soft presentation mode derived from the conversation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoftMode {
    Exploring,
    Teaching,
    Practicing,
    Reflecting,
}

/// Change-readiness stage gating which practices may be offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Precontemplation,
    Contemplation,
    Action,
    Maintenance,
}

impl Readiness {
    /// Map the context builder's continuous readiness score onto stages.
    pub fn from_score(score: f64) -> Self {
        if score < 0.25 {
            Readiness::Precontemplation
        } else if score < 0.5 {
            Readiness::Contemplation
        } else if score < 0.75 {
            Readiness::Action
        } else {
            Readiness::Maintenance
        }
    }
}

/// Dialogue-state tag carried by the generation contract. Keys the
/// state-specific fallback templates and the state-alignment check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogueState {
    SafetyCheck,
    Escalation,
    Intake,
    Formulation,
    GoalSetting,
    ModuleSelect,
    Practice,
    Reflection,
    ReflectionLite,
    Homework,
    SessionEnd,
}

impl DialogueState {
    pub fn as_str(self) -> &'static str {
        match self {
            DialogueState::SafetyCheck => "SAFETY_CHECK",
            DialogueState::Escalation => "ESCALATION",
            DialogueState::Intake => "INTAKE",
            DialogueState::Formulation => "FORMULATION",
            DialogueState::GoalSetting => "GOAL_SETTING",
            DialogueState::ModuleSelect => "MODULE_SELECT",
            DialogueState::Practice => "PRACTICE",
            DialogueState::Reflection => "REFLECTION",
            DialogueState::ReflectionLite => "REFLECTION_LITE",
            DialogueState::Homework => "HOMEWORK",
            DialogueState::SessionEnd => "SESSION_END",
        }
    }

    /// Escalation-class states forbid humor and playful tone outright.
    pub fn is_escalation(self) -> bool {
        matches!(self, DialogueState::SafetyCheck | DialogueState::Escalation)
    }
}

/// One message in the dialogue window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// UI rendering hint carried by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiMode {
    #[default]
    Text,
    Buttons,
    Timer,
    TextInput,
}

impl UiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UiMode::Text => "text",
            UiMode::Buttons => "buttons",
            UiMode::Timer => "timer",
            UiMode::TextInput => "text_input",
        }
    }
}

/// Everything a generated reply must satisfy. Built once per turn by the
/// pipeline and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GenerationContract {
    pub dialogue_state: DialogueState,
    pub generation_task: String,
    pub instruction: String,
    pub persona_summary: String,
    pub user_summary: String,
    pub recent_messages: Vec<ChatMessage>,
    pub max_chars_per_message: usize,
    pub language: String,
    pub must_include: Vec<String>,
    pub must_not: Vec<String>,
    pub ui_mode: UiMode,
    /// A specific user utterance the reply should address, if any.
    pub user_response_to: Option<String>,
}
