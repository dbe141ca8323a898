//! Two-level conversation + practice finite-state machine.
//!
//! The outer layer tracks the coaching phase (free chat, practice offered,
//! crisis, ...); the inner layer tracks the step of an active practice and
//! is defined only while the outer layer is PracticeActive. Every
//! operation returns a success flag instead of failing; an illegal request
//! leaves the machine untouched.

use serde::{Deserialize, Serialize};

use crate::types::{CoachingAction, ConversationState, PracticeState, SoftMode};

/// States from which an Explore decision may move the conversation.
const EXPLORE_ALLOWED: [ConversationState; 3] = [
    ConversationState::FreeChat,
    ConversationState::Explore,
    ConversationState::FollowUp,
];

/// States from which a Suggest decision may offer a practice.
const SUGGEST_ALLOWED: [ConversationState; 3] = [
    ConversationState::FreeChat,
    ConversationState::Explore,
    ConversationState::FollowUp,
];

/// Flat serialized form for the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmRecord {
    pub conversation_state: String,
    pub practice_state: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversationFsm {
    conversation_state: ConversationState,
    practice_state: Option<PracticeState>,
}

impl ConversationFsm {
    pub fn new() -> Self {
        Self {
            conversation_state: ConversationState::FreeChat,
            practice_state: None,
        }
    }

    pub fn conversation_state(&self) -> ConversationState {
        self.conversation_state
    }

    pub fn practice_state(&self) -> Option<PracticeState> {
        self.practice_state
    }

    /// Presentation mode implied by the current conversation state.
    pub fn soft_mode(&self) -> SoftMode {
        match self.conversation_state {
            ConversationState::PracticeOffered => SoftMode::Teaching,
            ConversationState::PracticeActive => SoftMode::Practicing,
            ConversationState::FollowUp => SoftMode::Reflecting,
            _ => SoftMode::Exploring,
        }
    }

    /// Apply a coaching decision. Listen/Answer/Guide are passthrough and
    /// always succeed without changing state.
    pub fn transition(&mut self, action: CoachingAction) -> bool {
        match action {
            CoachingAction::Listen | CoachingAction::Answer | CoachingAction::Guide => true,
            CoachingAction::Explore => {
                if EXPLORE_ALLOWED.contains(&self.conversation_state) {
                    self.conversation_state = ConversationState::Explore;
                    true
                } else {
                    false
                }
            }
            CoachingAction::Suggest => {
                if SUGGEST_ALLOWED.contains(&self.conversation_state) {
                    self.conversation_state = ConversationState::PracticeOffered;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// User accepts the offered practice.
    pub fn accept_practice(&mut self) -> bool {
        if self.conversation_state != ConversationState::PracticeOffered {
            return false;
        }
        self.conversation_state = ConversationState::PracticeActive;
        self.practice_state = Some(PracticeState::Consent);
        true
    }

    /// User declines the offered practice.
    pub fn decline_practice(&mut self) -> bool {
        if self.conversation_state != ConversationState::PracticeOffered {
            return false;
        }
        self.conversation_state = ConversationState::FreeChat;
        true
    }

    pub fn pause_practice(&mut self) -> bool {
        if self.conversation_state != ConversationState::PracticeActive {
            return false;
        }
        self.conversation_state = ConversationState::PracticePaused;
        true
    }

    pub fn resume_practice(&mut self) -> bool {
        if self.conversation_state != ConversationState::PracticePaused {
            return false;
        }
        self.conversation_state = ConversationState::PracticeActive;
        true
    }

    /// Completing a practice clears the inner layer and moves to follow-up.
    pub fn complete_practice(&mut self) -> bool {
        if self.conversation_state != ConversationState::PracticeActive {
            return false;
        }
        self.conversation_state = ConversationState::FollowUp;
        self.practice_state = None;
        true
    }

    /// Move to the next inner practice step. Rejected without mutation
    /// when the practice is not active or the name is not in the alphabet.
    pub fn advance_practice_step(&mut self, next_step: &str) -> bool {
        if self.conversation_state != ConversationState::PracticeActive {
            return false;
        }
        match PracticeState::parse(next_step) {
            Some(step) => {
                self.practice_state = Some(step);
                true
            }
            None => false,
        }
    }

    /// Immediate crisis entry, legal from any state.
    pub fn enter_crisis(&mut self) -> bool {
        self.conversation_state = ConversationState::Crisis;
        self.practice_state = None;
        true
    }

    /// Leave crisis back to free chat. Legal only from Crisis.
    pub fn stabilize_from_crisis(&mut self) -> bool {
        if self.conversation_state != ConversationState::Crisis {
            return false;
        }
        self.conversation_state = ConversationState::FreeChat;
        true
    }

    pub fn to_record(&self) -> FsmRecord {
        FsmRecord {
            conversation_state: self.conversation_state.as_str().to_string(),
            practice_state: self.practice_state.map(|s| s.as_str().to_string()),
        }
    }

    /// Restore from a flat record. Unknown state names reject the record.
    pub fn from_record(record: &FsmRecord) -> Option<Self> {
        let conversation_state = ConversationState::parse(&record.conversation_state)?;
        let practice_state = match &record.practice_state {
            Some(raw) => Some(PracticeState::parse(raw)?),
            None => None,
        };
        Some(Self {
            conversation_state,
            practice_state,
        })
    }
}

impl Default for ConversationFsm {
    fn default() -> Self {
        Self::new()
    }
}
