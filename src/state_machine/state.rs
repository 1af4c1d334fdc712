//! Conversation state types

use crate::directory::Professional;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Conversation State
// ============================================================================

/// Position of a user in the menu flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Top-level menu: book an appointment or ask about memberships
    #[default]
    MainMenu,

    /// Choosing between booking by professional or by specialty
    AwaitingAppointmentType,

    /// Numbered professional list was sent
    AwaitingProfessionalSelection,

    /// Numbered specialty list was sent
    AwaitingSpecialtySelection,

    /// Selection echoed back, waiting for yes/no
    AwaitingConfirmation,
}

impl ConversationState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::MainMenu => "main_menu",
            ConversationState::AwaitingAppointmentType => "awaiting_appointment_type",
            ConversationState::AwaitingProfessionalSelection => "awaiting_professional_selection",
            ConversationState::AwaitingSpecialtySelection => "awaiting_specialty_selection",
            ConversationState::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Selection
// ============================================================================

/// What the user picked before confirming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "selection", rename_all = "snake_case")]
pub enum Selection {
    Professional(Professional),
    Specialty(String),
}

// ============================================================================
// Session
// ============================================================================

/// Per-user conversation record
///
/// `data` is populated exactly while `state` is `AwaitingConfirmation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub state: ConversationState,
    #[serde(default)]
    pub data: Option<Selection>,
}

impl Session {
    /// Fresh session at the main menu
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            state: ConversationState::MainMenu,
            data: None,
        }
    }

    /// Same user, different state, selection cleared
    pub fn with_state(&self, state: ConversationState) -> Self {
        Self {
            user_id: self.user_id.clone(),
            state,
            data: None,
        }
    }

    /// Same user, awaiting confirmation of `selection`
    pub fn awaiting_confirmation(&self, selection: Selection) -> Self {
        Self {
            user_id: self.user_id.clone(),
            state: ConversationState::AwaitingConfirmation,
            data: Some(selection),
        }
    }

    /// Whether the selection/state pairing holds
    #[allow(dead_code)] // Used in tests
    pub fn is_consistent(&self) -> bool {
        self.data.is_some() == (self.state == ConversationState::AwaitingConfirmation)
    }
}
