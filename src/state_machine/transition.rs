//! Pure state transition function
//!
//! Given a session, the clinic directory and the raw message text, decide the
//! next session and the replies to send. No I/O happens here; the runtime
//! performs the effects and commits the new session.

use super::{ConversationState, Effect, Selection, Session};
use crate::directory::ClinicDirectory;
use crate::replies;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            new_session: session,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Whether the transition left the session untouched and sends nothing
    pub fn is_noop(&self, before: &Session) -> bool {
        self.effects.is_empty() && &self.new_session == before
    }
}

/// Menu choice typed by the user
///
/// Reads an optional sign and the leading base-10 digits, so "1.", "1)" and
/// "2 gracias" all pick an option. Text that does not start with a number,
/// or a number past `i64`, is `None`: every state's invalid-input branch.
fn parse_choice(text: &str) -> Option<i64> {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let sign_len = text.len() - unsigned.len();
    let digits = unsigned.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    text.get(..sign_len + digits)?.parse().ok()
}

/// Pure transition function
///
/// Given the same inputs, it always produces the same outputs.
pub fn transition(session: &Session, directory: &ClinicDirectory, text: &str) -> TransitionResult {
    let text = text.trim();
    if text.is_empty() {
        return TransitionResult::new(session.clone());
    }
    let choice = parse_choice(text);

    match (session.state, choice) {
        // ============================================================
        // Main menu
        // ============================================================
        (ConversationState::MainMenu, Some(1)) => {
            TransitionResult::new(session.with_state(ConversationState::AwaitingAppointmentType))
                .with_effect(Effect::reply(replies::appointment_type_prompt()))
        }

        // Memberships are not offered yet
        (ConversationState::MainMenu, Some(2)) => {
            TransitionResult::new(session.with_state(ConversationState::MainMenu))
                .with_effect(Effect::reply(replies::membership_stub()))
        }

        (ConversationState::MainMenu, _) => main_menu(session, directory),

        // ============================================================
        // Appointment type
        // ============================================================
        (ConversationState::AwaitingAppointmentType, Some(1)) => TransitionResult::new(
            session.with_state(ConversationState::AwaitingProfessionalSelection),
        )
        .with_effect(Effect::reply(replies::professional_list(
            directory.professionals(),
        ))),

        (ConversationState::AwaitingAppointmentType, Some(2)) => TransitionResult::new(
            session.with_state(ConversationState::AwaitingSpecialtySelection),
        )
        .with_effect(Effect::reply(replies::specialty_list(directory.specialties()))),

        (ConversationState::AwaitingAppointmentType, _) => {
            TransitionResult::new(session.clone())
                .with_effect(Effect::reply(replies::invalid_appointment_type()))
                .with_effect(Effect::reply(replies::appointment_type_prompt()))
        }

        // ============================================================
        // List selection
        // ============================================================
        (ConversationState::AwaitingProfessionalSelection, choice) => {
            match choice.and_then(|i| directory.professional(i)) {
                Some(professional) => {
                    select(session, Selection::Professional(professional.clone()))
                }
                None => TransitionResult::new(session.clone())
                    .with_effect(Effect::reply(replies::invalid_list_choice()))
                    .with_effect(Effect::reply(replies::professional_list(
                        directory.professionals(),
                    ))),
            }
        }

        (ConversationState::AwaitingSpecialtySelection, choice) => {
            match choice.and_then(|i| directory.specialty(i)) {
                Some(specialty) => select(session, Selection::Specialty(specialty.clone())),
                None => TransitionResult::new(session.clone())
                    .with_effect(Effect::reply(replies::invalid_list_choice()))
                    .with_effect(Effect::reply(replies::specialty_list(directory.specialties()))),
            }
        }

        // ============================================================
        // Confirmation
        // ============================================================
        (ConversationState::AwaitingConfirmation, choice) => {
            let Some(selection) = &session.data else {
                // Confirmation without a selection cannot be resumed; leave
                // the session alone and point the user at the menu.
                return TransitionResult::new(session.clone())
                    .with_effect(Effect::reply(replies::help()));
            };

            match choice {
                Some(1) => TransitionResult::new(session.with_state(ConversationState::MainMenu))
                    .with_effect(Effect::reply(replies::booking_stub(selection))),
                Some(2) => {
                    let result = main_menu(session, directory);
                    let mut effects = vec![Effect::reply(replies::cancelled())];
                    effects.extend(result.effects);
                    TransitionResult {
                        new_session: result.new_session,
                        effects,
                    }
                }
                _ => TransitionResult::new(session.clone()).with_effect(Effect::reply(
                    replies::confirmation_prompt(&replies::selection_label(selection)),
                )),
            }
        }
    }
}

// Helper functions

fn main_menu(session: &Session, directory: &ClinicDirectory) -> TransitionResult {
    TransitionResult::new(session.with_state(ConversationState::MainMenu))
        .with_effect(Effect::reply(replies::main_menu(directory.clinic_name())))
}

fn select(session: &Session, selection: Selection) -> TransitionResult {
    let prompt = replies::confirmation_prompt(&replies::selection_label(&selection));
    TransitionResult::new(session.awaiting_confirmation(selection)).with_effect(Effect::reply(prompt))
}
