//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds user input in, and performs the returned effects.

mod effect;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use state::{ConversationState, Selection, Session};
pub use transition::transition;
