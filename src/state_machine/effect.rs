//! Effects produced by state transitions

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send a text message back to the user's chat
    Reply { text: String },
}

impl Effect {
    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    /// Text carried by a reply effect
    #[allow(dead_code)] // Used in tests
    pub fn text(&self) -> &str {
        match self {
            Effect::Reply { text } => text,
        }
    }
}
