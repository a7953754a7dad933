use crate::messages::{Role, Turn};

/// The complete context sent to the language model for one reply.
#[derive(Clone, Debug, Default)]
pub struct LlmContext {
    pub system_prompt: String,
    /// Oldest first. The last entry is the message being answered.
    pub turns: Vec<Turn>,
}

impl LlmContext {
    pub fn new(system_prompt: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            turns,
        }
    }

    /// Text of the most recent user turn, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}
