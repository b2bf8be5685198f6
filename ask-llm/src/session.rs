//! In-memory conversation transcript.
//!
//! A session lives for one process run and is never persisted.

use crate::types::{Role, Turn};

#[derive(Debug, Clone, Default)]
pub struct Session {
    turns: Vec<Turn>,
    system_prompt_delivered: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: text.into(),
        });
    }

    /// Empties the transcript. Takes effect for the next send.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.system_prompt_delivered = false;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Whether a system prompt was already folded into an outgoing message by a
    /// provider that has no native history.
    pub(crate) fn system_prompt_delivered(&self) -> bool {
        self.system_prompt_delivered
    }

    pub(crate) fn mark_system_prompt_delivered(&mut self) {
        self.system_prompt_delivered = true;
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.turns.truncate(len);
    }
}
