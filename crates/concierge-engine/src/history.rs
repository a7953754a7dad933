use std::collections::VecDeque;

use concierge_core::messages::Turn;

/// Bounded conversation window. The oldest turn is evicted once
/// `window` turns are held.
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    window: usize,
    turns: VecDeque<Turn>,
}

impl ConversationHistory {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            turns: VecDeque::with_capacity(window),
        }
    }

    pub fn push(&mut self, turn: Turn) {
        while self.turns.len() >= self.window {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
