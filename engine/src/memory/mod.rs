//! Conversation memory
//!
//! Keeps each session's history bounded. The policy is FIFO by turn count:
//! when an append pushes the history past `max_turns`, the oldest turns are
//! dropped. The policy depends only on the sequence of appends, so replaying
//! the same appends always yields the same window.

use crate::session::{Session, Turn};
use tracing::debug;

/// Appends turns and supplies the prompt window
#[derive(Debug, Clone, Copy)]
pub struct MemoryManager {
    max_turns: usize,
}

impl MemoryManager {
    /// Create a manager keeping at most `max_turns` turns (minimum 1)
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Append `turn` to the session history, then trim from the oldest end
    ///
    /// Existing turns are never reordered. Returns the number of turns dropped.
    pub fn append(&self, session: &mut Session, turn: Turn) -> usize {
        session.history.push(turn);

        let len = session.history.len();
        if len <= self.max_turns {
            return 0;
        }

        let trim_count = len - self.max_turns;
        session.history.drain(0..trim_count);
        debug!(
            conversation_id = %session.id(),
            dropped = trim_count,
            "trimmed conversation history"
        );
        trim_count
    }

    /// Turns to include in the next prompt, oldest first
    ///
    /// Never longer than `max_turns`.
    pub fn window_for<'a>(&self, session: &'a Session) -> &'a [Turn] {
        let history = session.history();
        let start = history.len().saturating_sub(self.max_turns);
        &history[start..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Modality;

    fn text(n: usize) -> Turn {
        Turn::user(format!("message {}", n), Modality::Text)
    }

    #[test]
    fn test_append_under_cap_keeps_everything() {
        let memory = MemoryManager::new(4);
        let mut session = Session::new("C1");

        for i in 0..4 {
            assert_eq!(memory.append(&mut session, text(i)), 0);
        }
        assert_eq!(session.history().len(), 4);
        assert_eq!(memory.window_for(&session).len(), 4);
    }

    #[test]
    fn test_append_over_cap_drops_oldest() {
        let memory = MemoryManager::new(3);
        let mut session = Session::new("C1");

        for i in 0..5 {
            memory.append(&mut session, text(i));
        }

        let contents: Vec<_> = memory
            .window_for(&session)
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents, ["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_window_for_is_capped_even_for_restored_history() {
        let memory = MemoryManager::new(2);
        let mut session = Session::new("C1");
        session.history = (0..5).map(text).collect();

        let window = memory.window_for(&session);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "message 3");
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        assert_eq!(MemoryManager::new(0).max_turns(), 1);
    }
}
