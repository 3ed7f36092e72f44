//! Bounded question/answer memory for interactive sessions.

use std::collections::VecDeque;

use crate::api::ask::truncate_to_char_boundary;
use crate::llm::prompt::sanitize_for_prompt;
use crate::models::ChatMessage;

/// Exchanges kept; each becomes one user and one assistant message.
pub const MAX_HISTORY_TURNS: usize = 5;
const MAX_HISTORY_MESSAGE_LEN: usize = 4000;

/// The most recent exchanges of a session, oldest first.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: VecDeque<(String, String)>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember an exchange, forgetting the oldest past `MAX_HISTORY_TURNS`.
    pub fn push(&mut self, question: &str, answer: &str) {
        self.turns.push_back((
            truncate_to_char_boundary(question.trim(), MAX_HISTORY_MESSAGE_LEN),
            truncate_to_char_boundary(answer.trim(), MAX_HISTORY_MESSAGE_LEN),
        ));
        while self.turns.len() > MAX_HISTORY_TURNS {
            self.turns.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Earlier exchanges as alternating user/assistant messages.
    pub fn messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.turns.len() * 2);
        for (question, answer) in &self.turns {
            messages.push(ChatMessage {
                role: "user".to_string(),
                content: sanitize_for_prompt(question),
            });
            messages.push(ChatMessage {
                role: "assistant".to_string(),
                content: sanitize_for_prompt(answer),
            });
        }
        messages
    }

    /// Query text for retrieval. A follow-up is searched together with the
    /// previous question so "and the stage after that?" keeps its subject.
    pub fn retrieval_query(&self, question: &str) -> String {
        match self.turns.back() {
            Some((previous, _)) => format!("{previous}\n{question}"),
            None => question.to_string(),
        }
    }
}
