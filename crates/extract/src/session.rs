use std::sync::Arc;
use tokio::sync::Mutex;

use crate::llm::{Role, Turn};

/// Conversation shared by every call of one pipeline run.
///
/// Created once per run and never reset. Later prompts see earlier turns,
/// so extraction calls made through it are not statistically independent.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Mutex<Vec<Turn>>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.turns.lock().await.clone()
    }

    pub async fn record(&self, prompt: &str, reply: &str) {
        let mut turns = self.turns.lock().await;
        turns.push(Turn {
            role: Role::User,
            text: prompt.to_string(),
        });
        turns.push(Turn {
            role: Role::Model,
            text: reply.to_string(),
        });
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }
}

/// Whether extraction calls share one conversation or start fresh each time.
#[derive(Debug, Clone)]
pub enum ContextMode {
    Shared(Arc<ChatSession>),
    Independent,
}

impl ContextMode {
    pub fn shared() -> Self {
        Self::Shared(Arc::new(ChatSession::new()))
    }

    pub async fn history(&self) -> Vec<Turn> {
        match self {
            Self::Shared(session) => session.history().await,
            Self::Independent => Vec::new(),
        }
    }

    pub async fn record(&self, prompt: &str, reply: &str) {
        if let Self::Shared(session) = self {
            session.record(prompt, reply).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_context_accumulates_turns() {
        let session = Arc::new(ChatSession::new());
        let mode = ContextMode::Shared(session.clone());

        mode.record("question", "answer").await;
        let history = mode.history().await;

        assert_eq!(session.len().await, 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].text, "answer");
    }

    #[tokio::test]
    async fn test_independent_context_keeps_nothing() {
        let mode = ContextMode::Independent;
        mode.record("question", "answer").await;
        assert!(mode.history().await.is_empty());
    }
}
