// Conversation module
// Display-only history of a chat session; the engine never reads it


use crate::engine::{Answer, GenerationError};
use crate::index::ScoredPassage;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answered {
        text: String,
        /// Passages the answer was grounded on, in retrieval order
        sources: Vec<ScoredPassage>,
    },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub question: String,
    pub reply: Reply,
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one question
    #[inline]
    pub fn push(&mut self, question: &str, outcome: &Result<Answer, GenerationError>) -> &Turn {
        let reply = match outcome {
            Ok(answer) => Reply::Answered {
                text: answer.text.clone(),
                sources: answer.sources.clone(),
            },
            Err(error) => Reply::Failed(error.to_string()),
        };
        self.turns.push(Turn {
            question: question.to_string(),
            reply,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// Sources of the most recent answered turn
    #[inline]
    pub fn last_sources(&self) -> Option<&[ScoredPassage]> {
        self.turns.iter().rev().find_map(|turn| match &turn.reply {
            Reply::Answered { sources, .. } => Some(sources.as_slice()),
            Reply::Failed(_) => None,
        })
    }

    #[inline]
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
