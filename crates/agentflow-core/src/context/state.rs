use crate::llm::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who wrote a turn in the shared conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Author {
    User,
    Agent(String),
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User => f.write_str("user"),
            Author::Agent(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub author: Author,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            content: content.into(),
        }
    }

    pub fn agent(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: Author::Agent(id.into()),
            content: content.into(),
        }
    }

    /// Agent turns are replayed to the model as named user turns, so every
    /// agent reads the others' work as input rather than as its own replies.
    pub fn to_message(&self) -> Message {
        match &self.author {
            Author::User => Message::user(&self.content),
            Author::Agent(id) => Message::named_user(id, &self.content),
        }
    }
}

/// Where control goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    Router,
    Agent(String),
    Terminal,
}

/// Conversation state owned by a single run. Turns are append-only.
#[derive(Debug, Clone)]
pub struct SharedState {
    messages: Vec<Turn>,
    next: Next,
}

impl SharedState {
    /// State seeded with `request` as the only turn, control at the router.
    pub fn new(request: impl Into<String>) -> Self {
        Self::with_history(Vec::new(), request)
    }

    /// State continuing an earlier session's turns.
    pub fn with_history(history: Vec<Turn>, request: impl Into<String>) -> Self {
        let mut messages = history;
        messages.push(Turn::user(request));
        Self {
            messages,
            next: Next::Router,
        }
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.messages.last()
    }

    pub fn next(&self) -> &Next {
        &self.next
    }

    pub fn is_terminal(&self) -> bool {
        self.next == Next::Terminal
    }

    pub fn append(&mut self, turn: Turn) {
        self.messages.push(turn);
    }

    pub(crate) fn set_next(&mut self, next: Next) {
        if self.next != Next::Terminal {
            self.next = next;
        }
    }

    pub fn into_messages(self) -> Vec<Turn> {
        self.messages
    }
}
