//! Conversation types and transcript state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a message within one session transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat turn. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Display text; `\n` renders as a line break
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Content split on newlines, one entry per rendered line
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n')
    }
}

/// Monotonic message ID allocator, owned by a session
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> MessageId {
        self.last += 1;
        MessageId(self.last)
    }
}

/// Append-only, ordered record of a session's messages
#[derive(Debug)]
pub struct Transcript {
    messages: Vec<Message>,
    ids: IdGenerator,
}

impl Transcript {
    /// Start a transcript seeded with the assistant greeting
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self {
            messages: Vec::new(),
            ids: IdGenerator::new(),
        };
        transcript.add_assistant(greeting);
        transcript
    }

    pub fn add_user(&mut self, content: &str) -> &Message {
        self.push(Role::User, content)
    }

    pub fn add_assistant(&mut self, content: &str) -> &Message {
        self.push(Role::Assistant, content)
    }

    fn push(&mut self, role: Role, content: &str) -> &Message {
        let id = self.ids.next_id();
        self.messages.push(Message::new(id, role, content));
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
