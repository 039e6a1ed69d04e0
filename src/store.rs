use crate::state::{Message, MessageId};

/// Ordered, append-only chat transcript.
///
/// Mutation needs `&mut self`, so whoever owns the store is its only writer.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append messages to the tail in the order given.
    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Drop the whole transcript ("new chat").
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id() == id)
    }

    /// Most recent assistant reply that offers a copy action.
    pub fn last_copyable(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_copyable())
    }
}
