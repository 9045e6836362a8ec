use std::collections::HashMap;

use shared::domain::{Message, MessageId, UserVote, VoteTally};
use tracing::warn;

use crate::{
    error::{ClientError, Result},
    types::Delivery,
};

/// Ordered messages keyed by id. Knows nothing about transport or intents.
#[derive(Debug, Default, Clone)]
pub struct MessageStore {
    messages: Vec<Message>,
    index: HashMap<MessageId, usize>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the canonical list. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, snapshot: Vec<Message>) {
        self.messages.clear();
        self.index.clear();
        for message in snapshot {
            if self.index.contains_key(&message.id) {
                warn!(message_id = %message.id, "store: dropping duplicate message id");
                continue;
            }
            self.index.insert(message.id.clone(), self.messages.len());
            self.messages.push(message);
        }
    }

    /// Appends a message ahead of confirmation. Returns false when the id is
    /// already present.
    pub fn append_local(&mut self, message: Message) -> bool {
        if self.index.contains_key(&message.id) {
            return false;
        }
        self.index.insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
        true
    }

    pub fn apply_vote_delta(
        &mut self,
        message_id: &MessageId,
        upvote_delta: i32,
        downvote_delta: i32,
        new_user_vote: UserVote,
    ) -> Result<VoteTally> {
        let message = self.get_mut(message_id)?;
        let tally = VoteTally {
            upvotes: message.upvotes.saturating_add_signed(upvote_delta),
            downvotes: message.downvotes.saturating_add_signed(downvote_delta),
            user_vote: new_user_vote,
        };
        message.set_tally(tally);
        Ok(tally)
    }

    pub fn set_tally(&mut self, message_id: &MessageId, tally: VoteTally) -> Result<()> {
        self.get_mut(message_id)?.set_tally(tally);
        Ok(())
    }

    /// Swaps a local entry for the service's confirmed copy, keeping its
    /// position and any vote applied to it meanwhile.
    pub fn confirm_local(&mut self, local_id: &MessageId, confirmed: Message) -> Result<()> {
        let position = *self
            .index
            .get(local_id)
            .ok_or_else(|| ClientError::UnknownMessage(local_id.clone()))?;
        if self.index.contains_key(&confirmed.id) {
            self.remove(local_id);
            return Ok(());
        }
        self.index.remove(local_id);
        self.index.insert(confirmed.id.clone(), position);
        self.messages[position] = confirmed;
        Ok(())
    }

    pub fn remove(&mut self, message_id: &MessageId) -> Option<Message> {
        let position = self.index.remove(message_id)?;
        let removed = self.messages.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, message_id: &MessageId) -> Option<&Message> {
        self.index.get(message_id).map(|&i| &self.messages[i])
    }

    pub fn tally(&self, message_id: &MessageId) -> Option<VoteTally> {
        self.get(message_id).map(Message::tally)
    }

    pub fn contains(&self, message_id: &MessageId) -> bool {
        self.index.contains_key(message_id)
    }

    pub fn delivery(&self, message_id: &MessageId) -> Option<Delivery> {
        self.get(message_id).map(|message| {
            if message.id.is_local() {
                Delivery::Sending
            } else {
                Delivery::Sent
            }
        })
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

    pub fn clear(&mut self) {
        self.messages.clear();
        self.index.clear();
    }

    fn get_mut(&mut self, message_id: &MessageId) -> Result<&mut Message> {
        let position = *self
            .index
            .get(message_id)
            .ok_or_else(|| ClientError::UnknownMessage(message_id.clone()))?;
        Ok(&mut self.messages[position])
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
