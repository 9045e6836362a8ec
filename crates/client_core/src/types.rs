use chrono::{DateTime, Utc};
use shared::domain::{Message, MessageId, UserVote, VoteDirection, VoteTally};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Pending,
    Confirmed,
    Failed,
}

/// An optimistic vote awaiting the service's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteIntent {
    pub message_id: MessageId,
    pub requested_vote: VoteDirection,
    /// Counters and vote state right before this intent was applied.
    pub previous: VoteTally,
    pub status: IntentStatus,
    pub(crate) seq: u64,
}

/// Handle for resolving one vote; carries what the remote call needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTicket {
    pub message_id: MessageId,
    pub vote: VoteDirection,
    pub previous_vote: UserVote,
    pub applied: VoteTally,
    pub(crate) seq: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PostStatus {
    /// Request in flight, no confirmed copy known.
    Sending,
    /// A snapshot already carries a matching message; request still in flight.
    Echoed(MessageId),
    /// The service confirmed the post; waiting for a snapshot to include it.
    Confirmed(MessageId),
}

#[derive(Debug, Clone)]
pub(crate) struct PendingPost {
    pub local_id: MessageId,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: PostStatus,
}

impl PendingPost {
    pub fn local_message(&self) -> Message {
        Message {
            id: self.local_id.clone(),
            author: self.author.clone(),
            content: self.content.clone(),
            upvotes: 0,
            downvotes: 0,
            user_vote: UserVote::None,
            created_at: Some(self.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostTicket {
    pub local_id: MessageId,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub message: Message,
    pub delivery: Delivery,
    pub pending_vote: bool,
}

pub type FeedView = Vec<FeedEntry>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub adopted: usize,
    pub kept_pending: usize,
    pub confirmed: usize,
    pub reverted: usize,
    pub echoed_posts: usize,
    pub carried_posts: usize,
    pub dropped_intents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Applied(ReconcileReport),
    /// Another fetch was still outstanding.
    Skipped,
    /// The poller stopped while the fetch was in flight; the result was dropped.
    Discarded,
    Failed(ClientError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    FeedUpdated(FeedView),
    PollFailed(ClientError),
    SessionInvalidated,
    VoteResolved {
        message_id: MessageId,
        status: std::result::Result<IntentStatus, ClientError>,
    },
    PostResolved {
        local_id: MessageId,
        result: std::result::Result<Message, ClientError>,
    },
}
