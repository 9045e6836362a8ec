use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use chrono::Utc;
use shared::domain::{Message, MessageId, UserVote, VoteDirection, VoteTally};
use tracing::{debug, warn};

use crate::{
    error::{ClientError, Result},
    store::MessageStore,
    types::{
        Delivery, FeedEntry, FeedView, IntentStatus, PendingPost, PostStatus, PostTicket,
        ReconcileReport, VoteIntent, VoteTicket,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteDelta {
    pub upvotes: i32,
    pub downvotes: i32,
    pub user_vote: UserVote,
}

/// Counter changes for clicking `vote` while holding `current`.
///
/// Clicking the active vote clears it; clicking the other one moves the
/// user's contribution across; clicking with no vote adds one.
pub fn vote_delta(current: UserVote, vote: VoteDirection) -> VoteDelta {
    let mut delta = VoteDelta {
        upvotes: 0,
        downvotes: 0,
        user_vote: UserVote::from(vote),
    };
    if let Some(active) = current.direction() {
        delta.adjust(active, -1);
        if active == vote {
            delta.user_vote = UserVote::None;
            return delta;
        }
    }
    delta.adjust(vote, 1);
    delta
}

impl VoteDelta {
    fn adjust(&mut self, direction: VoteDirection, by: i32) {
        match direction {
            VoteDirection::Upvote => self.upvotes += by,
            VoteDirection::Downvote => self.downvotes += by,
        }
    }
}

pub fn toggle_vote(tally: VoteTally, vote: VoteDirection) -> VoteTally {
    let delta = vote_delta(tally.user_vote, vote);
    VoteTally {
        upvotes: tally.upvotes.saturating_add_signed(delta.upvotes),
        downvotes: tally.downvotes.saturating_add_signed(delta.downvotes),
        user_vote: delta.user_vote,
    }
}

/// Tracks optimistic votes and posts, and merges them with each snapshot.
#[derive(Debug)]
pub struct VoteReconciler {
    intents: HashMap<MessageId, VoteIntent>,
    posts: Vec<PendingPost>,
    next_seq: u64,
    echo_match_window: chrono::Duration,
}

impl VoteReconciler {
    pub fn new(echo_match_window: Duration) -> Self {
        Self {
            intents: HashMap::new(),
            posts: Vec::new(),
            next_seq: 0,
            echo_match_window: chrono::Duration::from_std(echo_match_window)
                .unwrap_or_else(|_| chrono::Duration::days(365)),
        }
    }

    pub fn intent(&self, message_id: &MessageId) -> Option<&VoteIntent> {
        self.intents.get(message_id)
    }

    pub fn has_pending_vote(&self, message_id: &MessageId) -> bool {
        self.intents
            .get(message_id)
            .is_some_and(|intent| intent.status == IntentStatus::Pending)
    }

    pub fn pending_post_count(&self) -> usize {
        self.posts.len()
    }

    /// Applies a vote click to the store and records it as pending. Any
    /// unresolved intent on the same message is superseded.
    pub fn begin_vote(
        &mut self,
        store: &mut MessageStore,
        message_id: &MessageId,
        vote: VoteDirection,
    ) -> Result<VoteTicket> {
        if message_id.is_local() {
            return Err(ClientError::UnknownMessage(message_id.clone()));
        }
        let current = store
            .tally(message_id)
            .ok_or_else(|| ClientError::UnknownMessage(message_id.clone()))?;

        let delta = vote_delta(current.user_vote, vote);
        let applied =
            store.apply_vote_delta(message_id, delta.upvotes, delta.downvotes, delta.user_vote)?;

        self.next_seq += 1;
        let seq = self.next_seq;
        let replaced = self.intents.insert(
            message_id.clone(),
            VoteIntent {
                message_id: message_id.clone(),
                requested_vote: vote,
                previous: current,
                status: IntentStatus::Pending,
                seq,
            },
        );
        if let Some(old) = replaced.filter(|old| old.status == IntentStatus::Pending) {
            debug!(
                message_id = %message_id,
                superseded_seq = old.seq,
                seq,
                "vote: superseding unresolved intent"
            );
        }

        Ok(VoteTicket {
            message_id: message_id.clone(),
            vote,
            previous_vote: current.user_vote,
            applied,
            seq,
        })
    }

    /// Records the service's answer for `ticket`. A failure puts the
    /// pre-vote tally back right away; the intent itself stays until the
    /// next snapshot.
    pub fn resolve_vote(
        &mut self,
        store: &mut MessageStore,
        ticket: &VoteTicket,
        outcome: std::result::Result<(), &ClientError>,
    ) -> Result<IntentStatus> {
        let intent = self
            .intents
            .get_mut(&ticket.message_id)
            .filter(|intent| intent.seq == ticket.seq)
            .ok_or_else(|| ClientError::Superseded(ticket.message_id.clone()))?;

        match outcome {
            Ok(()) => {
                intent.status = IntentStatus::Confirmed;
            }
            Err(err) => {
                intent.status = IntentStatus::Failed;
                warn!(message_id = %ticket.message_id, error = %err, "vote: reverting failed vote");
                store.set_tally(&ticket.message_id, intent.previous)?;
            }
        }
        Ok(intent.status)
    }

    pub fn begin_post(
        &mut self,
        store: &mut MessageStore,
        author: &str,
        content: &str,
    ) -> Result<PostTicket> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyInput);
        }

        let post = PendingPost {
            local_id: MessageId::local(),
            author: author.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            status: PostStatus::Sending,
        };
        store.append_local(post.local_message());
        let ticket = PostTicket {
            local_id: post.local_id.clone(),
            content: post.content.clone(),
        };
        self.posts.push(post);
        Ok(ticket)
    }

    /// Settles a post. A rejected post is removed from the store.
    pub fn resolve_post(
        &mut self,
        store: &mut MessageStore,
        local_id: &MessageId,
        outcome: std::result::Result<&Message, &ClientError>,
    ) {
        let Some(position) = self.posts.iter().position(|p| &p.local_id == local_id) else {
            return;
        };

        match outcome {
            Ok(confirmed) => {
                let echoed = matches!(self.posts[position].status, PostStatus::Echoed(_));
                if store.contains(&confirmed.id) {
                    store.remove(local_id);
                    self.posts.remove(position);
                } else if store.contains(local_id) {
                    // confirm_local cannot fail here: the local entry exists.
                    let _ = store.confirm_local(local_id, confirmed.clone());
                    self.posts[position].status = PostStatus::Confirmed(confirmed.id.clone());
                } else {
                    if echoed {
                        debug!(
                            message_id = %confirmed.id,
                            "post: echo matched a different message; appending confirmed copy"
                        );
                    }
                    store.append_local(confirmed.clone());
                    self.posts[position].status = PostStatus::Confirmed(confirmed.id.clone());
                }
            }
            Err(err) => {
                warn!(local_id = %local_id, error = %err, "post: removing failed message");
                store.remove(local_id);
                self.posts.remove(position);
            }
        }
    }

    /// Merges a freshly fetched snapshot with outstanding local state and
    /// installs the result in the store.
    pub fn reconcile(&mut self, store: &mut MessageStore, snapshot: Vec<Message>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let tracked: HashSet<MessageId> = self
            .posts
            .iter()
            .flat_map(|post| {
                let confirmed = match &post.status {
                    PostStatus::Sending => None,
                    PostStatus::Echoed(id) | PostStatus::Confirmed(id) => Some(id.clone()),
                };
                std::iter::once(post.local_id.clone()).chain(confirmed)
            })
            .collect();
        let known_before: HashSet<MessageId> = store
            .messages()
            .iter()
            .map(|message| message.id.clone())
            .filter(|id| !tracked.contains(id))
            .collect();

        let mut merged = Vec::with_capacity(snapshot.len() + self.posts.len());
        let mut snapshot_ids = HashSet::with_capacity(snapshot.len());
        for mut message in snapshot {
            if !snapshot_ids.insert(message.id.clone()) {
                continue;
            }
            match self.intents.get(&message.id).map(|intent| intent.status) {
                Some(IntentStatus::Pending) => {
                    if let Some(local) = store.tally(&message.id) {
                        message.set_tally(local);
                    }
                    report.kept_pending += 1;
                }
                Some(IntentStatus::Confirmed) => {
                    self.intents.remove(&message.id);
                    report.confirmed += 1;
                }
                Some(IntentStatus::Failed) => {
                    if let Some(intent) = self.intents.remove(&message.id) {
                        message.set_tally(intent.previous);
                    }
                    report.reverted += 1;
                }
                None => report.adopted += 1,
            }
            merged.push(message);
        }

        let mut claimed: HashSet<MessageId> = self
            .posts
            .iter()
            .filter_map(|post| match &post.status {
                PostStatus::Echoed(id) | PostStatus::Confirmed(id) => Some(id.clone()),
                PostStatus::Sending => None,
            })
            .collect();
        let mut carried = Vec::new();
        for mut post in std::mem::take(&mut self.posts) {
            match post.status.clone() {
                PostStatus::Sending => {
                    let echo = merged.iter().find(|message| {
                        !known_before.contains(&message.id)
                            && !claimed.contains(&message.id)
                            && self.is_echo(&post, message)
                    });
                    if let Some(echo) = echo {
                        claimed.insert(echo.id.clone());
                        post.status = PostStatus::Echoed(echo.id.clone());
                        report.echoed_posts += 1;
                    } else {
                        carried.push(post.local_message());
                    }
                    self.posts.push(post);
                }
                PostStatus::Echoed(id) => {
                    if !snapshot_ids.contains(&id) {
                        post.status = PostStatus::Sending;
                        carried.push(post.local_message());
                    }
                    self.posts.push(post);
                }
                PostStatus::Confirmed(id) => {
                    if snapshot_ids.contains(&id) {
                        continue;
                    }
                    let copy = store.get(&id).cloned().unwrap_or_else(|| Message {
                        id: id.clone(),
                        ..post.local_message()
                    });
                    carried.push(copy);
                    self.posts.push(post);
                }
            }
        }

        report.carried_posts = carried.len();
        merged.extend(carried);
        store.replace_all(merged);

        let before = self.intents.len();
        self.intents.retain(|id, _| store.contains(id));
        report.dropped_intents = before - self.intents.len();

        report
    }

    pub fn view(&self, store: &MessageStore) -> FeedView {
        store
            .messages()
            .iter()
            .map(|message| FeedEntry {
                message: message.clone(),
                delivery: store.delivery(&message.id).unwrap_or(Delivery::Sent),
                pending_vote: self.has_pending_vote(&message.id),
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.intents.clear();
        self.posts.clear();
    }

    fn is_echo(&self, post: &PendingPost, message: &Message) -> bool {
        if message.author != post.author || message.content != post.content {
            return false;
        }
        match message.created_at {
            Some(at) => {
                let gap = if at >= post.created_at {
                    at - post.created_at
                } else {
                    post.created_at - at
                };
                gap <= self.echo_match_window
            }
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
