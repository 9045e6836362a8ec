use std::sync::Arc;

use shared::{
    domain::{Message, MessageId, VoteDirection, VoteTally},
    protocol::{PostMessageRequest, VoteRequest},
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    error::{ClientError, Result},
    session::Session,
    state::SharedFeed,
    transport::FeedTransport,
    types::{ClientEvent, IntentStatus},
};

/// Turns user actions into an optimistic local change plus one remote call,
/// then settles the local change from the call's outcome.
#[derive(Clone)]
pub struct ActionDispatcher {
    transport: Arc<dyn FeedTransport>,
    feed: SharedFeed,
    events: broadcast::Sender<ClientEvent>,
    session: Session,
}

impl ActionDispatcher {
    pub(crate) fn new(
        transport: Arc<dyn FeedTransport>,
        feed: SharedFeed,
        events: broadcast::Sender<ClientEvent>,
        session: Session,
    ) -> Self {
        Self {
            transport,
            feed,
            events,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Shows `content` as a sending message right away and submits it.
    /// Blank content is refused before anything is sent or stored.
    pub async fn post_message(&self, content: &str) -> Result<Message> {
        if content.trim().is_empty() {
            return Err(ClientError::EmptyInput);
        }
        self.session.ensure_valid()?;

        let ticket = {
            let mut feed = self.feed.lock().await;
            let state = &mut *feed;
            let ticket =
                state
                    .reconciler
                    .begin_post(&mut state.store, self.session.username(), content)?;
            let _ = self.events.send(ClientEvent::FeedUpdated(state.view()));
            ticket
        };
        debug!(local_id = %ticket.local_id, "post: submitting");

        let request = PostMessageRequest {
            username: self.session.username().to_string(),
            content: ticket.content.clone(),
        };
        let outcome = self.transport.post_message(&self.session, &request).await;
        if let Err(err) = &outcome {
            self.note_auth_failure(err);
        }

        {
            let mut feed = self.feed.lock().await;
            let state = &mut *feed;
            state
                .reconciler
                .resolve_post(&mut state.store, &ticket.local_id, outcome.as_ref());
            let _ = self.events.send(ClientEvent::PostResolved {
                local_id: ticket.local_id.clone(),
                result: outcome.clone(),
            });
            let _ = self.events.send(ClientEvent::FeedUpdated(state.view()));
        }

        match &outcome {
            Ok(message) => info!(message_id = %message.id, "post: confirmed"),
            Err(err) => warn!(local_id = %ticket.local_id, error = %err, "post: failed"),
        }
        outcome
    }

    /// Applies the toggle locally and sends it. Returns the tally the
    /// service accepted; a superseded vote reports [`ClientError::Superseded`]
    /// and a rejected one reports the service's error after the local
    /// revert.
    pub async fn cast_vote(&self, message_id: &MessageId, vote: VoteDirection) -> Result<VoteTally> {
        self.session.ensure_valid()?;

        let ticket = {
            let mut feed = self.feed.lock().await;
            let state = &mut *feed;
            let ticket = state
                .reconciler
                .begin_vote(&mut state.store, message_id, vote)?;
            let _ = self.events.send(ClientEvent::FeedUpdated(state.view()));
            ticket
        };
        debug!(
            message_id = %message_id,
            vote = ?vote,
            previous = ?ticket.previous_vote,
            "vote: submitting"
        );

        let request = VoteRequest {
            vote_type: vote,
            user_vote: ticket.previous_vote,
        };
        let outcome = self
            .transport
            .cast_vote(&self.session, message_id, &request)
            .await;
        if let Err(err) = &outcome {
            self.note_auth_failure(err);
        }

        let resolved = {
            let mut feed = self.feed.lock().await;
            let state = &mut *feed;
            let resolved =
                state
                    .reconciler
                    .resolve_vote(&mut state.store, &ticket, outcome.as_ref().copied());
            let _ = self.events.send(ClientEvent::VoteResolved {
                message_id: message_id.clone(),
                status: resolved.clone(),
            });
            if resolved == Ok(IntentStatus::Failed) {
                let _ = self.events.send(ClientEvent::FeedUpdated(state.view()));
            }
            resolved
        };

        match (resolved?, outcome) {
            (IntentStatus::Failed, Err(err)) => Err(err),
            _ => Ok(ticket.applied),
        }
    }

    fn note_auth_failure(&self, err: &ClientError) {
        if matches!(err, ClientError::Unauthorized(_)) && self.session.is_valid() {
            self.session.invalidate();
            error!(error = %err, "session: rejected by server");
            let _ = self.events.send(ClientEvent::SessionInvalidated);
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
