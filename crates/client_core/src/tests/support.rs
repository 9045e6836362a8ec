//! Scripted in-memory stand-in for the feed service.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Message, MessageId, UserVote},
    protocol::{PostMessageRequest, VoteRequest},
};
use tokio::sync::oneshot;

use crate::{
    error::{ClientError, Result},
    session::Session,
    transport::FeedTransport,
};

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    snapshot: Mutex<Vec<Message>>,
    fetch_errors: Mutex<VecDeque<ClientError>>,
    fetch_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    post_errors: Mutex<VecDeque<ClientError>>,
    post_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    vote_errors: Mutex<VecDeque<ClientError>>,
    vote_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    pub votes: Mutex<Vec<(MessageId, VoteRequest)>>,
    pub posts: Mutex<Vec<PostMessageRequest>>,
    fetch_calls: AtomicUsize,
    vote_calls: AtomicUsize,
    post_calls: AtomicUsize,
}

impl ScriptedTransport {
    pub fn with_snapshot(messages: Vec<Message>) -> Arc<Self> {
        let transport = Self::default();
        *transport.snapshot.lock().unwrap() = messages;
        Arc::new(transport)
    }

    pub fn set_snapshot(&self, messages: Vec<Message>) {
        *self.snapshot.lock().unwrap() = messages;
    }

    pub fn fail_next_fetch(&self, err: ClientError) {
        self.fetch_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_next_post(&self, err: ClientError) {
        self.post_errors.lock().unwrap().push_back(err);
    }

    pub fn fail_next_vote(&self, err: ClientError) {
        self.vote_errors.lock().unwrap().push_back(err);
    }

    /// The next fetch blocks until the returned sender fires (or is dropped).
    pub fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.fetch_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn gate_next_post(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.post_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn gate_next_vote(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.vote_gates.lock().unwrap().push_back(rx);
        tx
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn vote_calls(&self) -> usize {
        self.vote_calls.load(Ordering::SeqCst)
    }

    pub fn post_calls(&self) -> usize {
        self.post_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn fetch_messages(&self, _session: &Session) -> Result<Vec<Message>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = self.fetch_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(self.snapshot.lock().unwrap().clone())
    }

    async fn post_message(
        &self,
        _session: &Session,
        request: &PostMessageRequest,
    ) -> Result<Message> {
        let n = self.post_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.posts.lock().unwrap().push(request.clone());
        let gate = self.post_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = self.post_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(Message {
            id: MessageId::new(format!("srv-{n}")),
            author: request.username.clone(),
            content: request.content.clone(),
            upvotes: 0,
            downvotes: 0,
            user_vote: UserVote::None,
            created_at: None,
        })
    }

    async fn cast_vote(
        &self,
        _session: &Session,
        message_id: &MessageId,
        request: &VoteRequest,
    ) -> Result<()> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        self.votes
            .lock()
            .unwrap()
            .push((message_id.clone(), *request));
        let gate = self.vote_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(err) = self.vote_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

pub(crate) fn message(id: &str, upvotes: u32, downvotes: u32, user_vote: UserVote) -> Message {
    Message {
        id: MessageId::from(id),
        author: "bob".into(),
        content: format!("message {id}"),
        upvotes,
        downvotes,
        user_vote,
        created_at: None,
    }
}

pub(crate) fn session() -> Session {
    Session::new("token-1", "alice").expect("session")
}

/// Yields until `condition` holds; panics after a generous number of rounds.
pub(crate) async fn settle(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub(crate) const SHORT: Duration = Duration::from_millis(1);
