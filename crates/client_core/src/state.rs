use std::{sync::Arc, time::Duration};

use shared::domain::Message;
use tokio::sync::Mutex;

use crate::{
    reconciler::VoteReconciler,
    store::MessageStore,
    types::{FeedView, ReconcileReport},
};

pub(crate) type SharedFeed = Arc<Mutex<FeedState>>;

/// Everything the poller and the dispatcher mutate. Held behind one lock that
/// is never kept across a network call.
#[derive(Debug)]
pub(crate) struct FeedState {
    pub store: MessageStore,
    pub reconciler: VoteReconciler,
}

impl FeedState {
    pub fn new(echo_match_window: Duration) -> Self {
        Self {
            store: MessageStore::new(),
            reconciler: VoteReconciler::new(echo_match_window),
        }
    }

    pub fn shared(echo_match_window: Duration) -> SharedFeed {
        Arc::new(Mutex::new(Self::new(echo_match_window)))
    }

    pub fn apply_snapshot(&mut self, snapshot: Vec<Message>) -> ReconcileReport {
        self.reconciler.reconcile(&mut self.store, snapshot)
    }

    pub fn view(&self) -> FeedView {
        self.reconciler.view(&self.store)
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.reconciler.clear();
    }
}
