use std::sync::{Arc, Mutex, PoisonError};

use shared::domain::{Message, MessageId, VoteDirection, VoteTally};
use tokio::sync::broadcast;
use tracing::info;

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod reconciler;
pub mod session;
mod state;
pub mod store;
pub mod transport;
pub mod types;

pub use auth::AccountClient;
pub use config::ClientConfig;
pub use dispatcher::ActionDispatcher;
pub use error::{ClientError, Result};
pub use poller::Poller;
pub use reconciler::{toggle_vote, vote_delta, VoteReconciler};
pub use session::Session;
pub use store::MessageStore;
pub use transport::{FeedTransport, HttpFeedTransport};
pub use types::{
    ClientEvent, Delivery, FeedEntry, FeedView, IntentStatus, PollerState, ReconcileReport,
    TickOutcome,
};

use state::{FeedState, SharedFeed};

const EVENT_CAPACITY: usize = 1024;

/// One logged-in feed client: a poller keeping the local copy fresh and a
/// dispatcher for the user's own actions, both feeding one event stream.
pub struct FeedClient {
    config: ClientConfig,
    transport: Arc<dyn FeedTransport>,
    feed: SharedFeed,
    events: broadcast::Sender<ClientEvent>,
    poller: Poller,
    active: Mutex<Option<ActionDispatcher>>,
}

impl FeedClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpFeedTransport::new(&config)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn FeedTransport>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let feed = FeedState::shared(config.echo_match_window);
        let poller = Poller::new(
            transport.clone(),
            feed.clone(),
            events.clone(),
            config.poll_interval,
        );
        Self {
            config,
            transport,
            feed,
            events,
            poller,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replaces any current session with `session` and starts polling.
    pub async fn start_session(&self, session: Session) -> Result<()> {
        session.ensure_valid()?;
        self.end_session().await;

        self.poller.start(session.clone())?;
        info!(username = session.username(), "session: started");
        *self.lock_active() = Some(ActionDispatcher::new(
            self.transport.clone(),
            self.feed.clone(),
            self.events.clone(),
            session,
        ));
        Ok(())
    }

    /// Stops polling, invalidates the session and forgets all local state.
    pub async fn end_session(&self) {
        let previous = self.lock_active().take();
        if let Some(dispatcher) = &previous {
            dispatcher.session().invalidate();
        }
        self.poller.stop();
        self.feed.lock().await.clear();
        if let Some(dispatcher) = previous {
            info!(username = dispatcher.session().username(), "session: ended");
            let _ = self.events.send(ClientEvent::FeedUpdated(Vec::new()));
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.lock_active()
            .as_ref()
            .map(|dispatcher| dispatcher.session().clone())
    }

    /// Runs one poll tick now instead of waiting for the timer.
    pub async fn refresh(&self) -> Result<TickOutcome> {
        let session = self.session().ok_or(ClientError::NotAuthenticated)?;
        Ok(self.poller.poll_once(&session).await)
    }

    pub async fn post_message(&self, content: &str) -> Result<Message> {
        self.dispatcher()?.post_message(content).await
    }

    pub async fn cast_vote(
        &self,
        message_id: &MessageId,
        vote: VoteDirection,
    ) -> Result<VoteTally> {
        self.dispatcher()?.cast_vote(message_id, vote).await
    }

    pub async fn view(&self) -> FeedView {
        self.feed.lock().await.view()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    fn dispatcher(&self) -> Result<ActionDispatcher> {
        self.lock_active()
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActionDispatcher>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
