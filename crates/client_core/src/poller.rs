use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    session::Session,
    state::SharedFeed,
    transport::FeedTransport,
    types::{ClientEvent, PollerState, TickOutcome},
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fetches snapshots on a fixed period while a session is active.
///
/// At most one fetch is outstanding at any time; a tick that comes due while
/// one is still running is dropped rather than queued.
pub struct Poller {
    worker: PollWorker,
    interval: Duration,
    running: Mutex<Option<RunningPoll>>,
}

struct RunningPoll {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
struct PollWorker {
    transport: Arc<dyn FeedTransport>,
    feed: SharedFeed,
    events: broadcast::Sender<ClientEvent>,
    in_flight: Arc<AtomicBool>,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn try_begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Poller {
    pub(crate) fn new(
        transport: Arc<dyn FeedTransport>,
        feed: SharedFeed,
        events: broadcast::Sender<ClientEvent>,
        interval: Duration,
    ) -> Self {
        Self {
            worker: PollWorker {
                transport,
                feed,
                events,
                in_flight: Arc::new(AtomicBool::new(false)),
            },
            interval: interval.max(MIN_POLL_INTERVAL),
            running: Mutex::new(None),
        }
    }

    /// Fetches right away, then once per interval until [`Poller::stop`] or
    /// until the service rejects the session.
    pub fn start(&self, session: Session) -> Result<()> {
        session.ensure_valid()?;
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = running.take() {
            let _ = previous.stop_tx.send(true);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        info!(
            username = session.username(),
            interval_ms = self.interval.as_millis() as u64,
            "poller: started"
        );
        let task = tokio::spawn(run_loop(
            self.worker.clone(),
            session,
            self.interval,
            stop_rx,
        ));
        *running = Some(RunningPoll { stop_tx, task });
        Ok(())
    }

    /// Cancels future ticks. A fetch already in flight finishes on its own
    /// and its result is dropped.
    pub fn stop(&self) {
        let previous = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            let _ = previous.stop_tx.send(true);
            info!("poller: stopped");
        }
    }

    pub fn state(&self) -> PollerState {
        match &*self.running.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(running) if !running.task.is_finished() => PollerState::Running,
            _ => PollerState::Stopped,
        }
    }

    /// Runs one fetch outside the timer, under the same overlap guard.
    pub async fn poll_once(&self, session: &Session) -> TickOutcome {
        self.worker.tick(session, None).await
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_loop(
    worker: PollWorker,
    session: Session,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        match worker.tick(&session, Some(&stop_rx)).await {
            TickOutcome::Failed(err) if err.requires_reauth() => break,
            TickOutcome::Discarded => break,
            _ => {}
        }
        // Periods that elapsed during a slow fetch are dropped, not replayed.
        ticker.reset();
    }
    debug!("poller: loop exited");
}

impl PollWorker {
    async fn tick(&self, session: &Session, stop: Option<&watch::Receiver<bool>>) -> TickOutcome {
        if let Err(err) = session.ensure_valid() {
            return TickOutcome::Failed(err);
        }
        let Some(_guard) = InFlight::try_begin(&self.in_flight) else {
            debug!("poller: fetch still outstanding, skipping tick");
            return TickOutcome::Skipped;
        };

        let fetched = self.transport.fetch_messages(session).await;

        if cancelled(session, stop) {
            debug!("poller: stopped while fetching, discarding result");
            return TickOutcome::Discarded;
        }

        match fetched {
            Ok(snapshot) => {
                let (report, view) = {
                    let mut feed = self.feed.lock().await;
                    // Teardown may have cleared the feed while we waited.
                    if cancelled(session, stop) {
                        debug!("poller: session ended before apply, discarding result");
                        return TickOutcome::Discarded;
                    }
                    let report = feed.apply_snapshot(snapshot);
                    (report, feed.view())
                };
                debug!(
                    adopted = report.adopted,
                    kept_pending = report.kept_pending,
                    confirmed = report.confirmed,
                    reverted = report.reverted,
                    carried_posts = report.carried_posts,
                    "poller: applied snapshot"
                );
                let _ = self.events.send(ClientEvent::FeedUpdated(view));
                TickOutcome::Applied(report)
            }
            Err(err) if err.requires_reauth() => {
                session.invalidate();
                error!(error = %err, "poller: session rejected by server, stopping");
                let _ = self.events.send(ClientEvent::SessionInvalidated);
                TickOutcome::Failed(err)
            }
            Err(err) => {
                warn!(error = %err, "poller: fetch failed, keeping previous feed");
                let _ = self.events.send(ClientEvent::PollFailed(err.clone()));
                TickOutcome::Failed(err)
            }
        }
    }
}

fn cancelled(session: &Session, stop: Option<&watch::Receiver<bool>>) -> bool {
    stop.is_some_and(|rx| *rx.borrow()) || !session.is_valid()
}

#[cfg(test)]
#[path = "tests/poller_tests.rs"]
mod tests;
