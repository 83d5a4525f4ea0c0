//! The poll → announce → persist → sleep loop.

use crate::lifecycle;
use crate::notify::{Dispatcher, NotificationChannel};
use crate::source::{BroadcastSource, ObservedBroadcast};
use crate::state::{KnownStream, PersistedState, StateFile};
use crate::youtube_api::BroadcastLifeCycleStatus;
use eyre::Context;
use std::time::Duration;
use tracing::instrument;

/// How much to fetch and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// How many of the newest broadcasts to look at each poll.
    pub max_results: u32,
    /// Sleep between polls while the next broadcast is near (or live).
    pub short_interval: Duration,
    /// Sleep between polls otherwise.
    pub long_interval: Duration,
    /// How far ahead of a scheduled start polling speeds up.
    pub near_horizon: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            short_interval: Duration::from_secs(15),
            long_interval: Duration::from_secs(5 * 60),
            near_horizon: Duration::from_secs(5 * 60),
        }
    }
}

impl PollSettings {
    /// How long to wait before the next poll, given when the next broadcast starts.
    ///
    /// Both times are epoch seconds.
    pub fn next_sleep(&self, next_time: i64, now: i64) -> Duration {
        let horizon = i64::try_from(self.near_horizon.as_secs()).unwrap_or(i64::MAX);
        if now.saturating_add(horizon) > next_time {
            self.short_interval
        } else {
            self.long_interval
        }
    }
}

/// Current time in epoch seconds.
type Clock = Box<dyn Fn() -> i64>;

fn wall_clock() -> i64 {
    jiff::Timestamp::now().as_second()
}

/// Watches a [`BroadcastSource`] and announces lifecycle changes through a [`Dispatcher`].
pub struct Poller<S, C> {
    source: S,
    dispatcher: Dispatcher<C>,
    store: StateFile,
    state: PersistedState,
    settings: PollSettings,
    clock: Clock,
}

impl<S, C> Poller<S, C>
where
    S: BroadcastSource,
    C: NotificationChannel,
{
    pub fn new(
        source: S,
        dispatcher: Dispatcher<C>,
        store: StateFile,
        state: PersistedState,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            dispatcher,
            store,
            state,
            settings,
            clock: Box::new(wall_clock),
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: impl Fn() -> i64 + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Polls forever. Only returns if announcing or saving fails.
    pub async fn run(mut self) -> eyre::Result<()> {
        loop {
            let sleep = self.cycle().await?;
            tokio::time::sleep(sleep).await;
        }
    }

    /// Runs one poll, saves the resulting state, and says how long to sleep before the next.
    ///
    /// The sleep is measured from when the state has been saved, since announcing can take a
    /// while.
    pub async fn cycle(&mut self) -> eyre::Result<Duration> {
        self.poll_once().await?;

        self.store
            .save(&self.state)
            .await
            .context("persist state")?;

        let now = (self.clock)();
        let next_time = self.state.schedule.next_time();
        let sleep = self.settings.next_sleep(next_time, now);
        tracing::debug!(
            next = ?self.state.schedule.next_id(),
            next_time,
            sleep = ?sleep,
            "poll complete"
        );
        Ok(sleep)
    }

    /// Fetches the current broadcasts and acts on any that changed.
    ///
    /// Failing to fetch is not an error; the poll is just skipped. Failing to announce is.
    #[instrument(skip(self))]
    pub async fn poll_once(&mut self) -> eyre::Result<()> {
        let broadcasts = match self
            .source
            .list_owned_broadcasts(self.settings.max_results)
            .await
        {
            Ok(broadcasts) => broadcasts,
            Err(e) => {
                tracing::error!("failed to fetch broadcasts: {e:#}");
                return Ok(());
            }
        };

        // the source lists newest first, but older broadcasts should be announced first
        for broadcast in broadcasts.into_iter().rev() {
            self.observe(broadcast).await?;
        }
        Ok(())
    }

    async fn observe(&mut self, broadcast: ObservedBroadcast) -> eyre::Result<()> {
        let ObservedBroadcast {
            id,
            start_time,
            status,
        } = broadcast;

        let stream = self.state.streams.entry(id).or_insert_with_key(|id| {
            tracing::debug!(broadcast = %id, "discovered broadcast");
            KnownStream::new(id.clone(), BroadcastLifeCycleStatus::Unknown, start_time)
        });
        stream.start_time = start_time;

        if stream.status != status {
            tracing::info!(
                broadcast = %stream.id,
                from = %stream.status,
                to = %status,
                "broadcast status changed"
            );

            let transition = lifecycle::decide(stream.status, status);
            for category in transition.categories() {
                self.dispatcher
                    .send(category, &stream.id, stream.start_time)
                    .await?;
            }
            stream.status = status;
        }

        self.state.schedule.update(stream);
        Ok(())
    }
}
