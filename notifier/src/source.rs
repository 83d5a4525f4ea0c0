//! Where observations of the channel's broadcasts come from.

use crate::youtube_api::{BroadcastLifeCycleStatus, LiveBroadcast, YouTubeClient};
use eyre::Context;
use std::future::Future;
use tokio_stream::StreamExt;

/// One broadcast as seen by a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedBroadcast {
    pub id: String,
    /// Scheduled start in epoch seconds, or 0 if unknown.
    pub start_time: i64,
    pub status: BroadcastLifeCycleStatus,
}

impl From<LiveBroadcast> for ObservedBroadcast {
    fn from(broadcast: LiveBroadcast) -> Self {
        let start_time = parse_start_time(
            &broadcast.id,
            broadcast.snippet.scheduled_start_time.as_deref(),
        );
        Self {
            id: broadcast.id,
            start_time,
            status: broadcast.status.life_cycle_status,
        }
    }
}

/// Something that can list the broadcasts owned by the channel being watched.
pub trait BroadcastSource {
    /// Lists up to `max_results` broadcasts, in the order the source reports them.
    fn list_owned_broadcasts(
        &self,
        max_results: u32,
    ) -> impl Future<Output = eyre::Result<Vec<ObservedBroadcast>>>;
}

impl BroadcastSource for YouTubeClient {
    async fn list_owned_broadcasts(&self, max_results: u32) -> eyre::Result<Vec<ObservedBroadcast>> {
        let broadcasts = self
            .list_my_live_broadcasts(max_results)
            .take(max_results as usize);
        let mut broadcasts = std::pin::pin!(broadcasts);

        let mut observed = Vec::new();
        while let Some(broadcast) = broadcasts.next().await {
            let broadcast = broadcast.context("fetch live broadcast")?;
            observed.push(ObservedBroadcast::from(broadcast));
        }
        Ok(observed)
    }
}

/// Parses an RFC 3339 scheduled start into epoch seconds, treating anything unusable as 0.
pub fn parse_start_time(id: &str, raw: Option<&str>) -> i64 {
    let Some(raw) = raw else {
        return 0;
    };
    match raw.parse::<jiff::Timestamp>() {
        Ok(ts) => ts.as_second(),
        Err(e) => {
            tracing::warn!(
                broadcast = %id,
                scheduled_start_time = raw,
                error = %e,
                "unparseable scheduled start time"
            );
            0
        }
    }
}
