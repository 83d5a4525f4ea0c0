//! Tracking which known broadcast is next to start.
//!
//! The poll interval depends on how close the next scheduled start is, so the tracker keeps a
//! single pointer to the earliest start among the broadcasts that are ready, testing, or live.
//! It is updated incrementally as each broadcast is observed rather than recomputed from the full
//! set, which is why an earlier-starting broadcast always wins, and why a completed broadcast only
//! clears the pointer if it is the one being pointed at.

use crate::state::KnownStream;
use crate::youtube_api::BroadcastLifeCycleStatus;

/// Stands in for "no next event" wherever a plain timestamp is needed.
pub const NEVER: i64 = i64::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextEvent {
    pub id: String,
    /// Epoch seconds.
    pub time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleTracker {
    next: Option<NextEvent>,
}

impl ScheduleTracker {
    pub fn tracking(id: impl Into<String>, time: i64) -> Self {
        Self {
            next: Some(NextEvent {
                id: id.into(),
                time,
            }),
        }
    }

    pub fn next_id(&self) -> Option<&str> {
        self.next.as_ref().map(|next| next.id.as_str())
    }

    /// When the next event is due, or [`NEVER`].
    pub fn next_time(&self) -> i64 {
        self.next.as_ref().map_or(NEVER, |next| next.time)
    }

    /// Fold one observed broadcast (with its status already updated) into the tracker.
    pub fn update(&mut self, stream: &KnownStream) {
        use BroadcastLifeCycleStatus as S;

        match stream.status {
            S::Unknown | S::Created | S::Revoked => {}
            S::Ready | S::TestStarting | S::Testing | S::LiveStarting | S::Live => {
                if self.next_time() >= stream.start_time {
                    if self.next_id() != Some(stream.id.as_str()) {
                        tracing::debug!(
                            broadcast = %stream.id,
                            start_time = stream.start_time,
                            "tracking as next broadcast"
                        );
                    }
                    self.next = Some(NextEvent {
                        id: stream.id.clone(),
                        time: stream.start_time,
                    });
                }

                // the tracked broadcast may have been rescheduled to later
                if let Some(next) = &mut self.next
                    && next.id == stream.id
                    && next.time != stream.start_time
                {
                    tracing::debug!(
                        broadcast = %stream.id,
                        from = next.time,
                        to = stream.start_time,
                        "next broadcast was rescheduled"
                    );
                    next.time = stream.start_time;
                }
            }
            S::Complete => {
                if self.next_id() == Some(stream.id.as_str()) {
                    tracing::debug!(broadcast = %stream.id, "next broadcast has ended");
                    self.next = None;
                }
            }
        }
    }
}
