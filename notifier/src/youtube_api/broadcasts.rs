//! YouTube Live Broadcasts API types.
//!
//! Only the parts of the `liveBroadcast` resource the notifier looks at are modelled here: the
//! identifier, the scheduled start time, and the lifecycle status.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Response structure for the `liveBroadcasts.list` API call.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveBroadcastListResponse {
    /// A list of broadcasts that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<LiveBroadcast>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// A `liveBroadcast` resource represents a viewer-facing live streaming event on YouTube.
///
/// Each broadcast corresponds to exactly one YouTube video, so its `id` doubles as the video id
/// used in `https://youtu.be/<id>` links.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#resource>
#[derive(Debug, Serialize, Deserialize)]
pub struct LiveBroadcast {
    /// The ID that YouTube assigns to uniquely identify the broadcast.
    pub id: String,
    /// Contains basic details about the broadcast.
    pub snippet: LiveBroadcastSnippet,
    /// Contains information about the broadcast's status.
    pub status: LiveBroadcastStatus,
}

/// The snippet object contains basic details about the broadcast.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#snippet>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastSnippet {
    /// The date and time that the broadcast is scheduled to start, in ISO 8601 format.
    ///
    /// Kept as the raw string so that a malformed value only affects this one broadcast rather
    /// than failing deserialization of the whole page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<String>,
}

/// The status object contains information about the live broadcast's status.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status>
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveBroadcastStatus {
    /// The broadcast's lifecycle status.
    pub life_cycle_status: BroadcastLifeCycleStatus,
}

/// The broadcast's current lifecycle status.
///
/// Broadcasts may move back and forth between these (e.g., a completed broadcast is never
/// revived, but a testing broadcast may go back to ready), so none of them is treated as
/// terminal.
///
/// The serialized names match the YouTube API and are also what gets written to the state file.
///
/// See: <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts#status.lifeCycleStatus>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BroadcastLifeCycleStatus {
    /// The broadcast has incomplete settings, but is otherwise valid.
    Created,
    /// The broadcast settings are complete and it can be activated.
    Ready,
    /// A transition into testing has been requested.
    TestStarting,
    /// The broadcast is only visible to its owner.
    Testing,
    /// A transition into live has been requested.
    LiveStarting,
    /// The broadcast is live and visible to anyone who has access to the URL.
    Live,
    /// The broadcast has finished.
    Complete,
    /// The broadcast was removed by an admin action.
    Revoked,
    /// No value, or a value this client doesn't know about.
    #[serde(rename = "lifeCycleStatusUnspecified", other)]
    Unknown,
}

impl BroadcastLifeCycleStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 9] = [
        Self::Unknown,
        Self::Created,
        Self::Ready,
        Self::TestStarting,
        Self::Testing,
        Self::LiveStarting,
        Self::Live,
        Self::Complete,
        Self::Revoked,
    ];
}

impl fmt::Display for BroadcastLifeCycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "lifeCycleStatusUnspecified"),
            Self::Created => write!(f, "created"),
            Self::Ready => write!(f, "ready"),
            Self::TestStarting => write!(f, "testStarting"),
            Self::Testing => write!(f, "testing"),
            Self::LiveStarting => write!(f, "liveStarting"),
            Self::Live => write!(f, "live"),
            Self::Complete => write!(f, "complete"),
            Self::Revoked => write!(f, "revoked"),
        }
    }
}
