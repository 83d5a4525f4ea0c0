//! A small YouTube Data API v3 client.
//!
//! Only the `liveBroadcasts.list` endpoint is covered, since all the notifier needs to know is
//! which broadcasts the authenticated channel owns, when they are scheduled to start, and where
//! they are in their lifecycle (ready → testing → live → complete).
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tokio_stream::StreamExt;
//! use youtube_live_notifier::youtube_api::YouTubeClient;
//!
//! # async fn example(client: YouTubeClient) -> eyre::Result<()> {
//! let broadcasts = client.list_my_live_broadcasts(5);
//! let mut broadcasts = std::pin::pin!(broadcasts);
//! while let Some(broadcast) = broadcasts.next().await {
//!     let broadcast = broadcast?;
//!     println!("{} ({})", broadcast.id, broadcast.status.life_cycle_status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod broadcasts;
pub mod client;
pub mod types;

pub use broadcasts::{BroadcastLifeCycleStatus, LiveBroadcast};
pub use client::{TimeBoundAccessToken, YouTubeClient};
pub use types::{PageInfo, PagedStream};
