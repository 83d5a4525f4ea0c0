//! Deciding which announcements a broadcast's status change calls for.
//!
//! Each broadcast gets at most three announcements over its lifetime:
//!
//! - **scheduled**: the first time it reaches a status that implies a known upcoming (or
//!   current) start, unless an earlier ready/testing status already used up that window;
//! - **live**: on the first observed entry into the live phase, where `liveStarting` already
//!   counts so that the follow-up move to `live` doesn't announce again;
//! - **complete**: whenever it is observed to become complete. A broadcast that was never
//!   announced gets a late scheduled announcement alongside it.

use crate::notify::Category;
use crate::youtube_api::BroadcastLifeCycleStatus;

/// The announcements to send for one observed status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transition {
    pub post_announce: bool,
    pub post_live: bool,
    pub post_complete: bool,
}

impl Transition {
    const NONE: Self = Self {
        post_announce: false,
        post_live: false,
        post_complete: false,
    };

    /// The flagged categories, in the order they should be sent.
    pub fn categories(self) -> impl Iterator<Item = Category> {
        [
            (self.post_announce, Category::Scheduled),
            (self.post_live, Category::Live),
            (self.post_complete, Category::Complete),
        ]
        .into_iter()
        .filter_map(|(post, category)| post.then_some(category))
    }
}

/// Decide what to announce when a broadcast moves from `old` to `new`.
///
/// Only meaningful for `old != new`; the caller is responsible for storing `new` afterwards.
pub fn decide(old: BroadcastLifeCycleStatus, new: BroadcastLifeCycleStatus) -> Transition {
    use BroadcastLifeCycleStatus as S;

    // ready and the testing states have already had their scheduled announcement
    let announced_before = matches!(old, S::Ready | S::TestStarting | S::Testing);

    match new {
        S::Unknown | S::Created | S::Revoked => Transition::NONE,
        S::Ready => Transition {
            post_announce: true,
            ..Transition::NONE
        },
        S::TestStarting | S::Testing => Transition {
            post_announce: !matches!(old, S::Ready | S::TestStarting),
            ..Transition::NONE
        },
        S::LiveStarting | S::Live => {
            if old == S::LiveStarting {
                Transition::NONE
            } else {
                Transition {
                    post_announce: !announced_before,
                    post_live: true,
                    ..Transition::NONE
                }
            }
        }
        S::Complete => Transition {
            // going live already implied the announcement
            post_announce: !matches!(old, S::Live | S::LiveStarting) && !announced_before,
            post_complete: true,
            ..Transition::NONE
        },
    }
}
