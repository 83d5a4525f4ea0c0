//! Turning lifecycle announcements into messages and delivering them.

use eyre::Context;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// The kinds of announcement a broadcast can get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The broadcast has been scheduled.
    Scheduled,
    /// The broadcast went live.
    Live,
    /// The broadcast is over.
    Complete,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "scheduled"),
            Self::Live => write!(f, "live"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Somewhere text messages can be posted to.
pub trait NotificationChannel {
    fn post_message(&self, text: &str) -> impl Future<Output = eyre::Result<()>>;
}

impl<C: NotificationChannel> NotificationChannel for &C {
    fn post_message(&self, text: &str) -> impl Future<Output = eyre::Result<()>> {
        (**self).post_message(text)
    }
}

/// Message text for each [`Category`].
///
/// Templates may use these placeholders:
///
/// - `{id}`: the broadcast (video) id
/// - `{start}`: the scheduled start as seconds since the Unix epoch, which is what Discord's
///   `<t:...>` timestamp markup expects
/// - `{url}`: `https://youtu.be/{id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplates {
    pub scheduled: String,
    pub live: String,
    pub complete: String,
}

impl MessageTemplates {
    pub const DEFAULT_SCHEDULED: &'static str =
        "Going live at <t:{start}:f> (in <t:{start}:R>)\n{url}";
    pub const DEFAULT_LIVE: &'static str = "Live now @here";
    pub const DEFAULT_COMPLETE: &'static str = "Stream is over, the VOD will remain as always";

    pub fn render(&self, category: Category, id: &str, start_time: i64) -> String {
        let template = match category {
            Category::Scheduled => &self.scheduled,
            Category::Live => &self.live,
            Category::Complete => &self.complete,
        };
        template
            .replace("{url}", &format!("https://youtu.be/{id}"))
            .replace("{start}", &start_time.to_string())
            .replace("{id}", id)
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            scheduled: Self::DEFAULT_SCHEDULED.to_string(),
            live: Self::DEFAULT_LIVE.to_string(),
            complete: Self::DEFAULT_COMPLETE.to_string(),
        }
    }
}

/// Sends announcements over a [`NotificationChannel`], spacing them out.
///
/// Every send (successful or not) is followed by a pause of `spacing` before control returns to
/// the caller, so that several broadcasts changing in the same cycle don't arrive as a burst.
#[derive(Debug)]
pub struct Dispatcher<C> {
    channel: C,
    templates: MessageTemplates,
    spacing: Duration,
}

impl<C> Dispatcher<C>
where
    C: NotificationChannel,
{
    pub fn new(channel: C, templates: MessageTemplates, spacing: Duration) -> Self {
        Self {
            channel,
            templates,
            spacing,
        }
    }

    pub async fn send(&self, category: Category, id: &str, start_time: i64) -> eyre::Result<()> {
        let message = self.templates.render(category, id, start_time);
        let result = self
            .channel
            .post_message(&message)
            .await
            .with_context(|| format!("post {category} announcement for broadcast {id}"));

        match &result {
            Ok(()) => match category {
                Category::Scheduled => tracing::info!(broadcast = %id, start_time, "broadcast got scheduled"),
                Category::Live => tracing::info!(broadcast = %id, "broadcast is live"),
                Category::Complete => tracing::info!(broadcast = %id, "broadcast has ended"),
            },
            Err(e) => tracing::error!(broadcast = %id, %category, error = %e, "failed to deliver announcement"),
        }

        tokio::time::sleep(self.spacing).await;
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use insta::assert_snapshot;
    use std::sync::{Arc, Mutex};

    /// Records posted messages, optionally refusing to deliver them.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingChannel {
        pub(crate) sent: Arc<Mutex<Vec<String>>>,
        pub(crate) failing: Arc<Mutex<bool>>,
    }

    impl RecordingChannel {
        pub(crate) fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub(crate) fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }

        pub(crate) fn fail(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }
    }

    impl NotificationChannel for RecordingChannel {
        async fn post_message(&self, text: &str) -> eyre::Result<()> {
            if *self.failing.lock().unwrap() {
                eyre::bail!("webhook unavailable");
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_default_templates() {
        let templates = MessageTemplates::default();
        assert_snapshot!(templates.render(Category::Scheduled, "dQw4w9WgXcQ", 1714672800), @r"
        Going live at <t:1714672800:f> (in <t:1714672800:R>)
        https://youtu.be/dQw4w9WgXcQ
        ");
        assert_snapshot!(templates.render(Category::Live, "dQw4w9WgXcQ", 1714672800), @"Live now @here");
        assert_snapshot!(
            templates.render(Category::Complete, "dQw4w9WgXcQ", 1714672800),
            @"Stream is over, the VOD will remain as always"
        );
    }

    #[test]
    fn test_custom_templates() {
        let templates = MessageTemplates {
            scheduled: "{id} starts {start}".to_string(),
            live: "watch {url}".to_string(),
            complete: "{id} done".to_string(),
        };
        assert_eq!(templates.render(Category::Scheduled, "abc", 0), "abc starts 0");
        assert_eq!(
            templates.render(Category::Live, "abc", 0),
            "watch https://youtu.be/abc"
        );
        assert_eq!(templates.render(Category::Complete, "abc", 0), "abc done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_is_spaced_out() {
        let channel = RecordingChannel::default();
        let dispatcher = Dispatcher::new(
            channel.clone(),
            MessageTemplates::default(),
            Duration::from_secs(1),
        );

        let start = tokio::time::Instant::now();
        dispatcher.send(Category::Live, "a", 0).await.unwrap();
        dispatcher.send(Category::Complete, "a", 0).await.unwrap();

        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(
            channel.sent(),
            vec![
                MessageTemplates::DEFAULT_LIVE.to_string(),
                MessageTemplates::DEFAULT_COMPLETE.to_string()
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_is_reported_after_spacing() {
        let channel = RecordingChannel::default();
        channel.fail(true);
        let dispatcher = Dispatcher::new(
            &channel,
            MessageTemplates::default(),
            Duration::from_secs(1),
        );

        let start = tokio::time::Instant::now();
        let err = dispatcher.send(Category::Live, "a", 0).await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_snapshot!(format!("{err:#}"), @"post live announcement for broadcast a: webhook unavailable");
        assert!(channel.sent().is_empty());
    }
}
