//! Command-line (and environment) configuration.

use crate::notify::MessageTemplates;
use crate::oauth::{AuthorizationMode, TokenCache};
use crate::poller::PollSettings;
use crate::state::StateFile;
use clap::Parser;
use clap::builder::BoolishValueParser;
use eyre::Context;
use jiff::SignedDuration;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Announces the lifecycle of your YouTube live broadcasts to a Discord channel.
#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Discord webhook URL to post announcements to.
    #[arg(long, env = "DISCORD_WEBHOOK")]
    pub discord_webhook: String,

    /// Where to keep track of broadcasts between runs.
    #[arg(long, env = "PERSIST_FILE_PATH", default_value = "persist/data.json")]
    pub persist_file_path: PathBuf,

    /// OAuth client secret JSON as downloaded from the Google Cloud console.
    #[arg(long, env = "SECRET_FILE", default_value = "client_secret.json")]
    pub secret_file: PathBuf,

    /// Directory to cache the YouTube OAuth token in.
    #[arg(long, env = "TOKEN_PATH", default_value = "persist/.credentials")]
    pub token_path: PathBuf,

    /// Receive the OAuth redirect on a local web server instead of pasting the code.
    #[arg(long, env = "USE_REDIRECT_SERVER", value_parser = BoolishValueParser::new())]
    pub use_redirect_server: bool,

    /// Redirect URL registered for the OAuth client, which must reach the redirect server.
    #[arg(long, env = "REDIRECT_URL", default_value = "http://localhost:2434")]
    pub redirect_url: String,

    /// Port for the redirect server to listen on.
    #[arg(long, env = "REDIRECT_PORT", default_value_t = 2434)]
    pub redirect_port: u16,

    /// How many of the most recent broadcasts to check each poll.
    #[arg(
        long,
        env = "MAX_RESULTS",
        default_value_t = 5,
        value_parser = clap::value_parser!(u32).range(1..=50),
    )]
    pub max_results: u32,

    /// Poll interval when a broadcast is about to start or is live.
    #[arg(long, default_value = "15s")]
    pub short_poll: SignedDuration,

    /// Poll interval otherwise.
    #[arg(long, default_value = "5m")]
    pub long_poll: SignedDuration,

    /// How long before a scheduled start to switch to the short poll interval.
    #[arg(long, default_value = "5m")]
    pub near_horizon: SignedDuration,

    /// Minimum time between two Discord messages.
    #[arg(long, default_value = "1s")]
    pub notification_spacing: SignedDuration,

    /// Message for newly scheduled broadcasts. Supports {id}, {start}, and {url}.
    #[arg(long, default_value = MessageTemplates::DEFAULT_SCHEDULED)]
    pub scheduled_message: String,

    /// Message for broadcasts going live. Supports {id}, {start}, and {url}.
    #[arg(long, default_value = MessageTemplates::DEFAULT_LIVE)]
    pub live_message: String,

    /// Message for broadcasts that have ended. Supports {id}, {start}, and {url}.
    #[arg(long, default_value = MessageTemplates::DEFAULT_COMPLETE)]
    pub complete_message: String,
}

impl Config {
    pub fn authorization_mode(&self) -> AuthorizationMode {
        if self.use_redirect_server {
            AuthorizationMode::RedirectServer {
                redirect_url: self.redirect_url.clone(),
                listen: SocketAddr::from(([0, 0, 0, 0], self.redirect_port)),
            }
        } else {
            AuthorizationMode::Prompt
        }
    }

    pub fn token_cache(&self) -> TokenCache {
        TokenCache::in_dir(&self.token_path)
    }

    pub fn state_file(&self) -> StateFile {
        StateFile::new(&self.persist_file_path)
    }

    pub fn templates(&self) -> MessageTemplates {
        MessageTemplates {
            scheduled: self.scheduled_message.clone(),
            live: self.live_message.clone(),
            complete: self.complete_message.clone(),
        }
    }

    pub fn poll_settings(&self) -> eyre::Result<PollSettings> {
        Ok(PollSettings {
            max_results: self.max_results,
            short_interval: to_std(self.short_poll).context("--short-poll")?,
            long_interval: to_std(self.long_poll).context("--long-poll")?,
            near_horizon: to_std(self.near_horizon).context("--near-horizon")?,
        })
    }

    pub fn notification_spacing(&self) -> eyre::Result<Duration> {
        to_std(self.notification_spacing).context("--notification-spacing")
    }
}

fn to_std(duration: SignedDuration) -> eyre::Result<Duration> {
    Duration::try_from(duration).with_context(|| format!("{duration:#} is not a valid interval"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        Config::try_parse_from(
            ["youtube-live-notifier", "--discord-webhook", "https://discord.test/hook"]
                .iter()
                .chain(args),
        )
    }

    #[test]
    fn test_command_is_well_formed() {
        Config::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.persist_file_path, PathBuf::from("persist/data.json"));
        assert_eq!(config.secret_file, PathBuf::from("client_secret.json"));
        assert_eq!(
            config.token_cache().path(),
            PathBuf::from("persist/.credentials").join(TokenCache::FILE_NAME)
        );
        assert_eq!(config.authorization_mode(), AuthorizationMode::Prompt);
        assert_eq!(config.poll_settings().unwrap(), PollSettings::default());
        assert_eq!(
            config.notification_spacing().unwrap(),
            Duration::from_secs(1)
        );
        assert_eq!(config.templates(), MessageTemplates::default());
    }

    #[test]
    fn test_redirect_server() {
        let config = parse(&[
            "--use-redirect-server",
            "--redirect-url",
            "https://notifier.example.com/oauth",
            "--redirect-port",
            "8080",
        ])
        .unwrap();
        assert_eq!(
            config.authorization_mode(),
            AuthorizationMode::RedirectServer {
                redirect_url: "https://notifier.example.com/oauth".to_string(),
                listen: "0.0.0.0:8080".parse().unwrap(),
            }
        );
    }

    #[test]
    fn test_durations() {
        let config = parse(&[
            "--short-poll",
            "30s",
            "--long-poll",
            "10m",
            "--near-horizon",
            "1h",
            "--max-results",
            "50",
        ])
        .unwrap();
        assert_eq!(
            config.poll_settings().unwrap(),
            PollSettings {
                max_results: 50,
                short_interval: Duration::from_secs(30),
                long_interval: Duration::from_secs(600),
                near_horizon: Duration::from_secs(3600),
            }
        );
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let config = parse(&["--short-poll=-15s"]).unwrap();
        let err = config.poll_settings().unwrap_err();
        assert_snapshot!(err, @"--short-poll");
    }

    #[test]
    fn test_max_results_is_bounded() {
        assert!(parse(&["--max-results", "0"]).is_err());
        assert!(parse(&["--max-results", "51"]).is_err());
    }

    #[test]
    fn test_custom_templates() {
        let config = parse(&["--live-message", "{url} is live!"]).unwrap();
        assert_eq!(config.templates().live, "{url} is live!");
        assert_eq!(
            config.templates().scheduled,
            MessageTemplates::DEFAULT_SCHEDULED
        );
    }
}
