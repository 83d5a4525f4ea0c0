use clap::Parser;
use eyre::Context;
use std::io::IsTerminal;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use youtube_live_notifier::config::Config;
use youtube_live_notifier::discord::DiscordWebhook;
use youtube_live_notifier::notify::Dispatcher;
use youtube_live_notifier::oauth::{ApplicationSecret, OAuthManager};
use youtube_live_notifier::poller::Poller;
use youtube_live_notifier::setup_youtube_client;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    let config = Config::parse();
    let settings = config.poll_settings()?;
    let spacing = config.notification_spacing()?;

    let secret = ApplicationSecret::from_file(&config.secret_file)
        .await
        .context("load OAuth client secret")?;
    let oauth_manager = OAuthManager::new(secret, config.authorization_mode());
    let youtube = setup_youtube_client(oauth_manager, &config.token_cache())
        .await
        .context("set up YouTube client")?;

    let dispatcher = Dispatcher::new(
        DiscordWebhook::new(&config.discord_webhook),
        config.templates(),
        spacing,
    );

    let store = config.state_file();
    let state = store.load_or_default().await;

    tracing::info!(
        max_results = settings.max_results,
        short_interval = ?settings.short_interval,
        long_interval = ?settings.long_interval,
        "entering loop"
    );
    Poller::new(youtube, dispatcher, store, state, settings)
        .run()
        .await
}
