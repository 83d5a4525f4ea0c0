use crate::oauth::{OAuthManager, TokenCache};
use crate::youtube_api::client::{TimeBoundAccessToken, YouTubeClient};
use eyre::Context;
use std::sync::Arc;

pub mod config;
pub mod discord;
pub mod lifecycle;
pub mod notify;
pub mod oauth;
pub mod poller;
pub mod schedule;
pub mod source;
pub mod state;
pub mod youtube_api;

/// Complete token setup for the notifier.
///
/// Uses the cached token if there is one (refreshing it straight away, since we can't know how
/// old it is), falls back to asking the user for consent, checks that the result actually works,
/// and writes it back to the cache.
pub async fn setup_youtube_client(
    oauth_manager: OAuthManager,
    cache: &TokenCache,
) -> eyre::Result<YouTubeClient> {
    let oauth_manager = Arc::new(oauth_manager);

    // ==============================================================================
    // Token Acquisition Strategy
    // ==============================================================================
    // A cached token is only a starting point. Its access token has likely expired, and its
    // refresh token may have been revoked in the meantime, in which case we need to go through
    // the full consent flow again just like on first start.
    let cached = match cache.load().await {
        Ok(cached) => cached,
        Err(e) => {
            tracing::warn!(path = %cache.path().display(), "ignoring unusable cached token: {e:#}");
            None
        }
    };

    let token = match cached {
        Some(token) => {
            tracing::info!("refreshing cached token");
            let mut token = TimeBoundAccessToken::expired(token);

            if token
                .refresh(&oauth_manager)
                .await
                .context("refresh token")?
            {
                tracing::debug!("successfully refreshed cached token");
                token
            } else {
                tracing::warn!("token refresh failed, getting new token via full OAuth");
                let raw_token = oauth_manager
                    .authenticate()
                    .await
                    .context("authorize user to YouTube")?;
                TimeBoundAccessToken::new(raw_token)
            }
        }
        None => {
            tracing::info!("no cached token, authorizing with YouTube");
            let raw_token = oauth_manager
                .authenticate()
                .await
                .context("authorize user to YouTube")?;
            TimeBoundAccessToken::new(raw_token)
        }
    };

    // ==============================================================================
    // Token Persistence
    // ==============================================================================
    // Written before validation so that a consent the user just gave isn't lost if YouTube
    // happens to be unavailable right now.
    cache
        .save(token.raw_token())
        .await
        .context("cache YouTube token")?;

    // ==============================================================================
    // Token Validation
    // ==============================================================================
    let client = YouTubeClient::new(token, oauth_manager);
    let is_valid = client
        .validate_token()
        .await
        .context("validate YouTube token")?;

    if !is_valid {
        eyre::bail!("freshly obtained YouTube token failed validation");
    }

    Ok(client)
}
