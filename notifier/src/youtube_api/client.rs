//! Core YouTube API client functionality and authentication management.

use crate::oauth::OAuthManager;
use crate::youtube_api::{
    broadcasts::{LiveBroadcast, LiveBroadcastListResponse},
    types::PagedStream,
};
use eyre::Context;
use http::Method;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tokio_stream::Stream;
use tracing::instrument;

/// Refresh this long before the access token actually expires.
const EXPIRY_SAFETY_BUFFER: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the current access token expires (with safety buffer)
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Wraps a token that should be refreshed before it is first used.
    ///
    /// This is what tokens loaded from the on-disk cache start out as, since we have no idea how
    /// long ago they were issued.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: SystemTime::UNIX_EPOCH,
            token,
        }
    }

    /// Wraps a token that was just issued.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - Refresh was rejected (invalid grant, no refresh token, etc.)
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        let Some(new_token) = oauth_manager
            .refresh_token(self.token.clone())
            .await
            .context("refresh OAuth token")?
        else {
            return Ok(false);
        };

        let old_token = std::mem::replace(&mut self.token, new_token);

        // Google usually leaves the refresh token out of refresh responses
        if self.token.refresh_token().is_none() {
            tracing::trace!("new token lacks refresh token, preserving original");
            self.token
                .set_refresh_token(old_token.refresh_token().cloned());
        }

        self.expires_at = Self::calculate_token_expiry(&self.token);
        Ok(true)
    }

    /// Tokens without `expires_in` are assumed to live for an hour.
    fn calculate_token_expiry(token: &BasicTokenResponse) -> SystemTime {
        let lifetime = token.expires_in().unwrap_or(Duration::from_secs(3600));
        SystemTime::now() + lifetime.saturating_sub(EXPIRY_SAFETY_BUFFER)
    }
}

/// Client for the parts of the YouTube Data API v3 the notifier uses.
///
/// Access tokens are refreshed transparently before a request whenever they are about to expire.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
}

impl YouTubeClient {
    pub fn new(token: TimeBoundAccessToken, oauth_manager: Arc<OAuthManager>) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager,
            client: reqwest::Client::new(),
        }
    }

    #[instrument(skip(self))]
    async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");

            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
            } else {
                tracing::error!("access token refresh was rejected");
                eyre::bail!("unable to refresh expired access token");
            }
        }

        Ok(token.token.access_token().secret().to_string())
    }

    /// Makes an authenticated request to the YouTube API and checks the status code.
    #[instrument(skip(self), level = tracing::Level::TRACE)]
    async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        query_params: &[(&str, &str)],
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self.fresh_access_token().await?;

        let response = self
            .client
            .request(method.clone(), url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await
            .with_context(|| format!("send {} request to YouTube API: {}", method, url))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "YouTube API {} request failed with status {}: {}",
                method,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }

    /// Checks that the current token works by listing a single broadcast.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token is valid and can be used for API calls
    /// * `Ok(false)` - Token is invalid or refresh failed
    #[instrument(skip(self), ret)]
    pub async fn validate_token(&self) -> eyre::Result<bool> {
        match self.list_live_broadcasts_internal(1, None).await {
            Ok(_) => {
                tracing::debug!("YouTube API token validation successful");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("YouTube API token validation failed: {:#}", e);
                Ok(false)
            }
        }
    }

    /// Returns a paginated stream of the broadcasts owned by the authenticated user.
    ///
    /// Uses `liveBroadcasts.list` with `mine=true`, which yields broadcasts of every lifecycle
    /// status, newest first. Each underlying request asks for `page_size` items.
    ///
    /// # Required Scopes
    ///
    /// * `https://www.googleapis.com/auth/youtube.readonly`
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/live/docs/liveBroadcasts/list>
    #[instrument(skip(self))]
    pub fn list_my_live_broadcasts(
        &self,
        page_size: u32,
    ) -> impl Stream<Item = eyre::Result<LiveBroadcast>> + use<'_> {
        PagedStream::new(move |page_token| async move {
            let response = self
                .list_live_broadcasts_internal(page_size, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
    }

    async fn list_live_broadcasts_internal(
        &self,
        max_results: u32,
        page_token: Option<String>,
    ) -> eyre::Result<LiveBroadcastListResponse> {
        let url = "https://www.googleapis.com/youtube/v3/liveBroadcasts";

        let max_results_string = max_results.to_string();
        let mut query_params = vec![
            ("part", "id,snippet,status"),
            ("mine", "true"),
            ("maxResults", max_results_string.as_str()),
        ];

        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request(Method::GET, url, &query_params)
            .await?;

        let live_broadcasts: LiveBroadcastListResponse = response
            .json()
            .await
            .context("parse YouTube API response as JSON")?;

        tracing::debug!(
            total_results = live_broadcasts.page_info.total_results,
            returned_items = live_broadcasts.items.len(),
            "fetched live broadcasts"
        );

        Ok(live_broadcasts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oauth2::basic::BasicTokenType;
    use oauth2::{AccessToken, EmptyExtraTokenFields, RefreshToken};

    fn token(expires_in: Option<u64>) -> BasicTokenResponse {
        let mut token = BasicTokenResponse::new(
            AccessToken::new("access".to_string()),
            BasicTokenType::Bearer,
            EmptyExtraTokenFields {},
        );
        token.set_expires_in(expires_in.map(Duration::from_secs).as_ref());
        token.set_refresh_token(Some(RefreshToken::new("refresh".to_string())));
        token
    }

    #[test]
    fn test_cached_tokens_start_expired() {
        let token = TimeBoundAccessToken::expired(token(Some(3600)));
        assert!(token.is_expired());
        assert_eq!(token.raw_token().access_token().secret(), "access");
    }

    #[test]
    fn test_fresh_token_expiry_has_safety_buffer() {
        let before = SystemTime::now();
        let token = TimeBoundAccessToken::new(token(Some(3600)));
        assert!(!token.is_expired());
        assert!(token.expires_at <= SystemTime::now() + Duration::from_secs(3300));
        assert!(token.expires_at >= before + Duration::from_secs(3300));
    }

    #[test]
    fn test_short_lived_token_is_immediately_expired() {
        let token = TimeBoundAccessToken::new(token(Some(60)));
        assert!(token.is_expired());
    }

    #[test]
    fn test_token_without_lifetime_assumes_an_hour() {
        let token = TimeBoundAccessToken::new(token(None));
        assert!(!token.is_expired());
        assert!(token.expires_at <= SystemTime::now() + Duration::from_secs(3300));
    }
}
