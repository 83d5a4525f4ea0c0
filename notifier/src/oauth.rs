//! OAuth 2.0 management for YouTube API authentication.
//!
//! This module covers obtaining a user's consent (either by having them paste the authorization
//! code into the terminal, or by receiving it on a small redirect server), refreshing access
//! tokens, and caching the resulting token on disk so that consent is only needed once.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, Scope, TokenResponse, TokenUrl, reqwest,
};
use serde::Deserialize;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::AsyncBufReadExt;

/// Read-only access is all the notifier needs.
const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// Redirect target for the copy-and-paste flow.
const OUT_OF_BAND_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";

const OAUTH_DONE: &str = "Authorization received. You can now safely close this browser window.";

/// The OAuth client credentials of a Google Cloud project.
///
/// This is the content of the `client_secret.json` file that can be downloaded from the Google
/// Cloud console, which nests the actual credentials under either `installed` or `web` depending
/// on the type of client that was created.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Deserialize)]
enum SecretFile {
    #[serde(rename = "installed")]
    Installed(ApplicationSecret),
    #[serde(rename = "web")]
    Web(ApplicationSecret),
}

impl ApplicationSecret {
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let file: SecretFile =
            serde_json::from_str(json).context("parse client secret file to config")?;
        Ok(match file {
            SecretFile::Installed(secret) | SecretFile::Web(secret) => secret,
        })
    }

    pub async fn from_file(path: &Path) -> eyre::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read client secret file {}", path.display()))?;
        Self::from_json(&json)
    }
}

/// How the user hands us the authorization code after granting access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// Print the consent URL and read the code the user pastes back on stdin.
    Prompt,
    /// Listen on `listen` for the browser to be redirected to `redirect_url` with the code.
    ///
    /// `redirect_url` is the address under which the browser reaches the listener, which may
    /// differ from `listen` (e.g., when running behind a container port mapping).
    RedirectServer {
        redirect_url: String,
        listen: SocketAddr,
    },
}

/// Manages OAuth 2.0 authentication flows for YouTube API access.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secret: ApplicationSecret,
    mode: AuthorizationMode,
}

impl OAuthManager {
    pub fn new(secret: ApplicationSecret, mode: AuthorizationMode) -> Self {
        Self { secret, mode }
    }

    /// Walks the user through granting access and exchanges the resulting code for a token.
    pub async fn authenticate(&self) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();

        let auth_url =
            AuthUrl::new(self.secret.auth_uri.clone()).context("parse authorization endpoint")?;
        let token_url =
            TokenUrl::new(self.secret.token_uri.clone()).context("parse token endpoint")?;
        let redirect_url = match &self.mode {
            AuthorizationMode::Prompt => OUT_OF_BAND_REDIRECT,
            AuthorizationMode::RedirectServer { redirect_url, .. } => redirect_url.as_str(),
        };
        let redirect_url =
            RedirectUrl::new(redirect_url.to_string()).context("parse redirect url")?;
        let client = BasicClient::new(ClientId::new(self.secret.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let csrf_for_url = csrf.clone();
        let (consent_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf_for_url.clone())
            .add_scope(Scope::new(YOUTUBE_READONLY_SCOPE.to_string()))
            .add_extra_param("access_type", "offline")
            .set_pkce_challenge(pkce_challenge)
            .url();

        let authorization_code = match &self.mode {
            AuthorizationMode::Prompt => {
                show_consent_url(
                    consent_url.as_str(),
                    "After completing the authorization flow, enter the authorization code:",
                );
                read_code_from_stdin().await?
            }
            AuthorizationMode::RedirectServer { listen, .. } => {
                let (_, eventually_authorization_code) = receive_redirect(*listen, csrf)
                    .await
                    .context("set up redirect endpoint")?;
                show_consent_url(
                    consent_url.as_str(),
                    "The notifier continues once the authorization flow is complete.",
                );
                eventually_authorization_code
                    .await
                    .context("await user authorization code")?
            }
        };

        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        let token_result = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&http_client)
            .await
            .context("exchange authorization code with access token")?;

        Ok(token_result)
    }

    /// Attempts to refresh an existing OAuth token using its refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded
    /// * `Ok(None)` - No refresh token, or Google considers it an invalid grant
    /// * `Err(_)` - Network or other error occurred during refresh attempt
    ///
    /// When refresh is rejected, the token should be considered dead and the user asked to go
    /// through [`Self::authenticate`] again.
    pub async fn refresh_token(
        &self,
        token: BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        let token_url =
            TokenUrl::new(self.secret.token_uri.clone()).context("parse token endpoint")?;
        let client = BasicClient::new(ClientId::new(self.secret.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secret.client_secret.clone()))
            .set_token_uri(token_url);

        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

fn show_consent_url(url: &str, instructions: &str) {
    tracing::info!(%url, "asking user to follow OAuth flow");
    eprintln!("Go to the following link in your browser. {instructions}\n{url}");
    // there's usually no browser when running headless or in a container
    if let Err(e) = webbrowser::open(url) {
        tracing::debug!(error = %e, "could not open browser");
    }
}

async fn read_code_from_stdin() -> eyre::Result<AuthorizationCode> {
    let mut line = String::new();
    tokio::io::BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read authorization code")?;
    let code = line.trim();
    if code.is_empty() {
        eyre::bail!("no authorization code entered");
    }
    Ok(AuthorizationCode::new(code.to_string()))
}

/// Listens on `listen` for a single OAuth redirect carrying the authorization code.
///
/// The `state` parameter of the redirect must match `csrf`. Returns the bound address along
/// with a future that resolves to the authorization code once the redirect arrives.
async fn receive_redirect(
    listen: SocketAddr,
    csrf: CsrfToken,
) -> eyre::Result<(
    SocketAddr,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("bind redirect server to {listen}"))?;
    let addr = socket.local_addr().context("get local address")?;
    tracing::debug!(%addr, "waiting for OAuth redirect");

    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let csrf = csrf.clone();
                let got = got.clone();
                async move {
                    let mut presented_state = None;
                    let mut presented_code = None;
                    for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                    {
                        match &*k {
                            "state" => presented_state = Some(v),
                            "code" => presented_code = Some(v),
                            _ => {}
                        }
                    }
                    if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                        return Err("invalid csrf token");
                    }
                    let Some(code) = presented_code else {
                        return Err("no authorization code found");
                    };
                    let code = AuthorizationCode::new(code.into_owned());
                    if got.send(code).await.is_err() {
                        return Err("redirect server already shut down");
                    }
                    Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    if let Err(e) = exit {
                        Err(e).context("redirect server got bad request")
                    } else {
                        eyre::bail!("redirect server exit prematurely");
                    }
                }
                code = gotten.recv() => {
                    serve.as_mut().graceful_shutdown();
                    // let the success page make it to the browser
                    let _ = serve.await;
                    code.ok_or_else(|| eyre::eyre!("redirect server dropped the authorization code"))
                }
            }
        };
        let _ = tx.send(r.await);
    });
    Ok((addr, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}

/// On-disk cache for the OAuth token, so consent only has to be given once.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// File name of the cached token within the token directory.
    pub const FILE_NAME: &'static str = "youtube-live-notifier.json";

    /// Cache the token in `dir`, which is created (private to the current user) on first save.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` if no token has been cached yet.
    pub async fn load(&self) -> eyre::Result<Option<BasicTokenResponse>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read cached token {}", self.path.display()));
            }
        };
        let token = serde_json::from_str(&json)
            .with_context(|| format!("parse cached token {}", self.path.display()))?;
        Ok(Some(token))
    }

    pub async fn save(&self, token: &BasicTokenResponse) -> eyre::Result<()> {
        if let Some(dir) = self.path.parent() {
            let mut builder = tokio::fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o700);
            builder
                .create(dir)
                .await
                .with_context(|| format!("create token directory {}", dir.display()))?;
        }

        let json = serde_json::to_vec(token).context("serialize OAuth token")?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("write cached token {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .await
                .context("restrict cached token permissions")?;
        }

        tracing::debug!(path = %self.path.display(), "saved OAuth token");
        Ok(())
    }
}
