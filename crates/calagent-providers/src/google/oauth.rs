//! OAuth 2.0 PKCE flow for Google APIs.
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) and a
//! loopback redirect, as Google recommends for installed applications.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier, its SHA-256 challenge, and a random state
//! 2. Bind a listener on the configured loopback port
//! 3. Print the authorization URL (and optionally open a browser)
//! 4. Wait for Google to redirect back with the authorization code
//! 5. Exchange the code (with the verifier) for access and refresh tokens

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::config::{GoogleConfig, OAuthCredentials};
use super::tokens::{TokenGrant, TokenInfo};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// How long to wait for the browser redirect.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Sleep between accept attempts on the non-blocking listener.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// A connected browser must send its request line within this.
const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// The two ways of obtaining an access token.
///
/// [`OAuthClient`] talks to Google; tests substitute a scripted flow.
pub trait AuthorizationFlow: Send + Sync {
    /// Runs the interactive authorization and returns a fresh token.
    fn authorize<'a>(
        &'a self,
        scopes: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, ProviderResult<TokenInfo>>;

    /// Exchanges a refresh token for a new access token.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<TokenGrant>>;
}

/// OAuth client for Google APIs.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    http_client: reqwest::Client,
    auth_url: String,
    token_url: String,
    open_browser: bool,
    callback_timeout: Duration,
}

impl OAuthClient {
    pub fn new(credentials: OAuthCredentials, timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            credentials,
            http_client,
            auth_url: super::config::GOOGLE_AUTH_URL.to_string(),
            token_url: super::config::GOOGLE_TOKEN_URL.to_string(),
            open_browser: false,
            callback_timeout: CALLBACK_TIMEOUT,
        })
    }

    /// Builds a client from the provider configuration.
    pub fn from_config(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self::new(config.credentials.clone(), config.timeout)?
            .with_auth_url(&config.auth_url)
            .with_token_url(&config.token_url)
            .with_open_browser(config.open_browser))
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    /// How long the loopback listener waits for the redirect.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Runs the interactive PKCE flow on the given loopback port.
    ///
    /// # Errors
    ///
    /// Fails when the port cannot be bound, the user denies access, the
    /// redirect does not arrive within the callback timeout (five minutes
    /// by default), the state does not match, or the code exchange is
    /// rejected. The port is released in every case.
    pub async fn authorize_interactive(
        &self,
        scopes: &[String],
        port: u16,
    ) -> ProviderResult<TokenInfo> {
        self.authorize_with(PkceFlow::new(), scopes, port).await
    }

    async fn authorize_with(
        &self,
        pkce: PkceFlow,
        scopes: &[String],
        port: u16,
    ) -> ProviderResult<TokenInfo> {
        let listener = TcpListener::bind(("127.0.0.1", port)).map_err(|e| {
            ProviderError::configuration(format!(
                "cannot listen on 127.0.0.1:{} for the OAuth redirect: {}",
                port, e
            ))
            .with_source(e)
        })?;
        debug!("bound loopback server on port {}", port);

        let redirect_uri = redirect_uri(port);
        let auth_url = pkce.build_auth_url(
            &self.auth_url,
            &self.credentials.client_id,
            &redirect_uri,
            scopes,
        );

        eprintln!("\nPlease visit this URL to authorize this application:\n\n{}\n", auth_url);
        if self.open_browser {
            info!("opening browser for authorization");
            if let Err(e) = open::that(&auth_url) {
                warn!("failed to open browser: {}", e);
            }
        }

        let timeout = self.callback_timeout;
        let (code, received_state) =
            tokio::task::spawn_blocking(move || wait_for_callback(listener, timeout))
                .await
                .map_err(|e| ProviderError::internal(format!("callback listener failed: {}", e)))??;

        if received_state != pkce.state {
            return Err(ProviderError::authentication(
                "OAuth state mismatch, the redirect did not come from this authorization request",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        let grant = self
            .token_request(
                &[
                    ("code", code.as_str()),
                    ("code_verifier", pkce.verifier.as_str()),
                    ("grant_type", "authorization_code"),
                    ("redirect_uri", redirect_uri.as_str()),
                ],
                "token exchange",
            )
            .await?;

        Ok(TokenInfo::from_grant(grant, scopes))
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        let grant = self
            .token_request(
                &[
                    ("refresh_token", refresh_token),
                    ("grant_type", "refresh_token"),
                ],
                "token refresh",
            )
            .await?;
        info!("refreshed access token");
        Ok(grant)
    }

    async fn token_request(
        &self,
        params: &[(&str, &str)],
        context: &str,
    ) -> ProviderResult<TokenGrant> {
        let mut form = vec![
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];
        form.extend_from_slice(params);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("{} request failed: {}", context, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            // The token endpoint answers 400/401 for revoked or invalid grants
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                context, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })
    }
}

impl AuthorizationFlow for OAuthClient {
    fn authorize<'a>(
        &'a self,
        scopes: &'a [String],
        port: u16,
    ) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
        Box::pin(self.authorize_interactive(scopes, port))
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
        Box::pin(self.refresh_access_token(refresh_token))
    }
}

/// Returns the redirect URI registered for a loopback port.
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/", port)
}

/// Waits for the redirect and extracts the authorization code and state.
///
/// Polls a non-blocking listener until `timeout`. The listener is dropped
/// on return, so the port is free again whatever the outcome.
fn wait_for_callback(
    listener: TcpListener,
    timeout: Duration,
) -> ProviderResult<(String, String)> {
    listener.set_nonblocking(true).map_err(|e| {
        ProviderError::internal(format!("failed to configure loopback listener: {}", e))
    })?;
    let deadline = Instant::now() + timeout;

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!("redirect connection from {}", peer);
                // Accepted sockets can inherit non-blocking mode
                let _ = stream.set_nonblocking(false);
                let _ = stream.set_read_timeout(Some(REQUEST_READ_TIMEOUT));
                if let Some(result) = handle_callback(stream) {
                    return result;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => error!("failed to accept connection: {}", e),
        }

        if Instant::now() >= deadline {
            return Err(ProviderError::authentication(format!(
                "no OAuth redirect received within {} seconds",
                timeout.as_secs()
            )));
        }
        thread::sleep(ACCEPT_POLL);
    }
}

/// Handles one request on the loopback server.
///
/// Returns `None` for requests that carry neither a code nor an error
/// (e.g. a browser fetching `/favicon.ico`), so the server keeps waiting.
fn handle_callback(mut stream: TcpStream) -> Option<ProviderResult<(String, String)>> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    let params = parse_callback(&request_line)?;

    let response = if params.error.is_some() || params.code.is_none() {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Failed</h1>\
        <p>You can close this window.</p></body></html>"
    } else {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n\
        <html><body><h1>Authorization Successful</h1>\
        <p>You can close this window and return to the terminal.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    if let Some(error) = params.error {
        return Some(Err(ProviderError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    params
        .code
        .map(|code| Ok((code, params.state.unwrap_or_default())))
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Parses `GET /?code=...&state=... HTTP/1.1`.
///
/// Any path is accepted. Returns `None` unless the line is a GET carrying
/// a code or an error.
fn parse_callback(request_line: &str) -> Option<CallbackParams> {
    let mut parts = request_line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let target = parts.next()?;
    let (_, query) = target.split_once('?')?;

    let mut params = CallbackParams::default();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(&value.replace('+', " "))
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        match key {
            "code" => params.code = Some(value),
            "state" => params.state = Some(value),
            "error" => params.error = Some(value),
            _ => {}
        }
    }

    if params.code.is_none() && params.error.is_none() {
        return None;
    }
    Some(params)
}

/// PKCE verifier, challenge, and CSRF state for one authorization attempt.
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of the verifier, base64url encoded).
    pub challenge: String,
    /// Random state echoed back by the redirect.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        let state = random_token(16);

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    /// Builds the authorization URL for this attempt.
    pub fn build_auth_url(
        &self,
        auth_endpoint: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
    ) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            auth_endpoint,
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
