//! OAuth 2.0 PKCE flow for obtaining a refresh token.
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) over a
//! loopback redirect: generate a verifier and its SHA-256 challenge,
//! bind a local callback server, send the user's browser to the consent
//! page, then exchange the returned code (plus verifier) for tokens.
//! `access_type=offline` and `prompt=consent` force the response to
//! include a refresh token, which is the one credential this tool
//! persists.
//!
//! The state parameter guards the callback against CSRF; the callback
//! server only accepts loopback connections.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::error::{GcalError, GcalResult};

/// Google OAuth endpoints.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub(crate) const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Timeout for waiting for the OAuth callback.
const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Tokens obtained from a completed authorization flow.
#[derive(Debug, Clone)]
pub struct AuthorizedTokens {
    pub access_token: String,
    /// Absent when the consent screen did not issue one; the flow
    /// requests offline access so this should normally be present.
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// OAuth client driving the one-time interactive flow.
#[derive(Debug)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Creates an OAuth client for the given application credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> GcalResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                let message = format!("failed to create HTTP client: {}", e);
                GcalError::configuration(message).with_source(e)
            })?;

        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
        })
    }

    /// Runs the interactive PKCE flow and returns the obtained tokens.
    ///
    /// Binds a loopback callback server on the first free port in
    /// `port_range`, opens the user's browser to the consent page (or
    /// prints the URL when that fails), waits up to five minutes for the
    /// redirect, and exchanges the authorization code for tokens.
    pub async fn authorize(
        &self,
        scopes: &[String],
        port_range: (u16, u16),
    ) -> GcalResult<AuthorizedTokens> {
        let pkce = PkceFlow::new();

        let (listener, port) = bind_loopback_server(port_range)?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", port);

        let auth_url = pkce.build_auth_url(&self.client_id, &redirect_uri, scopes);

        info!("starting authorization flow, opening browser");
        debug!("authorization URL: {}", auth_url);

        if let Err(e) = open::that(&auth_url) {
            warn!("failed to open browser: {}", e);
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let (code, received_state) = wait_for_callback(listener)?;

        if received_state != pkce.state {
            return Err(GcalError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        info!("received authorization code, exchanging for tokens");
        self.exchange_code(&code, &pkce.verifier, &redirect_uri).await
    }

    /// Exchanges an authorization code for tokens.
    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> GcalResult<AuthorizedTokens> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| GcalError::network(format!("token exchange request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GcalError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(GcalError::authentication(format!(
                "token exchange failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| GcalError::invalid_response(format!("invalid token response: {}", e)))?;

        info!("authorization complete");
        Ok(AuthorizedTokens {
            access_token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            expires_in: token_response.expires_in,
        })
    }
}

/// Binds a listener on the first free loopback port in the range.
fn bind_loopback_server(port_range: (u16, u16)) -> GcalResult<(TcpListener, u16)> {
    for port in port_range.0..=port_range.1 {
        if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
            debug!("bound callback server on port {}", port);
            return Ok((listener, port));
        }
    }
    Err(GcalError::configuration(format!(
        "no available port in range {}-{}",
        port_range.0, port_range.1
    )))
}

/// Waits for the browser redirect and extracts code and state.
fn wait_for_callback(listener: TcpListener) -> GcalResult<(String, String)> {
    let (tx, rx) = mpsc::channel();

    // Accept in a separate thread so the wait can time out.
    let _handle = thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Some(result) = handle_callback(stream) {
                        let _ = tx.send(result);
                        return;
                    }
                }
                Err(e) => error!("failed to accept connection: {}", e),
            }
        }
    });

    match rx.recv_timeout(CALLBACK_TIMEOUT) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            Err(GcalError::authentication("authorization callback timed out"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(GcalError::internal("callback channel disconnected"))
        }
    }
}

/// Handles one HTTP request on the callback server.
///
/// Returns `None` for requests that are not the redirect (favicon probes
/// and the like) so the accept loop keeps waiting.
fn handle_callback(mut stream: TcpStream) -> Option<GcalResult<(String, String)>> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return None;
    }

    // Request line shape: GET /callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("GET") {
        return None;
    }
    let path = parts.next()?;
    if !path.starts_with("/callback") {
        return None;
    }

    let redirect = parse_redirect(path);

    let response = if redirect.error.is_some() || redirect.code.is_none() {
        "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html\r\n\r\n\
         <html><body><h1>Authorization Failed</h1>\
         <p>You can close this window.</p></body></html>"
    } else {
        "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n\
         <html><body><h1>Authorization Successful</h1>\
         <p>You can close this window and return to the terminal.</p></body></html>"
    };
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();

    if let Some(error) = redirect.error {
        return Some(Err(GcalError::authentication(format!(
            "authorization denied: {}",
            error
        ))));
    }

    match redirect.code {
        Some(code) => Some(Ok((code, redirect.state.unwrap_or_default()))),
        None => Some(Err(GcalError::authentication(
            "missing authorization code in callback",
        ))),
    }
}

#[derive(Debug, Default, PartialEq)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Extracts the interesting query parameters from the redirect path.
fn parse_redirect(path: &str) -> RedirectParams {
    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");

    let mut params = RedirectParams::default();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value).unwrap_or_default().into_owned();
        match key {
            "code" => params.code = Some(value),
            "state" => params.state = Some(value),
            "error" => params.error = Some(value),
            _ => {}
        }
    }
    params
}

/// PKCE flow state (RFC 7636).
#[derive(Debug)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 of the verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new flow with a random verifier and state.
    pub fn new() -> Self {
        let verifier = Self::generate_verifier();
        let challenge = Self::compute_challenge(&verifier);
        let state = Self::generate_state();

        Self {
            verifier,
            challenge,
            state,
        }
    }

    fn generate_verifier() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..CODE_VERIFIER_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }

    fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..16).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the authorization URL for the consent page.
    pub fn build_auth_url(&self, client_id: &str, redirect_uri: &str, scopes: &[String]) -> String {
        let scope = scopes.join(" ");

        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent",
            GOOGLE_AUTH_URL,
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

/// Response from the token endpoint.
#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}
