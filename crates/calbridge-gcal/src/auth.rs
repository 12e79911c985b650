//! Access token management.
//!
//! The remote API is called with short-lived access tokens minted from a
//! long-lived refresh token. [`TokenCache`] holds the current access
//! token and mints a new one on demand; [`with_refresh`] implements the
//! recovery policy around a single remote operation: on an authentication
//! failure, refresh once and retry the operation exactly once. A second
//! authentication failure is returned without another refresh.
//!
//! When the refresh itself fails because the refresh token is expired or
//! revoked, that error (which carries the re-auth remediation) replaces
//! the original failure. Any other refresh failure is logged and the
//! original error is returned.

use std::future::Future;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::config::GcalConfig;
use crate::error::{GcalError, GcalErrorCode, GcalResult};
use crate::oauth::GOOGLE_TOKEN_URL;

/// Caches the current access token and mints replacements from the
/// configured refresh token.
pub struct TokenCache {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    access: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

impl TokenCache {
    /// Creates a cache with no access token; the first use mints one.
    pub fn new(http: reqwest::Client, config: &GcalConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_token: config.refresh_token.clone(),
            access: RwLock::new(None),
        }
    }

    /// Returns the cached access token, minting one if none is held yet.
    pub async fn access_token(&self) -> GcalResult<String> {
        if let Some(token) = self.access.read().await.clone() {
            return Ok(token);
        }
        self.force_refresh().await
    }

    /// Mints a fresh access token from the refresh token and caches it.
    pub async fn force_refresh(&self) -> GcalResult<String> {
        let response = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", self.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| GcalError::network(format!("token refresh request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GcalError::network(format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            let lowered = body.to_lowercase();
            if lowered.contains("invalid_grant")
                || lowered.contains("expired")
                || lowered.contains("revoked")
            {
                return Err(GcalError::authentication(format!(
                    "refresh token expired or revoked - run 'calbridge auth' to generate a new one: {}",
                    body.trim()
                )));
            }
            if status.is_server_error() {
                return Err(GcalError::server(format!(
                    "token endpoint error ({}): {}",
                    status, body
                )));
            }
            return Err(GcalError::authentication(format!(
                "token refresh failed ({}): {}",
                status, body
            )));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body).map_err(|e| {
            GcalError::invalid_response(format!("failed to parse token response: {}", e))
        })?;

        tracing::debug!("access token refreshed");
        *self.access.write().await = Some(parsed.access_token.clone());
        Ok(parsed.access_token)
    }

    /// Runs `operation` with the current access token under the
    /// refresh-once policy of [`with_refresh`].
    pub async fn run<T, Op, OpFut>(&self, operation: Op) -> GcalResult<T>
    where
        Op: Fn(String) -> OpFut,
        OpFut: Future<Output = GcalResult<T>>,
    {
        let token = self.access_token().await?;
        with_refresh(token, operation, || self.force_refresh()).await
    }
}

/// Runs `operation` with `initial`; on an authentication failure, calls
/// `refresh` once and retries the operation once with the new token.
///
/// A refresh failure classified as an authentication problem replaces the
/// original error (its message names the remediation). Any other refresh
/// failure is logged and the original error is returned unchanged.
pub async fn with_refresh<T, Op, OpFut, Refresh, RefreshFut>(
    initial: String,
    operation: Op,
    refresh: Refresh,
) -> GcalResult<T>
where
    Op: Fn(String) -> OpFut,
    OpFut: Future<Output = GcalResult<T>>,
    Refresh: FnOnce() -> RefreshFut,
    RefreshFut: Future<Output = GcalResult<String>>,
{
    match operation(initial).await {
        Err(error) if error.code() == GcalErrorCode::Authentication => match refresh().await {
            Ok(token) => operation(token).await,
            Err(refresh_error) if refresh_error.code() == GcalErrorCode::Authentication => {
                Err(refresh_error)
            }
            Err(refresh_error) => {
                tracing::warn!(error = %refresh_error, "token refresh failed, returning original error");
                Err(error)
            }
        },
        outcome => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn success_never_refreshes() {
        let refreshes = AtomicUsize::new(0);

        let result = with_refresh(
            "token-1".to_string(),
            |_token| async { Ok(7) },
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok("token-2".to_string()) }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auth_failure_refreshes_and_retries_once() {
        let seen = Mutex::new(Vec::new());

        let result = with_refresh(
            "token-1".to_string(),
            |token| {
                let first = {
                    let mut seen = seen.lock().unwrap();
                    seen.push(token);
                    seen.len() == 1
                };
                async move {
                    if first {
                        Err(GcalError::authentication("access token expired or invalid"))
                    } else {
                        Ok("done")
                    }
                }
            },
            || async { Ok("token-2".to_string()) },
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(*seen.lock().unwrap(), vec!["token-1", "token-2"]);
    }

    #[tokio::test]
    async fn second_auth_failure_is_not_refreshed_again() {
        let calls = AtomicUsize::new(0);
        let refreshes = AtomicUsize::new(0);

        let result: GcalResult<()> = with_refresh(
            "token-1".to_string(),
            |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GcalError::authentication("access token expired or invalid")) }
            },
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok("token-2".to_string()) }
            },
        )
        .await;

        assert_eq!(
            result.unwrap_err().code(),
            GcalErrorCode::Authentication
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_returns_original_error() {
        let calls = AtomicUsize::new(0);

        let result: GcalResult<()> = with_refresh(
            "token-1".to_string(),
            |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GcalError::authentication("access token expired or invalid")) }
            },
            || async { Err(GcalError::network("connection failed: refused")) },
        )
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.code(), GcalErrorCode::Authentication);
        assert_eq!(error.message(), "access token expired or invalid");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn revoked_refresh_token_replaces_original_error() {
        let result: GcalResult<()> = with_refresh(
            "token-1".to_string(),
            |_token| async { Err(GcalError::authentication("access token expired or invalid")) },
            || async {
                Err(GcalError::authentication(
                    "refresh token expired or revoked - run 'calbridge auth' to generate a new one",
                ))
            },
        )
        .await;

        let error = result.unwrap_err();
        assert!(error.message().contains("calbridge auth"));
    }

    #[tokio::test]
    async fn non_auth_errors_pass_through() {
        let refreshes = AtomicUsize::new(0);

        let result: GcalResult<()> = with_refresh(
            "token-1".to_string(),
            |_token| async { Err(GcalError::not_found("event not found")) },
            || {
                refreshes.fetch_add(1, Ordering::SeqCst);
                async { Ok("token-2".to_string()) }
            },
        )
        .await;

        assert_eq!(result.unwrap_err().code(), GcalErrorCode::NotFound);
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
    }
}
