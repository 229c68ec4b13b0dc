//! Access token acquisition and caching.
//!
//! # Responsibilities
//! - Log in with the configured credentials
//! - Cache the token until its absolute expiry
//! - Serialize concurrent renewals so at most one login is in flight

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::RegistryConfig;
use crate::observability::metrics;
use crate::registry::error::{HttpStatusError, RegistryError, RegistryResult};
use crate::registry::http::{RegistryHttp, LOGIN_PATH};

/// Source of wall-clock time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Clock that only moves when told to.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

#[cfg(any(test, feature = "test-util"))]
impl ManualClock {
    pub fn new(start_millis: u64) -> Self {
        Self {
            now: AtomicU64::new(start_millis),
        }
    }

    pub fn set_millis(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-util"))]
impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// An access token together with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expiration_time_millis: u64,
}

impl CachedToken {
    pub fn is_valid_at(&self, now_millis: u64) -> bool {
        now_millis < self.expiration_time_millis
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    token_ttl: u64,
}

/// Obtains and caches registry access tokens.
pub struct TokenManager {
    http: RegistryHttp,
    username: String,
    password: String,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(http: RegistryHttp, config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            username: config.username.clone(),
            password: config.password.clone(),
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, logging in again only when the cached one expired.
    pub async fn get_token(&self) -> RegistryResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid_at(self.clock.now_millis()) {
                return Ok(token.access_token.clone());
            }
            tracing::debug!(
                expired_at = token.expiration_time_millis,
                "Registry token expired, renewing"
            );
        }

        let token = self.login().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token if it is still `rejected`; the next call logs in again.
    ///
    /// A token renewed by another caller in the meantime is kept.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.lock().await;
        if cached.as_ref().is_some_and(|t| t.access_token == rejected) {
            tracing::warn!("Registry rejected access token, dropping it");
            *cached = None;
        }
    }

    /// Pass `result` through, invalidating `token` when the registry answered 403.
    pub async fn check_rejection<T>(
        &self,
        token: &str,
        result: RegistryResult<T>,
    ) -> RegistryResult<T> {
        if let Err(RegistryError::Http(HttpStatusError::Forbidden { .. })) = &result {
            self.invalidate(token).await;
        }
        result
    }

    /// Snapshot of the cached token, if any.
    pub async fn cached(&self) -> Option<CachedToken> {
        self.cached.lock().await.clone()
    }

    async fn login(&self) -> RegistryResult<CachedToken> {
        let response = self
            .http
            .client()
            .post(self.http.url(LOGIN_PATH))
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Registry login rejected");
            return Err(RegistryError::Auth {
                status: status.as_u16(),
                body,
            });
        }

        let login: LoginResponse = serde_json::from_str(&body)
            .map_err(|e| RegistryError::Decode(format!("login response: {}", e)))?;

        let expiration_time_millis = self
            .clock
            .now_millis()
            .saturating_add(login.token_ttl.saturating_mul(1000));

        metrics::record_token_refresh();
        tracing::info!(
            ttl_secs = login.token_ttl,
            expires_at = expiration_time_millis,
            "Obtained registry access token"
        );

        Ok(CachedToken {
            access_token: login.access_token,
            expiration_time_millis,
        })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_window() {
        let token = CachedToken {
            access_token: "tok".to_string(),
            expiration_time_millis: 10_000,
        };
        assert!(token.is_valid_at(0));
        assert!(token.is_valid_at(9_999));
        assert!(!token.is_valid_at(10_000));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5);
        clock.advance_millis(10);
        assert_eq!(clock.now_millis(), 15);
        clock.set_millis(1);
        assert_eq!(clock.now_millis(), 1);
    }

    #[test]
    fn test_login_response_shape() {
        let login: LoginResponse =
            serde_json::from_str(r#"{"accessToken":"tok123","tokenTtl":10,"globalAdmin":true}"#)
                .unwrap();
        assert_eq!(login.access_token, "tok123");
        assert_eq!(login.token_ttl, 10);
    }
}
