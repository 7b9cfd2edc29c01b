use std::sync::Arc;
use std::time::Duration;

use dockhand_core::{AccessToken, Clock, SystemClock};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::errors::RegistryError;
use crate::transport::RegistryTransport;

/// Owns the current access token and its expiry. The heartbeat loop and the
/// registration path share one instance behind an `Arc`; nothing else writes
/// the token.
pub struct CredentialManager<T> {
    transport: Arc<T>,
    username: String,
    password: String,
    validity: Duration,
    clock: Arc<dyn Clock>,
    current: Mutex<Option<AccessToken>>,
}

impl<T: RegistryTransport> CredentialManager<T> {
    pub fn new(transport: Arc<T>, config: &RegistryConfig) -> Self {
        Self::with_clock(transport, config, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: Arc<T>, config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            username: config.username.clone(),
            password: config.password.clone(),
            validity: config.token_validity,
            clock,
            current: Mutex::new(None),
        }
    }

    /// Returns a token whose expiry has not passed, logging in first when the
    /// stored one is missing or stale. The check-refresh-store sequence runs
    /// under one lock so concurrent callers cannot race a half-updated pair.
    pub async fn ensure_valid_token(&self) -> Result<String, RegistryError> {
        let mut current = self.current.lock().await;
        let now = self.clock.now_millis();

        if let Some(token) = current.as_ref() {
            if !token.is_expired(now) {
                return Ok(token.value.clone());
            }
            debug!("access token expired, renewing");
        }

        let response = self.transport.login(&self.username, &self.password).await?;
        let expires_at = now + self.validity.as_millis() as u64;
        info!(
            "obtained registry access token, local validity {}s (registry ttl {:?})",
            self.validity.as_secs(),
            response.token_ttl
        );

        let token = AccessToken::new(response.access_token, expires_at);
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::{ManualClock, ScriptedRegistry};

    fn manager(
        transport: Arc<ScriptedRegistry>,
        clock: Arc<ManualClock>,
    ) -> CredentialManager<ScriptedRegistry> {
        CredentialManager::with_clock(transport, &RegistryConfig::default(), clock)
    }

    #[tokio::test]
    async fn first_use_logs_in_once_and_returns_the_token() {
        let transport = Arc::new(ScriptedRegistry::default());
        let clock = Arc::new(ManualClock::default());
        let credentials = manager(transport.clone(), clock);

        let token = credentials.ensure_valid_token().await.unwrap();
        assert_eq!(token, "abc123");
        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn valid_token_is_reused_without_a_new_login() {
        let transport = Arc::new(ScriptedRegistry::default());
        let clock = Arc::new(ManualClock::default());
        let credentials = manager(transport.clone(), clock);

        let first = credentials.ensure_valid_token().await.unwrap();
        let second = credentials.ensure_valid_token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_triggers_exactly_one_new_login() {
        let transport = Arc::new(ScriptedRegistry::default());
        let clock = Arc::new(ManualClock::default());
        let credentials = manager(transport.clone(), clock.clone());

        credentials.ensure_valid_token().await.unwrap();
        clock.advance_secs(16_000);

        credentials.ensure_valid_token().await.unwrap();
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);

        // still inside the renewed window
        credentials.ensure_valid_token().await.unwrap();
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_login_surfaces_authentication_failure_and_is_retried() {
        let transport = Arc::new(ScriptedRegistry::default());
        transport.fail_logins.store(1, Ordering::SeqCst);
        let clock = Arc::new(ManualClock::default());
        let credentials = manager(transport.clone(), clock);

        let err = credentials.ensure_valid_token().await.unwrap_err();
        assert!(matches!(err, RegistryError::AuthenticationFailure(_)));

        // next attempt succeeds; no token was stored by the failed one
        let token = credentials.ensure_valid_token().await.unwrap();
        assert_eq!(token, "abc123");
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
    }
}
