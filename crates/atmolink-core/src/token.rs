// ── OAuth2 token lifecycle ──
//
// Owns the session (current token pair) and the single refresh timer.
// Every read and rotation of the session goes through one async mutex, so
// a poll never observes a token mid-rotation and two rotations never race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use atmolink_api::{Credentials, OAuthClient, TokenPair, refresh_after};

use crate::config::{BridgeConfig, Labels};
use crate::error::CoreError;
use crate::notify::{Notification, Notifier};

/// Delay before refreshing a token that lives `expires_in`.
///
/// Fires `margin` before expiry when the lifetime allows it, otherwise at
/// half the lifetime. The same instant ends [`TokenPair::is_valid_at`], so
/// the timer and the on-demand check agree on when a token is due.
pub fn refresh_delay(expires_in: Duration, margin: Duration) -> Duration {
    refresh_after(expires_in, margin)
}

struct RefreshTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Acquires, refreshes and hands out access tokens.
///
/// Cheaply cloneable. At most one refresh timer is armed at any time;
/// arming a new one cancels the previous one first.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    oauth: OAuthClient,
    credentials: Credentials,
    margin: Duration,
    /// Single-flight guard around the session.
    session: Mutex<Option<TokenPair>>,
    timer: std::sync::Mutex<Option<RefreshTimer>>,
    /// Set by `shutdown()`; no timer is armed while closed.
    closed: AtomicBool,
    notifier: Arc<dyn Notifier>,
    labels: Labels,
}

impl TokenManager {
    pub fn new(config: &BridgeConfig, notifier: Arc<dyn Notifier>) -> Result<Self, CoreError> {
        let oauth = OAuthClient::new(config.endpoints.token_url.clone(), &config.transport())?;
        Ok(Self::with_client(
            oauth,
            config.credentials.clone(),
            config.refresh_margin,
            notifier,
            config.presentation.labels.clone(),
        ))
    }

    /// Build a manager around a pre-built OAuth client.
    pub fn with_client(
        oauth: OAuthClient,
        credentials: Credentials,
        margin: Duration,
        notifier: Arc<dyn Notifier>,
        labels: Labels,
    ) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                oauth,
                credentials,
                margin,
                session: Mutex::new(None),
                timer: std::sync::Mutex::new(None),
                closed: AtomicBool::new(false),
                notifier,
                labels,
            }),
        }
    }

    // ── Grants ───────────────────────────────────────────────────────

    /// Full re-authentication with the account password.
    ///
    /// On failure the user is notified, the session is cleared and the
    /// refresh timer disarmed.
    pub async fn acquire(&self) -> Result<(), CoreError> {
        let mut session = self.inner.session.lock().await;
        self.acquire_locked(&mut session).await
    }

    /// Rotate the token pair with the refresh token.
    ///
    /// Falls back to [`acquire()`](Self::acquire) exactly once when no
    /// refresh token is held or the refresh grant fails.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let mut session = self.inner.session.lock().await;
        self.refresh_locked(&mut session).await
    }

    /// A currently valid access token, authenticating first if needed.
    pub async fn access_token(&self) -> Result<SecretString, CoreError> {
        let mut session = self.inner.session.lock().await;
        self.ensure_valid(&mut session).await
    }

    /// Run `request` with a valid access token while holding the session.
    ///
    /// No refresh or re-authentication can rotate the token until the
    /// returned future completes, so the request never races a rotation.
    pub async fn with_token<F, Fut, T>(&self, request: F) -> Result<T, CoreError>
    where
        F: FnOnce(SecretString) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut session = self.inner.session.lock().await;
        let token = self.ensure_valid(&mut session).await?;
        let out = request(token).await;
        drop(session);
        Ok(out)
    }

    /// Expiry of the held token pair, if any.
    pub async fn session_expiry(&self) -> Option<DateTime<Utc>> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(TokenPair::expires_at)
    }

    /// Whether a refresh timer is currently armed.
    pub fn refresh_armed(&self) -> bool {
        self.lock_timer().is_some()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Allow timers again after a [`shutdown()`](Self::shutdown).
    pub fn reopen(&self) {
        self.inner.closed.store(false, Ordering::SeqCst);
    }

    /// Cancel the refresh timer, wait for it, and forget the token pair.
    pub async fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);

        let timer = self.lock_timer().take();
        if let Some(timer) = timer {
            timer.cancel.cancel();
            // A refresh already past its sleep finishes first; it cannot
            // re-arm because the manager is closed.
            let _ = timer.handle.await;
        }

        *self.inner.session.lock().await = None;
        debug!("token session cleared");
    }

    // ── Locked operations ────────────────────────────────────────────

    async fn ensure_valid(
        &self,
        session: &mut MutexGuard<'_, Option<TokenPair>>,
    ) -> Result<SecretString, CoreError> {
        let now = Utc::now();
        match session.as_ref() {
            Some(pair) if pair.is_valid_at(now, self.inner.margin) => {}
            Some(_) => {
                debug!("held token is past its validity window");
                self.refresh_locked(session).await?;
            }
            None => self.acquire_locked(session).await?,
        }

        session
            .as_ref()
            .map(|pair| pair.access_token.clone())
            .ok_or_else(|| CoreError::Internal("token session empty after grant".into()))
    }

    async fn acquire_locked(
        &self,
        session: &mut MutexGuard<'_, Option<TokenPair>>,
    ) -> Result<(), CoreError> {
        match self.inner.oauth.password_grant(&self.inner.credentials).await {
            Ok(pair) => {
                info!(expires_at = %pair.expires_at(), "authenticated");
                self.store(session, pair);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "password grant failed");
                self.notify(&self.inner.labels.err_fetch_token);
                **session = None;
                self.disarm();
                Err(e.into())
            }
        }
    }

    async fn refresh_locked(
        &self,
        session: &mut MutexGuard<'_, Option<TokenPair>>,
    ) -> Result<(), CoreError> {
        let Some(refresh_token) = session.as_ref().and_then(|p| p.refresh_token.clone()) else {
            debug!("no refresh token held, re-authenticating");
            return self.acquire_locked(session).await;
        };

        match self
            .inner
            .oauth
            .refresh_grant(&self.inner.credentials, &refresh_token)
            .await
        {
            Ok(pair) => {
                debug!(expires_at = %pair.expires_at(), "token refreshed");
                self.store(session, pair);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "refresh grant failed, re-authenticating");
                self.notify(&self.inner.labels.err_fetch_refreshtoken);
                self.acquire_locked(session).await
            }
        }
    }

    fn store(&self, session: &mut MutexGuard<'_, Option<TokenPair>>, pair: TokenPair) {
        let delay = refresh_delay(pair.expires_in, self.inner.margin);
        **session = Some(pair);
        self.arm(delay);
    }

    // ── Timer ────────────────────────────────────────────────────────

    /// Replace the refresh timer with one firing after `delay`.
    fn arm(&self, delay: Duration) {
        if self.inner.closed.load(Ordering::SeqCst) {
            debug!("token manager closed, not arming refresh");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(refresh_task(
            Arc::downgrade(&self.inner),
            delay,
            cancel.clone(),
        ));

        let previous = self.lock_timer().replace(RefreshTimer { cancel, handle });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        debug!(delay_secs = delay.as_secs(), "refresh timer armed");
    }

    fn disarm(&self) {
        if let Some(timer) = self.lock_timer().take() {
            timer.cancel.cancel();
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<RefreshTimer>> {
        // The guarded value stays consistent even if a holder panicked.
        self.inner
            .timer
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn notify(&self, message: &str) {
        self.inner.notifier.notify(Notification::error(message));
    }
}

/// Sleep until the refresh deadline, then rotate the token once.
///
/// Holds only a weak reference so a dropped manager does not keep
/// refreshing in the background.
async fn refresh_task(inner: Weak<TokenInner>, delay: Duration, cancel: CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(delay) => {
            let Some(inner) = inner.upgrade() else { return };
            let manager = TokenManager { inner };
            if let Err(e) = manager.refresh().await {
                warn!(error = %e, "scheduled token refresh failed");
            }
        }
    }
}
