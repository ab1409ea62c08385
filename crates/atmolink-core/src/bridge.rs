// ── Bridge lifecycle ──
//
// Owns the token manager, the station client and the reconciler, and
// drives them from a fixed-interval poll task. `start()` and `stop()` are
// the host's init and teardown hooks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use atmolink_api::{OAuthClient, StationClient};

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::model::{Snapshot, VirtualSensor};
use crate::notify::{Notification, Notifier};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::registry::DeviceRegistry;
use crate::token::TokenManager;

// ── BridgeState ──────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Running,
}

/// Result of one poll cycle that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The snapshot was fetched and reconciled.
    Updated(ReconcileReport),
    /// The access token was rejected; a fresh one was acquired and the
    /// next cycle will fetch with it.
    Reauthenticated,
}

// ── Bridge ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    tokens: TokenManager,
    stations: StationClient,
    registry: Arc<dyn DeviceRegistry>,
    notifier: Arc<dyn Notifier>,
    /// Serializes poll cycles; a slow poll delays the next tick instead
    /// of overlapping it.
    reconciler: Mutex<Reconciler>,
    state: watch::Sender<BridgeState>,
    last_poll: watch::Sender<Option<DateTime<Utc>>>,
    cancel: CancellationToken,
    /// Child token for the current run, cancelled on stop and replaced
    /// on start.
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Create a bridge. Does NOT poll; call [`start()`](Self::start) or
    /// [`poll_once()`](Self::poll_once).
    pub fn new(
        config: BridgeConfig,
        registry: Arc<dyn DeviceRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CoreError> {
        let http = config.transport().build_client()?;
        let oauth = OAuthClient::with_client(http.clone(), config.endpoints.token_url.clone());
        let tokens = TokenManager::with_client(
            oauth,
            config.credentials.clone(),
            config.refresh_margin,
            Arc::clone(&notifier),
            config.presentation.labels.clone(),
        );
        let stations = StationClient::with_client(http, config.endpoints.api_url.clone());
        let reconciler = Reconciler::new(config.presentation.clone());

        let (state, _) = watch::channel(BridgeState::Stopped);
        let (last_poll, _) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                tokens,
                stations,
                registry,
                notifier,
                reconciler: Mutex::new(reconciler),
                state,
                last_poll,
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Run an initial poll cycle, then poll on the configured interval.
    ///
    /// A failing first cycle is notified and logged but does not prevent
    /// the poll task from starting. The state reads `Running` from the
    /// moment the call is accepted.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.config.poll_interval.is_zero() {
            return Err(CoreError::Config {
                message: "poll interval must be at least one minute".into(),
            });
        }
        // Only one concurrent caller can claim `Running`.
        let claimed = self.inner.state.send_if_modified(|state| {
            if *state == BridgeState::Running {
                false
            } else {
                *state = BridgeState::Running;
                true
            }
        });
        if !claimed {
            return Err(CoreError::AlreadyRunning);
        }

        self.inner.tokens.reopen();
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        if let Err(e) = self.poll_once().await {
            warn!(error = %e, "initial poll failed");
        }

        let handle = tokio::spawn(poll_task(
            self.clone(),
            self.inner.config.poll_interval,
            child,
        ));
        self.inner.task_handles.lock().await.push(handle);

        info!(
            interval_secs = self.inner.config.poll_interval.as_secs(),
            "bridge started"
        );
        Ok(())
    }

    /// Cancel background tasks, remove every virtual sensor and forget
    /// the token.
    pub async fn stop(&self) {
        // Cancel the child token (not the parent, so start() works again).
        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.tokens.shutdown().await;

        let removed = self
            .inner
            .reconciler
            .lock()
            .await
            .teardown(self.inner.registry.as_ref());

        self.inner.state.send_replace(BridgeState::Stopped);
        info!(removed, "bridge stopped");
    }

    // ── Polling ──────────────────────────────────────────────────

    /// One poll cycle: fetch with the current token and reconcile.
    ///
    /// A rejected token triggers a password grant and ends the cycle with
    /// [`PollOutcome::Reauthenticated`]. Any other fetch failure notifies
    /// the user and leaves the sensors untouched.
    pub async fn poll_once(&self) -> Result<PollOutcome, CoreError> {
        let mut reconciler = self.inner.reconciler.lock().await;

        // The session stays locked for the whole request.
        let stations = &self.inner.stations;
        let fetched = self
            .inner
            .tokens
            .with_token(|token| async move { stations.get_stations_data(&token).await })
            .await?;

        let response = match fetched {
            Ok(resp) => resp,
            Err(e) if e.is_auth_expired() => {
                info!(error = %e, "access token rejected, re-authenticating");
                self.inner.tokens.acquire().await?;
                return Ok(PollOutcome::Reauthenticated);
            }
            Err(e) => {
                warn!(error = %e, "station data fetch failed");
                self.notify_fetch_failure();
                return Err(e.into());
            }
        };

        let snapshot = Snapshot::from(response);
        let now = Utc::now();
        debug!(
            stations = snapshot.station_count(),
            modules = snapshot.module_count(),
            "station snapshot received"
        );

        let report = reconciler.reconcile(&snapshot, self.inner.registry.as_ref(), now);
        drop(reconciler);

        self.inner.last_poll.send_replace(Some(now));
        Ok(PollOutcome::Updated(report))
    }

    /// Authenticate (if needed) and return the token expiry.
    pub async fn authenticate(&self) -> Result<Option<DateTime<Utc>>, CoreError> {
        self.inner.tokens.access_token().await?;
        Ok(self.inner.tokens.session_expiry().await)
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<BridgeState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to the time of the last successful poll.
    pub fn last_poll(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_poll.subscribe()
    }

    /// Every sensor currently registered.
    pub fn sensors(&self) -> Vec<Arc<VirtualSensor>> {
        self.inner.registry.list()
    }

    fn notify_fetch_failure(&self) {
        let labels = &self.inner.config.presentation.labels;
        self.inner
            .notifier
            .notify(Notification::error(labels.err_fetch_data.as_str()));
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Poll on a fixed interval. The first tick is consumed because
/// [`Bridge::start`] already ran the initial cycle.
async fn poll_task(bridge: Bridge, period: std::time::Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match bridge.poll_once().await {
                    Ok(PollOutcome::Updated(report)) => {
                        debug!(updated = report.updated, skipped = report.skipped, "poll complete");
                    }
                    Ok(PollOutcome::Reauthenticated) => {
                        debug!("poll ended after re-authentication");
                    }
                    Err(e) => warn!(error = %e, "periodic poll failed"),
                }
            }
        }
    }
}
