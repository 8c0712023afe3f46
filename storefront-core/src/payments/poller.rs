//! Payment status polling.
//!
//! One session polls one payment reference on a fixed interval until the payment
//! settles, the reference expires locally or authorization is lost. Rate-limit
//! answers pause the session for the backend's retry-after hint; ticks that fall
//! inside the pause are skipped. Any other failure is logged and polling goes on.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{types::PaymentVerification, verify::PaymentVerifier};
use crate::{config::PollerConfig, error::ApiError};

/// Message handed to [`PaymentObserver::on_terminal_failure`] when authorization is lost.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Lifecycle of a polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Polling on every tick.
    Active,
    /// Backing off until `until` after a rate-limit answer.
    Paused {
        /// End of the pause.
        until: Instant,
    },
    /// The payment settled. Terminal.
    Succeeded,
    /// The reference expired before settling. Terminal.
    Expired,
    /// Authorization was lost. Terminal.
    TerminalFailure,
}

impl PollState {
    /// Whether no further ticks will happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Expired | Self::TerminalFailure)
    }
}

/// Receives the outcome of a polling session. Each method is called at most once
/// per session and never after the session was stopped.
pub trait PaymentObserver: Send + Sync {
    /// The payment settled.
    fn on_success(&self, verification: &PaymentVerification);

    /// Polling stopped for good; `message` is meant for the shopper.
    fn on_terminal_failure(&self, message: &str);

    /// The reference expired before the payment settled.
    fn on_expired(&self) {}
}

/// Converts a unix timestamp from the backend into a local deadline.
#[must_use]
pub fn deadline_from_unix(expires_at_unix: u64) -> Instant {
    let now_unix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let remaining = Duration::from_secs(expires_at_unix).saturating_sub(now_unix);
    Instant::now() + remaining
}

struct PollingSession {
    reference: String,
    state: watch::Receiver<PollState>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollingSession {
    fn cancel(&self) {
        // The flag is checked before every observer call; abort drops the pending timer.
        self.shutdown.send_replace(true);
        self.task.abort();
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Polls the verification endpoint for one payment reference at a time.
///
/// Dropping the poller stops the running session.
pub struct PaymentStatusPoller<V: PaymentVerifier> {
    verifier: Arc<V>,
    observer: Arc<dyn PaymentObserver>,
    config: PollerConfig,
    session: Option<PollingSession>,
}

impl<V: PaymentVerifier> std::fmt::Debug for PaymentStatusPoller<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentStatusPoller")
            .field("config", &self.config)
            .field("reference", &self.reference())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<V: PaymentVerifier> PaymentStatusPoller<V> {
    /// Creates an idle poller.
    #[must_use]
    pub fn new(
        verifier: Arc<V>,
        observer: Arc<dyn PaymentObserver>,
        config: PollerConfig,
    ) -> Self {
        Self {
            verifier,
            observer,
            config,
            session: None,
        }
    }

    /// Starts polling `reference`, replacing any session for another reference.
    ///
    /// Starting the reference that is already being polled keeps the running
    /// session. The first verification happens one interval after the start.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, reference: &str, expires_at: Option<Instant>) {
        if let Some(session) = &self.session {
            if session.reference == reference && !session.state.borrow().is_terminal() {
                return;
            }
        }
        self.stop();

        let (state_tx, state_rx) = watch::channel(PollState::Active);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_session(
            Arc::clone(&self.verifier),
            Arc::clone(&self.observer),
            reference.to_string(),
            expires_at,
            self.config.interval,
            state_tx,
            shutdown_rx,
        ));
        log::debug!("polling payment {reference}");

        self.session = Some(PollingSession {
            reference: reference.to_string(),
            state: state_rx,
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Stops the running session, if any. No tick fires afterwards.
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("stopped polling payment {}", session.reference);
        }
    }

    /// State of the running session, `None` when idle.
    #[must_use]
    pub fn state(&self) -> Option<PollState> {
        self.session.as_ref().map(|session| *session.state.borrow())
    }

    /// Reference being polled, `None` when idle.
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.reference.as_str())
    }

    /// A receiver following the state of the running session.
    #[must_use]
    pub fn subscribe(&self) -> Option<watch::Receiver<PollState>> {
        self.session.as_ref().map(|session| session.state.clone())
    }
}

async fn run_session<V: PaymentVerifier>(
    verifier: Arc<V>,
    observer: Arc<dyn PaymentObserver>,
    reference: String,
    expires_at: Option<Instant>,
    interval: Duration,
    state: watch::Sender<PollState>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            _ = ticker.tick() => {}
        }

        let now = Instant::now();
        if expires_at.is_some_and(|deadline| now >= deadline) {
            if *shutdown.borrow() {
                return;
            }
            log::info!("payment {reference} expired before settling");
            state.send_replace(PollState::Expired);
            observer.on_expired();
            return;
        }

        let current = *state.borrow();
        if let PollState::Paused { until } = current {
            if now < until {
                continue;
            }
            log::debug!("resuming payment polling for {reference}");
            state.send_replace(PollState::Active);
        }

        let outcome = tokio::select! {
            biased;
            _ = shutdown.changed() => return,
            outcome = verifier.verify(&reference) => outcome,
        };
        if *shutdown.borrow() {
            return;
        }

        match outcome {
            Ok(verification) if verification.is_paid => {
                log::info!("payment {reference} settled");
                state.send_replace(PollState::Succeeded);
                observer.on_success(&verification);
                return;
            }
            Ok(_) => {}
            Err(ApiError::RateLimited {
                retry_after_seconds,
            }) => {
                log::debug!("payment polling rate limited, pausing for {retry_after_seconds}s");
                state.send_replace(PollState::Paused {
                    until: Instant::now() + Duration::from_secs(retry_after_seconds),
                });
            }
            Err(ApiError::AuthExpired) => {
                log::warn!("authorization lost while polling payment {reference}");
                state.send_replace(PollState::TerminalFailure);
                observer.on_terminal_failure(SESSION_EXPIRED_MESSAGE);
                return;
            }
            Err(err) => {
                log::warn!("payment verification for {reference} failed: {err}");
            }
        }
    }
}
