//! Single-flight credential refresh.
//!
//! At most one refresh is in flight per gateway. The first request that fails
//! authorization starts it on its own task; every request that fails while it runs
//! subscribes to the same outcome. Each finished refresh closes an episode: the
//! credential store is updated, the episode counter bumped and the in-flight slot
//! released under one lock before the outcome is published.
//!
//! Requests remember the episode they were sent in. A request whose authorization
//! failure surfaces after its episode already closed adopts that episode's outcome
//! instead of starting another refresh.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use tokio::sync::watch;

use super::{response::classify, GatewayInner};
use crate::error::ApiError;

pub(crate) type RefreshOutcome = Result<String, ApiError>;

type OutcomeReceiver = watch::Receiver<Option<RefreshOutcome>>;

/// Credential as observed when a request was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CredentialSnapshot {
    pub(crate) token: Option<String>,
    pub(crate) episode: u64,
}

#[derive(Debug, Default)]
struct RefreshState {
    in_flight: Option<OutcomeReceiver>,
    episode: u64,
    last_failure: Option<ApiError>,
}

/// Owned refresh state of one gateway.
#[derive(Debug, Default)]
pub(crate) struct RefreshSlot(Mutex<RefreshState>);

impl RefreshSlot {
    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    /// Frees the slot held by a refresh task that ended without an outcome.
    fn release_abandoned(&self, receiver: &OutcomeReceiver) {
        let mut state = self.lock();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|current| current.same_channel(receiver))
        {
            state.in_flight = None;
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshBody {
    #[serde(alias = "accessToken")]
    token: String,
}

impl GatewayInner {
    /// Reads the credential, first waiting out any pending refresh so a request
    /// never starts with a token that is about to be replaced.
    pub(crate) async fn snapshot(&self) -> CredentialSnapshot {
        loop {
            let mut receiver = {
                let state = self.refresh.lock();
                match &state.in_flight {
                    Some(receiver) => receiver.clone(),
                    None => {
                        return CredentialSnapshot {
                            token: self.credentials.get(),
                            episode: state.episode,
                        }
                    }
                }
            };
            // The outcome itself is read back from the store on the next iteration.
            if wait_outcome(&mut receiver).await.is_none() {
                self.refresh.release_abandoned(&receiver);
            }
        }
    }

    /// Returns a credential newer than the one used in episode `seen_episode`,
    /// refreshing if nobody else has.
    pub(crate) async fn refreshed_credential(
        self: &Arc<Self>,
        seen_episode: u64,
    ) -> RefreshOutcome {
        let mut receiver = {
            let mut state = self.refresh.lock();
            if let Some(receiver) = &state.in_flight {
                log::debug!("joining in-flight credential refresh");
                receiver.clone()
            } else if state.episode != seen_episode {
                return match &state.last_failure {
                    Some(err) => Err(err.clone()),
                    None => self.credentials.get().ok_or(ApiError::AuthExpired),
                };
            } else {
                let (sender, receiver) = watch::channel(None);
                state.in_flight = Some(receiver.clone());
                tokio::spawn(Arc::clone(self).run_refresh(sender));
                receiver
            }
        };

        if let Some(outcome) = wait_outcome(&mut receiver).await {
            return outcome;
        }
        self.refresh.release_abandoned(&receiver);
        Err(self.refresh_abandoned())
    }

    async fn run_refresh(self: Arc<Self>, sender: watch::Sender<Option<RefreshOutcome>>) {
        log::info!("refreshing access credential");
        let outcome =
            match tokio::time::timeout(self.config.refresh_timeout, self.call_refresh()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ApiError::NetworkOrServerError {
                    url: self.config.url(&self.config.refresh_path),
                    status: None,
                    error: format!(
                        "credential refresh timed out after {:?}",
                        self.config.refresh_timeout
                    ),
                }),
            };

        let outcome = {
            let mut state = self.refresh.lock();
            let outcome = match outcome {
                Ok(token) => {
                    self.credentials.set(&token);
                    log::info!("access credential refreshed");
                    Ok(token)
                }
                // No answer from the backend says nothing about the session, keep the token.
                Err(err @ ApiError::NetworkOrServerError { status: None, .. }) => {
                    log::warn!("credential refresh did not complete: {err}");
                    Err(err)
                }
                // Signed out: waiters must re-authenticate instead of retrying.
                Err(err) => {
                    self.credentials.clear();
                    log::warn!("credential refresh failed, signing out: {err}");
                    Err(ApiError::AuthExpired)
                }
            };
            state.episode += 1;
            state.last_failure = outcome.as_ref().err().cloned();
            state.in_flight = None;
            outcome
        };

        if sender.send(Some(outcome)).is_err() {
            log::debug!("credential refresh finished without waiters");
        }
    }

    async fn call_refresh(&self) -> RefreshOutcome {
        let url = self.config.url(&self.config.refresh_path);
        let response = self
            .http
            .handle(self.http.req(reqwest::Method::POST, &url))
            .await?;
        let response = classify(response).await?;
        let body: RefreshBody = serde_json::from_value(response.body).map_err(|err| {
            ApiError::NetworkOrServerError {
                url,
                status: Some(response.status),
                error: format!("invalid refresh response: {err}"),
            }
        })?;
        Ok(body.token)
    }

    fn refresh_abandoned(&self) -> ApiError {
        ApiError::NetworkOrServerError {
            url: self.config.url(&self.config.refresh_path),
            status: None,
            error: "credential refresh was abandoned".to_string(),
        }
    }
}

/// Waits for the published outcome. `None` if the refresh task went away without one.
async fn wait_outcome(receiver: &mut OutcomeReceiver) -> Option<RefreshOutcome> {
    receiver
        .wait_for(Option::is_some)
        .await
        .ok()
        .and_then(|outcome| outcome.clone())
}
