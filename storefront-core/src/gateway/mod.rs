//! Outbound request gateway: credential attachment and refresh-and-retry.

use std::sync::Arc;

pub use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::{
    config::ClientConfig,
    credential::CredentialStore,
    error::{ApiError, StorefrontError},
    http_request::Request,
};

mod refresh;
mod response;

pub use response::{ApiResponse, DEFAULT_RETRY_AFTER_SECONDS};

use refresh::{CredentialSnapshot, RefreshSlot};

/// Header carrying the idempotency key of a write request.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Describes one outbound call. Kept separate from the transport so that it can
/// be resubmitted after a credential refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    idempotency_key: Option<String>,
    authenticated: bool,
}

impl ApiRequest {
    /// An authenticated request for `path`, relative to the configured base URL.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            idempotency_key: None,
            authenticated: true,
        }
    }

    /// Shorthand for a `GET` request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds an extra header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `Idempotency-Key` header. `None` omits it.
    #[must_use]
    pub fn idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Sends the request without a credential. Authorization failures are returned as-is.
    #[must_use]
    pub const fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    /// The path this request targets.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Issues requests against the commerce backend.
///
/// Every authenticated request carries `Authorization: Bearer <token>`. When a
/// request fails with [`ApiError::AuthExpired`], the gateway refreshes the
/// credential once for all concurrently failing requests and retries each of them
/// exactly once with the new token. A failure of the refresh endpoint itself is
/// never answered with another refresh.
///
/// Cloning is cheap; clones share the credential store and the refresh state.
#[derive(Debug, Clone)]
pub struct RequestGateway {
    inner: Arc<GatewayInner>,
}

#[derive(Debug)]
pub(crate) struct GatewayInner {
    config: ClientConfig,
    http: Request,
    credentials: Arc<CredentialStore>,
    refresh: RefreshSlot,
}

impl RequestGateway {
    /// Creates a gateway with its own empty credential store.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, StorefrontError> {
        Self::with_credentials(config, Arc::new(CredentialStore::new()))
    }

    /// Creates a gateway that reads and updates an existing credential store.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_credentials(
        config: ClientConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, StorefrontError> {
        let http = Request::new(config.request_timeout, config.max_retries)?;
        Ok(Self {
            inner: Arc::new(GatewayInner {
                config,
                http,
                credentials,
                refresh: RefreshSlot::default(),
            }),
        })
    }

    /// The credential store shared by this gateway.
    #[must_use]
    pub fn credentials(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.inner.credentials)
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Stores the token obtained by a login flow.
    pub fn login(&self, token: &str) {
        self.inner.credentials.set(token);
    }

    /// Forgets the current token.
    pub fn logout(&self) {
        self.inner.credentials.clear();
    }

    /// Whether a credential refresh is currently running.
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_in_flight()
    }

    /// Sends a request, refreshing the credential and retrying once on an
    /// authorization failure.
    ///
    /// # Errors
    /// Returns the classified [`ApiError`] of the final attempt, or the refresh
    /// error when the shared refresh failed.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let snapshot = self.inner.snapshot().await;
        match self.inner.dispatch(request, snapshot.token.as_deref()).await {
            Err(ApiError::AuthExpired) if self.should_refresh(request, &snapshot) => {
                let token = self.inner.refreshed_credential(snapshot.episode).await?;
                log::debug!("retrying {} with refreshed credential", request.path);
                self.inner.dispatch(request, Some(&token)).await
            }
            other => other,
        }
    }

    /// Sends a request and decodes the JSON response body.
    ///
    /// # Errors
    /// Returns an error if the request fails or the body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, StorefrontError> {
        let response = self.send(request).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// A request sent without a credential (never signed in, or signed out by a
    /// failed refresh) is not refreshed; the caller has to sign in again.
    fn should_refresh(&self, request: &ApiRequest, snapshot: &CredentialSnapshot) -> bool {
        request.authenticated
            && snapshot.token.is_some()
            && !self.is_refresh_path(&request.path)
    }

    fn is_refresh_path(&self, path: &str) -> bool {
        normalized_path(path) == normalized_path(&self.inner.config.refresh_path)
    }
}

/// `/auth/refresh/?x=1` and `auth/refresh` address the same endpoint.
fn normalized_path(path: &str) -> &str {
    path.split(['?', '#'])
        .next()
        .unwrap_or(path)
        .trim_matches('/')
}

impl GatewayInner {
    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.config.url(&request.path);
        let mut builder = self.http.req(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if request.authenticated {
            if let Some(token) = token {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = self.http.handle(builder).await?;
        response::classify(response).await
    }
}
