#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

//! `storefront-core` is the client-side reliability layer of a storefront.
//!
//! It covers three concerns that every checkout flow gets wrong eventually:
//!
//! - [`RequestGateway`]: attaches the bearer credential to outbound requests and,
//!   when the backend reports it expired, refreshes it once for all concurrently
//!   failing requests before retrying each of them exactly once.
//! - [`checkout`]: derives a stable fingerprint from the cart, keeps one attempt
//!   seed per fingerprint in session storage and submits one order per merchant
//!   with a deterministic idempotency key, so retries never duplicate orders.
//! - [`payments`]: polls the verification endpoint for a payment reference,
//!   backing off on rate limits and stopping on success, expiry or lost
//!   authorization.

mod config;
pub use config::{ClientConfig, Environment, PollerConfig, DEFAULT_REFRESH_PATH};

mod credential;
pub use credential::CredentialStore;

mod error;
pub use error::{ApiError, StorefrontError};

mod gateway;
pub use gateway::{
    ApiRequest, ApiResponse, Method, RequestGateway, DEFAULT_RETRY_AFTER_SECONDS,
    IDEMPOTENCY_KEY_HEADER,
};

pub mod checkout;
pub use checkout::{CheckoutAttemptCoordinator, OrderSubmitter};

pub mod payments;
pub use payments::{PaymentObserver, PaymentStatusPoller, PaymentVerifier};

pub mod storage;

pub mod logger;

// private modules
mod http_request;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("storefront_core");
