use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::{bail, eyre, WrapErr};
use storefront_core::checkout::{canonical_form, CheckoutIntent};
use storefront_core::payments::{PaymentVerification, PollState};
use storefront_core::storage::FileSessionStore;
use storefront_core::{
    CheckoutAttemptCoordinator, ClientConfig, OrderSubmitter, PaymentObserver,
    PaymentStatusPoller, PollerConfig, RequestGateway,
};

use crate::Cli;

const SESSION_FILE_NAME: &str = "session.json";

pub struct Context {
    gateway: RequestGateway,
    coordinator: Arc<CheckoutAttemptCoordinator>,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> eyre::Result<Self> {
        let config = match &cli.base_url {
            Some(base_url) => ClientConfig::new(base_url)?,
            None => ClientConfig::from_environment(&cli.environment),
        };
        let gateway = RequestGateway::new(config)?;
        if let Some(token) = &cli.token {
            gateway.login(token);
        }

        let session_file = match &cli.session_file {
            Some(path) => path.clone(),
            None => default_session_file()?,
        };
        let store = FileSessionStore::open(&session_file)
            .wrap_err_with(|| format!("failed to open {}", session_file.display()))?;
        tracing::debug!(path = %session_file.display(), "using session file");

        Ok(Self {
            gateway,
            coordinator: Arc::new(CheckoutAttemptCoordinator::new(Arc::new(store))),
        })
    }

    pub async fn checkout(&self, cart: &Path, dry_run: bool) -> eyre::Result<()> {
        let intent = read_cart(cart)?;
        if dry_run {
            let prepared = self.coordinator.prepare(&intent)?;
            println!("{}", serde_json::to_string_pretty(&prepared)?);
            return Ok(());
        }

        let submitter = OrderSubmitter::new(self.gateway.clone(), Arc::clone(&self.coordinator));
        let orders = submitter
            .submit(&intent)
            .await
            .wrap_err("checkout failed; rerun to retry with the same idempotency keys")?;
        tracing::info!(orders = orders.len(), "checkout submitted");
        println!("{}", serde_json::to_string_pretty(&orders)?);
        Ok(())
    }

    pub async fn poll(
        &self,
        reference: &str,
        expires_in: Option<u64>,
        interval_ms: u64,
    ) -> eyre::Result<()> {
        let config = PollerConfig {
            interval: Duration::from_millis(interval_ms),
        };
        let mut poller = PaymentStatusPoller::new(
            Arc::new(self.gateway.clone()),
            Arc::new(PrintingObserver),
            config,
        );
        let expires_at =
            expires_in.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

        poller.start(reference, expires_at);
        let mut state = poller
            .subscribe()
            .ok_or_else(|| eyre!("polling session did not start"))?;
        let outcome = *state.wait_for(PollState::is_terminal).await?;

        match outcome {
            PollState::Succeeded => Ok(()),
            PollState::Expired => bail!("payment {reference} expired before settling"),
            _ => bail!("polling payment {reference} stopped"),
        }
    }

    pub fn fingerprint(&self, cart: &Path) -> eyre::Result<()> {
        let intent = read_cart(cart)?;
        println!("{}", canonical_form(&intent));
        let prepared = self.coordinator.prepare(&intent)?;
        println!("{}", serde_json::to_string_pretty(&prepared)?);
        Ok(())
    }

    pub fn reset(&self) -> eyre::Result<()> {
        self.coordinator.clear_seed()?;
        tracing::info!("checkout attempt cleared");
        Ok(())
    }
}

struct PrintingObserver;

impl PaymentObserver for PrintingObserver {
    fn on_success(&self, verification: &PaymentVerification) {
        tracing::info!(
            currency = verification.currency.as_deref().unwrap_or("-"),
            "payment settled"
        );
        if let Some(message) = &verification.message {
            println!("{message}");
        }
    }

    fn on_terminal_failure(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn on_expired(&self) {
        tracing::warn!("payment reference expired");
    }
}

fn read_cart(path: &Path) -> eyre::Result<CheckoutIntent> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).wrap_err_with(|| format!("invalid cart in {}", path.display()))
}

fn default_session_file() -> eyre::Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| eyre!("no local data directory"))?;
    Ok(base.join("storefront").join(SESSION_FILE_NAME))
}
