//! `storefront`: developer CLI around `storefront-core`.
//!
//! Every command works against one session file, so repeated `checkout` runs for
//! the same cart reuse their idempotency keys exactly like a browser session would.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use storefront_core::Environment;
use tracing_subscriber::EnvFilter;

/// Storefront client toolbox.
#[derive(Parser)]
#[command(name = "storefront", version, about = "Storefront checkout and payment toolbox")]
struct Cli {
    /// Backend base URL. Overrides `--environment`.
    #[arg(long, global = true, env = "STOREFRONT_BASE_URL")]
    base_url: Option<String>,

    /// Known deployment to talk to (staging or production)
    #[arg(
        long,
        visible_alias = "env",
        global = true,
        env = "STOREFRONT_ENVIRONMENT",
        default_value = "staging"
    )]
    environment: Environment,

    /// Bearer token to start the session with
    #[arg(long, global = true, env = "STOREFRONT_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Session file holding the active checkout attempt
    #[arg(long, global = true, env = "STOREFRONT_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical form, fingerprint and idempotency keys of a cart
    Fingerprint {
        /// Path to the checkout intent JSON
        #[arg(long)]
        cart: PathBuf,
    },

    /// Submit one order per merchant for a cart
    Checkout {
        /// Path to the checkout intent JSON
        #[arg(long)]
        cart: PathBuf,
        /// Only print the prepared sub-orders
        #[arg(long)]
        dry_run: bool,
    },

    /// Poll a payment reference until it settles
    Poll {
        /// Payment reference returned by the payment provider
        reference: String,
        /// Give up after this many seconds
        #[arg(long)]
        expires_in: Option<u64>,
        /// Milliseconds between two checks
        #[arg(long, default_value_t = 3000)]
        interval_ms: u64,
    },

    /// Forget the active checkout attempt
    Reset,
}

fn init_tracing() {
    // tracing-subscriber also captures the `log` records emitted by storefront-core.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let context = commands::Context::from_cli(&cli)?;

    match cli.command {
        Commands::Fingerprint { cart } => context.fingerprint(&cart),
        Commands::Checkout { cart, dry_run } => context.checkout(&cart, dry_run).await,
        Commands::Poll {
            reference,
            expires_in,
            interval_ms,
        } => context.poll(&reference, expires_in, interval_ms).await,
        Commands::Reset => context.reset(),
    }
}
