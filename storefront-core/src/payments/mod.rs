//! Payment verification and status polling.

mod poller;
mod types;
mod verify;

pub use poller::{
    deadline_from_unix, PaymentObserver, PaymentStatusPoller, PollState, SESSION_EXPIRED_MESSAGE,
};
pub use types::PaymentVerification;
pub use verify::{verify_path, PaymentVerifier};
