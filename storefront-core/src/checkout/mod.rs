//! Checkout attempt tracking: fingerprints, attempt seeds, merchant grouping and
//! idempotent order submission.

mod attempt;
mod fingerprint;
mod grouping;
mod submit;
mod types;

pub use attempt::{
    AttemptRecord, CheckoutAttemptCoordinator, PreparedCheckout, SubOrder,
    ATTEMPT_STORAGE_KEY,
};
pub use fingerprint::{build_fingerprint, canonical_form, canonical_items, CheckoutFingerprint};
pub use grouping::{build_idempotency_key, group_by_merchant, MerchantGroup, UNKNOWN_MERCHANT};
pub use submit::{OrderSubmitter, SubmittedOrder, ORDERS_PATH};
pub use types::{CheckoutIntent, CheckoutItem};
