use std::sync::{Arc, Mutex};

use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{
    fingerprint::{build_fingerprint, CheckoutFingerprint},
    grouping::{build_idempotency_key, group_by_merchant, UNKNOWN_MERCHANT},
    types::{CheckoutIntent, CheckoutItem},
};
use crate::{
    error::StorefrontError,
    storage::{SessionStore, StorageError},
};

/// Session store key holding the active [`AttemptRecord`].
pub const ATTEMPT_STORAGE_KEY: &str = "storefront.checkout.attempt";

/// The one checkout attempt tracked per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Fingerprint of the intent this attempt belongs to.
    pub fingerprint: CheckoutFingerprint,
    /// Random seed all idempotency keys of the attempt derive from.
    pub seed: String,
}

/// A merchant sub-order ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubOrder {
    /// Merchant key of the group.
    pub merchant_key: String,
    /// Position of the group in the deterministic group order.
    pub group_index: usize,
    /// Value of the `Idempotency-Key` header for this sub-order.
    pub idempotency_key: String,
    /// Normalized items in canonical order.
    pub items: Vec<CheckoutItem>,
}

/// Output of [`CheckoutAttemptCoordinator::prepare`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedCheckout {
    /// Fingerprint of the intent.
    pub fingerprint: CheckoutFingerprint,
    /// One entry per merchant group.
    pub sub_orders: Vec<SubOrder>,
}

/// Turns a checkout intent into reproducible per-merchant idempotency keys.
///
/// Resubmitting the same intent (after a network retry or a reload within the
/// session) yields the same keys. A different intent rotates the seed and with it
/// every key. Only one attempt is tracked at a time.
pub struct CheckoutAttemptCoordinator {
    store: Arc<dyn SessionStore>,
    // Read-compare-write of the attempt record must not interleave.
    lock: Mutex<()>,
}

impl std::fmt::Debug for CheckoutAttemptCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutAttemptCoordinator").finish()
    }
}

impl CheckoutAttemptCoordinator {
    /// Creates a coordinator persisting its attempt record in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    /// See [`build_fingerprint`].
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn build_fingerprint(&self, intent: &CheckoutIntent) -> CheckoutFingerprint {
        build_fingerprint(intent)
    }

    /// Returns the seed of the attempt identified by `fingerprint`.
    ///
    /// The stored seed is reused while the fingerprint is unchanged; any other
    /// fingerprint replaces the record with a freshly generated seed.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub fn get_or_create_seed(
        &self,
        fingerprint: &CheckoutFingerprint,
    ) -> Result<String, StorefrontError> {
        let _guard = self.lock.lock().map_err(|_| {
            StorageError::Lock("checkout attempt mutex poisoned".to_string())
        })?;

        if let Some(record) = self.load()? {
            if &record.fingerprint == fingerprint {
                return Ok(record.seed);
            }
            log::debug!("checkout intent changed, rotating attempt seed");
        }

        let record = AttemptRecord {
            fingerprint: fingerprint.clone(),
            seed: generate_seed(),
        };
        self.store
            .set(ATTEMPT_STORAGE_KEY, &serde_json::to_string(&record)?)?;
        Ok(record.seed)
    }

    /// Forgets the tracked attempt, so the next checkout gets a fresh seed even
    /// for an identical cart.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub fn clear_seed(&self) -> Result<(), StorefrontError> {
        let _guard = self.lock.lock().map_err(|_| {
            StorageError::Lock("checkout attempt mutex poisoned".to_string())
        })?;
        self.store.remove(ATTEMPT_STORAGE_KEY)?;
        Ok(())
    }

    /// The currently tracked attempt, if any.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub fn current_attempt(&self) -> Result<Option<AttemptRecord>, StorefrontError> {
        self.load()
    }

    /// Fingerprints the intent, obtains its seed and derives one sub-order per
    /// merchant group.
    ///
    /// # Errors
    /// Returns an error if the cart is empty, a quantity is zero, or the session
    /// store fails.
    pub fn prepare(&self, intent: &CheckoutIntent) -> Result<PreparedCheckout, StorefrontError> {
        validate(intent)?;
        let fingerprint = build_fingerprint(intent);
        let seed = self.get_or_create_seed(&fingerprint)?;

        let sub_orders = group_by_merchant(&intent.items)
            .into_iter()
            .enumerate()
            .map(|(group_index, group)| SubOrder {
                merchant_key: group.merchant_key,
                group_index,
                idempotency_key: build_idempotency_key(&seed, group_index),
                items: group.items,
            })
            .collect();

        Ok(PreparedCheckout {
            fingerprint,
            sub_orders,
        })
    }

    fn load(&self) -> Result<Option<AttemptRecord>, StorefrontError> {
        let Some(raw) = self.store.get(ATTEMPT_STORAGE_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                log::warn!("discarding unreadable checkout attempt record: {err}");
                Ok(None)
            }
        }
    }
}

fn validate(intent: &CheckoutIntent) -> Result<(), StorefrontError> {
    if intent.items.is_empty() {
        return Err(StorefrontError::InvalidInput {
            attribute: "items".to_string(),
            reason: "cart is empty".to_string(),
        });
    }
    if let Some(item) = intent.items.iter().find(|item| item.quantity == 0) {
        return Err(StorefrontError::InvalidInput {
            attribute: "quantity".to_string(),
            reason: format!("product {} has quantity 0", item.product_id),
        });
    }
    if intent
        .items
        .iter()
        .any(|item| item.merchant_id.as_deref().map(str::trim) == Some(UNKNOWN_MERCHANT))
    {
        return Err(StorefrontError::InvalidInput {
            attribute: "merchant_id".to_string(),
            reason: format!("{UNKNOWN_MERCHANT} is reserved for items without a merchant"),
        });
    }
    Ok(())
}

/// 128 bits from the OS generator, hex encoded.
fn generate_seed() -> String {
    let mut seed = [0u8; 16];
    OsRng.fill_bytes(&mut seed);
    hex::encode(seed)
}
