use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One cart line as submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    /// Merchant selling the item. `None` for items without a known merchant.
    #[serde(default)]
    pub merchant_id: Option<String>,
    /// Product identifier.
    pub product_id: String,
    /// Variant identifier, if the product has variants.
    #[serde(default)]
    pub variant_id: Option<String>,
    /// Number of units.
    pub quantity: u32,
}

impl CheckoutItem {
    /// Creates an item.
    #[must_use]
    pub fn new(
        merchant_id: Option<&str>,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: u32,
    ) -> Self {
        Self {
            merchant_id: merchant_id.map(str::to_string),
            product_id: product_id.to_string(),
            variant_id: variant_id.map(str::to_string),
            quantity,
        }
    }

    /// Trims identifiers and folds blank merchant/variant ids into `None`.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            merchant_id: non_blank(self.merchant_id.as_deref()),
            product_id: self.product_id.trim().to_string(),
            variant_id: non_blank(self.variant_id.as_deref()),
            quantity: self.quantity,
        }
    }

    /// Merchant id, empty when absent.
    #[must_use]
    pub fn merchant(&self) -> &str {
        self.merchant_id.as_deref().unwrap_or_default()
    }

    /// Variant id, empty when absent.
    #[must_use]
    pub fn variant(&self) -> &str {
        self.variant_id.as_deref().unwrap_or_default()
    }

    /// The total order used for fingerprinting and grouping:
    /// merchant, then product, then variant, then quantity.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.merchant()
            .cmp(other.merchant())
            .then_with(|| self.product_id.cmp(&other.product_id))
            .then_with(|| self.variant().cmp(other.variant()))
            .then_with(|| self.quantity.cmp(&other.quantity))
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Everything that identifies one checkout intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntent {
    /// Cart lines, in any order.
    pub items: Vec<CheckoutItem>,
    /// Selected shipping address.
    pub shipping_address_id: String,
    /// Selected payment method code, e.g. `KHQR`.
    pub payment_method: String,
    /// Applied coupon code, if any.
    #[serde(default)]
    pub coupon_code: Option<String>,
}
