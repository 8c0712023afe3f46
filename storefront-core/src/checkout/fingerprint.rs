//! Canonical fingerprint of a checkout intent.
//!
//! The canonical form is a JSON document with sorted object keys and items in
//! canonical order, so two intents that differ only in the order of their cart
//! lines share a fingerprint. Payment method and coupon code are compared
//! case-insensitively.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::types::{CheckoutIntent, CheckoutItem};

const FINGERPRINT_VERSION: &str = "v1";

/// Stable identifier of a checkout intent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckoutFingerprint(String);

impl CheckoutFingerprint {
    /// The fingerprint as stored and compared.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckoutFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Items normalized and sorted in canonical order.
#[must_use]
pub fn canonical_items(items: &[CheckoutItem]) -> Vec<CheckoutItem> {
    let mut items: Vec<_> = items.iter().map(CheckoutItem::normalized).collect();
    items.sort_by(CheckoutItem::canonical_cmp);
    items
}

/// Canonical string representation of an intent.
#[must_use]
pub fn canonical_form(intent: &CheckoutIntent) -> String {
    let items: Vec<_> = canonical_items(&intent.items)
        .iter()
        .map(|item| {
            json!({
                "merchantId": item.merchant(),
                "productId": item.product_id,
                "quantity": item.quantity,
                "variantId": item.variant(),
            })
        })
        .collect();

    // Keys are listed in sorted order so the output does not depend on whether
    // serde_json preserves insertion order.
    json!({
        "couponCode": normalize_code(intent.coupon_code.as_deref().unwrap_or_default()),
        "items": items,
        "paymentMethod": normalize_code(&intent.payment_method),
        "shippingAddressId": intent.shipping_address_id.trim(),
    })
    .to_string()
}

/// Derives the fingerprint of an intent: a versioned SHA-256 of its canonical form.
#[must_use]
pub fn build_fingerprint(intent: &CheckoutIntent) -> CheckoutFingerprint {
    let digest = Sha256::digest(canonical_form(intent).as_bytes());
    CheckoutFingerprint(format!("{FINGERPRINT_VERSION}:{}", hex::encode(digest)))
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn intent() -> CheckoutIntent {
        CheckoutIntent {
            items: vec![
                CheckoutItem::new(Some("m2"), "p2", Some("v2"), 1),
                CheckoutItem::new(Some("m1"), "p1", Some("v1"), 2),
            ],
            shipping_address_id: "address-1".to_string(),
            payment_method: "KHQR".to_string(),
            coupon_code: Some("SAVE10".to_string()),
        }
    }

    #[test]
    fn test_item_order_does_not_matter() {
        let mut reordered = intent();
        reordered.items.reverse();
        assert_eq!(build_fingerprint(&intent()), build_fingerprint(&reordered));
    }

    #[test]
    fn test_codes_are_case_and_whitespace_insensitive() {
        let mut loose = intent();
        loose.payment_method = " khqr".to_string();
        loose.coupon_code = Some("save10 ".to_string());
        loose.items[0].merchant_id = Some(" m2 ".to_string());
        assert_eq!(build_fingerprint(&intent()), build_fingerprint(&loose));
    }

    #[test]
    fn test_missing_and_blank_optionals_match() {
        let mut a = intent();
        a.coupon_code = None;
        a.items[0].variant_id = None;
        let mut b = intent();
        b.coupon_code = Some(String::new());
        b.items[0].variant_id = Some("  ".to_string());
        assert_eq!(build_fingerprint(&a), build_fingerprint(&b));
    }

    #[test_case(|i: &mut CheckoutIntent| i.coupon_code = Some("SAVE15".to_string()) ; "coupon")]
    #[test_case(|i: &mut CheckoutIntent| i.coupon_code = None ; "coupon removed")]
    #[test_case(|i: &mut CheckoutIntent| i.shipping_address_id = "address-2".to_string() ; "address")]
    #[test_case(|i: &mut CheckoutIntent| i.payment_method = "CARD".to_string() ; "payment method")]
    #[test_case(|i: &mut CheckoutIntent| i.items[0].quantity = 3 ; "quantity")]
    #[test_case(|i: &mut CheckoutIntent| i.items[1].merchant_id = Some("m3".to_string()) ; "merchant")]
    #[test_case(|i: &mut CheckoutIntent| { i.items.pop(); } ; "item removed")]
    fn test_semantic_change_alters_fingerprint(change: fn(&mut CheckoutIntent)) {
        let mut changed = intent();
        change(&mut changed);
        assert_ne!(build_fingerprint(&intent()), build_fingerprint(&changed));
    }

    #[test]
    fn test_canonical_form_shape() {
        let form = canonical_form(&intent());
        assert_eq!(
            form,
            r#"{"couponCode":"SAVE10","items":[{"merchantId":"m1","productId":"p1","quantity":2,"variantId":"v1"},{"merchantId":"m2","productId":"p2","quantity":1,"variantId":"v2"}],"paymentMethod":"KHQR","shippingAddressId":"address-1"}"#
        );
        assert!(build_fingerprint(&intent()).as_str().starts_with("v1:"));
        assert_eq!(build_fingerprint(&intent()).as_str().len(), 3 + 64);
    }
}
