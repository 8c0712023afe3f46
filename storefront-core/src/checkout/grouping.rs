//! Deterministic partition of a cart into per-merchant sub-orders.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{fingerprint::canonical_items, types::CheckoutItem};

/// Merchant key of items that carry no merchant id.
pub const UNKNOWN_MERCHANT: &str = "unknown-merchant";

/// Cart lines of one merchant, submitted as one sub-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantGroup {
    /// Merchant id, or [`UNKNOWN_MERCHANT`].
    pub merchant_key: String,
    /// Normalized items in canonical order.
    pub items: Vec<CheckoutItem>,
}

/// Groups items by merchant.
///
/// Groups come out sorted by merchant key and items within a group in canonical
/// order, so the index of a group only depends on the composition of the cart.
/// Identical products of different merchants stay in separate groups.
#[must_use]
pub fn group_by_merchant(items: &[CheckoutItem]) -> Vec<MerchantGroup> {
    let mut groups: BTreeMap<String, Vec<CheckoutItem>> = BTreeMap::new();
    // Canonical order is preserved within each bucket.
    for item in canonical_items(items) {
        let key = item
            .merchant_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_MERCHANT.to_string());
        groups.entry(key).or_default().push(item);
    }

    groups
        .into_iter()
        .map(|(merchant_key, items)| MerchantGroup {
            merchant_key,
            items,
        })
        .collect()
}

/// Idempotency key of the sub-order at `group_index` within the attempt `seed`.
#[must_use]
pub fn build_idempotency_key(seed: &str, group_index: usize) -> String {
    format!("{seed}:{group_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> Vec<CheckoutItem> {
        vec![
            CheckoutItem::new(Some("m2"), "p3", Some("v2"), 1),
            CheckoutItem::new(Some("m1"), "p2", Some("v1"), 1),
            CheckoutItem::new(None, "p1", Some("v3"), 1),
            CheckoutItem::new(Some("m1"), "p1", Some("v1"), 1),
        ]
    }

    #[test]
    fn test_groups_sorted_by_merchant_key() {
        let groups = group_by_merchant(&cart());

        let keys: Vec<_> = groups.iter().map(|g| g.merchant_key.as_str()).collect();
        assert_eq!(keys, ["m1", "m2", UNKNOWN_MERCHANT]);

        let m1: Vec<_> = groups[0]
            .items
            .iter()
            .map(|i| format!("{}:{}", i.product_id, i.variant()))
            .collect();
        assert_eq!(m1, ["p1:v1", "p2:v1"]);
        assert_eq!(groups[2].items[0].merchant_id, None);
    }

    #[test]
    fn test_grouping_is_stable_under_reordering() {
        let mut reordered = cart();
        reordered.rotate_left(2);
        reordered.swap(0, 1);
        assert_eq!(group_by_merchant(&cart()), group_by_merchant(&reordered));
    }

    #[test]
    fn test_same_product_of_two_merchants_is_not_merged() {
        let items = vec![
            CheckoutItem::new(Some("m2"), "p1", Some("v1"), 1),
            CheckoutItem::new(Some("m1"), "p1", Some("v1"), 1),
        ];
        let groups = group_by_merchant(&items);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].items.len(), 1);
        assert_eq!(groups[1].items.len(), 1);
    }

    #[test]
    fn test_blank_merchant_uses_sentinel() {
        let groups = group_by_merchant(&[CheckoutItem::new(Some(" "), "p1", None, 1)]);
        assert_eq!(groups[0].merchant_key, UNKNOWN_MERCHANT);
    }

    #[test]
    fn test_build_idempotency_key() {
        assert_eq!(build_idempotency_key("attempt-seed", 3), "attempt-seed:3");
        assert_eq!(
            build_idempotency_key("attempt-seed", 3),
            build_idempotency_key("attempt-seed", 3)
        );
    }

    #[test]
    fn test_empty_cart_has_no_groups() {
        assert!(group_by_merchant(&[]).is_empty());
    }
}
