use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use super::{
    attempt::{CheckoutAttemptCoordinator, PreparedCheckout, SubOrder},
    grouping::UNKNOWN_MERCHANT,
    types::CheckoutIntent,
};
use crate::{
    error::StorefrontError,
    gateway::{ApiRequest, RequestGateway},
};

/// Path of the order submission endpoint.
pub const ORDERS_PATH: &str = "/orders";

/// Backend answer for one submitted sub-order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedOrder {
    /// Merchant key of the sub-order.
    pub merchant_key: String,
    /// Key the sub-order was submitted with.
    pub idempotency_key: String,
    /// Response body of the order endpoint.
    pub response: serde_json::Value,
}

/// Submits the merchant sub-orders of a checkout, one request per group.
///
/// Each request carries the `Idempotency-Key` derived for its group, so a retry of
/// the same intent is deduplicated by the backend. The attempt is cleared once
/// every sub-order went through; after a failure it is kept so the retry reuses
/// the keys.
#[derive(Debug, Clone)]
pub struct OrderSubmitter {
    gateway: RequestGateway,
    coordinator: Arc<CheckoutAttemptCoordinator>,
}

impl OrderSubmitter {
    /// Creates a submitter.
    #[must_use]
    pub const fn new(
        gateway: RequestGateway,
        coordinator: Arc<CheckoutAttemptCoordinator>,
    ) -> Self {
        Self {
            gateway,
            coordinator,
        }
    }

    /// Prepares and submits every sub-order of `intent`, in group order.
    ///
    /// # Errors
    /// Stops at the first failing sub-order and returns its error. Transient
    /// failures are surfaced as well; retrying is the caller's decision.
    pub async fn submit(
        &self,
        intent: &CheckoutIntent,
    ) -> Result<Vec<SubmittedOrder>, StorefrontError> {
        let prepared = self.coordinator.prepare(intent)?;
        let orders = self.submit_prepared(intent, &prepared).await?;
        self.complete()?;
        Ok(orders)
    }

    /// Submits already prepared sub-orders without touching the attempt record.
    ///
    /// # Errors
    /// Stops at the first failing sub-order and returns its error.
    pub async fn submit_prepared(
        &self,
        intent: &CheckoutIntent,
        prepared: &PreparedCheckout,
    ) -> Result<Vec<SubmittedOrder>, StorefrontError> {
        let mut orders = Vec::with_capacity(prepared.sub_orders.len());
        for sub_order in &prepared.sub_orders {
            log::debug!(
                "submitting sub-order {} of {} for merchant {}",
                sub_order.group_index + 1,
                prepared.sub_orders.len(),
                sub_order.merchant_key
            );
            let response = self
                .gateway
                .send(&order_request(intent, sub_order))
                .await?;
            orders.push(SubmittedOrder {
                merchant_key: sub_order.merchant_key.clone(),
                idempotency_key: sub_order.idempotency_key.clone(),
                response: response.body,
            });
        }
        Ok(orders)
    }

    /// Marks the checkout as done.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub fn complete(&self) -> Result<(), StorefrontError> {
        self.coordinator.clear_seed()
    }

    /// Drops the checkout attempt, e.g. when the shopper leaves the checkout.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub fn abandon(&self) -> Result<(), StorefrontError> {
        log::debug!("checkout attempt abandoned");
        self.coordinator.clear_seed()
    }
}

fn order_request(intent: &CheckoutIntent, sub_order: &SubOrder) -> ApiRequest {
    let merchant_id =
        (sub_order.merchant_key != UNKNOWN_MERCHANT).then_some(sub_order.merchant_key.as_str());
    let items: Vec<_> = sub_order
        .items
        .iter()
        .map(|item| {
            json!({
                "productId": item.product_id,
                "variantId": item.variant_id,
                "quantity": item.quantity,
            })
        })
        .collect();

    ApiRequest::post(ORDERS_PATH)
        .json(json!({
            "merchantId": merchant_id,
            "items": items,
            "shippingAddressId": intent.shipping_address_id.trim(),
            "paymentMethod": intent.payment_method.trim().to_uppercase(),
            "couponCode": intent
                .coupon_code
                .as_deref()
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_uppercase),
        }))
        .idempotency_key(Some(sub_order.idempotency_key.clone()))
}
