//! Common test utilities shared across integration tests.
#![allow(dead_code, missing_docs)]

use std::sync::{Arc, Mutex};

use storefront_core::checkout::{CheckoutIntent, CheckoutItem};
use storefront_core::payments::PaymentVerification;
use storefront_core::{ClientConfig, PaymentObserver, RequestGateway};

/// Gateway against a mock server, without transport retries.
pub fn gateway(server: &mockito::Server) -> RequestGateway {
    let mut config = ClientConfig::new(&server.url()).unwrap();
    config.max_retries = 0;
    RequestGateway::new(config).unwrap()
}

/// Two merchants plus one item without merchant.
pub fn multi_merchant_intent() -> CheckoutIntent {
    CheckoutIntent {
        items: vec![
            CheckoutItem::new(Some("m2"), "p3", None, 1),
            CheckoutItem::new(None, "p4", None, 1),
            CheckoutItem::new(Some("m1"), "p1", Some("red"), 2),
            CheckoutItem::new(Some("m1"), "p2", None, 1),
        ],
        shipping_address_id: "address-1".to_string(),
        payment_method: "khqr".to_string(),
        coupon_code: None,
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub successes: Mutex<Vec<PaymentVerification>>,
    pub failures: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl PaymentObserver for RecordingObserver {
    fn on_success(&self, verification: &PaymentVerification) {
        self.successes.lock().unwrap().push(verification.clone());
    }

    fn on_terminal_failure(&self, message: &str) {
        self.failures.lock().unwrap().push(message.to_string());
    }
}
