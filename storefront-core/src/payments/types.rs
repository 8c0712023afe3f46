use serde::{Deserialize, Serialize};

/// Settlement status of a payment reference as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerification {
    /// Whether the payment has settled.
    pub is_paid: bool,
    /// Currency of the payment.
    #[serde(default)]
    pub currency: Option<String>,
    /// Human readable status message.
    #[serde(default)]
    pub message: Option<String>,
}

/// The verification endpoint answers either with the bare status or wrapped in
/// the standard `data` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum VerificationEnvelope {
    Wrapped { data: PaymentVerification },
    Bare(PaymentVerification),
}

impl VerificationEnvelope {
    pub(crate) fn into_inner(self) -> PaymentVerification {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}
