use std::future::Future;

use super::types::{PaymentVerification, VerificationEnvelope};
use crate::{
    error::ApiError,
    gateway::{ApiRequest, RequestGateway},
};

/// Checks the settlement status of one payment reference.
pub trait PaymentVerifier: Send + Sync + 'static {
    /// Asks the backend whether `reference` has been paid.
    fn verify(
        &self,
        reference: &str,
    ) -> impl Future<Output = Result<PaymentVerification, ApiError>> + Send;
}

/// Path of the verification endpoint for `reference`.
#[must_use]
pub fn verify_path(reference: &str) -> String {
    format!("/payments/verify/md5/{reference}")
}

impl PaymentVerifier for RequestGateway {
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, ApiError> {
        if reference.is_empty()
            || !reference
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApiError::ValidationFailed {
                message: format!("invalid payment reference {reference:?}"),
            });
        }

        let request = ApiRequest::post(verify_path(reference));
        let response = self.send(&request).await?;
        serde_json::from_value::<VerificationEnvelope>(response.body)
            .map(VerificationEnvelope::into_inner)
            .map_err(|err| ApiError::NetworkOrServerError {
                url: self.config().url(request.path()),
                status: Some(response.status),
                error: format!("invalid verification response: {err}"),
            })
    }
}
