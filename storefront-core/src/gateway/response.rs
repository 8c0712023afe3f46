//! Classification of backend responses into [`ApiError`] classes.

use reqwest::{header::RETRY_AFTER, Response};
use serde::Deserialize;

use crate::error::ApiError;

/// Used when a 429 carries no usable hint.
pub const DEFAULT_RETRY_AFTER_SECONDS: u64 = 5;

/// A successful backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx).
    pub status: u16,
    /// Decoded JSON body, `Null` when the body was empty.
    pub body: serde_json::Value,
}

/// Error metadata the backend attaches to failed responses, either at the top
/// level or nested under `error`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: Option<String>,
    #[serde(alias = "retryAfter")]
    retry_after_seconds: Option<u64>,
    error: Option<Box<ErrorBody>>,
}

impl ErrorBody {
    fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| self.error.as_ref().and_then(|inner| inner.message()))
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        self.retry_after_seconds.or_else(|| {
            self.error
                .as_ref()
                .and_then(|inner| inner.retry_after_seconds())
        })
    }
}

pub(crate) async fn classify(response: Response) -> Result<ApiResponse, ApiError> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let retry_after_header = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    let bytes = response
        .bytes()
        .await
        .map_err(|err| ApiError::NetworkOrServerError {
            url: url.clone(),
            status: Some(status),
            error: format!("failed to read response body: {err}"),
        })?;

    if (200..300).contains(&status) {
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|err| {
                ApiError::NetworkOrServerError {
                    url,
                    status: Some(status),
                    error: format!("invalid json body: {err}"),
                }
            })?
        };
        return Ok(ApiResponse { status, body });
    }

    let error_body: ErrorBody = serde_json::from_slice(&bytes).unwrap_or_default();
    Err(classify_failure(
        &url,
        status,
        retry_after_header,
        &error_body,
        &bytes,
    ))
}

fn classify_failure(
    url: &str,
    status: u16,
    retry_after_header: Option<u64>,
    body: &ErrorBody,
    raw: &[u8],
) -> ApiError {
    match status {
        401 => ApiError::AuthExpired,
        404 => ApiError::NotFound,
        429 => ApiError::RateLimited {
            retry_after_seconds: retry_after_header
                .or_else(|| body.retry_after_seconds())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS),
        },
        400 | 409 | 422 => ApiError::ValidationFailed {
            message: body
                .message()
                .map_or_else(|| format!("request rejected with status {status}"), str::to_string),
        },
        _ => ApiError::NetworkOrServerError {
            url: url.to_string(),
            status: Some(status),
            error: body.message().map_or_else(
                || String::from_utf8_lossy(raw).into_owned(),
                str::to_string,
            ),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ErrorBody {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_retry_after_header_wins_over_body() {
        let err = classify_failure(
            "https://shop.example/x",
            429,
            Some(7),
            &body(r#"{"retryAfterSeconds": 2}"#),
            b"",
        );
        assert_eq!(
            err,
            ApiError::RateLimited {
                retry_after_seconds: 7
            }
        );
    }

    #[test]
    fn test_retry_after_from_nested_body() {
        let err = classify_failure(
            "https://shop.example/x",
            429,
            None,
            &body(r#"{"error": {"code": "RATE_LIMITED", "retryAfter": 2}}"#),
            b"",
        );
        assert_eq!(
            err,
            ApiError::RateLimited {
                retry_after_seconds: 2
            }
        );
    }

    #[test]
    fn test_retry_after_defaults() {
        let err = classify_failure("u", 429, None, &ErrorBody::default(), b"");
        assert_eq!(
            err,
            ApiError::RateLimited {
                retry_after_seconds: DEFAULT_RETRY_AFTER_SECONDS
            }
        );
    }

    #[test]
    fn test_status_classes() {
        let empty = ErrorBody::default();
        assert_eq!(classify_failure("u", 401, None, &empty, b""), ApiError::AuthExpired);
        assert_eq!(classify_failure("u", 404, None, &empty, b""), ApiError::NotFound);
        assert_eq!(
            classify_failure("u", 422, None, &body(r#"{"message": "coupon expired"}"#), b""),
            ApiError::ValidationFailed {
                message: "coupon expired".to_string()
            }
        );
        assert_eq!(
            classify_failure("u", 418, None, &empty, b"teapot"),
            ApiError::NetworkOrServerError {
                url: "u".to_string(),
                status: Some(418),
                error: "teapot".to_string(),
            }
        );
    }
}
