//! HTTP-layer error types.
//!
//! Most failures never become an `Err` here: throttled responses are retried,
//! transport failures and malformed bodies become degenerate responses, and
//! application errors come back as ordinary responses. What is left:
//!
//! - [`InvalidHttpRequestError`]: a request failed validation before sending
//! - [`ThrottleRetriesExceededError`]: an opt-in throttle retry cap ran out
//! - [`TransportError`]: the wire failed (only seen by [`Transport`](crate::clients::Transport) implementors)
//! - [`HttpError`]: unified error returned by [`HttpClient`](crate::clients::HttpClient)

use thiserror::Error;

/// Error returned when an HTTP request fails validation.
///
/// # Example
///
/// ```rust
/// use shopify_gateway::clients::InvalidHttpRequestError;
///
/// let error = InvalidHttpRequestError::MissingBody {
///     method: "post".to_string(),
/// };
///
/// assert_eq!(error.to_string(), "Cannot use post without specifying data.");
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidHttpRequestError {
    /// A request body was provided without specifying the body type.
    #[error("Cannot set a body without also setting body_type.")]
    MissingBodyType,

    /// A POST or PUT request was made without a body.
    #[error("Cannot use {method} without specifying data.")]
    MissingBody {
        /// The HTTP method that requires a body.
        method: String,
    },

    /// The request path was empty after normalization.
    #[error("Request path cannot be empty.")]
    EmptyPath,
}

/// Error returned when a request stayed throttled through every allowed retry.
///
/// Only produced when `max_throttle_retries` is configured; by default the
/// gateway retries throttled requests indefinitely.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Request to {path} still throttled after {retries} retries (last status {status}).")]
pub struct ThrottleRetriesExceededError {
    /// Path of the throttled request.
    pub path: String,
    /// Number of retries made.
    pub retries: u32,
    /// Status of the last throttled response.
    pub status: u16,
}

/// Failure reported by a [`Transport`](crate::clients::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The reqwest client failed to send or read the request.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Any other transport failure, described in text.
    #[error("Transport error: {0}")]
    Other(String),
}

/// Unified error type for the HTTP layer.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request validation failed.
    #[error(transparent)]
    InvalidRequest(#[from] InvalidHttpRequestError),

    /// The throttle retry cap ran out.
    #[error(transparent)]
    ThrottleRetries(#[from] ThrottleRetriesExceededError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_error_missing_body_type() {
        let error = InvalidHttpRequestError::MissingBodyType;
        assert_eq!(
            error.to_string(),
            "Cannot set a body without also setting body_type."
        );
    }

    #[test]
    fn test_throttle_retries_error_names_path_and_count() {
        let error = ThrottleRetriesExceededError {
            path: "admin/api/2025-10/products.json".to_string(),
            retries: 3,
            status: 429,
        };
        let message = error.to_string();
        assert!(message.contains("products.json"));
        assert!(message.contains("3 retries"));
        assert!(message.contains("429"));
    }

    #[test]
    fn test_http_error_is_transparent() {
        let error: HttpError = InvalidHttpRequestError::EmptyPath.into();
        assert_eq!(error.to_string(), "Request path cannot be empty.");
    }

    #[test]
    fn test_error_types_implement_std_error() {
        let invalid: &dyn std::error::Error = &InvalidHttpRequestError::MissingBodyType;
        let _ = invalid;

        let transport: &dyn std::error::Error = &TransportError::Other("reset".to_string());
        assert_eq!(transport.to_string(), "Transport error: reset");
    }
}
