//! GraphQL-specific error types.
//!
//! GraphQL-level errors (user errors, validation errors, access denied) come
//! back in the response body with status 200 and are not converted into
//! `Err` values. Only HTTP-layer failures are:
//!
//! - [`GraphqlError::Http`]: wraps an [`HttpError`]

use crate::clients::HttpError;
use thiserror::Error;

/// Error type for GraphQL API operations.
#[derive(Debug, Error)]
pub enum GraphqlError {
    /// An HTTP-level error occurred.
    #[error(transparent)]
    Http(#[from] HttpError),
}
