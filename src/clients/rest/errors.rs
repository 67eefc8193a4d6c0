//! REST-specific error types.
//!
//! - [`RestError::InvalidPath`]: the path was empty after normalization
//! - [`RestError::Http`]: wraps an [`HttpError`]
//!
//! Error statuses from Shopify are not errors here; they come back as
//! ordinary responses.

use crate::clients::HttpError;
use thiserror::Error;

/// Error type for REST API operations.
#[derive(Debug, Error)]
pub enum RestError {
    /// The provided path is invalid.
    #[error("Invalid REST API path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: String,
    },

    /// An HTTP-level error occurred.
    #[error(transparent)]
    Http(#[from] HttpError),
}
