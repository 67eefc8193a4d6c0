//! Throttle classification and cool-down selection.
//!
//! The request loop in [`crate::clients::HttpClient`] consults these helpers
//! after every response: a throttled response is never returned to the caller,
//! it is re-sent after a cool-down with admission re-entered from the start.

use std::time::Duration;

use serde_json::Value;

/// GraphQL error code Shopify uses when the cost bucket is exhausted.
pub const THROTTLED_CODE: &str = "THROTTLED";

/// HTTP status Shopify uses when the REST bucket is exhausted.
pub const TOO_MANY_REQUESTS: u16 = 429;

/// Reads `errors[0].extensions.code` from a response body.
///
/// REST responses use a plain string for `errors`; those yield `None`.
#[must_use]
pub fn first_error_code(body: &Value) -> Option<&str> {
    body.get("errors")?
        .as_array()?
        .first()?
        .get("extensions")?
        .get("code")?
        .as_str()
}

/// Returns `true` for a 429 status or a GraphQL `THROTTLED` error.
#[must_use]
pub fn is_throttled(status: u16, body: &Value) -> bool {
    status == TOO_MANY_REQUESTS || first_error_code(body) == Some(THROTTLED_CODE)
}

/// Picks the wait before re-sending a throttled request.
///
/// A 429's `Retry-After` wins when present and usable; every other case uses
/// the configured delay.
#[must_use]
pub fn cooldown(status: u16, retry_after: Option<f64>, configured: Duration) -> Duration {
    if status == TOO_MANY_REQUESTS {
        if let Some(duration) = retry_after.and_then(|secs| Duration::try_from_secs_f64(secs).ok()) {
            return duration;
        }
    }
    configured
}

/// Counts consecutive retries against an optional cap.
#[derive(Clone, Copy, Debug)]
pub struct RetryBudget {
    max_retries: Option<u32>,
    used: u32,
}

impl RetryBudget {
    /// Creates a budget. `None` never runs out.
    #[must_use]
    pub const fn new(max_retries: Option<u32>) -> Self {
        Self {
            max_retries,
            used: 0,
        }
    }

    /// Consumes one retry, returning `false` if none was left.
    pub fn try_consume(&mut self) -> bool {
        if let Some(max) = self.max_retries {
            if self.used >= max {
                return false;
            }
        }
        self.used = self.used.saturating_add(1);
        true
    }

    /// Retries consumed so far.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }
}
