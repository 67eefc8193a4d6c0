//! GraphQL Admin API client.
//!
//! - [`GraphqlClient`]: `query()` through the shop's cost-aware admission
//!   controller
//! - [`GraphqlError`]: error type for GraphQL operations
//!
//! Each response's `extensions.cost` is fed back into the shop's
//! [`GraphqlLimiter`](crate::throttle::GraphqlLimiter), so later operations
//! wait for the bucket to refill when it runs low.

mod client;
mod errors;

pub use client::GraphqlClient;
pub use errors::GraphqlError;
