//! Per-tenant admission control.
//!
//! Every shop gets its own [`TenantRateState`] holding a REST fixed-window
//! limiter and a GraphQL cost limiter. Each limiter owns an async mutex; the
//! admission decision, including any wait, runs while that mutex is held,
//! and the network call runs after it is released.
//!
//! # Overview
//!
//! - [`RestLimiter`]: at most N requests per one-second window
//! - [`GraphqlLimiter`] / [`PendingOperation`]: in-flight ceiling plus
//!   leaky-bucket refill waits driven by [`QueryCost`] reports
//! - [`TenantRegistry`]: get-or-create state per [`ShopDomain`](crate::ShopDomain)
//! - [`TelemetryBuffer`] / [`TelemetrySnapshot`]: rolling diagnostics
//! - [`retry`]: throttle detection and cool-down selection

mod graphql;
mod registry;
mod rest;
pub mod retry;
mod telemetry;

pub use graphql::{GraphqlLimiter, PendingOperation, QueryCost, ThrottleSnapshot, ThrottleStatus};
pub use registry::{TenantRateState, TenantRegistry};
pub use rest::{RestLimiter, REST_COOLDOWN, REST_WINDOW};
pub use telemetry::{TelemetryBuffer, TelemetrySnapshot};
