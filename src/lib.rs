//! # Shopify Gateway
//!
//! A multi-tenant client gateway for the Shopify Admin API that keeps each
//! shop's REST request rate and GraphQL query cost under the platform's
//! limits.
//!
//! ## Overview
//!
//! - Per-shop admission control via [`throttle`]: a fixed one-second window
//!   for REST and a concurrency ceiling plus leaky-bucket refill wait for
//!   GraphQL
//! - Transparent retry of throttled calls (HTTP 429 or GraphQL `THROTTLED`)
//! - `since_id`, `page_info` and GraphQL cursor pagination via
//!   [`clients::pagination`]
//! - Rolling telemetry per shop via [`TelemetrySnapshot`]
//! - Type-safe configuration via [`ShopifyConfig`] and [`ShopifyConfigBuilder`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shopify_gateway::{RateLimitConfig, Session, ShopDomain, ShopifyConfig, ShopifyGateway};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ShopifyConfig::builder()
//!     .rate_limits(RateLimitConfig {
//!         max_rest_queries_per_second: 2,
//!         max_concurrent_graphql_queries: 5,
//!         ..RateLimitConfig::default()
//!     })
//!     .build()?;
//!
//! let gateway = ShopifyGateway::new(config)?;
//! let shop = gateway.client(&Session::new(ShopDomain::new("my-store")?, "shpat_123"));
//!
//! let orders = shop.get("orders", None).await?;
//! let names = shop.graphql("{ shop { name } }", None).await?;
//!
//! let products = shopify_gateway::products::all_products(&shop).await?;
//! println!("{} products", products.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! Callers always get a response back. Throttled calls are retried until they
//! succeed (or an opt-in cap runs out); transport failures surface as a
//! response with status `0`; application errors are returned unmodified.
//! A pagination walk has no single response to return, so an application
//! error on a page ends it with
//! [`PaginationError::Application`](clients::pagination::PaginationError).
//!
//! ## Design Principles
//!
//! - **No global state**: rate state lives in the [`ShopifyGateway`]'s
//!   [`TenantRegistry`](throttle::TenantRegistry)
//! - **Fail-fast validation**: all newtypes and ceilings validate on construction
//! - **Thread-safe**: all types are `Send + Sync`
//! - **Async-first**: designed for the Tokio runtime

pub mod auth;
pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod products;
pub mod throttle;

// Re-export public types at crate root for convenience
pub use auth::Session;
pub use config::{
    ApiKey, ApiVersion, HostUrl, RateLimitConfig, ShopDomain, ShopifyConfig, ShopifyConfigBuilder,
};
pub use error::ConfigError;
pub use gateway::{ShopClient, ShopifyGateway};

// Re-export HTTP client types
pub use clients::{
    ApiCallLimit, DataType, GraphqlClient, GraphqlError, HttpClient, HttpError, HttpMethod,
    HttpRequest, HttpRequestBuilder, HttpResponse, InvalidHttpRequestError, PaginationError,
    PaginationInfo, ReqwestTransport, RestClient, RestError, ThrottleRetriesExceededError,
    Transport, TransportError, TransportRequest, TransportResponse,
};

// Re-export admission-control types
pub use throttle::{TelemetrySnapshot, TenantRateState};
