//! Configuration types for the gateway.
//!
//! # Overview
//!
//! - [`ShopifyConfig`]: all gateway settings, built with [`ShopifyConfigBuilder`]
//! - [`RateLimitConfig`]: the per-tenant admission-control ceilings
//! - [`ApiKey`], [`ShopDomain`], [`HostUrl`]: validated newtypes
//! - [`ApiVersion`]: the Shopify API version used in request paths
//!
//! # Example
//!
//! ```rust
//! use shopify_gateway::{ShopifyConfig, RateLimitConfig, ApiVersion};
//!
//! let config = ShopifyConfig::builder()
//!     .api_version(ApiVersion::V2025_07)
//!     .rate_limits(RateLimitConfig {
//!         max_rest_queries_per_second: 4,
//!         ..RateLimitConfig::default()
//!     })
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.rate_limits().max_rest_queries_per_second, 4);
//! assert_eq!(config.rate_limits().max_concurrent_graphql_queries, 5);
//! ```

mod newtypes;
mod version;

pub use newtypes::{ApiKey, HostUrl, ShopDomain};
pub use version::ApiVersion;

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Default cool-down before a throttled request is re-issued.
pub const DEFAULT_THROTTLE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Admission-control ceilings applied independently to every tenant.
///
/// Deserializes from the camelCase option names used by app settings files:
///
/// ```rust
/// use shopify_gateway::RateLimitConfig;
///
/// let limits: RateLimitConfig = serde_json::from_str(
///     r#"{ "maxRestQueriesPerSecond": 4, "maxGraphQLCostPerRequest": 500 }"#,
/// ).unwrap();
///
/// assert_eq!(limits.max_rest_queries_per_second, 4);
/// assert_eq!(limits.max_graphql_cost_per_request, 500.0);
/// assert_eq!(limits.telemetry_window_size, 100);
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// REST requests admitted per one-second window.
    pub max_rest_queries_per_second: u32,
    /// In-flight GraphQL count, counting the operation being admitted, at
    /// which admission waits for every operation in flight.
    #[serde(rename = "maxConcurrentGraphQLQueries")]
    pub max_concurrent_graphql_queries: usize,
    /// Bucket level below which GraphQL admission waits for a refill.
    #[serde(rename = "maxGraphQLCostPerRequest")]
    pub max_graphql_cost_per_request: f64,
    /// Capacity of each telemetry buffer.
    pub telemetry_window_size: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_rest_queries_per_second: 2,
            max_concurrent_graphql_queries: 5,
            max_graphql_cost_per_request: 1000.0,
            telemetry_window_size: 100,
        }
    }
}

impl RateLimitConfig {
    /// Checks that every ceiling is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRateLimit`] naming the first bad option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rest_queries_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "max_rest_queries_per_second",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_graphql_queries == 0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "max_concurrent_graphql_queries",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.max_graphql_cost_per_request.is_finite() || self.max_graphql_cost_per_request < 0.0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "max_graphql_cost_per_request",
                reason: format!(
                    "must be a finite, non-negative number (got {})",
                    self.max_graphql_cost_per_request
                ),
            });
        }
        if self.telemetry_window_size == 0 {
            return Err(ConfigError::InvalidRateLimit {
                field: "telemetry_window_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration for the gateway.
///
/// `ShopifyConfig` is `Clone`, `Send` and `Sync`; the gateway keeps one copy
/// and hands references to every per-shop client.
#[derive(Clone, Debug)]
pub struct ShopifyConfig {
    api_key: Option<ApiKey>,
    api_version: ApiVersion,
    host: Option<HostUrl>,
    user_agent_prefix: Option<String>,
    rate_limits: RateLimitConfig,
    throttle_retry_delay: Duration,
    max_throttle_retries: Option<u32>,
    max_page_retries: Option<u32>,
}

impl ShopifyConfig {
    /// Creates a new builder for constructing a `ShopifyConfig`.
    #[must_use]
    pub fn builder() -> ShopifyConfigBuilder {
        ShopifyConfigBuilder::new()
    }

    /// Returns the app's API key, if configured.
    #[must_use]
    pub const fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    /// Returns the API key or fails fast when it was never configured.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if no key was set.
    pub fn require_api_key(&self) -> Result<&ApiKey, ConfigError> {
        self.api_key
            .as_ref()
            .ok_or(ConfigError::MissingRequiredField { field: "api_key" })
    }

    /// Returns the API version.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Returns the origin override, if configured.
    #[must_use]
    pub const fn host(&self) -> Option<&HostUrl> {
        self.host.as_ref()
    }

    /// Returns the user agent prefix, if configured.
    #[must_use]
    pub fn user_agent_prefix(&self) -> Option<&str> {
        self.user_agent_prefix.as_deref()
    }

    /// Returns the per-tenant admission ceilings.
    #[must_use]
    pub const fn rate_limits(&self) -> &RateLimitConfig {
        &self.rate_limits
    }

    /// Returns the cool-down applied before re-issuing a throttled request.
    #[must_use]
    pub const fn throttle_retry_delay(&self) -> Duration {
        self.throttle_retry_delay
    }

    /// Returns the cap on consecutive throttle retries (`None` = unlimited).
    #[must_use]
    pub const fn max_throttle_retries(&self) -> Option<u32> {
        self.max_throttle_retries
    }

    /// Returns the cap on re-fetches of a page with no data envelope
    /// (`None` = unlimited).
    #[must_use]
    pub const fn max_page_retries(&self) -> Option<u32> {
        self.max_page_retries
    }
}

impl Default for ShopifyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_version: ApiVersion::latest(),
            host: None,
            user_agent_prefix: None,
            rate_limits: RateLimitConfig::default(),
            throttle_retry_delay: DEFAULT_THROTTLE_RETRY_DELAY,
            max_throttle_retries: None,
            max_page_retries: None,
        }
    }
}

// Verify ShopifyConfig is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShopifyConfig>();
};

/// Builder for constructing [`ShopifyConfig`] instances.
///
/// # Defaults
///
/// - `api_version`: latest stable version
/// - `rate_limits`: [`RateLimitConfig::default`]
/// - `throttle_retry_delay`: 1 second
/// - `max_throttle_retries` / `max_page_retries`: unlimited
/// - `api_key`, `host`, `user_agent_prefix`: `None`
#[derive(Debug, Default)]
pub struct ShopifyConfigBuilder {
    api_key: Option<ApiKey>,
    api_version: Option<ApiVersion>,
    host: Option<HostUrl>,
    user_agent_prefix: Option<String>,
    rate_limits: Option<RateLimitConfig>,
    throttle_retry_delay: Option<Duration>,
    max_throttle_retries: Option<u32>,
    max_page_retries: Option<u32>,
}

impl ShopifyConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the app's API key.
    #[must_use]
    pub fn api_key(mut self, key: ApiKey) -> Self {
        self.api_key = Some(key);
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Sends every request to `host` instead of `https://{shop}`.
    #[must_use]
    pub fn host(mut self, host: HostUrl) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the user agent prefix for HTTP requests.
    #[must_use]
    pub fn user_agent_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_agent_prefix = Some(prefix.into());
        self
    }

    /// Sets the per-tenant admission ceilings.
    #[must_use]
    pub fn rate_limits(mut self, limits: RateLimitConfig) -> Self {
        self.rate_limits = Some(limits);
        self
    }

    /// Sets the cool-down applied before re-issuing a throttled request.
    #[must_use]
    pub const fn throttle_retry_delay(mut self, delay: Duration) -> Self {
        self.throttle_retry_delay = Some(delay);
        self
    }

    /// Gives up after `retries` consecutive throttled attempts.
    #[must_use]
    pub const fn max_throttle_retries(mut self, retries: u32) -> Self {
        self.max_throttle_retries = Some(retries);
        self
    }

    /// Gives up after `retries` consecutive pages with no data envelope.
    #[must_use]
    pub const fn max_page_retries(mut self, retries: u32) -> Self {
        self.max_page_retries = Some(retries);
        self
    }

    /// Builds the [`ShopifyConfig`], validating the rate limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRateLimit`] if a ceiling is unusable.
    pub fn build(self) -> Result<ShopifyConfig, ConfigError> {
        let rate_limits = self.rate_limits.unwrap_or_default();
        rate_limits.validate()?;

        Ok(ShopifyConfig {
            api_key: self.api_key,
            api_version: self.api_version.unwrap_or_else(ApiVersion::latest),
            host: self.host,
            user_agent_prefix: self.user_agent_prefix,
            rate_limits,
            throttle_retry_delay: self
                .throttle_retry_delay
                .unwrap_or(DEFAULT_THROTTLE_RETRY_DELAY),
            max_throttle_retries: self.max_throttle_retries,
            max_page_retries: self.max_page_retries,
        })
    }
}
