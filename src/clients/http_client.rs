//! Throttled HTTP client for one shop.
//!
//! [`HttpClient::request`] is the single path every REST and GraphQL call
//! takes:
//!
//! 1. admission through the tenant's REST or GraphQL limiter
//! 2. dispatch through the [`Transport`]
//! 3. settlement of the GraphQL cost report
//! 4. throttle check: a 429 or `THROTTLED` response is logged, the task
//!    sleeps the cool-down, and the loop starts again at step 1
//!
//! Anything that is not throttled is returned to the caller as-is.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::Session;
use crate::clients::errors::{HttpError, ThrottleRetriesExceededError};
use crate::clients::http_request::HttpRequest;
use crate::clients::http_response::HttpResponse;
use crate::clients::transport::{Transport, TransportRequest};
use crate::config::ShopifyConfig;
use crate::throttle::retry::{self, RetryBudget};
use crate::throttle::TenantRateState;

/// Crate version, reported in the `User-Agent` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which admission controller a request goes through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    /// Fixed-window request counting.
    Rest,
    /// Concurrency ceiling plus cost bucket.
    Graphql,
}

/// HTTP client bound to one shop's session and rate state.
///
/// Cheap to clone pieces are shared: the transport and the tenant state are
/// `Arc`s, so every client built for the same shop competes for the same
/// admission slots.
#[derive(Debug)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    state: Arc<TenantRateState>,
    base_uri: String,
    default_headers: HashMap<String, String>,
    throttle_retry_delay: Duration,
    max_throttle_retries: Option<u32>,
}

// Verify HttpClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<HttpClient>();
};

impl HttpClient {
    /// Creates a client for `session`'s shop.
    ///
    /// Requests go to `https://{shop}` unless the config has a host
    /// override, in which case they go to that origin and the shop is sent
    /// in the `Host` header.
    #[must_use]
    pub fn new(
        session: &Session,
        config: &ShopifyConfig,
        transport: Arc<dyn Transport>,
        state: Arc<TenantRateState>,
    ) -> Self {
        let base_uri = config.host().map_or_else(
            || format!("https://{}", session.shop.as_ref()),
            |host| host.origin().to_string(),
        );

        let user_agent_prefix = config
            .user_agent_prefix()
            .map_or(String::new(), |prefix| format!("{prefix} | "));
        let rust_version = env!("CARGO_PKG_RUST_VERSION");
        let user_agent =
            format!("{user_agent_prefix}Shopify Gateway v{SDK_VERSION} | Rust {rust_version}");

        let mut default_headers = HashMap::new();
        default_headers.insert("User-Agent".to_string(), user_agent);
        default_headers.insert("Accept".to_string(), "application/json".to_string());

        if config.host().is_some() {
            default_headers.insert("Host".to_string(), session.shop.as_ref().to_string());
        }

        if !session.access_token.is_empty() {
            default_headers.insert(
                "X-Shopify-Access-Token".to_string(),
                session.access_token.clone(),
            );
        }

        Self {
            transport,
            state,
            base_uri,
            default_headers,
            throttle_retry_delay: config.throttle_retry_delay(),
            max_throttle_retries: config.max_throttle_retries(),
        }
    }

    /// Returns the origin requests are sent to.
    #[must_use]
    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Returns the headers sent with every request.
    #[must_use]
    pub const fn default_headers(&self) -> &HashMap<String, String> {
        &self.default_headers
    }

    /// Returns the shared rate state of this client's shop.
    #[must_use]
    pub const fn state(&self) -> &Arc<TenantRateState> {
        &self.state
    }

    /// Sends `request` through admission control, retrying while throttled.
    ///
    /// Transport failures come back as a response with status `0`;
    /// non-throttled error statuses come back unmodified.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidRequest`] if the request fails validation,
    /// or [`HttpError::ThrottleRetries`] if `max_throttle_retries` is
    /// configured and the request stayed throttled past it.
    pub async fn request(&self, request: HttpRequest, lane: Lane) -> Result<HttpResponse, HttpError> {
        request.verify()?;

        let outbound = self.prepare(&request);
        let mut budget = RetryBudget::new(self.max_throttle_retries);

        loop {
            let pending = match lane {
                Lane::Rest => {
                    self.state.rest().acquire().await;
                    None
                }
                Lane::Graphql => Some(self.state.graphql().acquire().await),
            };

            let response = self.dispatch(outbound.clone()).await;

            if let Some(operation) = pending {
                operation.settle(response.query_cost());
            }

            if let Some(reason) = response.deprecation_reason() {
                tracing::warn!(
                    shop = %self.state.shop(),
                    path = %request.path,
                    reason,
                    "Deprecated request to Shopify API"
                );
            }

            if !retry::is_throttled(response.code, &response.body) {
                return Ok(response);
            }

            if !budget.try_consume() {
                return Err(ThrottleRetriesExceededError {
                    path: request.path.clone(),
                    retries: budget.used(),
                    status: response.code,
                }
                .into());
            }

            let wait = retry::cooldown(
                response.code,
                response.retry_request_after,
                self.throttle_retry_delay,
            );
            tracing::warn!(
                shop = %self.state.shop(),
                path = %request.path,
                status = response.code,
                wait_ms = wait.as_millis(),
                attempt = budget.used(),
                "Request throttled, retrying after cool-down"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn prepare(&self, request: &HttpRequest) -> TransportRequest {
        let mut headers = self.default_headers.clone();
        if let Some(body_type) = &request.body_type {
            headers.insert(
                "Content-Type".to_string(),
                body_type.as_content_type().to_string(),
            );
        }
        if let Some(extra) = &request.extra_headers {
            for (key, value) in extra {
                headers.insert(key.clone(), value.clone());
            }
        }

        TransportRequest {
            url: format!("{}/{}", self.base_uri, request.path_and_query()),
            method: request.http_method,
            headers,
            body: request.serialized_body(),
        }
    }

    async fn dispatch(&self, outbound: TransportRequest) -> HttpResponse {
        let url = outbound.url.clone();
        match self.transport.send(outbound).await {
            Ok(raw) => HttpResponse::from_transport(raw),
            Err(error) => {
                tracing::error!(
                    shop = %self.state.shop(),
                    %url,
                    %error,
                    "Transport failed, returning empty response"
                );
                HttpResponse::degenerate()
            }
        }
    }
}
