//! Per-tenant admission state, created on first use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::config::{RateLimitConfig, ShopDomain};
use crate::throttle::{GraphqlLimiter, RestLimiter, TelemetrySnapshot};

/// Everything the gateway tracks about one shop's rate limits.
///
/// One instance exists per distinct [`ShopDomain`] and is shared by every
/// client bound to that shop.
#[derive(Debug)]
pub struct TenantRateState {
    shop: ShopDomain,
    rest: RestLimiter,
    graphql: GraphqlLimiter,
}

impl TenantRateState {
    /// Creates fresh state for `shop` with the given ceilings.
    #[must_use]
    pub fn new(shop: ShopDomain, limits: &RateLimitConfig) -> Self {
        Self {
            shop,
            rest: RestLimiter::new(
                limits.max_rest_queries_per_second,
                limits.telemetry_window_size,
            ),
            graphql: GraphqlLimiter::new(
                limits.max_concurrent_graphql_queries,
                limits.max_graphql_cost_per_request,
                limits.telemetry_window_size,
            ),
        }
    }

    /// The shop this state belongs to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// REST fixed-window limiter.
    #[must_use]
    pub const fn rest(&self) -> &RestLimiter {
        &self.rest
    }

    /// GraphQL cost limiter.
    #[must_use]
    pub const fn graphql(&self) -> &GraphqlLimiter {
        &self.graphql
    }

    /// Copies the telemetry windows out for diagnostics.
    ///
    /// Waits for the limiters' gates, so a call made while a request of this
    /// tenant is suspended returns once that request has been admitted.
    pub async fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            captured_at: Utc::now(),
            queries_per_second: self.rest.queries_per_second().await,
            concurrency: self.graphql.concurrency().await,
            query_cost: self.graphql.query_cost().await,
        }
    }
}

/// Map from shop to its [`TenantRateState`].
///
/// Owned by the gateway; lookups create missing entries so state exists for
/// exactly the shops that have been used.
#[derive(Debug)]
pub struct TenantRegistry {
    limits: RateLimitConfig,
    tenants: Mutex<HashMap<ShopDomain, Arc<TenantRateState>>>,
}

impl TenantRegistry {
    /// Creates an empty registry applying `limits` to every tenant.
    #[must_use]
    pub fn new(limits: RateLimitConfig) -> Self {
        Self {
            limits,
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the state for `shop`, creating it on first use.
    #[must_use]
    pub fn state_for(&self, shop: &ShopDomain) -> Arc<TenantRateState> {
        let mut tenants = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
        let state = tenants.entry(shop.clone()).or_insert_with(|| {
            tracing::debug!(shop = %shop, "Creating rate-limit state for new tenant");
            Arc::new(TenantRateState::new(shop.clone(), &self.limits))
        });
        Arc::clone(state)
    }

    /// Returns the state for `shop` only if it has been used before.
    #[must_use]
    pub fn get(&self, shop: &ShopDomain) -> Option<Arc<TenantRateState>> {
        self.tenants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(shop)
            .cloned()
    }

    /// Number of tenants seen so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tenants.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no tenant has been used yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ceilings applied to each tenant.
    #[must_use]
    pub const fn limits(&self) -> &RateLimitConfig {
        &self.limits
    }
}
