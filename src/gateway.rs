//! Gateway entry point and per-shop client handles.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::Session;
use crate::clients::pagination::{GraphqlConnection, PageFetcher, PaginationError, RestPages};
use crate::clients::{
    GraphqlClient, GraphqlError, HttpClient, HttpResponse, ReqwestTransport, RestClient, RestError,
    Transport, TransportError, Walker,
};
use crate::config::{ShopDomain, ShopifyConfig};
use crate::error::ConfigError;
use crate::throttle::{TelemetrySnapshot, TenantRateState, TenantRegistry};

/// Owns the configuration, the transport and every tenant's rate state.
///
/// Create one gateway per process and hand out [`ShopClient`]s with
/// [`client`](Self::client). Clients for the same shop share admission state;
/// clients for different shops never do.
///
/// # Example
///
/// ```rust,no_run
/// use shopify_gateway::{Session, ShopDomain, ShopifyConfig, ShopifyGateway};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = ShopifyGateway::new(ShopifyConfig::default())?;
/// let session = Session::new(ShopDomain::new("my-store")?, "shpat_123");
///
/// let shop = gateway.client(&session);
/// let response = shop.get("shop", None).await?;
/// println!("{}", response.to_json());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ShopifyGateway {
    config: ShopifyConfig,
    transport: Arc<dyn Transport>,
    registry: TenantRegistry,
}

// Verify ShopifyGateway is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ShopifyGateway>();
    assert_send_sync::<ShopClient>();
};

impl ShopifyGateway {
    /// Creates a gateway speaking HTTPS through reqwest.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the HTTP client cannot be initialized.
    pub fn new(config: ShopifyConfig) -> Result<Self, TransportError> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new()?)))
    }

    /// Creates a gateway on top of a custom [`Transport`].
    #[must_use]
    pub fn with_transport(config: ShopifyConfig, transport: Arc<dyn Transport>) -> Self {
        let registry = TenantRegistry::new(config.rate_limits().clone());
        Self {
            config,
            transport,
            registry,
        }
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub const fn config(&self) -> &ShopifyConfig {
        &self.config
    }

    /// Returns the tenant registry.
    #[must_use]
    pub const fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Returns a client bound to `session`'s shop.
    #[must_use]
    pub fn client(&self, session: &Session) -> ShopClient {
        let state = self.registry.state_for(&session.shop);
        let http_client = Arc::new(HttpClient::new(
            session,
            &self.config,
            Arc::clone(&self.transport),
            state,
        ));
        let api_version = self.config.api_version().clone();

        ShopClient {
            session: session.clone(),
            rest: RestClient::new(Arc::clone(&http_client), api_version.clone()),
            graphql: GraphqlClient::new(Arc::clone(&http_client), api_version),
            http_client,
            walker: Walker::new(
                self.config.max_page_retries(),
                self.config.throttle_retry_delay(),
            ),
            config: self.config.clone(),
        }
    }

    /// Telemetry for `shop`, or `None` if it has never been used.
    pub async fn telemetry(&self, shop: &ShopDomain) -> Option<TelemetrySnapshot> {
        let state = self.registry.get(shop)?;
        Some(state.telemetry().await)
    }
}

/// REST, GraphQL and pagination operations for one shop.
#[derive(Clone, Debug)]
pub struct ShopClient {
    session: Session,
    http_client: Arc<HttpClient>,
    rest: RestClient,
    graphql: GraphqlClient,
    walker: Walker,
    config: ShopifyConfig,
}

impl ShopClient {
    /// The shop this client talks to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.session.shop
    }

    /// The session this client was built from.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The underlying REST client.
    #[must_use]
    pub const fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The underlying GraphQL client.
    #[must_use]
    pub const fn graphql_client(&self) -> &GraphqlClient {
        &self.graphql
    }

    /// The shop's shared admission state.
    #[must_use]
    pub fn rate_state(&self) -> &Arc<TenantRateState> {
        self.http_client.state()
    }

    /// The walker used by [`walk`](Self::walk) and
    /// [`collect_all`](Self::collect_all).
    #[must_use]
    pub const fn walker(&self) -> &Walker {
        &self.walker
    }

    /// `GET` a REST endpoint.
    ///
    /// # Errors
    ///
    /// See [`RestClient::get`].
    pub async fn get(
        &self,
        endpoint: &str,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        self.rest.get(endpoint, query).await
    }

    /// `POST` to a REST endpoint.
    ///
    /// # Errors
    ///
    /// See [`RestClient::post`].
    pub async fn post(&self, endpoint: &str, body: Value) -> Result<HttpResponse, RestError> {
        self.rest.post(endpoint, body, None).await
    }

    /// `PUT` to a REST endpoint.
    ///
    /// # Errors
    ///
    /// See [`RestClient::put`].
    pub async fn put(&self, endpoint: &str, body: Value) -> Result<HttpResponse, RestError> {
        self.rest.put(endpoint, body, None).await
    }

    /// `DELETE` a REST endpoint.
    ///
    /// # Errors
    ///
    /// See [`RestClient::delete`].
    pub async fn delete(
        &self,
        endpoint: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse, RestError> {
        self.rest.delete(endpoint, body, None).await
    }

    /// Runs a GraphQL query or mutation.
    ///
    /// # Errors
    ///
    /// See [`GraphqlClient::query`].
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<HttpResponse, GraphqlError> {
        self.graphql.query(query, variables).await
    }

    /// A `since_id` walk over the REST collection at `path`.
    #[must_use]
    pub fn rest_pages(&self, path: &str, key: &str) -> RestPages {
        RestPages::new(self.rest.clone(), path, key)
    }

    /// A cursor walk over a GraphQL connection.
    #[must_use]
    pub fn graphql_connection<I, S>(&self, query: &str, connection_path: I) -> GraphqlConnection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GraphqlConnection::new(self.graphql.clone(), query, connection_path)
    }

    /// Streams every item of `fetcher` to `on_item`.
    ///
    /// # Errors
    ///
    /// See [`Walker::walk`].
    pub async fn walk<P, F, Fut>(&self, fetcher: &P, on_item: F) -> Result<usize, PaginationError>
    where
        P: PageFetcher + ?Sized,
        F: FnMut(P::Item) -> Fut,
        Fut: Future<Output = ()>,
    {
        self.walker.walk(fetcher, on_item).await
    }

    /// Collects every item of `fetcher`.
    ///
    /// # Errors
    ///
    /// See [`Walker::walk`].
    pub async fn collect_all<P>(&self, fetcher: &P) -> Result<Vec<P::Item>, PaginationError>
    where
        P: PageFetcher + ?Sized,
    {
        self.walker.collect_all(fetcher).await
    }

    /// The app's admin URL in this shop: `https://{shop}/admin/apps/{api_key}`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequiredField`] if no API key was
    /// configured.
    pub fn app_url(&self) -> Result<String, ConfigError> {
        let api_key = self.config.require_api_key()?;
        Ok(format!(
            "https://{}/admin/apps/{}",
            self.session.shop,
            api_key.as_ref()
        ))
    }

    /// Current telemetry of this client's shop.
    pub async fn telemetry(&self) -> TelemetrySnapshot {
        self.rate_state().telemetry().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKey, RateLimitConfig};

    fn gateway(config: ShopifyConfig) -> ShopifyGateway {
        ShopifyGateway::new(config).unwrap()
    }

    fn session(shop: &str) -> Session {
        Session::new(ShopDomain::new(shop).unwrap(), "token")
    }

    #[test]
    fn test_clients_for_same_shop_share_state() {
        let gateway = gateway(ShopifyConfig::default());

        let a = gateway.client(&session("shop-a"));
        let again = gateway.client(&session("shop-a.myshopify.com"));
        let b = gateway.client(&session("shop-b"));

        assert!(Arc::ptr_eq(a.rate_state(), again.rate_state()));
        assert!(!Arc::ptr_eq(a.rate_state(), b.rate_state()));
        assert_eq!(gateway.registry().len(), 2);
    }

    #[test]
    fn test_rate_limits_flow_into_tenant_state() {
        let config = ShopifyConfig::builder()
            .rate_limits(RateLimitConfig {
                max_rest_queries_per_second: 9,
                ..RateLimitConfig::default()
            })
            .build()
            .unwrap();
        let client = gateway(config).client(&session("shop-a"));

        assert_eq!(client.rate_state().rest().max_per_second(), 9);
    }

    #[test]
    fn test_app_url_requires_api_key() {
        let client = gateway(ShopifyConfig::default()).client(&session("shop-a"));
        assert!(matches!(
            client.app_url(),
            Err(ConfigError::MissingRequiredField { field: "api_key" })
        ));

        let config = ShopifyConfig::builder()
            .api_key(ApiKey::new("abc123").unwrap())
            .build()
            .unwrap();
        let client = gateway(config).client(&session("shop-a"));
        assert_eq!(
            client.app_url().unwrap(),
            "https://shop-a.myshopify.com/admin/apps/abc123"
        );
    }

    #[tokio::test]
    async fn test_telemetry_is_none_for_unknown_shop() {
        let gateway = gateway(ShopifyConfig::default());
        assert!(gateway
            .telemetry(&ShopDomain::new("never-used").unwrap())
            .await
            .is_none());

        let _client = gateway.client(&session("used"));
        assert!(gateway
            .telemetry(&ShopDomain::new("used").unwrap())
            .await
            .is_some());
    }
}
