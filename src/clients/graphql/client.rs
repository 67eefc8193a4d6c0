//! GraphQL client implementation.

use std::sync::Arc;

use crate::clients::graphql::GraphqlError;
use crate::clients::{DataType, HttpClient, HttpMethod, HttpRequest, HttpResponse, Lane};
use crate::config::ApiVersion;

/// GraphQL Admin API client for one shop.
///
/// # Example
///
/// ```rust,ignore
/// let client = gateway.client(&session).graphql();
///
/// let response = client
///     .query(
///         "query ($id: ID!) { product(id: $id) { title } }",
///         Some(json!({ "id": "gid://shopify/Product/123" })),
///     )
///     .await?;
///
/// if let Some(errors) = response.body.get("errors") {
///     eprintln!("GraphQL errors: {errors}");
/// }
/// ```
#[derive(Clone, Debug)]
pub struct GraphqlClient {
    http_client: Arc<HttpClient>,
    api_version: ApiVersion,
}

// Verify GraphqlClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<GraphqlClient>();
};

impl GraphqlClient {
    /// Creates a GraphQL client on top of a shop's HTTP client.
    #[must_use]
    pub const fn new(http_client: Arc<HttpClient>, api_version: ApiVersion) -> Self {
        Self {
            http_client,
            api_version,
        }
    }

    /// Returns a copy of this client using a different API version.
    #[must_use]
    pub fn with_version(&self, version: ApiVersion) -> Self {
        if version == self.api_version {
            tracing::debug!(
                "GraphQL client has a redundant API version override to the default {}",
                self.api_version
            );
        } else {
            tracing::debug!(
                "GraphQL client overriding default API version {} with {}",
                self.api_version,
                version
            );
        }

        Self {
            http_client: Arc::clone(&self.http_client),
            api_version: version,
        }
    }

    /// Returns the API version used in the endpoint path.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Path of the GraphQL endpoint, relative to the shop origin.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("admin/api/{}/graphql.json", self.api_version)
    }

    /// Executes a query or mutation.
    ///
    /// Throttled responses are retried; everything else, including
    /// GraphQL `errors`, is returned as the response body.
    ///
    /// # Errors
    ///
    /// Returns [`GraphqlError::Http`] if the throttle retry cap runs out.
    pub async fn query(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<HttpResponse, GraphqlError> {
        let mut body = serde_json::json!({ "query": query });
        if let Some(variables) = variables {
            body["variables"] = variables;
        }

        let request = HttpRequest::builder(HttpMethod::Post, self.endpoint())
            .body(body)
            .body_type(DataType::Json)
            .build()
            .map_err(|e| GraphqlError::Http(e.into()))?;

        self.http_client
            .request(request, Lane::Graphql)
            .await
            .map_err(Into::into)
    }
}
