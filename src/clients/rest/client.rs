//! REST client implementation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::clients::rest::RestError;
use crate::clients::{DataType, HttpClient, HttpMethod, HttpRequest, HttpResponse, Lane};
use crate::config::ApiVersion;

/// REST Admin API client for one shop.
///
/// Every call passes through the shop's fixed-window limiter and is retried
/// while Shopify answers 429.
///
/// # Example
///
/// ```rust,ignore
/// let client = gateway.client(&session).rest();
///
/// let response = client.get("products", None).await?;
/// println!("{}", response.to_json());
///
/// client
///     .put("products/123", json!({"product": {"tags": "sale"}}), None)
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct RestClient {
    http_client: Arc<HttpClient>,
    api_version: ApiVersion,
}

// Verify RestClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<RestClient>();
};

impl RestClient {
    /// Creates a REST client on top of a shop's HTTP client.
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
                "Rest client has a redundant API version override to the default {}",
                self.api_version
            );
        } else {
            tracing::debug!(
                "Rest client overriding default API version {} with {}",
                self.api_version,
                version
            );
        }

        Self {
            http_client: Arc::clone(&self.http_client),
            api_version: version,
        }
    }

    /// Returns the API version used in request paths.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Sends a GET request.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::InvalidPath`] for an empty path, or
    /// [`RestError::Http`] if the request is invalid or the throttle retry cap
    /// runs out.
    pub async fn get(
        &self,
        path: &str,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        self.make_request(HttpMethod::Get, path, None, query).await
    }

    /// Sends a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        self.make_request(HttpMethod::Post, path, Some(body), query)
            .await
    }

    /// Sends a PUT request with a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        self.make_request(HttpMethod::Put, path, Some(body), query)
            .await
    }

    /// Sends a DELETE request, with a JSON body if one is given.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get).
    pub async fn delete(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        self.make_request(HttpMethod::Delete, path, body, query)
            .await
    }

    async fn make_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
        query: Option<HashMap<String, String>>,
    ) -> Result<HttpResponse, RestError> {
        let full_path = resolve_path(path, &self.api_version)?;

        let mut builder = HttpRequest::builder(method, full_path);

        if let Some(body_value) = body {
            builder = builder.body(body_value).body_type(DataType::Json);
        }

        if let Some(query_params) = query {
            let mut params: Vec<_> = query_params.into_iter().collect();
            params.sort();
            for (key, value) in params {
                builder = builder.query_param(key, value);
            }
        }

        let request = builder.build().map_err(|e| RestError::Http(e.into()))?;

        self.http_client
            .request(request, Lane::Rest)
            .await
            .map_err(Into::into)
    }
}

/// Turns a caller-supplied endpoint into a path relative to the shop origin.
fn resolve_path(path: &str, version: &ApiVersion) -> Result<String, RestError> {
    let (path, inline_query) = path
        .split_once('?')
        .map_or((path, None), |(path, query)| (path, Some(query)));

    let normalized = normalize_path(path)?;
    let full_path = if has_admin_prefix(&normalized) {
        normalized
    } else {
        format!("admin/api/{version}/{normalized}")
    };

    Ok(match inline_query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{full_path}?{query}"),
        None => full_path,
    })
}

fn normalize_path(path: &str) -> Result<String, RestError> {
    let trimmed = path.trim_start_matches('/');
    let trimmed = trimmed.strip_suffix(".json").unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err(RestError::InvalidPath {
            path: path.to_string(),
        });
    }

    Ok(format!("{trimmed}.json"))
}

fn has_admin_prefix(path: &str) -> bool {
    path.starts_with("admin/")
}
