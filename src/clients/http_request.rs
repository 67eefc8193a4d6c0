//! Request description passed through the throttled path.

use std::collections::HashMap;
use std::fmt;

use crate::clients::errors::InvalidHttpRequestError;

/// HTTP methods used against the Admin API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET request for retrieving resources.
    Get,
    /// POST request for creating resources.
    Post,
    /// PUT request for updating resources.
    Put,
    /// DELETE request for removing resources.
    Delete,
}

impl HttpMethod {
    /// Uppercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "get"),
            Self::Post => write!(f, "post"),
            Self::Put => write!(f, "put"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Content type of a request body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataType {
    /// JSON body (`application/json`).
    Json,
    /// Raw GraphQL document (`application/graphql`).
    GraphQL,
}

impl DataType {
    /// Returns the MIME type for the `Content-Type` header.
    #[must_use]
    pub const fn as_content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::GraphQL => "application/graphql",
        }
    }
}

/// A request to be sent through the gateway.
///
/// `path` is relative to the shop origin (e.g. `admin/api/2025-10/shop.json`).
/// The same request value is re-sent unchanged when it is throttled.
///
/// # Example
///
/// ```rust
/// use shopify_gateway::clients::{DataType, HttpMethod, HttpRequest};
/// use serde_json::json;
///
/// let request = HttpRequest::builder(HttpMethod::Post, "admin/api/2025-10/products.json")
///     .body(json!({"product": {"title": "Hat"}}))
///     .body_type(DataType::Json)
///     .build()
///     .unwrap();
///
/// assert_eq!(request.serialized_body().as_deref(), Some(r#"{"product":{"title":"Hat"}}"#));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    /// HTTP method.
    pub http_method: HttpMethod,
    /// Path relative to the shop origin, without a leading slash.
    pub path: String,
    /// Request body.
    pub body: Option<serde_json::Value>,
    /// Content type of `body`.
    pub body_type: Option<DataType>,
    /// Query parameters appended to the URL.
    pub query: Option<Vec<(String, String)>>,
    /// Headers added on top of the client defaults.
    pub extra_headers: Option<HashMap<String, String>>,
}

impl HttpRequest {
    /// Starts building a request.
    #[must_use]
    pub fn builder(method: HttpMethod, path: impl Into<String>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(method, path)
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHttpRequestError`] if the path is empty, a body has no
    /// type, or a POST/PUT has no body.
    pub fn verify(&self) -> Result<(), InvalidHttpRequestError> {
        if self.path.trim_matches('/').is_empty() {
            return Err(InvalidHttpRequestError::EmptyPath);
        }

        if self.body.is_some() && self.body_type.is_none() {
            return Err(InvalidHttpRequestError::MissingBodyType);
        }

        if matches!(self.http_method, HttpMethod::Post | HttpMethod::Put) && self.body.is_none() {
            return Err(InvalidHttpRequestError::MissingBody {
                method: self.http_method.to_string(),
            });
        }

        Ok(())
    }

    /// Body text as sent on the wire.
    ///
    /// A GraphQL-typed string body is sent raw; everything else is JSON.
    #[must_use]
    pub fn serialized_body(&self) -> Option<String> {
        let body = self.body.as_ref()?;
        match (self.body_type, body) {
            (Some(DataType::GraphQL), serde_json::Value::String(document)) => {
                Some(document.clone())
            }
            _ => Some(body.to_string()),
        }
    }

    /// `path` plus the encoded query parameters.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        let path = self.path.trim_start_matches('/');
        let Some(query) = self.query.as_ref().filter(|q| !q.is_empty()) else {
            return path.to_string();
        };

        let encoded = query
            .iter()
            .map(|(key, value)| {
                format!("{}={}", urlencoding::encode(key), urlencoding::encode(value))
            })
            .collect::<Vec<_>>()
            .join("&");
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{path}{separator}{encoded}")
    }
}

/// Builder for [`HttpRequest`].
#[derive(Debug)]
pub struct HttpRequestBuilder {
    http_method: HttpMethod,
    path: String,
    body: Option<serde_json::Value>,
    body_type: Option<DataType>,
    query: Option<Vec<(String, String)>>,
    extra_headers: Option<HashMap<String, String>>,
}

impl HttpRequestBuilder {
    fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            http_method: method,
            path: path.into(),
            body: None,
            body_type: None,
            query: None,
            extra_headers: None,
        }
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<serde_json::Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body content type.
    #[must_use]
    pub const fn body_type(mut self, body_type: DataType) -> Self {
        self.body_type = Some(body_type);
        self
    }

    /// Appends one query parameter. Order is preserved.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Adds one header on top of the client defaults.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Builds and validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHttpRequestError`] if validation fails.
    pub fn build(self) -> Result<HttpRequest, InvalidHttpRequestError> {
        let request = HttpRequest {
            http_method: self.http_method,
            path: self.path,
            body: self.body,
            body_type: self.body_type,
            query: self.query,
            extra_headers: self.extra_headers,
        };
        request.verify()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_method_names() {
        assert_eq!(HttpMethod::Get.to_string(), "get");
        assert_eq!(HttpMethod::Delete.to_string(), "delete");
        assert_eq!(HttpMethod::Put.as_str(), "PUT");
    }

    #[test]
    fn test_data_type_content_type() {
        assert_eq!(DataType::Json.as_content_type(), "application/json");
        assert_eq!(DataType::GraphQL.as_content_type(), "application/graphql");
    }

    #[test]
    fn test_verify_requires_body_for_post_and_put() {
        let result = HttpRequest::builder(HttpMethod::Post, "products.json").build();
        assert!(matches!(
            result,
            Err(InvalidHttpRequestError::MissingBody { method }) if method == "post"
        ));

        let result = HttpRequest::builder(HttpMethod::Put, "products/1.json").build();
        assert!(matches!(
            result,
            Err(InvalidHttpRequestError::MissingBody { method }) if method == "put"
        ));
    }

    #[test]
    fn test_verify_requires_body_type_when_body_present() {
        let result = HttpRequest::builder(HttpMethod::Delete, "products/1.json")
            .body(json!({}))
            .build();
        assert!(matches!(result, Err(InvalidHttpRequestError::MissingBodyType)));
    }

    #[test]
    fn test_verify_rejects_empty_path() {
        let result = HttpRequest::builder(HttpMethod::Get, "/").build();
        assert!(matches!(result, Err(InvalidHttpRequestError::EmptyPath)));
    }

    #[test]
    fn test_graphql_string_body_is_sent_raw() {
        let request = HttpRequest::builder(HttpMethod::Post, "admin/api/2025-10/graphql.json")
            .body("{ shop { name } }")
            .body_type(DataType::GraphQL)
            .build()
            .unwrap();
        assert_eq!(request.serialized_body().as_deref(), Some("{ shop { name } }"));
    }

    #[test]
    fn test_path_and_query_encodes_in_order() {
        let request = HttpRequest::builder(HttpMethod::Get, "/admin/api/2025-10/products.json")
            .query_param("limit", "250")
            .query_param("title", "red hat")
            .build()
            .unwrap();
        assert_eq!(
            request.path_and_query(),
            "admin/api/2025-10/products.json?limit=250&title=red%20hat"
        );
    }

    #[test]
    fn test_path_and_query_extends_inline_query() {
        let request = HttpRequest::builder(HttpMethod::Get, "admin/api/2025-10/products.json?limit=5")
            .query_param("since_id", "10")
            .build()
            .unwrap();
        assert_eq!(
            request.path_and_query(),
            "admin/api/2025-10/products.json?limit=5&since_id=10"
        );
    }

    #[test]
    fn test_path_and_query_without_params() {
        let request = HttpRequest::builder(HttpMethod::Get, "admin/shop.json")
            .build()
            .unwrap();
        assert_eq!(request.path_and_query(), "admin/shop.json");
        assert!(request.serialized_body().is_none());
    }
}
