//! The wire seam between the gateway and HTTP.
//!
//! Admission control, retries and pagination only see [`Transport`]. The
//! default [`ReqwestTransport`] speaks real HTTP; tests and embedding apps can
//! supply their own.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::clients::errors::TransportError;
use crate::clients::http_request::HttpMethod;

/// A fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    /// Absolute URL including any query string.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Header names and values to send.
    pub headers: HashMap<String, String>,
    /// Serialized request body.
    pub body: Option<String>,
}

/// A raw response returned by a [`Transport`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Header values keyed by lowercase header name.
    pub headers: HashMap<String, Vec<String>>,
    /// Response body text.
    pub body: String,
}

/// Sends one request and returns the raw response.
///
/// Implementations must not retry or rate-limit; the gateway does both.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Sends `request` over the wire.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client` using rustls.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh rustls-backed client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Network`] if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().use_rustls_tls().build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn parse_response_headers(
        headers: &reqwest::header::HeaderMap,
    ) -> HashMap<String, Vec<String>> {
        let mut result: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in headers {
            let key = name.as_str().to_lowercase();
            let value = value.to_str().unwrap_or_default().to_string();
            result.entry(key).or_default().push(value);
        }
        result
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = Self::parse_response_headers(response.headers());
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

// Verify ReqwestTransport is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ReqwestTransport>();
};

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reqwest_transport_sends_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/api/2025-10/graphql.json"))
            .and(header("X-Shopify-Access-Token", "token"))
            .and(body_string(r#"{"query":"{ shop { name } }"}"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Request-Id", "req-1")
                    .set_body_string(r#"{"data":{}}"#),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new().unwrap();
        let mut headers = HashMap::new();
        headers.insert("X-Shopify-Access-Token".to_string(), "token".to_string());

        let response = transport
            .send(TransportRequest {
                url: format!("{}/admin/api/2025-10/graphql.json", server.uri()),
                method: HttpMethod::Post,
                headers,
                body: Some(r#"{"query":"{ shop { name } }"}"#.to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, r#"{"data":{}}"#);
        assert_eq!(
            response.headers.get("x-request-id"),
            Some(&vec!["req-1".to_string()])
        );
    }

    #[tokio::test]
    async fn test_reqwest_transport_reports_connection_failure() {
        let transport = ReqwestTransport::new().unwrap();
        let result = transport
            .send(TransportRequest {
                url: "http://127.0.0.1:1/unreachable".to_string(),
                method: HttpMethod::Get,
                headers: HashMap::new(),
                body: None,
            })
            .await;

        assert!(matches!(result, Err(TransportError::Network(_))));
    }
}
