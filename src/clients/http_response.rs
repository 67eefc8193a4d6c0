//! Normalized responses returned to gateway callers.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::clients::transport::TransportResponse;
use crate::throttle::QueryCost;

/// Parsed `X-Shopify-Shop-Api-Call-Limit` header (`"40/80"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApiCallLimit {
    /// Requests currently counted against the bucket.
    pub request_count: u32,
    /// Bucket capacity.
    pub bucket_size: u32,
}

impl ApiCallLimit {
    /// Parses `"count/size"`, returning `None` for anything else.
    #[must_use]
    pub fn parse(header_value: &str) -> Option<Self> {
        let (count, size) = header_value.trim().split_once('/')?;
        Some(Self {
            request_count: count.parse().ok()?,
            bucket_size: size.parse().ok()?,
        })
    }
}

/// `page_info` tokens from a REST `Link` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaginationInfo {
    /// Token for the previous page.
    pub prev_page_info: Option<String>,
    /// Token for the next page.
    pub next_page_info: Option<String>,
}

impl PaginationInfo {
    /// Parses a header such as
    /// `<https://shop/admin/api/2025-10/products.json?page_info=abc>; rel="next"`.
    #[must_use]
    pub fn parse_link_header(header_value: &str) -> Self {
        let mut result = Self::default();

        for link in header_value.split(',') {
            let mut parts = link.split(';').map(str::trim);
            let Some(url) = parts
                .next()
                .map(|url| url.trim_start_matches('<').trim_end_matches('>'))
            else {
                continue;
            };
            let rel = parts.find_map(|part| {
                part.strip_prefix("rel=")
                    .map(|rel| rel.trim_matches('"'))
            });

            let Some(page_info) = Self::extract_page_info(url) else {
                continue;
            };
            match rel {
                Some("previous") => result.prev_page_info = Some(page_info),
                Some("next") => result.next_page_info = Some(page_info),
                _ => {}
            }
        }

        result
    }

    fn extract_page_info(url: &str) -> Option<String> {
        let (_, query) = url.split_once('?')?;
        query.split('&').find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key != "page_info" {
                return None;
            }
            Some(
                urlencoding::decode(value)
                    .map_or_else(|_| value.to_string(), |decoded| decoded.into_owned()),
            )
        })
    }
}

/// A response after normalization.
///
/// Every call through the gateway produces one of these, including transport
/// failures (status `0`) and bodies that were not JSON (empty object, or
/// `{"raw_body": ...}` for 5xx).
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code, `0` if no response was received.
    pub code: u16,
    /// Header values keyed by lowercase name.
    pub headers: HashMap<String, Vec<String>>,
    /// Parsed response body.
    pub body: Value,
    /// `page_info` token of the previous page, from the `Link` header.
    pub prev_page_info: Option<String>,
    /// `page_info` token of the next page, from the `Link` header.
    pub next_page_info: Option<String>,
    /// Parsed REST call-limit header.
    pub api_call_limit: Option<ApiCallLimit>,
    /// `Retry-After` in seconds.
    pub retry_request_after: Option<f64>,
}

impl HttpResponse {
    /// Builds a response, extracting pagination and limit headers.
    #[must_use]
    pub fn new(code: u16, headers: HashMap<String, Vec<String>>, body: Value) -> Self {
        let first = |name: &str| headers.get(name).and_then(|values| values.first());

        let pagination = first("link")
            .map(|link| PaginationInfo::parse_link_header(link))
            .unwrap_or_default();
        let api_call_limit = first("x-shopify-shop-api-call-limit")
            .and_then(|value| ApiCallLimit::parse(value));
        let retry_request_after = first("retry-after").and_then(|value| value.trim().parse().ok());

        Self {
            code,
            prev_page_info: pagination.prev_page_info,
            next_page_info: pagination.next_page_info,
            api_call_limit,
            retry_request_after,
            headers,
            body,
        }
    }

    /// Normalizes a raw transport response.
    ///
    /// An unparseable body is logged and replaced with `{}`; for 5xx the
    /// text is kept under `raw_body`.
    #[must_use]
    pub fn from_transport(response: TransportResponse) -> Self {
        let TransportResponse {
            status,
            headers,
            body,
        } = response;

        let body = if body.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(&body).unwrap_or_else(|error| {
                tracing::warn!(status, %error, "Response body is not valid JSON");
                if status >= 500 {
                    json!({ "raw_body": body })
                } else {
                    json!({})
                }
            })
        };

        Self::new(status, headers, body)
    }

    /// The response used when the transport produced nothing.
    #[must_use]
    pub fn degenerate() -> Self {
        Self::new(0, HashMap::new(), json!({}))
    }

    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.code >= 200 && self.code <= 299
    }

    /// Returns `true` if no HTTP response was received.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.code == 0
    }

    /// Value of `X-Request-Id`.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header("x-request-id")
    }

    /// Value of `X-Shopify-API-Deprecated-Reason`.
    #[must_use]
    pub fn deprecation_reason(&self) -> Option<&str> {
        self.header("x-shopify-api-deprecated-reason")
    }

    /// First value of a header, by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// GraphQL `extensions.cost`, if present.
    #[must_use]
    pub fn query_cost(&self) -> Option<QueryCost> {
        QueryCost::from_response_body(&self.body)
    }

    /// Flattens the response into one JSON object:
    /// `{ ...body, http_status, headers, next_page?, previous_page? }`.
    ///
    /// A body that is not an object is placed under `body`. Multi-valued
    /// headers are joined with `", "`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = match &self.body {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("body".to_string(), other.clone());
                map
            }
        };

        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(name, values)| (name.clone(), Value::String(values.join(", "))))
            .collect();

        object.insert("http_status".to_string(), json!(self.code));
        object.insert("headers".to_string(), Value::Object(headers));
        if let Some(next) = &self.next_page_info {
            object.insert("next_page".to_string(), json!(next));
        }
        if let Some(previous) = &self.prev_page_info {
            object.insert("previous_page".to_string(), json!(previous));
        }

        Value::Object(object)
    }
}
