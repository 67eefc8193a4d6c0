//! Per-shop API clients on top of the throttled request path.
//!
//! # Overview
//!
//! - [`Transport`] / [`ReqwestTransport`]: the wire seam and its reqwest default
//! - [`HttpClient`]: admission, dispatch, cost settlement and throttle retry
//! - [`HttpRequest`] / [`HttpResponse`]: request description and normalized response
//! - [`rest::RestClient`]: REST Admin API with path normalization
//! - [`graphql::GraphqlClient`]: GraphQL Admin API
//! - [`pagination`]: `since_id`, `page_info` and GraphQL cursor walks
//!
//! # Failure Behavior
//!
//! - **Throttled (429 or `THROTTLED`)**: retried after a cool-down (the
//!   `Retry-After` header for 429 when present, otherwise 1 second) with
//!   admission re-entered from the start
//! - **Transport failure**: logged, returned as a response with status `0`
//! - **Malformed body**: logged, returned as `{}` (or `{"raw_body": ...}` for 5xx)
//! - **Other errors (4xx, 5xx, GraphQL errors)**: returned unmodified

mod errors;
pub mod graphql;
mod http_client;
mod http_request;
mod http_response;
pub mod pagination;
pub mod rest;
mod transport;

pub use errors::{HttpError, InvalidHttpRequestError, ThrottleRetriesExceededError, TransportError};
pub use http_client::{HttpClient, Lane, SDK_VERSION};
pub use http_request::{DataType, HttpMethod, HttpRequest, HttpRequestBuilder};
pub use http_response::{ApiCallLimit, HttpResponse, PaginationInfo};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};

pub use graphql::{GraphqlClient, GraphqlError};
pub use pagination::{PaginationError, Walker};
pub use rest::{RestClient, RestError};
