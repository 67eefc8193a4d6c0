//! Cursor pagination over the throttled request path.
//!
//! A [`PageFetcher`] knows how to fetch one page given the previous page's
//! cursor. [`Walker`] drives it in a loop until the fetcher reports no next
//! cursor, either streaming items to a callback ([`Walker::walk`]) or
//! collecting them ([`Walker::collect_all`]).
//!
//! Two fetchers are provided:
//!
//! - [`RestPages`]: REST collections keyed by `since_id` or by the `page_info`
//!   token in the `Link` header
//! - [`GraphqlConnection`]: GraphQL connections using `edges`, `cursor` and
//!   `pageInfo.hasNextPage`
//!
//! A page that comes back without its data envelope for a transient reason
//! (no response, 5xx, a 2xx without the expected key) is fetched again with
//! the same cursor instead of being read as the end of the data.

use std::collections::HashMap;
use std::future::{ready, Future};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::clients::graphql::{GraphqlClient, GraphqlError};
use crate::clients::rest::{RestClient, RestError};
use crate::clients::HttpResponse;
use crate::config::DEFAULT_THROTTLE_RETRY_DELAY;
use crate::throttle::retry::RetryBudget;

/// Largest page size the Admin API accepts.
pub const MAX_PAGE_SIZE: u32 = 250;

/// Error type for pagination.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// A REST page request failed before reaching Shopify.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// A GraphQL page request failed before reaching Shopify.
    #[error(transparent)]
    Graphql(#[from] GraphqlError),

    /// Shopify answered a page request with a non-transient error.
    #[error("Page request failed with status {status}: {body}")]
    Application {
        /// HTTP status of the response.
        status: u16,
        /// Response body.
        body: Value,
    },

    /// A page kept coming back without data.
    #[error("Page still missing after {attempts} attempts")]
    RetriesExhausted {
        /// Number of fetches made for the page.
        attempts: u32,
    },
}

/// One page of items and the cursor of the page after it.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T, C> {
    /// Items on this page, in order.
    pub items: Vec<T>,
    /// Cursor for the next page; `None` ends the walk.
    pub next: Option<C>,
}

/// Result of fetching one page.
#[derive(Clone, Debug, PartialEq)]
pub enum PageFetch<T, C> {
    /// The page arrived.
    Page(Page<T, C>),
    /// The data envelope was missing for a transient reason.
    Missing,
}

/// Fetches one page given the cursor returned by the previous page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Item type yielded by the walk.
    type Item: Send;
    /// Cursor type passed between pages.
    type Cursor: Clone + Send + Sync;

    /// Fetches the page after `cursor`, or the first page for `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] for failures that re-fetching won't fix.
    async fn fetch(
        &self,
        cursor: Option<Self::Cursor>,
    ) -> Result<PageFetch<Self::Item, Self::Cursor>, PaginationError>;
}

/// Drives a [`PageFetcher`] to the last page.
#[derive(Clone, Copy, Debug)]
pub struct Walker {
    max_page_retries: Option<u32>,
    retry_delay: Duration,
}

impl Default for Walker {
    fn default() -> Self {
        Self {
            max_page_retries: None,
            retry_delay: DEFAULT_THROTTLE_RETRY_DELAY,
        }
    }
}

impl Walker {
    /// Creates a walker. `max_page_retries` of `None` re-fetches a missing
    /// page forever.
    #[must_use]
    pub const fn new(max_page_retries: Option<u32>, retry_delay: Duration) -> Self {
        Self {
            max_page_retries,
            retry_delay,
        }
    }

    /// Calls `on_item` for every item, one page at a time, awaiting each call
    /// before the next. Returns the number of items visited.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error, or [`PaginationError::RetriesExhausted`]
    /// when a page stays missing past the retry cap.
    pub async fn walk<P, F, Fut>(&self, fetcher: &P, mut on_item: F) -> Result<usize, PaginationError>
    where
        P: PageFetcher + ?Sized,
        F: FnMut(P::Item) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut cursor: Option<P::Cursor> = None;
        let mut retries = RetryBudget::new(self.max_page_retries);
        let mut visited = 0usize;

        loop {
            let page = match fetcher.fetch(cursor.clone()).await? {
                PageFetch::Page(page) => page,
                PageFetch::Missing => {
                    if !retries.try_consume() {
                        return Err(PaginationError::RetriesExhausted {
                            attempts: retries.used().saturating_add(1),
                        });
                    }
                    tracing::warn!(
                        attempt = retries.used(),
                        wait_ms = self.retry_delay.as_millis(),
                        "Page came back without data, fetching it again"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };
            retries = RetryBudget::new(self.max_page_retries);

            for item in page.items {
                on_item(item).await;
                visited += 1;
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => return Ok(visited),
            }
        }
    }

    /// Collects every item from every page.
    ///
    /// # Errors
    ///
    /// Same as [`walk`](Self::walk).
    pub async fn collect_all<P>(&self, fetcher: &P) -> Result<Vec<P::Item>, PaginationError>
    where
        P: PageFetcher + ?Sized,
    {
        let mut items = Vec::new();
        self.walk(fetcher, |item| {
            items.push(item);
            ready(())
        })
        .await?;
        Ok(items)
    }
}

/// Walks every page with a default [`Walker`].
///
/// # Errors
///
/// Same as [`Walker::walk`].
pub async fn walk<P, F, Fut>(fetcher: &P, on_item: F) -> Result<usize, PaginationError>
where
    P: PageFetcher + ?Sized,
    F: FnMut(P::Item) -> Fut,
    Fut: Future<Output = ()>,
{
    Walker::default().walk(fetcher, on_item).await
}

/// Collects every page with a default [`Walker`].
///
/// # Errors
///
/// Same as [`Walker::walk`].
pub async fn collect_all<P>(fetcher: &P) -> Result<Vec<P::Item>, PaginationError>
where
    P: PageFetcher + ?Sized,
{
    Walker::default().collect_all(fetcher).await
}

/// Classifies a response whose data envelope could not be read.
fn missing_or_error<T, C>(response: &HttpResponse) -> Result<PageFetch<T, C>, PaginationError> {
    if response.is_degenerate() || response.code >= 500 || response.is_ok() {
        Ok(PageFetch::Missing)
    } else {
        Err(PaginationError::Application {
            status: response.code,
            body: response.body.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// REST
// ---------------------------------------------------------------------------

/// How a REST collection advances between pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestPaging {
    /// `since_id` of the last item on the previous page.
    SinceId,
    /// `page_info` token from the `Link` header.
    PageInfo,
}

/// Cursor of a REST collection walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestCursor {
    /// Fetch items with an id greater than this.
    SinceId(u64),
    /// Opaque `page_info` token.
    PageInfo(String),
}

/// [`PageFetcher`] over a REST collection endpoint such as `products`.
///
/// # Example
///
/// ```rust,ignore
/// let pages = RestPages::new(client.rest(), "products", "products");
/// let products = collect_all(&pages).await?;
/// ```
#[derive(Clone, Debug)]
pub struct RestPages {
    client: RestClient,
    path: String,
    key: String,
    paging: RestPaging,
    page_size: u32,
    query: HashMap<String, String>,
}

impl RestPages {
    /// Walks `path`, reading items from the `key` array of each body.
    ///
    /// Defaults to `since_id` paging with pages of [`MAX_PAGE_SIZE`].
    #[must_use]
    pub fn new(client: RestClient, path: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            key: key.into(),
            paging: RestPaging::SinceId,
            page_size: MAX_PAGE_SIZE,
            query: HashMap::new(),
        }
    }

    /// Switches between `since_id` and `page_info` paging.
    #[must_use]
    pub const fn paging(mut self, paging: RestPaging) -> Self {
        self.paging = paging;
        self
    }

    /// Sets the page size, clamped to `1..=250`.
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Adds a filter parameter sent with every page.
    ///
    /// With [`RestPaging::PageInfo`] filters only go on the first request;
    /// Shopify encodes them into the token.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    fn page_query(&self, cursor: Option<&RestCursor>) -> HashMap<String, String> {
        let mut query = HashMap::new();
        query.insert("limit".to_string(), self.page_size.to_string());

        match (self.paging, cursor) {
            (RestPaging::PageInfo, Some(RestCursor::PageInfo(token))) => {
                query.insert("page_info".to_string(), token.clone());
            }
            (_, cursor) => {
                query.extend(self.query.iter().map(|(k, v)| (k.clone(), v.clone())));
                if self.paging == RestPaging::SinceId {
                    let since = match cursor {
                        Some(RestCursor::SinceId(id)) => *id,
                        _ => 0,
                    };
                    query.insert("since_id".to_string(), since.to_string());
                }
            }
        }

        query
    }

    fn next_cursor(&self, items: &[Value], response: &HttpResponse) -> Option<RestCursor> {
        if items.is_empty() {
            return None;
        }
        match self.paging {
            RestPaging::SinceId => items
                .last()
                .and_then(|item| item.get("id"))
                .and_then(Value::as_u64)
                .map(RestCursor::SinceId),
            RestPaging::PageInfo => response.next_page_info.clone().map(RestCursor::PageInfo),
        }
    }
}

#[async_trait]
impl PageFetcher for RestPages {
    type Item = Value;
    type Cursor = RestCursor;

    async fn fetch(
        &self,
        cursor: Option<RestCursor>,
    ) -> Result<PageFetch<Value, RestCursor>, PaginationError> {
        let query = self.page_query(cursor.as_ref());
        let response = self.client.get(&self.path, Some(query)).await?;

        let items = match response.body.get(&self.key).and_then(Value::as_array) {
            Some(items) if response.is_ok() => items.clone(),
            _ => return missing_or_error(&response),
        };

        let next = self.next_cursor(&items, &response);
        Ok(PageFetch::Page(Page { items, next }))
    }
}

// ---------------------------------------------------------------------------
// GraphQL
// ---------------------------------------------------------------------------

/// [`PageFetcher`] over a GraphQL connection.
///
/// The query must declare an `$after: String` variable and pass it to the
/// connection; `connection_path` is the path below `data` to the connection
/// object. Items are the `node` of each edge.
///
/// # Example
///
/// ```rust,ignore
/// let pages = GraphqlConnection::new(
///     client.graphql(),
///     "query ($after: String) { products(first: 250, after: $after) {
///        edges { cursor node { id } } pageInfo { hasNextPage } } }",
///     ["products"],
/// );
/// let nodes = collect_all(&pages).await?;
/// ```
#[derive(Clone, Debug)]
pub struct GraphqlConnection {
    client: GraphqlClient,
    query: String,
    connection_path: Vec<String>,
    variables: serde_json::Map<String, Value>,
}

impl GraphqlConnection {
    /// Walks the connection at `connection_path` returned by `query`.
    #[must_use]
    pub fn new<I, S>(client: GraphqlClient, query: impl Into<String>, connection_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            client,
            query: query.into(),
            connection_path: connection_path.into_iter().map(Into::into).collect(),
            variables: serde_json::Map::new(),
        }
    }

    /// Adds a variable sent with every page.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    fn connection<'a>(&self, data: &'a Value) -> Option<&'a Value> {
        self.connection_path
            .iter()
            .try_fold(data, |value, key| value.get(key))
            .filter(|value| !value.is_null())
    }
}

/// Reads nodes and the next cursor out of a connection object.
fn read_connection(connection: &Value) -> Page<Value, String> {
    let edges = connection
        .get("edges")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let items = edges
        .iter()
        .filter_map(|edge| edge.get("node").cloned())
        .collect();

    let page_info = connection.get("pageInfo");
    let has_next_page = page_info
        .and_then(|info| info.get("hasNextPage"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let next = has_next_page
        .then(|| {
            edges
                .last()
                .and_then(|edge| edge.get("cursor"))
                .or_else(|| page_info.and_then(|info| info.get("endCursor")))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .flatten();

    Page { items, next }
}

#[async_trait]
impl PageFetcher for GraphqlConnection {
    type Item = Value;
    type Cursor = String;

    async fn fetch(
        &self,
        cursor: Option<String>,
    ) -> Result<PageFetch<Value, String>, PaginationError> {
        let mut variables = self.variables.clone();
        variables.insert("after".to_string(), cursor.map_or(Value::Null, Value::String));

        let response = self
            .client
            .query(&self.query, Some(Value::Object(variables)))
            .await?;

        let data = response.body.get("data").filter(|data| !data.is_null());
        let Some(data) = data.filter(|_| response.is_ok()) else {
            if response.is_ok() && response.body.get("errors").is_some() {
                return Err(PaginationError::Application {
                    status: response.code,
                    body: response.body.clone(),
                });
            }
            return missing_or_error(&response);
        };

        Ok(PageFetch::Page(self.connection(data).map_or_else(
            || Page {
                items: Vec::new(),
                next: None,
            },
            read_connection,
        )))
    }
}
