//! Product catalog walks built on the pagination helpers.

use std::future::Future;

use serde_json::Value;

use crate::clients::pagination::{PaginationError, RestPages, MAX_PAGE_SIZE};
use crate::gateway::ShopClient;

const PRODUCT_IDS_BY_TAG: &str = "query ($after: String, $query: String) {
  products(first: 250, after: $after, query: $query) {
    edges { cursor node { id } }
    pageInfo { hasNextPage }
  }
}";

fn product_pages(client: &ShopClient) -> RestPages {
    client
        .rest_pages("products", "products")
        .page_size(MAX_PAGE_SIZE)
}

/// Calls `on_product` for every product, 250 per request, ordered by id.
///
/// # Errors
///
/// Returns [`PaginationError`] if a page request fails.
pub async fn walk_products<F, Fut>(client: &ShopClient, on_product: F) -> Result<usize, PaginationError>
where
    F: FnMut(Value) -> Fut,
    Fut: Future<Output = ()>,
{
    client.walk(&product_pages(client), on_product).await
}

/// Every product in the shop.
///
/// # Errors
///
/// Returns [`PaginationError`] if a page request fails.
pub async fn all_products(client: &ShopClient) -> Result<Vec<Value>, PaginationError> {
    client.collect_all(&product_pages(client)).await
}

/// Numeric ids of every product carrying `tag`.
///
/// # Errors
///
/// Returns [`PaginationError`] if a page request fails.
pub async fn product_ids_by_tag(client: &ShopClient, tag: &str) -> Result<Vec<u64>, PaginationError> {
    let connection = client
        .graphql_connection(PRODUCT_IDS_BY_TAG, ["products"])
        .variable("query", tag_query(tag));

    let nodes = client.collect_all(&connection).await?;
    Ok(nodes
        .iter()
        .filter_map(|node| node.get("id").and_then(Value::as_str))
        .filter_map(legacy_id)
        .collect())
}

/// Search expression matching one exact tag.
fn tag_query(tag: &str) -> String {
    let escaped = tag.replace('\\', "\\\\").replace('"', "\\\"");
    format!("tag:\"{escaped}\"")
}

/// `gid://shopify/Product/123` -> `123`.
fn legacy_id(gid: &str) -> Option<u64> {
    gid.rsplit('/').next()?.parse().ok()
}
