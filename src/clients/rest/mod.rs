//! REST Admin API client.
//!
//! - [`RestClient`]: `get()`, `post()`, `put()`, `delete()` through the
//!   shop's REST admission controller
//! - [`RestError`]: error type for REST operations
//!
//! # Path Normalization
//!
//! - Leading slashes are stripped: `/products` -> `products`
//! - `.json` is added if missing: `products` -> `products.json`
//! - Paths starting with `admin/` are used as given (relative to the shop
//!   origin); all others get `admin/api/{version}/` in front
//! - An inline query string is kept: `products?limit=5` -> `products.json?limit=5`

mod client;
mod errors;

pub use client::RestClient;
pub use errors::RestError;
