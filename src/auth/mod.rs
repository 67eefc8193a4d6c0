//! Per-shop credentials.
//!
//! Token acquisition (OAuth, token exchange) happens elsewhere; the gateway
//! only needs the shop a token belongs to and the token itself. See
//! [`Session`].

pub mod session;

pub use session::Session;
