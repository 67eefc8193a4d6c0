//! Session credentials for a single tenant.

use crate::config::ShopDomain;
use chrono::{DateTime, Utc};

/// Credentials for making API calls on behalf of one shop.
///
/// The shop domain doubles as the tenant key: every client built from a
/// session for the same shop shares that shop's rate state.
///
/// # Example
///
/// ```rust
/// use shopify_gateway::{Session, ShopDomain};
///
/// let session = Session::new(ShopDomain::new("my-store").unwrap(), "shpat_123");
/// assert!(session.is_active());
/// assert!(!session.expired());
/// ```
#[derive(Clone, Debug)]
pub struct Session {
    /// The shop this session is for.
    pub shop: ShopDomain,

    /// The access token sent as `X-Shopify-Access-Token`. May be empty for
    /// unauthenticated calls.
    pub access_token: String,

    /// When the token expires, if it does.
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Creates a non-expiring session.
    #[must_use]
    pub fn new(shop: ShopDomain, access_token: impl Into<String>) -> Self {
        Self {
            shop,
            access_token: access_token.into(),
            expires: None,
        }
    }

    /// Sets the token expiry.
    #[must_use]
    pub const fn with_expiry(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Returns `true` if this session has expired.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.expires.is_some_and(|expires| Utc::now() > expires)
    }

    /// Returns `true` if the session has a token that has not expired.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.access_token.is_empty() && !self.expired()
    }
}

// Verify Session is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Session>();
};
