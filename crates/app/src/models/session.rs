//! Types stored in the browser session.

use serde::{Deserialize, Serialize};

/// The shop whose admin opened the app.
///
/// Bound to the browser session after a signed launch so later page loads
/// inside the iframe don't need the launch query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentShop {
    /// Shop domain (e.g., your-store.myshopify.com).
    pub shop: String,
    /// Base64 `host` parameter from the admin, used by App Bridge.
    #[serde(default)]
    pub host: Option<String>,
}

/// Session keys.
pub mod keys {
    /// Key for the shop bound to this browser session.
    pub const CURRENT_SHOP: &str = "current_shop";

    /// Key for the OAuth `state` nonce of an install in progress.
    pub const OAUTH_STATE: &str = "oauth_state";

    /// Key for the token embedded in admin page forms.
    pub const CSRF_TOKEN: &str = "csrf_token";
}
