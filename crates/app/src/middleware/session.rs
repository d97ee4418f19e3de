//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The app runs
//! inside the Shopify admin iframe, so over HTTPS the cookie is
//! `SameSite=None; Secure`; plain-HTTP development falls back to `Lax`.

use sqlx::PgPool;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "canopy_session";

/// Session expiry time in seconds (24 hours).
const SESSION_EXPIRY_SECONDS: i64 = 24 * 60 * 60;

/// Create the session layer with `PostgreSQL` store.
///
/// The store uses the default `tower_sessions.session` table, created by
/// `canopy-cli migrate`.
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &AppConfig) -> SessionManagerLayer<PostgresStore> {
    let store = PostgresStore::new(pool.clone());
    let is_secure = config.is_https();

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(same_site(is_secure))
        .with_http_only(true)
        .with_path("/")
}

/// Cookie `SameSite` policy for the iframe.
#[must_use]
pub const fn same_site(is_secure: bool) -> SameSite {
    if is_secure { SameSite::None } else { SameSite::Lax }
}
