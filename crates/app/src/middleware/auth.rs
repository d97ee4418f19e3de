//! Shop authentication extractor for embedded admin pages.
//!
//! A page request is authenticated either by a signed launch query string
//! (`shop`, `hmac`, `timestamp`, `host` from the Shopify admin) or by the
//! shop bound to the browser session by an earlier signed launch.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use tower_sessions::Session;

use crate::db::ShopSession;
use crate::error::{AppError, set_sentry_shop};
use crate::models::{CurrentShop, session_keys};
use crate::services::MetafieldStore;
use crate::shopify::hmac::{timestamp_is_fresh, verify_query_hmac};
use crate::state::AppState;

/// Extractor that requires an installed, authenticated shop.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(admin: ShopAdmin) -> impl IntoResponse {
///     let metafields = admin.store.settings().await?;
///     // ...
/// }
/// ```
pub struct ShopAdmin {
    /// Offline session of the shop.
    pub session: ShopSession,
    /// Metafield store bound to the shop and app namespace.
    pub store: MetafieldStore,
    /// Admin `host` parameter, when known.
    pub host: Option<String>,
}

impl ShopAdmin {
    /// Shop domain.
    #[must_use]
    pub fn shop(&self) -> &str {
        &self.session.shop
    }
}

/// Error returned when a page is opened without a usable shop session.
#[derive(Debug)]
pub enum ShopAuthRejection {
    /// The shop has no offline token yet (or lacks scopes): run OAuth.
    Install { shop: String, embedded: bool },
    /// No shop could be identified.
    MissingShop,
    /// The launch query string failed HMAC verification.
    InvalidSignature,
    /// Session or database failure.
    Internal(AppError),
}

impl IntoResponse for ShopAuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Install { shop, embedded } => {
                let mut target = format!("/auth?shop={}", urlencoding::encode(&shop));
                if embedded {
                    target.push_str("&embedded=1");
                }
                Redirect::to(&target).into_response()
            }
            Self::MissingShop => (
                StatusCode::UNAUTHORIZED,
                "Open this app from your Shopify admin.",
            )
                .into_response(),
            Self::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response()
            }
            Self::Internal(err) => err.into_response(),
        }
    }
}

/// Launch parameters read from a page query string.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LaunchParams {
    pub shop: Option<String>,
    pub host: Option<String>,
    pub signed: bool,
    pub embedded: bool,
}

impl LaunchParams {
    /// Read launch parameters from a raw query string.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "shop" => params.shop = Some(value.into_owned()),
                "host" => params.host = Some(value.into_owned()),
                "hmac" => params.signed = true,
                "embedded" => params.embedded = value == "1",
                _ => {}
            }
        }
        params
    }
}

impl FromRequestParts<AppState> for ShopAdmin {
    type Rejection = ShopAuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(ShopAuthRejection::MissingShop)?;

        let query = parts.uri.query().unwrap_or_default();
        let launch = LaunchParams::from_query(query);

        let current = if launch.signed {
            if !verify_query_hmac(query, state.config().shopify.api_secret.expose_secret()) {
                tracing::warn!(shop = ?launch.shop, "Launch HMAC verification failed");
                return Err(ShopAuthRejection::InvalidSignature);
            }
            if !timestamp_is_fresh(query, Utc::now()) {
                tracing::warn!(shop = ?launch.shop, "Launch timestamp outside the allowed window");
                return Err(ShopAuthRejection::InvalidSignature);
            }
            let shop = launch
                .shop
                .as_deref()
                .and_then(|raw| state.parse_shop(raw))
                .ok_or(ShopAuthRejection::MissingShop)?;
            let current = CurrentShop {
                shop: shop.as_str().to_string(),
                host: launch.host.clone(),
            };
            session
                .insert(session_keys::CURRENT_SHOP, &current)
                .await
                .map_err(|e| ShopAuthRejection::Internal(e.into()))?;
            current
        } else {
            let bound: Option<CurrentShop> = session
                .get(session_keys::CURRENT_SHOP)
                .await
                .map_err(|e| ShopAuthRejection::Internal(e.into()))?;
            match (bound, launch.shop.as_deref().and_then(|raw| state.parse_shop(raw))) {
                (Some(bound), None) => bound,
                (Some(bound), Some(requested)) if bound.shop == requested.as_str() => bound,
                // Unsigned request for a shop this browser hasn't launched: start OAuth.
                (_, Some(requested)) => {
                    return Err(ShopAuthRejection::Install {
                        shop: requested.as_str().to_string(),
                        embedded: launch.embedded,
                    });
                }
                (None, None) => return Err(ShopAuthRejection::MissingShop),
            }
        };

        let shop_session = state
            .shop_session(&current.shop)
            .await
            .map_err(|e| ShopAuthRejection::Internal(e.into()))?
            .filter(|s| s.has_scopes(&state.config().shopify.scopes))
            .ok_or_else(|| ShopAuthRejection::Install {
                shop: current.shop.clone(),
                embedded: launch.embedded,
            })?;

        set_sentry_shop(&shop_session.shop);

        Ok(Self {
            store: state.metafield_store(&shop_session),
            session: shop_session,
            host: current.host,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_params_from_query() {
        let params = LaunchParams::from_query(
            "embedded=1&hmac=abc&host=YWRtaW4&shop=canopy-test.myshopify.com&timestamp=1",
        );
        assert_eq!(params.shop.as_deref(), Some("canopy-test.myshopify.com"));
        assert_eq!(params.host.as_deref(), Some("YWRtaW4"));
        assert!(params.signed);
        assert!(params.embedded);
    }

    #[test]
    fn test_launch_params_unsigned() {
        let params = LaunchParams::from_query("period=current-month");
        assert_eq!(params, LaunchParams::default());
    }

    #[test]
    fn test_install_rejection_redirects_to_auth() {
        let response = ShopAuthRejection::Install {
            shop: "canopy-test.myshopify.com".to_string(),
            embedded: true,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            "/auth?shop=canopy-test.myshopify.com&embedded=1"
        );
    }
}
