//! Shopify OAuth install flow.
//!
//! ```text
//! GET /               - Landing page (redirects to /app when opened by Shopify)
//! GET /auth           - Start OAuth for ?shop=
//! GET /auth/callback  - Verify and exchange the authorization code
//! ```

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64_NO_PAD;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::ShopSession;
use crate::models::{CurrentShop, session_keys};
use crate::shopify::hmac::{timestamp_is_fresh, verify_query_hmac};
use crate::shopify::oauth;
use crate::state::AppState;

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/landing.html")]
pub struct LandingTemplate {
    pub error: Option<String>,
}

/// Page that moves the browser out of the admin iframe.
#[derive(Template, WebTemplate)]
#[template(path = "auth/exit_iframe.html")]
pub struct ExitIframeTemplate {
    pub redirect_url: String,
}

/// Query parameters for starting OAuth.
#[derive(Debug, Deserialize)]
pub struct BeginParams {
    pub shop: Option<String>,
    pub embedded: Option<String>,
}

/// Query parameters on the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub shop: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub host: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// GET / - Landing page, or hand the launch query string to `/app`.
pub async fn landing(RawQuery(query): RawQuery) -> Response {
    match query {
        Some(query) if query.contains("shop=") => {
            Redirect::to(&format!("/app?{query}")).into_response()
        }
        _ => LandingTemplate { error: None }.into_response(),
    }
}

/// GET /auth - Start the OAuth flow for a shop.
#[instrument(skip(state, session))]
pub async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<BeginParams>,
) -> Response {
    let Some(shop) = params.shop.as_deref().and_then(|raw| state.parse_shop(raw)) else {
        return (
            StatusCode::BAD_REQUEST,
            LandingTemplate {
                error: Some("Enter a valid myshopify.com domain.".to_string()),
            },
        )
            .into_response();
    };

    // Cookies set inside the iframe may not reach the top-level callback,
    // so restart the flow at top level first.
    if params.embedded.as_deref() == Some("1") {
        let redirect_url = format!(
            "{}/auth?shop={}",
            state.config().shopify.app_url,
            urlencoding::encode(shop.as_str())
        );
        return ExitIframeTemplate { redirect_url }.into_response();
    }

    let oauth_state = uuid::Uuid::new_v4().to_string();
    if let Err(e) = session.insert(session_keys::OAUTH_STATE, &oauth_state).await {
        tracing::error!("Failed to store OAuth state: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Could not start installation").into_response();
    }

    let auth_url = oauth::authorization_url(&state.config().shopify, &shop, &oauth_state);
    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Redirect::to(&auth_url).into_response()
}

/// GET /auth/callback - Verify the callback and store the offline token.
#[instrument(skip(state, session, query, params), fields(shop = ?params.shop))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(query): RawQuery,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        tracing::warn!("Shopify OAuth error: {} - {}", error, description);
        return (StatusCode::FORBIDDEN, "Installation was cancelled").into_response();
    }

    let secret = state.config().shopify.api_secret.expose_secret();
    let query = query.as_deref().unwrap_or_default();
    if !verify_query_hmac(query, secret) {
        tracing::error!("Invalid HMAC signature in OAuth callback");
        return (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response();
    }
    if !timestamp_is_fresh(query, Utc::now()) {
        tracing::warn!("OAuth callback timestamp outside the allowed window");
        return (StatusCode::UNAUTHORIZED, "Request has expired").into_response();
    }

    let (Some(shop), Some(code), Some(callback_state)) = (
        params.shop.as_deref().and_then(|raw| state.parse_shop(raw)),
        params.code.as_deref(),
        params.state.as_deref(),
    ) else {
        tracing::error!("OAuth callback is missing shop, code or state");
        return (StatusCode::BAD_REQUEST, "Invalid OAuth callback").into_response();
    };

    let stored_state: Option<String> = session.get(session_keys::OAUTH_STATE).await.ok().flatten();
    if stored_state.as_deref() != Some(callback_state) {
        tracing::error!("OAuth state mismatch - possible CSRF attack");
        return (StatusCode::FORBIDDEN, "Installation session expired, please retry").into_response();
    }
    let _ = session.remove::<String>(session_keys::OAUTH_STATE).await;

    let token =
        match oauth::exchange_code(state.http(), &state.config().shopify, &shop, code).await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!("Failed to exchange OAuth code: {}", e);
                return (StatusCode::BAD_GATEWAY, "Could not complete installation")
                    .into_response();
            }
        };

    if let Err(e) = state.save_shop_session(ShopSession::from(token)).await {
        tracing::error!("Failed to save shop session: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Could not complete installation")
            .into_response();
    }

    let current = CurrentShop {
        shop: shop.as_str().to_string(),
        host: params.host.clone(),
    };
    if let Err(e) = session.insert(session_keys::CURRENT_SHOP, &current).await {
        tracing::warn!("Failed to bind shop to session: {}", e);
    }

    tracing::info!(shop = %shop, "App installed");
    Redirect::to(&embedded_app_url(
        shop.as_str(),
        params.host.as_deref(),
        &state.config().shopify.api_key,
    ))
    .into_response()
}

/// URL of the app inside the Shopify admin.
///
/// The `host` parameter is the base64-encoded admin host
/// (e.g. `admin.shopify.com/store/name`); without it the shop's own admin
/// is used.
#[must_use]
pub fn embedded_app_url(shop: &str, host: Option<&str>, api_key: &str) -> String {
    let admin_host = host
        .and_then(|h| BASE64_NO_PAD.decode(h.trim_end_matches('=')).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|h| {
            !h.contains(['?', '#', '@'])
                && (h.starts_with("admin.shopify.com/store/") || h.ends_with(".myshopify.com/admin"))
        })
        .unwrap_or_else(|| format!("{shop}/admin"));
    format!("https://{admin_host}/apps/{api_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_app_url_from_host() {
        // base64("admin.shopify.com/store/canopy-test")
        let host = "YWRtaW4uc2hvcGlmeS5jb20vc3RvcmUvY2Fub3B5LXRlc3Q";
        assert_eq!(
            embedded_app_url("canopy-test.myshopify.com", Some(host), "key123"),
            "https://admin.shopify.com/store/canopy-test/apps/key123"
        );
    }

    #[test]
    fn test_embedded_app_url_without_host() {
        assert_eq!(
            embedded_app_url("canopy-test.myshopify.com", None, "key123"),
            "https://canopy-test.myshopify.com/admin/apps/key123"
        );
        assert_eq!(
            embedded_app_url("canopy-test.myshopify.com", Some("%%%"), "key123"),
            "https://canopy-test.myshopify.com/admin/apps/key123"
        );
    }
}
