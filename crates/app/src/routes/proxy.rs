//! Storefront app proxy.
//!
//! Shopify forwards `https://{shop}/apps/canopy/donation` to
//! `GET /proxy/donation`, signing the query with the app secret.

use axum::{
    Json,
    extract::{Query, RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use crate::services::ProxyConfig;
use crate::services::donation::{NOT_CONFIGURED_MESSAGE, app_proxy_config};
use crate::shopify::hmac::{timestamp_is_fresh, verify_proxy_signature};
use crate::state::AppState;

/// Query parameters Shopify adds to proxied requests.
#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub shop: Option<String>,
}

/// GET /proxy/donation - Donation config for the storefront widget.
#[instrument(skip(state, query), fields(shop = ?params.shop))]
pub async fn donation(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    Query(params): Query<ProxyParams>,
) -> Response {
    let secret = state.config().shopify.api_secret.expose_secret();
    let query = query.as_deref().unwrap_or_default();
    if !verify_proxy_signature(query, secret) {
        tracing::warn!("Invalid app proxy signature");
        return (StatusCode::UNAUTHORIZED, "Invalid request signature").into_response();
    }
    if !timestamp_is_fresh(query, Utc::now()) {
        tracing::warn!("App proxy timestamp outside the allowed window");
        return (StatusCode::UNAUTHORIZED, "Request has expired").into_response();
    }

    let Some(shop) = params.shop.as_deref().and_then(|raw| state.parse_shop(raw)) else {
        return (StatusCode::BAD_REQUEST, "Missing shop").into_response();
    };

    let session = match state.shop_session(shop.as_str()).await {
        Ok(Some(session)) => session,
        Ok(None) => return Json(ProxyConfig::disabled(NOT_CONFIGURED_MESSAGE)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load shop session");
            return Json(ProxyConfig::disabled(NOT_CONFIGURED_MESSAGE)).into_response();
        }
    };

    let config = match app_proxy_config(&state.metafield_store(&session)).await {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load donation config");
            ProxyConfig::disabled(NOT_CONFIGURED_MESSAGE)
        }
    };

    Json(config).into_response()
}
