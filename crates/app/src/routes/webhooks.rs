//! Shopify webhook receivers.
//!
//! ```text
//! POST /webhooks/orders/create    - Track donation line items
//! POST /webhooks/app/uninstalled  - Drop the shop's offline session
//! ```
//!
//! Every delivery is authenticated with the `X-Shopify-Hmac-Sha256` header
//! before the body is parsed.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::services::orders::{OrderPayload, WebhookOutcome, process_order};
use crate::services::MetafieldError;
use crate::shopify::hmac::{WEBHOOK_HMAC_HEADER, verify_webhook_hmac};
use crate::state::AppState;

/// Header carrying the shop domain of a delivery.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// Header carrying the webhook topic.
pub const TOPIC_HEADER: &str = "x-shopify-topic";

/// Errors from webhook handling.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// HMAC header missing or wrong.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// Shop header missing or not a valid shop domain.
    #[error("missing shop domain")]
    MissingShop,

    /// Body is not the expected JSON.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    /// Session lookup failed.
    #[error(transparent)]
    Database(#[from] RepositoryError),

    /// Metafield read or write failed.
    #[error(transparent)]
    Metafield(#[from] MetafieldError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::MissingShop | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) | Self::Metafield(_) => {
                let event_id = sentry::capture_error(&self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Webhook processing failed"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_client_error() {
            tracing::warn!(error = %self, "Webhook rejected");
        }
        (status, status.canonical_reason().unwrap_or_default()).into_response()
    }
}

/// Verify the delivery and return its shop domain.
fn authenticate(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<String, WebhookError> {
    let signature = headers
        .get(WEBHOOK_HMAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::InvalidSignature)?;
    if !verify_webhook_hmac(body, signature, state.config().shopify.api_secret.expose_secret()) {
        return Err(WebhookError::InvalidSignature);
    }

    headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| state.parse_shop(raw))
        .map(|shop| shop.as_str().to_string())
        .ok_or(WebhookError::MissingShop)
}

/// Topic named in the delivery headers, for logging.
fn topic(headers: &HeaderMap) -> &str {
    headers
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// POST /webhooks/orders/create - Count donation line items.
#[instrument(skip_all, fields(topic = topic(&headers), shop, order_id))]
pub async fn orders_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let shop = authenticate(&state, &headers, &body)?;
    tracing::Span::current().record("shop", shop.as_str());

    let order: OrderPayload = serde_json::from_slice(&body)?;
    tracing::Span::current().record("order_id", order.id);

    let Some(session) = state.shop_session(&shop).await? else {
        tracing::warn!("Order webhook for a shop without a session, ignoring");
        return Ok(StatusCode::OK);
    };

    let store = state.metafield_store(&session);
    let outcome = process_order(&store, &order, &state.config().donation, Utc::now()).await?;

    match &outcome {
        WebhookOutcome::NotConfigured => tracing::info!("No donation product configured"),
        WebhookOutcome::NoDonation => tracing::debug!("Order has no donation items"),
        WebhookOutcome::Duplicate => tracing::info!("Order already tracked"),
        WebhookOutcome::LimitExceeded { quantity } => {
            tracing::warn!(quantity, "Monthly usage limit reached, donation not tracked");
        }
        WebhookOutcome::Recorded { quantity, usage } => {
            tracing::info!(quantity, usage, "Donation tracked");
        }
    }

    Ok(StatusCode::OK)
}

/// POST /webhooks/app/uninstalled - Remove the shop's offline session.
#[instrument(skip_all, fields(topic = topic(&headers), shop))]
pub async fn app_uninstalled(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    let shop = authenticate(&state, &headers, &body)?;
    tracing::Span::current().record("shop", shop.as_str());

    let removed = state.remove_shop_session(&shop).await?;
    tracing::info!(removed, "App uninstalled");
    Ok(StatusCode::OK)
}
