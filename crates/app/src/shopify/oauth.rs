//! Shopify OAuth install flow.
//!
//! The app requests offline access tokens: one long-lived token per shop,
//! stored in the `shop_sessions` table and used for every Admin API call.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use canopy_core::ShopDomain;

use super::AdminShopifyError;
use crate::config::ShopifyAppConfig;

/// Offline token returned by the code exchange.
#[derive(Debug, Clone)]
pub struct OAuthToken {
    /// Shop the token belongs to.
    pub shop: String,
    /// The access token for API calls.
    pub access_token: SecretString,
    /// Granted scopes (comma-separated).
    pub scope: String,
    /// When the token was obtained.
    pub obtained_at: DateTime<Utc>,
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    scope: String,
}

/// Redirect URI registered for the OAuth callback.
#[must_use]
pub fn redirect_uri(config: &ShopifyAppConfig) -> String {
    format!("{}/auth/callback", config.app_url)
}

/// Generate the OAuth authorization URL for a shop.
///
/// Redirect the merchant to this URL to begin the install flow.
#[must_use]
pub fn authorization_url(config: &ShopifyAppConfig, shop: &ShopDomain, state: &str) -> String {
    let scope = config.scopes.join(",");
    format!(
        "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
        shop.as_str(),
        urlencoding::encode(&config.api_key),
        urlencoding::encode(&scope),
        urlencoding::encode(&redirect_uri(config)),
        urlencoding::encode(state)
    )
}

/// Exchange an authorization code for an offline access token.
///
/// # Errors
///
/// Returns `AdminShopifyError::OAuth` if the token exchange fails.
/// Returns `AdminShopifyError::Http` if the HTTP request fails.
pub async fn exchange_code(
    http: &reqwest::Client,
    config: &ShopifyAppConfig,
    shop: &ShopDomain,
    code: &str,
) -> Result<OAuthToken, AdminShopifyError> {
    let url = format!("https://{}/admin/oauth/access_token", shop.as_str());
    exchange_code_at(http, &url, config, shop.as_str(), code).await
}

/// Exchange an authorization code against an explicit token endpoint.
///
/// # Errors
///
/// Returns `AdminShopifyError::OAuth` if the token exchange fails.
/// Returns `AdminShopifyError::Http` if the HTTP request fails.
#[instrument(skip(http, config, code))]
pub async fn exchange_code_at(
    http: &reqwest::Client,
    url: &str,
    config: &ShopifyAppConfig,
    shop: &str,
    code: &str,
) -> Result<OAuthToken, AdminShopifyError> {
    let params = [
        ("client_id", config.api_key.as_str()),
        ("client_secret", config.api_secret.expose_secret()),
        ("code", code),
    ];

    let response = http.post(url).form(&params).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AdminShopifyError::OAuth(format!(
            "Token exchange failed ({status}): {text}"
        )));
    }

    let token_response: OAuthTokenResponse = response.json().await?;

    Ok(OAuthToken {
        shop: shop.to_string(),
        access_token: SecretString::from(token_response.access_token),
        scope: token_response.scope,
        obtained_at: Utc::now(),
    })
}
