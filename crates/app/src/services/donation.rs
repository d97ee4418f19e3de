//! Donation product lifecycle, cart toggle and storefront configuration.
//!
//! The donation product is a regular Shopify product created once per shop.
//! Its id, price and cart visibility are mirrored into app metafields so the
//! theme extension and the app proxy can read them without Admin API access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use canopy_core::ProductStatus;

use super::metafields::{
    MetafieldError, MetafieldStore, MetafieldType, MetafieldValue, ParsedMetafields, keys,
};
use crate::shopify::{AdminProduct, AdminShopifyError, ProductCreateInput};

/// Title of the donation product (also used to find an existing one).
pub const DONATION_PRODUCT_TITLE: &str = "Support Tree Planting";

/// Donation amount shown before a product exists.
pub const DEFAULT_DONATION_AMOUNT: &str = "0.00";

/// Donation amount the theme extension falls back to.
pub const DEFAULT_THEME_DONATION_AMOUNT: &str = "5.00";

/// Message returned by the app proxy when donations are off.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "Tree planting donation is not configured. Please enable it in the app settings.";

/// Errors from donation operations.
#[derive(Debug, Error)]
pub enum DonationError {
    /// Metafield read or write failed.
    #[error(transparent)]
    Metafield(#[from] MetafieldError),

    /// Admin API call failed.
    #[error(transparent)]
    Api(#[from] AdminShopifyError),

    /// A live donation product already exists.
    #[error("Product already exists. Please delete it in Shopify first.")]
    AlreadyExists,

    /// The action needs a donation product.
    #[error("Create the donation product first.")]
    ProductRequired,

    /// Cart attributes need a product and the cart toggle on.
    #[error("Product not created or cart not enabled")]
    NotReady,

    /// The donation product has no variants.
    #[error("Product variant not found")]
    VariantNotFound,
}

impl DonationError {
    /// Message safe to show the merchant.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(AdminShopifyError::UserError(message))
            | Self::Metafield(MetafieldError::Api(AdminShopifyError::UserError(message))) => {
                message.clone()
            }
            Self::Api(_) | Self::Metafield(_) => {
                "Shopify request failed. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// Snapshot of the created product, stored in `product_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductData {
    pub product_id: String,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    pub price: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: ProductStatus,
}

impl ProductData {
    fn from_product(product: &AdminProduct, now: DateTime<Utc>) -> Self {
        Self {
            product_id: product.id.to_string(),
            title: product.title.clone(),
            handle: product.handle.clone(),
            price: product.first_variant_price(),
            variant_id: product.first_variant().map(|v| v.id.to_string()),
            created_at: now,
            status: product.status,
        }
    }
}

/// State shown on the home page.
#[derive(Debug, Clone)]
pub struct DonationSetup {
    pub product: Option<AdminProduct>,
    pub exists: bool,
    pub donation_amount: String,
    pub cart_enabled: bool,
    pub product_data: Option<ProductData>,
}

/// Cart attributes mirrored for the theme extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartAttributes {
    pub donation_enabled: String,
    pub donation_amount: String,
    pub donation_product_id: String,
    pub donation_variant_id: String,
    pub last_updated: DateTime<Utc>,
}

/// Configuration read by the storefront theme extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeExtensionConfig {
    pub donation_enabled: bool,
    pub donation_amount: String,
    pub donation_product_id: Option<String>,
    pub donation_variant_id: Option<String>,
}

impl Default for ThemeExtensionConfig {
    fn default() -> Self {
        Self {
            donation_enabled: false,
            donation_amount: DEFAULT_THEME_DONATION_AMOUNT.to_string(),
            donation_product_id: None,
            donation_variant_id: None,
        }
    }
}

/// JSON answered to the storefront app proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub donation_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_title: Option<String>,
}

impl ProxyConfig {
    /// Response for shops without an enabled donation product.
    #[must_use]
    pub fn disabled(message: impl Into<String>) -> Self {
        Self {
            enabled: false,
            message: Some(message.into()),
            shop: None,
            donation_amount: None,
            product_id: None,
            variant_id: None,
            product_title: None,
        }
    }
}

/// Input for the donation product mutation.
#[must_use]
pub fn donation_product_input() -> ProductCreateInput {
    ProductCreateInput {
        title: DONATION_PRODUCT_TITLE.to_string(),
        product_type: Some("Donation".to_string()),
        vendor: Some("Tree Planting".to_string()),
        description_html: Some(
            "<p>Support tree planting with your purchase. Every donation helps plant trees \
             and restore our environment.</p>"
                .to_string(),
        ),
        tags: vec![
            "donation".to_string(),
            "tree-planting".to_string(),
            "charity".to_string(),
        ],
        status: ProductStatus::Active,
    }
}

// =============================================================================
// Home page
// =============================================================================

/// Load the donation setup, reconciling metafields with Shopify.
///
/// A stored product id that no longer resolves is cleared; when no product
/// is known, an existing product titled "Support Tree Planting" is adopted.
///
/// # Errors
///
/// Returns an error if any Admin API call fails.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn load_setup(store: &MetafieldStore) -> Result<DonationSetup, DonationError> {
    let metafields = store.settings().await?;
    let mut donation_amount = metafields.non_empty_text(keys::DONATION_AMOUNT);
    let mut product = None;

    if let Some(product_id) = metafields.non_empty_text(keys::PRODUCT_ID) {
        match store.client().get_product(&product_id).await? {
            Some(found) => {
                let price = found.first_variant_price();
                if donation_amount.as_deref() != Some(price.as_str()) {
                    store
                        .set(keys::DONATION_AMOUNT, MetafieldType::SingleLineText, price.as_str())
                        .await?;
                    donation_amount = Some(price);
                }
                product = Some(found);
            }
            None => {
                tracing::info!(%product_id, "Stored donation product no longer exists, clearing");
                store.delete(keys::PRODUCT_ID).await?;
            }
        }
    }

    if product.is_none() {
        let found = store
            .client()
            .find_products_by_title(DONATION_PRODUCT_TITLE, 10)
            .await?
            .into_iter()
            .next();
        if let Some(found) = found {
            let price = found.first_variant_price();
            tracing::info!(product_id = %found.id, "Adopting existing donation product");
            store
                .set_many(&[
                    (
                        keys::PRODUCT_ID,
                        MetafieldType::SingleLineText,
                        MetafieldValue::Text(found.id.to_string()),
                    ),
                    (
                        keys::DONATION_AMOUNT,
                        MetafieldType::SingleLineText,
                        MetafieldValue::Text(price.clone()),
                    ),
                ])
                .await?;
            donation_amount = Some(price);
            product = Some(found);
        }
    }

    Ok(DonationSetup {
        exists: product.is_some(),
        product,
        donation_amount: donation_amount.unwrap_or_else(|| DEFAULT_DONATION_AMOUNT.to_string()),
        cart_enabled: metafields.flag(keys::CART_ENABLED),
        product_data: metafields.json(keys::PRODUCT_DATA),
    })
}

/// Create the donation product and record it in metafields.
///
/// # Errors
///
/// Returns `DonationError::AlreadyExists` when a non-archived product is
/// already stored, or the first user error message from `productCreate`.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn create_donation_product(
    store: &MetafieldStore,
    now: DateTime<Utc>,
) -> Result<AdminProduct, DonationError> {
    let metafields = store.settings().await?;

    if let Some(product_id) = metafields.non_empty_text(keys::PRODUCT_ID)
        && let Some(existing) = store.client().get_product(&product_id).await?
        && existing.is_live()
    {
        return Err(DonationError::AlreadyExists);
    }

    let product = store
        .client()
        .create_product(donation_product_input())
        .await?;
    let data = ProductData::from_product(&product, now);

    store
        .set_many(&[
            (
                keys::PRODUCT_ID,
                MetafieldType::SingleLineText,
                MetafieldValue::Text(product.id.to_string()),
            ),
            (
                keys::DONATION_AMOUNT,
                MetafieldType::SingleLineText,
                MetafieldValue::Text(data.price.clone()),
            ),
            (
                keys::PRODUCT_DATA,
                MetafieldType::Json,
                MetafieldValue::Json(serde_json::to_value(&data).unwrap_or_default()),
            ),
            (
                keys::CART_ENABLED,
                MetafieldType::Boolean,
                MetafieldValue::Boolean(false),
            ),
        ])
        .await?;

    tracing::info!(product_id = %product.id, price = %data.price, "Donation product created");
    Ok(product)
}

// =============================================================================
// Cart settings
// =============================================================================

/// Turn the cart checkbox on or off and update the storefront config.
///
/// # Errors
///
/// Returns `DonationError::ProductRequired` when no product exists, or any
/// Admin API failure.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn set_cart_enabled(
    store: &MetafieldStore,
    enabled: bool,
    now: DateTime<Utc>,
) -> Result<ThemeExtensionConfig, DonationError> {
    let metafields = store.settings().await?;
    let Some(product_id) = metafields.non_empty_text(keys::PRODUCT_ID) else {
        return Err(DonationError::ProductRequired);
    };
    let product = store
        .client()
        .get_product(&product_id)
        .await?
        .ok_or(DonationError::ProductRequired)?;

    let variant_id = product.first_variant().map(|v| v.id.to_string());
    if enabled && variant_id.is_none() {
        return Err(DonationError::VariantNotFound);
    }

    store
        .set(keys::CART_ENABLED, MetafieldType::Boolean, enabled)
        .await?;

    if enabled && let Some(variant_id) = variant_id.as_deref() {
        write_cart_attributes(
            store,
            &product_id,
            variant_id,
            &donation_amount_or_theme_default(&metafields),
            now,
        )
        .await?;
    }

    let config = ThemeExtensionConfig {
        donation_enabled: enabled,
        donation_amount: donation_amount_or_theme_default(&metafields),
        donation_product_id: Some(product_id),
        donation_variant_id: variant_id,
    };
    update_theme_extension_config(store, &config).await?;

    tracing::info!(enabled, "Cart display updated");
    Ok(config)
}

/// Mirror the donation product into `cart_attributes`.
///
/// # Errors
///
/// Returns `DonationError::NotReady` without a product or with the cart off,
/// `DonationError::VariantNotFound` when the product has no variant.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn sync_cart_attributes(
    store: &MetafieldStore,
    now: DateTime<Utc>,
) -> Result<CartAttributes, DonationError> {
    let metafields = store.settings().await?;
    let product_id = metafields
        .non_empty_text(keys::PRODUCT_ID)
        .filter(|_| metafields.flag(keys::CART_ENABLED))
        .ok_or(DonationError::NotReady)?;

    let variant_id = store
        .client()
        .get_product(&product_id)
        .await?
        .and_then(|p| p.first_variant().map(|v| v.id.to_string()))
        .ok_or(DonationError::VariantNotFound)?;

    write_cart_attributes(
        store,
        &product_id,
        &variant_id,
        &donation_amount_or_theme_default(&metafields),
        now,
    )
    .await
}

async fn write_cart_attributes(
    store: &MetafieldStore,
    product_id: &str,
    variant_id: &str,
    donation_amount: &str,
    now: DateTime<Utc>,
) -> Result<CartAttributes, DonationError> {
    let attributes = CartAttributes {
        donation_enabled: "true".to_string(),
        donation_amount: donation_amount.to_string(),
        donation_product_id: product_id.to_string(),
        donation_variant_id: variant_id.to_string(),
        last_updated: now,
    };
    store
        .set(
            keys::CART_ATTRIBUTES,
            MetafieldType::Json,
            serde_json::to_value(&attributes).unwrap_or_default(),
        )
        .await?;
    Ok(attributes)
}

fn donation_amount_or_theme_default(metafields: &ParsedMetafields) -> String {
    metafields
        .non_empty_text(keys::DONATION_AMOUNT)
        .unwrap_or_else(|| DEFAULT_THEME_DONATION_AMOUNT.to_string())
}

// =============================================================================
// Theme extension
// =============================================================================

/// Build the theme extension config from parsed metafields.
///
/// The `theme_extension_config` blob wins when present; otherwise the
/// individual keys of the store's namespace are used.
#[must_use]
pub fn theme_config_from_metafields(
    metafields: &ParsedMetafields,
    namespace: &str,
) -> ThemeExtensionConfig {
    let blob = metafields
        .get(keys::THEME_EXTENSION_CONFIG)
        .and_then(|v| match v {
            MetafieldValue::Json(serde_json::Value::Object(map)) => Some(map.clone()),
            _ => None,
        });
    let scoped = metafields.namespace(namespace);

    let lookup = |key: &str| -> Option<MetafieldValue> {
        match &blob {
            Some(map) => map.get(key).cloned().map(MetafieldValue::Json),
            None => scoped.and_then(|ns| ns.get(key).cloned()),
        }
    };
    let text = |key: &str| {
        lookup(key)
            .filter(|v| !matches!(v, MetafieldValue::Json(serde_json::Value::Null)))
            .map(|v| v.to_text())
            .filter(|s| !s.trim().is_empty())
    };

    ThemeExtensionConfig {
        donation_enabled: lookup(keys::DONATION_ENABLED).is_some_and(|v| v.is_true()),
        donation_amount: text(keys::DONATION_AMOUNT)
            .unwrap_or_else(|| DEFAULT_THEME_DONATION_AMOUNT.to_string()),
        donation_product_id: text(keys::DONATION_PRODUCT_ID).or_else(|| text(keys::PRODUCT_ID)),
        donation_variant_id: text(keys::DONATION_VARIANT_ID),
    }
}

/// Read the theme extension config; failures yield the disabled default.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn theme_extension_config(store: &MetafieldStore) -> ThemeExtensionConfig {
    match store.settings().await {
        Ok(metafields) => theme_config_from_metafields(&metafields, store.namespace()),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read theme extension config");
            ThemeExtensionConfig::default()
        }
    }
}

/// Write the theme extension config as individual keys plus one JSON blob.
///
/// # Errors
///
/// Returns an error if the metafield write fails.
#[instrument(skip(store, config), fields(shop = %store.client().shop()))]
pub async fn update_theme_extension_config(
    store: &MetafieldStore,
    config: &ThemeExtensionConfig,
) -> Result<(), DonationError> {
    let mut entries = vec![
        (
            keys::DONATION_ENABLED,
            MetafieldType::Boolean,
            MetafieldValue::Boolean(config.donation_enabled),
        ),
        (
            keys::DONATION_AMOUNT,
            MetafieldType::SingleLineText,
            MetafieldValue::Text(config.donation_amount.clone()),
        ),
    ];
    if let Some(product_id) = &config.donation_product_id {
        entries.push((
            keys::DONATION_PRODUCT_ID,
            MetafieldType::SingleLineText,
            MetafieldValue::Text(product_id.clone()),
        ));
    }
    if let Some(variant_id) = &config.donation_variant_id {
        entries.push((
            keys::DONATION_VARIANT_ID,
            MetafieldType::SingleLineText,
            MetafieldValue::Text(variant_id.clone()),
        ));
    }
    entries.push((
        keys::THEME_EXTENSION_CONFIG,
        MetafieldType::Json,
        MetafieldValue::Json(serde_json::to_value(config).unwrap_or_default()),
    ));

    store.set_many(&entries).await?;
    Ok(())
}

// =============================================================================
// App proxy
// =============================================================================

/// Donation config answered to the storefront through the app proxy.
///
/// # Errors
///
/// Returns an error if the Admin API calls fail.
#[instrument(skip(store), fields(shop = %store.client().shop()))]
pub async fn app_proxy_config(store: &MetafieldStore) -> Result<ProxyConfig, DonationError> {
    let metafields = store.settings().await?;
    let Some(product_id) = metafields
        .non_empty_text(keys::PRODUCT_ID)
        .filter(|_| metafields.flag(keys::CART_ENABLED))
    else {
        return Ok(ProxyConfig::disabled(NOT_CONFIGURED_MESSAGE));
    };

    let product = store.client().get_product(&product_id).await?;

    Ok(ProxyConfig {
        enabled: true,
        message: None,
        shop: Some(store.client().shop().to_string()),
        donation_amount: Some(donation_amount_or_theme_default(&metafields)),
        variant_id: product
            .as_ref()
            .and_then(|p| p.first_variant().map(|v| v.id.to_string())),
        product_title: Some(
            product
                .map(|p| p.title)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DONATION_PRODUCT_TITLE.to_string()),
        ),
        product_id: Some(product_id),
    })
}
