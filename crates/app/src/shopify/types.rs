//! Domain types for the Shopify Admin API.
//!
//! These types provide a clean, ergonomic API separate from the raw
//! response shapes in `admin::queries`.

use serde::{Deserialize, Serialize};

use canopy_core::{ProductGid, ProductStatus, VariantGid};

// =============================================================================
// Metafield Types
// =============================================================================

/// A metafield as stored by Shopify: every value travels as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafield {
    /// Metafield ID.
    pub id: Option<String>,
    /// Namespace for grouping metafields.
    pub namespace: String,
    /// Key within the namespace.
    pub key: String,
    /// The metafield value (wire representation).
    pub value: String,
    /// The metafield type tag (e.g., `boolean`, `json`, `number_integer`).
    #[serde(rename = "type")]
    pub type_: String,
}

/// Input for `metafieldsSet`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafieldsSetInput {
    /// Namespace for the metafield.
    pub namespace: String,
    /// Key within the namespace.
    pub key: String,
    /// The metafield type tag.
    #[serde(rename = "type")]
    pub type_: String,
    /// The wire value.
    pub value: String,
    /// Owning resource GID (the app installation).
    pub owner_id: String,
}

/// Identifier for `metafieldsDelete`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafieldIdentifierInput {
    /// Owning resource GID.
    pub owner_id: String,
    /// Namespace of the metafield.
    pub namespace: String,
    /// Key of the metafield.
    pub key: String,
}

// =============================================================================
// Product Types
// =============================================================================

/// A product with the fields the donation flow reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminProduct {
    /// Product ID.
    pub id: ProductGid,
    /// Product title.
    pub title: String,
    /// URL handle.
    pub handle: Option<String>,
    /// Product status.
    pub status: ProductStatus,
    /// Variants (first page only).
    pub variants: Vec<AdminProductVariant>,
}

impl AdminProduct {
    /// First variant, which carries the donation price.
    #[must_use]
    pub fn first_variant(&self) -> Option<&AdminProductVariant> {
        self.variants.first()
    }

    /// Price of the first variant, `"0.00"` when the product has none.
    #[must_use]
    pub fn first_variant_price(&self) -> String {
        self.first_variant()
            .map_or_else(|| "0.00".to_string(), |v| v.price.clone())
    }

    /// Whether the product still counts as present (anything but archived).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status != ProductStatus::Archived
    }
}

/// A product variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminProductVariant {
    /// Variant ID.
    pub id: VariantGid,
    /// Price as a decimal string (e.g., `"5.00"`).
    pub price: String,
}

/// Input for creating a product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreateInput {
    /// Product title.
    pub title: String,
    /// Product type/category.
    pub product_type: Option<String>,
    /// Vendor name.
    pub vendor: Option<String>,
    /// HTML description.
    pub description_html: Option<String>,
    /// Product tags.
    pub tags: Vec<String>,
    /// Product status.
    pub status: ProductStatus,
}

// =============================================================================
// Mutation Errors
// =============================================================================

/// A user error returned by a mutation payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserError {
    /// Path to the offending input field.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable message.
    pub message: String,
    /// Machine-readable code, when the mutation provides one.
    #[serde(default)]
    pub code: Option<String>,
}

/// Join user errors into a single message.
#[must_use]
pub fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(|e| {
            let field = e.field.as_ref().map_or_else(String::new, |f| f.join("."));
            if field.is_empty() {
                e.message.clone()
            } else {
                format!("{}: {}", field, e.message)
            }
        })
        .collect::<Vec<_>>()
        .join("; ")
}
