//! Type conversions from GraphQL response types to domain types.
//!
//! `graphql_client` generates separate structs per operation, so the product,
//! metafield and user error selections shared by several operations are
//! converted through macros that only touch field names.

/// Convert a generated product (with `variants.nodes`) to an [`AdminProduct`].
///
/// [`AdminProduct`]: crate::shopify::types::AdminProduct
macro_rules! convert_product {
    ($module:ident, $product:expr) => {{
        use $crate::shopify::admin::queries::$module::ProductStatus as WireStatus;

        let product = $product;
        $crate::shopify::types::AdminProduct {
            id: canopy_core::ProductGid::new(product.id),
            title: product.title,
            handle: Some(product.handle),
            status: match product.status {
                WireStatus::ACTIVE => canopy_core::ProductStatus::Active,
                WireStatus::ARCHIVED => canopy_core::ProductStatus::Archived,
                WireStatus::UNLISTED => canopy_core::ProductStatus::Unlisted,
                WireStatus::DRAFT | WireStatus::Other(_) => canopy_core::ProductStatus::Draft,
            },
            variants: product
                .variants
                .nodes
                .into_iter()
                .map(|v| $crate::shopify::types::AdminProductVariant {
                    id: canopy_core::VariantGid::new(v.id),
                    price: v.price,
                })
                .collect(),
        }
    }};
}

/// Convert a generated metafield node to a [`Metafield`].
///
/// [`Metafield`]: crate::shopify::types::Metafield
macro_rules! convert_metafield {
    ($node:expr) => {{
        let node = $node;
        $crate::shopify::types::Metafield {
            id: Some(node.id),
            namespace: node.namespace,
            key: node.key,
            value: node.value,
            type_: node.type_,
        }
    }};
}

/// Convert generated `userErrors` to [`UserError`]s without a code.
///
/// [`UserError`]: crate::shopify::types::UserError
macro_rules! convert_user_errors {
    ($errors:expr) => {
        $errors
            .into_iter()
            .map(|e| $crate::shopify::types::UserError {
                field: e.field,
                message: e.message,
                code: None,
            })
            .collect::<Vec<_>>()
    };
}

pub(super) use {convert_metafield, convert_product, convert_user_errors};

/// Convert a generated error code enum to its wire name.
pub fn error_code_to_string<T: std::fmt::Debug>(code: T) -> String {
    format!("{code:?}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use canopy_core::ProductStatus;

    use super::super::queries::{app_metafield, get_product};

    fn product_response(status: &str) -> get_product::ResponseData {
        serde_json::from_value(serde_json::json!({
            "product": {
                "id": "gid://shopify/Product/7",
                "title": "Support Tree Planting",
                "handle": "support-tree-planting",
                "status": status,
                "variants": { "nodes": [{ "id": "gid://shopify/ProductVariant/70", "price": "5.00" }] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_convert_product_status() {
        let active = convert_product!(get_product, product_response("ACTIVE").product.unwrap());
        assert_eq!(active.status, ProductStatus::Active);
        assert_eq!(active.handle.as_deref(), Some("support-tree-planting"));
        assert_eq!(active.first_variant_price(), "5.00");

        let archived =
            convert_product!(get_product, product_response("ARCHIVED").product.unwrap());
        assert_eq!(archived.status, ProductStatus::Archived);

        let unknown =
            convert_product!(get_product, product_response("SOMETHING_NEW").product.unwrap());
        assert_eq!(unknown.status, ProductStatus::Draft);
    }

    #[test]
    fn test_convert_metafield_keeps_type() {
        let data: app_metafield::ResponseData = serde_json::from_value(serde_json::json!({
            "currentAppInstallation": {
                "id": "gid://shopify/AppInstallation/1",
                "metafield": {
                    "id": "gid://shopify/Metafield/9",
                    "namespace": "tree_planting",
                    "key": "cart_enabled",
                    "value": "true",
                    "type": "boolean"
                }
            }
        }))
        .unwrap();

        let metafield = convert_metafield!(data.current_app_installation.metafield.unwrap());
        assert_eq!(metafield.id.as_deref(), Some("gid://shopify/Metafield/9"));
        assert_eq!(metafield.key, "cart_enabled");
        assert_eq!(metafield.type_, "boolean");
    }
}
