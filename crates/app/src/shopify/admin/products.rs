//! Product operations for the Admin API.

use canopy_core::ProductStatus;
use tracing::instrument;

use super::{
    AdminClient, AdminShopifyError, GraphQLError,
    conversions::{convert_product, convert_user_errors},
    queries::{FindProducts, GetProduct, ProductCreate, find_products, get_product, product_create},
};
use crate::shopify::types::{AdminProduct, ProductCreateInput};

impl AdminClient {
    /// Get a product by ID.
    ///
    /// # Arguments
    ///
    /// * `id` - Shopify product ID (e.g., `gid://shopify/Product/123`)
    ///
    /// Returns `Ok(None)` when the product does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn get_product(&self, id: &str) -> Result<Option<AdminProduct>, AdminShopifyError> {
        let variables = get_product::Variables { id: id.to_string() };

        let response = self.execute::<GetProduct>(variables).await?;

        Ok(response
            .product
            .map(|product| convert_product!(get_product, product)))
    }

    /// Find products whose title matches exactly.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or returns an error response.
    #[instrument(skip(self), fields(shop = %self.shop()))]
    pub async fn find_products_by_title(
        &self,
        title: &str,
        first: i64,
    ) -> Result<Vec<AdminProduct>, AdminShopifyError> {
        let variables = find_products::Variables {
            first,
            query: format!("title:'{}'", title.replace('\'', "\\'")),
        };

        let response = self.execute::<FindProducts>(variables).await?;

        Ok(response
            .products
            .nodes
            .into_iter()
            .map(|product| convert_product!(find_products, product))
            .collect())
    }

    /// Create a new product.
    ///
    /// Returns the created product with its first variant.
    ///
    /// # Errors
    ///
    /// Returns `AdminShopifyError::UserError` carrying the first user error
    /// message when Shopify rejects the input.
    #[instrument(skip(self, input), fields(shop = %self.shop(), title = %input.title))]
    pub async fn create_product(
        &self,
        input: ProductCreateInput,
    ) -> Result<AdminProduct, AdminShopifyError> {
        use product_create::ProductStatus as WireStatus;

        let status = match input.status {
            ProductStatus::Active => WireStatus::ACTIVE,
            ProductStatus::Archived => WireStatus::ARCHIVED,
            ProductStatus::Unlisted => WireStatus::UNLISTED,
            ProductStatus::Draft => WireStatus::DRAFT,
        };

        let variables = product_create::Variables {
            product: product_create::ProductCreateInput {
                title: Some(input.title),
                product_type: input.product_type,
                vendor: input.vendor,
                description_html: input.description_html,
                tags: Some(input.tags),
                status: Some(status),
            },
        };

        let response = self.execute::<ProductCreate>(variables).await?;

        if let Some(payload) = response.product_create {
            let user_errors = convert_user_errors!(payload.user_errors);
            if let Some(first) = user_errors.first() {
                tracing::warn!(
                    errors = %crate::shopify::types::format_user_errors(&user_errors),
                    "productCreate returned user errors"
                );
                return Err(AdminShopifyError::UserError(first.message.clone()));
            }

            if let Some(product) = payload.product {
                return Ok(convert_product!(product_create, product));
            }
        }

        Err(AdminShopifyError::GraphQL(vec![GraphQLError::message(
            "No product returned from create",
        )]))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use canopy_core::ProductStatus;
    use secrecy::SecretString;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> AdminClient {
        AdminClient::with_endpoint(
            reqwest::Client::new(),
            "test-shop.myshopify.com",
            SecretString::from("shpat_test"),
            format!("{}/graphql.json", server.uri()),
        )
    }

    #[tokio::test]
    async fn test_get_product_missing_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": { "product": null } })),
            )
            .mount(&server)
            .await;

        let product = client_for(&server)
            .get_product("gid://shopify/Product/404")
            .await
            .unwrap();
        assert!(product.is_none());
    }

    #[tokio::test]
    async fn test_find_products_by_title_quotes_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "variables": { "query": "title:'Support Tree Planting'" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "products": { "nodes": [{
                    "id": "gid://shopify/Product/7",
                    "title": "Support Tree Planting",
                    "handle": "support-tree-planting",
                    "status": "ACTIVE",
                    "variants": { "nodes": [{ "id": "gid://shopify/ProductVariant/70", "price": "5.00" }] }
                }] } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let products = client_for(&server)
            .find_products_by_title("Support Tree Planting", 1)
            .await
            .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].status, ProductStatus::Active);
        assert_eq!(products[0].first_variant_price(), "5.00");
    }

    #[tokio::test]
    async fn test_create_product_user_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "productCreate": {
                    "product": null,
                    "userErrors": [{ "field": ["title"], "message": "Title can't be blank" }]
                } }
            })))
            .mount(&server)
            .await;

        let input = ProductCreateInput {
            title: String::new(),
            product_type: None,
            vendor: None,
            description_html: None,
            tags: vec![],
            status: ProductStatus::Active,
        };
        let err = client_for(&server).create_product(input).await.unwrap_err();
        assert_eq!(err.to_string(), "User error: Title can't be blank");
    }
}
