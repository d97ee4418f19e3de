//! GraphQL operation definitions for the Shopify Admin API.
//!
//! Uses `graphql_client` to generate typed variables and responses from the
//! documents in `graphql/admin/`, checked against `graphql/admin/schema.graphql`.

use graphql_client::GraphQLQuery;

// =============================================================================
// Custom scalar type aliases (used by graphql_client)
// =============================================================================

/// Money amount as decimal string.
type Money = String;

// =============================================================================
// Product operations
// =============================================================================

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/product.graphql",
    response_derives = "Debug, Clone"
)]
pub struct GetProduct;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/find_products.graphql",
    response_derives = "Debug, Clone"
)]
pub struct FindProducts;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/product_create.graphql",
    response_derives = "Debug, Clone"
)]
pub struct ProductCreate;

// =============================================================================
// App installation & metafield operations
// =============================================================================

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/current_app_installation.graphql",
    response_derives = "Debug, Clone"
)]
pub struct CurrentAppInstallation;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/app_metafields.graphql",
    response_derives = "Debug, Clone"
)]
pub struct AppMetafields;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/app_metafield.graphql",
    response_derives = "Debug, Clone"
)]
pub struct AppMetafield;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/metafields_set.graphql",
    response_derives = "Debug, Clone"
)]
pub struct MetafieldsSet;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/metafields_delete.graphql",
    response_derives = "Debug, Clone"
)]
pub struct MetafieldsDelete;

// =============================================================================
// Shop operations
// =============================================================================

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/admin/schema.graphql",
    query_path = "graphql/admin/shop.graphql",
    response_derives = "Debug, Clone"
)]
pub struct ShopDomain;
