//! Donation product creation and setup reconciliation against a mocked
//! Admin API.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use canopy_app::services::DonationError;
use canopy_app::services::donation::{create_donation_product, load_setup};
use canopy_integration_tests::{
    INSTALLATION_ID, NAMESPACE, expect_no_writes, expect_set, metafield, metafield_store,
    mock_list, product,
};

async fn mock_get_product(server: &MockServer, product: serde_json::Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "GetProduct" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "product": product } })),
        )
        .mount(server)
        .await;
}

async fn mock_find_products(server: &MockServer, nodes: Vec<serde_json::Value>, count: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "FindProducts",
            "variables": { "query": "title:'Support Tree Planting'" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "products": { "nodes": nodes } }
        })))
        .expect(count)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_issues_one_product_create_and_stores_price() {
    let server = MockServer::start().await;
    mock_list(&server, vec![]).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "ProductCreate",
            "variables": { "product": { "title": "Support Tree Planting" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "productCreate": {
                "product": product(100, "ACTIVE", 200, "5.00"),
                "userErrors": []
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "MetafieldsSet",
            "variables": { "metafields": [
                { "key": "product_id", "value": "gid://shopify/Product/100",
                  "ownerId": "gid://shopify/AppInstallation/9" },
                { "key": "donation_amount", "value": "5.00" }
            ] }
        })))
        .respond_with(canopy_integration_tests::set_response())
        .expect(1)
        .mount(&server)
        .await;

    let created = create_donation_product(&metafield_store(&server), Utc::now())
        .await
        .unwrap();

    assert_eq!(created.id.as_str(), "gid://shopify/Product/100");
    assert_eq!(created.first_variant_price(), "5.00");
}

#[tokio::test]
async fn test_create_refuses_when_live_product_exists() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        vec![metafield(
            "product_id",
            "single_line_text_field",
            "gid://shopify/Product/100",
        )],
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "GetProduct" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "product": product(100, "DRAFT", 200, "5.00") }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "ProductCreate" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    expect_no_writes(&server).await;

    let err = create_donation_product(&metafield_store(&server), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::AlreadyExists));
}

#[tokio::test]
async fn test_create_replaces_archived_product() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        vec![metafield(
            "product_id",
            "single_line_text_field",
            "gid://shopify/Product/100",
        )],
    )
    .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "GetProduct" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "product": product(100, "ARCHIVED", 200, "5.00") }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "ProductCreate" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "productCreate": {
                "product": product(101, "ACTIVE", 201, "5.00"),
                "userErrors": []
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    expect_set(
        &server,
        json!({ "key": "product_id", "value": "gid://shopify/Product/101" }),
        1,
    )
    .await;

    let created = create_donation_product(&metafield_store(&server), Utc::now())
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "gid://shopify/Product/101");
}

#[tokio::test]
async fn test_load_setup_resyncs_donation_amount_from_price() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        vec![
            metafield("product_id", "single_line_text_field", "gid://shopify/Product/100"),
            metafield("donation_amount", "single_line_text_field", "4.00"),
            metafield("cart_enabled", "boolean", "true"),
        ],
    )
    .await;
    mock_get_product(&server, product(100, "ACTIVE", 200, "6.50")).await;
    mock_find_products(&server, vec![], 0).await;
    expect_set(
        &server,
        json!({ "key": "donation_amount", "value": "6.50" }),
        1,
    )
    .await;

    let setup = load_setup(&metafield_store(&server)).await.unwrap();

    assert!(setup.exists);
    assert!(setup.cart_enabled);
    assert_eq!(setup.donation_amount, "6.50");
}

#[tokio::test]
async fn test_load_setup_leaves_matching_amount_alone() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        vec![
            metafield("product_id", "single_line_text_field", "gid://shopify/Product/100"),
            metafield("donation_amount", "single_line_text_field", "5.00"),
        ],
    )
    .await;
    mock_get_product(&server, product(100, "ACTIVE", 200, "5.00")).await;
    expect_no_writes(&server).await;

    let setup = load_setup(&metafield_store(&server)).await.unwrap();

    assert!(setup.exists);
    assert!(!setup.cart_enabled);
    assert_eq!(setup.donation_amount, "5.00");
}

#[tokio::test]
async fn test_load_setup_clears_stale_product_id() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        vec![metafield(
            "product_id",
            "single_line_text_field",
            "gid://shopify/Product/404",
        )],
    )
    .await;
    mock_get_product(&server, serde_json::Value::Null).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "MetafieldsDelete",
            "variables": { "metafields": [
                { "ownerId": INSTALLATION_ID, "namespace": NAMESPACE, "key": "product_id" }
            ] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "metafieldsDelete": {
                "deletedMetafields": [
                    { "ownerId": INSTALLATION_ID, "namespace": NAMESPACE, "key": "product_id" }
                ],
                "userErrors": []
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mock_find_products(&server, vec![], 1).await;
    expect_no_writes(&server).await;

    let setup = load_setup(&metafield_store(&server)).await.unwrap();

    assert!(!setup.exists);
    assert!(setup.product.is_none());
    assert_eq!(setup.donation_amount, "0.00");
}

#[tokio::test]
async fn test_load_setup_adopts_existing_product_by_title() {
    let server = MockServer::start().await;
    mock_list(&server, vec![]).await;
    mock_find_products(&server, vec![product(300, "ACTIVE", 301, "10.00")], 1).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "MetafieldsSet",
            "variables": { "metafields": [
                { "key": "product_id", "value": "gid://shopify/Product/300",
                  "ownerId": INSTALLATION_ID },
                { "key": "donation_amount", "value": "10.00" }
            ] }
        })))
        .respond_with(canopy_integration_tests::set_response())
        .expect(1)
        .mount(&server)
        .await;

    let setup = load_setup(&metafield_store(&server)).await.unwrap();

    assert!(setup.exists);
    assert_eq!(
        setup.product.map(|p| p.id.to_string()).as_deref(),
        Some("gid://shopify/Product/300")
    );
    assert_eq!(setup.donation_amount, "10.00");
}
