//! Cart toggle and cart attribute sync against a mocked Admin API.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use canopy_app::services::DonationError;
use canopy_app::services::donation::{set_cart_enabled, sync_cart_attributes};
use canopy_integration_tests::{
    expect_no_writes, expect_set, metafield, metafield_store, mock_list, product,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

fn with_product(extra: Vec<Value>) -> Vec<Value> {
    let mut fields = vec![
        metafield("product_id", "single_line_text_field", "gid://shopify/Product/100"),
        metafield("donation_amount", "single_line_text_field", "5.00"),
    ];
    fields.extend(extra);
    fields
}

async fn mock_get_product(server: &MockServer, product: Value) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "operationName": "GetProduct" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "product": product } })),
        )
        .mount(server)
        .await;
}

/// A product whose variant list came back empty.
fn product_without_variants() -> Value {
    let mut node = product(100, "ACTIVE", 200, "5.00");
    node["variants"] = json!({ "nodes": [] });
    node
}

#[tokio::test]
async fn test_enable_without_product_is_refused() {
    let server = MockServer::start().await;
    mock_list(&server, vec![]).await;
    expect_no_writes(&server).await;

    let err = set_cart_enabled(&metafield_store(&server), true, now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::ProductRequired));
}

#[tokio::test]
async fn test_enable_with_deleted_product_is_refused() {
    let server = MockServer::start().await;
    mock_list(&server, with_product(vec![])).await;
    mock_get_product(&server, Value::Null).await;
    expect_no_writes(&server).await;

    let err = set_cart_enabled(&metafield_store(&server), true, now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::ProductRequired));
}

#[tokio::test]
async fn test_enable_without_variant_writes_nothing() {
    let server = MockServer::start().await;
    mock_list(&server, with_product(vec![])).await;
    mock_get_product(&server, product_without_variants()).await;
    expect_no_writes(&server).await;

    let err = set_cart_enabled(&metafield_store(&server), true, now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::VariantNotFound));
}

#[tokio::test]
async fn test_enable_writes_flag_attributes_and_theme_config() {
    let server = MockServer::start().await;
    mock_list(&server, with_product(vec![])).await;
    mock_get_product(&server, product(100, "ACTIVE", 200, "5.00")).await;
    expect_set(
        &server,
        json!({ "key": "cart_enabled", "type": "boolean", "value": "true" }),
        1,
    )
    .await;
    expect_set(&server, json!({ "key": "cart_attributes", "type": "json" }), 1).await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "MetafieldsSet",
            "variables": { "metafields": [
                { "key": "donation_enabled", "value": "true" },
                { "key": "donation_amount", "value": "5.00" },
                { "key": "donation_product_id", "value": "gid://shopify/Product/100" },
                { "key": "donation_variant_id", "value": "gid://shopify/ProductVariant/200" },
                { "key": "theme_extension_config", "type": "json" }
            ] }
        })))
        .respond_with(canopy_integration_tests::set_response())
        .expect(1)
        .mount(&server)
        .await;

    let config = set_cart_enabled(&metafield_store(&server), true, now())
        .await
        .unwrap();

    assert!(config.donation_enabled);
    assert_eq!(config.donation_amount, "5.00");
    assert_eq!(
        config.donation_variant_id.as_deref(),
        Some("gid://shopify/ProductVariant/200")
    );
}

#[tokio::test]
async fn test_disable_skips_cart_attributes() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        with_product(vec![metafield("cart_enabled", "boolean", "true")]),
    )
    .await;
    mock_get_product(&server, product_without_variants()).await;
    expect_set(
        &server,
        json!({ "key": "cart_enabled", "value": "false" }),
        1,
    )
    .await;
    expect_set(&server, json!({ "key": "cart_attributes" }), 0).await;
    expect_set(
        &server,
        json!({ "key": "donation_enabled", "value": "false" }),
        1,
    )
    .await;

    let config = set_cart_enabled(&metafield_store(&server), false, now())
        .await
        .unwrap();

    assert!(!config.donation_enabled);
    assert!(config.donation_variant_id.is_none());
}

#[tokio::test]
async fn test_sync_requires_cart_enabled() {
    let server = MockServer::start().await;
    mock_list(&server, with_product(vec![])).await;
    expect_no_writes(&server).await;

    let err = sync_cart_attributes(&metafield_store(&server), now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::NotReady));
}

#[tokio::test]
async fn test_sync_without_variant_is_refused() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        with_product(vec![metafield("cart_enabled", "boolean", "true")]),
    )
    .await;
    mock_get_product(&server, product_without_variants()).await;
    expect_no_writes(&server).await;

    let err = sync_cart_attributes(&metafield_store(&server), now())
        .await
        .unwrap_err();

    assert!(matches!(err, DonationError::VariantNotFound));
}

#[tokio::test]
async fn test_sync_writes_cart_attributes() {
    let server = MockServer::start().await;
    mock_list(
        &server,
        with_product(vec![metafield("cart_enabled", "boolean", "true")]),
    )
    .await;
    mock_get_product(&server, product(100, "ACTIVE", 200, "5.00")).await;
    expect_set(&server, json!({ "key": "cart_attributes", "type": "json" }), 1).await;

    let attributes = sync_cart_attributes(&metafield_store(&server), now())
        .await
        .unwrap();

    assert_eq!(attributes.donation_enabled, "true");
    assert_eq!(attributes.donation_amount, "5.00");
    assert_eq!(attributes.donation_product_id, "gid://shopify/Product/100");
    assert_eq!(attributes.donation_variant_id, "gid://shopify/ProductVariant/200");
    assert_eq!(attributes.last_updated, now());
}
