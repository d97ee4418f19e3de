//! App installation metafields as the app's key/value state.
//!
//! Every piece of durable business state (donation product, cart toggle,
//! usage counter, tracked orders) lives in metafields owned by the current app
//! installation, all under one namespace. [`MetafieldStore`] is the only way
//! the rest of the app reads or writes them.
//!
//! Values travel as strings tagged with a Shopify type. Reading coerces by tag
//! ([`parse_metafields`]); writing coerces back to the wire string
//! ([`encode_value`]). Both directions share one boolean rule: a value is true
//! only when it is the boolean `true` or the text `"true"` (any case).

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::shopify::{
    AdminClient, AdminShopifyError, Metafield, MetafieldIdentifierInput, MetafieldsSetInput,
};

/// Maximum number of metafields returned by [`MetafieldStore::list`].
pub const LIST_LIMIT: i64 = 100;

/// Metafield keys used by the app.
pub mod keys {
    use chrono::NaiveDate;

    pub const PRODUCT_ID: &str = "product_id";
    pub const DONATION_AMOUNT: &str = "donation_amount";
    pub const CART_ENABLED: &str = "cart_enabled";
    pub const PRODUCT_DATA: &str = "product_data";
    pub const DONATION_PRODUCT_ID: &str = "donation_product_id";
    pub const DONATION_VARIANT_ID: &str = "donation_variant_id";
    pub const DONATION_ENABLED: &str = "donation_enabled";
    pub const THEME_EXTENSION_CONFIG: &str = "theme_extension_config";
    pub const CART_ATTRIBUTES: &str = "cart_attributes";
    pub const ORDERS_DATA: &str = "orders_data";
    pub const USAGE_COUNT: &str = "usage_count";
    pub const USAGE_PERIOD: &str = "usage_period";
    pub const PLAN: &str = "plan";

    /// Configuration and counter keys read by [`super::MetafieldStore::settings`].
    ///
    /// Per-order markers and limit records are left out; they grow without
    /// bound and are only ever looked up one key at a time.
    pub const SETTINGS: [&str; 13] = [
        PRODUCT_ID,
        DONATION_AMOUNT,
        CART_ENABLED,
        PRODUCT_DATA,
        DONATION_PRODUCT_ID,
        DONATION_VARIANT_ID,
        DONATION_ENABLED,
        THEME_EXTENSION_CONFIG,
        CART_ATTRIBUTES,
        ORDERS_DATA,
        USAGE_COUNT,
        USAGE_PERIOD,
        PLAN,
    ];

    /// Per-order tracking marker, keyed by the numeric order id.
    #[must_use]
    pub fn order_marker(order_id: &str) -> String {
        format!("order_{}", canopy_core::numeric_id(order_id))
    }

    /// Marker for donations rejected by the usage limit on a given day.
    #[must_use]
    pub fn limit_exceeded(date: NaiveDate) -> String {
        format!("limit_exceeded_{}", date.format("%Y-%m-%d"))
    }
}

/// Errors from metafield reads and writes.
#[derive(Debug, Error)]
pub enum MetafieldError {
    /// The Admin API call failed or returned user errors.
    #[error(transparent)]
    Api(#[from] AdminShopifyError),

    /// `metafieldsSet` succeeded but returned no metafield.
    #[error("metafield {0} was not returned by metafieldsSet")]
    NotReturned(String),
}

// =============================================================================
// Types
// =============================================================================

/// Shopify metafield type tags used by the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetafieldType {
    SingleLineText,
    Boolean,
    Json,
    NumberInteger,
    NumberDecimal,
}

impl MetafieldType {
    /// The Shopify type tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleLineText => "single_line_text_field",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::NumberInteger => "number_integer",
            Self::NumberDecimal => "number_decimal",
        }
    }

    /// Parse a type tag; unknown tags are treated as text.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "boolean" => Self::Boolean,
            "json" => Self::Json,
            "number_integer" => Self::NumberInteger,
            "number_decimal" => Self::NumberDecimal,
            _ => Self::SingleLineText,
        }
    }
}

impl std::fmt::Display for MetafieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetafieldType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_tag(s))
    }
}

/// A metafield value coerced from its wire string.
#[derive(Debug, Clone, PartialEq)]
pub enum MetafieldValue {
    Json(serde_json::Value),
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
}

impl MetafieldValue {
    /// The boolean rule shared by reads and writes.
    #[must_use]
    pub fn is_true(&self) -> bool {
        match self {
            Self::Boolean(b) | Self::Json(serde_json::Value::Bool(b)) => *b,
            Self::Text(s) | Self::Json(serde_json::Value::String(s)) => is_true_text(s),
            _ => false,
        }
    }

    /// Render as plain text (the wire form for scalar values).
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(serde_json::Value::String(s)) | Self::Text(s) => s.clone(),
            Self::Json(v) => v.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Decimal(d) => d.to_string(),
        }
    }
}

impl From<bool> for MetafieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for MetafieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Decimal> for MetafieldValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<String> for MetafieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetafieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<serde_json::Value> for MetafieldValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

fn is_true_text(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("true")
}

// =============================================================================
// Coercion
// =============================================================================

/// Coerce a wire string by its type tag.
///
/// JSON-tagged values and text that looks like JSON (`{...}` or `[...]`) are
/// parsed; parse failures keep the raw string.
#[must_use]
pub fn parse_value(type_tag: &str, raw: &str) -> MetafieldValue {
    if type_tag == "json" || raw.starts_with('{') || raw.starts_with('[') {
        return serde_json::from_str(raw)
            .map_or_else(|_| MetafieldValue::Text(raw.to_string()), MetafieldValue::Json);
    }

    match MetafieldType::from_tag(type_tag) {
        MetafieldType::Boolean => MetafieldValue::Boolean(is_true_text(raw)),
        MetafieldType::NumberInteger => raw
            .trim()
            .parse()
            .map_or_else(|_| MetafieldValue::Text(raw.to_string()), MetafieldValue::Integer),
        MetafieldType::NumberDecimal => Decimal::from_str(raw.trim())
            .map_or_else(|_| MetafieldValue::Text(raw.to_string()), MetafieldValue::Decimal),
        MetafieldType::SingleLineText | MetafieldType::Json => {
            MetafieldValue::Text(raw.to_string())
        }
    }
}

/// Coerce a value to the wire string for a type tag.
#[must_use]
pub fn encode_value(type_: MetafieldType, value: &MetafieldValue) -> String {
    match type_ {
        MetafieldType::Boolean => value.is_true().to_string(),
        _ => value.to_text(),
    }
}

/// Metafields coerced by type, indexed by key and by namespace.
#[derive(Debug, Clone, Default)]
pub struct ParsedMetafields {
    by_key: HashMap<String, MetafieldValue>,
    by_namespace: HashMap<String, HashMap<String, MetafieldValue>>,
}

/// Coerce a list of raw metafields.
#[must_use]
pub fn parse_metafields(metafields: &[Metafield]) -> ParsedMetafields {
    let mut parsed = ParsedMetafields::default();
    for metafield in metafields {
        let value = parse_value(&metafield.type_, &metafield.value);
        parsed
            .by_namespace
            .entry(metafield.namespace.clone())
            .or_default()
            .insert(metafield.key.clone(), value.clone());
        parsed.by_key.insert(metafield.key.clone(), value);
    }
    parsed
}

impl ParsedMetafields {
    /// Value for a bare key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetafieldValue> {
        self.by_key.get(key)
    }

    /// All values in one namespace.
    #[must_use]
    pub fn namespace(&self, namespace: &str) -> Option<&HashMap<String, MetafieldValue>> {
        self.by_namespace.get(namespace)
    }

    /// Value as text, `None` when absent.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(MetafieldValue::to_text)
    }

    /// Value as non-empty text.
    #[must_use]
    pub fn non_empty_text(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.trim().is_empty())
    }

    /// Boolean flag; absent keys are `false`.
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(MetafieldValue::is_true)
    }

    /// Value as an integer.
    #[must_use]
    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            MetafieldValue::Integer(i) => Some(*i),
            MetafieldValue::Json(serde_json::Value::Number(n)) => n.as_i64(),
            other => other.to_text().trim().parse().ok(),
        }
    }

    /// Value as a decimal.
    #[must_use]
    pub fn decimal(&self, key: &str) -> Option<Decimal> {
        match self.get(key)? {
            MetafieldValue::Decimal(d) => Some(*d),
            MetafieldValue::Integer(i) => Some(Decimal::from(*i)),
            other => Decimal::from_str(other.to_text().trim()).ok(),
        }
    }

    /// Deserialize a JSON value.
    #[must_use]
    pub fn json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.get(key)? {
            MetafieldValue::Json(v) => serde_json::from_value(v.clone()).ok(),
            MetafieldValue::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }

    /// Number of parsed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether nothing was parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Iterate over keys and values.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetafieldValue)> {
        self.by_key.iter()
    }
}

// =============================================================================
// Store
// =============================================================================

/// Key/value access to the app installation's metafields in one namespace.
///
/// The owning installation id is resolved once per store instance.
#[derive(Debug, Clone)]
pub struct MetafieldStore {
    client: AdminClient,
    namespace: String,
    owner_id: OnceCell<String>,
}

impl MetafieldStore {
    /// Create a store over a shop's Admin API client.
    #[must_use]
    pub fn new(client: AdminClient, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            owner_id: OnceCell::new(),
        }
    }

    /// The underlying Admin API client.
    #[must_use]
    pub const fn client(&self) -> &AdminClient {
        &self.client
    }

    /// The namespace all keys live in.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn owner_id(&self) -> Result<&str, MetafieldError> {
        let id = self
            .owner_id
            .get_or_try_init(|| async { self.client.current_app_installation_id().await })
            .await?;
        Ok(id.as_str())
    }

    fn remember_owner(&self, id: String) {
        // Already set is fine: the installation id never changes.
        let _ = self.owner_id.set(id);
    }

    /// List the first 100 metafields in the namespace, order markers included.
    ///
    /// # Errors
    ///
    /// Returns an error if the Admin API call fails.
    #[instrument(skip(self), fields(shop = %self.client.shop(), namespace = %self.namespace))]
    pub async fn list(&self) -> Result<ParsedMetafields, MetafieldError> {
        let (owner, metafields) = self
            .client
            .app_metafields(&self.namespace, LIST_LIMIT, None)
            .await?;
        self.remember_owner(owner);
        Ok(parse_metafields(&metafields))
    }

    /// Read the app's configuration and counter keys by name.
    ///
    /// Unlike [`Self::list`] this selects [`keys::SETTINGS`] explicitly, so
    /// the result does not depend on how many order markers exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the Admin API call fails.
    #[instrument(skip(self), fields(shop = %self.client.shop(), namespace = %self.namespace))]
    pub async fn settings(&self) -> Result<ParsedMetafields, MetafieldError> {
        let selection: Vec<String> = keys::SETTINGS
            .iter()
            .map(|key| format!("{}.{key}", self.namespace))
            .collect();
        let first = i64::try_from(selection.len()).unwrap_or(LIST_LIMIT);
        let (owner, metafields) = self
            .client
            .app_metafields(&self.namespace, first, Some(selection))
            .await?;
        self.remember_owner(owner);
        Ok(parse_metafields(&metafields))
    }

    /// Look up a single key, regardless of how many metafields exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the Admin API call fails.
    #[instrument(skip(self), fields(shop = %self.client.shop(), namespace = %self.namespace))]
    pub async fn get(&self, key: &str) -> Result<Option<MetafieldValue>, MetafieldError> {
        let metafield = self.client.app_metafield(&self.namespace, key).await?;
        Ok(metafield.map(|m| parse_value(&m.type_, &m.value)))
    }

    /// Write one key with a single `metafieldsSet` call.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving the owner fails, the call fails, or
    /// Shopify reports user errors.
    #[instrument(skip(self, value), fields(shop = %self.client.shop(), namespace = %self.namespace))]
    pub async fn set(
        &self,
        key: &str,
        type_: MetafieldType,
        value: impl Into<MetafieldValue>,
    ) -> Result<Metafield, MetafieldError> {
        let value = value.into();
        let mut written = self.set_many(&[(key, type_, value)]).await?;
        written
            .pop()
            .ok_or_else(|| MetafieldError::NotReturned(key.to_string()))
    }

    /// Write several keys with a single `metafieldsSet` call.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving the owner fails, the call fails, or
    /// Shopify reports user errors.
    pub async fn set_many(
        &self,
        entries: &[(&str, MetafieldType, MetafieldValue)],
    ) -> Result<Vec<Metafield>, MetafieldError> {
        let owner_id = self.owner_id().await?.to_string();
        let inputs = entries
            .iter()
            .map(|(key, type_, value)| MetafieldsSetInput {
                namespace: self.namespace.clone(),
                key: (*key).to_string(),
                type_: type_.as_str().to_string(),
                value: encode_value(*type_, value),
                owner_id: owner_id.clone(),
            })
            .collect();

        Ok(self.client.set_metafields(inputs).await?)
    }

    /// Delete one key. Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if resolving the owner fails or the call fails.
    #[instrument(skip(self), fields(shop = %self.client.shop(), namespace = %self.namespace))]
    pub async fn delete(&self, key: &str) -> Result<bool, MetafieldError> {
        let owner_id = self.owner_id().await?.to_string();
        let deleted = self
            .client
            .delete_metafields(vec![MetafieldIdentifierInput {
                owner_id,
                namespace: self.namespace.clone(),
                key: key.to_string(),
            }])
            .await?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn metafield(key: &str, type_: &str, value: &str) -> Metafield {
        Metafield {
            id: None,
            namespace: "tree_planting".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            type_: type_.to_string(),
        }
    }

    #[test]
    fn test_parse_boolean_true() {
        let parsed = parse_metafields(&[
            metafield("cart_enabled", "boolean", "true"),
            metafield("donation_enabled", "boolean", "TRUE"),
            metafield("other", "boolean", "yes"),
        ]);
        assert_eq!(parsed.get("cart_enabled"), Some(&MetafieldValue::Boolean(true)));
        assert!(parsed.flag("donation_enabled"));
        assert!(!parsed.flag("other"));
        assert!(!parsed.flag("missing"));
    }

    #[test]
    fn test_parse_json_round_trip() {
        let data = json!({ "productId": "gid://shopify/Product/1", "price": "5.00" });
        let parsed = parse_metafields(&[metafield("product_data", "json", &data.to_string())]);
        assert_eq!(parsed.get("product_data"), Some(&MetafieldValue::Json(data)));
    }

    #[test]
    fn test_parse_json_looking_text_falls_back_to_raw() {
        let parsed = parse_metafields(&[
            metafield("broken", "single_line_text_field", "{not json"),
            metafield("broken_json", "json", "[1, 2"),
        ]);
        assert_eq!(
            parsed.get("broken"),
            Some(&MetafieldValue::Text("{not json".to_string()))
        );
        assert_eq!(parsed.text("broken_json").as_deref(), Some("[1, 2"));
    }

    #[test]
    fn test_parse_text_that_looks_like_json_is_parsed() {
        let parsed = parse_metafields(&[metafield("list", "single_line_text_field", "[1,2]")]);
        assert_eq!(parsed.get("list"), Some(&MetafieldValue::Json(json!([1, 2]))));
    }

    #[test]
    fn test_parse_numbers() {
        let parsed = parse_metafields(&[
            metafield("usage_count", "number_integer", "42"),
            metafield("rate", "number_decimal", "2.50"),
            metafield("bad", "number_integer", "forty"),
        ]);
        assert_eq!(parsed.integer("usage_count"), Some(42));
        assert_eq!(parsed.decimal("rate"), Some(Decimal::new(250, 2)));
        assert_eq!(parsed.get("bad"), Some(&MetafieldValue::Text("forty".to_string())));
    }

    #[test]
    fn test_parse_indexes_by_namespace() {
        let parsed = parse_metafields(&[metafield("plan", "single_line_text_field", "free")]);
        let ns = parsed.namespace("tree_planting").unwrap();
        assert_eq!(ns.get("plan"), Some(&MetafieldValue::Text("free".to_string())));
        assert!(parsed.namespace("other").is_none());
    }

    #[test]
    fn test_encode_boolean_rule() {
        let b = MetafieldType::Boolean;
        assert_eq!(encode_value(b, &true.into()), "true");
        assert_eq!(encode_value(b, &false.into()), "false");
        assert_eq!(encode_value(b, &"True".into()), "true");
        assert_eq!(encode_value(b, &"yes".into()), "false");
        assert_eq!(encode_value(b, &MetafieldValue::Integer(1)), "false");
        assert_eq!(encode_value(b, &json!({ "a": 1 }).into()), "false");
    }

    #[test]
    fn test_encode_json_and_scalars() {
        let j = MetafieldType::Json;
        assert_eq!(encode_value(j, &json!({ "a": 1 }).into()), r#"{"a":1}"#);
        assert_eq!(encode_value(j, &json!(r#"{"a":1}"#).into()), r#"{"a":1}"#);
        assert_eq!(
            encode_value(MetafieldType::NumberInteger, &MetafieldValue::Integer(7)),
            "7"
        );
        assert_eq!(
            encode_value(MetafieldType::SingleLineText, &"5.00".into()),
            "5.00"
        );
    }

    #[test]
    fn test_order_marker_key() {
        assert_eq!(keys::order_marker("gid://shopify/Order/123"), "order_123");
        assert_eq!(keys::order_marker("123"), "order_123");
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(keys::limit_exceeded(date), "limit_exceeded_2025-03-09");
    }

    fn store_for(server: &MockServer) -> MetafieldStore {
        let client = AdminClient::with_endpoint(
            reqwest::Client::new(),
            "test-shop.myshopify.com",
            SecretString::from("shpat_test"),
            format!("{}/graphql.json", server.uri()),
        );
        MetafieldStore::new(client, "tree_planting")
    }

    fn set_response(key: &str, type_: &str, value: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "data": { "metafieldsSet": {
                "metafields": [{
                    "id": "gid://shopify/Metafield/1",
                    "namespace": "tree_planting",
                    "key": key,
                    "value": value,
                    "type": type_
                }],
                "userErrors": []
            } }
        }))
    }

    #[tokio::test]
    async fn test_set_resolves_owner_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "CurrentAppInstallation" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": { "id": "gid://shopify/AppInstallation/9" } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "operationName": "MetafieldsSet",
                "variables": { "metafields": [{
                    "namespace": "tree_planting",
                    "key": "cart_enabled",
                    "type": "boolean",
                    "value": "true",
                    "ownerId": "gid://shopify/AppInstallation/9"
                }] }
            })))
            .respond_with(set_response("cart_enabled", "boolean", "true"))
            .expect(2)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let written = store
            .set("cart_enabled", MetafieldType::Boolean, "TRUE")
            .await
            .unwrap();
        assert_eq!(written.value, "true");
        store
            .set("cart_enabled", MetafieldType::Boolean, true)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_set_surfaces_user_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "CurrentAppInstallation" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": { "id": "gid://shopify/AppInstallation/9" } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "MetafieldsSet" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "metafieldsSet": {
                    "metafields": [],
                    "userErrors": [{ "field": ["metafields", "0", "value"], "message": "Value is invalid" }]
                } }
            })))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .set("usage_count", MetafieldType::NumberInteger, "abc")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MetafieldError::Api(AdminShopifyError::UserError(_))
        ));
    }

    #[tokio::test]
    async fn test_list_caches_owner_for_later_writes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "AppMetafields" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": {
                    "id": "gid://shopify/AppInstallation/9",
                    "metafields": { "nodes": [
                        { "id": "gid://shopify/Metafield/1", "namespace": "tree_planting",
                          "key": "donation_amount", "value": "5.00", "type": "single_line_text_field" }
                    ] }
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "CurrentAppInstallation" })))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "operationName": "MetafieldsSet" })))
            .respond_with(set_response("donation_amount", "single_line_text_field", "6.00"))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let parsed = store.list().await.unwrap();
        assert_eq!(parsed.text("donation_amount").as_deref(), Some("5.00"));
        store
            .set("donation_amount", MetafieldType::SingleLineText, "6.00")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_get_single_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "operationName": "AppMetafield",
                "variables": { "namespace": "tree_planting", "key": "order_42" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": {
                    "id": "gid://shopify/AppInstallation/9",
                    "metafield": null
                } }
            })))
            .mount(&server)
            .await;

        let value = store_for(&server).get("order_42").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_settings_selects_keys_by_name() {
        let server = MockServer::start().await;
        // A plain listing is crowded out by order markers.
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "operationName": "AppMetafields",
                "variables": { "keys": null }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": {
                    "id": "gid://shopify/AppInstallation/9",
                    "metafields": { "nodes": (0..100).map(|i| json!({
                        "id": format!("gid://shopify/Metafield/{i}"),
                        "namespace": "tree_planting",
                        "key": format!("order_{i}"),
                        "value": "{}",
                        "type": "json"
                    })).collect::<Vec<_>>() }
                } }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "operationName": "AppMetafields",
                "variables": {
                    "first": 13,
                    "keys": ["tree_planting.product_id"]
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "currentAppInstallation": {
                    "id": "gid://shopify/AppInstallation/9",
                    "metafields": { "nodes": [
                        { "id": "gid://shopify/Metafield/200", "namespace": "tree_planting",
                          "key": "plan", "value": "essential", "type": "single_line_text_field" }
                    ] }
                } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        assert!(store.list().await.unwrap().text("plan").is_none());
        let settings = store.settings().await.unwrap();
        assert_eq!(settings.text("plan").as_deref(), Some("essential"));
    }

    #[test]
    fn test_settings_keys_exclude_per_order_records() {
        assert!(keys::SETTINGS.contains(&keys::PLAN));
        assert!(keys::SETTINGS.contains(&keys::THEME_EXTENSION_CONFIG));
        assert!(!keys::SETTINGS.iter().any(|k| k.starts_with("order_") || k.starts_with("limit_exceeded_")));
    }
}
