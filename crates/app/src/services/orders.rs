//! Donation tracking for `orders/create` webhooks.
//!
//! A line item is a donation when it matches the configured donation variant,
//! the donation product, or carries the legacy `_tree_donation=true` property,
//! checked in that order. The first donation line item's quantity is added to
//! the monthly usage counter once per order: the `order_<id>` marker written
//! after a successful count turns redeliveries into no-ops.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use canopy_core::{FinancialStatus, ProductGid, VariantGid, format_amount};

use super::metafields::{
    MetafieldError, MetafieldStore, MetafieldType, MetafieldValue, ParsedMetafields, keys,
};
use super::usage::{UsageSnapshot, increment_usage};
use crate::config::DonationConfig;

/// Maximum number of records kept in `orders_data`.
pub const ORDERS_DATA_CAP: usize = 250;

/// Line item property used by older storefront integrations.
pub const LEGACY_DONATION_PROPERTY: &str = "_tree_donation";

// =============================================================================
// Webhook payload
// =============================================================================

/// The subset of the REST order payload the app reads.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    pub id: u64,
    #[serde(default)]
    pub admin_graphql_api_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub financial_status: Option<FinancialStatus>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub customer: Option<OrderCustomer>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

impl OrderPayload {
    /// Order name, falling back to `#<id>`.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("#{}", self.id))
    }

    /// Customer name, then email, then "Guest".
    #[must_use]
    pub fn customer_label(&self) -> String {
        let from_customer = self.customer.as_ref().and_then(|c| {
            let name = [c.first_name.as_deref(), c.last_name.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            if name.is_empty() { c.email.clone() } else { Some(name) }
        });
        from_customer
            .or_else(|| self.email.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Guest".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderCustomer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub product_id: Option<u64>,
    #[serde(default)]
    pub variant_id: Option<u64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Vec<LineItemProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemProperty {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl LineItem {
    /// Quantity with missing or zero counted as one.
    #[must_use]
    pub fn effective_quantity(&self) -> i64 {
        match self.quantity {
            Some(q) if q > 0 => q,
            _ => 1,
        }
    }

    fn has_legacy_flag(&self) -> bool {
        self.properties.iter().any(|p| {
            p.name == LEGACY_DONATION_PROPERTY
                && p.value == serde_json::Value::String("true".to_string())
        })
    }
}

// =============================================================================
// Matching
// =============================================================================

/// How a line item was recognized as a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Variant,
    Product,
    LegacyProperty,
}

/// The configured donation product and variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationTarget {
    pub product_id: ProductGid,
    pub variant_id: VariantGid,
}

impl DonationTarget {
    /// Resolve the target from metafields; `None` unless both a product and a
    /// variant are set.
    ///
    /// The theme extension keys take precedence over the product created
    /// from the home page.
    #[must_use]
    pub fn from_metafields(metafields: &ParsedMetafields) -> Option<Self> {
        let product_id = metafields
            .non_empty_text(keys::DONATION_PRODUCT_ID)
            .or_else(|| metafields.non_empty_text(keys::PRODUCT_ID))?;
        let variant_id = metafields
            .non_empty_text(keys::DONATION_VARIANT_ID)
            .or_else(|| {
                metafields
                    .json::<serde_json::Value>(keys::PRODUCT_DATA)
                    .and_then(|d| d.get("variantId")?.as_str().map(str::to_string))
                    .filter(|s| !s.is_empty())
            })?;

        Some(Self {
            product_id: ProductGid::new(product_id),
            variant_id: VariantGid::new(variant_id),
        })
    }

    /// Test one line item; the first matching strategy wins.
    #[must_use]
    pub fn match_line_item(&self, item: &LineItem) -> Option<MatchStrategy> {
        if let Some(item_variant) = item.variant_id
            && self.variant_id.matches(&item_variant.to_string())
        {
            return Some(MatchStrategy::Variant);
        }
        if let Some(item_product) = item.product_id
            && self.product_id.matches(&item_product.to_string())
        {
            return Some(MatchStrategy::Product);
        }
        item.has_legacy_flag().then_some(MatchStrategy::LegacyProperty)
    }
}

/// The donation line item found in one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationMatch {
    /// Donated quantity of the matched line item.
    pub quantity: i64,
    /// Donated amount (line price times quantity).
    pub amount: Decimal,
    /// Strategy that matched the line item.
    pub strategy: MatchStrategy,
}

/// Find the first donation line item of an order.
///
/// Scanning stops at the first match; later donation lines are not counted.
#[must_use]
pub fn find_donations(order: &OrderPayload, target: &DonationTarget) -> Option<DonationMatch> {
    order.line_items.iter().find_map(|item| {
        let strategy = target.match_line_item(item)?;
        let quantity = item.effective_quantity();
        let price = item
            .price
            .as_deref()
            .and_then(|p| Decimal::from_str(p.trim()).ok())
            .unwrap_or(Decimal::ZERO);
        Some(DonationMatch {
            quantity,
            amount: price * Decimal::from(quantity),
            strategy,
        })
    })
}

// =============================================================================
// Records
// =============================================================================

/// A tracked donation order, as stored in `orders_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationOrder {
    pub order_id: String,
    pub order_name: String,
    pub customer: String,
    pub quantity: i64,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub financial_status: FinancialStatus,
    pub created_at: DateTime<Utc>,
}

/// Read `orders_data`; missing or malformed data yields an empty list.
#[must_use]
pub fn donation_orders(metafields: &ParsedMetafields) -> Vec<DonationOrder> {
    metafields.json(keys::ORDERS_DATA).unwrap_or_default()
}

/// Per-order marker payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMarker {
    pub order_id: String,
    pub order_name: String,
    pub donation_quantity: i64,
    pub amount: String,
    pub tracked_at: DateTime<Utc>,
}

/// Payload written when the usage limit blocks tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitExceeded {
    pub order_id: String,
    pub order_name: String,
    pub attempted_donations: i64,
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Processing
// =============================================================================

/// Result of processing one `orders/create` delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// No donation product is configured for the shop.
    NotConfigured,
    /// The order contains no donation line items.
    NoDonation,
    /// The order was already tracked by an earlier delivery.
    Duplicate,
    /// The monthly limit is reached; the attempt was logged.
    LimitExceeded { quantity: i64 },
    /// The donation was counted.
    Recorded { quantity: i64, usage: i64 },
}

/// Process an `orders/create` payload for one shop.
///
/// # Errors
///
/// Returns an error if any metafield read or write fails. Nothing is marked
/// as tracked until the usage counter has been written.
#[instrument(skip(store, order, config), fields(shop = %store.client().shop(), order_id = order.id))]
pub async fn process_order(
    store: &MetafieldStore,
    order: &OrderPayload,
    config: &DonationConfig,
    now: DateTime<Utc>,
) -> Result<WebhookOutcome, MetafieldError> {
    let metafields = store.settings().await?;

    let Some(target) = DonationTarget::from_metafields(&metafields) else {
        tracing::info!("No donation product configured, skipping usage tracking");
        return Ok(WebhookOutcome::NotConfigured);
    };

    let Some(donation) = find_donations(order, &target) else {
        tracing::debug!("No donation items found in order");
        return Ok(WebhookOutcome::NoDonation);
    };

    let order_id = order.id.to_string();
    let marker_key = keys::order_marker(&order_id);
    if store.get(&marker_key).await?.is_some() {
        tracing::info!("Order already tracked, ignoring redelivery");
        return Ok(WebhookOutcome::Duplicate);
    }

    let usage = UsageSnapshot::from_metafields(&metafields, config.free_plan_monthly_limit, now);
    let order_name = order.display_name();

    if usage.limit_reached() {
        tracing::warn!(
            quantity = donation.quantity,
            count = usage.count(),
            "Usage limit reached, not incrementing"
        );
        let payload = LimitExceeded {
            order_id: order_id.clone(),
            order_name,
            attempted_donations: donation.quantity,
            timestamp: now,
        };
        store
            .set(
                &keys::limit_exceeded(now.date_naive()),
                MetafieldType::Json,
                json_value(&payload),
            )
            .await?;
        return Ok(WebhookOutcome::LimitExceeded {
            quantity: donation.quantity,
        });
    }

    let count = increment_usage(store, &usage, donation.quantity).await?;

    let marker = OrderMarker {
        order_id: order_id.clone(),
        order_name: order_name.clone(),
        donation_quantity: donation.quantity,
        amount: format_amount(donation.amount),
        tracked_at: now,
    };
    let record = DonationOrder {
        order_id,
        order_name,
        customer: order.customer_label(),
        quantity: donation.quantity,
        amount: donation.amount,
        currency: order.currency.clone().unwrap_or_else(|| "USD".to_string()),
        financial_status: order.financial_status.unwrap_or_default(),
        created_at: order.created_at.unwrap_or(now),
    };
    let mut orders = donation_orders(&metafields);
    orders.insert(0, record);
    orders.truncate(ORDERS_DATA_CAP);

    store
        .set_many(&[
            (marker_key.as_str(), MetafieldType::Json, json_value(&marker)),
            (keys::ORDERS_DATA, MetafieldType::Json, json_value(&orders)),
        ])
        .await?;

    tracing::info!(quantity = donation.quantity, usage = count, "Donation tracked");
    Ok(WebhookOutcome::Recorded {
        quantity: donation.quantity,
        usage: count,
    })
}

fn json_value<T: Serialize>(value: &T) -> MetafieldValue {
    MetafieldValue::Json(serde_json::to_value(value).unwrap_or(serde_json::Value::Null))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::metafields::parse_metafields;
    use crate::shopify::Metafield;

    fn field(key: &str, type_: &str, value: &str) -> Metafield {
        Metafield {
            id: None,
            namespace: "tree_planting".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            type_: type_.to_string(),
        }
    }

    fn target() -> DonationTarget {
        DonationTarget {
            product_id: ProductGid::new("gid://shopify/Product/100"),
            variant_id: VariantGid::new("gid://shopify/ProductVariant/200"),
        }
    }

    fn order(line_items: serde_json::Value) -> OrderPayload {
        serde_json::from_value(serde_json::json!({
            "id": 5001,
            "name": "#1001",
            "line_items": line_items
        }))
        .unwrap()
    }

    #[test]
    fn test_variant_match_wins_over_legacy_property() {
        let order = order(serde_json::json!([{
            "product_id": 100,
            "variant_id": 200,
            "quantity": 3,
            "price": "5.00",
            "properties": [{ "name": "_tree_donation", "value": "true" }]
        }]));
        let found = find_donations(&order, &target()).unwrap();
        assert_eq!(found.quantity, 3);
        assert_eq!(found.strategy, MatchStrategy::Variant);
        assert_eq!(found.amount, Decimal::new(1500, 2));
    }

    #[test]
    fn test_product_strategy() {
        let order = order(serde_json::json!([
            { "product_id": 7, "variant_id": 8, "quantity": 4, "properties": null },
            { "product_id": 100, "variant_id": 999, "quantity": 1, "price": "5.00" }
        ]));
        let found = find_donations(&order, &target()).unwrap();
        assert_eq!(found.quantity, 1);
        assert_eq!(found.strategy, MatchStrategy::Product);
    }

    #[test]
    fn test_legacy_strategy_zero_quantity_counts_one() {
        let order = order(serde_json::json!([
            { "product_id": 7, "variant_id": 8, "quantity": 0,
              "properties": [{ "name": "_tree_donation", "value": "true" }] }
        ]));
        let found = find_donations(&order, &target()).unwrap();
        assert_eq!(found.quantity, 1);
        assert_eq!(found.strategy, MatchStrategy::LegacyProperty);
    }

    #[test]
    fn test_scan_stops_at_first_donation_line() {
        let order = order(serde_json::json!([
            { "product_id": 100, "variant_id": 200, "quantity": 2, "price": "5.00" },
            { "product_id": 7, "variant_id": 8, "quantity": 5, "price": "5.00",
              "properties": [{ "name": "_tree_donation", "value": "true" }] }
        ]));
        let found = find_donations(&order, &target()).unwrap();
        assert_eq!(found.quantity, 2);
        assert_eq!(found.amount, Decimal::new(1000, 2));
        assert_eq!(found.strategy, MatchStrategy::Variant);
    }

    #[test]
    fn test_no_donation() {
        let order = order(serde_json::json!([{ "product_id": 1, "variant_id": 2, "quantity": 1 }]));
        assert!(find_donations(&order, &target()).is_none());
    }

    #[test]
    fn test_legacy_property_requires_string_true() {
        let order = order(serde_json::json!([{
            "product_id": 1,
            "properties": [{ "name": "_tree_donation", "value": "yes" }]
        }]));
        assert!(find_donations(&order, &target()).is_none());
    }

    #[test]
    fn test_target_prefers_theme_extension_keys() {
        let parsed = parse_metafields(&[
            field("product_id", "single_line_text_field", "gid://shopify/Product/1"),
            field("donation_product_id", "single_line_text_field", "gid://shopify/Product/2"),
            field(
                "product_data",
                "json",
                r#"{"variantId":"gid://shopify/ProductVariant/3"}"#,
            ),
        ]);
        let target = DonationTarget::from_metafields(&parsed).unwrap();
        assert_eq!(target.product_id.numeric(), "2");
        assert_eq!(target.variant_id.numeric(), "3");
    }

    #[test]
    fn test_target_requires_product() {
        let parsed = parse_metafields(&[
            field("product_id", "single_line_text_field", ""),
            field("donation_variant_id", "single_line_text_field", "gid://shopify/ProductVariant/3"),
        ]);
        assert!(DonationTarget::from_metafields(&parsed).is_none());
    }

    #[test]
    fn test_target_requires_variant() {
        let parsed = parse_metafields(&[
            field("product_id", "single_line_text_field", "gid://shopify/Product/1"),
            field("donation_variant_id", "single_line_text_field", ""),
        ]);
        assert!(DonationTarget::from_metafields(&parsed).is_none());
    }

    #[test]
    fn test_customer_label_fallbacks() {
        let mut order = order(serde_json::json!([]));
        assert_eq!(order.customer_label(), "Guest");
        order.email = Some("a@example.com".to_string());
        assert_eq!(order.customer_label(), "a@example.com");
        order.customer = Some(OrderCustomer {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            email: None,
        });
        assert_eq!(order.customer_label(), "Ada Lovelace");
    }

    #[test]
    fn test_donation_order_serde() {
        let record: DonationOrder = serde_json::from_value(serde_json::json!({
            "order_id": "5001",
            "order_name": "#1001",
            "customer": "Guest",
            "quantity": 2,
            "amount": "10.00",
            "currency": "USD",
            "financial_status": "paid",
            "created_at": "2025-03-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.amount, Decimal::new(1000, 2));
        assert_eq!(record.financial_status, FinancialStatus::Paid);
    }
}
