//! Tracked donation orders: list, search and CSV export.

use std::fmt::Write;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use canopy_core::format_amount;

use super::{BannerQuery, Layout};
use crate::error::AppError;
use crate::filters;
use crate::middleware::ShopAdmin;
use crate::services::orders::{DonationOrder, donation_orders};
use crate::services::stats::{Period, filter_orders, trees_for};
use crate::state::AppState;

/// Orders list query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct OrdersQuery {
    pub search: Option<String>,
    pub period: Option<String>,
}

/// Order row for list templates.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_id: String,
    pub order_name: String,
    pub customer: String,
    pub quantity: i64,
    pub amount: String,
    pub currency: String,
    pub status: &'static str,
    pub status_tone: &'static str,
    pub date: String,
    pub trees: String,
}

impl OrderRow {
    /// Build a row from a tracked order.
    #[must_use]
    pub fn new(order: &DonationOrder, tree_cost: Decimal) -> Self {
        Self {
            order_id: order.order_id.clone(),
            order_name: order.order_name.clone(),
            customer: order.customer.clone(),
            quantity: order.quantity,
            amount: format_amount(order.amount),
            currency: order.currency.clone(),
            status: order.financial_status.label(),
            status_tone: order.financial_status.tone(),
            date: order.created_at.format("%Y-%m-%d").to_string(),
            trees: trees_for(order.amount, tree_cost).to_string(),
        }
    }

    /// Path of the order in the Shopify admin.
    #[must_use]
    pub fn admin_path(&self) -> String {
        format!("orders/{}", self.order_id)
    }
}

/// Orders page template.
#[derive(Template, WebTemplate)]
#[template(path = "app/orders.html")]
pub struct OrdersTemplate {
    pub layout: Layout,
    pub rows: Vec<OrderRow>,
    pub total_tracked: usize,
    pub search: String,
    pub period: Period,
    pub periods: [Period; 3],
    pub total_amount: String,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl OrdersTemplate {
    /// Export link preserving the current filters.
    #[must_use]
    pub fn export_href(&self) -> String {
        format!(
            "/app/orders/export.csv?period={}&search={}",
            self.period.as_query(),
            urlencoding::encode(&self.search)
        )
    }
}

/// GET /app/orders - Tracked donation orders.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn index(
    admin: ShopAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<OrdersQuery>,
    Query(banner): Query<BannerQuery>,
) -> Result<Response, AppError> {
    let layout = Layout::new(&state, &admin, &session, "/app/orders", banner).await?;
    let tree_cost = state.config().donation.tree_cost;
    let period = Period::from_query(query.period.as_deref());
    let search = query.search.unwrap_or_default();

    let (orders, has_error, error_message) = match admin.store.settings().await {
        Ok(metafields) => (donation_orders(&metafields), false, None),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load donation orders");
            (
                Vec::new(),
                true,
                Some("Could not load donation orders from Shopify.".to_string()),
            )
        }
    };

    let matching = filter_orders(&orders, &search, period, Utc::now());
    let total: Decimal = matching.iter().map(|o| o.amount).sum();

    let template = OrdersTemplate {
        layout,
        rows: matching.iter().map(|o| OrderRow::new(o, tree_cost)).collect(),
        total_tracked: orders.len(),
        search,
        period,
        periods: [Period::AllTime, Period::CurrentMonth, Period::PreviousMonth],
        total_amount: filters::money_text(&total.to_string()),
        has_error,
        error_message,
    };

    Ok(template.into_response())
}

/// GET /app/orders/export.csv - Download the filtered orders.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn export_csv(
    admin: ShopAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Response, AppError> {
    let metafields = admin.store.settings().await?;
    let orders = donation_orders(&metafields);
    let period = Period::from_query(query.period.as_deref());
    let matching = filter_orders(
        &orders,
        query.search.as_deref().unwrap_or_default(),
        period,
        Utc::now(),
    );

    let rows: Vec<OrderRow> = matching
        .iter()
        .map(|o| OrderRow::new(o, state.config().donation.tree_cost))
        .collect();
    let csv = orders_csv(&rows);
    let filename = format!("donation-orders-{}.csv", period.as_query());

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

/// Render order rows as CSV.
#[must_use]
pub fn orders_csv(rows: &[OrderRow]) -> String {
    let mut csv = String::from("Order,Date,Customer,Quantity,Amount,Currency,Status,Trees\n");
    for row in rows {
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            csv_field(&row.order_name),
            row.date,
            csv_field(&row.customer),
            row.quantity,
            row.amount,
            csv_field(&row.currency),
            row.status,
            row.trees
        );
    }
    csv
}

/// Quote a field containing separators, quotes or line breaks.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
