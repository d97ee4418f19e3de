//! Stats dashboard.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use super::{BannerQuery, Layout};
use super::orders::OrderRow;
use crate::error::AppError;
use crate::filters;
use crate::middleware::ShopAdmin;
use crate::services::orders::donation_orders;
use crate::services::stats::{self, DashboardStats, Period, SPARKLINE_HEIGHT, SparkBar};
use crate::state::AppState;

/// A metric card linking to the filtered orders list.
#[derive(Debug, Clone)]
pub struct PeriodCard {
    pub label: &'static str,
    pub href: String,
    pub orders: i64,
    pub contributed: String,
    pub trees: String,
}

/// A weekly trend with its sparkline.
#[derive(Debug, Clone)]
pub struct TrendView {
    pub label: &'static str,
    pub total: String,
    pub bars: Vec<SparkBar>,
}

/// Stats dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "app/stats.html")]
pub struct StatsTemplate {
    pub layout: Layout,
    pub stats: DashboardStats,
    pub cards: Vec<PeriodCard>,
    pub trends: Vec<TrendView>,
    pub day_labels: Vec<String>,
    pub recent_orders: Vec<OrderRow>,
    pub sparkline_height: u32,
    pub has_error: bool,
    pub error_message: Option<String>,
}

fn period_cards(stats: &DashboardStats) -> Vec<PeriodCard> {
    let card = |period: Period, totals: &stats::PeriodTotals| PeriodCard {
        label: period.label(),
        href: format!("/app/orders?period={}", period.as_query()),
        orders: totals.orders,
        contributed: totals.contributed.to_string(),
        trees: totals.trees.to_string(),
    };
    vec![
        card(Period::CurrentMonth, &stats.current_month),
        card(Period::PreviousMonth, &stats.previous_month),
        card(Period::AllTime, &stats.all_time.totals),
    ]
}

fn trends(stats: &DashboardStats) -> Vec<TrendView> {
    let weekly = &stats.weekly;
    let total = |values: &[rust_decimal::Decimal]| values.iter().sum::<rust_decimal::Decimal>();
    vec![
        TrendView {
            label: "Orders",
            total: total(&weekly.orders).to_string(),
            bars: stats::sparkline(&weekly.orders),
        },
        TrendView {
            label: "Contributed",
            total: filters::money_text(&total(&weekly.contributed).to_string()),
            bars: stats::sparkline(&weekly.contributed),
        },
        TrendView {
            label: "Trees",
            total: total(&weekly.trees).to_string(),
            bars: stats::sparkline(&weekly.trees),
        },
    ]
}

/// GET /app/stats - Donation metrics.
#[instrument(skip_all, fields(shop = %admin.shop()))]
pub async fn index(
    admin: ShopAdmin,
    State(state): State<AppState>,
    session: Session,
    Query(banner): Query<BannerQuery>,
) -> Result<Response, AppError> {
    let layout = Layout::new(&state, &admin, &session, "/app/stats", banner).await?;
    let tree_cost = state.config().donation.tree_cost;

    let (orders, has_error, error_message) = match admin.store.settings().await {
        Ok(metafields) => (donation_orders(&metafields), false, None),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load donation orders");
            (
                Vec::new(),
                true,
                Some("Could not load donation data from Shopify.".to_string()),
            )
        }
    };

    let stats = stats::compute_stats(&orders, tree_cost, Utc::now());
    let template = StatsTemplate {
        layout,
        cards: period_cards(&stats),
        trends: trends(&stats),
        day_labels: stats.weekly.labels.clone(),
        recent_orders: stats
            .recent_orders
            .iter()
            .map(|o| OrderRow::new(o, tree_cost))
            .collect(),
        stats,
        sparkline_height: SPARKLINE_HEIGHT,
        has_error,
        error_message,
    };

    Ok(template.into_response())
}
