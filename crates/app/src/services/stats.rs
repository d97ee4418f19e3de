//! Donation statistics computed from tracked orders.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::orders::DonationOrder;

/// Number of days in the weekly trend series.
pub const TREND_DAYS: i64 = 7;

/// Number of orders in the "recent orders" card.
pub const RECENT_ORDERS: usize = 5;

/// Order count, amount and trees for one period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    pub orders: i64,
    pub quantity: i64,
    pub contributed: Decimal,
    pub trees: Decimal,
}

impl PeriodTotals {
    fn add(&mut self, order: &DonationOrder, tree_cost: Decimal) {
        self.orders += 1;
        self.quantity += order.quantity;
        self.contributed += order.amount;
        self.trees = trees_for(self.contributed, tree_cost);
    }
}

/// All-time totals with customer metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllTimeTotals {
    pub totals: PeriodTotals,
    pub customers: usize,
    pub average_donation: Decimal,
}

/// Daily series for the last seven days, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyTrends {
    pub labels: Vec<String>,
    pub orders: Vec<Decimal>,
    pub contributed: Vec<Decimal>,
    pub trees: Vec<Decimal>,
}

/// Everything the stats dashboard shows.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub current_month: PeriodTotals,
    pub previous_month: PeriodTotals,
    pub all_time: AllTimeTotals,
    pub orders_change: i64,
    pub contributed_change: i64,
    pub trees_change: i64,
    pub weekly: WeeklyTrends,
    pub recent_orders: Vec<DonationOrder>,
}

/// Trees funded by an amount, rounded to two decimals.
#[must_use]
pub fn trees_for(amount: Decimal, tree_cost: Decimal) -> Decimal {
    if tree_cost <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (amount / tree_cost).round_dp(2)
}

/// Whole-percent change; `100` when there is nothing to compare against.
#[must_use]
pub fn percent_change(current: Decimal, previous: Decimal) -> i64 {
    if previous.is_zero() {
        return 100;
    }
    let ratio = (current - previous) / previous * Decimal::ONE_HUNDRED;
    // Halves round up, matching Math.round.
    (ratio + Decimal::new(5, 1)).floor().to_i64().unwrap_or(0)
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn previous_month_start(now: DateTime<Utc>) -> NaiveDate {
    let current = month_start(now.date_naive());
    month_start(current.pred_opt().unwrap_or(current))
}

/// Date filter on the orders page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    AllTime,
    CurrentMonth,
    PreviousMonth,
}

impl Period {
    /// Parse the `period` query parameter; unknown values mean all time.
    #[must_use]
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("current-month") => Self::CurrentMonth,
            Some("previous-month") => Self::PreviousMonth,
            _ => Self::AllTime,
        }
    }

    /// Query parameter value.
    #[must_use]
    pub const fn as_query(self) -> &'static str {
        match self {
            Self::AllTime => "all-time",
            Self::CurrentMonth => "current-month",
            Self::PreviousMonth => "previous-month",
        }
    }

    /// Label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AllTime => "All time",
            Self::CurrentMonth => "Current month",
            Self::PreviousMonth => "Previous month",
        }
    }

    /// Whether an order falls inside the period.
    #[must_use]
    pub fn contains(self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let month = month_start(created_at.date_naive());
        match self {
            Self::AllTime => true,
            Self::CurrentMonth => month == month_start(now.date_naive()),
            Self::PreviousMonth => month == previous_month_start(now),
        }
    }
}

/// Compute the dashboard from tracked orders.
#[must_use]
pub fn compute_stats(
    orders: &[DonationOrder],
    tree_cost: Decimal,
    now: DateTime<Utc>,
) -> DashboardStats {
    let mut stats = DashboardStats::default();
    let mut customers = HashSet::new();

    for order in orders {
        if Period::CurrentMonth.contains(order.created_at, now) {
            stats.current_month.add(order, tree_cost);
        } else if Period::PreviousMonth.contains(order.created_at, now) {
            stats.previous_month.add(order, tree_cost);
        }
        stats.all_time.totals.add(order, tree_cost);
        customers.insert(order.customer.to_ascii_lowercase());
    }

    stats.all_time.customers = customers.len();
    if stats.all_time.totals.orders > 0 {
        stats.all_time.average_donation = (stats.all_time.totals.contributed
            / Decimal::from(stats.all_time.totals.orders))
        .round_dp(2);
    }

    stats.orders_change = percent_change(
        Decimal::from(stats.current_month.orders),
        Decimal::from(stats.previous_month.orders),
    );
    stats.contributed_change = percent_change(
        stats.current_month.contributed,
        stats.previous_month.contributed,
    );
    stats.trees_change = percent_change(stats.current_month.trees, stats.previous_month.trees);

    stats.weekly = weekly_trends(orders, tree_cost, now);

    let mut recent = orders.to_vec();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent.truncate(RECENT_ORDERS);
    stats.recent_orders = recent;

    stats
}

fn weekly_trends(orders: &[DonationOrder], tree_cost: Decimal, now: DateTime<Utc>) -> WeeklyTrends {
    let today = now.date_naive();
    let mut trends = WeeklyTrends::default();

    for offset in (0..TREND_DAYS).rev() {
        let day = today - Duration::days(offset);
        let mut totals = PeriodTotals::default();
        for order in orders.iter().filter(|o| o.created_at.date_naive() == day) {
            totals.add(order, tree_cost);
        }
        trends.labels.push(day.format("%a").to_string());
        trends.orders.push(Decimal::from(totals.orders));
        trends.contributed.push(totals.contributed);
        trends.trees.push(totals.trees);
    }

    trends
}

/// Case-insensitive search on order name or customer, within a period.
#[must_use]
pub fn filter_orders<'a>(
    orders: &'a [DonationOrder],
    search: &str,
    period: Period,
    now: DateTime<Utc>,
) -> Vec<&'a DonationOrder> {
    let needle = search.trim().to_lowercase();
    orders
        .iter()
        .filter(|o| period.contains(o.created_at, now))
        .filter(|o| {
            needle.is_empty()
                || o.order_name.to_lowercase().contains(&needle)
                || o.customer.to_lowercase().contains(&needle)
        })
        .collect()
}

// =============================================================================
// Sparklines
// =============================================================================

/// Height of the sparkline viewBox.
pub const SPARKLINE_HEIGHT: u32 = 40;

/// One bar of an inline SVG sparkline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparkBar {
    pub x: u32,
    pub y: u32,
    pub height: u32,
}

/// Bars scaled so the largest value fills the chart.
#[must_use]
pub fn sparkline(values: &[Decimal]) -> Vec<SparkBar> {
    let max = values.iter().copied().max().unwrap_or(Decimal::ZERO);
    let usable = Decimal::from(SPARKLINE_HEIGHT - 4);

    values
        .iter()
        .zip((0u32..).step_by(10))
        .map(|(value, x)| {
            let height = if max > Decimal::ZERO {
                (*value / max * usable).round().to_u32().unwrap_or(0).max(1)
            } else {
                1
            };
            SparkBar {
                x,
                y: SPARKLINE_HEIGHT - height,
                height,
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use canopy_core::FinancialStatus;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    fn order(name: &str, customer: &str, amount: i64, created_at: DateTime<Utc>) -> DonationOrder {
        DonationOrder {
            order_id: name.trim_start_matches('#').to_string(),
            order_name: name.to_string(),
            customer: customer.to_string(),
            quantity: 1,
            amount: Decimal::from(amount),
            currency: "USD".to_string(),
            financial_status: FinancialStatus::Paid,
            created_at,
        }
    }

    fn sample() -> Vec<DonationOrder> {
        vec![
            order("#1003", "ada@example.com", 30, now()),
            order("#1002", "bob@example.com", 15, Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap()),
            order("#1001", "Ada@example.com", 60, Utc.with_ymd_and_hms(2025, 2, 20, 9, 0, 0).unwrap()),
            order("#0999", "cy@example.com", 5, Utc.with_ymd_and_hms(2024, 12, 31, 9, 0, 0).unwrap()),
        ]
    }

    #[test]
    fn test_percent_change_rules() {
        assert_eq!(percent_change(Decimal::from(42), Decimal::from(35)), 20);
        assert_eq!(percent_change(Decimal::from(5), Decimal::ZERO), 100);
        assert_eq!(percent_change(Decimal::ZERO, Decimal::ZERO), 100);
        assert_eq!(percent_change(Decimal::from(1), Decimal::from(2)), -50);
        // -2.5 rounds up to -2
        assert_eq!(percent_change(Decimal::new(975, 1), Decimal::from(100)), -2);
    }

    #[test]
    fn test_trees_for() {
        assert_eq!(trees_for(Decimal::from(45), Decimal::from(30)), Decimal::new(150, 2));
        assert_eq!(trees_for(Decimal::from(5), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_compute_stats_periods() {
        let stats = compute_stats(&sample(), Decimal::from(30), now());
        assert_eq!(stats.current_month.orders, 2);
        assert_eq!(stats.current_month.contributed, Decimal::from(45));
        assert_eq!(stats.previous_month.orders, 1);
        assert_eq!(stats.all_time.totals.orders, 4);
        assert_eq!(stats.all_time.customers, 3);
        assert_eq!(stats.all_time.average_donation, Decimal::new(2750, 2));
        assert_eq!(stats.orders_change, 100);
        assert_eq!(stats.contributed_change, -25);
        assert_eq!(stats.recent_orders.first().unwrap().order_name, "#1003");
    }

    #[test]
    fn test_weekly_trends_cover_seven_days() {
        let stats = compute_stats(&sample(), Decimal::from(30), now());
        assert_eq!(stats.weekly.labels.len(), 7);
        assert_eq!(stats.weekly.labels.last().unwrap(), "Sat");
        assert_eq!(stats.weekly.orders.last(), Some(&Decimal::ONE));
        assert_eq!(stats.weekly.trees.last(), Some(&Decimal::ONE));
    }

    #[test]
    fn test_filter_orders_search_and_period() {
        let orders = sample();
        assert_eq!(filter_orders(&orders, "ADA", Period::AllTime, now()).len(), 2);
        assert_eq!(filter_orders(&orders, "#100", Period::CurrentMonth, now()).len(), 2);
        assert_eq!(filter_orders(&orders, "", Period::PreviousMonth, now()).len(), 1);
        assert!(filter_orders(&orders, "nobody", Period::AllTime, now()).is_empty());
    }

    #[test]
    fn test_previous_month_across_year_boundary() {
        let january = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let december = Utc.with_ymd_and_hms(2024, 12, 31, 9, 0, 0).unwrap();
        assert!(Period::PreviousMonth.contains(december, january));
        assert_eq!(Period::from_query(Some("previous-month")), Period::PreviousMonth);
        assert_eq!(Period::from_query(Some("all-time")), Period::AllTime);
    }

    #[test]
    fn test_sparkline_scales_to_max() {
        let bars = sparkline(&[Decimal::ZERO, Decimal::from(5), Decimal::from(10)]);
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2].height, SPARKLINE_HEIGHT - 4);
        assert_eq!(bars[1].x, 10);
        assert_eq!(bars[0].height, 1);
    }
}
