//! Monthly donation usage counter and plan limits.
//!
//! The counter lives in two metafields: `usage_count` and `usage_period`
//! (`YYYY-MM`). A counter from an earlier month counts as zero.

use chrono::{DateTime, Utc};
use tracing::instrument;

use canopy_core::Plan;

use super::metafields::{
    MetafieldError, MetafieldStore, MetafieldType, MetafieldValue, ParsedMetafields, keys,
};

/// Usage period key for a point in time.
#[must_use]
pub fn usage_period(now: DateTime<Utc>) -> String {
    now.format("%Y-%m").to_string()
}

/// The usage counter and plan as read from metafields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSnapshot {
    /// Current plan (defaults to free).
    pub plan: Plan,
    /// Stored counter value.
    pub stored_count: i64,
    /// Period the stored counter belongs to.
    pub stored_period: Option<String>,
    /// Period of "now".
    pub current_period: String,
    /// Monthly limit for the plan, `None` when unlimited.
    pub limit: Option<i64>,
}

impl UsageSnapshot {
    /// Read the counter and plan from parsed metafields.
    #[must_use]
    pub fn from_metafields(
        metafields: &ParsedMetafields,
        free_plan_monthly_limit: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let plan = Plan::from_handle(&metafields.text(keys::PLAN).unwrap_or_default());
        Self {
            plan,
            stored_count: metafields.integer(keys::USAGE_COUNT).unwrap_or(0),
            stored_period: metafields.non_empty_text(keys::USAGE_PERIOD),
            current_period: usage_period(now),
            limit: plan.is_metered().then_some(free_plan_monthly_limit),
        }
    }

    /// Whether the stored counter belongs to the current month.
    #[must_use]
    pub fn is_current_period(&self) -> bool {
        self.stored_period.as_deref() == Some(self.current_period.as_str())
    }

    /// Donations tracked this month.
    #[must_use]
    pub fn count(&self) -> i64 {
        if self.is_current_period() {
            self.stored_count
        } else {
            0
        }
    }

    /// Whether tracking is blocked for the rest of the month.
    #[must_use]
    pub fn limit_reached(&self) -> bool {
        self.limit.is_some_and(|limit| self.count() >= limit)
    }

    /// Tracked donations left this month, `None` when unlimited.
    #[must_use]
    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (limit - self.count()).max(0))
    }

    /// Percentage of the monthly limit used, capped at 100.
    #[must_use]
    pub fn percent_used(&self) -> Option<i64> {
        self.limit
            .filter(|limit| *limit > 0)
            .map(|limit| (self.count() * 100 / limit).min(100))
    }
}

/// Add `quantity` to this month's counter and persist it.
///
/// Returns the new count.
///
/// # Errors
///
/// Returns an error if the metafield write fails.
#[instrument(skip(store, snapshot), fields(shop = %store.client().shop()))]
pub async fn increment_usage(
    store: &MetafieldStore,
    snapshot: &UsageSnapshot,
    quantity: i64,
) -> Result<i64, MetafieldError> {
    let count = snapshot.count() + quantity;
    store
        .set_many(&[
            (
                keys::USAGE_COUNT,
                MetafieldType::NumberInteger,
                MetafieldValue::Integer(count),
            ),
            (
                keys::USAGE_PERIOD,
                MetafieldType::SingleLineText,
                MetafieldValue::Text(snapshot.current_period.clone()),
            ),
        ])
        .await?;

    tracing::info!(count, quantity, "Usage counter updated");
    Ok(count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

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

    fn march() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_usage_period_format() {
        assert_eq!(usage_period(march()), "2025-03");
    }

    #[test]
    fn test_limit_reached_on_free_plan() {
        let parsed = parse_metafields(&[
            field("usage_count", "number_integer", "50"),
            field("usage_period", "single_line_text_field", "2025-03"),
        ]);
        let usage = UsageSnapshot::from_metafields(&parsed, 50, march());
        assert_eq!(usage.plan, Plan::Free);
        assert!(usage.limit_reached());
        assert_eq!(usage.remaining(), Some(0));
        assert_eq!(usage.percent_used(), Some(100));
    }

    #[test]
    fn test_previous_month_resets() {
        let parsed = parse_metafields(&[
            field("usage_count", "number_integer", "80"),
            field("usage_period", "single_line_text_field", "2025-02"),
        ]);
        let usage = UsageSnapshot::from_metafields(&parsed, 50, march());
        assert_eq!(usage.count(), 0);
        assert!(!usage.limit_reached());
    }

    #[test]
    fn test_paid_plan_is_unlimited() {
        let parsed = parse_metafields(&[
            field("plan", "single_line_text_field", "essential"),
            field("usage_count", "number_integer", "500"),
            field("usage_period", "single_line_text_field", "2025-03"),
        ]);
        let usage = UsageSnapshot::from_metafields(&parsed, 50, march());
        assert!(!usage.limit_reached());
        assert_eq!(usage.remaining(), None);
    }
}
