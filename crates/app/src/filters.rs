//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;
use std::str::FromStr;

use rust_decimal::Decimal;

use canopy_core::format_amount;

/// Format a decimal amount as dollars; non-numeric input is shown as is.
#[must_use]
pub fn money_text(value: &str) -> String {
    Decimal::from_str(value.trim()).map_or_else(
        |_| value.to_string(),
        |amount| format!("${}", format_amount(amount)),
    )
}

/// Prefix non-negative percentages with `+`.
#[must_use]
pub fn signed_percent_text(value: &str) -> String {
    if value.starts_with('-') {
        format!("{value}%")
    } else {
        format!("+{value}%")
    }
}

/// Format an amount as money.
///
/// Usage in templates: `{{ stats.all_time.totals.contributed|money }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn money(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(money_text(&value.to_string()))
}

/// Format a whole-percent change with its sign.
///
/// Usage in templates: `{{ stats.orders_change|signed_percent }}`
#[allow(clippy::unnecessary_wraps)]
#[askama::filter_fn]
pub fn signed_percent(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(signed_percent_text(&value.to_string()))
}
