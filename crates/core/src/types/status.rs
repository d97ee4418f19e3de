//! Status enums for various entities.

use serde::{Deserialize, Serialize};

/// Product status.
///
/// Maps to the Admin API `ProductStatus` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    Archived,
    Unlisted,
}

impl ProductStatus {
    /// Label for display in the admin UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Draft => "Draft",
            Self::Archived => "Archived",
            Self::Unlisted => "Unlisted",
        }
    }
}

/// Order financial status.
///
/// Maps to the REST `financial_status` values delivered in order webhooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FinancialStatus {
    #[default]
    Pending,
    Authorized,
    PartiallyPaid,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
    #[serde(other)]
    Unknown,
}

impl FinancialStatus {
    /// Label for display in the admin UI.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::PartiallyPaid => "partially paid",
            Self::Paid => "paid",
            Self::PartiallyRefunded => "partially refunded",
            Self::Refunded => "refunded",
            Self::Voided => "voided",
            Self::Unknown => "unknown",
        }
    }

    /// Badge tone used by the orders table.
    #[must_use]
    pub const fn tone(self) -> &'static str {
        match self {
            Self::Paid => "success",
            Self::Pending | Self::Authorized | Self::PartiallyPaid => "warning",
            Self::Refunded | Self::PartiallyRefunded => "critical",
            Self::Voided | Self::Unknown => "subdued",
        }
    }
}

/// App pricing plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Essential,
    Professional,
}

impl Plan {
    /// Parse the stored plan handle; unknown values fall back to `Free`.
    #[must_use]
    pub fn from_handle(handle: &str) -> Self {
        match handle.trim().to_ascii_lowercase().as_str() {
            "essential" => Self::Essential,
            "professional" => Self::Professional,
            _ => Self::Free,
        }
    }

    /// Stored handle.
    #[must_use]
    pub const fn handle(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Essential => "essential",
            Self::Professional => "professional",
        }
    }

    /// Whether tracked donations are capped per month on this plan.
    #[must_use]
    pub const fn is_metered(self) -> bool {
        matches!(self, Self::Free)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_status_from_webhook() {
        let status: FinancialStatus = serde_json::from_str("\"partially_refunded\"").unwrap();
        assert_eq!(status, FinancialStatus::PartiallyRefunded);
        let unknown: FinancialStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(unknown, FinancialStatus::Unknown);
    }

    #[test]
    fn test_product_status_wire_format() {
        let status: ProductStatus = serde_json::from_str("\"ARCHIVED\"").unwrap();
        assert_eq!(status, ProductStatus::Archived);
    }

    #[test]
    fn test_plan_from_handle() {
        assert_eq!(Plan::from_handle("Essential"), Plan::Essential);
        assert_eq!(Plan::from_handle(""), Plan::Free);
        assert!(Plan::Free.is_metered());
        assert!(!Plan::Professional.is_metered());
    }
}
