//! Business logic services for the app.
//!
//! # Services
//!
//! - `metafields` - Typed access to the app-installation metafield namespace
//! - `usage` - Monthly donation counter and plan limits
//! - `orders` - Donation detection and tracking for order webhooks
//! - `donation` - Donation product setup, cart settings and proxy config
//! - `stats` - Dashboard metrics computed from tracked orders

pub mod donation;
pub mod metafields;
pub mod orders;
pub mod stats;
pub mod usage;

pub use donation::{DonationError, DonationSetup, ProxyConfig, ThemeExtensionConfig};
pub use metafields::{MetafieldError, MetafieldStore, MetafieldType, MetafieldValue, ParsedMetafields};
pub use orders::{DonationOrder, OrderPayload, WebhookOutcome, process_order};
pub use stats::{DashboardStats, Period, compute_stats};
pub use usage::UsageSnapshot;
