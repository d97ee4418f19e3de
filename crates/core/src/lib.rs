//! Canopy Core - Shared types library.
//!
//! This crate provides common types used across all Canopy components:
//! - `app` - Embedded Shopify admin app, webhooks and app proxy
//! - `cli` - Command-line tools for migrations and metafield management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for Shopify GIDs, amounts, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
