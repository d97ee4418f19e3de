//! Core types for Canopy.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod gid;
pub mod price;
pub mod status;

pub use gid::*;
pub use price::format_amount;
pub use status::*;
