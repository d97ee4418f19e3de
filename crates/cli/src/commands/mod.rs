//! CLI command implementations.

pub mod metafields;
pub mod migrate;
